//! Evaluation context — the per-pass bundle of frame parameters threaded
//! through every recomputation call.

/// Frame-global parameters for one evaluation pass.
///
/// Immutable for the duration of one node's recomputation: a node derives a
/// modified copy (e.g. a local time shift) for its own upstream pulls and
/// never mutates the instance its caller passed in. Time is carried only
/// here — recomputation procedures read no ambient clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalContext {
    /// Wall-clock time of the frame, in seconds.
    pub global_time: f64,
    /// Time as seen by the current node scope; ancestors may have offset or
    /// scaled it before recursing.
    pub local_time: f64,
    /// Frame index of the render loop.
    pub frame: u64,
    /// Identity of the evaluation pass. Monotonic, independent of `frame`,
    /// so re-rendering the same frame after an edit still recomputes.
    pub pass: u64,
    /// Current recursion depth of the pull traversal.
    pub depth: u32,
}

impl EvalContext {
    pub(crate) fn new(global_time: f64, frame: u64, pass: u64) -> Self {
        Self {
            global_time,
            local_time: global_time,
            frame,
            pass,
            depth: 0,
        }
    }

    /// Derive a context with a replaced local time.
    pub fn with_local_time(&self, local_time: f64) -> Self {
        Self { local_time, ..*self }
    }

    /// Derive the context passed to an upstream pull.
    pub fn descend(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_leaves_original_untouched() {
        let ctx = EvalContext::new(2.0, 60, 7);
        let shifted = ctx.with_local_time(1.5);
        assert_eq!(shifted.local_time, 1.5);
        assert_eq!(shifted.global_time, 2.0);
        assert_eq!(ctx.local_time, 2.0);
        assert_eq!(shifted.pass, 7);
    }

    #[test]
    fn test_descend_increments_depth() {
        let ctx = EvalContext::new(0.0, 0, 1);
        assert_eq!(ctx.descend().descend().depth, 2);
    }
}
