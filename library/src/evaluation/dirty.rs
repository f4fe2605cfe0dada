//! Invalidation token ("dirty flag") for output slots.

use serde::{Deserialize, Serialize};

/// Classification of why a slot re-evaluates.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyTrigger {
    /// Stale only when a parameter or upstream dependency changed.
    OnChange,
    /// Continuously animated — stale on every evaluation pass.
    Animated,
}

/// Per-slot staleness marker.
///
/// A flag is dirty from creation until the owning slot's value has been
/// recomputed at least once after the last mark. Marking never walks the
/// graph; downstream slots discover upstream staleness lazily on their next
/// pull. `last_pass` enforces at-most-one recomputation per slot per pass,
/// and `evaluating` is the reentrancy marker used for cycle detection.
#[derive(Clone, Debug)]
pub struct DirtyFlag {
    dirty: bool,
    trigger: DirtyTrigger,
    last_pass: Option<u64>,
    evaluating: bool,
}

impl DirtyFlag {
    pub fn new(trigger: DirtyTrigger) -> Self {
        Self {
            dirty: true,
            trigger,
            last_pass: None,
            evaluating: false,
        }
    }

    /// Set the flag dirty. A mark classified `Animated` upgrades the trigger
    /// permanently; an `OnChange` mark never downgrades an animated slot.
    pub fn mark(&mut self, trigger: DirtyTrigger) {
        self.dirty = true;
        if trigger == DirtyTrigger::Animated {
            self.trigger = DirtyTrigger::Animated;
        }
    }

    /// True if never cleared since the last mark, or classified animated.
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.trigger == DirtyTrigger::Animated
    }

    pub fn trigger(&self) -> DirtyTrigger {
        self.trigger
    }

    /// Idempotent; called immediately after a successful recomputation.
    pub fn clear(&mut self, pass: u64) {
        self.dirty = false;
        self.last_pass = Some(pass);
    }

    /// Whether the slot was already refreshed (or attempted) in this pass.
    pub fn seen_pass(&self, pass: u64) -> bool {
        self.last_pass == Some(pass)
    }

    /// Record a pass without clearing dirtiness (failed recomputation keeps
    /// the flag set so the next pass retries).
    pub fn stamp_pass(&mut self, pass: u64) {
        self.last_pass = Some(pass);
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating
    }

    pub fn begin_eval(&mut self) {
        self.evaluating = true;
    }

    pub fn end_eval(&mut self) {
        self.evaluating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_flag_is_dirty() {
        let flag = DirtyFlag::new(DirtyTrigger::OnChange);
        assert!(flag.is_dirty());
        assert!(!flag.seen_pass(0));
    }

    #[test]
    fn test_clear_then_mark() {
        let mut flag = DirtyFlag::new(DirtyTrigger::OnChange);
        flag.clear(1);
        assert!(!flag.is_dirty());
        assert!(flag.seen_pass(1));
        flag.mark(DirtyTrigger::OnChange);
        assert!(flag.is_dirty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut flag = DirtyFlag::new(DirtyTrigger::OnChange);
        flag.clear(1);
        flag.clear(1);
        assert!(!flag.is_dirty());
    }

    #[test]
    fn test_animated_always_dirty() {
        let mut flag = DirtyFlag::new(DirtyTrigger::Animated);
        flag.clear(1);
        assert!(flag.is_dirty());
        assert!(flag.seen_pass(1));
    }

    #[test]
    fn test_animated_mark_upgrades_trigger() {
        let mut flag = DirtyFlag::new(DirtyTrigger::OnChange);
        flag.mark(DirtyTrigger::Animated);
        flag.clear(1);
        assert!(flag.is_dirty());
        flag.mark(DirtyTrigger::OnChange);
        assert_eq!(flag.trigger(), DirtyTrigger::Animated);
    }

    #[test]
    fn test_stamp_pass_keeps_dirty() {
        let mut flag = DirtyFlag::new(DirtyTrigger::OnChange);
        flag.stamp_pass(3);
        assert!(flag.seen_pass(3));
        assert!(flag.is_dirty());
    }
}
