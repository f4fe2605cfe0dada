//! Operator kinds — the pluggable node bodies of the runtime.
//!
//! Each node type implements [`Operator`] behind a common trait and is
//! registered in a kind-keyed [`OperatorCatalog`]. The runtime never
//! inspects concrete operator types; it dispatches by the node's `type_id`.

pub mod builtin;
pub mod catalog;

use crate::error::EvaluationError;
use crate::evaluation::scope::ComputeScope;
use crate::graph::connection::{InputDefinition, OutputDefinition};
use crate::graph::value::SlotValue;

pub use catalog::OperatorCatalog;

/// Static description of an operator kind: identity, parameter defaults and
/// port layout. Node instances are stamped out from this.
#[derive(Clone, Debug)]
pub struct OperatorDefinition {
    /// Dot-namespaced kind key, e.g. "math.add", "time.clock".
    pub type_id: String,
    /// Display name shown in the UI.
    pub display_name: String,
    /// Parameter names with their default values.
    pub params: Vec<(String, SlotValue)>,
    pub inputs: Vec<InputDefinition>,
    pub outputs: Vec<OutputDefinition>,
}

impl OperatorDefinition {
    pub fn new(type_id: &str, display_name: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            display_name: display_name.to_string(),
            params: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &str, default: SlotValue) -> Self {
        self.params.push((name.to_string(), default));
        self
    }

    pub fn with_input(mut self, input: InputDefinition) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: OutputDefinition) -> Self {
        self.outputs.push(output);
        self
    }
}

/// A node body: port/parameter declaration plus the recomputation procedure.
///
/// `compute` is invoked by the engine when an output slot is stale for the
/// current pass. It pulls whatever inputs it needs through the scope (which
/// threads the evaluation context into the upstream recursion), and returns
/// the new value for the requested slot. Operators whose outputs are all
/// constant holders never have `compute` called and can rely on the default
/// implementation.
pub trait Operator: Send + Sync {
    fn definition(&self) -> OperatorDefinition;

    fn compute(
        &self,
        slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let _ = scope;
        Err(EvaluationError::RecomputationFailed(format!(
            "operator '{}' has no recomputation procedure for slot '{}'",
            self.definition().type_id,
            slot
        )))
    }
}
