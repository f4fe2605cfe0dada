//! Core evaluation runtime for the node-graph visual synthesizer.
//!
//! Operators are wired into a directed graph that is re-evaluated every
//! rendered frame. Evaluation is a lazy, depth-first pull with memoization
//! at every output slot: unchanged subgraphs are never recomputed, animated
//! outputs always are, and a single broken node never blanks the preview.

pub mod error;
pub mod evaluation;
pub mod graph;
pub mod operator;

pub use error::EvaluationError;
pub use evaluation::{ComputeScope, DirtyTrigger, EvalContext, EvalEngine};
pub use graph::{Graph, SlotRef, SlotValue};
pub use operator::{Operator, OperatorCatalog, OperatorDefinition};
