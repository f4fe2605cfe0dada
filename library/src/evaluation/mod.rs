//! Pull-based evaluation: dirty flags, contexts, scopes and the engine.

pub mod context;
pub mod dirty;
pub mod engine;
pub mod scope;

pub use context::EvalContext;
pub use dirty::{DirtyFlag, DirtyTrigger};
pub use engine::EvalEngine;
pub use scope::ComputeScope;
