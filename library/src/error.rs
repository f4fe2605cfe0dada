use thiserror::Error;

/// Errors raised while editing or evaluating the node graph.
///
/// The first five variants are the node-local and structural evaluation
/// errors. Node-local errors (`MissingInput`, `InvalidParameter`,
/// `RecomputationFailed`) are contained at the failing slot: it keeps its
/// last-good cached value and the error is attached to the node as a
/// diagnostic rather than propagated to unrelated consumers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Missing input: {0}")]
    MissingInput(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Recomputation failed: {0}")]
    RecomputationFailed(String),
    #[error("Dangling connection: {0}")]
    DanglingConnection(String),
    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),
    #[error("Node not found: {0}")]
    NodeNotFound(uuid::Uuid),
    #[error("Slot not found: {0}")]
    SlotNotFound(String),
    #[error("Unknown operator type: {0}")]
    UnknownOperator(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),
}
