//! In-memory data model of the node graph: values, ports, nodes and the
//! graph container with its mutation operations.

pub mod connection;
pub mod graph;
pub mod node;
pub mod value;

pub use connection::{IndexPolicy, InputDefinition, OutputDefinition, SlotDataType, SlotRef};
pub use graph::Graph;
pub use node::{Diagnostic, InputKind, InputPort, MultiLink, NodeInstance, OutputSlot};
pub use value::{ImageHandle, SlotValue};
