//! Slot references and port definitions for the data-flow graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evaluation::dirty::DirtyTrigger;

use super::value::SlotValue;

/// Data type of a slot (socket type).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SlotDataType {
    /// Floating point scalar (f64)
    Float,
    /// Integer value (i64)
    Int,
    /// Boolean value
    Bool,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// RGBA color
    Color,
    /// Text string
    Text,
    /// Image/texture data flow
    Image,
    /// List/array of values
    List,
    /// Accepts any type (generic)
    Any,
}

impl SlotDataType {
    /// Whether a value of type `source` may be wired into a port of this type.
    pub fn accepts(self, source: SlotDataType) -> bool {
        self == SlotDataType::Any || source == SlotDataType::Any || self == source
    }
}

/// Identifies a specific output slot on a specific node.
///
/// This is a weak, identifier-based reference: the referenced slot is looked
/// up in the graph at pull time, so removing a node can never leave a
/// dangling pointer — only a reference that resolves to nothing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub node_id: Uuid,
    pub slot_name: String,
}

impl SlotRef {
    pub fn new(node_id: Uuid, slot_name: &str) -> Self {
        Self {
            node_id,
            slot_name: slot_name.to_string(),
        }
    }
}

impl std::fmt::Display for SlotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node_id, self.slot_name)
    }
}

/// Out-of-range policy for index-selecting multi-input consumers.
///
/// The connection count changes as the user edits the graph, so selectors
/// never fail on out-of-range indices. Which policy applies is declared per
/// port rather than assumed uniform across node kinds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IndexPolicy {
    /// Wrap around via euclidean modulo (negative indices count from the end).
    #[default]
    Wrap,
    /// Clamp to the valid range.
    Clamp,
}

/// Definition of an input port on an operator kind.
#[derive(Clone, Debug)]
pub struct InputDefinition {
    /// Internal name used for connections (e.g. "image_in", "amount")
    pub name: String,
    /// Display name shown in the UI (e.g. "Image", "Amount")
    pub display_name: String,
    /// Data type of this port
    pub data_type: SlotDataType,
    /// Default value when no connection is present. `SlotValue::None` marks
    /// a port with no usable default (required input).
    pub default: SlotValue,
    /// Whether this port accepts an ordered fan-in of connections.
    pub multi: bool,
    /// Out-of-range handling for index-based selection (multi ports only).
    pub index_policy: IndexPolicy,
}

impl InputDefinition {
    pub fn single(name: &str, display_name: &str, data_type: SlotDataType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            data_type,
            default: SlotValue::None,
            multi: false,
            index_policy: IndexPolicy::default(),
        }
    }

    pub fn multi(name: &str, display_name: &str, data_type: SlotDataType) -> Self {
        Self {
            multi: true,
            ..Self::single(name, display_name, data_type)
        }
    }

    pub fn with_default(mut self, value: SlotValue) -> Self {
        self.default = value;
        self
    }

    pub fn with_index_policy(mut self, policy: IndexPolicy) -> Self {
        self.index_policy = policy;
        self
    }
}

/// Definition of an output slot on an operator kind.
#[derive(Clone, Debug)]
pub struct OutputDefinition {
    pub name: String,
    pub display_name: String,
    pub data_type: SlotDataType,
    /// Invalidation classification. `Animated` outputs are re-evaluated on
    /// every pass regardless of upstream changes.
    pub trigger: DirtyTrigger,
    /// Whether the operator recomputes this slot. Non-computed slots are pure
    /// constant/default holders written via `Graph::set_slot_value`.
    pub computed: bool,
}

impl OutputDefinition {
    /// An output recomputed by the operator's `compute`.
    pub fn computed(name: &str, display_name: &str, data_type: SlotDataType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            data_type,
            trigger: DirtyTrigger::OnChange,
            computed: true,
        }
    }

    /// A constant/default holder with no recomputation procedure.
    pub fn constant(name: &str, display_name: &str, data_type: SlotDataType) -> Self {
        Self {
            computed: false,
            ..Self::computed(name, display_name, data_type)
        }
    }

    /// Classify as continuously animated (dirty on every pass).
    pub fn animated(mut self) -> Self {
        self.trigger = DirtyTrigger::Animated;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_wildcard() {
        assert!(SlotDataType::Any.accepts(SlotDataType::Image));
        assert!(SlotDataType::Float.accepts(SlotDataType::Any));
        assert!(SlotDataType::Float.accepts(SlotDataType::Float));
        assert!(!SlotDataType::Float.accepts(SlotDataType::Image));
    }

    #[test]
    fn test_input_definition_builder() {
        let def = InputDefinition::multi("options", "Options", SlotDataType::Any)
            .with_index_policy(IndexPolicy::Clamp);
        assert!(def.multi);
        assert_eq!(def.index_policy, IndexPolicy::Clamp);
        assert!(def.default.is_none());
    }

    #[test]
    fn test_output_definition_animated() {
        let def = OutputDefinition::computed("time", "Time", SlotDataType::Float).animated();
        assert_eq!(def.trigger, DirtyTrigger::Animated);
        assert!(def.computed);
    }
}
