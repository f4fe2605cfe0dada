//! Node instances, output slots and input ports.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::EvaluationError;
use crate::evaluation::dirty::{DirtyFlag, DirtyTrigger};
use crate::operator::OperatorDefinition;

use super::connection::{IndexPolicy, SlotDataType, SlotRef};
use super::value::SlotValue;

/// One record of an ordered fan-in: a stable identity plus the upstream slot
/// it pulls from. Removing a sibling never renumbers surviving links.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiLink {
    pub id: Uuid,
    pub source: SlotRef,
}

impl MultiLink {
    pub fn new(source: SlotRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
        }
    }
}

/// Consumer-side state of an input port: either a single connection with a
/// locally owned default, or an ordered fan-in of connections.
#[derive(Clone, Debug)]
pub enum InputKind {
    Single {
        /// Resolved when no connection is present; settable at any time and
        /// overridden while connected.
        default: SlotValue,
        /// Weak back-reference to the producing slot.
        connection: Option<SlotRef>,
    },
    Multi {
        /// Insertion order is the fan-in order.
        links: Vec<MultiLink>,
    },
}

/// An input port on a node instance.
#[derive(Clone, Debug)]
pub struct InputPort {
    pub name: String,
    pub data_type: SlotDataType,
    pub index_policy: IndexPolicy,
    pub kind: InputKind,
}

impl InputPort {
    /// Iterate the upstream slot references currently wired into this port.
    pub fn connections(&self) -> impl Iterator<Item = &SlotRef> {
        let (single, multi) = match &self.kind {
            InputKind::Single { connection, .. } => (connection.as_ref(), None),
            InputKind::Multi { links } => (None, Some(links.iter().map(|l| &l.source))),
        };
        single.into_iter().chain(multi.into_iter().flatten())
    }

    /// Drop every connection that references the given node. Returns true if
    /// anything was removed.
    pub(crate) fn prune_node(&mut self, node_id: Uuid) -> bool {
        match &mut self.kind {
            InputKind::Single { connection, .. } => {
                if connection.as_ref().is_some_and(|c| c.node_id == node_id) {
                    *connection = None;
                    true
                } else {
                    false
                }
            }
            InputKind::Multi { links } => {
                let before = links.len();
                links.retain(|l| l.source.node_id != node_id);
                links.len() != before
            }
        }
    }
}

/// A memoized, typed producer of a value.
///
/// The cached value is exclusively owned by the slot and mutated only by its
/// node's recomputation procedure (or `Graph::set_slot_value` for constant
/// slots). `upstream_versions` records which slots the last recomputation
/// actually pulled, and at which version, so staleness can be discovered on
/// the next pull without recomputing anything upstream that didn't change.
#[derive(Clone, Debug)]
pub struct OutputSlot {
    pub name: String,
    pub data_type: SlotDataType,
    pub(crate) value: SlotValue,
    pub(crate) version: u64,
    pub(crate) flag: DirtyFlag,
    pub(crate) upstream_versions: Vec<(SlotRef, u64)>,
    pub(crate) computed: bool,
}

impl OutputSlot {
    pub(crate) fn new(
        name: &str,
        data_type: SlotDataType,
        trigger: DirtyTrigger,
        computed: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            value: SlotValue::default_for(data_type),
            version: 0,
            flag: DirtyFlag::new(trigger),
            upstream_versions: Vec::new(),
            computed,
        }
    }

    /// The current cached value (possibly stale; consumers go through the
    /// engine, this is for inspection).
    pub fn cached_value(&self) -> &SlotValue {
        &self.value
    }

    /// Bumped on every successful recomputation or external assignment.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub fn is_dirty(&self) -> bool {
        self.flag.is_dirty()
    }
}

/// A contained node-local error, kept until a later pass succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub error: EvaluationError,
    /// The evaluation pass in which the error was recorded.
    pub pass: u64,
}

/// A graph vertex: parameters, input ports and output slots.
///
/// A node's outputs are recomputed only from values obtained through its
/// declared inputs and the evaluation context — there is no hidden coupling
/// between sibling nodes.
#[derive(Clone, Debug)]
pub struct NodeInstance {
    pub id: Uuid,
    /// References an operator registered in the `OperatorCatalog`.
    /// Examples: "math.add", "time.clock", "select.index"
    pub type_id: String,
    pub params: HashMap<String, SlotValue>,
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<OutputSlot>,
    pub(crate) diagnostic: Option<Diagnostic>,
}

impl NodeInstance {
    /// Instantiate ports and parameter defaults from an operator definition.
    pub fn from_definition(def: &OperatorDefinition) -> Self {
        let inputs = def
            .inputs
            .iter()
            .map(|d| InputPort {
                name: d.name.clone(),
                data_type: d.data_type,
                index_policy: d.index_policy,
                kind: if d.multi {
                    InputKind::Multi { links: Vec::new() }
                } else {
                    InputKind::Single {
                        default: d.default.clone(),
                        connection: None,
                    }
                },
            })
            .collect();

        let outputs = def
            .outputs
            .iter()
            .map(|d| OutputSlot::new(&d.name, d.data_type, d.trigger, d.computed))
            .collect();

        Self {
            id: Uuid::new_v4(),
            type_id: def.type_id.clone(),
            params: def.params.iter().cloned().collect(),
            inputs,
            outputs,
            diagnostic: None,
        }
    }

    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut InputPort> {
        self.inputs.iter_mut().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSlot> {
        self.outputs.iter().find(|s| s.name == name)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut OutputSlot> {
        self.outputs.iter_mut().find(|s| s.name == name)
    }

    /// The error badge for this node, if its last recomputation failed.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }

    pub(crate) fn record_diagnostic(&mut self, error: EvaluationError, pass: u64) {
        self.diagnostic = Some(Diagnostic { error, pass });
    }

    /// Clear a diagnostic left over from an earlier pass. A diagnostic
    /// recorded during the current pass (cycle detection) survives a
    /// recomputation that completed on stale data.
    pub(crate) fn clear_stale_diagnostic(&mut self, pass: u64) {
        if self.diagnostic.as_ref().is_some_and(|d| d.pass < pass) {
            self.diagnostic = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::connection::{InputDefinition, OutputDefinition};

    fn test_definition() -> OperatorDefinition {
        OperatorDefinition::new("test.op", "Test Op")
            .with_param("amount", SlotValue::Float(1.0))
            .with_input(
                InputDefinition::single("value", "Value", SlotDataType::Float)
                    .with_default(SlotValue::Float(0.5)),
            )
            .with_input(InputDefinition::multi("layers", "Layers", SlotDataType::Any))
            .with_output(OutputDefinition::computed("result", "Result", SlotDataType::Float))
    }

    #[test]
    fn test_from_definition_ports() {
        let node = NodeInstance::from_definition(&test_definition());
        assert_eq!(node.type_id, "test.op");
        assert_eq!(node.inputs.len(), 2);
        assert_eq!(node.outputs.len(), 1);
        assert_eq!(node.params.get("amount"), Some(&SlotValue::Float(1.0)));

        match &node.input("value").unwrap().kind {
            InputKind::Single { default, connection } => {
                assert_eq!(*default, SlotValue::Float(0.5));
                assert!(connection.is_none());
            }
            _ => panic!("expected single input"),
        }
        match &node.input("layers").unwrap().kind {
            InputKind::Multi { links } => assert!(links.is_empty()),
            _ => panic!("expected multi input"),
        }
    }

    #[test]
    fn test_new_slot_starts_dirty_with_type_default() {
        let node = NodeInstance::from_definition(&test_definition());
        let slot = node.output("result").unwrap();
        assert!(slot.is_dirty());
        assert_eq!(slot.version(), 0);
        assert_eq!(*slot.cached_value(), SlotValue::Float(0.0));
    }

    #[test]
    fn test_prune_node_clears_matching_connections() {
        let mut node = NodeInstance::from_definition(&test_definition());
        let other = Uuid::new_v4();
        let unrelated = Uuid::new_v4();

        if let InputKind::Single { connection, .. } = &mut node.input_mut("value").unwrap().kind {
            *connection = Some(SlotRef::new(other, "out"));
        }
        if let InputKind::Multi { links } = &mut node.input_mut("layers").unwrap().kind {
            links.push(MultiLink::new(SlotRef::new(other, "out")));
            links.push(MultiLink::new(SlotRef::new(unrelated, "out")));
        }

        assert!(node.input_mut("value").unwrap().prune_node(other));
        assert!(node.input_mut("layers").unwrap().prune_node(other));
        assert_eq!(node.input("layers").unwrap().connections().count(), 1);
        assert!(!node.input_mut("value").unwrap().prune_node(other));
    }
}
