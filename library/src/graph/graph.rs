//! Graph container and mutation operations.
//!
//! The graph is just the set of node instances; connections live on the
//! consumer-side input ports as identifier-based back-references. Every
//! mutation that changes what a node's outputs depend on marks the affected
//! output slots dirty as part of the same operation.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;
use uuid::Uuid;

use crate::error::EvaluationError;
use crate::evaluation::dirty::DirtyTrigger;
use crate::operator::OperatorCatalog;

use super::connection::SlotRef;
use super::node::{Diagnostic, InputKind, MultiLink, NodeInstance};
use super::value::SlotValue;

/// The in-memory node graph for one document.
#[derive(Default)]
pub struct Graph {
    nodes: HashMap<Uuid, NodeInstance>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate an operator kind from the catalog and add it as a node.
    pub fn add_node(
        &mut self,
        catalog: &OperatorCatalog,
        type_id: &str,
    ) -> Result<Uuid, EvaluationError> {
        let operator = catalog
            .get(type_id)
            .ok_or_else(|| EvaluationError::UnknownOperator(type_id.to_string()))?;
        let node = NodeInstance::from_definition(&operator.definition());
        let id = node.id;
        self.nodes.insert(id, node);
        debug!("Added node {} ({})", id, type_id);
        Ok(id)
    }

    /// Insert a pre-built node instance (used by loaders and tests).
    pub fn insert(&mut self, node: NodeInstance) -> Uuid {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: Uuid) -> Option<&NodeInstance> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The error badge for a node, if its last recomputation failed.
    pub fn diagnostic(&self, node_id: Uuid) -> Option<&Diagnostic> {
        self.nodes.get(&node_id).and_then(|n| n.diagnostic())
    }

    /// Current version counter of a slot, if it exists.
    pub(crate) fn slot_version(&self, slot: &SlotRef) -> Option<u64> {
        self.nodes
            .get(&slot.node_id)
            .and_then(|n| n.output(&slot.slot_name))
            .map(|s| s.version)
    }

    // -----------------------------------------------------------------------
    // Connection mutation
    // -----------------------------------------------------------------------

    /// Wire an output slot into a single input port.
    ///
    /// Marks the consumer's outputs and everything transitively downstream
    /// dirty in the same operation. Cycles are not rejected here — half-built
    /// graphs are legal at edit time and cycles are reported at evaluation.
    pub fn connect(
        &mut self,
        from: &SlotRef,
        to_node: Uuid,
        to_input: &str,
    ) -> Result<(), EvaluationError> {
        let data_type = self.validate_endpoints(from, to_node, to_input)?;

        let port = self
            .nodes
            .get_mut(&to_node)
            .and_then(|n| n.input_mut(to_input))
            .ok_or_else(|| EvaluationError::SlotNotFound(to_input.to_string()))?;

        match &mut port.kind {
            InputKind::Single { connection, .. } => {
                if !port.data_type.accepts(data_type) {
                    return Err(EvaluationError::TypeMismatch(format!(
                        "cannot connect {:?} output to {:?} input '{}'",
                        data_type, port.data_type, to_input
                    )));
                }
                *connection = Some(from.clone());
            }
            InputKind::Multi { .. } => {
                return Err(EvaluationError::InvalidConnection(format!(
                    "input '{}' is a multi input; use append_multi_input",
                    to_input
                )));
            }
        }

        debug!("Connected {} -> {}.{}", from, to_node, to_input);
        self.mark_downstream_dirty(to_node);
        Ok(())
    }

    /// Clear a single input's connection; the next pull resolves to the
    /// locally owned default.
    pub fn disconnect(&mut self, node_id: Uuid, input: &str) -> Result<(), EvaluationError> {
        let port = self
            .nodes
            .get_mut(&node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?
            .input_mut(input)
            .ok_or_else(|| EvaluationError::SlotNotFound(input.to_string()))?;

        match &mut port.kind {
            InputKind::Single { connection, .. } => {
                *connection = None;
            }
            InputKind::Multi { .. } => {
                return Err(EvaluationError::InvalidConnection(format!(
                    "input '{}' is a multi input; use remove_multi_input",
                    input
                )));
            }
        }

        debug!("Disconnected {}.{}", node_id, input);
        self.mark_downstream_dirty(node_id);
        Ok(())
    }

    /// Append a connection to an ordered fan-in. Returns the stable identity
    /// of the new link.
    pub fn append_multi_input(
        &mut self,
        from: &SlotRef,
        to_node: Uuid,
        to_input: &str,
    ) -> Result<Uuid, EvaluationError> {
        let data_type = self.validate_endpoints(from, to_node, to_input)?;

        let port = self
            .nodes
            .get_mut(&to_node)
            .and_then(|n| n.input_mut(to_input))
            .ok_or_else(|| EvaluationError::SlotNotFound(to_input.to_string()))?;

        if !port.data_type.accepts(data_type) {
            return Err(EvaluationError::TypeMismatch(format!(
                "cannot connect {:?} output to {:?} input '{}'",
                data_type, port.data_type, to_input
            )));
        }

        let link_id = match &mut port.kind {
            InputKind::Multi { links } => {
                let link = MultiLink::new(from.clone());
                let id = link.id;
                links.push(link);
                id
            }
            InputKind::Single { .. } => {
                return Err(EvaluationError::InvalidConnection(format!(
                    "input '{}' is a single input; use connect",
                    to_input
                )));
            }
        };

        debug!("Appended {} -> {}.{} [{}]", from, to_node, to_input, link_id);
        self.mark_downstream_dirty(to_node);
        Ok(link_id)
    }

    /// Remove the fan-in connection at `index`. Surviving links keep their
    /// identities and relative order.
    pub fn remove_multi_input(
        &mut self,
        node_id: Uuid,
        input: &str,
        index: usize,
    ) -> Result<(), EvaluationError> {
        let port = self
            .nodes
            .get_mut(&node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?
            .input_mut(input)
            .ok_or_else(|| EvaluationError::SlotNotFound(input.to_string()))?;

        match &mut port.kind {
            InputKind::Multi { links } => {
                if index >= links.len() {
                    return Err(EvaluationError::InvalidConnection(format!(
                        "index {} out of range for input '{}' ({} links)",
                        index,
                        input,
                        links.len()
                    )));
                }
                links.remove(index);
            }
            InputKind::Single { .. } => {
                return Err(EvaluationError::InvalidConnection(format!(
                    "input '{}' is a single input; use disconnect",
                    input
                )));
            }
        }

        self.mark_downstream_dirty(node_id);
        Ok(())
    }

    /// Shared endpoint validation for connection edits. Returns the source
    /// slot's data type.
    fn validate_endpoints(
        &self,
        from: &SlotRef,
        to_node: Uuid,
        to_input: &str,
    ) -> Result<super::connection::SlotDataType, EvaluationError> {
        if from.node_id == to_node {
            return Err(EvaluationError::InvalidConnection(
                "cannot connect a node to itself".to_string(),
            ));
        }
        let source = self
            .nodes
            .get(&from.node_id)
            .ok_or(EvaluationError::NodeNotFound(from.node_id))?
            .output(&from.slot_name)
            .ok_or_else(|| EvaluationError::SlotNotFound(from.slot_name.clone()))?;
        let target = self
            .nodes
            .get(&to_node)
            .ok_or(EvaluationError::NodeNotFound(to_node))?;
        target
            .input(to_input)
            .ok_or_else(|| EvaluationError::SlotNotFound(to_input.to_string()))?;
        Ok(source.data_type)
    }

    // -----------------------------------------------------------------------
    // Parameter and value edits
    // -----------------------------------------------------------------------

    /// Set a node parameter and mark the node's computed outputs dirty.
    /// Downstream slots discover the change lazily on their next pull.
    pub fn set_param(
        &mut self,
        node_id: Uuid,
        name: &str,
        value: SlotValue,
    ) -> Result<(), EvaluationError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?;
        node.params.insert(name.to_string(), value);
        for slot in node.outputs.iter_mut().filter(|s| s.computed) {
            slot.flag.mark(DirtyTrigger::OnChange);
        }
        Ok(())
    }

    /// Set a single input's default value. Overridden while a connection is
    /// present, but kept so a later disconnect reverts to it.
    pub fn set_input_default(
        &mut self,
        node_id: Uuid,
        input: &str,
        value: SlotValue,
    ) -> Result<(), EvaluationError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?;
        let port = node
            .input_mut(input)
            .ok_or_else(|| EvaluationError::SlotNotFound(input.to_string()))?;
        match &mut port.kind {
            InputKind::Single { default, .. } => {
                *default = value;
            }
            InputKind::Multi { .. } => {
                return Err(EvaluationError::InvalidConnection(format!(
                    "input '{}' is a multi input and has no default",
                    input
                )));
            }
        }
        for slot in node.outputs.iter_mut().filter(|s| s.computed) {
            slot.flag.mark(DirtyTrigger::OnChange);
        }
        Ok(())
    }

    /// Assign a constant slot's value directly (editor UI writes). Bumps the
    /// slot version so dependents notice on their next pull.
    pub fn set_slot_value(
        &mut self,
        slot_ref: &SlotRef,
        value: SlotValue,
    ) -> Result<(), EvaluationError> {
        let slot = self
            .nodes
            .get_mut(&slot_ref.node_id)
            .ok_or(EvaluationError::NodeNotFound(slot_ref.node_id))?
            .output_mut(&slot_ref.slot_name)
            .ok_or_else(|| EvaluationError::SlotNotFound(slot_ref.slot_name.clone()))?;
        if slot.computed {
            return Err(EvaluationError::InvalidParameter(format!(
                "slot '{}' is computed by its operator and cannot be assigned",
                slot_ref
            )));
        }
        if let Some(dt) = value.data_type() {
            if !slot.data_type.accepts(dt) {
                return Err(EvaluationError::TypeMismatch(format!(
                    "cannot assign {:?} value to {:?} slot '{}'",
                    dt, slot.data_type, slot_ref
                )));
            }
        }
        slot.value = value;
        slot.version += 1;
        Ok(())
    }

    /// External invalidation entry for animation-curve collaborators: mark a
    /// slot stale outside the pull protocol. No downstream walk happens here;
    /// propagation is lazy.
    pub fn mark_slot_dirty(
        &mut self,
        slot_ref: &SlotRef,
        trigger: DirtyTrigger,
    ) -> Result<(), EvaluationError> {
        let slot = self
            .nodes
            .get_mut(&slot_ref.node_id)
            .ok_or(EvaluationError::NodeNotFound(slot_ref.node_id))?
            .output_mut(&slot_ref.slot_name)
            .ok_or_else(|| EvaluationError::SlotNotFound(slot_ref.slot_name.clone()))?;
        slot.flag.mark(trigger);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Node lifecycle
    // -----------------------------------------------------------------------

    /// Remove a node and clean up every reference to it.
    pub fn remove_node(&mut self, node_id: Uuid) -> Result<NodeInstance, EvaluationError> {
        let node = self
            .nodes
            .remove(&node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?;
        self.on_node_removed(node_id);
        Ok(node)
    }

    /// Clear every input connection that referenced the removed node so the
    /// next pull falls back to defaults, and mark the affected consumers (and
    /// their transitive downstream) dirty. Idempotent; also callable by an
    /// external graph-management collaborator.
    pub fn on_node_removed(&mut self, node_id: Uuid) {
        let mut affected = Vec::new();
        for node in self.nodes.values_mut() {
            let mut pruned = false;
            for port in &mut node.inputs {
                pruned |= port.prune_node(node_id);
            }
            if pruned {
                affected.push(node.id);
            }
        }
        debug!(
            "Node {} removed; {} consumer(s) reverted to defaults",
            node_id,
            affected.len()
        );
        for id in affected {
            self.mark_downstream_dirty(id);
        }
    }

    // -----------------------------------------------------------------------
    // Invalidation
    // -----------------------------------------------------------------------

    /// Mark the computed outputs of `start` and of every transitive consumer
    /// dirty. Breadth-first over consumer back-pointers; safe on cyclic
    /// topologies.
    pub fn mark_downstream_dirty(&mut self, start: Uuid) {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&current) {
                for slot in node.outputs.iter_mut().filter(|s| s.computed) {
                    slot.flag.mark(DirtyTrigger::OnChange);
                }
            }
            for consumer in self.consumers_of(current) {
                queue.push_back(consumer);
            }
        }
    }

    /// Node ids whose inputs reference any output of `node_id`.
    pub fn consumers_of(&self, node_id: Uuid) -> Vec<Uuid> {
        self.nodes
            .values()
            .filter(|n| {
                n.inputs
                    .iter()
                    .any(|p| p.connections().any(|c| c.node_id == node_id))
            })
            .map(|n| n.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::OperatorCatalog;

    fn setup() -> (Graph, OperatorCatalog) {
        (Graph::new(), OperatorCatalog::with_builtins())
    }

    #[test]
    fn test_add_node_unknown_operator() {
        let (mut graph, catalog) = setup();
        let result = graph.add_node(&catalog, "does.not.exist");
        assert!(matches!(result, Err(EvaluationError::UnknownOperator(_))));
    }

    #[test]
    fn test_connect_and_disconnect() {
        let (mut graph, catalog) = setup();
        let value = graph.add_node(&catalog, "value.float").unwrap();
        let add = graph.add_node(&catalog, "math.add").unwrap();

        graph
            .connect(&SlotRef::new(value, "value"), add, "a")
            .unwrap();
        assert_eq!(graph.consumers_of(value), vec![add]);

        graph.disconnect(add, "a").unwrap();
        assert!(graph.consumers_of(value).is_empty());
    }

    #[test]
    fn test_connect_rejects_self_connection() {
        let (mut graph, catalog) = setup();
        let add = graph.add_node(&catalog, "math.add").unwrap();
        let result = graph.connect(&SlotRef::new(add, "result"), add, "a");
        assert!(matches!(result, Err(EvaluationError::InvalidConnection(_))));
    }

    #[test]
    fn test_connect_rejects_type_mismatch() {
        let (mut graph, catalog) = setup();
        let text = graph.add_node(&catalog, "value.text").unwrap();
        let add = graph.add_node(&catalog, "math.add").unwrap();
        let result = graph.connect(&SlotRef::new(text, "value"), add, "a");
        assert!(matches!(result, Err(EvaluationError::TypeMismatch(_))));
    }

    #[test]
    fn test_connect_marks_downstream_dirty() {
        let (mut graph, catalog) = setup();
        let v = graph.add_node(&catalog, "value.float").unwrap();
        let add = graph.add_node(&catalog, "math.add").unwrap();
        let scale = graph.add_node(&catalog, "math.scale").unwrap();
        graph
            .connect(&SlotRef::new(add, "result"), scale, "value")
            .unwrap();

        // Settle the flags, then edit a connection upstream of both.
        for node_id in [add, scale] {
            let node = graph.node_mut(node_id).unwrap();
            for slot in &mut node.outputs {
                slot.flag.clear(1);
            }
        }
        graph.connect(&SlotRef::new(v, "value"), add, "a").unwrap();

        assert!(graph.node(add).unwrap().output("result").unwrap().is_dirty());
        assert!(
            graph
                .node(scale)
                .unwrap()
                .output("result")
                .unwrap()
                .is_dirty()
        );
    }

    #[test]
    fn test_multi_input_ordering_and_stable_ids() {
        let (mut graph, catalog) = setup();
        let a = graph.add_node(&catalog, "value.float").unwrap();
        let b = graph.add_node(&catalog, "value.float").unwrap();
        let c = graph.add_node(&catalog, "value.float").unwrap();
        let select = graph.add_node(&catalog, "select.index").unwrap();

        let l1 = graph
            .append_multi_input(&SlotRef::new(a, "value"), select, "options")
            .unwrap();
        let _l2 = graph
            .append_multi_input(&SlotRef::new(b, "value"), select, "options")
            .unwrap();
        let l3 = graph
            .append_multi_input(&SlotRef::new(c, "value"), select, "options")
            .unwrap();

        graph.remove_multi_input(select, "options", 1).unwrap();

        let port = graph.node(select).unwrap().input("options").unwrap();
        match &port.kind {
            InputKind::Multi { links } => {
                assert_eq!(links.len(), 2);
                assert_eq!(links[0].id, l1);
                assert_eq!(links[0].source.node_id, a);
                assert_eq!(links[1].id, l3);
                assert_eq!(links[1].source.node_id, c);
            }
            _ => panic!("expected multi input"),
        }
    }

    #[test]
    fn test_remove_multi_input_out_of_range() {
        let (mut graph, catalog) = setup();
        let select = graph.add_node(&catalog, "select.index").unwrap();
        let result = graph.remove_multi_input(select, "options", 0);
        assert!(matches!(result, Err(EvaluationError::InvalidConnection(_))));
    }

    #[test]
    fn test_remove_node_prunes_references() {
        let (mut graph, catalog) = setup();
        let v = graph.add_node(&catalog, "value.float").unwrap();
        let add = graph.add_node(&catalog, "math.add").unwrap();
        graph.connect(&SlotRef::new(v, "value"), add, "a").unwrap();

        graph.remove_node(v).unwrap();

        assert!(graph.node(v).is_none());
        let port = graph.node(add).unwrap().input("a").unwrap();
        assert_eq!(port.connections().count(), 0);
    }

    #[test]
    fn test_set_slot_value_rejects_computed_slot() {
        let (mut graph, catalog) = setup();
        let add = graph.add_node(&catalog, "math.add").unwrap();
        let result = graph.set_slot_value(&SlotRef::new(add, "result"), SlotValue::Float(1.0));
        assert!(matches!(result, Err(EvaluationError::InvalidParameter(_))));
    }

    #[test]
    fn test_set_slot_value_bumps_version() {
        let (mut graph, catalog) = setup();
        let v = graph.add_node(&catalog, "value.float").unwrap();
        let slot_ref = SlotRef::new(v, "value");
        let before = graph.slot_version(&slot_ref).unwrap();
        graph
            .set_slot_value(&slot_ref, SlotValue::Float(4.0))
            .unwrap();
        assert_eq!(graph.slot_version(&slot_ref).unwrap(), before + 1);
    }
}
