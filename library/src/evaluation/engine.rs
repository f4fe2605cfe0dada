//! Evaluation engine — the evaluate-or-cache pull traversal.
//!
//! One engine drives one frame loop: `begin_pass` stamps a fresh pass
//! identity, and `evaluate` performs a synchronous depth-first pull from the
//! requested slot. Within one pass every output slot is recomputed at most
//! once, and every consumer that pulls it observes the same cached value.
//!
//! The protocol is strictly single-threaded. If independent subgraphs are
//! ever farmed out to worker threads, the invariant to preserve is that no
//! two threads recompute slots sharing a transitive dependency — the safe
//! partition boundary lies between nodes whose reachable sets are disjoint.

use std::collections::HashSet;

use log::{trace, warn};

use crate::error::EvaluationError;
use crate::graph::connection::SlotRef;
use crate::graph::graph::Graph;
use crate::graph::value::SlotValue;
use crate::operator::OperatorCatalog;

use super::context::EvalContext;
use super::scope::ComputeScope;

/// Drives pull-based evaluation of a graph against an operator catalog.
pub struct EvalEngine {
    catalog: OperatorCatalog,
    pass_counter: u64,
}

impl EvalEngine {
    pub fn new(catalog: OperatorCatalog) -> Self {
        Self {
            catalog,
            pass_counter: 0,
        }
    }

    /// An engine with all built-in operators registered.
    pub fn with_builtins() -> Self {
        Self::new(OperatorCatalog::with_builtins())
    }

    pub fn catalog(&self) -> &OperatorCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut OperatorCatalog {
        &mut self.catalog
    }

    /// Open a new evaluation pass for one frame. Every root pull of that
    /// frame shares the returned context (and thus the pass identity).
    pub fn begin_pass(&mut self, global_time: f64, frame: u64) -> EvalContext {
        self.pass_counter += 1;
        EvalContext::new(global_time, frame, self.pass_counter)
    }

    /// Pull the current value of an output slot.
    ///
    /// This is the sole read entry point for consumers. Node-local failures
    /// are contained at the failing slot: the last-good cached value is
    /// returned and the error is attached to the node as a diagnostic (see
    /// [`Graph::diagnostic`]). Structural failures on the requested slot
    /// itself (unknown node, unknown slot name) are returned as errors.
    pub fn evaluate(
        &self,
        graph: &mut Graph,
        slot: &SlotRef,
        ctx: &EvalContext,
    ) -> Result<SlotValue, EvaluationError> {
        let mut chain = Vec::new();
        evaluate_slot(graph, &self.catalog, &mut chain, slot, *ctx)
    }

    /// Convenience wrapper naming the slot by node and output name.
    pub fn evaluate_output(
        &self,
        graph: &mut Graph,
        node_id: uuid::Uuid,
        output: &str,
        ctx: &EvalContext,
    ) -> Result<SlotValue, EvaluationError> {
        self.evaluate(graph, &SlotRef::new(node_id, output), ctx)
    }
}

/// What the slot inspection decided before any mutation happens.
enum Action {
    /// Return the cache unchanged (constant slot, or already refreshed in
    /// this pass).
    Cached(SlotValue),
    /// Reentrant pull of a slot currently being recomputed.
    Cycle,
    /// Dirty check against the recorded upstream pulls; `force` skips it.
    Check {
        upstreams: Vec<(SlotRef, u64)>,
        force: bool,
    },
}

/// Core recursive traversal: refresh one slot for the current pass and return
/// its value.
pub(crate) fn evaluate_slot(
    graph: &mut Graph,
    catalog: &OperatorCatalog,
    chain: &mut Vec<SlotRef>,
    slot_ref: &SlotRef,
    ctx: EvalContext,
) -> Result<SlotValue, EvaluationError> {
    let action = {
        let node = graph.node(slot_ref.node_id).ok_or_else(|| {
            EvaluationError::DanglingConnection(format!("node {} does not exist", slot_ref.node_id))
        })?;
        let slot = node
            .output(&slot_ref.slot_name)
            .ok_or_else(|| EvaluationError::SlotNotFound(slot_ref.slot_name.clone()))?;

        if !slot.computed {
            // Pure constant/default holder; never dirty.
            Action::Cached(slot.value.clone())
        } else if slot.flag.seen_pass(ctx.pass) {
            trace!("{}cache hit {}", Indent(ctx.depth), slot_ref);
            Action::Cached(slot.value.clone())
        } else if slot.flag.is_evaluating() {
            Action::Cycle
        } else {
            Action::Check {
                upstreams: slot.upstream_versions.clone(),
                force: slot.flag.is_dirty() || slot.version == 0,
            }
        }
    };

    match action {
        Action::Cached(value) => return Ok(value),
        Action::Cycle => {
            let error = EvaluationError::CyclicDependency(format!(
                "slot {} pulled while recomputing",
                slot_ref
            ));
            // Every slot on the chain from the reentered one onward is part
            // of the cycle; badge them all.
            let start = chain.iter().position(|r| r == slot_ref).unwrap_or(0);
            for member in chain[start..].to_vec() {
                if let Some(node) = graph.node_mut(member.node_id) {
                    node.record_diagnostic(error.clone(), ctx.pass);
                }
            }
            warn!("Cyclic dependency at {}", slot_ref);
            return Err(error);
        }
        Action::Check { upstreams, force } => {
            // Read-only staleness check. Nothing is recomputed here: a stale
            // upstream is evaluated inside this slot's own recomputation, so
            // it observes any local time the operator derives first.
            let mut visited = HashSet::new();
            let stale = force
                || upstreams.iter().any(|(source, seen_version)| {
                    graph.slot_version(source) != Some(*seen_version)
                        || slot_is_stale(graph, source, &mut visited)
                });
            if !stale {
                // Verified fresh; stamp the pass so fan-out consumers hit
                // the cache directly.
                if let Some(slot) = graph
                    .node_mut(slot_ref.node_id)
                    .and_then(|n| n.output_mut(&slot_ref.slot_name))
                {
                    slot.flag.stamp_pass(ctx.pass);
                    return Ok(slot.value.clone());
                }
                return Err(EvaluationError::DanglingConnection(format!(
                    "slot {} vanished during evaluation",
                    slot_ref
                )));
            }
        }
    }

    recompute_slot(graph, catalog, chain, slot_ref, ctx)
}

/// Transitive staleness check over recorded upstream pulls. Pure inspection:
/// versions only move when a recomputation commits, and none happens here.
fn slot_is_stale(graph: &Graph, slot_ref: &SlotRef, visited: &mut HashSet<SlotRef>) -> bool {
    if !visited.insert(slot_ref.clone()) {
        return false;
    }
    let Some(slot) = graph
        .node(slot_ref.node_id)
        .and_then(|n| n.output(&slot_ref.slot_name))
    else {
        // Vanished producer; the consumer recomputes and surfaces it.
        return true;
    };
    if !slot.computed {
        return false;
    }
    if slot.flag.is_dirty() || slot.version == 0 {
        return true;
    }
    slot.upstream_versions.iter().any(|(source, seen_version)| {
        graph.slot_version(source) != Some(*seen_version) || slot_is_stale(graph, source, visited)
    })
}

/// Invoke the operator's recomputation procedure for one slot and commit the
/// outcome. At most one recomputation (or attempt) happens per slot per pass.
fn recompute_slot(
    graph: &mut Graph,
    catalog: &OperatorCatalog,
    chain: &mut Vec<SlotRef>,
    slot_ref: &SlotRef,
    ctx: EvalContext,
) -> Result<SlotValue, EvaluationError> {
    let node_id = slot_ref.node_id;
    let type_id = graph
        .node(node_id)
        .ok_or(EvaluationError::NodeNotFound(node_id))?
        .type_id
        .clone();

    trace!("{}recompute {} ({})", Indent(ctx.depth), slot_ref, type_id);

    let result = match catalog.get(&type_id) {
        Some(operator) => {
            mark_evaluating(graph, slot_ref, true)?;
            chain.push(slot_ref.clone());
            let mut scope = ComputeScope::new(graph, catalog, chain, ctx, node_id);
            let result = operator.compute(&slot_ref.slot_name, &mut scope);
            let pulled = scope.into_pulled();
            chain.pop();
            mark_evaluating(graph, slot_ref, false)?;
            result.map(|value| (value, pulled))
        }
        None => Err(EvaluationError::UnknownOperator(type_id.clone())),
    };

    let node = graph
        .node_mut(node_id)
        .ok_or(EvaluationError::NodeNotFound(node_id))?;

    match result {
        Ok((value, pulled)) => {
            let slot = node
                .output_mut(&slot_ref.slot_name)
                .ok_or_else(|| EvaluationError::SlotNotFound(slot_ref.slot_name.clone()))?;
            slot.value = value.clone();
            slot.version += 1;
            slot.upstream_versions = pulled;
            slot.flag.clear(ctx.pass);
            node.clear_stale_diagnostic(ctx.pass);
            Ok(value)
        }
        Err(error) => {
            // Containment: keep the last-good cached value rather than
            // poisoning downstream consumers, attach the error to the node,
            // and don't retry within this pass. The flag stays dirty so the
            // next pass attempts again.
            warn!("Node {} ({}) failed: {}", node_id, type_id, error);
            node.record_diagnostic(error, ctx.pass);
            let slot = node
                .output_mut(&slot_ref.slot_name)
                .ok_or_else(|| EvaluationError::SlotNotFound(slot_ref.slot_name.clone()))?;
            slot.flag.stamp_pass(ctx.pass);
            Ok(slot.value.clone())
        }
    }
}

fn mark_evaluating(
    graph: &mut Graph,
    slot_ref: &SlotRef,
    evaluating: bool,
) -> Result<(), EvaluationError> {
    let slot = graph
        .node_mut(slot_ref.node_id)
        .ok_or(EvaluationError::NodeNotFound(slot_ref.node_id))?
        .output_mut(&slot_ref.slot_name)
        .ok_or_else(|| EvaluationError::SlotNotFound(slot_ref.slot_name.clone()))?;
    if evaluating {
        slot.flag.begin_eval();
    } else {
        slot.flag.end_eval();
    }
    Ok(())
}

struct Indent(u32);

impl std::fmt::Display for Indent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for _ in 0..self.0 {
            f.write_str("  ")?;
        }
        Ok(())
    }
}
