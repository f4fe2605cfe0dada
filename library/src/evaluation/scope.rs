//! ComputeScope — what an operator's recomputation procedure sees.
//!
//! The scope resolves input pulls against the graph (connection or default),
//! threads the evaluation context into upstream recursion, and records which
//! upstream slots were actually pulled so the engine can later check
//! staleness without recomputing anything.

use uuid::Uuid;

use crate::error::EvaluationError;
use crate::graph::connection::{IndexPolicy, SlotRef};
use crate::graph::graph::Graph;
use crate::graph::node::InputKind;
use crate::graph::value::SlotValue;
use crate::operator::OperatorCatalog;

use super::context::EvalContext;
use super::engine::evaluate_slot;

pub struct ComputeScope<'a> {
    graph: &'a mut Graph,
    catalog: &'a OperatorCatalog,
    /// Active evaluation chain, shared across the whole pull traversal for
    /// cycle detection and reporting.
    chain: &'a mut Vec<SlotRef>,
    ctx: EvalContext,
    node_id: Uuid,
    pulled: Vec<(SlotRef, u64)>,
}

impl<'a> ComputeScope<'a> {
    pub(crate) fn new(
        graph: &'a mut Graph,
        catalog: &'a OperatorCatalog,
        chain: &'a mut Vec<SlotRef>,
        ctx: EvalContext,
        node_id: Uuid,
    ) -> Self {
        Self {
            graph,
            catalog,
            chain,
            ctx,
            node_id,
            pulled: Vec::new(),
        }
    }

    /// The id of the node being recomputed.
    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// The evaluation context for this recomputation.
    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Derive a new local time for this recomputation. Every subsequent pull
    /// observes the derived time, so all inputs share the same notion of
    /// "current time" within one pass. The caller's context is unaffected.
    pub fn set_local_time(&mut self, local_time: f64) {
        self.ctx = self.ctx.with_local_time(local_time);
    }

    /// Resolve a single input: pull the connected slot's value, or return the
    /// locally owned default when unconnected.
    pub fn input(&mut self, name: &str) -> Result<SlotValue, EvaluationError> {
        match self.single_connection(name)? {
            (Some(source), _) => self.pull(&source),
            (None, default) => Ok(default),
        }
    }

    /// Like [`input`](Self::input), but a port that is unconnected and has no
    /// usable default is a `MissingInput` error.
    pub fn require_input(&mut self, name: &str) -> Result<SlotValue, EvaluationError> {
        match self.single_connection(name)? {
            (Some(source), _) => self.pull(&source),
            (None, default) if !default.is_none() => Ok(default),
            (None, _) => Err(EvaluationError::MissingInput(format!(
                "input '{}' is unconnected and has no default",
                name
            ))),
        }
    }

    /// Resolve a multi input: every connection in insertion order. An empty
    /// fan-in yields an empty vector, which consumers handle without failing.
    pub fn input_values(&mut self, name: &str) -> Result<Vec<SlotValue>, EvaluationError> {
        let sources = self.multi_connections(name)?;
        let mut values = Vec::with_capacity(sources.len());
        for source in &sources {
            values.push(self.pull(source)?);
        }
        Ok(values)
    }

    /// Number of connections currently wired into a multi input.
    pub fn input_count(&self, name: &str) -> Result<usize, EvaluationError> {
        Ok(self.multi_connections(name)?.len())
    }

    /// Index-based selection on a multi input, applying the port's declared
    /// out-of-range policy. Returns `None` when the fan-in is empty.
    pub fn input_at(
        &mut self,
        name: &str,
        index: i64,
    ) -> Result<Option<SlotValue>, EvaluationError> {
        let policy = self
            .port(name)?
            .map(|p| p.index_policy)
            .unwrap_or_default();
        let sources = self.multi_connections(name)?;
        if sources.is_empty() {
            return Ok(None);
        }
        let len = sources.len() as i64;
        let resolved = match policy {
            IndexPolicy::Wrap => index.rem_euclid(len),
            IndexPolicy::Clamp => index.clamp(0, len - 1),
        } as usize;
        self.pull(&sources[resolved]).map(Some)
    }

    /// Read a node parameter.
    pub fn param(&self, name: &str) -> Result<SlotValue, EvaluationError> {
        self.graph
            .node(self.node_id)
            .ok_or(EvaluationError::NodeNotFound(self.node_id))?
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| {
                EvaluationError::InvalidParameter(format!("unknown parameter '{}'", name))
            })
    }

    pub fn param_float(&self, name: &str) -> Result<f64, EvaluationError> {
        match self.param(name)? {
            SlotValue::Float(v) => Ok(v),
            SlotValue::Int(v) => Ok(v as f64),
            other => Err(EvaluationError::InvalidParameter(format!(
                "parameter '{}' is not numeric (got {:?})",
                name, other
            ))),
        }
    }

    pub fn param_int(&self, name: &str) -> Result<i64, EvaluationError> {
        match self.param(name)? {
            SlotValue::Int(v) => Ok(v),
            SlotValue::Float(v) => Ok(v as i64),
            other => Err(EvaluationError::InvalidParameter(format!(
                "parameter '{}' is not numeric (got {:?})",
                name, other
            ))),
        }
    }

    /// The upstream slots pulled during this recomputation, with the versions
    /// observed. Consumed by the engine after `compute` returns.
    pub(crate) fn into_pulled(self) -> Vec<(SlotRef, u64)> {
        self.pulled
    }

    /// Evaluate an upstream slot for this pass and record the pull.
    fn pull(&mut self, source: &SlotRef) -> Result<SlotValue, EvaluationError> {
        let value = evaluate_slot(
            self.graph,
            self.catalog,
            self.chain,
            source,
            self.ctx.descend(),
        )?;
        let version = self.graph.slot_version(source).unwrap_or(0);
        self.pulled.push((source.clone(), version));
        Ok(value)
    }

    fn port(&self, name: &str) -> Result<Option<&crate::graph::node::InputPort>, EvaluationError> {
        Ok(self
            .graph
            .node(self.node_id)
            .ok_or(EvaluationError::NodeNotFound(self.node_id))?
            .input(name))
    }

    fn single_connection(
        &self,
        name: &str,
    ) -> Result<(Option<SlotRef>, SlotValue), EvaluationError> {
        let port = self
            .port(name)?
            .ok_or_else(|| EvaluationError::SlotNotFound(name.to_string()))?;
        match &port.kind {
            InputKind::Single {
                default,
                connection,
            } => Ok((connection.clone(), default.clone())),
            InputKind::Multi { .. } => Err(EvaluationError::InvalidConnection(format!(
                "input '{}' is a multi input; use input_values",
                name
            ))),
        }
    }

    fn multi_connections(&self, name: &str) -> Result<Vec<SlotRef>, EvaluationError> {
        let port = self
            .port(name)?
            .ok_or_else(|| EvaluationError::SlotNotFound(name.to_string()))?;
        match &port.kind {
            InputKind::Multi { links } => Ok(links.iter().map(|l| l.source.clone()).collect()),
            InputKind::Single { .. } => Err(EvaluationError::InvalidConnection(format!(
                "input '{}' is a single input; use input",
                name
            ))),
        }
    }
}
