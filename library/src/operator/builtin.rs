//! Built-in operators.
//!
//! A deliberately small set: enough to drive the runtime's own tests and the
//! demo binary. The full generator/filter/mesh catalog lives in operator
//! packs registered by the host application.

use std::sync::Arc;

use crate::error::EvaluationError;
use crate::evaluation::scope::ComputeScope;
use crate::graph::connection::{IndexPolicy, InputDefinition, OutputDefinition, SlotDataType};
use crate::graph::value::SlotValue;

use super::{Operator, OperatorCatalog, OperatorDefinition};

/// Register all built-in operators.
pub fn register_all(catalog: &mut OperatorCatalog) {
    catalog.register(Arc::new(FloatValue));
    catalog.register(Arc::new(TextValue));
    catalog.register(Arc::new(Add));
    catalog.register(Arc::new(Scale));
    catalog.register(Arc::new(Clock));
    catalog.register(Arc::new(TimeOffset));
    catalog.register(Arc::new(SelectIndex));
    catalog.register(Arc::new(Mix));
}

/// Constant float holder. The slot has no recomputation procedure; the
/// editor writes it via `Graph::set_slot_value`.
pub struct FloatValue;

impl Operator for FloatValue {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("value.float", "Float Value").with_output(
            OutputDefinition::constant("value", "Value", SlotDataType::Float),
        )
    }
}

/// Constant text holder.
pub struct TextValue;

impl Operator for TextValue {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("value.text", "Text Value")
            .with_output(OutputDefinition::constant("value", "Value", SlotDataType::Text))
    }
}

/// a + b.
pub struct Add;

impl Operator for Add {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("math.add", "Add")
            .with_input(
                InputDefinition::single("a", "A", SlotDataType::Float)
                    .with_default(SlotValue::Float(0.0)),
            )
            .with_input(
                InputDefinition::single("b", "B", SlotDataType::Float)
                    .with_default(SlotValue::Float(0.0)),
            )
            .with_output(OutputDefinition::computed("result", "Result", SlotDataType::Float))
    }

    fn compute(
        &self,
        _slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let a = scope.input("a")?.as_float(0.0);
        let b = scope.input("b")?.as_float(0.0);
        Ok(SlotValue::Float(a + b))
    }
}

/// value * factor, with a validated factor parameter.
pub struct Scale;

impl Operator for Scale {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("math.scale", "Scale")
            .with_param("factor", SlotValue::Float(1.0))
            .with_input(
                InputDefinition::single("value", "Value", SlotDataType::Float)
                    .with_default(SlotValue::Float(0.0)),
            )
            .with_output(OutputDefinition::computed("result", "Result", SlotDataType::Float))
    }

    fn compute(
        &self,
        _slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let factor = scope.param_float("factor")?;
        if !factor.is_finite() {
            return Err(EvaluationError::InvalidParameter(format!(
                "factor must be finite (got {})",
                factor
            )));
        }
        let value = scope.input("value")?.as_float(0.0);
        Ok(SlotValue::Float(value * factor))
    }
}

/// Animated time source: local time scaled by a rate. Stand-in for LFOs and
/// audio-reactive modulators; classified `Animated`, so it re-evaluates on
/// every pass.
pub struct Clock;

impl Operator for Clock {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("time.clock", "Clock")
            .with_param("rate", SlotValue::Float(1.0))
            .with_output(
                OutputDefinition::computed("time", "Time", SlotDataType::Float).animated(),
            )
    }

    fn compute(
        &self,
        _slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let rate = scope.param_float("rate")?;
        Ok(SlotValue::Float(scope.context().local_time * rate))
    }
}

/// Shifts local time for its upstream subgraph: derives a new context before
/// pulling, so every pull of this recomputation observes the shifted time.
pub struct TimeOffset;

impl Operator for TimeOffset {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("time.offset", "Time Offset")
            .with_param("offset", SlotValue::Float(0.0))
            .with_input(InputDefinition::single("input", "Input", SlotDataType::Float))
            .with_output(
                OutputDefinition::computed("result", "Result", SlotDataType::Float).animated(),
            )
    }

    fn compute(
        &self,
        _slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let offset = scope.param_float("offset")?;
        let shifted = scope.context().local_time + offset;
        scope.set_local_time(shifted);
        scope.require_input("input")
    }
}

/// Picks one connection of an ordered fan-in by index. The port's wrap
/// policy keeps selection valid while the user edits the graph.
pub struct SelectIndex;

impl Operator for SelectIndex {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("select.index", "Select")
            .with_param("index", SlotValue::Int(0))
            .with_input(
                InputDefinition::multi("options", "Options", SlotDataType::Any)
                    .with_index_policy(IndexPolicy::Wrap),
            )
            .with_output(OutputDefinition::computed("selected", "Selected", SlotDataType::Any))
    }

    fn compute(
        &self,
        _slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let index = scope.param_int("index")?;
        Ok(scope.input_at("options", index)?.unwrap_or(SlotValue::None))
    }
}

/// Averages an ordered fan-in of floats. An empty fan-in is a valid no-op
/// and yields zero.
pub struct Mix;

impl Operator for Mix {
    fn definition(&self) -> OperatorDefinition {
        OperatorDefinition::new("blend.mix", "Mix")
            .with_input(InputDefinition::multi("inputs", "Inputs", SlotDataType::Float))
            .with_output(OutputDefinition::computed("result", "Result", SlotDataType::Float))
    }

    fn compute(
        &self,
        _slot: &str,
        scope: &mut ComputeScope<'_>,
    ) -> Result<SlotValue, EvaluationError> {
        let values = scope.input_values("inputs")?;
        if values.is_empty() {
            return Ok(SlotValue::Float(0.0));
        }
        let sum: f64 = values.iter().map(|v| v.as_float(0.0)).sum();
        Ok(SlotValue::Float(sum / values.len() as f64))
    }
}
