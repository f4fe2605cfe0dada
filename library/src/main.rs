//! Headless demo: build a small patch and evaluate it over a few frames.

use library::{EvalEngine, Graph, SlotRef, SlotValue};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut engine = EvalEngine::with_builtins();
    let mut graph = Graph::new();

    // clock -> scale(factor 0.5) -> add(+ constant 1.0)
    let clock = graph.add_node(engine.catalog(), "time.clock")?;
    let scale = graph.add_node(engine.catalog(), "math.scale")?;
    let offset = graph.add_node(engine.catalog(), "value.float")?;
    let add = graph.add_node(engine.catalog(), "math.add")?;

    graph.set_param(scale, "factor", SlotValue::Float(0.5))?;
    graph.set_slot_value(&SlotRef::new(offset, "value"), SlotValue::Float(1.0))?;

    graph.connect(&SlotRef::new(clock, "time"), scale, "value")?;
    graph.connect(&SlotRef::new(scale, "result"), add, "a")?;
    graph.connect(&SlotRef::new(offset, "value"), add, "b")?;

    let fps = 60.0;
    for frame in 0..5u64 {
        let ctx = engine.begin_pass(frame as f64 / fps, frame);
        let value = engine.evaluate_output(&mut graph, add, "result", &ctx)?;
        println!("frame {:>2}  t={:.4}  result={:?}", frame, ctx.global_time, value);
    }

    Ok(())
}
