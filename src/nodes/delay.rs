//! `DelayNode`: re-emits its input on `Output` after `DelayMs` milliseconds.
//!
//! The node only records a timer request. The runtime scheduler owns the
//! timer and feeds the emission back into the event loop when it fires.

use crate::error::Result;
use crate::graph::{
    Arrival, Graph, NodeBehavior, NodeContext, NodeId, Restriction, ValueType, VarId, VariableSpec,
};
use std::time::Duration;

pub const DEFAULT_DELAY_MS: i64 = 1000;

pub struct DelayNode {
    input: VarId,
    delay_ms: VarId,
    output: VarId,
}

pub fn build(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let input = graph.add_variable(node, "Input", VariableSpec::event(ValueType::Float))?;
    let delay_ms = graph.add_variable(
        node,
        "DelayMs",
        VariableSpec::input(ValueType::Int)
            .with_default(DEFAULT_DELAY_MS)
            .with_restriction(Restriction::int_min(0)),
    )?;
    let output = graph.add_variable(
        node,
        "Output",
        VariableSpec::output(ValueType::Float).published(),
    )?;
    Ok(Box::new(DelayNode {
        input,
        delay_ms,
        output,
    }))
}

impl NodeBehavior for DelayNode {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, arrivals: &[Arrival]) {
        let delay = ctx.get::<i64>(self.delay_ms).unwrap_or(DEFAULT_DELAY_MS).max(0) as u64;
        for arrival in arrivals.iter().filter(|a| a.var == self.input) {
            ctx.schedule(self.output, arrival.value.clone(), Duration::from_millis(delay));
        }
    }
}
