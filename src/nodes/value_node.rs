//! `ValueNode`: one branch of a scatter-gather round.
//!
//! On `Trigger` the node publishes its `Parameter` on `Out` and starts
//! waiting. When the external side echoes a value back on `Echo`, the node
//! reports `Consistent = true` if the echo matches the parameter.

use crate::error::Result;
use crate::graph::{
    Arrival, Graph, NodeBehavior, NodeContext, NodeId, ValueType, VarId, VariableSpec,
};

pub struct ValueNode {
    trigger: VarId,
    parameter: VarId,
    out: VarId,
    echo: VarId,
    consistent: VarId,
    awaiting_echo: bool,
}

pub fn build(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let trigger = graph.add_variable(node, "Trigger", VariableSpec::event(ValueType::Void))?;
    let parameter = graph.add_variable(
        node,
        "Parameter",
        VariableSpec::input(ValueType::Float).with_default(0.0),
    )?;
    let out = graph.add_variable(node, "Out", VariableSpec::output(ValueType::Float).published())?;
    let echo = graph.add_variable(node, "Echo", VariableSpec::event(ValueType::Float))?;
    let consistent = graph.add_variable(node, "Consistent", VariableSpec::output(ValueType::Bool))?;
    Ok(Box::new(ValueNode {
        trigger,
        parameter,
        out,
        echo,
        consistent,
        awaiting_echo: false,
    }))
}

impl NodeBehavior for ValueNode {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, arrivals: &[Arrival]) {
        let parameter = ctx.get::<f64>(self.parameter).unwrap_or_default();
        for arrival in arrivals {
            if arrival.var == self.trigger {
                self.awaiting_echo = true;
                ctx.emit(self.out, parameter);
            } else if arrival.var == self.echo {
                if !self.awaiting_echo {
                    tracing::debug!("{}: echo outside a round ignored", ctx.node());
                    continue;
                }
                let matches = arrival.value.as_float() == Some(parameter);
                if matches {
                    self.awaiting_echo = false;
                }
                ctx.emit(self.consistent, matches);
            }
        }
    }
}
