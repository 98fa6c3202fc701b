//! `FloatNode`: binary arithmetic on two float inputs.

use crate::error::Result;
use crate::graph::{
    Arrival, Graph, NodeBehavior, NodeContext, NodeId, Restriction, ValueType, VarId, VariableSpec,
};

/// Supported operations, as accepted by the `Operation` variable.
pub const OPERATIONS: [&str; 6] = ["ADD", "SUB", "MUL", "DIV", "MIN", "MAX"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

impl Operation {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "ADD" => Some(Operation::Add),
            "SUB" => Some(Operation::Sub),
            "MUL" => Some(Operation::Mul),
            "DIV" => Some(Operation::Div),
            "MIN" => Some(Operation::Min),
            "MAX" => Some(Operation::Max),
            _ => None,
        }
    }

    /// `None` for division by zero.
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        match self {
            Operation::Add => Some(a + b),
            Operation::Sub => Some(a - b),
            Operation::Mul => Some(a * b),
            Operation::Div if b == 0.0 => None,
            Operation::Div => Some(a / b),
            Operation::Min => Some(a.min(b)),
            Operation::Max => Some(a.max(b)),
        }
    }
}

pub struct FloatNode {
    input1: VarId,
    input2: VarId,
    operation: VarId,
    output: VarId,
}

pub fn build(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let input1 = graph.add_variable(
        node,
        "Input1",
        VariableSpec::input(ValueType::Float).with_default(0.0).watched(),
    )?;
    let input2 = graph.add_variable(
        node,
        "Input2",
        VariableSpec::input(ValueType::Float).with_default(0.0).watched(),
    )?;
    let operation = graph.add_variable(
        node,
        "Operation",
        VariableSpec::input(ValueType::String)
            .with_default("ADD")
            .with_restriction(Restriction::one_of(OPERATIONS))
            .watched(),
    )?;
    let output = graph.add_variable(
        node,
        "Output",
        VariableSpec::latched(ValueType::Float).published(),
    )?;
    Ok(Box::new(FloatNode {
        input1,
        input2,
        operation,
        output,
    }))
}

impl NodeBehavior for FloatNode {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, _arrivals: &[Arrival]) {
        let (Some(a), Some(b)) = (ctx.get::<f64>(self.input1), ctx.get::<f64>(self.input2)) else {
            return;
        };
        let Some(op) = ctx.get::<String>(self.operation).and_then(|s| Operation::parse(&s)) else {
            return;
        };
        match op.apply(a, b) {
            Some(result) => ctx.set(self.output, result),
            None => tracing::warn!("{}: division by zero, output unchanged", ctx.node()),
        }
    }
}
