//! `CalcNode`: the count-gated aggregator above a set of `EvaluationNode`s.
//!
//! `Start` fires `Kick`, which starts the first evaluation; each evaluation's
//! `Next` starts the one after it. Every `Result` lands on `Results`. Once
//! as many results as there are live evaluation children have arrived, the
//! batch is reduced, emitted on `Output` and cleared.

use crate::error::Result;
use crate::graph::{
    Arrival, DeliveryMode, Graph, LinkId, NodeBehavior, NodeContext, NodeId, Restriction,
    ValueType, VarId, VariableSpec,
};
use crate::nodes::{required_variable, EVALUATION_NODE};
use std::collections::HashSet;

pub const REDUCTIONS: [&str; 5] = ["SUM", "PRODUCT", "MEAN", "MIN", "MAX"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    #[default]
    Sum,
    Product,
    Mean,
    Min,
    Max,
}

impl Reduction {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "SUM" => Some(Reduction::Sum),
            "PRODUCT" => Some(Reduction::Product),
            "MEAN" => Some(Reduction::Mean),
            "MIN" => Some(Reduction::Min),
            "MAX" => Some(Reduction::Max),
            _ => None,
        }
    }

    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Reduction::Sum => values.iter().sum(),
            Reduction::Product => values.iter().product(),
            Reduction::Mean if values.is_empty() => 0.0,
            Reduction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reduction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reduction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

pub struct CalcNode {
    start: VarId,
    kick: VarId,
    results: VarId,
    reduction: VarId,
    output: VarId,
    batch: Vec<f64>,
}

pub fn build(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let start = graph.add_variable(node, "Start", VariableSpec::event(ValueType::Void))?;
    let kick = graph.add_variable(node, "Kick", VariableSpec::output(ValueType::Void))?;
    let results = graph.add_variable(node, "Results", VariableSpec::event(ValueType::Float))?;
    let reduction = graph.add_variable(
        node,
        "Reduction",
        VariableSpec::input(ValueType::String)
            .with_default("SUM")
            .with_restriction(Restriction::one_of(REDUCTIONS)),
    )?;
    let output = graph.add_variable(
        node,
        "Output",
        VariableSpec::output(ValueType::Float).published(),
    )?;
    Ok(Box::new(CalcNode {
        start,
        kick,
        results,
        reduction,
        output,
        batch: Vec::new(),
    }))
}

/// Collect every `Result` on `Results` and rebuild the `StartEx` chain in
/// child order: `Kick → e0`, `e0.Next → e1`, ... The last `Next` stays open.
pub fn relink(graph: &mut Graph, node: NodeId) -> Result<()> {
    let kick = required_variable(graph, node, "Kick")?;
    let results = required_variable(graph, node, "Results")?;
    let evaluations = graph.children_of_type(node, EVALUATION_NODE);

    let mut starts = Vec::with_capacity(evaluations.len());
    let mut nexts = Vec::with_capacity(evaluations.len());
    for &eval in &evaluations {
        let result = required_variable(graph, eval, "Result")?;
        if !graph.is_linked(result, results) {
            graph.connect(result, results, DeliveryMode::Direct)?;
        }
        starts.push(required_variable(graph, eval, "StartEx")?);
        nexts.push(required_variable(graph, eval, "Next")?);
    }

    let chain_targets: HashSet<VarId> = starts.iter().copied().collect();
    let mut stale: Vec<LinkId> = Vec::new();
    for &source in std::iter::once(&kick).chain(nexts.iter()) {
        for &link in graph.variable(source)?.links() {
            if graph.link(link).is_some_and(|l| chain_targets.contains(&l.target)) {
                stale.push(link);
            }
        }
    }
    for link in stale {
        graph.disconnect(link)?;
    }

    let sources = std::iter::once(kick).chain(nexts.iter().copied());
    for (source, target) in sources.zip(starts.iter().copied()) {
        graph.connect(source, target, DeliveryMode::Direct)?;
    }
    Ok(())
}

impl CalcNode {
    fn collect(&mut self, ctx: &mut NodeContext<'_>, value: f64) {
        self.batch.push(value);
        let expected = ctx.child_count(EVALUATION_NODE);
        if self.batch.len() < expected {
            return;
        }
        if self.batch.len() > expected {
            tracing::warn!(
                "{}: {} results for {} evaluations, batch discarded",
                ctx.node(),
                self.batch.len(),
                expected
            );
            self.batch.clear();
            return;
        }
        let reduction = ctx
            .get::<String>(self.reduction)
            .and_then(|s| Reduction::parse(&s))
            .unwrap_or_default();
        let reduced = reduction.apply(&self.batch);
        self.batch.clear();
        tracing::debug!("{}: {:?} of {} results = {}", ctx.node(), reduction, expected, reduced);
        ctx.emit(self.output, reduced);
    }
}

impl NodeBehavior for CalcNode {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, arrivals: &[Arrival]) {
        for arrival in arrivals {
            if arrival.var == self.start {
                if !self.batch.is_empty() {
                    tracing::warn!(
                        "{}: discarding {} partial results",
                        ctx.node(),
                        self.batch.len()
                    );
                    self.batch.clear();
                }
                ctx.fire(self.kick);
            } else if arrival.var == self.results {
                if let Some(value) = arrival.value.as_float() {
                    self.collect(ctx, value);
                }
            }
        }
    }
}
