//! `EvaluationNode`: the branch coordinator of the scatter-gather protocol.
//!
//! ```text
//! Idle ──StartEx──► (Trigger all ValueNodes) ──► AwaitingConsistency
//!                                                   │ Consistent=true × N
//!                                                   ▼
//! Idle ◄──Evaluation(d): Result=d, Next────── AwaitingResult
//! ```
//!
//! `N` is the number of `ValueNode` children at the moment each report
//! arrives. An `Evaluation` that arrives in any other phase is dropped. A
//! `StartEx` outside `Idle` abandons the running round and starts over.

use crate::error::Result;
use crate::graph::{
    Arrival, DeliveryMode, Graph, NodeBehavior, NodeContext, NodeId, ValueType, VarId, VariableSpec,
};
use crate::nodes::{required_variable, VALUE_NODE};

/// Coordinator phase. Triggering is transient and never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingConsistency,
    AwaitingResult,
}

pub struct EvaluationNode {
    start: VarId,
    trigger: VarId,
    consistent: VarId,
    evaluation: VarId,
    result: VarId,
    next: VarId,
    phase: Phase,
    consistent_count: usize,
}

pub fn build(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let start = graph.add_variable(node, "StartEx", VariableSpec::event(ValueType::Void))?;
    let trigger = graph.add_variable(node, "Trigger", VariableSpec::output(ValueType::Void))?;
    let consistent = graph.add_variable(node, "Consistent", VariableSpec::event(ValueType::Bool))?;
    let evaluation = graph.add_variable(node, "Evaluation", VariableSpec::event(ValueType::Float))?;
    let result = graph.add_variable(
        node,
        "Result",
        VariableSpec::output(ValueType::Float).published(),
    )?;
    let next = graph.add_variable(node, "Next", VariableSpec::output(ValueType::Void))?;
    Ok(Box::new(EvaluationNode {
        start,
        trigger,
        consistent,
        evaluation,
        result,
        next,
        phase: Phase::Idle,
        consistent_count: 0,
    }))
}

/// Wire `Trigger` to every ValueNode's `Trigger` and each `Consistent` back.
pub fn relink(graph: &mut Graph, node: NodeId) -> Result<()> {
    let trigger = required_variable(graph, node, "Trigger")?;
    let consistent = required_variable(graph, node, "Consistent")?;
    for branch in graph.children_of_type(node, VALUE_NODE) {
        let branch_trigger = required_variable(graph, branch, "Trigger")?;
        let branch_consistent = required_variable(graph, branch, "Consistent")?;
        if !graph.is_linked(trigger, branch_trigger) {
            graph.connect(trigger, branch_trigger, DeliveryMode::Direct)?;
        }
        if !graph.is_linked(branch_consistent, consistent) {
            graph.connect(branch_consistent, consistent, DeliveryMode::Direct)?;
        }
    }
    Ok(())
}

impl EvaluationNode {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn start_round(&mut self, ctx: &mut NodeContext<'_>) {
        if self.phase != Phase::Idle {
            tracing::warn!(
                "{}: round abandoned in phase {:?} after {} of {} reports",
                ctx.node(),
                self.phase,
                self.consistent_count,
                ctx.child_count(VALUE_NODE)
            );
        }
        self.consistent_count = 0;
        self.phase = if ctx.child_count(VALUE_NODE) == 0 {
            Phase::AwaitingResult
        } else {
            Phase::AwaitingConsistency
        };
        ctx.fire(self.trigger);
    }

    fn report(&mut self, ctx: &mut NodeContext<'_>, consistent: bool) {
        if !consistent || self.phase != Phase::AwaitingConsistency {
            return;
        }
        self.consistent_count += 1;
        let branches = ctx.child_count(VALUE_NODE);
        if self.consistent_count == branches {
            tracing::debug!("{}: all {} branches consistent", ctx.node(), branches);
            self.phase = Phase::AwaitingResult;
        } else if self.consistent_count > branches {
            tracing::warn!(
                "{}: {} consistency reports for {} branches",
                ctx.node(),
                self.consistent_count,
                branches
            );
        }
    }

    fn finish(&mut self, ctx: &mut NodeContext<'_>, value: f64) {
        if self.phase != Phase::AwaitingResult {
            tracing::warn!(
                "{}: evaluation {} dropped in phase {:?}",
                ctx.node(),
                value,
                self.phase
            );
            return;
        }
        self.phase = Phase::Idle;
        ctx.emit(self.result, value);
        ctx.fire(self.next);
    }
}

impl NodeBehavior for EvaluationNode {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, arrivals: &[Arrival]) {
        for arrival in arrivals {
            if arrival.var == self.start {
                self.start_round(ctx);
            } else if arrival.var == self.consistent {
                self.report(ctx, arrival.value.as_bool().unwrap_or(false));
            } else if arrival.var == self.evaluation {
                if let Some(value) = arrival.value.as_float() {
                    self.finish(ctx, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Effect, Value};

    struct Fixture {
        graph: Graph,
        node: NodeId,
        eval: EvaluationNode,
    }

    impl Fixture {
        fn new(branches: usize) -> Self {
            let mut graph = Graph::new();
            let node = graph.add_root("eval", crate::nodes::EVALUATION_NODE).unwrap();
            build(&mut graph, node).unwrap();
            for i in 0..branches {
                let branch = graph.add_node(node, &format!("v{i}"), VALUE_NODE).unwrap();
                crate::nodes::value_node::build(&mut graph, branch).unwrap();
            }
            relink(&mut graph, node).unwrap();
            let var = |name: &str| graph.find_variable(node, name).unwrap();
            let eval = EvaluationNode {
                start: var("StartEx"),
                trigger: var("Trigger"),
                consistent: var("Consistent"),
                evaluation: var("Evaluation"),
                result: var("Result"),
                next: var("Next"),
                phase: Phase::Idle,
                consistent_count: 0,
            };
            Self { graph, node, eval }
        }

        fn send(&mut self, var: VarId, value: Value) -> Vec<Effect> {
            let mut ctx = NodeContext::new(&self.graph, self.node);
            self.eval.on_update(&mut ctx, &[Arrival { var, value }]);
            ctx.into_effects()
        }
    }

    #[test]
    fn test_relink_is_idempotent() {
        let mut f = Fixture::new(2);
        assert_eq!(f.graph.link_count(), 4);
        relink(&mut f.graph, f.node).unwrap();
        assert_eq!(f.graph.link_count(), 4);
    }

    #[test]
    fn test_round() {
        let mut f = Fixture::new(2);
        let (start, consistent, evaluation) = (f.eval.start, f.eval.consistent, f.eval.evaluation);

        let effects = f.send(start, Value::Void);
        assert_eq!(effects, vec![Effect::Emit(f.eval.trigger, Value::Void)]);
        assert_eq!(f.eval.phase(), Phase::AwaitingConsistency);

        // Premature result
        assert!(f.send(evaluation, Value::Float(1.0)).is_empty());

        f.send(consistent, Value::Bool(false));
        f.send(consistent, Value::Bool(true));
        assert_eq!(f.eval.phase(), Phase::AwaitingConsistency);
        f.send(consistent, Value::Bool(true));
        assert_eq!(f.eval.phase(), Phase::AwaitingResult);

        let effects = f.send(evaluation, Value::Float(2.5));
        assert_eq!(
            effects,
            vec![
                Effect::Emit(f.eval.result, Value::Float(2.5)),
                Effect::Emit(f.eval.next, Value::Void),
            ]
        );
        assert_eq!(f.eval.phase(), Phase::Idle);
        assert!(f.send(evaluation, Value::Float(3.0)).is_empty());
    }

    #[test]
    fn test_restart_mid_round_begins_new_round() {
        let mut f = Fixture::new(2);
        let (start, consistent) = (f.eval.start, f.eval.consistent);
        f.send(start, Value::Void);
        f.send(consistent, Value::Bool(true));

        let effects = f.send(start, Value::Void);
        assert_eq!(effects, vec![Effect::Emit(f.eval.trigger, Value::Void)]);
        assert_eq!(f.eval.phase(), Phase::AwaitingConsistency);

        // The report from the abandoned round no longer counts
        f.send(consistent, Value::Bool(true));
        assert_eq!(f.eval.phase(), Phase::AwaitingConsistency);
        f.send(consistent, Value::Bool(true));
        assert_eq!(f.eval.phase(), Phase::AwaitingResult);
    }

    #[test]
    fn test_no_branches_goes_straight_to_result() {
        let mut f = Fixture::new(0);
        let start = f.eval.start;
        f.send(start, Value::Void);
        assert_eq!(f.eval.phase(), Phase::AwaitingResult);
    }
}
