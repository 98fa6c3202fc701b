//! Genetic-algorithm node family.
//!
//! These nodes carry configuration only; their purpose here is the
//! dependency contract checked before the root may start:
//!
//! - `GaNode` (root) needs exactly one `RngNode` and one `PopulationNode`.
//! - `SelectionNode` names its population by full dotted name. The reference
//!   is resolved when dependencies are checked, so either side may be
//!   created first.

use crate::error::{GraphError, Result};
use crate::graph::{
    Arrival, Graph, NodeBehavior, NodeContext, NodeId, Restriction, TextRule, ValueType, VarId,
    VariableSpec,
};
use crate::nodes::{POPULATION_NODE, RNG_NODE};

pub const DEFAULT_POPULATION_SIZE: i64 = 10;
pub const DEFAULT_TOURNAMENT_SIZE: i64 = 2;

// ==================== GaNode ====================

pub struct GaNode {
    start: VarId,
    stop: VarId,
    running: VarId,
}

pub fn build_ga(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let start = graph.add_variable(node, "Start", VariableSpec::event(ValueType::Void))?;
    let stop = graph.add_variable(node, "Stop", VariableSpec::event(ValueType::Void))?;
    let running = graph.add_variable(
        node,
        "Running",
        VariableSpec::latched(ValueType::Bool).with_default(false).published(),
    )?;
    Ok(Box::new(GaNode {
        start,
        stop,
        running,
    }))
}

impl GaNode {
    /// Own checks plus every child's.
    fn ready(&self, graph: &Graph, node: NodeId) -> Result<()> {
        self.check_dependencies(graph, node)?;
        for &child in graph.node(node)?.children() {
            graph.check_dependencies(child)?;
        }
        Ok(())
    }
}

impl NodeBehavior for GaNode {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, arrivals: &[Arrival]) {
        for arrival in arrivals {
            if arrival.var == self.start {
                match self.ready(ctx.graph(), ctx.node()) {
                    Ok(()) => ctx.set(self.running, true),
                    Err(e) => tracing::warn!("{} not started: {}", ctx.node(), e),
                }
            } else if arrival.var == self.stop {
                ctx.set(self.running, false);
            }
        }
    }

    fn check_dependencies(&self, graph: &Graph, node: NodeId) -> Result<()> {
        let name = graph.node(node)?.name();
        for tag in [RNG_NODE, POPULATION_NODE] {
            let count = graph.children_of_type(node, tag).len();
            if count != 1 {
                return Err(GraphError::DependencyUnsatisfied(format!(
                    "'{}' needs exactly one {}, found {}",
                    name, tag, count
                )));
            }
        }
        Ok(())
    }
}

// ==================== Configuration-only nodes ====================

/// Behaviour of nodes that hold settings and never react.
struct Settings;

impl NodeBehavior for Settings {
    fn on_update(&mut self, _ctx: &mut NodeContext<'_>, _arrivals: &[Arrival]) {}
}

pub fn build_rng(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    graph.add_variable(node, "Seed", VariableSpec::input(ValueType::Int).with_default(0i64))?;
    Ok(Box::new(Settings))
}

pub fn build_population(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    graph.add_variable(
        node,
        "Size",
        VariableSpec::input(ValueType::Int)
            .with_default(DEFAULT_POPULATION_SIZE)
            .with_restriction(Restriction::int_min(1)),
    )?;
    Ok(Box::new(Settings))
}

// ==================== SelectionNode ====================

pub struct SelectionNode {
    population: VarId,
    tournament_size: VarId,
}

pub fn build_selection(graph: &mut Graph, node: NodeId) -> Result<Box<dyn NodeBehavior>> {
    let population = graph.add_variable(
        node,
        "Population",
        VariableSpec::input(ValueType::String)
            .with_restriction(Restriction::Text(TextRule::DottedIdentifier)),
    )?;
    let tournament_size = graph.add_variable(
        node,
        "TournamentSize",
        VariableSpec::input(ValueType::Int)
            .with_default(DEFAULT_TOURNAMENT_SIZE)
            .with_restriction(Restriction::int_min(1)),
    )?;
    Ok(Box::new(SelectionNode {
        population,
        tournament_size,
    }))
}

impl NodeBehavior for SelectionNode {
    fn on_update(&mut self, _ctx: &mut NodeContext<'_>, _arrivals: &[Arrival]) {}

    fn check_dependencies(&self, graph: &Graph, node: NodeId) -> Result<()> {
        let name = graph.node(node)?.name();
        let target: String = graph.get(self.population).map_err(|_| {
            GraphError::DependencyUnsatisfied(format!("'{}' has no population reference", name))
        })?;

        let population = graph
            .find_node(&target)
            .filter(|p| {
                graph
                    .node(*p)
                    .map(|n| n.type_tag() == POPULATION_NODE)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                GraphError::DependencyUnsatisfied(format!(
                    "'{}' references missing population '{}'",
                    name, target
                ))
            })?;

        let size: i64 = graph
            .find_variable(population, "Size")
            .and_then(|v| graph.get(v).ok())
            .unwrap_or(DEFAULT_POPULATION_SIZE);
        let tournament: i64 = graph.get(self.tournament_size)?;
        if tournament > size {
            return Err(GraphError::DependencyUnsatisfied(format!(
                "'{}' tournament size {} exceeds population size {}",
                name, tournament, size
            )));
        }
        Ok(())
    }
}
