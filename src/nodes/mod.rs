//! Built-in node types
//!
//! Each submodule provides one family of schemas: a `build` function that
//! creates the node's variables and returns its behaviour, and, for nodes
//! whose children are wired structurally, a `relink` function.

pub mod arith;
pub mod calc;
pub mod delay;
pub mod evaluation;
pub mod genetic;
pub mod value_node;

use crate::component::{NodeSchema, Placement};
use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeId, VarId};

pub const FLOAT_NODE: &str = "FloatNode";
pub const DELAY_NODE: &str = "DelayNode";
pub const GA_NODE: &str = "GaNode";
pub const RNG_NODE: &str = "RngNode";
pub const POPULATION_NODE: &str = "PopulationNode";
pub const SELECTION_NODE: &str = "SelectionNode";
pub const CALC_NODE: &str = "CalcNode";
pub const EVALUATION_NODE: &str = "EvaluationNode";
pub const VALUE_NODE: &str = "ValueNode";

/// Every built-in schema.
pub fn builtin_schemas() -> Vec<NodeSchema> {
    vec![
        NodeSchema {
            type_tag: FLOAT_NODE,
            placement: Placement::Anywhere,
            build: arith::build,
            relink: None,
        },
        NodeSchema {
            type_tag: DELAY_NODE,
            placement: Placement::Anywhere,
            build: delay::build,
            relink: None,
        },
        NodeSchema {
            type_tag: GA_NODE,
            placement: Placement::Root,
            build: genetic::build_ga,
            relink: None,
        },
        NodeSchema {
            type_tag: RNG_NODE,
            placement: Placement::Under(&[GA_NODE]),
            build: genetic::build_rng,
            relink: None,
        },
        NodeSchema {
            type_tag: POPULATION_NODE,
            placement: Placement::Under(&[GA_NODE]),
            build: genetic::build_population,
            relink: None,
        },
        NodeSchema {
            type_tag: SELECTION_NODE,
            placement: Placement::Under(&[GA_NODE]),
            build: genetic::build_selection,
            relink: None,
        },
        NodeSchema {
            type_tag: CALC_NODE,
            placement: Placement::Anywhere,
            build: calc::build,
            relink: Some(calc::relink),
        },
        NodeSchema {
            type_tag: EVALUATION_NODE,
            placement: Placement::RootOrUnder(&[CALC_NODE]),
            build: evaluation::build,
            relink: Some(evaluation::relink),
        },
        NodeSchema {
            type_tag: VALUE_NODE,
            placement: Placement::Under(&[EVALUATION_NODE]),
            build: value_node::build,
            relink: None,
        },
    ]
}

/// Variable of `node` that its schema guarantees to exist.
pub(crate) fn required_variable(graph: &Graph, node: NodeId, short_name: &str) -> Result<VarId> {
    graph.find_variable(node, short_name).ok_or_else(|| {
        let owner = graph.node(node).map(|n| n.name().to_string()).unwrap_or_default();
        GraphError::UnknownName(format!("{}.{}", owner, short_name))
    })
}
