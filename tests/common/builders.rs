//! Test data builders for creating test components

use super::scalar;
use vargraph::component::{FIELD_ID, FIELD_NAME, FIELD_TYPE};
use vargraph::graph::{DeliveryMode, Message, Outbound, CREATE_NODE, DELETE_NODE};
use vargraph::nodes::{CALC_NODE, EVALUATION_NODE, VALUE_NODE};
use vargraph::{Component, ComponentInfo, Value};

/// `CreateNode` control message
pub fn create_node(name: &str, type_tag: &str, vnid: i64) -> Message {
    Message::new(CREATE_NODE)
        .with_field(FIELD_NAME, name)
        .with_field(FIELD_TYPE, type_tag)
        .with_field(FIELD_ID, vnid.to_string())
}

/// `DeleteNode` control message
pub fn delete_node(vnid: i64) -> Message {
    Message::new(DELETE_NODE).with_field(FIELD_ID, vnid.to_string())
}

/// Builder for Calc/Evaluation/Value topologies
pub struct ScatterGatherBuilder {
    root: String,
    with_calc: bool,
    evaluations: usize,
    branches: usize,
    echo_loop: bool,
}

impl ScatterGatherBuilder {
    /// A `CalcNode` root with evaluation children
    pub fn calc(root: &str) -> Self {
        Self {
            root: root.to_string(),
            with_calc: true,
            evaluations: 1,
            branches: 1,
            echo_loop: false,
        }
    }

    /// A single `EvaluationNode` root
    pub fn evaluation(root: &str) -> Self {
        Self {
            root: root.to_string(),
            with_calc: false,
            evaluations: 1,
            branches: 1,
            echo_loop: false,
        }
    }

    pub fn evaluations(mut self, count: usize) -> Self {
        self.evaluations = count;
        self
    }

    /// ValueNodes per evaluation
    pub fn branches(mut self, count: usize) -> Self {
        self.branches = count;
        self
    }

    /// Link every ValueNode's `Out` straight back to its `Echo`
    pub fn echo_loop(mut self) -> Self {
        self.echo_loop = true;
        self
    }

    pub fn build(self) -> ScatterGather {
        let mut component = Component::new(ComponentInfo::default());
        let mut vnid = 0;
        let mut next_vnid = || {
            vnid += 1;
            vnid
        };

        let mut evaluations = Vec::new();
        if self.with_calc {
            component
                .create_node(&create_node(&self.root, CALC_NODE, next_vnid()))
                .unwrap();
            for i in 0..self.evaluations {
                let name = format!("{}.e{}", self.root, i);
                component
                    .create_node(&create_node(&name, EVALUATION_NODE, next_vnid()))
                    .unwrap();
                evaluations.push(name);
            }
        } else {
            component
                .create_node(&create_node(&self.root, EVALUATION_NODE, next_vnid()))
                .unwrap();
            evaluations.push(self.root.clone());
        }

        let mut branches = Vec::new();
        for eval in &evaluations {
            let mut names = Vec::new();
            for j in 0..self.branches {
                let name = format!("{}.v{}", eval, j);
                component
                    .create_node(&create_node(&name, VALUE_NODE, next_vnid()))
                    .unwrap();
                if self.echo_loop {
                    let node = component.graph().find_node(&name).unwrap();
                    let out = component.graph().find_variable(node, "Out").unwrap();
                    let echo = component.graph().find_variable(node, "Echo").unwrap();
                    component
                        .graph_mut()
                        .connect(out, echo, DeliveryMode::Direct)
                        .unwrap();
                }
                names.push(name);
            }
            branches.push(names);
        }

        ScatterGather {
            component,
            root: self.root,
            evaluations,
            branches,
        }
    }
}

/// A built scatter-gather topology
pub struct ScatterGather {
    pub component: Component,
    pub root: String,
    pub evaluations: Vec<String>,
    pub branches: Vec<Vec<String>>,
}

impl ScatterGather {
    /// Fire a void variable by full name
    pub fn fire(&mut self, variable: &str) {
        self.component.dispatch(variable, &scalar(())).unwrap();
    }

    /// Deliver a float to a variable by full name
    pub fn send(&mut self, variable: &str, value: f64) {
        self.component.dispatch(variable, &scalar(value)).unwrap();
    }

    /// External echo for branch `j` of evaluation `i`
    pub fn echo(&mut self, i: usize, j: usize, value: f64) {
        let node = self.branches[i][j].clone();
        let message = Message::new(VALUE_NODE).with_field("Echo", value.to_string());
        self.component.dispatch(&node, &message).unwrap();
    }

    /// Evaluator result for evaluation `i`
    pub fn evaluate(&mut self, i: usize, value: f64) {
        let variable = format!("{}.Evaluation", self.evaluations[i]);
        self.send(&variable, value);
    }

    pub fn drain(&mut self) -> Vec<Outbound> {
        self.component.graph_mut().drain_outbox()
    }

    pub fn set_parameter(&mut self, i: usize, j: usize, value: f64) {
        let variable = format!("{}.Parameter", self.branches[i][j]);
        self.component
            .dispatch(&variable, &scalar(Value::Float(value)))
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_gather_builder() {
        let sg = ScatterGatherBuilder::calc("calc")
            .evaluations(2)
            .branches(3)
            .build();

        assert_eq!(sg.evaluations, vec!["calc.e0", "calc.e1"]);
        assert_eq!(sg.branches[1][2], "calc.e1.v2");
        assert!(sg.component.graph().find_node("calc.e1.v2").is_some());
    }
}
