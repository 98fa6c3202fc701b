//! Integration tests for value propagation through nodes and links

mod common;

use common::builders::create_node;
use common::{assert_float_eq, emitted_by, float_payload, scalar};
use vargraph::graph::{DeliveryMode, Message, ValueType, VariableSpec};
use vargraph::nodes::FLOAT_NODE;
use vargraph::{Component, ComponentInfo, Graph};

fn adder() -> Component {
    let mut component = Component::new(ComponentInfo::default());
    component
        .create_node(&create_node("adder", FLOAT_NODE, 1))
        .unwrap();
    component.graph_mut().drain_outbox();
    component
}

fn inputs(a: &str, b: &str) -> Message {
    Message::new(FLOAT_NODE)
        .with_field("Input1", a)
        .with_field("Input2", b)
}

#[test]
fn test_node_message_updates_output_once() {
    let mut component = adder();
    component.dispatch("adder", &inputs("3.0", "4.5")).unwrap();

    let outbound = component.graph_mut().drain_outbox();
    let outputs = emitted_by(&outbound, "adder.Output");
    assert_eq!(outputs.len(), 1);
    assert_float_eq(float_payload(outputs[0]), 7.5, 1e-12);

    let graph = component.graph();
    let node = graph.find_node("adder").unwrap();
    let output = graph.find_variable(node, "Output").unwrap();
    assert_eq!(graph.get::<f64>(output).unwrap(), 7.5);
}

#[test]
fn test_unchanged_value_is_silent() {
    let mut component = adder();
    component.dispatch("adder", &inputs("3.0", "4.5")).unwrap();
    component.graph_mut().drain_outbox();

    component.dispatch("adder", &inputs("3.0", "4.5")).unwrap();
    assert!(component.graph().outbox().is_empty());

    component.dispatch("adder.Input1", &scalar(3.0)).unwrap();
    assert!(component.graph().outbox().is_empty());
}

#[test]
fn test_malformed_field_drops_whole_message() {
    let mut component = adder();
    component.dispatch("adder", &inputs("3.0", "four")).unwrap();

    let graph = component.graph();
    let node = graph.find_node("adder").unwrap();
    let input1 = graph.find_variable(node, "Input1").unwrap();
    assert_eq!(graph.get::<f64>(input1).unwrap(), 0.0);
    assert!(graph.outbox().is_empty());
}

#[test]
fn test_restricted_operation_rejected() {
    let mut component = adder();
    component.dispatch("adder.Operation", &scalar("POW")).unwrap();

    let graph = component.graph();
    let node = graph.find_node("adder").unwrap();
    let operation = graph.find_variable(node, "Operation").unwrap();
    assert_eq!(graph.get::<String>(operation).unwrap(), "ADD");

    component.dispatch("adder.Operation", &scalar("MUL")).unwrap();
    component.dispatch("adder", &inputs("3.0", "4.0")).unwrap();
    let outbound = component.graph_mut().drain_outbox();
    assert_float_eq(float_payload(emitted_by(&outbound, "adder.Output")[0]), 12.0, 1e-12);
}

#[test]
fn test_output_feeds_child_node() {
    let mut component = adder();
    component
        .create_node(&create_node("adder.next", FLOAT_NODE, 2))
        .unwrap();

    let graph = component.graph_mut();
    let first = graph.find_node("adder").unwrap();
    let second = graph.find_node("adder.next").unwrap();
    let output = graph.find_variable(first, "Output").unwrap();
    let input = graph.find_variable(second, "Input1").unwrap();
    graph.connect(output, input, DeliveryMode::Direct).unwrap();
    graph.drain_outbox();

    component.dispatch("adder", &inputs("1.0", "2.0")).unwrap();
    let outbound = component.graph_mut().drain_outbox();
    let order: Vec<&str> = outbound.iter().map(|o| o.variable.as_str()).collect();
    assert_eq!(order, vec!["adder.Output", "adder.next.Output"]);
    assert_float_eq(float_payload(&outbound[1]), 3.0, 1e-12);
}

#[test]
fn test_message_link_converts_int_to_float() {
    let mut graph = Graph::new();
    let node = graph.add_root("n", "Probe").unwrap();
    let count = graph
        .add_variable(node, "count", VariableSpec::latched(ValueType::Int))
        .unwrap();
    let level = graph
        .add_variable(node, "level", VariableSpec::input(ValueType::Float).published())
        .unwrap();
    graph.connect(count, level, DeliveryMode::Message).unwrap();

    graph.set_value(count, 7i64).unwrap();
    assert_eq!(graph.get::<f64>(level).unwrap(), 7.0);

    let outbound = graph.drain_outbox();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].message.kind(), "float");
}

#[test]
fn test_unknown_target_reported() {
    let mut component = adder();
    assert!(component.dispatch("adder.Nope", &scalar(1.0)).is_err());
}
