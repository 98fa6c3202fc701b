//! Integration tests for CreateNode / DeleteNode handling

mod common;

use common::builders::{create_node, delete_node, ScatterGatherBuilder};
use common::{emitted_by, scalar};
use vargraph::component::FIELD_NAME;
use vargraph::graph::{EntityId, Message, CREATE_NODE};
use vargraph::nodes::{
    CALC_NODE, EVALUATION_NODE, GA_NODE, POPULATION_NODE, RNG_NODE, SELECTION_NODE,
};
use vargraph::{Component, ComponentInfo, ComponentState, ControlOutcome, GraphError};

fn all_identities(component: &Component) -> Vec<EntityId> {
    let registry = component.graph().registry();
    registry
        .node_ids()
        .map(EntityId::Node)
        .chain(registry.variable_ids().map(EntityId::Variable))
        .collect()
}

#[test]
fn test_delete_root_releases_every_identity() {
    let mut component = Component::new(ComponentInfo::default());
    component.handle_control(&create_node("calc", CALC_NODE, 1)).unwrap();
    component.handle_control(&create_node("calc.e0", EVALUATION_NODE, 2)).unwrap();
    component.handle_control(&create_node("calc.e1", EVALUATION_NODE, 3)).unwrap();
    assert_eq!(component.state(), ComponentState::Populated);

    let before = all_identities(&component);
    assert!(component.graph().link_count() > 0);

    let outcome = component.handle_control(&delete_node(1)).unwrap();
    let ControlOutcome::Deleted(removed) = outcome else {
        panic!("expected a deletion, got {:?}", outcome);
    };
    assert_eq!(removed.len(), before.len());

    let graph = component.graph();
    assert_eq!(graph.len(), 0);
    assert_eq!(graph.link_count(), 0);
    for id in before {
        assert!(graph.registry().lookup(id.raw() as i64).is_err(), "{:?} still live", id);
    }
    assert_eq!(component.state(), ComponentState::Empty);
    assert!(component.root().is_none());
}

#[test]
fn test_bad_control_messages_ignored() {
    let mut component = Component::new(ComponentInfo::default());

    let unknown = component.handle_control(&create_node("x", "Teleporter", 1)).unwrap();
    assert_eq!(unknown, ControlOutcome::Ignored);

    let missing = Message::new(CREATE_NODE).with_field(FIELD_NAME, "x");
    assert_eq!(component.handle_control(&missing).unwrap(), ControlOutcome::Ignored);

    let bad_name = component.handle_control(&create_node("9lives", GA_NODE, 1)).unwrap();
    assert_eq!(bad_name, ControlOutcome::Ignored);

    let nothing = component.handle_control(&delete_node(7)).unwrap();
    assert_eq!(nothing, ControlOutcome::Ignored);

    assert!(component.graph().is_empty());
}

#[test]
fn test_ga_start_waits_for_children() {
    let mut component = Component::new(ComponentInfo::default());
    component.create_node(&create_node("ga", GA_NODE, 1)).unwrap();
    component.create_node(&create_node("ga.rng", RNG_NODE, 2)).unwrap();
    component.graph_mut().drain_outbox();

    assert!(matches!(component.start(), Err(GraphError::DependencyUnsatisfied(_))));
    assert!(component.graph().outbox().is_empty());

    component.create_node(&create_node("ga.pop", POPULATION_NODE, 3)).unwrap();
    component.start().unwrap();

    let outbound = component.graph_mut().drain_outbox();
    let running = emitted_by(&outbound, "ga.Running");
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].message.field("boolean"), Some("true"));
}

#[test]
fn test_selection_resolves_population_late() {
    let mut component = Component::new(ComponentInfo::default());
    component.create_node(&create_node("ga", GA_NODE, 1)).unwrap();
    component.create_node(&create_node("ga.rng", RNG_NODE, 2)).unwrap();
    component.create_node(&create_node("ga.sel", SELECTION_NODE, 3)).unwrap();
    component.dispatch("ga.sel.Population", &scalar("ga.pop")).unwrap();

    component.create_node(&create_node("ga.pop", POPULATION_NODE, 4)).unwrap();
    component.start().unwrap();

    component.dispatch("ga.sel.TournamentSize", &scalar(50i64)).unwrap();
    assert!(matches!(component.start(), Err(GraphError::DependencyUnsatisfied(_))));

    component.dispatch("ga.pop.Size", &scalar(64i64)).unwrap();
    assert!(component.start().is_ok());
}

#[test]
fn test_selection_rejects_missing_population() {
    let mut component = Component::new(ComponentInfo::default());
    component.create_node(&create_node("ga", GA_NODE, 1)).unwrap();
    component.create_node(&create_node("ga.rng", RNG_NODE, 2)).unwrap();
    component.create_node(&create_node("ga.pop", POPULATION_NODE, 3)).unwrap();
    component.create_node(&create_node("ga.sel", SELECTION_NODE, 4)).unwrap();
    assert!(component.start().is_err());

    component.dispatch("ga.sel.Population", &scalar("ga.rng")).unwrap();
    assert!(component.start().is_err());
}

#[test]
fn test_deleted_child_forgotten() {
    let mut component = Component::new(ComponentInfo::default());
    component.create_node(&create_node("ga", GA_NODE, 10)).unwrap();
    component.create_node(&create_node("ga.rng", RNG_NODE, 20)).unwrap();
    component.create_node(&create_node("ga.pop", POPULATION_NODE, 30)).unwrap();
    component.start().unwrap();

    component.handle_control(&delete_node(30)).unwrap();
    assert!(component.resolve(30).is_err());
    assert!(component.graph().find_node("ga.pop").is_none());
    assert_eq!(component.handle_control(&delete_node(30)).unwrap(), ControlOutcome::Ignored);
    assert!(matches!(component.start(), Err(GraphError::DependencyUnsatisfied(_))));

    component.create_node(&create_node("ga.pop", POPULATION_NODE, 31)).unwrap();
    assert!(component.start().is_ok());
}

#[test]
fn test_deleting_middle_evaluation_relinks_chain() {
    let mut sg = ScatterGatherBuilder::calc("calc")
        .evaluations(3)
        .branches(0)
        .build();

    // calc = 1, e0 = 2, e1 = 3, e2 = 4
    sg.component.handle_control(&delete_node(3)).unwrap();

    let graph = sg.component.graph();
    let calc = graph.find_node("calc").unwrap();
    let e0 = graph.find_node("calc.e0").unwrap();
    let e2 = graph.find_node("calc.e2").unwrap();
    let kick = graph.find_variable(calc, "Kick").unwrap();
    let e0_start = graph.find_variable(e0, "StartEx").unwrap();
    let e0_next = graph.find_variable(e0, "Next").unwrap();
    let e2_start = graph.find_variable(e2, "StartEx").unwrap();
    assert!(graph.is_linked(kick, e0_start));
    assert!(graph.is_linked(e0_next, e2_start));
    assert_eq!(graph.variable(e2_start).unwrap().inbound_count(), 1);

    sg.fire("calc.Start");
    sg.evaluate(0, 1.0);
    sg.send("calc.e2.Evaluation", 2.0);

    let outbound = sg.drain();
    let output = emitted_by(&outbound, "calc.Output");
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].message.field("float"), Some("3"));
}
