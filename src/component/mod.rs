//! Component: the graph plus its mutation protocol
//!
//! A component owns one [`Graph`] and grows or shrinks it in response to
//! `CreateNode` / `DeleteNode` control messages:
//!
//! ```text
//! Empty ──CreateNode(root)──► Rooted ──CreateNode(child)*──► Populated
//!   ▲                            ▲                               │
//!   └──────DeleteNode(root)──────┴───────DeleteNode(child)*──────┘
//! ```
//!
//! The component holds identities only. Everything it caches (the root and
//! the `vnid` alias table) is pruned on every deletion, so no stale identity
//! survives a delete.

pub mod schema;

pub use schema::{BuildFn, NodeSchema, Placement, RelinkFn, SchemaTable};

use crate::config::ComponentInfo;
use crate::error::{ErrorClass, GraphError, Result, ResultExt};
use crate::graph::restriction::TextRule;
use crate::graph::{EntityId, Graph, Message, NodeId, CREATE_NODE, DELETE_NODE};
use std::collections::{HashMap, HashSet};

/// Field carrying the full node name of a `CreateNode` message.
pub const FIELD_NAME: &str = "vnName";
/// Field carrying the schema tag of a `CreateNode` message.
pub const FIELD_TYPE: &str = "vnType";
/// Field carrying the identity (hint) of a Create/DeleteNode message.
pub const FIELD_ID: &str = "vnid";

/// Name of the root variable fired by [`Component::start`].
pub const START_VARIABLE: &str = "Start";

/// Lifecycle state derived from the live graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Empty,
    Rooted,
    Populated,
}

/// What a control message did.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    Created(NodeId),
    /// Every identity that was unregistered.
    Deleted(Vec<EntityId>),
    /// Malformed or unresolvable message, logged and dropped.
    Ignored,
}

pub struct Component {
    info: ComponentInfo,
    graph: Graph,
    schemas: SchemaTable,
    root: Option<NodeId>,
    hints: HashMap<i64, NodeId>,
}

impl Component {
    /// Component with the built-in schemas.
    pub fn new(info: ComponentInfo) -> Self {
        Self::with_parts(info, Graph::new(), SchemaTable::builtin())
    }

    pub fn with_parts(info: ComponentInfo, graph: Graph, schemas: SchemaTable) -> Self {
        Self {
            info,
            graph,
            schemas,
            root: None,
            hints: HashMap::new(),
        }
    }

    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn schemas(&self) -> &SchemaTable {
        &self.schemas
    }

    pub fn schemas_mut(&mut self) -> &mut SchemaTable {
        &mut self.schemas
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn state(&self) -> ComponentState {
        match self.root.and_then(|r| self.graph.node(r).ok()) {
            None => ComponentState::Empty,
            Some(root) if root.children().is_empty() => ComponentState::Rooted,
            Some(_) => ComponentState::Populated,
        }
    }

    /// Resolve a `vnid`: the alias table first, then the registry.
    pub fn resolve(&self, vnid: i64) -> Result<EntityId> {
        if let Some(node) = self.hints.get(&vnid) {
            return Ok(EntityId::Node(*node));
        }
        self.graph.registry().lookup(vnid)
    }

    /// Handle a control message.
    ///
    /// Bad input is logged and reported as [`ControlOutcome::Ignored`]. Only
    /// usage errors, which point at broken node code, are returned.
    pub fn handle_control(&mut self, message: &Message) -> Result<ControlOutcome> {
        let result = match message.kind() {
            CREATE_NODE => self.create_node(message).map(ControlOutcome::Created),
            DELETE_NODE => self.delete_node(message).map(ControlOutcome::Deleted),
            other => Err(GraphError::Malformed(format!("unknown control message '{}'", other))),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.class() == ErrorClass::Usage => Err(e),
            Err(e) => {
                tracing::warn!("Ignoring {} message: {}", message.kind(), e);
                Ok(ControlOutcome::Ignored)
            }
        }
    }

    /// Create a node from a `CreateNode` message.
    ///
    /// On failure the graph is left exactly as it was.
    pub fn create_node(&mut self, message: &Message) -> Result<NodeId> {
        let name = message.check_field(FIELD_NAME)?;
        let type_tag = message.check_field(FIELD_TYPE)?;
        let hint = message.check_int(FIELD_ID)?;

        if !TextRule::DottedIdentifier.valid(name) {
            return Err(GraphError::Malformed(format!("invalid node name {:?}", name)));
        }
        let schema = *self
            .schemas
            .get(type_tag)
            .ok_or_else(|| GraphError::UnknownNodeType(type_tag.to_string()))?;

        let parent = self.parent_for(name);
        let parent_tag = match parent {
            Some(p) => Some(self.graph.node(p)?.type_tag().to_string()),
            None => None,
        };
        if !schema.placement.permits(parent_tag.as_deref()) {
            return Err(GraphError::InvalidPlacement(format!(
                "{} '{}' cannot be placed under {}",
                type_tag,
                name,
                parent_tag.as_deref().unwrap_or("the root position")
            )));
        }
        if parent.is_none() && self.root.is_some() {
            return Err(GraphError::InvalidPlacement(format!(
                "component already has a root, '{}' has no parent",
                name
            )));
        }

        let node = self.graph.add_node_named(parent, name, type_tag)?;
        match (schema.build)(&mut self.graph, node) {
            Ok(behavior) => self.graph.set_behavior(node, behavior)?,
            Err(e) => {
                self.graph.remove_all(node)?;
                return Err(e.with_context(format!("building {} '{}'", type_tag, name)));
            }
        }

        match parent {
            Some(p) => {
                if let Err(e) = self.relink(p) {
                    self.graph.remove_all(node)?;
                    if let Err(restore) = self.relink(p) {
                        tracing::warn!("{} left partially linked: {}", p, restore);
                    }
                    return Err(e);
                }
            }
            None => self.root = Some(node),
        }
        if hint > 0 {
            if let Some(previous) = self.hints.insert(hint, node) {
                tracing::warn!("vnid {} re-bound from {} to {}", hint, previous, node);
            }
        }

        tracing::info!("Created {} '{}' as {} (vnid {})", type_tag, name, node, hint);
        Ok(node)
    }

    /// Delete a node and its subtree from a `DeleteNode` message.
    pub fn delete_node(&mut self, message: &Message) -> Result<Vec<EntityId>> {
        let vnid = message.check_int(FIELD_ID)?;
        if vnid <= 0 {
            return Err(GraphError::InvalidIdentity(vnid));
        }
        let node = match self.resolve(vnid)? {
            EntityId::Node(node) => node,
            EntityId::Variable(_) => return Err(GraphError::InvalidIdentity(vnid)),
        };
        let parent = self.graph.node(node)?.parent();

        let removed = self.graph.remove_all(node)?;
        self.forget(&removed);
        if let Some(p) = parent {
            self.relink(p)?;
        }

        tracing::info!("Deleted {} (vnid {}), {} identities released", node, vnid, removed.len());
        Ok(removed)
    }

    /// Run the root's dependency checks and fire its start variable.
    pub fn start(&mut self) -> Result<()> {
        let root = self
            .root
            .ok_or_else(|| GraphError::DependencyUnsatisfied("component has no root".into()))?;
        self.graph.check_dependencies(root)?;
        match self.graph.find_variable(root, START_VARIABLE) {
            Some(start) => {
                self.graph.fire(start)?;
            }
            None => tracing::debug!("Root {} has no {} variable", root, START_VARIABLE),
        }
        Ok(())
    }

    /// Deliver a data message by full name.
    pub fn dispatch(&mut self, target: &str, message: &Message) -> Result<()> {
        self.graph.dispatch(target, message)
    }

    /// Existing node whose name is the longest dotted prefix of `name`.
    fn parent_for(&self, name: &str) -> Option<NodeId> {
        let mut prefix = name;
        while let Some((head, _)) = prefix.rsplit_once('.') {
            if let Some(node) = self.graph.find_node(head) {
                return Some(node);
            }
            prefix = head;
        }
        None
    }

    fn relink(&mut self, node: NodeId) -> Result<()> {
        let tag = self.graph.node(node)?.type_tag().to_string();
        if let Some(relink) = self.schemas.get(&tag).and_then(|s| s.relink) {
            relink(&mut self.graph, node).with_context(|| format!("relinking {} {}", tag, node))?;
        }
        Ok(())
    }

    /// Drop every cached identity that was just removed.
    fn forget(&mut self, removed: &[EntityId]) {
        let gone: HashSet<NodeId> = removed
            .iter()
            .filter_map(|id| match id {
                EntityId::Node(n) => Some(*n),
                EntityId::Variable(_) => None,
            })
            .collect();
        self.hints.retain(|_, node| !gone.contains(node));
        if self.root.is_some_and(|r| gone.contains(&r)) {
            self.root = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{FLOAT_NODE, GA_NODE, POPULATION_NODE, RNG_NODE};

    fn create(name: &str, tag: &str, vnid: i64) -> Message {
        Message::new(CREATE_NODE)
            .with_field(FIELD_NAME, name)
            .with_field(FIELD_TYPE, tag)
            .with_field(FIELD_ID, vnid.to_string())
    }

    fn delete(vnid: i64) -> Message {
        Message::new(DELETE_NODE).with_field(FIELD_ID, vnid.to_string())
    }

    #[test]
    fn test_state_transitions() {
        let mut c = Component::new(ComponentInfo::default());
        assert_eq!(c.state(), ComponentState::Empty);

        c.handle_control(&create("ga", GA_NODE, 1)).unwrap();
        assert_eq!(c.state(), ComponentState::Rooted);

        c.handle_control(&create("ga.rng", RNG_NODE, 2)).unwrap();
        assert_eq!(c.state(), ComponentState::Populated);

        c.handle_control(&delete(2)).unwrap();
        assert_eq!(c.state(), ComponentState::Rooted);

        c.handle_control(&delete(1)).unwrap();
        assert_eq!(c.state(), ComponentState::Empty);
        assert!(c.graph().is_empty());
    }

    #[test]
    fn test_missing_fields_ignored() {
        let mut c = Component::new(ComponentInfo::default());
        let msg = Message::new(CREATE_NODE).with_field(FIELD_NAME, "adder");
        assert_eq!(c.handle_control(&msg).unwrap(), ControlOutcome::Ignored);
        assert!(c.graph().is_empty());
    }

    #[test]
    fn test_unknown_type_leaves_graph_unchanged() {
        let mut c = Component::new(ComponentInfo::default());
        let outcome = c.handle_control(&create("x", "Teleporter", 1)).unwrap();
        assert_eq!(outcome, ControlOutcome::Ignored);
        assert!(c.graph().is_empty());
        assert!(matches!(
            c.create_node(&create("x", "Teleporter", 1)),
            Err(GraphError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_invalid_vnid_rejected() {
        let mut c = Component::new(ComponentInfo::default());
        assert!(matches!(c.delete_node(&delete(0)), Err(GraphError::InvalidIdentity(0))));
        assert!(matches!(c.delete_node(&delete(-3)), Err(GraphError::InvalidIdentity(-3))));
        assert!(matches!(c.delete_node(&delete(42)), Err(GraphError::UnknownIdentity(42))));
    }

    #[test]
    fn test_placement_enforced() {
        let mut c = Component::new(ComponentInfo::default());
        assert!(matches!(
            c.create_node(&create("rng", RNG_NODE, 1)),
            Err(GraphError::InvalidPlacement(_))
        ));

        c.create_node(&create("adder", FLOAT_NODE, 1)).unwrap();
        assert!(matches!(
            c.create_node(&create("adder.pop", POPULATION_NODE, 2)),
            Err(GraphError::InvalidPlacement(_))
        ));
        assert!(matches!(
            c.create_node(&create("other", FLOAT_NODE, 3)),
            Err(GraphError::InvalidPlacement(_))
        ));
    }

    #[test]
    fn test_longest_prefix_parent() {
        let mut c = Component::new(ComponentInfo::default());
        c.create_node(&create("a", FLOAT_NODE, 1)).unwrap();
        let b = c.create_node(&create("a.b", FLOAT_NODE, 2)).unwrap();
        let deep = c.create_node(&create("a.b.x.y", FLOAT_NODE, 3)).unwrap();
        assert_eq!(c.graph().node(deep).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_start_requires_dependencies() {
        let mut c = Component::new(ComponentInfo::default());
        assert!(matches!(c.start(), Err(GraphError::DependencyUnsatisfied(_))));

        c.create_node(&create("ga", GA_NODE, 1)).unwrap();
        c.create_node(&create("ga.rng", RNG_NODE, 2)).unwrap();
        assert!(matches!(c.start(), Err(GraphError::DependencyUnsatisfied(_))));

        c.create_node(&create("ga.pop", POPULATION_NODE, 3)).unwrap();
        assert!(c.start().is_ok());
    }

    fn refuse_children(graph: &mut Graph, node: NodeId) -> Result<()> {
        match graph.node(node)?.children().len() {
            0 => Ok(()),
            n => Err(GraphError::DependencyUnsatisfied(format!(
                "{} cannot hold {} children",
                node, n
            ))),
        }
    }

    #[test]
    fn test_relink_failure_rolls_back_child() {
        let mut c = Component::new(ComponentInfo::default());
        c.schemas_mut().register(NodeSchema {
            type_tag: "Loner",
            placement: Placement::Root,
            build: crate::nodes::arith::build,
            relink: Some(refuse_children),
        });
        c.create_node(&create("solo", "Loner", 1)).unwrap();
        let before = c.graph().len();

        let outcome = c.handle_control(&create("solo.x", FLOAT_NODE, 2)).unwrap();
        assert_eq!(outcome, ControlOutcome::Ignored);
        assert_eq!(c.graph().len(), before);
        assert!(c.graph().find_node("solo.x").is_none());
        assert!(c.resolve(2).is_err());
        assert_eq!(c.state(), ComponentState::Rooted);
    }

    #[test]
    fn test_hint_alias_pruned_on_delete() {
        let mut c = Component::new(ComponentInfo::default());
        c.create_node(&create("ga", GA_NODE, 100)).unwrap();
        c.create_node(&create("ga.pop", POPULATION_NODE, 200)).unwrap();
        assert!(c.resolve(200).is_ok());

        c.delete_node(&delete(100)).unwrap();
        assert!(c.root().is_none());
        assert!(c.resolve(100).is_err());
        assert!(c.resolve(200).is_err());
    }
}
