//! Node containment and node behaviour.
//!
//! A [`Node`] is a named container of child variables and child nodes. What a
//! node *does* lives in its [`NodeBehavior`], injected after the node's
//! variables are built. Behaviours only see the graph read-only through a
//! [`NodeContext`] and record [`Effect`]s, which the graph applies once the
//! behaviour has returned. That keeps nested cascades that loop back into the
//! same node well defined.

use crate::error::Result;
use crate::graph::cascade::Graph;
use crate::graph::id::{NodeId, VarId};
use crate::graph::message::Message;
use crate::graph::value::{Scalar, Value};
use std::fmt;
use std::time::Duration;

/// A value that reached one of the node's watched variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub var: VarId,
    pub value: Value,
}

/// A deferred graph mutation requested by a behaviour.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// `set_value`: stored, propagated only on change.
    Set(VarId, Value),
    /// `on_event`: propagated unconditionally.
    Emit(VarId, Value),
    /// `on_event` after `delay`, via the runtime scheduler.
    Schedule {
        node: NodeId,
        var: VarId,
        value: Value,
        delay: Duration,
    },
}

/// Node logic.
pub trait NodeBehavior: Send {
    /// Called once per delivery batch with every watched variable that changed.
    fn on_update(&mut self, ctx: &mut NodeContext<'_>, arrivals: &[Arrival]);

    /// Dispatch hook for messages that matched none of the node's variables.
    fn on_message(&mut self, ctx: &mut NodeContext<'_>, message: &Message) {
        tracing::debug!(
            "Node {} ignores unmatched '{}' message",
            ctx.node(),
            message.kind()
        );
    }

    /// Verify required children before a start transition.
    fn check_dependencies(&self, _graph: &Graph, _node: NodeId) -> Result<()> {
        Ok(())
    }
}

/// Read-only view of the graph plus an effect buffer.
pub struct NodeContext<'a> {
    graph: &'a Graph,
    node: NodeId,
    effects: Vec<Effect>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(graph: &'a Graph, node: NodeId) -> Self {
        Self {
            graph,
            node,
            effects: Vec::new(),
        }
    }

    pub(crate) fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    /// The node this behaviour belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Stored value of a state-holding variable.
    pub fn value(&self, var: VarId) -> Option<&'a Value> {
        self.graph.variable(var).ok().and_then(|v| v.value())
    }

    /// Typed read of a stored value.
    pub fn get<T: Scalar>(&self, var: VarId) -> Option<T> {
        self.value(var).and_then(T::from_value)
    }

    /// Store and propagate if changed.
    pub fn set(&mut self, var: VarId, value: impl Into<Value>) {
        self.effects.push(Effect::Set(var, value.into()));
    }

    /// Propagate unconditionally.
    pub fn emit(&mut self, var: VarId, value: impl Into<Value>) {
        self.effects.push(Effect::Emit(var, value.into()));
    }

    /// Fire a void variable.
    pub fn fire(&mut self, var: VarId) {
        self.emit(var, Value::Void);
    }

    /// Emit `value` on `var` after `delay`.
    pub fn schedule(&mut self, var: VarId, value: impl Into<Value>, delay: Duration) {
        self.effects.push(Effect::Schedule {
            node: self.node,
            var,
            value: value.into(),
            delay,
        });
    }

    /// Live children of this node with the given type tag, in insertion order.
    pub fn children_of_type(&self, type_tag: &str) -> Vec<NodeId> {
        self.graph.children_of_type(self.node, type_tag)
    }

    /// Number of live children with the given type tag.
    pub fn child_count(&self, type_tag: &str) -> usize {
        self.children_of_type(type_tag).len()
    }

    /// Variable of another node by short name.
    pub fn variable_of(&self, node: NodeId, short_name: &str) -> Option<VarId> {
        self.graph.find_variable(node, short_name)
    }
}

/// A registered node.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) short_name: String,
    pub(crate) type_tag: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) variables: Vec<VarId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, type_tag: String, parent: Option<NodeId>) -> Self {
        let short_name = name.rsplit('.').next().unwrap_or(&name).to_string();
        Self {
            id,
            name,
            short_name,
            type_tag,
            parent,
            variables: Vec::new(),
            children: Vec::new(),
            behavior: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Full dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn variables(&self) -> &[VarId] {
        &self.variables
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("parent", &self.parent)
            .field("variables", &self.variables.len())
            .field("children", &self.children.len())
            .finish()
    }
}
