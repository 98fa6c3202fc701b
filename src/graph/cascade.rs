//! The graph: registry, links and the synchronous propagation cascade.
//!
//! Every value change runs to completion before the triggering call returns:
//!
//! 1. The new value is checked (type, restriction) and, for state-holding
//!    variables, compared with the stored one. Unchanged values stop here.
//! 2. Published variables push an [`Outbound`] message into the outbox.
//! 3. Outbound links are walked in registration order. Each target receives
//!    the value (directly or via a message round-trip) and repeats from 1.
//! 4. Targets with an [`ArrivalHook::Owner`] hook notify their node's
//!    behaviour, whose recorded effects are applied afterwards, depth first.
//!
//! The graph is not internally synchronized. All mutation is confined to one
//! logical thread (see [`crate::runtime::Engine`]).

use crate::error::{GraphError, Result};
use crate::graph::id::{EntityId, LinkId, NodeId, VarId};
use crate::graph::link::{DeliveryMode, Link};
use crate::graph::message::Message;
use crate::graph::node::{Arrival, Effect, NodeBehavior, NodeContext};
use crate::graph::registry::Registry;
use crate::graph::value::{Scalar, Value};
use crate::graph::variable::{ArrivalHook, Variable, VariableSpec};
use crate::graph::Node;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Default limit on nested propagation.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 256;

/// A value emitted by a published variable, bound for the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    /// Full name of the emitting variable.
    pub variable: String,
    pub message: Message,
}

/// A delayed emission waiting to be handed to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRequest {
    pub node: NodeId,
    pub var: VarId,
    pub value: Value,
    pub delay: Duration,
}

/// Owner of all nodes, variables and links.
pub struct Graph {
    registry: Registry,
    links: BTreeMap<LinkId, Link>,
    next_link: u32,
    outbox: Vec<Outbound>,
    timers: Vec<TimerRequest>,
    depth: usize,
    max_depth: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_CASCADE_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            registry: Registry::new(),
            links: BTreeMap::new(),
            next_link: 0,
            outbox: Vec::new(),
            timers: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of live nodes and variables.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.registry.node(id)
    }

    pub fn variable(&self, id: VarId) -> Result<&Variable> {
        self.registry.variable(id)
    }

    /// Resolve a full dotted name.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.registry.find_by_name(name)
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        match self.find(name) {
            Some(EntityId::Node(id)) => Some(id),
            _ => None,
        }
    }

    /// Variable of `node` by short name.
    pub fn find_variable(&self, node: NodeId, short_name: &str) -> Option<VarId> {
        let node = self.registry.node(node).ok()?;
        match self.find(&format!("{}.{}", node.name, short_name)) {
            Some(EntityId::Variable(id)) => Some(id),
            _ => None,
        }
    }

    // ── Containment ──

    /// Register a node with an explicit full name.
    ///
    /// A child's name must extend its parent's name by at least one dotted
    /// segment.
    pub fn add_node_named(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        type_tag: &str,
    ) -> Result<NodeId> {
        if let Some(parent) = parent {
            let parent_name = &self.registry.node(parent)?.name;
            if !is_strict_child_name(parent_name, name) {
                return Err(GraphError::InvalidPlacement(format!(
                    "'{}' is not named under '{}'",
                    name, parent_name
                )));
            }
        }
        let id = self
            .registry
            .register_node(name.to_string(), type_tag.to_string(), parent)?;
        if let Some(parent) = parent {
            self.registry.node_mut(parent)?.children.push(id);
        }
        tracing::debug!("Registered node '{}' ({}) as {}", name, type_tag, id);
        Ok(id)
    }

    /// Register a root node.
    pub fn add_root(&mut self, name: &str, type_tag: &str) -> Result<NodeId> {
        self.add_node_named(None, name, type_tag)
    }

    /// Register a child node named `<parent>.<short_name>`.
    pub fn add_node(&mut self, parent: NodeId, short_name: &str, type_tag: &str) -> Result<NodeId> {
        let name = format!("{}.{}", self.registry.node(parent)?.name, short_name);
        self.add_node_named(Some(parent), &name, type_tag)
    }

    /// Register a variable named `<node>.<short_name>`.
    ///
    /// State-holding variables with a default are initialised immediately.
    pub fn add_variable(
        &mut self,
        node: NodeId,
        short_name: &str,
        spec: VariableSpec,
    ) -> Result<VarId> {
        let name = format!("{}.{}", self.registry.node(node)?.name, short_name);
        if spec.default.is_some() && !spec.state_holding {
            return Err(GraphError::NotStateHolding(name));
        }
        if let Some(restriction) = &spec.restriction {
            if restriction.applies_to() != spec.value_type {
                return Err(GraphError::Malformed(format!(
                    "{} restriction on {} variable '{}'",
                    restriction.applies_to(),
                    spec.value_type,
                    name
                )));
            }
        }
        let default = spec.default.clone();
        let id = self
            .registry
            .register_variable(node, name, short_name.to_string(), spec)?;
        self.registry.node_mut(node)?.variables.push(id);
        if let Some(default) = default {
            self.set_default(id, default)?;
        }
        Ok(id)
    }

    /// Install the behaviour of a node.
    pub fn set_behavior(&mut self, node: NodeId, behavior: Box<dyn NodeBehavior>) -> Result<()> {
        self.registry.node_mut(node)?.behavior = Some(behavior);
        Ok(())
    }

    /// Detach `child` from `parent` without deleting it.
    pub fn remove_node(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.registry.node_mut(parent)?;
        let before = parent_node.children.len();
        parent_node.children.retain(|c| *c != child);
        if parent_node.children.len() == before {
            return Err(GraphError::InvalidPlacement(format!(
                "{} is not a child of {}",
                child, parent
            )));
        }
        self.registry.node_mut(child)?.parent = None;
        Ok(())
    }

    /// Attach a detached node under `parent`. Names must stay prefixed.
    pub fn attach_node(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_name = self.registry.node(parent)?.name.clone();
        let child_node = self.registry.node(child)?;
        if child_node.parent.is_some() || !is_strict_child_name(&parent_name, &child_node.name) {
            return Err(GraphError::InvalidPlacement(format!(
                "cannot attach '{}' under '{}'",
                child_node.name, parent_name
            )));
        }
        self.registry.node_mut(child)?.parent = Some(parent);
        self.registry.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Snapshot of a node's variables. Later mutations are not reflected.
    pub fn all_variables(&self, node: NodeId) -> Result<std::vec::IntoIter<VarId>> {
        Ok(self.registry.node(node)?.variables.clone().into_iter())
    }

    /// Snapshot of a node's direct children.
    pub fn all_nodes(&self, node: NodeId) -> Result<std::vec::IntoIter<NodeId>> {
        Ok(self.registry.node(node)?.children.clone().into_iter())
    }

    /// Live children of `node` with the given type tag.
    pub fn children_of_type(&self, node: NodeId, type_tag: &str) -> Vec<NodeId> {
        let Ok(node) = self.registry.node(node) else {
            return Vec::new();
        };
        node.children
            .iter()
            .copied()
            .filter(|c| {
                self.registry
                    .node(*c)
                    .map(|n| n.type_tag == type_tag)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Delete `node` and everything it transitively owns.
    ///
    /// Links touching any removed variable are dropped and the node is
    /// detached from its parent. Returns every unregistered identity.
    pub fn remove_all(&mut self, node: NodeId) -> Result<Vec<EntityId>> {
        let mut nodes = Vec::new();
        self.collect_subtree(node, &mut nodes)?;

        let mut vars = Vec::new();
        for n in &nodes {
            vars.extend_from_slice(&self.registry.node(*n)?.variables);
        }

        let doomed: HashSet<VarId> = vars.iter().copied().collect();
        let dead_links: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| doomed.contains(&l.source) || doomed.contains(&l.target))
            .map(|l| l.id)
            .collect();
        for link in dead_links {
            self.disconnect(link)?;
        }

        if let Some(parent) = self.registry.node(node)?.parent {
            if let Ok(parent) = self.registry.node_mut(parent) {
                parent.children.retain(|c| *c != node);
            }
        }

        let mut removed = Vec::with_capacity(vars.len() + nodes.len());
        for v in vars {
            if self.registry.remove(EntityId::Variable(v)).is_some() {
                removed.push(EntityId::Variable(v));
            }
        }
        for n in nodes.into_iter().rev() {
            if self.registry.remove(EntityId::Node(n)).is_some() {
                removed.push(EntityId::Node(n));
            }
        }
        tracing::info!("Removed {} entities rooted at {}", removed.len(), node);
        Ok(removed)
    }

    fn collect_subtree(&self, node: NodeId, out: &mut Vec<NodeId>) -> Result<()> {
        out.push(node);
        for &child in &self.registry.node(node)?.children {
            self.collect_subtree(child, out)?;
        }
        Ok(())
    }

    /// Run every behaviour's dependency check, parent first.
    pub fn check_dependencies(&self, node: NodeId) -> Result<()> {
        let n = self.registry.node(node)?;
        if let Some(behavior) = &n.behavior {
            behavior.check_dependencies(self, node)?;
        }
        for &child in &n.children {
            self.check_dependencies(child)?;
        }
        Ok(())
    }

    // ── Links ──

    /// Link `source` to `target`.
    pub fn connect(&mut self, source: VarId, target: VarId, mode: DeliveryMode) -> Result<LinkId> {
        if source == target {
            return Err(GraphError::Malformed(format!("{} cannot link to itself", source)));
        }
        let src = self.registry.variable(source)?;
        let tgt = self.registry.variable(target)?;
        if mode == DeliveryMode::Direct && src.value_type != tgt.value_type {
            return Err(GraphError::TypeMismatch {
                source_type: src.value_type.to_string(),
                target_type: tgt.value_type.to_string(),
            });
        }
        if tgt.inbound >= tgt.max_inbound {
            return Err(GraphError::InboundLimit {
                variable: tgt.name.clone(),
                max: tgt.max_inbound,
            });
        }

        let id = LinkId(self.next_link);
        self.next_link += 1;
        self.links.insert(
            id,
            Link {
                id,
                source,
                target,
                mode,
            },
        );
        self.registry.variable_mut(source)?.links.push(id);
        self.registry.variable_mut(target)?.inbound += 1;
        Ok(id)
    }

    /// Remove a link.
    pub fn disconnect(&mut self, link: LinkId) -> Result<()> {
        let removed = self
            .links
            .remove(&link)
            .ok_or(GraphError::UnknownIdentity(link.0 as i64))?;
        if let Ok(src) = self.registry.variable_mut(removed.source) {
            src.links.retain(|l| *l != link);
        }
        if let Ok(tgt) = self.registry.variable_mut(removed.target) {
            tgt.inbound = tgt.inbound.saturating_sub(1);
        }
        Ok(())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn is_linked(&self, source: VarId, target: VarId) -> bool {
        self.registry.variable(source).is_ok_and(|src| {
            src.links
                .iter()
                .filter_map(|id| self.links.get(id))
                .any(|l| l.target == target)
        })
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    // ── Variable contract ──

    /// Stored value of a state-holding variable.
    pub fn get_value(&self, var: VarId) -> Result<&Value> {
        let v = self.registry.variable(var)?;
        if !v.state_holding {
            return Err(GraphError::NotStateHolding(v.name.clone()));
        }
        v.value
            .as_ref()
            .ok_or_else(|| GraphError::Uninitialized(v.name.clone()))
    }

    /// Typed [`get_value`](Self::get_value).
    pub fn get<T: Scalar>(&self, var: VarId) -> Result<T> {
        let value = self.get_value(var)?;
        T::from_value(value).ok_or_else(|| GraphError::TypeMismatch {
            source_type: value.value_type().to_string(),
            target_type: T::TYPE.to_string(),
        })
    }

    /// Store `value` and propagate if it differs from the stored one.
    ///
    /// Returns whether the value was applied. Restriction violations are
    /// logged and leave the variable untouched.
    pub fn set_value(&mut self, var: VarId, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if !self.assign(var, &value)? {
            return Ok(false);
        }
        self.propagate(var, &value)?;
        Ok(true)
    }

    /// Typed [`set_value`](Self::set_value).
    pub fn set<T: Scalar>(&mut self, var: VarId, value: T) -> Result<bool> {
        self.set_value(var, value)
    }

    /// Propagate `value` unconditionally (storing it when state-holding).
    pub fn on_event(&mut self, var: VarId, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        {
            let v = self.registry.variable_mut(var)?;
            check_type(v, &value)?;
            if !v.accepts(&value) {
                tracing::warn!("Rejected {} for '{}': restriction violated", value, v.name);
                return Ok(false);
            }
            if v.state_holding {
                v.value = Some(value.clone());
            }
        }
        self.propagate(var, &value)?;
        Ok(true)
    }

    /// Fire a void variable.
    pub fn fire(&mut self, var: VarId) -> Result<bool> {
        self.on_event(var, Value::Void)
    }

    /// Set the default and apply it as the current value.
    pub fn set_default(&mut self, var: VarId, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        {
            let v = self.registry.variable_mut(var)?;
            if !v.state_holding {
                return Err(GraphError::NotStateHolding(v.name.clone()));
            }
            check_type(v, &value)?;
            if !v.accepts(&value) {
                tracing::warn!("Rejected default {} for '{}': restriction violated", value, v.name);
                return Ok(false);
            }
            v.default = Some(value.clone());
        }
        self.set_value(var, value)?;
        Ok(true)
    }

    /// Restore the default of an undriven state-holding variable.
    ///
    /// No-op when the variable has inbound links or no default.
    pub fn reset(&mut self, var: VarId) -> Result<bool> {
        let v = self.registry.variable(var)?;
        if !v.state_holding || v.inbound > 0 {
            return Ok(false);
        }
        match v.default.clone() {
            Some(default) => self.set_value(var, default),
            None => Ok(false),
        }
    }

    /// Encode the stored value. `None` if never assigned.
    pub fn create_message(&self, var: VarId) -> Result<Option<Message>> {
        Ok(self.registry.variable(var)?.create_message())
    }

    /// Decode a message for `var` without applying it.
    pub fn extract_data(&self, var: VarId, message: &Message) -> Result<Option<Value>> {
        Ok(self.registry.variable(var)?.extract_data(message))
    }

    // ── Delivery ──

    /// Deliver a scalar message to a variable.
    pub fn deliver(&mut self, var: VarId, message: &Message) -> Result<bool> {
        let v = self.registry.variable(var)?;
        if message.type_differs(&v.name) {
            tracing::trace!("'{}' message delivered to '{}'", message.kind(), v.name);
        }
        match v.extract_data(message) {
            Some(value) => self.arrive(var, value),
            None => Ok(false),
        }
    }

    /// Deliver a typed value to a variable.
    pub fn deliver_value(&mut self, var: VarId, value: impl Into<Value>) -> Result<bool> {
        self.arrive(var, value.into())
    }

    /// Deliver a multi-field message to a node.
    ///
    /// Each field names a child variable by short name. The whole message is
    /// validated first and dropped if any matched field is invalid. Valid
    /// fields are applied in variable order and the behaviour is notified once.
    /// A message matching no variable goes to the behaviour's dispatch hook.
    pub fn deliver_to_node(&mut self, node: NodeId, message: &Message) -> Result<()> {
        let mut batch = Vec::new();
        let mut unmatched = Vec::new();
        for (field, text) in message.fields() {
            let Some(var) = self.find_variable(node, field) else {
                unmatched.push(field.to_string());
                continue;
            };
            let v = self.registry.variable(var)?;
            let Some(value) = v.value_type.parse(text) else {
                tracing::warn!(
                    "Dropping message for '{}': cannot parse {:?} as {}",
                    v.name,
                    text,
                    v.value_type
                );
                return Ok(());
            };
            if !v.accepts(&value) {
                tracing::warn!("Dropping message for '{}': {} violates restriction", v.name, value);
                return Ok(());
            }
            batch.push((var, value));
        }

        if batch.is_empty() {
            return self.dispatch_message(node, message);
        }
        if !unmatched.is_empty() {
            tracing::debug!("Node {} ignored fields {:?}", node, unmatched);
        }

        batch.sort_by_key(|(var, _)| *var);
        let mut arrivals = Vec::new();
        for (var, value) in batch {
            if self.apply(var, value.clone())?
                && self.registry.variable(var)?.hook == ArrivalHook::Owner
            {
                arrivals.push(Arrival { var, value });
            }
        }
        if !arrivals.is_empty() {
            self.notify(node, &arrivals)?;
        }
        Ok(())
    }

    /// Deliver to a node or variable by full name.
    pub fn dispatch(&mut self, name: &str, message: &Message) -> Result<()> {
        match self.find(name) {
            Some(EntityId::Variable(var)) => self.deliver(var, message).map(|_| ()),
            Some(EntityId::Node(node)) => self.deliver_to_node(node, message),
            None => Err(GraphError::UnknownName(name.to_string())),
        }
    }

    // ── Runtime hand-off ──

    /// Take every outbound message produced so far.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn outbox(&self) -> &[Outbound] {
        &self.outbox
    }

    /// Take every delayed emission requested so far.
    pub fn drain_timers(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timers)
    }

    // ── Cascade internals ──

    fn assign(&mut self, var: VarId, value: &Value) -> Result<bool> {
        let v = self.registry.variable_mut(var)?;
        if !v.state_holding {
            return Err(GraphError::NotStateHolding(v.name.clone()));
        }
        check_type(v, value)?;
        if !v.accepts(value) {
            tracing::warn!("Rejected {} for '{}': restriction violated", value, v.name);
            return Ok(false);
        }
        if let Some(current) = &v.value {
            if !current.differs_from(value) {
                return Ok(false);
            }
        }
        v.value = Some(value.clone());
        Ok(true)
    }

    /// Assign with the semantics the variable's flags call for.
    fn apply(&mut self, var: VarId, value: Value) -> Result<bool> {
        if self.registry.variable(var)?.state_holding {
            self.set_value(var, value)
        } else {
            self.on_event(var, value)
        }
    }

    fn arrive(&mut self, var: VarId, value: Value) -> Result<bool> {
        let (hook, owner) = {
            let v = self.registry.variable(var)?;
            (v.hook, v.owner)
        };
        let applied = self.apply(var, value.clone())?;
        if applied && hook == ArrivalHook::Owner {
            self.notify(owner, &[Arrival { var, value }])?;
        }
        Ok(applied)
    }

    fn propagate(&mut self, var: VarId, value: &Value) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(GraphError::CascadeDepth(self.max_depth));
        }
        self.depth += 1;
        let result = self.propagate_links(var, value);
        self.depth -= 1;
        result
    }

    fn propagate_links(&mut self, var: VarId, value: &Value) -> Result<()> {
        let links = {
            let v = self.registry.variable(var)?;
            if v.publish {
                let outbound = Outbound {
                    variable: v.name.clone(),
                    message: Message::scalar(value),
                };
                self.outbox.push(outbound);
            }
            v.links.clone()
        };

        for link_id in links {
            let Some(link) = self.link(link_id).cloned() else {
                continue;
            };
            match link.mode {
                DeliveryMode::Direct => {
                    self.arrive(link.target, value.clone())?;
                }
                DeliveryMode::Message => {
                    let message = Message::scalar(value);
                    let target = self.registry.variable(link.target)?;
                    if message.type_differs(&target.name) {
                        tracing::trace!(
                            "'{}' message crosses {:?} into '{}'",
                            message.kind(),
                            link.id,
                            target.name
                        );
                    }
                    if let Some(decoded) = target.extract_data(&message) {
                        self.arrive(link.target, decoded)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn notify(&mut self, node: NodeId, arrivals: &[Arrival]) -> Result<()> {
        self.with_behavior(node, |behavior, ctx| behavior.on_update(ctx, arrivals))
    }

    fn dispatch_message(&mut self, node: NodeId, message: &Message) -> Result<()> {
        self.with_behavior(node, |behavior, ctx| behavior.on_message(ctx, message))
    }

    /// Run a behaviour hook, then apply the effects it recorded.
    fn with_behavior<F>(&mut self, node: NodeId, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn NodeBehavior, &mut NodeContext<'_>),
    {
        let Some(mut behavior) = self.registry.node_mut(node)?.behavior.take() else {
            tracing::trace!("Node {} has no behaviour installed", node);
            return Ok(());
        };
        let effects = {
            let mut ctx = NodeContext::new(self, node);
            f(behavior.as_mut(), &mut ctx);
            ctx.into_effects()
        };
        if let Ok(n) = self.registry.node_mut(node) {
            n.behavior = Some(behavior);
        }
        self.apply_effects(effects)
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Set(var, value) => {
                    self.set_value(var, value)?;
                }
                Effect::Emit(var, value) => {
                    self.on_event(var, value)?;
                }
                Effect::Schedule {
                    node,
                    var,
                    value,
                    delay,
                } => self.timers.push(TimerRequest {
                    node,
                    var,
                    value,
                    delay,
                }),
            }
        }
        Ok(())
    }
}

fn check_type(var: &Variable, value: &Value) -> Result<()> {
    if value.value_type() != var.value_type {
        return Err(GraphError::TypeMismatch {
            source_type: value.value_type().to_string(),
            target_type: var.value_type.to_string(),
        });
    }
    Ok(())
}

fn is_strict_child_name(parent: &str, child: &str) -> bool {
    child.len() > parent.len() + 1
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'.'
}
