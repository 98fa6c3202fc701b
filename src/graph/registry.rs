//! Identity registry for nodes and variables.
//!
//! Identities come from a monotonic counter and key an ordered map, so removed
//! entities are freed while their identities are never reissued during the
//! lifetime of the registry. Counting starts at 1, which keeps every identity
//! positive.

use crate::error::{GraphError, Result};
use crate::graph::id::{EntityId, NodeId, VarId};
use crate::graph::node::Node;
use crate::graph::variable::{Variable, VariableSpec};
use std::collections::{BTreeMap, HashMap};

/// A registered entity.
#[derive(Debug)]
pub enum Entity {
    Node(Node),
    Variable(Variable),
}

/// Identity → entity table with a full-name index.
#[derive(Debug)]
pub struct Registry {
    entities: BTreeMap<u32, Entity>,
    name_index: HashMap<String, EntityId>,
    next: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            name_index: HashMap::new(),
            next: 1,
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn next_raw(&mut self) -> u32 {
        let raw = self.next;
        self.next += 1;
        raw
    }

    fn claim_name(&self, name: &str) -> Result<()> {
        if self.name_index.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Register a node and assign its identity.
    pub fn register_node(
        &mut self,
        name: String,
        type_tag: String,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        self.claim_name(&name)?;
        let id = NodeId(self.next_raw());
        self.name_index.insert(name.clone(), EntityId::Node(id));
        self.entities
            .insert(id.raw(), Entity::Node(Node::new(id, name, type_tag, parent)));
        Ok(id)
    }

    /// Register a variable owned by `owner` and assign its identity.
    pub fn register_variable(
        &mut self,
        owner: NodeId,
        name: String,
        short_name: String,
        spec: VariableSpec,
    ) -> Result<VarId> {
        self.claim_name(&name)?;
        let id = VarId(self.next_raw());
        self.name_index.insert(name.clone(), EntityId::Variable(id));
        self.entities.insert(
            id.raw(),
            Entity::Variable(Variable::from_spec(id, owner, name, short_name, spec)),
        );
        Ok(id)
    }

    /// Resolve a raw identity.
    pub fn lookup(&self, raw: i64) -> Result<EntityId> {
        let entity = u32::try_from(raw).ok().and_then(|i| self.entities.get(&i));
        match entity {
            Some(Entity::Node(n)) => Ok(EntityId::Node(n.id)),
            Some(Entity::Variable(v)) => Ok(EntityId::Variable(v.id)),
            None => Err(GraphError::UnknownIdentity(raw)),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.lookup(id.raw() as i64).ok() == Some(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        match self.entities.get(&id.raw()) {
            Some(Entity::Node(n)) => Ok(n),
            _ => Err(GraphError::UnknownIdentity(id.raw() as i64)),
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.entities.get_mut(&id.raw()) {
            Some(Entity::Node(n)) => Ok(n),
            _ => Err(GraphError::UnknownIdentity(id.raw() as i64)),
        }
    }

    pub fn variable(&self, id: VarId) -> Result<&Variable> {
        match self.entities.get(&id.raw()) {
            Some(Entity::Variable(v)) => Ok(v),
            _ => Err(GraphError::UnknownIdentity(id.raw() as i64)),
        }
    }

    pub fn variable_mut(&mut self, id: VarId) -> Result<&mut Variable> {
        match self.entities.get_mut(&id.raw()) {
            Some(Entity::Variable(v)) => Ok(v),
            _ => Err(GraphError::UnknownIdentity(id.raw() as i64)),
        }
    }

    /// Look up by full dotted name.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.name_index.get(name).copied()
    }

    /// Unregister an entity. Returns it if it was live.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if !self.contains(id) {
            return None;
        }
        let entity = self.entities.remove(&id.raw())?;
        let name = match &entity {
            Entity::Node(n) => &n.name,
            Entity::Variable(v) => &v.name,
        };
        self.name_index.remove(name);
        Some(entity)
    }

    /// Live node identities in registration order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entities.values().filter_map(|entity| match entity {
            Entity::Node(n) => Some(n.id),
            _ => None,
        })
    }

    /// Live variable identities in registration order.
    pub fn variable_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.entities.values().filter_map(|entity| match entity {
            Entity::Variable(v) => Some(v.id),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::value::ValueType;

    #[test]
    fn test_identities_start_at_one_and_increase() {
        let mut reg = Registry::new();
        let a = reg.register_node("a".into(), "FloatNode".into(), None).unwrap();
        let v = reg
            .register_variable(a, "a.x".into(), "x".into(), VariableSpec::input(ValueType::Int))
            .unwrap();
        assert_eq!(a.raw(), 1);
        assert_eq!(v.raw(), 2);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_lookup_unknown_identity() {
        let reg = Registry::new();
        assert!(matches!(reg.lookup(0), Err(GraphError::UnknownIdentity(0))));
        assert!(matches!(reg.lookup(-4), Err(GraphError::UnknownIdentity(-4))));
        assert!(matches!(reg.lookup(99), Err(GraphError::UnknownIdentity(99))));
    }

    #[test]
    fn test_kind_checked_access() {
        let mut reg = Registry::new();
        let a = reg.register_node("a".into(), "FloatNode".into(), None).unwrap();
        assert!(reg.node(a).is_ok());
        assert!(reg.variable(VarId(a.raw())).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = Registry::new();
        reg.register_node("a".into(), "FloatNode".into(), None).unwrap();
        let err = reg.register_node("a".into(), "FloatNode".into(), None);
        assert!(matches!(err, Err(GraphError::DuplicateName(_))));
    }

    #[test]
    fn test_churn_frees_entries() {
        let mut reg = Registry::new();
        let keep = reg.register_node("keep".into(), "CalcNode".into(), None).unwrap();
        let mut last = keep.raw();
        for _ in 0..1000 {
            let n = reg
                .register_node("keep.e".into(), "EvaluationNode".into(), Some(keep))
                .unwrap();
            assert!(n.raw() > last);
            last = n.raw();
            reg.remove(EntityId::Node(n)).unwrap();
        }
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.entities.len(), 1);
        assert_eq!(reg.node_ids().collect::<Vec<_>>(), vec![keep]);
    }

    #[test]
    fn test_remove_frees_identity_for_good() {
        let mut reg = Registry::new();
        let a = reg.register_node("a".into(), "FloatNode".into(), None).unwrap();
        assert!(reg.remove(EntityId::Node(a)).is_some());
        assert!(reg.remove(EntityId::Node(a)).is_none());
        assert!(reg.find_by_name("a").is_none());
        assert!(reg.is_empty());

        // Identity is not reissued
        let b = reg.register_node("a".into(), "FloatNode".into(), None).unwrap();
        assert_ne!(a, b);
    }
}
