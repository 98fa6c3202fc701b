//! Node schema table
//!
//! Maps a `vnType` tag to the recipe that builds a node of that type: where
//! it may be placed, how its variables and behaviour are created, and how the
//! structural links between it and its children are re-established when the
//! child set changes.

use crate::error::Result;
use crate::graph::{Graph, NodeBehavior, NodeId};
use std::collections::HashMap;

/// Creates a node's variables and returns its behaviour.
pub type BuildFn = fn(&mut Graph, NodeId) -> Result<Box<dyn NodeBehavior>>;

/// Re-establishes structural links after the node's children changed.
pub type RelinkFn = fn(&mut Graph, NodeId) -> Result<()>;

/// Where a node type may sit in the containment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Only as the component root.
    Root,
    /// Only as a child of one of the listed types.
    Under(&'static [&'static str]),
    /// As the root or as a child of one of the listed types.
    RootOrUnder(&'static [&'static str]),
    /// As the root or under any node.
    Anywhere,
}

impl Placement {
    /// Whether a node may be placed under a parent of type `parent`
    /// (`None` for the root position).
    pub fn permits(&self, parent: Option<&str>) -> bool {
        match (self, parent) {
            (Placement::Root, None) => true,
            (Placement::Root, Some(_)) => false,
            (Placement::Under(_), None) => false,
            (Placement::Under(tags), Some(p)) => tags.contains(&p),
            (Placement::RootOrUnder(_), None) => true,
            (Placement::RootOrUnder(tags), Some(p)) => tags.contains(&p),
            (Placement::Anywhere, _) => true,
        }
    }
}

/// Recipe for one node type.
#[derive(Clone, Copy)]
pub struct NodeSchema {
    pub type_tag: &'static str,
    pub placement: Placement,
    pub build: BuildFn,
    pub relink: Option<RelinkFn>,
}

impl std::fmt::Debug for NodeSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSchema")
            .field("type_tag", &self.type_tag)
            .field("placement", &self.placement)
            .field("relink", &self.relink.is_some())
            .finish()
    }
}

/// Type tag → schema.
#[derive(Debug, Default, Clone)]
pub struct SchemaTable {
    schemas: HashMap<&'static str, NodeSchema>,
}

impl SchemaTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every built-in node type.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for schema in crate::nodes::builtin_schemas() {
            table.register(schema);
        }
        table
    }

    /// Add a schema, replacing any previous one with the same tag.
    pub fn register(&mut self, schema: NodeSchema) -> Option<NodeSchema> {
        self.schemas.insert(schema.type_tag, schema)
    }

    pub fn get(&self, type_tag: &str) -> Option<&NodeSchema> {
        self.schemas.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.schemas.contains_key(type_tag)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.schemas.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}
