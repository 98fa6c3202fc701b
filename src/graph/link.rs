//! Directed propagation edges between variables.

use crate::graph::id::{LinkId, VarId};

/// How a value crosses a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Typed value handed over as is. Source and target types must match.
    Direct,
    /// Value encoded to a [`Message`](crate::graph::Message) and decoded by the target.
    Message,
}

/// A link from `source` to `target`.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub source: VarId,
    pub target: VarId,
    pub mode: DeliveryMode,
}
