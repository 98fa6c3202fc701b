//! Variable graph core
//!
//! Typed reactive variables owned by a containment tree of nodes, identified
//! through a registry, connected by links, and updated by a synchronous
//! depth-first cascade.

pub mod cascade;
pub mod id;
pub mod link;
pub mod message;
pub mod node;
pub mod registry;
pub mod restriction;
pub mod value;
pub mod variable;

pub use cascade::{Graph, Outbound, TimerRequest, DEFAULT_MAX_CASCADE_DEPTH};
pub use id::{EntityId, LinkId, NodeId, VarId};
pub use link::{DeliveryMode, Link};
pub use message::{Message, CREATE_NODE, DELETE_NODE};
pub use node::{Arrival, Effect, Node, NodeBehavior, NodeContext};
pub use registry::{Entity, Registry};
pub use restriction::{Restriction, TextRule};
pub use value::{Scalar, Value, ValueType};
pub use variable::{ArrivalHook, Variable, VariableSpec};
