//! # vargraph: typed reactive variable graph
//!
//! A component middleware core. Application logic is expressed by
//! instantiating typed variables, linking them, and letting value changes
//! cascade through the graph. The same graph is driven by flat typed
//! messages, so it doubles as a wire protocol endpoint.
//!
//! ## Architecture
//!
//! - **Graph**: variables, nodes, registry and links; a synchronous,
//!   depth-first propagation cascade
//! - **Component**: `CreateNode` / `DeleteNode` handling over a schema table,
//!   with dependency checks before start
//! - **Nodes**: built-in schemas, including the Evaluation/Value/Calc
//!   scatter-gather family
//! - **Runtime**: a single-threaded event loop fed over crossbeam channels,
//!   with tokio timers for delayed emission
//!
//! ## Configuration
//!
//! Settings are read from `vargraph/config.toml` in the platform config
//! directory (see [`config`]).
//!
//! ## Example
//!
//! ```no_run
//! use vargraph::{config::EngineConfig, graph::Message, runtime::EngineHandle};
//!
//! let handle = EngineHandle::spawn(&EngineConfig::default())?;
//! handle.control(
//!     Message::new("CreateNode")
//!         .with_field("vnName", "adder")
//!         .with_field("vnType", "FloatNode")
//!         .with_field("vnid", "1"),
//! );
//! handle.deliver(
//!     "adder",
//!     Message::new("FloatNode")
//!         .with_field("Input1", "3.0")
//!         .with_field("Input2", "4.5"),
//! );
//! # Ok::<(), vargraph::GraphError>(())
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod runtime;

// Re-export commonly used types
pub use component::{Component, ComponentState, ControlOutcome, SchemaTable};
pub use config::{ComponentInfo, DelayPolicy, EngineConfig};
pub use error::{ErrorClass, GraphError, Result};
pub use graph::{Graph, Message, NodeId, Value, ValueType, VarId, VariableSpec};
pub use runtime::{EngineCommand, EngineHandle, MessageSink};
