//! Runtime: event loop, thread bridge and timers
//!
//! All graph mutation happens on the engine thread. Transports and timer
//! tasks only send [`EngineCommand`]s.

pub mod bridge;
pub mod engine;
pub mod scheduler;

pub use bridge::{EngineCommand, EngineHandle, MessageSink, TimerFired};
pub use engine::{Engine, EngineProgress, EngineStats};
pub use scheduler::Scheduler;
