//! Thread boundary between transports and the engine.
//!
//! Transports talk to the engine through an [`EngineHandle`]: commands go in
//! over a bounded channel, published values come back as [`Outbound`]
//! messages. Timer tasks use the same command channel, so every graph
//! mutation happens on the engine thread.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::{Message, NodeId, Outbound, Value, VarId};
use crate::runtime::engine::{Engine, EngineProgress, EngineStats};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Channel capacity for outbound messages (engine → transport).
const OUTBOUND_CHANNEL_CAPACITY: usize = 10_000;

/// A delayed emission whose timer has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerFired {
    pub node: NodeId,
    pub var: VarId,
    pub value: Value,
    pub generation: u64,
}

/// Commands sent to the engine thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// `CreateNode` / `DeleteNode`.
    Control(Message),
    /// Data message for a node or variable, addressed by full name.
    Deliver { target: String, message: Message },
    /// Check the root's dependencies and fire its start variable.
    Start,
    /// Sent by the scheduler.
    TimerFired(TimerFired),
    /// Stop the event loop.
    Shutdown,
}

/// Where published values go.
pub trait MessageSink: Send {
    /// Returns false when the receiving side is gone.
    fn send(&mut self, outbound: Outbound) -> bool;
}

impl MessageSink for Sender<Outbound> {
    fn send(&mut self, outbound: Outbound) -> bool {
        Sender::send(self, outbound).is_ok()
    }
}

/// Transport-side handle to a running engine thread.
pub struct EngineHandle {
    cmd_tx: Sender<EngineCommand>,
    out_rx: Receiver<Outbound>,
    progress: Arc<EngineProgress>,
    sent: AtomicU64,
    thread: Option<JoinHandle<EngineStats>>,
}

impl EngineHandle {
    /// Build an engine from `config` and run it on a dedicated thread.
    pub fn spawn(config: &EngineConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded(config.engine.command_capacity);
        let (out_tx, out_rx) = bounded(OUTBOUND_CHANNEL_CAPACITY);
        let engine = Engine::from_config(config, cmd_rx, cmd_tx.clone(), out_tx)?;
        let progress = engine.progress();

        let thread = std::thread::Builder::new()
            .name("vargraph-engine".to_string())
            .spawn(move || engine.run())?;

        Ok(Self {
            cmd_tx,
            out_rx,
            progress,
            sent: AtomicU64::new(0),
            thread: Some(thread),
        })
    }

    /// Sender for additional producers (e.g. a second transport).
    ///
    /// Commands sent through it are not seen by [`is_idle`](Self::is_idle).
    pub fn command_sender(&self) -> Sender<EngineCommand> {
        self.cmd_tx.clone()
    }

    pub fn send(&self, cmd: EngineCommand) -> bool {
        if self.cmd_tx.send(cmd).is_err() {
            return false;
        }
        self.sent.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub fn control(&self, message: Message) -> bool {
        self.send(EngineCommand::Control(message))
    }

    pub fn deliver(&self, target: impl Into<String>, message: Message) -> bool {
        self.send(EngineCommand::Deliver {
            target: target.into(),
            message,
        })
    }

    pub fn start(&self) -> bool {
        self.send(EngineCommand::Start)
    }

    /// Delayed emissions the engine still owes.
    pub fn pending_timers(&self) -> usize {
        self.progress.pending_timers()
    }

    /// True once every command sent through this handle has been handled
    /// and no timer is pending.
    pub fn is_idle(&self) -> bool {
        self.progress.handled() >= self.sent.load(Ordering::Acquire)
            && self.progress.pending_timers() == 0
    }

    /// Try to receive a single outbound message without blocking.
    pub fn try_recv(&self) -> Option<Outbound> {
        self.out_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Outbound> {
        self.out_rx.recv_timeout(timeout).ok()
    }

    /// Drain all pending outbound messages.
    pub fn drain(&self) -> Vec<Outbound> {
        self.out_rx.try_iter().collect()
    }

    /// Stop the engine and wait for it. Returns its final statistics.
    pub fn shutdown(mut self) -> Option<EngineStats> {
        self.stop()
    }

    fn stop(&mut self) -> Option<EngineStats> {
        let thread = self.thread.take()?;
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        match thread.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                tracing::error!("Engine thread panicked");
                None
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
