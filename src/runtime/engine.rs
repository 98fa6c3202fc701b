//! Engine: the single-threaded event loop that owns the component.
//!
//! The engine runs on a dedicated thread. For each command:
//! 1. Apply it to the component (mutation, delivery, start, timer fire).
//! 2. Forward everything the cascade published to the [`MessageSink`].
//! 3. Hand new delay requests to the [`Scheduler`].
//!
//! Failures are logged and counted. Only a `Shutdown` command or a closed
//! command channel stops the loop.

use crate::component::{Component, ControlOutcome, SchemaTable};
use crate::config::{EngineConfig, EngineSettings};
use crate::error::{ErrorClass, GraphError, Result};
use crate::graph::{EntityId, Graph};
use crate::runtime::bridge::{EngineCommand, MessageSink, TimerFired};
use crate::runtime::scheduler::Scheduler;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters kept by the event loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub commands: u64,
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub deliveries: u64,
    pub published: u64,
    pub timers_scheduled: u64,
    pub timers_fired: u64,
    /// Fires discarded because their timer had been cancelled.
    pub timers_stale: u64,
    pub errors: u64,
}

/// Progress counters shared with other threads.
#[derive(Debug, Default)]
pub struct EngineProgress {
    handled: AtomicU64,
    pending_timers: AtomicUsize,
}

impl EngineProgress {
    /// Commands handled, not counting timer fires.
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Acquire)
    }

    pub fn pending_timers(&self) -> usize {
        self.pending_timers.load(Ordering::Acquire)
    }
}

pub struct Engine<S: MessageSink> {
    component: Component,
    commands: Receiver<EngineCommand>,
    sink: S,
    scheduler: Scheduler,
    progress: Arc<EngineProgress>,
    idle_poll: Duration,
    stats: EngineStats,
}

impl<S: MessageSink> Engine<S> {
    /// `timer_tx` must feed the same channel as `commands`.
    pub fn new(
        component: Component,
        commands: Receiver<EngineCommand>,
        timer_tx: Sender<EngineCommand>,
        sink: S,
        settings: &EngineSettings,
    ) -> Result<Self> {
        Ok(Self {
            component,
            commands,
            sink,
            scheduler: Scheduler::new(settings.delay_policy, timer_tx)?,
            progress: Arc::default(),
            idle_poll: Duration::from_millis(settings.idle_poll_ms.max(1)),
            stats: EngineStats::default(),
        })
    }

    /// Engine with an empty component built from `config`.
    pub fn from_config(
        config: &EngineConfig,
        commands: Receiver<EngineCommand>,
        timer_tx: Sender<EngineCommand>,
        sink: S,
    ) -> Result<Self> {
        let component = Component::with_parts(
            config.component.clone(),
            Graph::with_max_depth(config.engine.max_cascade_depth),
            SchemaTable::builtin(),
        );
        Self::new(component, commands, timer_tx, sink, &config.engine)
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Counters refreshed after every command.
    pub fn progress(&self) -> Arc<EngineProgress> {
        Arc::clone(&self.progress)
    }

    /// Run until shutdown. Returns the final statistics.
    pub fn run(mut self) -> EngineStats {
        tracing::info!("Engine thread started for '{}'", self.component.info().name);

        loop {
            match self.commands.recv_timeout(self.idle_poll) {
                Ok(cmd) => {
                    if self.handle(cmd).is_break() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!(
            "Engine thread exiting: {} commands, {} errors",
            self.stats.commands,
            self.stats.errors
        );
        self.stats
    }

    /// Apply one command, then flush its side effects.
    pub fn handle(&mut self, cmd: EngineCommand) -> ControlFlow<()> {
        self.stats.commands += 1;
        let external = !matches!(cmd, EngineCommand::TimerFired(_));
        match cmd {
            EngineCommand::Control(message) => match self.component.handle_control(&message) {
                Ok(ControlOutcome::Created(_)) => self.stats.nodes_created += 1,
                Ok(ControlOutcome::Deleted(removed)) => self.on_deleted(&removed),
                Ok(ControlOutcome::Ignored) => self.stats.errors += 1,
                Err(e) => self.report("control", e),
            },
            EngineCommand::Deliver { target, message } => {
                self.stats.deliveries += 1;
                if let Err(e) = self.component.dispatch(&target, &message) {
                    self.report(&target, e);
                }
            }
            EngineCommand::Start => {
                if let Err(e) = self.component.start() {
                    self.report("start", e);
                }
            }
            EngineCommand::TimerFired(fired) => self.on_timer(fired),
            EngineCommand::Shutdown => return ControlFlow::Break(()),
        }
        self.flush();
        self.progress
            .pending_timers
            .store(self.scheduler.pending(), Ordering::Release);
        if external {
            self.progress.handled.fetch_add(1, Ordering::Release);
        }
        ControlFlow::Continue(())
    }

    fn on_deleted(&mut self, removed: &[EntityId]) {
        for id in removed {
            if let EntityId::Node(node) = id {
                self.stats.nodes_deleted += 1;
                let cancelled = self.scheduler.cancel(*node);
                if cancelled > 0 {
                    tracing::debug!("Cancelled {} timers of deleted {}", cancelled, node);
                }
            }
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        if !self.scheduler.complete(&fired) {
            self.stats.timers_stale += 1;
            tracing::trace!("Discarding stale timer {} of {}", fired.generation, fired.node);
            return;
        }
        self.stats.timers_fired += 1;
        if let Err(e) = self.component.graph_mut().on_event(fired.var, fired.value) {
            self.report("timer", e);
        }
    }

    fn flush(&mut self) {
        for outbound in self.component.graph_mut().drain_outbox() {
            self.stats.published += 1;
            if !self.sink.send(outbound) {
                tracing::debug!("Outbound sink closed, message dropped");
            }
        }
        for request in self.component.graph_mut().drain_timers() {
            self.stats.timers_scheduled += 1;
            self.scheduler.schedule(request);
        }
    }

    fn report(&mut self, what: &str, e: GraphError) {
        self.stats.errors += 1;
        match e.class() {
            ErrorClass::Usage | ErrorClass::Runtime => tracing::error!("{}: {}", what, e),
            ErrorClass::Input | ErrorClass::Dependency | ErrorClass::Identity => {
                tracing::warn!("{}: {}", what, e)
            }
        }
    }
}
