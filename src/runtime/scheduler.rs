//! One-shot timers for delayed emission.
//!
//! Timers run as tokio tasks on a small dedicated runtime. A task never
//! touches the graph: when it elapses it sends [`EngineCommand::TimerFired`]
//! back to the engine. Each request gets a generation number, so a fire
//! that was cancelled after it was already queued can be recognised and
//! discarded.

use crate::config::DelayPolicy;
use crate::error::Result;
use crate::graph::{NodeId, TimerRequest};
use crate::runtime::bridge::{EngineCommand, TimerFired};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    runtime: tokio::runtime::Runtime,
    policy: DelayPolicy,
    commands: Sender<EngineCommand>,
    pending: HashMap<NodeId, Vec<Pending>>,
    next_generation: u64,
}

impl Scheduler {
    pub fn new(policy: DelayPolicy, commands: Sender<EngineCommand>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("vargraph-timer")
            .enable_time()
            .build()?;
        Ok(Self {
            runtime,
            policy,
            commands,
            pending: HashMap::new(),
            next_generation: 1,
        })
    }

    pub fn policy(&self) -> DelayPolicy {
        self.policy
    }

    /// Start a timer. Returns its generation.
    pub fn schedule(&mut self, request: TimerRequest) -> u64 {
        if self.policy == DelayPolicy::Restart {
            let cancelled = self.cancel(request.node);
            if cancelled > 0 {
                tracing::debug!(
                    "{}: restarted delay, {} pending cancelled",
                    request.node,
                    cancelled
                );
            }
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let tx = self.commands.clone();
        let fired = TimerFired {
            node: request.node,
            var: request.var,
            value: request.value,
            generation,
        };
        let delay = request.delay;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(EngineCommand::TimerFired(fired)).is_err() {
                tracing::debug!("Timer {} fired after engine shutdown", generation);
            }
        });

        self.pending
            .entry(request.node)
            .or_default()
            .push(Pending { generation, handle });
        generation
    }

    /// Retire a fired timer. False if it was cancelled in the meantime.
    pub fn complete(&mut self, fired: &TimerFired) -> bool {
        let Some(timers) = self.pending.get_mut(&fired.node) else {
            return false;
        };
        let before = timers.len();
        timers.retain(|p| p.generation != fired.generation);
        let found = timers.len() < before;
        if timers.is_empty() {
            self.pending.remove(&fired.node);
        }
        found
    }

    /// Abort every pending timer of `node`.
    pub fn cancel(&mut self, node: NodeId) -> usize {
        let Some(timers) = self.pending.remove(&node) else {
            return 0;
        };
        for timer in &timers {
            timer.handle.abort();
        }
        timers.len()
    }

    /// Number of timers not yet retired.
    pub fn pending(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for timer in self.pending.values().flatten() {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Value, VarId};
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn request(node: u32, value: f64, delay_ms: u64) -> TimerRequest {
        TimerRequest {
            node: NodeId(node),
            var: VarId(node + 1),
            value: Value::Float(value),
            delay: Duration::from_millis(delay_ms),
        }
    }

    fn fired(cmd: EngineCommand) -> TimerFired {
        match cmd {
            EngineCommand::TimerFired(f) => f,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_timer_fires_once() {
        let (tx, rx) = unbounded();
        let mut scheduler = Scheduler::new(DelayPolicy::Restart, tx).unwrap();
        let generation = scheduler.schedule(request(1, 2.0, 5));

        let f = fired(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert_eq!(f.generation, generation);
        assert_eq!(f.value, Value::Float(2.0));
        assert!(scheduler.complete(&f));
        assert!(!scheduler.complete(&f));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_restart_cancels_previous() {
        let (tx, rx) = unbounded();
        let mut scheduler = Scheduler::new(DelayPolicy::Restart, tx).unwrap();
        scheduler.schedule(request(1, 1.0, 200));
        let second = scheduler.schedule(request(1, 2.0, 10));
        assert_eq!(scheduler.pending(), 1);

        let f = fired(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert_eq!(f.generation, second);
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }

    #[test]
    fn test_queue_keeps_both() {
        let (tx, rx) = unbounded();
        let mut scheduler = Scheduler::new(DelayPolicy::Queue, tx).unwrap();
        scheduler.schedule(request(1, 1.0, 5));
        scheduler.schedule(request(1, 2.0, 10));
        assert_eq!(scheduler.pending(), 2);

        let mut values = Vec::new();
        for _ in 0..2 {
            let f = fired(rx.recv_timeout(Duration::from_secs(2)).unwrap());
            assert!(scheduler.complete(&f));
            values.push(f.value);
        }
        assert_eq!(values.len(), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancel_node() {
        let (tx, rx) = unbounded();
        let mut scheduler = Scheduler::new(DelayPolicy::Queue, tx).unwrap();
        scheduler.schedule(request(1, 1.0, 50));
        scheduler.schedule(request(3, 1.0, 50));
        assert_eq!(scheduler.cancel(NodeId(1)), 1);
        assert_eq!(scheduler.cancel(NodeId(1)), 0);

        let f = fired(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert_eq!(f.node, NodeId(3));
    }
}
