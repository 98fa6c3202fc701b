//! vargraph - Main Entry Point
//!
//! Runs one component behind a JSON-lines transport: each stdin line is a
//! message, each published value is written to stdout.
//!
//! ```text
//! {"type":"CreateNode","fields":{"vnName":"adder","vnType":"FloatNode","vnid":"1"}}
//! {"target":"adder","type":"FloatNode","fields":{"Input1":"3.0","Input2":"4.5"}}
//! {"type":"Start"}
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use vargraph::{
    config::{EngineConfig, LoggingConfig},
    graph::{Message, CREATE_NODE, DELETE_NODE},
    runtime::{EngineCommand, EngineHandle},
};

/// How long to wait for pending delayed emissions once stdin is closed.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

/// One stdin line.
#[derive(Debug, Deserialize)]
struct Envelope {
    /// Full name of the node or variable to deliver to; absent for control messages.
    #[serde(default)]
    target: Option<String>,
    #[serde(flatten)]
    message: Message,
}

impl Envelope {
    fn into_command(self) -> Option<EngineCommand> {
        if let Some(target) = self.target {
            return Some(EngineCommand::Deliver {
                target,
                message: self.message,
            });
        }
        match self.message.kind() {
            CREATE_NODE | DELETE_NODE => Some(EngineCommand::Control(self.message)),
            "Start" => Some(EngineCommand::Start),
            other => {
                tracing::warn!("Untargeted '{}' message ignored", other);
                None
            }
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "vargraph.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry().with(stderr).with(file).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).init();
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::load_or_default(),
    };
    let _log_guard = init_logging(&config.logging);

    tracing::info!(
        "Starting component '{}' ({}, protocol {})",
        config.component.name,
        config.component.component_type,
        config.component.protocol_version
    );

    let handle = EngineHandle::spawn(&config).context("starting engine")?;
    let commands = handle.command_sender();

    let reader = std::thread::Builder::new()
        .name("vargraph-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("stdin: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Envelope>(&line) {
                    Ok(envelope) => {
                        if let Some(cmd) = envelope.into_command() {
                            if commands.send(cmd).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Malformed input line: {}", e),
                }
            }
        })
        .context("starting stdin reader")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut drain_deadline: Option<Instant> = None;
    loop {
        if let Some(outbound) = handle.recv_timeout(Duration::from_millis(50)) {
            serde_json::to_writer(&mut out, &outbound)?;
            writeln!(out)?;
            out.flush()?;
            continue;
        }
        if !reader.is_finished() {
            continue;
        }
        if handle.is_idle() {
            break;
        }
        let deadline = *drain_deadline.get_or_insert_with(|| Instant::now() + DRAIN_GRACE);
        if Instant::now() >= deadline {
            tracing::warn!(
                "Giving up on {} pending delayed emissions",
                handle.pending_timers()
            );
            break;
        }
    }

    for outbound in handle.drain() {
        serde_json::to_writer(&mut out, &outbound)?;
        writeln!(out)?;
    }
    out.flush()?;

    if let Some(stats) = handle.shutdown() {
        tracing::info!("Shutting down: {:?}", stats);
    }
    Ok(())
}
