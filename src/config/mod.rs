//! Configuration module for vargraph
//!
//! One TOML file carries everything the engine needs at startup:
//! - Component metadata advertised to the transport layer
//! - Engine tuning (cascade depth guard, delay policy, channel sizes)
//! - Logging filter and optional log directory
//!
//! # Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/vargraph/config.toml`
//! - **macOS**: `~/Library/Application Support/vargraph/config.toml`
//! - **Windows**: `%APPDATA%\vargraph\config.toml`
//!
//! # Example
//!
//! ```toml
//! [component]
//! name = "ga-optimizer"
//! component_type = "Optimizer"
//!
//! [engine]
//! max_cascade_depth = 512
//! delay_policy = "queue"
//!
//! [logging]
//! filter = "vargraph=debug"
//! ```

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "vargraph";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default cascade depth limit
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = crate::graph::DEFAULT_MAX_CASCADE_DEPTH;

/// Default bounded command channel size
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Default event loop idle poll in milliseconds
pub const DEFAULT_IDLE_POLL_MS: u64 = 50;

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Component Info ====================

/// Static metadata the transport layer advertises for this component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentInfo {
    pub name: String,
    pub component_type: String,
    pub protocol_version: String,
    /// A structural descriptor file accompanies the component.
    pub has_descriptor: bool,
    pub speaks_bmf: bool,
    pub speaks_pml: bool,
}

impl Default for ComponentInfo {
    fn default() -> Self {
        Self {
            name: "vargraph".to_string(),
            component_type: "Generic".to_string(),
            protocol_version: "1.0".to_string(),
            has_descriptor: false,
            speaks_bmf: true,
            speaks_pml: false,
        }
    }
}

impl ComponentInfo {
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            ..Self::default()
        }
    }
}

// ==================== Engine Settings ====================

/// What a delay node does when triggered while a delay is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DelayPolicy {
    /// Cancel the pending emission and start the delay over.
    #[default]
    Restart,
    /// Keep the pending emission and schedule another.
    Queue,
}

impl std::fmt::Display for DelayPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayPolicy::Restart => write!(f, "restart"),
            DelayPolicy::Queue => write!(f, "queue"),
        }
    }
}

/// Event loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Nested propagation limit before a cascade is aborted
    pub max_cascade_depth: usize,
    pub delay_policy: DelayPolicy,
    /// Bounded command channel size
    pub command_capacity: usize,
    /// How long the loop blocks waiting for a command
    pub idle_poll_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            delay_policy: DelayPolicy::default(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
        }
    }
}

// ==================== Logging ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    /// Write daily rolling log files here as well as to stderr
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "vargraph=info".to_string(),
            directory: None,
        }
    }
}

// ==================== Engine Config ====================

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub component: ComponentInfo,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            GraphError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GraphError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            GraphError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_cascade_depth == 0 {
            return Err(GraphError::Config("max_cascade_depth must be at least 1".into()));
        }
        if self.engine.command_capacity == 0 {
            return Err(GraphError::Config("command_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
