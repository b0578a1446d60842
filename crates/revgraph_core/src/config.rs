//! Configuration types for history loading.

use crate::error::{RevError, Result};
use crate::store::ParentPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "revgraph.toml";

/// Complete configuration for a [`Repository`](crate::Repository).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Subprocess settings.
    #[serde(default)]
    pub process: ProcessConfig,

    /// History load settings.
    #[serde(default)]
    pub load: LoadConfig,

    /// Notification settings.
    #[serde(default)]
    pub events: EventsConfig,
}

impl Config {
    /// Candidate config file locations for a work tree, in lookup order.
    pub fn candidates(workdir: &Path) -> [PathBuf; 2] {
        [
            workdir.join(".git").join(CONFIG_FILE),
            workdir.join(CONFIG_FILE),
        ]
    }

    /// Load configuration for a work tree.
    ///
    /// The first existing candidate wins; with none present the defaults are
    /// returned.
    pub fn load(workdir: &Path) -> Result<Self> {
        match Self::candidates(workdir).into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_file(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RevError::ConfigError(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RevError::ConfigError(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration into the work tree root.
    pub fn save(&self, workdir: &Path) -> Result<()> {
        let path = workdir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| RevError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| RevError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.process.git_program.trim().is_empty() {
            return Err(RevError::ConfigError(
                "process.git_program must not be empty".into(),
            ));
        }
        if self.process.poll_interval_ms == 0 {
            return Err(RevError::ConfigError(
                "process.poll_interval_ms must be positive".into(),
            ));
        }
        if self.process.read_chunk_size == 0 {
            return Err(RevError::ConfigError(
                "process.read_chunk_size must be positive".into(),
            ));
        }
        if self.events.max_listeners == 0 {
            return Err(RevError::ConfigError(
                "events.max_listeners must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Subprocess settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Program invoked for every git command (default: "git").
    pub git_program: String,

    /// Interval between completion checks in milliseconds (default: 20).
    pub poll_interval_ms: u64,

    /// Maximum bytes read from a pipe at once (default: 64 KiB).
    pub read_chunk_size: usize,

    /// When a finished process counts as failed.
    pub failure: FailurePolicy,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            poll_interval_ms: 20,
            read_chunk_size: 64 * 1024,
            failure: FailurePolicy::default(),
        }
    }
}

impl ProcessConfig {
    /// Returns the poll interval as a Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Rules deciding whether a finished process failed.
///
/// Abnormal termination is always a failure and cancellation never is.
/// The defaults treat any stderr output as failure while ignoring the exit
/// code; some tools print warnings on stderr and succeed, which this policy
/// misreports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailurePolicy {
    /// Non-empty stderr marks the run as failed (default: true).
    pub stderr_is_failure: bool,

    /// A non-zero exit code marks the run as failed (default: false).
    pub nonzero_exit_is_failure: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            stderr_is_failure: true,
            nonzero_exit_is_failure: false,
        }
    }
}

/// History load settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    /// Pass `-C` so copies are detected alongside renames (default: true).
    pub detect_copies: bool,

    /// Prepend a synthetic commit for uncommitted changes (default: true).
    pub include_working_dir: bool,

    /// Maximum commits announced by a single append event (default: 256).
    pub batch_size: usize,

    /// Extra arguments appended to every `git log` invocation.
    pub extra_log_args: Vec<String>,

    /// Treatment of commits whose parents are not loaded yet
    /// (default: `"streaming"`).
    pub parent_policy: ParentPolicy,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            detect_copies: true,
            include_working_dir: true,
            batch_size: 256,
            extra_log_args: Vec::new(),
            parent_policy: ParentPolicy::Streaming,
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Maximum simultaneous subscribers (default: 16).
    pub max_listeners: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { max_listeners: 16 }
    }
}
