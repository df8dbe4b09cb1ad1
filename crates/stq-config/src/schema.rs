//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Where queue files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<name>.db` file per queue.
    #[serde(default = "default_storage_root")]
    pub root: String,
}

impl StorageConfig {
    /// Storage root with `~` expanded.
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.root))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> String {
    "~/.stq/queues".to_string()
}

/// Process runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Backend name: `pty` or `pipe`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Number of output chunks kept before the oldest is dropped.
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,

    /// Maximum bytes per captured chunk.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Allow spawning tasks while running as root.
    #[serde(default)]
    pub allow_privileged: bool,

    /// Directory for per-task output logs.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl RunnerConfig {
    pub fn log_dir_path(&self) -> Option<PathBuf> {
        self.log_dir
            .as_deref()
            .map(|dir| PathBuf::from(ConfigLoader::expand_path(dir)))
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            output_capacity: default_output_capacity(),
            read_buffer_size: default_read_buffer_size(),
            allow_privileged: false,
            log_dir: None,
        }
    }
}

fn default_backend() -> String {
    if cfg!(windows) {
        "pipe".to_string()
    } else {
        "pty".to_string()
    }
}

fn default_output_capacity() -> usize {
    64
}

fn default_read_buffer_size() -> usize {
    4096
}

/// Execution loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How often the loop checks whether the current child exited.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Registry loading and deletion policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Skip queues whose store fails to open instead of aborting the load.
    #[serde(default)]
    pub quarantine_corrupt: bool,

    /// Remove the backing file when a queue is deleted.
    #[serde(default)]
    pub purge_on_delete: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files.
    #[serde(default)]
    pub dir: Option<String>,
}

impl LogConfig {
    pub fn dir_path(&self) -> Option<PathBuf> {
        self.dir
            .as_deref()
            .map(|dir| PathBuf::from(ConfigLoader::expand_path(dir)))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
