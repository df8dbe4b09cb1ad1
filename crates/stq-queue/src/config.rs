//! Queue and registry options.

use std::time::Duration;

use stq_config::Config;
use stq_process::{RunnerKind, RunnerOptions};

use crate::error::QueueError;

/// Execution loop options.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Interval between child liveness checks.
    pub poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Everything a registry needs to build its queues.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    pub runner_kind: RunnerKind,
    /// Template for each queue's runner; the label is replaced by the
    /// queue name.
    pub runner: RunnerOptions,
    pub queue: QueueOptions,
    /// Keep loading when a store fails to open; see
    /// [`QueueRegistry::quarantined`](crate::QueueRegistry::quarantined).
    pub quarantine_corrupt: bool,
    /// Delete the store file along with the queue.
    pub purge_on_delete: bool,
}

impl RegistryOptions {
    /// Map the `runner`, `queue` and `registry` config sections.
    pub fn from_config(config: &Config) -> Result<Self, QueueError> {
        let runner_kind = config.runner.backend.parse::<RunnerKind>()?;
        Ok(Self {
            runner_kind,
            runner: RunnerOptions {
                output_capacity: config.runner.output_capacity,
                read_buffer_size: config.runner.read_buffer_size,
                allow_privileged: config.runner.allow_privileged,
                log_dir: config.runner.log_dir_path(),
                ..Default::default()
            },
            queue: QueueOptions {
                poll_interval: Duration::from_millis(config.queue.poll_interval_ms.max(1)),
            },
            quarantine_corrupt: config.registry.quarantine_corrupt,
            purge_on_delete: config.registry.purge_on_delete,
        })
    }
}
