//! The set of named queues under one storage root.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use stq_process::create_runner;
use tracing::{error, info, warn};

use crate::config::RegistryOptions;
use crate::error::QueueError;
use crate::queue::Queue;
use crate::store::{QueueStore, STORE_EXTENSION};

/// A store file that failed to open while loading with quarantine enabled.
#[derive(Debug, Clone)]
pub struct QuarantinedQueue {
    pub name: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Owns every queue found in, or created under, a storage root.
///
/// Queue names map to `<root>/<name>.db`. Renames only change the lookup
/// key, so after a restart a renamed queue is found under its old name.
pub struct QueueRegistry {
    root: PathBuf,
    options: RegistryOptions,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
    quarantined: Vec<QuarantinedQueue>,
}

impl QueueRegistry {
    /// Load every `*.db` store under `root`, creating `root` if needed.
    ///
    /// By default the first store that fails to open fails the whole load.
    /// With `quarantine_corrupt` the failure is logged and recorded instead.
    pub fn open(root: impl Into<PathBuf>, options: RegistryOptions) -> Result<Self, QueueError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            info!("Created storage root {:?}", root);
        } else if !root.is_dir() {
            return Err(QueueError::InvalidArgument(format!(
                "storage root {:?} is not a directory",
                root
            )));
        }

        let mut entries = fs::read_dir(&root)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut queues = HashMap::new();
        let mut quarantined = Vec::new();
        for entry in entries {
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                warn!("Skipping {:?}: not a regular file", path);
                continue;
            }
            if path.extension().and_then(OsStr::to_str) != Some(STORE_EXTENSION) {
                warn!("Skipping {:?}: not a queue store", path);
                continue;
            }
            let Some(name) = path.file_stem().and_then(OsStr::to_str) else {
                warn!("Skipping {:?}: name is not valid UTF-8", path);
                continue;
            };

            match Self::build_queue(&root, name, &options) {
                Ok(queue) => {
                    queues.insert(name.to_string(), Arc::new(queue));
                }
                Err(e) if options.quarantine_corrupt => {
                    error!(queue = %name, "Quarantining queue: {}", e);
                    quarantined.push(QuarantinedQueue {
                        name: name.to_string(),
                        path,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(queue = %name, "Failed to load queue: {}", e);
                    return Err(e);
                }
            }
        }

        info!(
            root = %root.display(),
            loaded = queues.len(),
            quarantined = quarantined.len(),
            "Queue registry ready"
        );
        Ok(Self {
            root,
            options,
            queues: RwLock::new(queues),
            quarantined,
        })
    }

    fn build_queue(root: &Path, name: &str, options: &RegistryOptions) -> Result<Queue, QueueError> {
        let runner = create_runner(options.runner_kind, options.runner.labeled(name))?;
        Queue::open(root, name, runner, options.queue.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores skipped during [`open`](Self::open).
    pub fn quarantined(&self) -> &[QuarantinedQueue] {
        &self.quarantined
    }

    /// Create an empty queue backed by `<root>/<name>.db`.
    pub fn create_queue(&self, name: &str) -> Result<Arc<Queue>, QueueError> {
        validate_name(name)?;
        let mut queues = self.queues.write();
        if queues.contains_key(name) {
            return Err(QueueError::AlreadyExists(format!("queue {name}")));
        }
        let path = QueueStore::path_for(&self.root, name);
        if let Some((owner, _)) = queues.iter().find(|(_, q)| q.store_path() == path.as_path()) {
            return Err(QueueError::AlreadyExists(format!(
                "store {:?} is in use by queue {owner}",
                path
            )));
        }

        let queue = Arc::new(Self::build_queue(&self.root, name, &self.options)?);
        queues.insert(name.to_string(), Arc::clone(&queue));
        info!(queue = %name, "Created queue");
        Ok(queue)
    }

    /// Stop and unregister `name`. The store file is removed only when the
    /// registry was opened with `purge_on_delete`.
    pub fn delete_queue(&self, name: &str) -> Result<(), QueueError> {
        let queue = self
            .queues
            .write()
            .remove(name)
            .ok_or_else(|| QueueError::NotFound(format!("queue {name}")))?;
        queue.stop();
        let path = queue.store_path().to_path_buf();
        drop(queue);

        if self.options.purge_on_delete {
            fs::remove_file(&path)?;
            info!(queue = %name, "Deleted queue and store {:?}", path);
        } else {
            info!(queue = %name, "Deleted queue, store {:?} kept", path);
        }
        Ok(())
    }

    /// Move the queue to a new lookup key. The store file is not renamed.
    pub fn rename_queue(&self, old_name: &str, new_name: &str) -> Result<(), QueueError> {
        validate_name(new_name)?;
        let mut queues = self.queues.write();
        if !queues.contains_key(old_name) {
            return Err(QueueError::NotFound(format!("queue {old_name}")));
        }
        if old_name == new_name {
            return Ok(());
        }
        if queues.contains_key(new_name) {
            return Err(QueueError::AlreadyExists(format!("queue {new_name}")));
        }
        if let Some(queue) = queues.remove(old_name) {
            warn!(
                queue = %new_name,
                "Renamed from {}; store {:?} keeps its name and reloads as {} after restart",
                old_name,
                queue.store_path(),
                old_name
            );
            queues.insert(new_name.to_string(), queue);
        }
        Ok(())
    }

    /// Registered names, sorted.
    pub fn list_queue(&self) -> Result<Vec<String>, QueueError> {
        let mut names: Vec<String> = self.queues.read().keys().cloned().collect();
        if names.is_empty() {
            return Err(QueueError::NotFound("no queues".to_string()));
        }
        names.sort();
        Ok(names)
    }

    pub fn get_queue(&self, name: &str) -> Result<Arc<Queue>, QueueError> {
        self.queues
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(format!("queue {name}")))
    }
}

impl Drop for QueueRegistry {
    fn drop(&mut self) {
        for queue in self.queues.read().values() {
            queue.stop();
        }
    }
}

/// Queue names become file names, so they must be a single path component.
fn validate_name(name: &str) -> Result<(), QueueError> {
    let invalid = |reason: &str| Err(QueueError::InvalidArgument(format!("queue name {name:?} {reason}")));
    if name.is_empty() {
        return invalid("is empty");
    }
    if name == "." || name == ".." {
        return invalid("is reserved");
    }
    if name.contains(['/', '\\', '\0']) {
        return invalid("contains a path separator or NUL");
    }
    Ok(())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
