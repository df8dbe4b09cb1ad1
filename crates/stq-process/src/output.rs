//! Bounded output capture shared between a runner and its reader thread.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::warn;

/// FIFO of captured chunks holding at most `capacity` entries.
///
/// Pushing into a full buffer drops the oldest chunk. Every chunk is also
/// appended to the attached log file, if any, before it can be dropped.
pub(crate) struct OutputBuffer {
    chunks: Mutex<VecDeque<String>>,
    capacity: usize,
    log: Mutex<Option<File>>,
}

impl OutputBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            log: Mutex::new(None),
        }
    }

    pub(crate) fn push(&self, chunk: String) {
        if chunk.is_empty() {
            return;
        }
        if let Some(file) = self.log.lock().as_mut() {
            if let Err(e) = file.write_all(chunk.as_bytes()) {
                warn!("Failed to write task output log: {}", e);
            }
        }
        let mut chunks = self.chunks.lock();
        if chunks.len() == self.capacity {
            chunks.pop_front();
        }
        chunks.push_back(chunk);
    }

    /// Take everything captured since the last drain, oldest first.
    pub(crate) fn drain(&self) -> Vec<String> {
        self.chunks.lock().drain(..).collect()
    }

    /// Drop buffered chunks and close the log file.
    pub(crate) fn reset(&self) {
        self.chunks.lock().clear();
        *self.log.lock() = None;
    }

    /// Start mirroring chunks into `path` (created or appended to).
    pub(crate) fn attach_log(&self, path: &Path) {
        let opened = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path));
        match opened {
            Ok(file) => *self.log.lock() = Some(file),
            Err(e) => warn!("Cannot open task output log {:?}: {}", path, e),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.chunks.lock().len()
    }
}

/// What a backend's reader thread needs to deliver output.
pub(crate) struct PumpContext {
    pub output: Arc<OutputBuffer>,
    pub stop: Arc<AtomicBool>,
    pub chunk_size: usize,
    pub label: String,
}

impl PumpContext {
    pub(crate) fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub(crate) fn deliver(&self, bytes: &[u8]) {
        self.output.push(String::from_utf8_lossy(bytes).into_owned());
    }
}
