//! # stq queue
//!
//! Durable named task queues.
//!
//! - [`QueueStore`]: pending/finished tasks and an ID counter in one SQLite
//!   file per queue
//! - [`Queue`]: a store plus a process runner plus the loop thread that
//!   executes pending tasks one at a time
//! - [`QueueRegistry`]: every queue under a storage root, addressed by name

pub mod config;
pub mod error;
pub mod queue;
pub mod registry;
pub mod store;

mod schema;

pub use config::{QueueOptions, RegistryOptions};
pub use error::{ErrorKind, QueueError};
pub use queue::Queue;
pub use registry::{QuarantinedQueue, QueueRegistry};
pub use store::{ARGS_DELIMITER, CurrentTask, QueueStore};
pub use stq_process::Task;
