//! CLI definitions for stq.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

/// stq CLI.
#[derive(Parser, Debug)]
#[command(name = "stq")]
#[command(about = "Durable named task queues that run one process at a time")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root, overrides `storage.root`
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// List all queues
    Queues,

    /// Create an empty queue
    Create {
        /// Queue name
        name: String,
    },

    /// Remove a queue from the registry
    Delete {
        /// Queue name
        name: String,
    },

    /// Rename a queue (the store file keeps its name)
    Rename {
        /// Current name
        old_name: String,

        /// New name
        new_name: String,
    },

    /// Add a task to a queue
    Add {
        /// Queue name
        queue: String,

        /// Working directory (default: current directory)
        #[arg(short, long)]
        work_dir: Option<PathBuf>,

        /// Executable to run
        exec: String,

        /// Arguments passed to the executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List pending task IDs
    Pending {
        /// Queue name
        queue: String,
    },

    /// List finished task IDs
    Finished {
        /// Queue name
        queue: String,
    },

    /// Show one task as JSON
    Show {
        /// Queue name
        queue: String,

        /// Task ID
        id: u32,

        /// Look the task up among finished tasks
        #[arg(long)]
        finished: bool,
    },

    /// Remove a pending task
    Remove {
        /// Queue name
        queue: String,

        /// Task ID
        id: u32,
    },

    /// Clear pending or finished tasks
    #[command(group(ArgGroup::new("partition").required(true).args(["pending", "finished"])))]
    Clear {
        /// Queue name
        queue: String,

        /// Clear pending tasks
        #[arg(long)]
        pending: bool,

        /// Clear finished tasks
        #[arg(long)]
        finished: bool,
    },

    /// Run pending tasks and stream their output until the queue is idle
    Run {
        /// Queue name
        queue: String,

        /// Output polling interval in milliseconds
        #[arg(long, default_value_t = 200)]
        poll_ms: u64,
    },
}
