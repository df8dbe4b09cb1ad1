//! Subcommand handlers for stq.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use stq_process::Task;
use stq_queue::{Queue, QueueError, QueueRegistry};

use crate::cli::Commands;

/// Run one subcommand against `registry`.
pub(crate) async fn handle_command(
    registry: &QueueRegistry,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Queues => {
            let names = match registry.list_queue() {
                Ok(names) => names,
                Err(QueueError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            for name in names {
                println!("{name}");
            }
        }
        Commands::Create { name } => {
            let queue = registry.create_queue(&name)?;
            println!("{}", queue.store_path().display());
        }
        Commands::Delete { name } => registry.delete_queue(&name)?,
        Commands::Rename { old_name, new_name } => registry.rename_queue(&old_name, &new_name)?,
        Commands::Add {
            queue,
            work_dir,
            exec,
            args,
        } => {
            let work_dir = match work_dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let queue = registry.get_queue(&queue)?;
            let id = add_task(&queue, work_dir, exec, args)?;
            println!("{id}");
        }
        Commands::Pending { queue } => {
            let ids = registry.get_queue(&queue)?.list_pending()?;
            println!("{}", serde_json::to_string(&ids)?);
        }
        Commands::Finished { queue } => {
            let ids = registry.get_queue(&queue)?.list_finished()?;
            println!("{}", serde_json::to_string(&ids)?);
        }
        Commands::Show {
            queue,
            id,
            finished,
        } => {
            let queue = registry.get_queue(&queue)?;
            let task = if finished {
                queue.finished_details(id)?
            } else {
                queue.pending_details(id)?
            };
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Commands::Remove { queue, id } => registry.get_queue(&queue)?.remove_task(id)?,
        Commands::Clear {
            queue,
            pending,
            finished,
        } => {
            let queue = registry.get_queue(&queue)?;
            if pending {
                queue.clear_pending()?;
            }
            if finished {
                queue.clear_finished()?;
            }
        }
        Commands::Run { queue, poll_ms } => {
            run_queue(registry.get_queue(&queue)?, Duration::from_millis(poll_ms)).await?
        }
    }
    Ok(())
}

fn add_task(
    queue: &Queue,
    work_dir: PathBuf,
    exec: String,
    args: Vec<String>,
) -> Result<u32, QueueError> {
    let work_dir = work_dir.to_str().map(String::from).ok_or_else(|| {
        QueueError::InvalidArgument(format!("working directory {:?} is not valid UTF-8", work_dir))
    })?;
    let mut task = Task::new(exec, work_dir).with_args(args);
    queue.add_task(&mut task)
}

/// Start `queue` and copy task output to stdout until it goes idle.
/// Ctrl-C stops the queue, killing the task in flight.
async fn run_queue(queue: Arc<Queue>, poll: Duration) -> Result<(), Box<dyn std::error::Error>> {
    queue.start()?;
    info!(queue = %queue.name(), "Running queue, press Ctrl-C to stop");

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!(queue = %queue.name(), "Interrupted, stopping queue");
                let stopping = Arc::clone(&queue);
                tokio::task::spawn_blocking(move || stopping.stop()).await?;
                break;
            }
            _ = tokio::time::sleep(poll) => {
                match queue.read_current_output() {
                    Ok(chunks) => {
                        for chunk in chunks {
                            stdout.write_all(chunk.as_bytes())?;
                        }
                        stdout.flush()?;
                    }
                    Err(QueueError::InvalidState(_)) => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    let pending = queue.list_pending()?.len();
    let finished = queue.list_finished()?.len();
    info!(queue = %queue.name(), pending, finished, "Queue idle");
    Ok(())
}
