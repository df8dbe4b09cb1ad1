//! Durable task store: one SQLite file per queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use stq_process::Task;
use tracing::{debug, info};

use crate::error::QueueError;
use crate::schema::init_schema;

/// File extension of queue store files.
pub const STORE_EXTENSION: &str = "db";

/// Separator used to flatten `Task::args` into one column. Not escaped.
pub const ARGS_DELIMITER: &str = "__,__";

/// The task a queue is executing right now, shared between the queue and
/// its store so the store can protect the in-flight row.
pub type CurrentTask = Arc<Mutex<Option<Task>>>;

const TASK_FIELDS: &str = "execName, args, workDir, ID, exitCode, isSuccess";

pub(crate) fn join_args(args: &[String]) -> String {
    args.join(ARGS_DELIMITER)
}

pub(crate) fn split_args(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(ARGS_DELIMITER).map(String::from).collect()
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let args: String = row.get(1)?;
    Ok(Task {
        exec_name: row.get(0)?,
        args: split_args(&args),
        work_dir: row.get(2)?,
        id: row.get(3)?,
        exit_code: row.get(4)?,
        is_success: row.get(5)?,
    })
}

#[derive(Clone, Copy)]
enum Partition {
    Pending,
    Done,
}

impl Partition {
    fn table(self) -> &'static str {
        match self {
            Self::Pending => crate::schema::PENDING,
            Self::Done => crate::schema::DONE,
        }
    }
}

/// Pending and finished tasks of one queue plus its ID counter.
///
/// Every operation holds the connection lock for its whole duration. When
/// the current-task slot is needed too it is locked second.
pub struct QueueStore {
    name: String,
    path: PathBuf,
    conn: Mutex<Connection>,
    current: CurrentTask,
}

impl QueueStore {
    /// Open or create `<root>/<name>.db`.
    pub fn open(root: &Path, name: &str, current: CurrentTask) -> Result<Self, QueueError> {
        let path = Self::path_for(root, name);
        let mut conn = Connection::open(&path)?;
        init_schema(&mut conn)?;
        info!(queue = %name, "Opened store {:?}", path);

        Ok(Self {
            name: name.to_string(),
            path,
            conn: Mutex::new(conn),
            current,
        })
    }

    /// Location of the store file for `name` under `root`.
    pub fn path_for(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{name}.{STORE_EXTENSION}"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// IDs of pending tasks in storage order.
    pub fn list_pending(&self) -> Result<Vec<u32>, QueueError> {
        self.list(Partition::Pending)
    }

    /// IDs of finished tasks in storage order.
    pub fn list_finished(&self) -> Result<Vec<u32>, QueueError> {
        self.list(Partition::Done)
    }

    pub fn pending_details(&self, id: u32) -> Result<Task, QueueError> {
        self.details(Partition::Pending, id)
    }

    pub fn finished_details(&self, id: u32) -> Result<Task, QueueError> {
        self.details(Partition::Done, id)
    }

    /// Delete every pending task. Refused while a task is executing since
    /// its row is still in `pending`.
    pub fn clear_pending(&self) -> Result<(), QueueError> {
        let conn = self.conn.lock();
        let current = self.current.lock();
        if let Some(task) = current.as_ref() {
            return Err(QueueError::InvalidState(format!(
                "task {} is executing, stop the queue before clearing pending tasks",
                task.id
            )));
        }
        let removed = conn.execute("DELETE FROM pending", [])?;
        debug!(queue = %self.name, removed, "Cleared pending tasks");
        Ok(())
    }

    pub fn clear_finished(&self) -> Result<(), QueueError> {
        let removed = self.conn.lock().execute("DELETE FROM done", [])?;
        debug!(queue = %self.name, removed, "Cleared finished tasks");
        Ok(())
    }

    /// Assign the next ID to `task` and insert it into `pending`.
    ///
    /// The counter read, insert and counter update commit together.
    pub fn add_task(&self, task: &mut Task) -> Result<u32, QueueError> {
        task.validate()
            .map_err(|e| QueueError::InvalidArgument(e.to_string()))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let next: i64 = tx.query_row("SELECT ID FROM lastID", [], |row| row.get(0))?;
        let id = u32::try_from(next).map_err(|_| {
            QueueError::OutOfRange(format!("task ID counter exhausted ({next})"))
        })?;

        tx.execute(
            &format!("INSERT INTO pending ({TASK_FIELDS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                task.exec_name,
                join_args(&task.args),
                task.work_dir,
                id,
                task.exit_code,
                task.is_success
            ],
        )?;
        tx.execute("UPDATE lastID SET ID = ?1", params![next + 1])?;
        tx.commit()?;

        task.id = id;
        debug!(queue = %self.name, task_id = id, "Added task {}", task.exec_name);
        Ok(id)
    }

    /// Delete a pending task that is not currently executing.
    pub fn remove_task(&self, id: u32) -> Result<(), QueueError> {
        let conn = self.conn.lock();
        if self.current.lock().as_ref().is_some_and(|task| task.id == id) {
            return Err(QueueError::InvalidArgument(format!(
                "task {id} is executing and cannot be removed"
            )));
        }
        if conn.execute("DELETE FROM pending WHERE ID = ?1", [id])? == 0 {
            return Err(QueueError::NotFound(format!("pending task {id}")));
        }
        debug!(queue = %self.name, task_id = id, "Removed task");
        Ok(())
    }

    /// Pick the next pending task and record it as current.
    pub(crate) fn claim_next(&self) -> Result<Option<Task>, QueueError> {
        let conn = self.conn.lock();
        let task = conn
            .query_row(
                &format!("SELECT {TASK_FIELDS} FROM pending ORDER BY ID LIMIT 1"),
                [],
                task_from_row,
            )
            .optional()?;
        *self.current.lock() = task.clone();
        Ok(task)
    }

    /// Move `task` from `pending` to `done` with its outcome and clear the
    /// current slot.
    pub(crate) fn finish(&self, task: &Task) -> Result<(), QueueError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM pending WHERE ID = ?1", [task.id])?;
        tx.execute(
            &format!("INSERT INTO done ({TASK_FIELDS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                task.exec_name,
                join_args(&task.args),
                task.work_dir,
                task.id,
                task.exit_code,
                task.is_success
            ],
        )?;
        tx.commit()?;
        *self.current.lock() = None;
        debug!(
            queue = %self.name,
            task_id = task.id,
            exit_code = task.exit_code,
            success = task.is_success,
            "Task finished"
        );
        Ok(())
    }

    /// Clear the current slot without recording an outcome.
    pub(crate) fn release(&self) {
        let _conn = self.conn.lock();
        *self.current.lock() = None;
    }

    fn list(&self, partition: Partition) -> Result<Vec<u32>, QueueError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT ID FROM {}", partition.table()))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(ids)
    }

    fn details(&self, partition: Partition, id: u32) -> Result<Task, QueueError> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {TASK_FIELDS} FROM {} WHERE ID = ?1", partition.table()),
            [id],
            task_from_row,
        )
        .optional()?
        .ok_or_else(|| QueueError::NotFound(format!("{} task {id}", partition.table())))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
