//! Store file schema: creation and verification.

use rusqlite::Connection;
use tracing::debug;

use crate::error::QueueError;

pub(crate) const PENDING: &str = "pending";
pub(crate) const DONE: &str = "done";
pub(crate) const LAST_ID: &str = "lastID";

const TASK_COLUMNS: [(&str, &str); 6] = [
    ("execName", "TEXT"),
    ("args", "TEXT"),
    ("workDir", "TEXT"),
    ("ID", "INT"),
    ("exitCode", "INT"),
    ("isSuccess", "INT"),
];

const LAST_ID_COLUMNS: [(&str, &str); 1] = [("ID", "INT")];

const SCHEMA: &str = r#"
CREATE TABLE pending (
    execName TEXT NOT NULL,
    args TEXT NOT NULL,
    workDir TEXT NOT NULL,
    ID INT PRIMARY KEY NOT NULL,
    exitCode INT NOT NULL,
    isSuccess INT NOT NULL
);

CREATE TABLE done (
    execName TEXT NOT NULL,
    args TEXT NOT NULL,
    workDir TEXT NOT NULL,
    ID INT PRIMARY KEY NOT NULL,
    exitCode INT NOT NULL,
    isSuccess INT NOT NULL
);

CREATE TABLE lastID (
    ID INT PRIMARY KEY NOT NULL
);

INSERT INTO lastID (ID) VALUES (0);
"#;

/// Create the three tables in a fresh file, or verify an existing file has
/// exactly the expected shape. A file with only some of the tables is
/// rejected.
pub(crate) fn init_schema(conn: &mut Connection) -> Result<(), QueueError> {
    let mut present = Vec::new();
    let mut missing = Vec::new();
    for table in [PENDING, DONE, LAST_ID] {
        if table_exists(conn, table)? {
            present.push(table);
        } else {
            missing.push(table);
        }
    }

    if present.is_empty() {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        debug!("Created queue schema");
        return Ok(());
    }

    if !missing.is_empty() {
        return Err(QueueError::Schema(format!(
            "partially initialized store: found {:?}, missing {:?}",
            present, missing
        )));
    }

    verify_columns(conn, PENDING, &TASK_COLUMNS)?;
    verify_columns(conn, DONE, &TASK_COLUMNS)?;
    verify_columns(conn, LAST_ID, &LAST_ID_COLUMNS)?;

    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM lastID", [], |row| row.get(0))?;
    if rows != 1 {
        return Err(QueueError::Schema(format!(
            "table lastID must hold exactly one row, found {}",
            rows
        )));
    }
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, QueueError> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    Ok(stmt.exists([name])?)
}

fn verify_columns(conn: &Connection, table: &str, expected: &[(&str, &str)]) -> Result<(), QueueError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let actual: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<Result<_, _>>()?;

    let matches = actual.len() == expected.len()
        && actual.iter().zip(expected).all(|((name, ty), (want_name, want_ty))| {
            name == want_name && ty.eq_ignore_ascii_case(want_ty)
        });
    if !matches {
        return Err(QueueError::Schema(format!(
            "table {} has columns {:?}, expected {:?}",
            table, actual, expected
        )));
    }
    Ok(())
}
