//! SQLite backing for tickets and workflows.
//!
//! Each ticket and workflow is one JSON document row; queries reach into
//! the documents with `json_extract`. A listing and a link update from two
//! CLI processes can overlap, so file databases run in WAL mode with a busy
//! timeout. In-memory databases skip WAL.

pub mod migrations;
pub mod schema;
pub mod sequence;
pub mod sql;
pub mod store;

pub use sequence::SqliteSequence;
pub use store::SqliteStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// How long a writer waits on a locked ticket database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the ticket database at `path`, creating its directory and bringing
/// the schema up to date.
///
/// # Errors
///
/// Fails when the directory cannot be created or the database cannot be
/// opened or migrated.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create ticket store directory {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("open ticket store {}", path.display()))?;
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .context("enable WAL")?;
    prepare(conn)
}

/// A throwaway ticket database for tests and one-shot tools.
///
/// # Errors
///
/// Fails when the schema cannot be applied.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory ticket store")?;
    prepare(conn)
}

fn prepare(mut conn: Connection) -> Result<Connection> {
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
        .context("set busy timeout")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("set synchronous mode")?;
    migrations::migrate(&mut conn).context("migrate ticket store schema")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_in_memory, open_store};
    use crate::db::migrations;

    fn table_names(conn: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .collect::<rusqlite::Result<_>>()
            .expect("table names")
    }

    #[test]
    fn file_store_uses_wal_and_busy_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".desk").join("desk.sqlite3");
        let conn = open_store(&path).expect("open ticket store");
        assert!(path.exists());

        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("journal_mode");
        assert_eq!(mode.to_ascii_lowercase(), "wal");

        let timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("busy_timeout");
        assert_eq!(u128::from(timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());
    }

    #[test]
    fn reopening_keeps_the_schema_current() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("desk.sqlite3");
        drop(open_store(&path).expect("first open"));
        let conn = open_store(&path).expect("second open");
        assert_eq!(
            migrations::current_schema_version(&conn).expect("version"),
            migrations::LATEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn in_memory_store_has_document_tables() {
        let conn = open_in_memory().expect("in-memory store");
        let tables = table_names(&conn);
        for table in ["sequences", "tickets", "workflows"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}: {tables:?}");
        }
    }
}
