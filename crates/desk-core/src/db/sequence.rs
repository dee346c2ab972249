use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, params};

use super::store::lock;
use crate::collab::TicketNumberIssuer;
use crate::error::Result;

/// Per-tenant ticket numbers from the `sequences` table.
#[derive(Clone)]
pub struct SqliteSequence {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSequence {
    pub(super) const fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl std::fmt::Debug for SqliteSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSequence").finish_non_exhaustive()
    }
}

#[async_trait]
impl TicketNumberIssuer for SqliteSequence {
    async fn issue_next(&self, tenant: &str) -> Result<u64> {
        let conn = lock(&self.conn)?;
        let next: i64 = conn.query_row(
            "INSERT INTO sequences (key, value) VALUES (?1, 1)
             ON CONFLICT (key) DO UPDATE SET value = value + 1
             RETURNING value",
            params![format!("ticket:{tenant}")],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(next).unwrap_or(0))
    }
}
