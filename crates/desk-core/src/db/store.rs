use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tracing::{debug, info};

use super::sequence::SqliteSequence;
use super::sql::{column, order_by, render};
use crate::access::{Field, Predicate};
use crate::error::{DeskError, Entity, Result};
use crate::model::{Activity, ActivityAction, LinkKind, Ticket};
use crate::query::{Page, TicketQuery};
use crate::store::{Facets, LinkChange, TicketStore, WorkflowStore};
use crate::workflow::Workflow;

/// Tickets and workflows as JSON documents in one SQLite database.
///
/// The connection sits behind a mutex; no lock is held across an await.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_connection(super::open_store(path)?))
    }

    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be migrated.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(super::open_in_memory()?))
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Ticket number issuer sharing this store's connection.
    #[must_use]
    pub fn sequence(&self) -> SqliteSequence {
        SqliteSequence::new(Arc::clone(&self.conn))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }
}

pub(super) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| DeskError::Store(anyhow!("store connection lock poisoned")))
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|e| DeskError::Store(e.into()))
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn load(conn: &Connection, tenant: &str, id: &str) -> Result<Option<Ticket>> {
    let doc: Option<String> = conn
        .query_row(
            "SELECT doc FROM tickets WHERE tenant = ?1 AND ticket_id = ?2",
            params![tenant, id],
            |row| row.get(0),
        )
        .optional()?;
    doc.map(|d| serde_json::from_str(&d).map_err(DeskError::from))
        .transpose()
}

fn save(tx: &Transaction<'_>, ticket: &Ticket) -> Result<()> {
    let doc = serde_json::to_string(ticket)?;
    let changed = tx.execute(
        "UPDATE tickets SET doc = ?3 WHERE tenant = ?1 AND ticket_id = ?2",
        params![ticket.tenant, ticket.id, doc],
    )?;
    if changed == 0 {
        return Err(DeskError::not_found(Entity::Ticket, &ticket.id));
    }
    Ok(())
}

/// Apply one connect-set change to a loaded ticket, recording an activity
/// when anything changed. Returns the ids changed.
fn apply_change(
    ticket: &mut Ticket,
    kind: LinkKind,
    change: LinkChange,
    values: &[String],
    actor: &str,
) -> Vec<String> {
    let changed = match change {
        LinkChange::Add => ticket.connect.add(kind, values),
        LinkChange::Remove => ticket.connect.remove(kind, values),
    };
    if !changed.is_empty() {
        let action = ActivityAction::for_links(kind, change == LinkChange::Add, changed.clone());
        ticket.activities.push(Activity::new(action, actor));
    }
    changed
}

#[async_trait]
impl TicketStore for SqliteStore {
    async fn get(&self, tenant: &str, id: &str) -> Result<Option<Ticket>> {
        let conn = self.lock()?;
        load(&conn, tenant, id)
    }

    async fn existing_ids(&self, tenant: &str, ids: &[String]) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare_cached("SELECT 1 FROM tickets WHERE tenant = ?1 AND ticket_id = ?2")?;
        let mut found = Vec::new();
        for id in ids {
            if stmt.exists(params![tenant, id])? && !found.contains(id) {
                found.push(id.clone());
            }
        }
        Ok(found)
    }

    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        let doc = serde_json::to_string(ticket)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tickets (ticket_id, tenant, number, created_ms, doc)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ticket.id,
                ticket.tenant,
                to_i64(ticket.number)?,
                ticket.created_time.timestamp_millis(),
                doc
            ],
        )?;
        info!(tenant = %ticket.tenant, id = %ticket.id, number = ticket.number, "inserted ticket");
        Ok(())
    }

    async fn replace(&self, ticket: &Ticket) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        save(&tx, ticket)?;
        tx.commit()?;
        Ok(())
    }

    async fn update_links(
        &self,
        tenant: &str,
        ids: &[String],
        kind: LinkKind,
        change: LinkChange,
        values: &[String],
        actor: &str,
    ) -> Result<u64> {
        if ids.is_empty() || values.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut total = 0_u64;
        for id in ids {
            let Some(mut ticket) = load(&tx, tenant, id)? else {
                debug!(tenant, id = %id, "skipping link update for missing ticket");
                continue;
            };
            let changed = apply_change(&mut ticket, kind, change, values, actor);
            if !changed.is_empty() {
                save(&tx, &ticket)?;
                total += changed.len() as u64;
            }
        }
        tx.commit()?;
        Ok(total)
    }

    async fn pull_links(
        &self,
        tenant: &str,
        kind: LinkKind,
        values: &[String],
        actor: &str,
    ) -> Result<Vec<String>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let field = match kind {
            LinkKind::Requests => Field::Requests,
            LinkKind::Incidents => Field::Incidents,
        };
        let predicate = Predicate::And(vec![
            Predicate::eq(Field::Tenant, tenant),
            Predicate::any_of(field, values),
        ]);
        let mut params = Vec::new();
        let where_sql = render(&predicate, &mut params);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let docs: Vec<String> = {
            let mut stmt = tx.prepare(&format!("SELECT doc FROM tickets WHERE {where_sql}"))?;
            let rows = stmt.query_map(params_from_iter(params), |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut touched = Vec::new();
        for doc in docs {
            let mut ticket: Ticket = serde_json::from_str(&doc)?;
            if !apply_change(&mut ticket, kind, LinkChange::Remove, values, actor).is_empty() {
                save(&tx, &ticket)?;
                touched.push(ticket.id);
            }
        }
        tx.commit()?;
        Ok(touched)
    }

    async fn query(&self, query: &TicketQuery) -> Result<Page<Ticket>> {
        let mut params: Vec<SqlValue> = Vec::new();
        let where_sql = render(&query.predicate, &mut params);
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM tickets WHERE {where_sql}"),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        let mut sql = format!("SELECT doc FROM tickets WHERE {where_sql}");
        sql.push_str(&order_by(&query.sort));
        if let Some((limit, offset)) = query.paging.window() {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(to_i64(limit)?));
            params.push(SqlValue::Integer(to_i64(offset)?));
        }

        let mut stmt = conn.prepare(&sql)?;
        let docs = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;
        let items = docs
            .map(|doc| Ok(serde_json::from_str::<Ticket>(&doc?)?))
            .collect::<Result<Vec<_>>>()?;

        debug!(total, returned = items.len(), "ticket query");
        Ok(Page::new(items, to_u64(total), query.paging))
    }

    async fn facets(&self, predicate: &Predicate) -> Result<Facets> {
        let mut params: Vec<SqlValue> = Vec::new();
        let where_sql = render(predicate, &mut params);
        let conn = self.lock()?;

        let (total, response, resolve): (i64, i64, i64) = conn.query_row(
            &format!(
                "SELECT COUNT(*),
                        COALESCE(SUM({}), 0),
                        COALESCE(SUM({}), 0)
                 FROM tickets WHERE {where_sql}",
                column(Field::ResponseOverdue),
                column(Field::ResolveOverdue),
            ),
            params_from_iter(params.iter()),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT COALESCE({status}, ''), COUNT(*) FROM tickets WHERE {where_sql} GROUP BY 1",
            status = column(Field::StatusId),
        ))?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut facets = Facets {
            total: to_u64(total),
            response_overdue: to_u64(response),
            resolve_overdue: to_u64(resolve),
            ..Facets::default()
        };
        for row in rows {
            let (status, count) = row?;
            facets.by_status.insert(status, to_u64(count));
        }
        Ok(facets)
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn get(&self, tenant: &str, id: &str) -> Result<Option<Workflow>> {
        let conn = self.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM workflows
                 WHERE workflow_id = ?1 AND tenant IN (?2, '')
                 ORDER BY tenant = '' LIMIT 1",
                params![id, tenant],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(DeskError::from))
            .transpose()
    }

    async fn save(&self, workflow: &Workflow) -> Result<()> {
        let doc = serde_json::to_string(workflow)?;
        let tenant = workflow.tenant.clone().unwrap_or_default();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO workflows (workflow_id, tenant, doc) VALUES (?1, ?2, ?3)
             ON CONFLICT (tenant, workflow_id) DO UPDATE SET doc = excluded.doc",
            params![workflow.id, tenant, doc],
        )?;
        info!(tenant = %tenant, id = %workflow.id, "saved workflow");
        Ok(())
    }
}
