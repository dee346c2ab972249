//! Connect relationships between tickets, and between tickets and
//! incidents.
//!
//! Request links are symmetric: linking A to B writes B into A's set and A
//! into B's set as two independent, idempotent updates. Incident links are
//! stored locally and mirrored to the incident service; the remote call is
//! best-effort and never rolls back the local write.
//!
//! There is no shared transaction across the two sides. A crash between
//! them leaves a one-sided link, which [`LinkConsistencyManager::list_request_links`]
//! prunes on read when the other side is gone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::{Field, Predicate};
use crate::collab::IncidentService;
use crate::context::{AccessResolver, RequestContext};
use crate::error::{DeskError, Entity, Result};
use crate::model::{Caller, LinkKind, Ticket, TicketSummary};
use crate::query::{DEFAULT_MAX_PAGE_SIZE, Page, Paging, QueryPurpose, TicketQueryBuilder};
use crate::store::{LinkChange, TicketStore};

/// Actor recorded for changes made on behalf of other services or by
/// self-healing reads.
pub const SYSTEM_ACTOR: &str = "system";

/// Outcome of a link mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub count: u64,
    pub message: String,
    /// What the incident service reported, when it was asked and answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_count: Option<u64>,
}

impl LinkReport {
    fn new(count: u64, message: impl Into<String>) -> Self {
        Self {
            count,
            message: message.into(),
            remote_count: None,
        }
    }

    const fn with_remote(mut self, remote_count: Option<u64>) -> Self {
        self.remote_count = remote_count;
        self
    }
}

pub struct LinkConsistencyManager {
    tickets: Arc<dyn TicketStore>,
    incidents: Option<Arc<dyn IncidentService>>,
    resolver: AccessResolver,
    max_page_size: i64,
}

impl std::fmt::Debug for LinkConsistencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConsistencyManager")
            .field("remote_incidents", &self.incidents.is_some())
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

/// Deduplicate preserving order and drop `exclude`.
fn normalize(ids: &[String], exclude: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if id.is_empty() || id == exclude || out.iter().any(|seen| seen == id) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}

impl LinkConsistencyManager {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        incidents: Option<Arc<dyn IncidentService>>,
        resolver: AccessResolver,
    ) -> Self {
        Self {
            tickets,
            incidents,
            resolver,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    #[must_use]
    pub const fn with_max_page_size(mut self, max: i64) -> Self {
        self.max_page_size = max;
        self
    }

    async fn visible(&self, ctx: &RequestContext, id: &str) -> Result<Ticket> {
        match self.tickets.get(ctx.tenant(), id).await? {
            Some(ticket) if ctx.can_see(&ticket) => Ok(ticket),
            _ => Err(DeskError::not_found(Entity::Ticket, id)),
        }
    }

    /// Link ticket `a` with each of `others` in both directions.
    ///
    /// Every referenced ticket is checked before anything is written;
    /// self-links and duplicates are dropped. The count is the number of
    /// entries newly added to `a`, so repeating a call reports 0.
    ///
    /// # Errors
    ///
    /// `NotFound` for `a` (missing or invisible) or naming every missing
    /// id in `others`.
    pub async fn link_requests(&self, caller: &Caller, a: &str, others: &[String]) -> Result<LinkReport> {
        let ctx = self.resolver.resolve(caller).await?;
        let source = self.visible(&ctx, a).await?;
        let targets = normalize(others, &source.id);
        if targets.is_empty() {
            return Ok(LinkReport::new(0, "no requests to link"));
        }

        let existing = self.tickets.existing_ids(ctx.tenant(), &targets).await?;
        let missing: Vec<&str> = targets
            .iter()
            .filter(|id| !existing.contains(id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DeskError::not_found(Entity::Ticket, missing.join(", ")));
        }

        let added = self
            .tickets
            .update_links(
                ctx.tenant(),
                std::slice::from_ref(&source.id),
                LinkKind::Requests,
                LinkChange::Add,
                &targets,
                ctx.user_id(),
            )
            .await?;
        self.tickets
            .update_links(
                ctx.tenant(),
                &targets,
                LinkKind::Requests,
                LinkChange::Add,
                std::slice::from_ref(&source.id),
                ctx.user_id(),
            )
            .await?;

        info!(a = %source.id, added, "linked requests");
        Ok(LinkReport::new(added, format!("linked {added} request(s)")))
    }

    /// Remove the request link between `a` and `b`. TA/SA only.
    ///
    /// A missing `b` is not an error; `a`'s side is still cleaned.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `NotFound` when `a` is missing.
    pub async fn unlink_request(&self, caller: &Caller, a: &str, b: &str) -> Result<LinkReport> {
        let ctx = self.resolver.resolve(caller).await?;
        ctx.require_admin("remove request link")?;
        let source = self.visible(&ctx, a).await?;

        let removed = self
            .tickets
            .update_links(
                ctx.tenant(),
                std::slice::from_ref(&source.id),
                LinkKind::Requests,
                LinkChange::Remove,
                &[b.to_string()],
                ctx.user_id(),
            )
            .await?;
        self.tickets
            .update_links(
                ctx.tenant(),
                &[b.to_string()],
                LinkKind::Requests,
                LinkChange::Remove,
                std::slice::from_ref(&source.id),
                ctx.user_id(),
            )
            .await?;

        info!(a = %source.id, b, removed, "unlinked request");
        Ok(LinkReport::new(removed, format!("removed {removed} request link(s)")))
    }

    /// Attach incidents to ticket `a` and tell the incident service.
    ///
    /// `count` is the number of ids newly stored on `a`; `remote_count` is
    /// the incident service's linked count when it answered.
    ///
    /// # Errors
    ///
    /// `NotFound` when `a` is missing or invisible. Remote failures are
    /// logged, not returned.
    pub async fn link_incidents(
        &self,
        caller: &Caller,
        a: &str,
        incident_ids: &[String],
    ) -> Result<LinkReport> {
        let ctx = self.resolver.resolve(caller).await?;
        let source = self.visible(&ctx, a).await?;
        let ids = normalize(incident_ids, "");
        if ids.is_empty() {
            return Ok(LinkReport::new(0, "no incidents to link"));
        }

        let added = self
            .tickets
            .update_links(
                ctx.tenant(),
                std::slice::from_ref(&source.id),
                LinkKind::Incidents,
                LinkChange::Add,
                &ids,
                ctx.user_id(),
            )
            .await?;

        let remote = match &self.incidents {
            None => None,
            Some(remote) => match remote
                .register_incident_link(ctx.tenant(), &source.summary(), &ids)
                .await
            {
                Ok(linked) => Some(linked),
                Err(err) => {
                    warn!(a = %source.id, error = %err, "incident service did not record links");
                    None
                }
            },
        };

        info!(a = %source.id, added, ?remote, "linked incidents");
        Ok(LinkReport::new(added, format!("linked {added} incident(s)")).with_remote(remote))
    }

    /// Detach every incident from ticket `a`. TA/SA only.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `NotFound` when `a` is missing.
    pub async fn unlink_incidents(&self, caller: &Caller, a: &str) -> Result<LinkReport> {
        let ctx = self.resolver.resolve(caller).await?;
        ctx.require_admin("remove incident links")?;
        let source = self.visible(&ctx, a).await?;
        let (local, remote) = self.clear_incidents(&ctx, &source).await?;
        Ok(LinkReport::new(local, format!("removed {local} incident link(s)")).with_remote(remote))
    }

    /// Local clear plus best-effort remote unregister. Returns the local
    /// count and the remote count when the remote call succeeded.
    async fn clear_incidents(&self, ctx: &RequestContext, ticket: &Ticket) -> Result<(u64, Option<u64>)> {
        let ids = ticket.connect.incidents.clone();
        if ids.is_empty() {
            return Ok((0, Some(0)));
        }
        let local = self
            .tickets
            .update_links(
                ctx.tenant(),
                std::slice::from_ref(&ticket.id),
                LinkKind::Incidents,
                LinkChange::Remove,
                &ids,
                ctx.user_id(),
            )
            .await?;

        let remote = match &self.incidents {
            None => None,
            Some(remote) => match remote.unregister_incident_link(ctx.tenant(), &ticket.id, &ids).await {
                Ok(count) => Some(count),
                Err(err) => {
                    warn!(a = %ticket.id, error = %err, "incident service did not drop links");
                    None
                }
            },
        };
        Ok((local, remote))
    }

    /// Drop every request and incident link of ticket `a`. TA/SA only.
    ///
    /// The incident count comes from the incident service when it answers,
    /// otherwise from the local removal.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `NotFound` when `a` is missing.
    pub async fn remove_all_connections(&self, caller: &Caller, a: &str) -> Result<LinkReport> {
        let ctx = self.resolver.resolve(caller).await?;
        ctx.require_admin("remove all connections")?;
        let source = self.visible(&ctx, a).await?;

        let requests = source.connect.requests.clone();
        let request_count = self
            .tickets
            .update_links(
                ctx.tenant(),
                std::slice::from_ref(&source.id),
                LinkKind::Requests,
                LinkChange::Remove,
                &requests,
                ctx.user_id(),
            )
            .await?;
        self.tickets
            .update_links(
                ctx.tenant(),
                &requests,
                LinkKind::Requests,
                LinkChange::Remove,
                std::slice::from_ref(&source.id),
                ctx.user_id(),
            )
            .await?;

        let (local, remote) = self.clear_incidents(&ctx, &source).await?;
        let incident_count = remote.unwrap_or(local);

        let total = request_count + incident_count;
        info!(a = %source.id, request_count, incident_count, "removed all connections");
        Ok(LinkReport::new(
            total,
            format!("removed {request_count} request link(s) and {incident_count} incident link(s)"),
        ))
    }

    /// The incident service deleted `incident_ids`: pull them from every
    /// ticket in the tenant. Returns the ids of tickets changed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn on_incident_deleted(&self, tenant: &str, incident_ids: &[String]) -> Result<Vec<String>> {
        let ids = normalize(incident_ids, "");
        let touched = self
            .tickets
            .pull_links(tenant, LinkKind::Incidents, &ids, SYSTEM_ACTOR)
            .await?;
        info!(tenant, incidents = ids.len(), tickets = touched.len(), "pulled deleted incidents");
        Ok(touched)
    }

    /// Request links of `a` the caller may see.
    ///
    /// Links to tickets that no longer exist are removed from `a` as a side
    /// effect.
    ///
    /// # Errors
    ///
    /// `NotFound` when `a` is missing or invisible.
    pub async fn list_request_links(&self, caller: &Caller, a: &str) -> Result<Vec<TicketSummary>> {
        let ctx = self.resolver.resolve(caller).await?;
        let source = self.visible(&ctx, a).await?;
        let linked = &source.connect.requests;

        let existing = self.tickets.existing_ids(ctx.tenant(), linked).await?;
        let dangling: Vec<String> = linked
            .iter()
            .filter(|id| !existing.contains(id))
            .cloned()
            .collect();
        if !dangling.is_empty() {
            warn!(a = %source.id, ?dangling, "pruning dangling request links");
            self.tickets
                .update_links(
                    ctx.tenant(),
                    std::slice::from_ref(&source.id),
                    LinkKind::Requests,
                    LinkChange::Remove,
                    &dangling,
                    SYSTEM_ACTOR,
                )
                .await?;
        }

        let mut summaries = Vec::with_capacity(existing.len());
        for id in &existing {
            if let Some(ticket) = self.tickets.get(ctx.tenant(), id).await? {
                if ctx.can_see(&ticket) {
                    summaries.push(ticket.summary());
                }
            }
        }
        Ok(summaries)
    }

    /// Incident ids stored on `a`.
    ///
    /// # Errors
    ///
    /// `NotFound` when `a` is missing or invisible.
    pub async fn list_incident_links(&self, caller: &Caller, a: &str) -> Result<Vec<String>> {
        let ctx = self.resolver.resolve(caller).await?;
        let source = self.visible(&ctx, a).await?;
        Ok(source.connect.incidents)
    }

    /// Tickets connected to any of `incident_ids`, paged and sorted like a
    /// listing.
    ///
    /// The incident service answers when one is configured and the caller
    /// sees every ticket in the tenant. Anyone else, or any caller without
    /// an incident service, gets the local `incidents` sets searched through
    /// their visibility predicate.
    ///
    /// # Errors
    ///
    /// `page`, `size` or `sort` validation errors; `Upstream` when the
    /// incident service fails.
    pub async fn list_incident_tickets(
        &self,
        caller: &Caller,
        incident_ids: &[String],
        paging: Paging,
        sort: Option<&str>,
    ) -> Result<Page<TicketSummary>> {
        let ctx = self.resolver.resolve(caller).await?;
        let mut query = TicketQueryBuilder::new(ctx.tenant(), ctx.access.clone())
            .sort(sort)?
            .paging(paging, QueryPurpose::Listing, self.max_page_size)?
            .build();
        let ids = normalize(incident_ids, "");
        if ids.is_empty() {
            return Ok(Page::new(Vec::new(), 0, query.paging));
        }

        let sees_all = ctx.access.clone().simplify() == Predicate::Any;
        if let Some(remote) = self.incidents.as_ref().filter(|_| sees_all) {
            return remote
                .list_incident_connections(ctx.tenant(), &ids, query.paging, &query.sort)
                .await;
        }

        query.predicate =
            Predicate::And(vec![query.predicate, Predicate::any_of(Field::Incidents, &ids)]).simplify();
        let page = self.tickets.query(&query).await?;
        Ok(page.map(|ticket| ticket.summary()))
    }
}
