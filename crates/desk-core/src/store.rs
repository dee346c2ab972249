//! Persistence seams for tickets and workflows.
//!
//! Every mutation of one ticket document is atomic. Operations that touch
//! several documents (link updates by id set, the incident cascade) apply
//! each document independently; a failure midway leaves earlier documents
//! written.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::access::Predicate;
use crate::error::Result;
use crate::model::{LinkKind, Ticket};
use crate::query::{Page, TicketQuery};
use crate::workflow::Workflow;

/// Aggregate counters over one predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    pub total: u64,
    /// Ticket count per status id. Tickets without a status count under `""`.
    pub by_status: BTreeMap<String, u64>,
    pub response_overdue: u64,
    pub resolve_overdue: u64,
}

/// One side of a connect-set mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Add,
    Remove,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get(&self, tenant: &str, id: &str) -> Result<Option<Ticket>>;

    /// The subset of `ids` that exist in `tenant`, in input order.
    async fn existing_ids(&self, tenant: &str, ids: &[String]) -> Result<Vec<String>>;

    async fn insert(&self, ticket: &Ticket) -> Result<()>;

    /// Overwrite an existing document.
    async fn replace(&self, ticket: &Ticket) -> Result<()>;

    /// Add or remove `values` in the `kind` connect set of every ticket in
    /// `ids`. Each changed document gets one activity entry by `actor`.
    /// Returns the number of set entries actually added or removed.
    async fn update_links(
        &self,
        tenant: &str,
        ids: &[String],
        kind: LinkKind,
        change: LinkChange,
        values: &[String],
        actor: &str,
    ) -> Result<u64>;

    /// Remove `values` from the `kind` connect set of every ticket in the
    /// tenant that references any of them. Returns the tickets changed.
    async fn pull_links(
        &self,
        tenant: &str,
        kind: LinkKind,
        values: &[String],
        actor: &str,
    ) -> Result<Vec<String>>;

    async fn query(&self, query: &TicketQuery) -> Result<Page<Ticket>>;

    async fn facets(&self, predicate: &Predicate) -> Result<Facets>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// A tenant workflow, falling back to a shared (tenant-less) one.
    async fn get(&self, tenant: &str, id: &str) -> Result<Option<Workflow>>;

    async fn save(&self, workflow: &Workflow) -> Result<()>;
}
