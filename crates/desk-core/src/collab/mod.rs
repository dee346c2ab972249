//! Collaborators the lifecycle core calls but does not own.
//!
//! Each seam is an async trait so the service can be wired to remote
//! services, the SQLite store, or in-process fakes in tests.

pub mod directory;
pub mod incident;

pub use directory::StaticDirectory;
pub use incident::HttpIncidentClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Role, TicketSummary};
use crate::query::{Page, Paging, SortKey};

/// A ticket template as far as the lifecycle core cares: which workflow
/// new tickets follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub workflow_id: String,
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Role definitions for `ids`. Unknown ids are skipped.
    async fn roles_by_ids(&self, tenant: &str, ids: &[String]) -> Result<Vec<Role>>;
}

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn group_ids_of(&self, tenant: &str, user_id: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait TicketNumberIssuer: Send + Sync {
    /// Next ticket number for `tenant`. Strictly increasing, never reused.
    async fn issue_next(&self, tenant: &str) -> Result<u64>;
}

#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn template(&self, tenant: &str, id: &str) -> Result<Option<Template>>;
}

/// The service that owns the incident side of ticket↔incident links.
#[async_trait]
pub trait IncidentService: Send + Sync {
    /// Record `ticket` against each incident. Returns how many links the
    /// incident side created.
    async fn register_incident_link(
        &self,
        tenant: &str,
        ticket: &TicketSummary,
        incident_ids: &[String],
    ) -> Result<u64>;

    /// Drop the ticket from the given incidents. Returns how many links the
    /// incident side removed.
    async fn unregister_incident_link(
        &self,
        tenant: &str,
        ticket_id: &str,
        incident_ids: &[String],
    ) -> Result<u64>;

    /// Tickets connected to any of `incident_ids`, one page at a time.
    async fn list_incident_connections(
        &self,
        tenant: &str,
        incident_ids: &[String],
        paging: Paging,
        sort: &[SortKey],
    ) -> Result<Page<TicketSummary>>;
}
