//! desk-core: the ticket lifecycle core of a multi-tenant help desk.
//!
//! - [`workflow`]: workflow graphs and status resolution
//! - [`access`]: role-based visibility predicates
//! - [`query`]: the listing/filter/export/statistics query pipeline
//! - [`links`]: request and incident link consistency
//! - [`service`]: request-scoped ticket operations
//! - [`db`]: the SQLite document store
//!
//! # Conventions
//!
//! - **Errors**: library APIs return [`error::Result`]; each
//!   [`error::DeskError`] maps to a stable `E####` code.
//! - **Logging**: `tracing` macros (`info!` for mutations, `warn!` for
//!   best-effort failures, `debug!` for query compilation).

pub mod access;
pub mod collab;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod links;
pub mod model;
pub mod query;
pub mod service;
pub mod store;
pub mod workflow;

pub use context::{AccessResolver, RequestContext};
pub use error::{DeskError, ErrorCode, Result};
pub use links::{LinkConsistencyManager, LinkReport};
pub use service::{ServiceDeps, TicketService};
