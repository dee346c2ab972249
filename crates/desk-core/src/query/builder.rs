//! One pipeline for every ticket read that returns more than one ticket.
//!
//! Listing, advanced filtering, export and statistics all build their
//! store query here, in the same stage order:
//!
//! 1. tenant + access predicate,
//! 2. the caller's query string,
//! 3. coarse filters,
//! 4. sort keys, closed by a `number DESC` tiebreak,
//!
//! then paging. Because the access stage is always first and always ANDed,
//! later stages can only narrow what the caller is allowed to see.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::filter::TicketFilter;
use super::page::{DEFAULT_MAX_PAGE_SIZE, Paging, QueryPurpose};
use super::parser::parse_query;
use super::sort::{SortKey, parse_sort};
use crate::access::{Predicate, scoped};
use crate::error::Result;

/// A fully composed store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    pub predicate: Predicate,
    pub sort: Vec<SortKey>,
    pub paging: Paging,
}

/// Caller-supplied listing parameters, shared by listing, advanced filter
/// and export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub query: Option<String>,
    pub sort: Option<String>,
    pub filter: TicketFilter,
    pub paging: Paging,
}

#[derive(Debug)]
pub struct TicketQueryBuilder {
    access: Predicate,
    parsed: Option<Predicate>,
    coarse: Option<Predicate>,
    sort: Vec<SortKey>,
    paging: Paging,
}

impl TicketQueryBuilder {
    /// Start from the caller's tenant and compiled access predicate.
    #[must_use]
    pub fn new(tenant: &str, access: Predicate) -> Self {
        Self {
            access: scoped(tenant, access),
            parsed: None,
            coarse: None,
            sort: Vec::new(),
            paging: Paging::default(),
        }
    }

    /// Add a structured query string. Blank input adds nothing.
    ///
    /// # Errors
    ///
    /// Returns a `query` validation error when the string does not parse.
    pub fn query_string(mut self, query: Option<&str>) -> Result<Self> {
        self.parsed = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => Some(parse_query(q)?),
            None => None,
        };
        Ok(self)
    }

    /// Add the coarse filters.
    ///
    /// # Errors
    ///
    /// Returns a range validation error from [`TicketFilter::to_predicate`].
    pub fn filters(mut self, filter: &TicketFilter) -> Result<Self> {
        self.coarse = if filter.is_empty() {
            None
        } else {
            Some(filter.to_predicate()?)
        };
        Ok(self)
    }

    /// Set sort keys from a sort string.
    ///
    /// # Errors
    ///
    /// Returns a `sort` validation error for unknown or unsortable fields.
    pub fn sort(mut self, sort: Option<&str>) -> Result<Self> {
        self.sort = match sort {
            Some(s) => parse_sort(s)?,
            None => Vec::new(),
        };
        Ok(self)
    }

    /// Set paging, validated for `purpose`.
    ///
    /// # Errors
    ///
    /// Returns a `page` or `size` validation error.
    pub fn paging(mut self, paging: Paging, purpose: QueryPurpose, max_size: i64) -> Result<Self> {
        self.paging = paging.validate(purpose, max_size)?;
        Ok(self)
    }

    /// Apply every stage of a [`ListRequest`].
    ///
    /// # Errors
    ///
    /// Propagates the first validation error in stage order.
    pub fn request(self, request: &ListRequest, purpose: QueryPurpose, max_size: i64) -> Result<Self> {
        let paging = if purpose.allows_unpaged() {
            Paging::unpaged()
        } else {
            request.paging
        };
        self.query_string(request.query.as_deref())?
            .filters(&request.filter)?
            .sort(request.sort.as_deref())?
            .paging(paging, purpose, max_size)
    }

    #[must_use]
    pub fn build(self) -> TicketQuery {
        let mut stages = vec![self.access];
        stages.extend(self.parsed);
        stages.extend(self.coarse);
        let predicate = Predicate::And(stages).simplify();

        let mut sort = self.sort;
        let tiebreak = SortKey::tiebreak();
        if !sort.iter().any(|k| k.field == tiebreak.field) {
            sort.push(tiebreak);
        }

        debug!(%predicate, ?sort, paging = ?self.paging, "built ticket query");
        TicketQuery {
            predicate,
            sort,
            paging: self.paging,
        }
    }
}

/// Shorthand used by tests and the CLI: build a query with default bounds.
///
/// # Errors
///
/// Propagates validation errors from each stage.
pub fn build_query(
    tenant: &str,
    access: Predicate,
    request: &ListRequest,
    purpose: QueryPurpose,
) -> Result<TicketQuery> {
    Ok(TicketQueryBuilder::new(tenant, access)
        .request(request, purpose, DEFAULT_MAX_PAGE_SIZE)?
        .build())
}
