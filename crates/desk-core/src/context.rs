//! Per-request caller resolution.
//!
//! Roles and group memberships are fetched fresh for every request and
//! compiled into an access predicate; nothing is cached between requests.

use std::sync::Arc;

use tracing::debug;

use crate::access::{AccessInput, Predicate, compile_access, scoped};
use crate::collab::{GroupDirectory, RoleDirectory};
use crate::error::{DeskError, Result};
use crate::model::{Caller, Role, RoleSummary, Ticket};

/// A caller with roles and groups resolved and visibility compiled.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Caller,
    pub roles: Vec<Role>,
    pub groups: Vec<String>,
    /// Access predicate without the tenant clause.
    pub access: Predicate,
    summary: RoleSummary,
}

impl RequestContext {
    #[must_use]
    pub fn new(caller: Caller, roles: Vec<Role>, groups: Vec<String>) -> Self {
        let access = compile_access(AccessInput {
            roles: &roles,
            user_id: &caller.user_id,
            group_ids: &groups,
        });
        let summary = RoleSummary::of(&roles);
        Self {
            caller,
            roles,
            groups,
            access,
            summary,
        }
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.caller.tenant
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.caller.user_id
    }

    #[must_use]
    pub const fn summary(&self) -> RoleSummary {
        self.summary
    }

    /// Tenant-scoped access predicate.
    #[must_use]
    pub fn visibility(&self) -> Predicate {
        scoped(self.tenant(), self.access.clone())
    }

    #[must_use]
    pub fn can_see(&self, ticket: &Ticket) -> bool {
        self.visibility().matches(ticket)
    }

    /// Fail unless the caller holds TA or SA.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::PermissionDenied`] naming `action`.
    pub const fn require_admin(&self, action: &'static str) -> Result<()> {
        if self.summary.admin {
            Ok(())
        } else {
            Err(DeskError::PermissionDenied { action })
        }
    }
}

/// Resolves callers against the role and group directories.
#[derive(Clone)]
pub struct AccessResolver {
    roles: Arc<dyn RoleDirectory>,
    groups: Arc<dyn GroupDirectory>,
}

impl std::fmt::Debug for AccessResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessResolver").finish_non_exhaustive()
    }
}

impl AccessResolver {
    #[must_use]
    pub fn new(roles: Arc<dyn RoleDirectory>, groups: Arc<dyn GroupDirectory>) -> Self {
        Self { roles, groups }
    }

    /// Look up roles and groups concurrently. Either failure fails the
    /// request.
    ///
    /// # Errors
    ///
    /// Propagates the first directory error.
    pub async fn resolve(&self, caller: &Caller) -> Result<RequestContext> {
        let (roles, groups) = tokio::try_join!(
            self.roles.roles_by_ids(&caller.tenant, &caller.role_ids),
            self.groups.group_ids_of(&caller.tenant, &caller.user_id),
        )?;
        debug!(
            tenant = %caller.tenant,
            user = %caller.user_id,
            roles = roles.len(),
            groups = groups.len(),
            "resolved caller"
        );
        Ok(RequestContext::new(caller.clone(), roles, groups))
    }
}
