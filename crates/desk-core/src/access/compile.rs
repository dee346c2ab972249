//! Role-based ticket visibility.
//!
//! [`compile_access`] turns one caller's role set into the predicate that
//! restricts every ticket read, listing, export, and aggregate. It runs once
//! per request and is a pure function: role definitions and group
//! memberships are resolved by the caller and passed in.
//!
//! Decision table, in order:
//!
//! 1. No role grants `request_permission.view` → [`Predicate::Nothing`].
//!    This gate dominates everything below, admins included.
//! 2. TA / SA → [`Predicate::Any`].
//! 3. Own-ticket clause (`creator.id = u OR requester.id = u`) when the
//!    caller holds a customer role (CUSTOMER or EU) and no agent role
//!    (EMPLOYEE, L1, L2).
//! 4. Advanced-view clause when the caller holds an agent role or any role
//!    carrying an advanced-view flag: `all_ticket` → any ticket, else
//!    `group_ticket` → `group.id ∈ groups`, else `technician_ticket` →
//!    `technician.id = u`.
//! 5. Clauses from 3 and 4 are OR-ed. When neither fires, the caller sees
//!    only their own tickets.
//!
//! Tenant scoping is not part of the access predicate; [`scoped`] adds the
//! `tenant = …` clause and every store query goes through it.

use tracing::debug;

use super::predicate::{Field, Predicate};
use crate::model::{Role, RoleSummary};

/// Visibility inputs for a single request.
#[derive(Debug, Clone, Copy)]
pub struct AccessInput<'a> {
    pub roles: &'a [Role],
    pub user_id: &'a str,
    /// Groups the user belongs to. Only consulted by the group branch.
    pub group_ids: &'a [String],
}

/// Compile the access predicate for one caller.
#[must_use]
pub fn compile_access(input: AccessInput<'_>) -> Predicate {
    let summary = RoleSummary::of(input.roles);

    if !summary.can_view {
        debug!(user = input.user_id, "no role grants request view");
        return Predicate::Nothing;
    }

    if summary.admin {
        return Predicate::Any;
    }

    let mut clauses = Vec::new();

    if summary.customer && !summary.employee {
        clauses.push(own_tickets(input.user_id));
    }

    if summary.employee || summary.advanced.any() {
        if let Some(clause) = advanced_view(&summary, input) {
            clauses.push(clause);
        }
    }

    let predicate = match clauses.len() {
        0 => own_tickets(input.user_id),
        1 => clauses.remove(0),
        _ => Predicate::Or(clauses),
    };

    debug!(user = input.user_id, %predicate, "compiled access predicate");
    predicate
}

/// AND the access predicate with the caller's tenant.
#[must_use]
pub fn scoped(tenant: &str, access: Predicate) -> Predicate {
    Predicate::And(vec![Predicate::eq(Field::Tenant, tenant), access])
}

/// Tickets the user created or requested.
#[must_use]
pub fn own_tickets(user_id: &str) -> Predicate {
    Predicate::Or(vec![
        Predicate::eq(Field::CreatorId, user_id),
        Predicate::eq(Field::RequesterId, user_id),
    ])
}

fn advanced_view(summary: &RoleSummary, input: AccessInput<'_>) -> Option<Predicate> {
    if summary.advanced.all_ticket {
        Some(Predicate::Any)
    } else if summary.advanced.group_ticket {
        Some(Predicate::any_of(Field::GroupId, input.group_ids))
    } else if summary.advanced.technician_ticket {
        Some(Predicate::eq(Field::TechnicianId, input.user_id))
    } else {
        None
    }
}
