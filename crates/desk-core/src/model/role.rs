use serde::{Deserialize, Serialize};

/// Built-in role ids carried by `RoleKind::Default` roles.
pub mod builtin {
    /// Super admin.
    pub const SUPER_ADMIN: &str = "SA";
    /// Tenant admin.
    pub const TENANT_ADMIN: &str = "TA";
    /// First-line agent.
    pub const LEVEL_1: &str = "L1";
    /// Second-line agent.
    pub const LEVEL_2: &str = "L2";
    /// End user.
    pub const END_USER: &str = "EU";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleKind {
    Customer,
    Employee,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RequestPermission {
    pub view: bool,
    pub add: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdvancedViewPermission {
    pub all_ticket: bool,
    pub group_ticket: bool,
    pub technician_ticket: bool,
}

impl AdvancedViewPermission {
    #[must_use]
    pub const fn any(self) -> bool {
        self.all_ticket || self.group_ticket || self.technician_ticket
    }
}

/// A role definition as resolved for one request. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: RoleKind,
    #[serde(default)]
    pub request_permission: RequestPermission,
    #[serde(default)]
    pub advanced_view_permission: AdvancedViewPermission,
}

impl Role {
    fn is_default(&self, id: &str) -> bool {
        self.kind == RoleKind::Default && self.id == id
    }

    /// TA or SA: unrestricted tenant visibility and admin-only mutations.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_default(builtin::TENANT_ADMIN) || self.is_default(builtin::SUPER_ADMIN)
    }

    /// CUSTOMER-typed or the built-in end-user role.
    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.kind == RoleKind::Customer || self.is_default(builtin::END_USER)
    }

    /// EMPLOYEE-typed or one of the built-in agent levels.
    #[must_use]
    pub fn is_employee(&self) -> bool {
        self.kind == RoleKind::Employee
            || self.is_default(builtin::LEVEL_1)
            || self.is_default(builtin::LEVEL_2)
    }
}

/// Summary of a caller's role set, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSummary {
    pub can_view: bool,
    pub can_add: bool,
    pub admin: bool,
    pub customer: bool,
    pub employee: bool,
    pub advanced: AdvancedViewPermission,
}

impl RoleSummary {
    /// Fold a role set. Permission flags are OR-ed across roles: holding an
    /// extra role never removes a grant.
    #[must_use]
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self::default(), |acc, role| Self {
            can_view: acc.can_view || role.request_permission.view,
            can_add: acc.can_add || role.request_permission.add,
            admin: acc.admin || role.is_admin(),
            customer: acc.customer || role.is_customer(),
            employee: acc.employee || role.is_employee(),
            advanced: AdvancedViewPermission {
                all_ticket: acc.advanced.all_ticket || role.advanced_view_permission.all_ticket,
                group_ticket: acc.advanced.group_ticket
                    || role.advanced_view_permission.group_ticket,
                technician_ticket: acc.advanced.technician_ticket
                    || role.advanced_view_permission.technician_ticket,
            },
        })
    }
}
