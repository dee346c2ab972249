//! Ticket, role, and caller types shared across the lifecycle core.

pub mod caller;
pub mod role;
pub mod ticket;

pub use caller::Caller;
pub use role::{AdvancedViewPermission, RequestPermission, Role, RoleKind, RoleSummary};
pub use ticket::{
    Activity, ActivityAction, Connect, EntityRef, LinkKind, NewTicket, Resolution, TemplateRef,
    Ticket, TicketSummary, UserRef,
};
