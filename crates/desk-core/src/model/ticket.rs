use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{StatusRef, Workflow};

/// Prefix of every ticket id.
pub const TICKET_ID_PREFIX: &str = "tk-";

/// Derive a ticket id from its tenant-scoped number.
///
/// Numbers are unique per tenant, so hashing `tenant:number` gives a stable
/// id that never collides across tenants in practice.
#[must_use]
pub fn ticket_id(tenant: &str, number: u64) -> String {
    let hash = blake3::hash(format!("{tenant}:{number}").as_bytes());
    let hex = hash.to_hex();
    format!("{TICKET_ID_PREFIX}{}", &hex[..12])
}

/// A user reference embedded on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Reference to a tenant entity (group, department, service, type, priority).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// The template a ticket was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub description: String,
    pub resolved_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub resolved_time: DateTime<Utc>,
}

/// Which connect set a link lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Ticket to ticket, kept symmetric by two writes.
    Requests,
    /// Ticket to an incident owned by the remote incident service.
    Incidents,
}

impl LinkKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requests => "requests",
            Self::Incidents => "incidents",
        }
    }
}

/// Connect relationships of one ticket. Both lists are duplicate-free and
/// keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Connect {
    pub requests: Vec<String>,
    pub incidents: Vec<String>,
}

impl Connect {
    #[must_use]
    pub fn ids(&self, kind: LinkKind) -> &[String] {
        match kind {
            LinkKind::Requests => &self.requests,
            LinkKind::Incidents => &self.incidents,
        }
    }

    fn ids_mut(&mut self, kind: LinkKind) -> &mut Vec<String> {
        match kind {
            LinkKind::Requests => &mut self.requests,
            LinkKind::Incidents => &mut self.incidents,
        }
    }

    /// Append ids not already present. Returns the ids actually added.
    pub fn add(&mut self, kind: LinkKind, ids: &[String]) -> Vec<String> {
        let list = self.ids_mut(kind);
        let mut added = Vec::new();
        for id in ids {
            if !list.contains(id) {
                list.push(id.clone());
                added.push(id.clone());
            }
        }
        added
    }

    /// Remove the given ids. Returns the ids actually removed.
    pub fn remove(&mut self, kind: LinkKind, ids: &[String]) -> Vec<String> {
        let list = self.ids_mut(kind);
        let removed: Vec<String> = list.iter().filter(|id| ids.contains(id)).cloned().collect();
        list.retain(|id| !ids.contains(id));
        removed
    }

    /// Remove every id of `kind`. Returns what was removed.
    pub fn clear(&mut self, kind: LinkKind) -> Vec<String> {
        std::mem::take(self.ids_mut(kind))
    }
}

/// What happened in an activity entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActivityAction {
    Created {
        status: Option<StatusRef>,
    },
    StatusChanged {
        from: Option<StatusRef>,
        to: StatusRef,
    },
    ResolutionUpdated,
    RequestsLinked {
        ids: Vec<String>,
    },
    RequestsUnlinked {
        ids: Vec<String>,
    },
    IncidentsLinked {
        ids: Vec<String>,
    },
    IncidentsUnlinked {
        ids: Vec<String>,
    },
}

impl ActivityAction {
    /// The linked/unlinked activity for a change to one connect set.
    #[must_use]
    pub fn for_links(kind: LinkKind, added: bool, ids: Vec<String>) -> Self {
        match (kind, added) {
            (LinkKind::Requests, true) => Self::RequestsLinked { ids },
            (LinkKind::Requests, false) => Self::RequestsUnlinked { ids },
            (LinkKind::Incidents, true) => Self::IncidentsLinked { ids },
            (LinkKind::Incidents, false) => Self::IncidentsUnlinked { ids },
        }
    }
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(flatten)]
    pub action: ActivityAction,
    pub actor: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

impl Activity {
    #[must_use]
    pub fn new(action: ActivityAction, actor: impl Into<String>) -> Self {
        Self {
            action,
            actor: actor.into(),
            at: Utc::now(),
        }
    }
}

/// A ticket document.
///
/// `workflow` is the snapshot embedded at creation; `activities` only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub tenant: String,
    pub number: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Option<StatusRef>,
    pub workflow: Workflow,
    pub template: TemplateRef,
    pub creator: UserRef,
    pub requester: UserRef,
    #[serde(default)]
    pub technician: Option<UserRef>,
    #[serde(default)]
    pub group: Option<EntityRef>,
    #[serde(default)]
    pub department: Option<EntityRef>,
    #[serde(default)]
    pub service: Option<EntityRef>,
    #[serde(default, rename = "type")]
    pub ticket_type: Option<EntityRef>,
    #[serde(default)]
    pub priority: Option<EntityRef>,
    #[serde(default)]
    pub response_overdue: bool,
    #[serde(default)]
    pub resolve_overdue: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub overdue_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub connect: Connect,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_time: DateTime<Utc>,
}

impl Ticket {
    #[must_use]
    pub fn summary(&self) -> TicketSummary {
        TicketSummary {
            id: self.id.clone(),
            number: self.number,
            name: self.name.clone(),
            status: self.status.clone(),
        }
    }
}

/// Caller-supplied fields for ticket creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NewTicket {
    pub template_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the creator.
    pub requester: Option<UserRef>,
    pub technician: Option<UserRef>,
    pub group: Option<EntityRef>,
    pub department: Option<EntityRef>,
    pub service: Option<EntityRef>,
    #[serde(rename = "type")]
    pub ticket_type: Option<EntityRef>,
    pub priority: Option<EntityRef>,
}

/// Compact listing row shared with the incident service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: String,
    pub number: u64,
    pub name: String,
    #[serde(default)]
    pub status: Option<StatusRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn ticket_id_is_stable_and_tenant_scoped() {
        let a = ticket_id("acme", 7);
        assert_eq!(a, ticket_id("acme", 7));
        assert_ne!(a, ticket_id("globex", 7));
        assert!(a.starts_with(TICKET_ID_PREFIX));
        assert_eq!(a.len(), TICKET_ID_PREFIX.len() + 12);
    }

    #[test]
    fn connect_add_is_idempotent() {
        let mut connect = Connect::default();
        assert_eq!(connect.add(LinkKind::Requests, &ids(&["b", "c", "b"])), ids(&["b", "c"]));
        assert!(connect.add(LinkKind::Requests, &ids(&["c", "b"])).is_empty());
        assert_eq!(connect.requests, ids(&["b", "c"]));
        assert!(connect.incidents.is_empty());
    }

    #[test]
    fn connect_remove_reports_only_present_ids() {
        let mut connect = Connect {
            requests: Vec::new(),
            incidents: ids(&["i1", "i2", "i3"]),
        };
        assert_eq!(connect.remove(LinkKind::Incidents, &ids(&["i2", "i9"])), ids(&["i2"]));
        assert_eq!(connect.incidents, ids(&["i1", "i3"]));
        assert_eq!(connect.clear(LinkKind::Incidents), ids(&["i1", "i3"]));
        assert!(connect.incidents.is_empty());
    }

    #[test]
    fn activity_serializes_flat() {
        let activity = Activity::new(ActivityAction::ResolutionUpdated, "u-1");
        let json = serde_json::to_value(&activity).expect("serialize");
        assert_eq!(json["action"], "resolution_updated");
        assert_eq!(json["actor"], "u-1");
        assert!(json["at"].is_i64());
    }
}
