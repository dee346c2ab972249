//! Shared harness for desk-core integration tests: an in-memory SQLite
//! store, config-backed directories, and a scriptable incident service.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use desk_core::collab::{
    GroupDirectory, IncidentService, RoleDirectory, StaticDirectory, Template,
};
use desk_core::config::DirectoryConfig;
use desk_core::db::SqliteStore;
use desk_core::error::{DeskError, Result};
use desk_core::model::{
    AdvancedViewPermission, Caller, NewTicket, RequestPermission, Role, RoleKind, Ticket,
    TicketSummary,
};
use desk_core::query::{Page, Paging, SortKey};
use desk_core::store::WorkflowStore;
use desk_core::workflow::{Edge, Node, NodeKind, Status, Workflow, WorkflowKind};
use desk_core::{AccessResolver, LinkConsistencyManager, ServiceDeps, TicketService};

pub const TENANT: &str = "acme";

pub fn status(id: &str) -> Status {
    Status {
        id: id.to_string(),
        name: id.to_ascii_uppercase(),
        description: None,
    }
}

pub fn node(id: &str, kind: NodeKind, status_id: Option<&str>) -> Node {
    Node {
        id: id.to_string(),
        kind,
        status: status_id.map(status),
    }
}

pub fn edge(source: &str, target: &str) -> Edge {
    Edge {
        id: None,
        source: source.to_string(),
        target: target.to_string(),
    }
}

/// start -> open -> {in_progress, closed}; in_progress -> {open, closed}
pub fn support_flow(id: &str) -> Workflow {
    Workflow {
        id: id.to_string(),
        tenant: None,
        kind: WorkflowKind::Default,
        nodes: vec![
            node("start", NodeKind::Start, None),
            node("n-open", NodeKind::Normal, Some("open")),
            node("n-progress", NodeKind::Normal, Some("in_progress")),
            node("n-closed", NodeKind::End, Some("closed")),
        ],
        edges: vec![
            edge("start", "n-open"),
            edge("n-open", "n-progress"),
            edge("n-open", "n-closed"),
            edge("n-progress", "n-open"),
            edge("n-progress", "n-closed"),
        ],
    }
}

/// A START node with nowhere to go.
pub fn dead_end_flow(id: &str) -> Workflow {
    Workflow {
        id: id.to_string(),
        tenant: None,
        kind: WorkflowKind::Custom,
        nodes: vec![
            node("start", NodeKind::Start, None),
            node("n-open", NodeKind::Normal, Some("open")),
        ],
        edges: vec![],
    }
}

pub fn role(
    id: &str,
    kind: RoleKind,
    view: bool,
    add: bool,
    advanced: AdvancedViewPermission,
) -> Role {
    Role {
        id: id.to_string(),
        kind,
        request_permission: RequestPermission { view, add },
        advanced_view_permission: advanced,
    }
}

fn directory_config() -> DirectoryConfig {
    let mut config = DirectoryConfig::default();
    config.roles.push(role(
        "buyers",
        RoleKind::Customer,
        true,
        true,
        AdvancedViewPermission::default(),
    ));
    config.roles.push(role(
        "readers",
        RoleKind::Customer,
        true,
        false,
        AdvancedViewPermission::default(),
    ));
    config.roles.push(role(
        "auditors",
        RoleKind::Customer,
        false,
        false,
        AdvancedViewPermission {
            all_ticket: true,
            ..AdvancedViewPermission::default()
        },
    ));
    config.roles.push(role(
        "blind",
        RoleKind::Employee,
        false,
        true,
        AdvancedViewPermission {
            all_ticket: true,
            group_ticket: true,
            technician_ticket: true,
        },
    ));
    config.templates.push(Template {
        id: "broken".into(),
        name: "Broken".into(),
        workflow_id: "dead-end".into(),
    });
    config.templates.push(Template {
        id: "orphan".into(),
        name: "Orphan".into(),
        workflow_id: "missing-workflow".into(),
    });
    config.groups = BTreeMap::from([("agent-2".to_string(), vec!["g-net".to_string()])]);
    config
}

/// Scriptable incident service that records calls.
#[derive(Default)]
pub struct FakeIncidents {
    pub fail: Mutex<bool>,
    /// Value reported by `register_incident_link`; `None` echoes the number
    /// of ids passed.
    pub register_reply: Mutex<Option<u64>>,
    /// Value reported by `unregister_incident_link`; `None` echoes the
    /// number of ids passed.
    pub unregister_reply: Mutex<Option<u64>>,
    pub registered: Mutex<Vec<(String, Vec<String>)>>,
    pub unregistered: Mutex<Vec<(String, Vec<String>)>>,
    /// Ticket summaries seen by `register_incident_link`, by ticket id.
    pub tickets: Mutex<BTreeMap<String, TicketSummary>>,
    /// Arguments of every `list_incident_connections` call.
    pub listed: Mutex<Vec<(Vec<String>, Paging, Vec<SortKey>)>>,
}

impl FakeIncidents {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn check(&self) -> Result<()> {
        if *self.fail.lock().unwrap() {
            Err(DeskError::upstream("incident", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IncidentService for FakeIncidents {
    async fn register_incident_link(
        &self,
        _tenant: &str,
        ticket: &TicketSummary,
        incident_ids: &[String],
    ) -> Result<u64> {
        self.check()?;
        self.registered
            .lock()
            .unwrap()
            .push((ticket.id.clone(), incident_ids.to_vec()));
        self.tickets
            .lock()
            .unwrap()
            .insert(ticket.id.clone(), ticket.clone());
        Ok(self
            .register_reply
            .lock()
            .unwrap()
            .unwrap_or(incident_ids.len() as u64))
    }

    async fn unregister_incident_link(
        &self,
        _tenant: &str,
        ticket_id: &str,
        incident_ids: &[String],
    ) -> Result<u64> {
        self.check()?;
        self.unregistered
            .lock()
            .unwrap()
            .push((ticket_id.to_string(), incident_ids.to_vec()));
        Ok(self
            .unregister_reply
            .lock()
            .unwrap()
            .unwrap_or(incident_ids.len() as u64))
    }

    /// Tickets registered against any of `incident_ids`, newest first.
    async fn list_incident_connections(
        &self,
        _tenant: &str,
        incident_ids: &[String],
        paging: Paging,
        sort: &[SortKey],
    ) -> Result<Page<TicketSummary>> {
        self.check()?;
        self.listed
            .lock()
            .unwrap()
            .push((incident_ids.to_vec(), paging, sort.to_vec()));

        let connected: Vec<String> = self
            .registered
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, ids)| ids.iter().any(|id| incident_ids.contains(id)))
            .map(|(ticket, _)| ticket.clone())
            .collect();
        let tickets = self.tickets.lock().unwrap();
        let mut matches: Vec<TicketSummary> = tickets
            .values()
            .filter(|t| connected.contains(&t.id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.number.cmp(&a.number));

        let total = matches.len() as u64;
        let items = match paging.window() {
            Some((limit, offset)) => matches
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => matches,
        };
        Ok(Page::new(items, total, paging))
    }
}

/// Group directory that always fails.
pub struct BrokenGroups;

#[async_trait]
impl GroupDirectory for BrokenGroups {
    async fn group_ids_of(&self, _tenant: &str, _user_id: &str) -> Result<Vec<String>> {
        Err(DeskError::upstream("groups", "directory offline"))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: SqliteStore,
    pub service: TicketService,
    pub links: LinkConsistencyManager,
    pub incidents: Arc<FakeIncidents>,
}

impl Harness {
    pub async fn new() -> Self {
        let directory = Arc::new(StaticDirectory::new(directory_config()));
        Self::with_groups(directory.clone(), directory).await
    }

    pub async fn with_groups(
        directory: Arc<StaticDirectory>,
        groups: Arc<dyn GroupDirectory>,
    ) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("desk.sqlite3")).expect("open store");
        WorkflowStore::save(&store, &support_flow("default"))
            .await
            .expect("save default workflow");
        WorkflowStore::save(&store, &dead_end_flow("dead-end"))
            .await
            .expect("save dead-end workflow");

        let roles: Arc<dyn RoleDirectory> = directory.clone();
        let resolver = AccessResolver::new(roles, groups);
        let shared = Arc::new(store.clone());
        let incidents = Arc::new(FakeIncidents::default());

        let service = TicketService::new(ServiceDeps {
            tickets: shared.clone(),
            workflows: shared.clone(),
            templates: directory,
            numbers: Arc::new(store.sequence()),
            resolver: resolver.clone(),
        });
        let remote: Arc<dyn IncidentService> = incidents.clone();
        let links = LinkConsistencyManager::new(shared, Some(remote), resolver);

        Self {
            dir,
            store,
            service,
            links,
            incidents,
        }
    }

    pub async fn create(&self, caller: &Caller, name: &str) -> Ticket {
        self.service
            .create_ticket(
                caller,
                NewTicket {
                    template_id: "default".into(),
                    name: name.into(),
                    ..NewTicket::default()
                },
            )
            .await
            .expect("create ticket")
    }

    /// Delete a ticket row behind the service's back, the way a crashed
    /// or foreign writer would.
    pub fn delete_out_of_band(&self, id: &str) {
        let conn = rusqlite::Connection::open(self.dir.path().join("desk.sqlite3")).expect("open db");
        let deleted = conn
            .execute("DELETE FROM tickets WHERE ticket_id = ?1", [id])
            .expect("delete ticket");
        assert_eq!(deleted, 1, "ticket {id} should exist before deletion");
    }
}

pub fn caller(user: &str, roles: &[&str]) -> Caller {
    Caller::new(TENANT, user, roles.iter().copied())
}

pub fn admin() -> Caller {
    caller("admin-1", &["TA"])
}

pub fn customer(user: &str) -> Caller {
    caller(user, &["buyers"])
}
