//! Wiring from config to services for one CLI invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use desk_core::collab::{HttpIncidentClient, IncidentService, RoleDirectory, StaticDirectory};
use desk_core::config::{DeskConfig, load_config, load_config_file};
use desk_core::db::SqliteStore;
use desk_core::model::Caller;
use desk_core::{AccessResolver, LinkConsistencyManager, ServiceDeps, TicketService};
use tracing::debug;

/// Who the command runs as.
#[derive(Debug, Clone)]
pub struct Identity {
    pub tenant: String,
    pub user: String,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn caller(&self) -> Caller {
        Caller::new(&self.tenant, &self.user, self.roles.iter().cloned())
    }
}

pub struct App {
    pub config: DeskConfig,
    pub store: SqliteStore,
    pub tickets: TicketService,
    pub links: LinkConsistencyManager,
}

/// Config from `--config` when given, else `$DESK_CONFIG` or the root default.
pub fn resolve_config(root: &Path, explicit: Option<&PathBuf>) -> Result<DeskConfig> {
    match explicit {
        Some(path) => load_config_file(path),
        None => load_config(root),
    }
}

impl App {
    pub fn open(root: &Path, explicit_config: Option<&PathBuf>) -> Result<Self> {
        let config = resolve_config(root, explicit_config)?;
        let db_path = config.store_path(root);
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?;
        debug!(path = %db_path.display(), "opened store");

        let directory = Arc::new(StaticDirectory::new(config.directory.clone()));
        let roles: Arc<dyn RoleDirectory> = directory.clone();
        let resolver = AccessResolver::new(roles, directory.clone());

        let incidents: Option<Arc<dyn IncidentService>> =
            config.incidents.base_url.as_deref().map(|url| {
                let client = HttpIncidentClient::new(url, Duration::from_millis(config.incidents.timeout_ms));
                Arc::new(client) as Arc<dyn IncidentService>
            });

        let shared = Arc::new(store.clone());
        let tickets = TicketService::new(ServiceDeps {
            tickets: shared.clone(),
            workflows: shared.clone(),
            templates: directory,
            numbers: Arc::new(store.sequence()),
            resolver: resolver.clone(),
        })
        .with_max_page_size(config.paging.max_size);
        let links = LinkConsistencyManager::new(shared, incidents, resolver)
            .with_max_page_size(config.paging.max_size);

        Ok(Self {
            config,
            store,
            tickets,
            links,
        })
    }
}
