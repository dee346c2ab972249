use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::collab::Template;
use crate::error::{DeskError, ErrorCode};
use crate::model::role::builtin;
use crate::model::{AdvancedViewPermission, RequestPermission, Role, RoleKind};
use crate::query::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE};

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "DESK_CONFIG";

/// Config file location under a desk root.
pub const CONFIG_RELATIVE_PATH: &str = ".desk/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub incidents: IncidentConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Relative paths resolve against the desk root.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_size")]
    pub default_size: i64,
    #[serde(default = "default_max_page_size")]
    pub max_size: i64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_size: default_page_size(),
            max_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentConfig {
    /// Base URL of the incident service. Unset means incident links stay
    /// local and remote calls are skipped.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Static role, group, and template data for single-node deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_roles")]
    pub roles: Vec<Role>,
    /// User id → group ids.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_templates")]
    pub templates: Vec<Template>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            roles: default_roles(),
            groups: BTreeMap::new(),
            templates: default_templates(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".desk/desk.sqlite3")
}

const fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_page_size() -> i64 {
    DEFAULT_MAX_PAGE_SIZE
}

const fn default_timeout_ms() -> u64 {
    5_000
}

fn default_roles() -> Vec<Role> {
    let builtin_role = |id: &str, advanced: AdvancedViewPermission| Role {
        id: id.to_string(),
        kind: RoleKind::Default,
        request_permission: RequestPermission {
            view: true,
            add: true,
        },
        advanced_view_permission: advanced,
    };
    vec![
        builtin_role(builtin::SUPER_ADMIN, AdvancedViewPermission::default()),
        builtin_role(builtin::TENANT_ADMIN, AdvancedViewPermission::default()),
        builtin_role(
            builtin::LEVEL_1,
            AdvancedViewPermission {
                technician_ticket: true,
                ..AdvancedViewPermission::default()
            },
        ),
        builtin_role(
            builtin::LEVEL_2,
            AdvancedViewPermission {
                group_ticket: true,
                technician_ticket: true,
                ..AdvancedViewPermission::default()
            },
        ),
        builtin_role(builtin::END_USER, AdvancedViewPermission::default()),
    ]
}

fn default_templates() -> Vec<Template> {
    vec![Template {
        id: "default".into(),
        name: "Default".into(),
        workflow_id: "default".into(),
    }]
}

impl DeskConfig {
    /// Store path resolved against `root`.
    #[must_use]
    pub fn store_path(&self, root: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            root.join(&self.store.path)
        }
    }
}

/// Load config from `$DESK_CONFIG`, else `<root>/.desk/config.toml`.
/// A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<DeskConfig> {
    let path = env::var_os(CONFIG_ENV).map_or_else(|| root.join(CONFIG_RELATIVE_PATH), PathBuf::from);
    load_config_file(&path)
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<DeskConfig> {
    if !path.exists() {
        return Ok(DeskConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<DeskConfig>(&content).map_err(|err| {
        DeskError::invalid(
            "config",
            ErrorCode::ConfigParseError,
            format!("{}: {err}", path.display()),
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.paging.max_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.directory.roles.len(), 5);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[paging]
max_size = 50

[incidents]
base_url = "http://incidents.internal"

[directory.groups]
"u-7" = ["g-1", "g-2"]

[[directory.roles]]
id = "agents"
type = "EMPLOYEE"
request_permission = { view = true, add = true }
advanced_view_permission = { group_ticket = true }
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.paging.max_size, 50);
        assert_eq!(config.paging.default_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.incidents.timeout_ms, 5_000);
        assert_eq!(config.directory.groups["u-7"], vec!["g-1", "g-2"]);
        assert_eq!(config.directory.roles.len(), 1);
        assert_eq!(config.directory.roles[0].kind, RoleKind::Employee);
        assert!(config.directory.roles[0].advanced_view_permission.group_ticket);
        assert_eq!(config.directory.templates, default_templates());
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[paging\nmax_size = 1").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
        let desk = err.downcast_ref::<DeskError>().expect("typed config error");
        assert_eq!(desk.code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn relative_store_path_resolves_against_root() {
        let config = DeskConfig::default();
        let root = Path::new("/srv/desk");
        assert_eq!(config.store_path(root), root.join(".desk/desk.sqlite3"));
    }
}
