use async_trait::async_trait;

use super::{GroupDirectory, RoleDirectory, Template, TemplateCatalog};
use crate::config::DirectoryConfig;
use crate::error::Result;
use crate::model::Role;

/// Roles, group memberships and templates read from config.
///
/// Tenant-agnostic: every tenant sees the same definitions.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    config: DirectoryConfig,
}

impl StaticDirectory {
    #[must_use]
    pub const fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RoleDirectory for StaticDirectory {
    async fn roles_by_ids(&self, _tenant: &str, ids: &[String]) -> Result<Vec<Role>> {
        Ok(self
            .config
            .roles
            .iter()
            .filter(|role| ids.contains(&role.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GroupDirectory for StaticDirectory {
    async fn group_ids_of(&self, _tenant: &str, user_id: &str) -> Result<Vec<String>> {
        Ok(self.config.groups.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TemplateCatalog for StaticDirectory {
    async fn template(&self, _tenant: &str, id: &str) -> Result<Option<Template>> {
        Ok(self.config.templates.iter().find(|t| t.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_builtin_roles_and_skips_unknown() {
        let dir = StaticDirectory::new(DirectoryConfig::default());
        let roles = dir
            .roles_by_ids("acme", &["L1".into(), "nope".into()])
            .await
            .unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].id, "L1");
    }

    #[tokio::test]
    async fn unknown_user_has_no_groups() {
        let dir = StaticDirectory::default();
        assert!(dir.group_ids_of("acme", "u-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_template_points_at_default_workflow() {
        let dir = StaticDirectory::default();
        let tpl = dir.template("acme", "default").await.unwrap().unwrap();
        assert_eq!(tpl.workflow_id, "default");
        assert!(dir.template("acme", "missing").await.unwrap().is_none());
    }
}
