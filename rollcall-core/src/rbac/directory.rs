//! Role/permission directory collaborator
//!
//! The directory is the source of truth for what a principal may do. The
//! permission cache calls it through [`PermissionDirectory`] and never mutates
//! roles itself.

use super::permissions::Permission;
use super::roles::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Failure talking to the directory
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory unreachable: {0}")]
    Network(String),
    #[error("Directory refused request: {0}")]
    Unauthorized(String),
    #[error("Unknown principal: {0}")]
    NotFound(String),
}

/// What the directory grants a principal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryGrant {
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl DirectoryGrant {
    pub fn new(permissions: Vec<Permission>, roles: Vec<Role>) -> Self {
        Self { permissions, roles }
    }

    /// Grant carrying exactly the given roles and their permissions
    pub fn from_roles(roles: Vec<Role>) -> Self {
        Self { permissions: Vec::new(), roles }
    }
}

impl From<Role> for DirectoryGrant {
    fn from(role: Role) -> Self {
        Self::from_roles(vec![role])
    }
}

impl From<super::roles::SystemRole> for DirectoryGrant {
    fn from(role: super::roles::SystemRole) -> Self {
        Self::from_roles(vec![role.to_role()])
    }
}

/// Role/permission directory
///
/// Implement this trait to back the permission cache with a REST API,
/// a database, or a static definition.
#[async_trait::async_trait]
pub trait PermissionDirectory: Send + Sync {
    /// Fetch the permissions and roles currently granted to a principal
    async fn fetch_permissions_and_roles(
        &self,
        principal_id: &str,
    ) -> Result<DirectoryGrant, DirectoryError>;
}

#[async_trait::async_trait]
impl<D: PermissionDirectory + ?Sized> PermissionDirectory for Arc<D> {
    async fn fetch_permissions_and_roles(
        &self,
        principal_id: &str,
    ) -> Result<DirectoryGrant, DirectoryError> {
        (**self).fetch_permissions_and_roles(principal_id).await
    }
}

/// In-process directory built from role definitions
///
/// # Example
///
/// ```
/// use rollcall_core::rbac::{StaticDirectory, SystemRole};
///
/// let directory = StaticDirectory::new()
///     .with_role(SystemRole::Teacher.to_role())
///     .assign("u1", "teacher");
/// ```
#[derive(Clone, Default)]
pub struct StaticDirectory {
    roles: Arc<RwLock<HashMap<String, Role>>>,
    assignments: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory knowing every built-in system role
    pub fn with_system_roles() -> Self {
        super::roles::SystemRole::ALL
            .iter()
            .fold(Self::new(), |dir, role| dir.with_role(role.to_role()))
    }

    /// Register a role definition, keyed by name
    pub fn with_role(self, role: Role) -> Self {
        self.roles.write().unwrap_or_else(PoisonError::into_inner).insert(role.name.clone(), role);
        self
    }

    /// Grant a role (by name) to a principal
    pub fn assign(self, principal_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        self.grant_role(principal_id, role_name);
        self
    }

    /// Grant a role at runtime
    pub fn grant_role(&self, principal_id: impl Into<String>, role_name: impl Into<String>) {
        self.assignments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(principal_id.into())
            .or_default()
            .push(role_name.into());
    }

    /// Revoke every role of a principal
    pub fn revoke_all(&self, principal_id: &str) {
        self.assignments.write().unwrap_or_else(PoisonError::into_inner).remove(principal_id);
    }
}

#[async_trait::async_trait]
impl PermissionDirectory for StaticDirectory {
    async fn fetch_permissions_and_roles(
        &self,
        principal_id: &str,
    ) -> Result<DirectoryGrant, DirectoryError> {
        let assignments = self.assignments.read().unwrap_or_else(PoisonError::into_inner);
        let Some(role_names) = assignments.get(principal_id) else {
            return Err(DirectoryError::NotFound(principal_id.to_string()));
        };

        let roles = self.roles.read().unwrap_or_else(PoisonError::into_inner);
        let granted = role_names.iter().filter_map(|name| roles.get(name).cloned()).collect();
        Ok(DirectoryGrant::from_roles(granted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::SystemRole;

    #[tokio::test]
    async fn test_static_directory_resolves_assignments() {
        let directory = StaticDirectory::with_system_roles().assign("u1", "teacher");

        let grant = directory.fetch_permissions_and_roles("u1").await.unwrap();
        assert_eq!(grant.roles.len(), 1);
        assert_eq!(grant.roles[0], SystemRole::Teacher.to_role());
    }

    #[tokio::test]
    async fn test_static_directory_unknown_principal() {
        let directory = StaticDirectory::with_system_roles();
        let err = directory.fetch_permissions_and_roles("ghost").await.unwrap_err();
        assert_eq!(err, DirectoryError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_role_names_are_skipped() {
        let directory = StaticDirectory::new().assign("u1", "janitor");
        let grant = directory.fetch_permissions_and_roles("u1").await.unwrap();
        assert!(grant.roles.is_empty());
    }
}
