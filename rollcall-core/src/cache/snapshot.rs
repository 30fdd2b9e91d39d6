//! Immutable permission snapshots

use crate::rbac::{DirectoryGrant, Permission, Role};
use std::collections::HashSet;
use std::sync::Arc;

/// Everything a principal was granted as of one directory response
///
/// Keeps the full records for category queries, plus name sets for
/// membership checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantedAccess {
    principal_id: Option<String>,
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    permission_names: HashSet<String>,
    role_names: HashSet<String>,
}

impl GrantedAccess {
    /// Materialize a grant: direct permissions plus every permission of every role
    pub fn from_grant(principal_id: impl Into<String>, grant: DirectoryGrant) -> Self {
        let DirectoryGrant { permissions: direct, roles } = grant;

        let mut permission_names = HashSet::new();
        let mut permissions = Vec::new();
        for permission in direct.into_iter().chain(roles.iter().flat_map(|r| r.permissions.clone())) {
            if permission_names.insert(permission.name.as_str().to_string()) {
                permissions.push(permission);
            }
        }
        let role_names = roles.iter().map(|r| r.name.clone()).collect();

        Self { principal_id: Some(principal_id.into()), permissions, roles, permission_names, role_names }
    }

    pub fn principal_id(&self) -> Option<&str> {
        self.principal_id.as_deref()
    }
}

/// Point-in-time view of the permission cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSnapshot {
    pub(crate) access: Arc<GrantedAccess>,
    pub(crate) is_loading: bool,
    pub(crate) error: Option<String>,
}

impl PermissionSnapshot {
    /// The empty, unauthenticated snapshot
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn with_access(access: GrantedAccess) -> Self {
        Self { access: Arc::new(access), is_loading: false, error: None }
    }

    pub fn permission_names(&self) -> &HashSet<String> {
        &self.access.permission_names
    }

    pub fn role_names(&self) -> &HashSet<String> {
        &self.access.role_names
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.access.permissions
    }

    pub fn roles(&self) -> &[Role] {
        &self.access.roles
    }

    /// Principal whose grant this snapshot holds, if any
    pub fn principal_id(&self) -> Option<&str> {
        self.access.principal_id()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn contains_permission(&self, name: &str) -> bool {
        self.access.permission_names.contains(name)
    }

    pub fn contains_role(&self, name: &str) -> bool {
        self.access.role_names.contains(name)
    }

    /// No permissions and no roles
    pub fn is_empty(&self) -> bool {
        self.access.permission_names.is_empty() && self.access.role_names.is_empty()
    }
}
