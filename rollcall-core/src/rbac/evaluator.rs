//! Authorization evaluator
//!
//! Every check in the crate ends up here. An [`Evaluator`] pairs one session
//! snapshot with one permission snapshot and one access table, and answers
//! questions about them without side effects. Take a fresh evaluator to see
//! later changes.
//!
//! Rules shared by every check:
//! - Nothing is granted to an unauthenticated session.
//! - Names compare by plain string equality.
//! - A blank name never matches.
//! - An empty requirement list is satisfied (`ANY` of nothing included).

use super::permissions::{Permission, PermissionAction};
use super::requirement::{DenyReason, Decision, MatchMode, Requirement};
use super::table::AccessTable;
use crate::cache::PermissionSnapshot;
use crate::session::{Principal, SessionState};
use std::sync::Arc;

fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    session: Arc<SessionState>,
    permissions: Arc<PermissionSnapshot>,
    table: Arc<AccessTable>,
}

impl Evaluator {
    pub fn new(
        session: Arc<SessionState>,
        permissions: Arc<PermissionSnapshot>,
        table: Arc<AccessTable>,
    ) -> Self {
        Self { session, permissions, table }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.principal()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn permissions(&self) -> &PermissionSnapshot {
        &self.permissions
    }

    /// Permissions are still being fetched
    pub fn is_loading(&self) -> bool {
        self.permissions.is_loading()
    }

    // ---- primitives ----------------------------------------------------

    pub fn has_permission(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.is_authenticated() && !is_blank(name) && self.permissions.contains_permission(name)
    }

    /// At least one of `names`; true for an empty list
    pub fn has_any_permission<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut empty = true;
        for name in names {
            empty = false;
            if self.has_permission(name) {
                return true;
            }
        }
        empty
    }

    /// Every one of `names`; true for an empty list
    pub fn has_all_permissions<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().all(|name| self.has_permission(name))
    }

    pub fn has_role(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.is_authenticated() && !is_blank(name) && self.permissions.contains_role(name)
    }

    pub fn has_any_role<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut empty = true;
        for name in names {
            empty = false;
            if self.has_role(name) {
                return true;
            }
        }
        empty
    }

    pub fn has_all_roles<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().all(|name| self.has_role(name))
    }

    // ---- decisions -----------------------------------------------------

    pub fn authorize(&self, requirement: &Requirement) -> Decision {
        match requirement {
            Requirement::Permission(name) => self.authorize_permissions(std::slice::from_ref(name), MatchMode::All),
            Requirement::Permissions { names, mode } => self.authorize_permissions(names, *mode),
            Requirement::Role(name) => self.authorize_roles(std::slice::from_ref(name), MatchMode::All),
            Requirement::Roles { names, mode } => self.authorize_roles(names, *mode),
            Requirement::Route(key) => self.can_access_route(key),
            Requirement::Feature(key) => self.can_access_feature(key),
            Requirement::Owned { permission, owner_id } => self.authorize_with_ownership(permission, owner_id),
            Requirement::Access { permissions, roles, mode } => {
                let decision = self.authorize_permissions(permissions, *mode);
                if !decision.allowed {
                    return decision;
                }
                self.authorize_roles(roles, *mode)
            }
        }
    }

    /// Check a list of permission names
    ///
    /// `All` reports every absent name in `missing`. `Any` allows as soon as
    /// one name is present (or the list is empty) and reports `missing` only
    /// when denying.
    pub fn authorize_permissions<S: AsRef<str>>(&self, names: &[S], mode: MatchMode) -> Decision {
        self.decide(names, mode, DenyReason::MissingPermissions, DenyReason::NoneOfRequired, |n| {
            self.permissions.contains_permission(n)
        })
    }

    pub fn authorize_roles<S: AsRef<str>>(&self, names: &[S], mode: MatchMode) -> Decision {
        self.decide(names, mode, DenyReason::MissingRoles, DenyReason::MissingRoles, |n| {
            self.permissions.contains_role(n)
        })
    }

    fn decide<S, F>(
        &self,
        names: &[S],
        mode: MatchMode,
        missing_all: DenyReason,
        missing_any: DenyReason,
        present: F,
    ) -> Decision
    where
        S: AsRef<str>,
        F: Fn(&str) -> bool,
    {
        if !self.is_authenticated() {
            return Decision::deny(DenyReason::NotAuthenticated);
        }

        let blank: Vec<String> =
            names.iter().map(|n| n.as_ref()).filter(|n| is_blank(n)).map(str::to_string).collect();
        if !blank.is_empty() {
            return Decision::deny(DenyReason::InvalidRequirement).with_missing(blank);
        }

        let missing: Vec<String> =
            names.iter().map(|n| n.as_ref()).filter(|n| !present(n)).map(str::to_string).collect();

        match mode {
            MatchMode::All if missing.is_empty() => Decision::allow(),
            MatchMode::All => Decision::deny(missing_all).with_missing(missing),
            MatchMode::Any if names.is_empty() || missing.len() < names.len() => Decision::allow(),
            MatchMode::Any => Decision::deny(missing_any).with_missing(missing),
        }
    }

    /// Route check against the access table; unmapped routes only need a session
    pub fn can_access_route(&self, route_key: &str) -> Decision {
        self.authorize_permissions(self.table.route_permissions(route_key), MatchMode::All)
    }

    /// Feature check against the access table; unmapped features only need a session
    pub fn can_access_feature(&self, feature_key: &str) -> Decision {
        self.authorize_permissions(self.table.feature_permissions(feature_key), MatchMode::All)
    }

    /// Allowed with the permission, or as the owner of the resource
    pub fn authorize_with_ownership(&self, permission: &str, owner_id: &str) -> Decision {
        if !self.is_authenticated() {
            return Decision::deny(DenyReason::NotAuthenticated);
        }
        if is_blank(permission) {
            return Decision::deny(DenyReason::InvalidRequirement).with_missing(vec![permission.to_string()]);
        }
        if self.has_permission(permission) {
            return Decision::allow();
        }
        let is_owner = !is_blank(owner_id) && self.session.principal_id() == Some(owner_id);
        if is_owner {
            Decision::allow()
        } else {
            Decision::deny(DenyReason::NotOwner).with_missing(vec![permission.to_string()])
        }
    }

    // ---- resource helpers ----------------------------------------------

    /// `resource:action`
    pub fn can(&self, resource: &str, action: &str) -> bool {
        self.has_permission(format!("{}:{}", resource, action))
    }

    pub fn can_create(&self, resource: &str) -> bool {
        self.can(resource, PermissionAction::CREATE)
    }

    pub fn can_read(&self, resource: &str) -> bool {
        self.can(resource, PermissionAction::READ)
    }

    pub fn can_update(&self, resource: &str) -> bool {
        self.can(resource, PermissionAction::UPDATE)
    }

    pub fn can_delete(&self, resource: &str) -> bool {
        self.can(resource, PermissionAction::DELETE)
    }

    pub fn can_manage(&self, resource: &str) -> bool {
        self.can(resource, PermissionAction::MANAGE)
    }

    // ---- category queries ----------------------------------------------

    /// Granted permissions whose `category` attribute equals `category`
    pub fn permissions_by_category(&self, category: &str) -> Vec<&Permission> {
        if !self.is_authenticated() {
            return Vec::new();
        }
        self.permissions.permissions().iter().filter(|p| p.category == category).collect()
    }

    pub fn has_any_permission_in_category(&self, category: &str) -> bool {
        !self.permissions_by_category(category).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::GrantedAccess;
    use crate::rbac::{DirectoryGrant, Role, SystemPermission, SystemRole};
    use crate::session::Credentials;
    use chrono::Utc;

    fn authenticated(id: &str) -> Arc<SessionState> {
        Arc::new(SessionState::Authenticated {
            principal: Principal::new(id, format!("{}@school.test", id)),
            credentials: Credentials::new("t"),
            since: Utc::now(),
        })
    }

    fn snapshot(grant: DirectoryGrant) -> Arc<PermissionSnapshot> {
        Arc::new(PermissionSnapshot::with_access(GrantedAccess::from_grant("u1", grant)))
    }

    fn teacher() -> Evaluator {
        Evaluator::new(
            authenticated("u1"),
            snapshot(SystemRole::Teacher.into()),
            Arc::new(AccessTable::school_defaults()),
        )
    }

    fn anonymous() -> Evaluator {
        Evaluator::new(
            Arc::new(SessionState::Unauthenticated),
            snapshot(SystemRole::Admin.into()),
            Arc::new(AccessTable::school_defaults()),
        )
    }

    #[test]
    fn test_unauthenticated_gets_nothing() {
        let ev = anonymous();
        assert!(!ev.has_permission("users:read"));
        assert!(!ev.has_role("admin"));
        assert!(ev.permissions_by_category("users").is_empty());

        let decision = ev.authorize(&Requirement::all_permissions(Vec::<String>::new()));
        assert_eq!(decision.reason, Some(DenyReason::NotAuthenticated));
        assert_eq!(ev.can_access_route("/dashboard").reason, Some(DenyReason::NotAuthenticated));
    }

    #[test]
    fn test_empty_lists_are_satisfied() {
        let ev = teacher();
        assert!(ev.has_any_permission(Vec::<&str>::new()));
        assert!(ev.has_all_permissions(Vec::<&str>::new()));
        assert!(ev.authorize(&Requirement::any_permission(Vec::<&str>::new())).allowed);
        assert!(ev.authorize(&Requirement::any_role(Vec::<&str>::new())).allowed);
    }

    #[test]
    fn test_blank_names_never_match() {
        let ev = teacher();
        assert!(!ev.has_permission(""));
        assert!(!ev.has_role("  "));

        let decision = ev.authorize(&Requirement::any_permission(["grades:read", ""]));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenyReason::InvalidRequirement));
    }

    #[test]
    fn test_all_mode_reports_every_missing_name() {
        let ev = teacher();
        let decision = ev.authorize(&Requirement::all_permissions([
            "grades:read",
            "payments:approve",
            "it:backup:manage",
        ]));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenyReason::MissingPermissions));
        assert_eq!(decision.missing, vec!["payments:approve".to_string(), "it:backup:manage".to_string()]);
    }

    #[test]
    fn test_any_mode() {
        let ev = teacher();
        let allowed = ev.authorize(&Requirement::any_permission(["payments:approve", "grades:read"]));
        assert!(allowed.allowed);
        assert!(allowed.missing.is_empty());

        let denied = ev.authorize(&Requirement::any_permission(["payments:approve", "roles:delete"]));
        assert_eq!(denied.reason, Some(DenyReason::NoneOfRequired));
        assert_eq!(denied.missing.len(), 2);
    }

    #[test]
    fn test_route_and_feature_tables() {
        let ev = teacher();
        assert!(ev.can_access_route("/grades").allowed);
        assert!(ev.can_access_route("/unmapped").allowed);

        let denied = ev.can_access_route("/roles/create");
        assert!(!denied.allowed);
        assert_eq!(denied.missing, vec![SystemPermission::RolesCreate.to_string()]);

        assert!(!ev.can_access_feature("payments.approve").allowed);
    }

    #[test]
    fn test_ownership() {
        let ev = teacher();
        assert!(ev.authorize_with_ownership("users:update", "u1").allowed);

        let denied = ev.authorize_with_ownership("users:update", "u2");
        assert_eq!(denied.reason, Some(DenyReason::NotOwner));
        assert!(!ev.authorize_with_ownership("users:update", "").allowed);
    }

    #[test]
    fn test_ownership_with_blank_permission_is_invalid() {
        let ev = teacher();
        let decision = ev.authorize(&Requirement::owned("", "u1"));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenyReason::InvalidRequirement));
        assert_eq!(decision.missing, vec![String::new()]);

        assert_eq!(ev.authorize_with_ownership(" ", "u1").reason, Some(DenyReason::InvalidRequirement));
    }

    #[test]
    fn test_crud_helpers() {
        let ev = teacher();
        assert!(ev.can_read("students"));
        assert!(ev.can_create("grades"));
        assert!(!ev.can_delete("students"));
        assert!(!ev.can_manage("it:system"));
    }

    #[test]
    fn test_category_queries_use_category_attribute() {
        let role = Role::new("r", "librarian")
            .with_permission(crate::rbac::Permission::new("p1", "books:lend").with_category("library"));
        let ev = Evaluator::new(
            authenticated("u1"),
            snapshot(DirectoryGrant::from(role)),
            Arc::new(AccessTable::empty()),
        );

        assert_eq!(ev.permissions_by_category("library").len(), 1);
        assert!(ev.permissions_by_category("books").is_empty());
        assert!(ev.has_any_permission_in_category("library"));
    }

    #[test]
    fn test_access_requirement_combines_permissions_and_roles() {
        let ev = teacher();
        let ok = Requirement::Access {
            permissions: vec!["grades:read".into()],
            roles: vec!["teacher".into()],
            mode: MatchMode::All,
        };
        assert!(ev.authorize(&ok).allowed);

        let wrong_role = Requirement::Access {
            permissions: vec!["grades:read".into()],
            roles: vec!["admin".into()],
            mode: MatchMode::All,
        };
        let decision = ev.authorize(&wrong_role);
        assert_eq!(decision.reason, Some(DenyReason::MissingRoles));
        assert_eq!(decision.missing, vec!["admin".to_string()]);
    }
}
