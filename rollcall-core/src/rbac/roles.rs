//! Role definitions for RBAC
//!
//! Roles are owned by the directory service. The client only ever holds a
//! read-only copy, so there are builders but no mutators.

use super::permissions::{Permission, PermissionName, SystemPermission};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Where a role applies
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleScope {
    /// Global role whose permission set is fixed by the system
    System,
    /// Role defined by one school (tenant)
    School { school_id: String },
}

/// A named bundle of permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scope: RoleScope,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Create a system-scoped role with no permissions
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            scope: RoleScope::System,
            permissions: Vec::new(),
        }
    }

    /// Scope the role to a school
    pub fn for_school(mut self, school_id: impl Into<String>) -> Self {
        self.scope = RoleScope::School { school_id: school_id.into() };
        self
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a permission
    pub fn with_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Add several permissions
    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn is_system_role(&self) -> bool {
        self.scope == RoleScope::System
    }

    /// Check if role grants a permission
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p.name.as_str() == name)
    }

    /// Distinct permission names granted by this role
    pub fn permission_names(&self) -> HashSet<&PermissionName> {
        self.permissions.iter().map(|p| &p.name).collect()
    }
}

/// Roles shipped with the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRole {
    SuperAdmin,
    Admin,
    It,
    Principal,
    Teacher,
    Student,
    Parent,
    Accountant,
}

impl SystemRole {
    pub const ALL: &'static [SystemRole] = &[
        SystemRole::SuperAdmin,
        SystemRole::Admin,
        SystemRole::It,
        SystemRole::Principal,
        SystemRole::Teacher,
        SystemRole::Student,
        SystemRole::Parent,
        SystemRole::Accountant,
    ];

    /// Role name as the directory reports it
    pub fn as_str(self) -> &'static str {
        match self {
            SystemRole::SuperAdmin => "super_admin",
            SystemRole::Admin => "admin",
            SystemRole::It => "IT",
            SystemRole::Principal => "principal",
            SystemRole::Teacher => "teacher",
            SystemRole::Student => "student",
            SystemRole::Parent => "parent",
            SystemRole::Accountant => "accountant",
        }
    }

    /// Default permission set of this role
    pub fn default_permissions(self) -> Vec<SystemPermission> {
        use SystemPermission::*;

        match self {
            SystemRole::SuperAdmin => SystemPermission::ALL.to_vec(),
            SystemRole::Admin => vec![
                UsersCreate,
                UsersRead,
                UsersUpdate,
                UsersDelete,
                UsersManage,
                SchoolsRead,
                SchoolsUpdate,
                ClassesCreate,
                ClassesRead,
                ClassesUpdate,
                ClassesDelete,
                ClassesManage,
                StudentsCreate,
                StudentsRead,
                StudentsUpdate,
                StudentsDelete,
                StudentsManage,
                StudentsExport,
                StudentsImport,
                TeachersCreate,
                TeachersRead,
                TeachersUpdate,
                TeachersDelete,
                TeachersManage,
                CoursesCreate,
                CoursesRead,
                CoursesUpdate,
                CoursesDelete,
                CoursesManage,
                GradesRead,
                GradesManage,
                GradesExport,
                GradesApprove,
                AttendanceRead,
                AttendanceManage,
                AttendanceExport,
                ReportsCreate,
                ReportsRead,
                ReportsExport,
                ReportsManage,
                SettingsRead,
                SettingsUpdate,
                SettingsManage,
                RolesCreate,
                RolesRead,
                RolesUpdate,
                RolesDelete,
                RolesManage,
                PaymentsRead,
                PaymentsManage,
                PaymentsExport,
                AnnouncementsCreate,
                AnnouncementsRead,
                AnnouncementsUpdate,
                AnnouncementsDelete,
                AnnouncementsManage,
                CalendarCreate,
                CalendarRead,
                CalendarUpdate,
                CalendarDelete,
                CalendarManage,
                MessagesCreate,
                MessagesRead,
                MessagesDelete,
                MessagesManage,
            ],
            SystemRole::It => vec![
                UsersRead,
                SchoolsRead,
                SettingsRead,
                SettingsUpdate,
                ItLogsRead,
                ItSystemManage,
                ItSupportManage,
                ItBackupManage,
            ],
            SystemRole::Principal => vec![
                UsersRead,
                SchoolsRead,
                SchoolsUpdate,
                ClassesCreate,
                ClassesRead,
                ClassesUpdate,
                ClassesDelete,
                StudentsRead,
                StudentsExport,
                TeachersRead,
                TeachersUpdate,
                CoursesCreate,
                CoursesRead,
                CoursesUpdate,
                CoursesDelete,
                GradesRead,
                GradesExport,
                GradesApprove,
                AttendanceRead,
                AttendanceExport,
                ReportsCreate,
                ReportsRead,
                ReportsExport,
                SettingsRead,
                AnnouncementsCreate,
                AnnouncementsRead,
                AnnouncementsUpdate,
                AnnouncementsDelete,
                CalendarCreate,
                CalendarRead,
                CalendarUpdate,
                CalendarDelete,
                MessagesCreate,
                MessagesRead,
            ],
            SystemRole::Teacher => vec![
                ClassesRead,
                StudentsRead,
                CoursesRead,
                GradesCreate,
                GradesRead,
                GradesUpdate,
                AttendanceCreate,
                AttendanceRead,
                AttendanceUpdate,
                AnnouncementsRead,
                CalendarRead,
                MessagesCreate,
                MessagesRead,
            ],
            SystemRole::Student => vec![
                ClassesRead,
                CoursesRead,
                GradesRead,
                AttendanceRead,
                AnnouncementsRead,
                CalendarRead,
                MessagesCreate,
                MessagesRead,
            ],
            SystemRole::Parent => vec![
                StudentsRead,
                GradesRead,
                AttendanceRead,
                AnnouncementsRead,
                CalendarRead,
                PaymentsRead,
                MessagesCreate,
                MessagesRead,
            ],
            SystemRole::Accountant => vec![
                PaymentsCreate,
                PaymentsRead,
                PaymentsUpdate,
                PaymentsManage,
                PaymentsExport,
                PaymentsApprove,
                ReportsRead,
                ReportsExport,
                StudentsRead,
            ],
        }
    }

    /// Materialize this role as a system-scoped [`Role`]
    pub fn to_role(self) -> Role {
        Role::new(self.as_str(), self.as_str()).with_permissions(self.default_permissions())
    }
}

impl AsRef<str> for SystemRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Returned when parsing a name that is not a [`SystemRole`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown system role: {0}")]
pub struct UnknownSystemRole(pub String);

impl FromStr for SystemRole {
    type Err = UnknownSystemRole;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SystemRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownSystemRole(name.to_string()))
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_role_parsing() {
        assert_eq!("teacher".parse::<SystemRole>(), Ok(SystemRole::Teacher));
        assert_eq!("it".parse::<SystemRole>(), Ok(SystemRole::It));
        assert!("janitor".parse::<SystemRole>().is_err());
    }

    #[test]
    fn test_role_builder() {
        let role = Role::new("r-1", "librarian")
            .for_school("school-9")
            .with_description("Runs the library")
            .with_permission(Permission::new("p-1", "library:lend"));

        assert!(!role.is_system_role());
        assert!(role.has_permission("library:lend"));
        assert!(!role.has_permission("library:burn"));
        assert_eq!(role.scope, RoleScope::School { school_id: "school-9".to_string() });
    }

    #[test]
    fn test_super_admin_holds_everything() {
        let role = SystemRole::SuperAdmin.to_role();
        assert!(role.is_system_role());
        assert_eq!(role.permissions.len(), SystemPermission::ALL.len());
    }

    #[test]
    fn test_teacher_defaults() {
        let role = SystemRole::Teacher.to_role();
        assert!(role.has_permission("grades:update"));
        assert!(!role.has_permission("grades:approve"));
        assert!(!role.has_permission("users:delete"));
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_value(RoleScope::School { school_id: "s1".into() }).unwrap();
        assert_eq!(json["kind"], "school");
        assert_eq!(json["school_id"], "s1");
    }
}
