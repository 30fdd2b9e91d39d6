//! Permission vocabulary
//!
//! Permissions are opaque string keys following a `category:action` convention
//! (`students:export`, `it:logs:read`). The server may define permissions the
//! client has never heard of, so [`PermissionName`] accepts any string while
//! [`SystemPermission`] enumerates the ones the application ships with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission categories known to the application
pub struct PermissionCategory;

impl PermissionCategory {
    pub const USERS: &'static str = "users";
    pub const SCHOOLS: &'static str = "schools";
    pub const CLASSES: &'static str = "classes";
    pub const STUDENTS: &'static str = "students";
    pub const TEACHERS: &'static str = "teachers";
    pub const COURSES: &'static str = "courses";
    pub const GRADES: &'static str = "grades";
    pub const ATTENDANCE: &'static str = "attendance";
    pub const REPORTS: &'static str = "reports";
    pub const SETTINGS: &'static str = "settings";
    pub const ROLES: &'static str = "roles";
    pub const PAYMENTS: &'static str = "payments";
    pub const ANNOUNCEMENTS: &'static str = "announcements";
    pub const CALENDAR: &'static str = "calendar";
    pub const MESSAGES: &'static str = "messages";
    pub const IT: &'static str = "it";
}

/// Permission actions used by the CRUD helpers
pub struct PermissionAction;

impl PermissionAction {
    pub const CREATE: &'static str = "create";
    pub const READ: &'static str = "read";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const MANAGE: &'static str = "manage";
    pub const EXPORT: &'static str = "export";
    pub const IMPORT: &'static str = "import";
    pub const APPROVE: &'static str = "approve";
}

/// Error returned by [`PermissionName::new`] for a malformed segment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission segment {segment:?}: expected non-empty [a-z0-9_]")]
pub struct InvalidPermissionName {
    pub segment: String,
}

/// A permission name
///
/// Equality is plain string equality. Only [`category`](Self::category) and
/// [`action`](Self::action) look inside the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(String);

impl PermissionName {
    /// Build a `category:action` name, validating both segments
    pub fn new(category: &str, action: &str) -> Result<Self, InvalidPermissionName> {
        for segment in [category, action] {
            if !is_valid_segment(segment) {
                return Err(InvalidPermissionName { segment: segment.to_string() });
            }
        }
        Ok(Self(format!("{}:{}", category, action)))
    }

    /// Wrap any server-defined name without validation
    pub fn parse(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the first `:` (the whole name when there is none)
    pub fn category(&self) -> &str {
        category_of(&self.0)
    }

    /// Text after the last `:`, if the name has one
    pub fn action(&self) -> Option<&str> {
        self.0.rsplit_once(':').map(|(_, action)| action)
    }

    /// Whether every `:`-separated segment is non-empty `[a-z0-9_]` and there are at least two
    pub fn is_well_formed(&self) -> bool {
        let mut count = 0;
        for segment in self.0.split(':') {
            if !is_valid_segment(segment) {
                return false;
            }
            count += 1;
        }
        count >= 2
    }
}

/// Category of a raw permission name
pub fn category_of(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl AsRef<str> for PermissionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PermissionName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for PermissionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A permission record as returned by the directory
///
/// Only `name` takes part in decisions; `category` feeds category queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub name: PermissionName,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
}

impl Permission {
    /// Create a permission whose category is derived from its name
    pub fn new(id: impl Into<String>, name: impl Into<PermissionName>) -> Self {
        let name = name.into();
        let category = name.category().to_string();
        Self { id: id.into(), name, description: None, category }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the category attribute
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

impl From<SystemPermission> for Permission {
    fn from(permission: SystemPermission) -> Self {
        Permission::new(permission.as_str(), permission)
    }
}

macro_rules! system_permissions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Permissions shipped with the application
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum SystemPermission {
            $($variant),+
        }

        impl SystemPermission {
            /// Every system permission, in declaration order
            pub const ALL: &'static [SystemPermission] = &[$(SystemPermission::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(SystemPermission::$variant => $name),+
                }
            }
        }

        impl FromStr for SystemPermission {
            type Err = UnknownSystemPermission;

            fn from_str(name: &str) -> Result<Self, Self::Err> {
                match name {
                    $($name => Ok(SystemPermission::$variant),)+
                    other => Err(UnknownSystemPermission(other.to_string())),
                }
            }
        }
    };
}

system_permissions! {
    UsersCreate => "users:create",
    UsersRead => "users:read",
    UsersUpdate => "users:update",
    UsersDelete => "users:delete",
    UsersManage => "users:manage",

    SchoolsCreate => "schools:create",
    SchoolsRead => "schools:read",
    SchoolsUpdate => "schools:update",
    SchoolsDelete => "schools:delete",
    SchoolsManage => "schools:manage",

    ClassesCreate => "classes:create",
    ClassesRead => "classes:read",
    ClassesUpdate => "classes:update",
    ClassesDelete => "classes:delete",
    ClassesManage => "classes:manage",

    StudentsCreate => "students:create",
    StudentsRead => "students:read",
    StudentsUpdate => "students:update",
    StudentsDelete => "students:delete",
    StudentsManage => "students:manage",
    StudentsExport => "students:export",
    StudentsImport => "students:import",

    TeachersCreate => "teachers:create",
    TeachersRead => "teachers:read",
    TeachersUpdate => "teachers:update",
    TeachersDelete => "teachers:delete",
    TeachersManage => "teachers:manage",

    CoursesCreate => "courses:create",
    CoursesRead => "courses:read",
    CoursesUpdate => "courses:update",
    CoursesDelete => "courses:delete",
    CoursesManage => "courses:manage",

    GradesCreate => "grades:create",
    GradesRead => "grades:read",
    GradesUpdate => "grades:update",
    GradesDelete => "grades:delete",
    GradesManage => "grades:manage",
    GradesExport => "grades:export",
    GradesApprove => "grades:approve",

    AttendanceCreate => "attendance:create",
    AttendanceRead => "attendance:read",
    AttendanceUpdate => "attendance:update",
    AttendanceDelete => "attendance:delete",
    AttendanceManage => "attendance:manage",
    AttendanceExport => "attendance:export",

    ReportsCreate => "reports:create",
    ReportsRead => "reports:read",
    ReportsExport => "reports:export",
    ReportsManage => "reports:manage",

    SettingsRead => "settings:read",
    SettingsUpdate => "settings:update",
    SettingsManage => "settings:manage",

    RolesCreate => "roles:create",
    RolesRead => "roles:read",
    RolesUpdate => "roles:update",
    RolesDelete => "roles:delete",
    RolesManage => "roles:manage",

    PaymentsCreate => "payments:create",
    PaymentsRead => "payments:read",
    PaymentsUpdate => "payments:update",
    PaymentsDelete => "payments:delete",
    PaymentsManage => "payments:manage",
    PaymentsExport => "payments:export",
    PaymentsApprove => "payments:approve",

    AnnouncementsCreate => "announcements:create",
    AnnouncementsRead => "announcements:read",
    AnnouncementsUpdate => "announcements:update",
    AnnouncementsDelete => "announcements:delete",
    AnnouncementsManage => "announcements:manage",

    CalendarCreate => "calendar:create",
    CalendarRead => "calendar:read",
    CalendarUpdate => "calendar:update",
    CalendarDelete => "calendar:delete",
    CalendarManage => "calendar:manage",

    MessagesCreate => "messages:create",
    MessagesRead => "messages:read",
    MessagesDelete => "messages:delete",
    MessagesManage => "messages:manage",

    ItLogsRead => "it:logs:read",
    ItSystemManage => "it:system:manage",
    ItSupportManage => "it:support:manage",
    ItBackupManage => "it:backup:manage",
}

/// Returned when parsing a name that is not a [`SystemPermission`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown system permission: {0}")]
pub struct UnknownSystemPermission(pub String);

impl AsRef<str> for SystemPermission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SystemPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SystemPermission> for PermissionName {
    fn from(permission: SystemPermission) -> Self {
        PermissionName(permission.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_constructor() {
        let name = PermissionName::new("students", "export").unwrap();
        assert_eq!(name.as_str(), "students:export");
        assert_eq!(name.category(), "students");
        assert_eq!(name.action(), Some("export"));

        assert!(PermissionName::new("", "read").is_err());
        assert!(PermissionName::new("Students", "read").is_err());
        assert!(PermissionName::new("students", "re:ad").is_err());
    }

    #[test]
    fn test_free_form_names() {
        let name = PermissionName::parse("it:logs:read");
        assert_eq!(name.category(), "it");
        assert_eq!(name.action(), Some("read"));
        assert!(name.is_well_formed());

        let odd = PermissionName::parse("LegacyAdminFlag");
        assert_eq!(odd.category(), "LegacyAdminFlag");
        assert_eq!(odd.action(), None);
        assert!(!odd.is_well_formed());
    }

    #[test]
    fn test_system_permission_round_trip_through_str() {
        for permission in SystemPermission::ALL {
            let parsed: SystemPermission = permission.as_str().parse().unwrap();
            assert_eq!(parsed, *permission);
            assert!(PermissionName::from(*permission).is_well_formed());
        }
        assert!("students:teleport".parse::<SystemPermission>().is_err());
    }

    #[test]
    fn test_permission_record_category_from_name() {
        let permission = Permission::from(SystemPermission::GradesApprove);
        assert_eq!(permission.category, "grades");
        assert_eq!(permission.name.as_str(), "grades:approve");

        let custom = Permission::new("p-1", "library:lend").with_category("library-custom");
        assert_eq!(custom.category, "library-custom");
    }

    #[test]
    fn test_serde_is_transparent() {
        let name = PermissionName::parse("users:read");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"users:read\"");
    }
}
