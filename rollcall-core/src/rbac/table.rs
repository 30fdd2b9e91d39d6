//! Static route and feature permission table
//!
//! Maps a route key (`/students`) or feature key (`students.export`) to the
//! permissions it needs. Loaded once at boot and read-only afterwards. A key
//! missing from the table needs no permission.

use super::permissions::{PermissionName, SystemPermission};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessTable {
    #[serde(default)]
    pub routes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub features: HashMap<String, Vec<String>>,
}

impl AccessTable {
    /// An empty table: every key is open to any authenticated principal
    pub fn empty() -> Self {
        Self::default()
    }

    /// The application's built-in school tables
    pub fn school_defaults() -> Self {
        let routes = default_routes()
            .iter()
            .map(|(key, perms)| (key.to_string(), names(perms)))
            .collect();
        let features = default_features()
            .iter()
            .map(|(key, perms)| (key.to_string(), names(perms)))
            .collect();
        Self { routes, features }
    }

    /// Add or replace a route entry
    pub fn with_route<I, S>(mut self, key: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.routes.insert(key.into(), super::requirement::to_strings(permissions));
        self
    }

    /// Add or replace a feature entry
    pub fn with_feature<I, S>(mut self, key: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.features.insert(key.into(), super::requirement::to_strings(permissions));
        self
    }

    /// Overlay `other` on this table, entry by entry
    pub fn merge(&mut self, other: AccessTable) {
        self.routes.extend(other.routes);
        self.features.extend(other.features);
    }

    /// Permissions required for a route; empty when the key is unmapped
    pub fn route_permissions(&self, key: &str) -> &[String] {
        self.routes.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Permissions required for a feature; empty when the key is unmapped
    pub fn feature_permissions(&self, key: &str) -> &[String] {
        self.features.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries whose names do not follow `category:action`, as `(key, name)`
    pub fn malformed_entries(&self) -> Vec<(String, String)> {
        let mut found: Vec<(String, String)> = self
            .routes
            .iter()
            .chain(self.features.iter())
            .flat_map(|(key, perms)| {
                perms
                    .iter()
                    .filter(|p| !PermissionName::parse(p.as_str()).is_well_formed())
                    .map(move |p| (key.clone(), p.clone()))
            })
            .collect();
        found.sort();
        found
    }
}

fn names(permissions: &[SystemPermission]) -> Vec<String> {
    permissions.iter().map(|p| p.as_str().to_string()).collect()
}

fn default_routes() -> Vec<(&'static str, Vec<SystemPermission>)> {
    use SystemPermission::*;

    vec![
        ("/dashboard", vec![]),
        ("/users", vec![UsersRead]),
        ("/users/create", vec![UsersCreate]),
        ("/schools", vec![SchoolsRead]),
        ("/schools/create", vec![SchoolsCreate]),
        ("/classes", vec![ClassesRead]),
        ("/classes/create", vec![ClassesCreate]),
        ("/students", vec![StudentsRead]),
        ("/students/create", vec![StudentsCreate]),
        ("/teachers", vec![TeachersRead]),
        ("/teachers/create", vec![TeachersCreate]),
        ("/courses", vec![CoursesRead]),
        ("/courses/create", vec![CoursesCreate]),
        ("/grades", vec![GradesRead]),
        ("/attendance", vec![AttendanceRead]),
        ("/reports", vec![ReportsRead]),
        ("/settings", vec![SettingsRead]),
        ("/roles", vec![RolesRead]),
        ("/roles/create", vec![RolesCreate]),
        ("/payments", vec![PaymentsRead]),
        ("/announcements", vec![AnnouncementsRead]),
        ("/calendar", vec![CalendarRead]),
        ("/messages", vec![MessagesRead]),
        ("/it", vec![ItLogsRead]),
        ("/it/system", vec![ItSystemManage]),
        ("/it/backup", vec![ItBackupManage]),
    ]
}

fn default_features() -> Vec<(&'static str, Vec<SystemPermission>)> {
    use SystemPermission::*;

    vec![
        ("dashboard", vec![]),
        ("users.list", vec![UsersRead]),
        ("users.create", vec![UsersCreate]),
        ("users.edit", vec![UsersUpdate]),
        ("users.delete", vec![UsersDelete]),
        ("schools.list", vec![SchoolsRead]),
        ("schools.create", vec![SchoolsCreate]),
        ("schools.edit", vec![SchoolsUpdate]),
        ("schools.delete", vec![SchoolsDelete]),
        ("classes.list", vec![ClassesRead]),
        ("classes.create", vec![ClassesCreate]),
        ("classes.edit", vec![ClassesUpdate]),
        ("classes.delete", vec![ClassesDelete]),
        ("students.list", vec![StudentsRead]),
        ("students.create", vec![StudentsCreate]),
        ("students.edit", vec![StudentsUpdate]),
        ("students.delete", vec![StudentsDelete]),
        ("students.export", vec![StudentsExport]),
        ("students.import", vec![StudentsImport]),
        ("teachers.list", vec![TeachersRead]),
        ("teachers.create", vec![TeachersCreate]),
        ("teachers.edit", vec![TeachersUpdate]),
        ("teachers.delete", vec![TeachersDelete]),
        ("courses.list", vec![CoursesRead]),
        ("courses.create", vec![CoursesCreate]),
        ("courses.edit", vec![CoursesUpdate]),
        ("courses.delete", vec![CoursesDelete]),
        ("grades.list", vec![GradesRead]),
        ("grades.create", vec![GradesCreate]),
        ("grades.edit", vec![GradesUpdate]),
        ("grades.delete", vec![GradesDelete]),
        ("grades.export", vec![GradesExport]),
        ("grades.approve", vec![GradesApprove]),
        ("attendance.list", vec![AttendanceRead]),
        ("attendance.create", vec![AttendanceCreate]),
        ("attendance.edit", vec![AttendanceUpdate]),
        ("attendance.export", vec![AttendanceExport]),
        ("reports.list", vec![ReportsRead]),
        ("reports.create", vec![ReportsCreate]),
        ("reports.export", vec![ReportsExport]),
        ("settings.view", vec![SettingsRead]),
        ("settings.edit", vec![SettingsUpdate]),
        ("roles.list", vec![RolesRead]),
        ("roles.create", vec![RolesCreate]),
        ("roles.edit", vec![RolesUpdate]),
        ("roles.delete", vec![RolesDelete]),
        ("payments.list", vec![PaymentsRead]),
        ("payments.create", vec![PaymentsCreate]),
        ("payments.edit", vec![PaymentsUpdate]),
        ("payments.delete", vec![PaymentsDelete]),
        ("payments.export", vec![PaymentsExport]),
        ("payments.approve", vec![PaymentsApprove]),
        ("announcements.list", vec![AnnouncementsRead]),
        ("announcements.create", vec![AnnouncementsCreate]),
        ("announcements.edit", vec![AnnouncementsUpdate]),
        ("announcements.delete", vec![AnnouncementsDelete]),
        ("calendar.view", vec![CalendarRead]),
        ("calendar.create", vec![CalendarCreate]),
        ("calendar.edit", vec![CalendarUpdate]),
        ("calendar.delete", vec![CalendarDelete]),
        ("messages.list", vec![MessagesRead]),
        ("messages.create", vec![MessagesCreate]),
        ("messages.delete", vec![MessagesDelete]),
        ("it.logs", vec![ItLogsRead]),
        ("it.system", vec![ItSystemManage]),
        ("it.support", vec![ItSupportManage]),
        ("it.backup", vec![ItBackupManage]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_keys_need_nothing() {
        let table = AccessTable::school_defaults();
        assert!(table.route_permissions("/nowhere").is_empty());
        assert!(table.feature_permissions("no.such.feature").is_empty());
        assert!(table.route_permissions("/dashboard").is_empty());
    }

    #[test]
    fn test_school_defaults() {
        let table = AccessTable::school_defaults();
        assert_eq!(table.route_permissions("/users"), ["users:read".to_string()]);
        assert_eq!(table.feature_permissions("students.export"), ["students:export".to_string()]);
        assert!(table.malformed_entries().is_empty());
    }

    #[test]
    fn test_merge_overrides_entries() {
        let mut table = AccessTable::school_defaults();
        table.merge(
            AccessTable::empty()
                .with_route("/users", ["users:manage"])
                .with_feature("library.lend", ["library:lend"]),
        );

        assert_eq!(table.route_permissions("/users"), ["users:manage".to_string()]);
        assert_eq!(table.feature_permissions("library.lend"), ["library:lend".to_string()]);
        assert_eq!(table.route_permissions("/students"), ["students:read".to_string()]);
    }

    #[test]
    fn test_malformed_entries() {
        let table = AccessTable::empty().with_route("/legacy", ["AdminOnly", "users:read"]);
        assert_eq!(table.malformed_entries(), vec![("/legacy".to_string(), "AdminOnly".to_string())]);
    }
}
