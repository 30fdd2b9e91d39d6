//! Authorization requirements and decisions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether every listed item or at least one must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

/// What is being checked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Requirement {
    Permission(String),
    Permissions { names: Vec<String>, mode: MatchMode },
    Role(String),
    Roles { names: Vec<String>, mode: MatchMode },
    Route(String),
    Feature(String),
    /// Allowed by the permission or by owning the resource
    Owned { permission: String, owner_id: String },
    /// Permissions and roles together, both evaluated with the same mode
    Access { permissions: Vec<String>, roles: Vec<String>, mode: MatchMode },
}

impl Requirement {
    pub fn permission(name: impl AsRef<str>) -> Self {
        Requirement::Permission(name.as_ref().to_string())
    }

    pub fn all_permissions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Requirement::Permissions { names: to_strings(names), mode: MatchMode::All }
    }

    pub fn any_permission<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Requirement::Permissions { names: to_strings(names), mode: MatchMode::Any }
    }

    pub fn role(name: impl AsRef<str>) -> Self {
        Requirement::Role(name.as_ref().to_string())
    }

    pub fn any_role<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Requirement::Roles { names: to_strings(names), mode: MatchMode::Any }
    }

    pub fn all_roles<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Requirement::Roles { names: to_strings(names), mode: MatchMode::All }
    }

    pub fn route(key: impl Into<String>) -> Self {
        Requirement::Route(key.into())
    }

    pub fn feature(key: impl Into<String>) -> Self {
        Requirement::Feature(key.into())
    }

    pub fn owned(permission: impl AsRef<str>, owner_id: impl Into<String>) -> Self {
        Requirement::Owned { permission: permission.as_ref().to_string(), owner_id: owner_id.into() }
    }
}

pub(crate) fn to_strings<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().to_string()).collect()
}

/// Why a decision denied access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotAuthenticated,
    MissingPermissions,
    NoneOfRequired,
    MissingRoles,
    NotOwner,
    InvalidRequirement,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "not authenticated",
            DenyReason::MissingPermissions => "missing required permissions",
            DenyReason::NoneOfRequired => "none of the required permissions are present",
            DenyReason::MissingRoles => "missing required roles",
            DenyReason::NotOwner => "neither permitted nor owner",
            DenyReason::InvalidRequirement => "invalid requirement",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a [`Requirement`]
///
/// `missing` carries the names that were required but absent. It is always
/// complete for `All` checks; `Any` checks report it only when denying.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    pub missing: Vec<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Self { allowed: true, reason: None, missing: Vec::new() }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self { allowed: false, reason: Some(reason), missing: Vec::new() }
    }

    pub fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = missing;
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}
