//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use rollcall_core::prelude::*;
//! ```

pub use std::sync::Arc;

// === Context ===
pub use crate::access::{AccessControl, AccessControlBuilder};
pub use crate::guard::{GuardOutcome, NavigationGuard};

// === Configuration ===
pub use crate::config::RollcallConfig;
pub use crate::logging::{init_logging, LoggingConfig};

// === Authorization ===
pub use crate::rbac::{
    AccessTable, Decision, DenyReason, DirectoryGrant, Evaluator, MatchMode, Permission,
    PermissionDirectory, PermissionName, Requirement, Role, StaticDirectory, SystemPermission,
    SystemRole,
};

// === Sessions ===
pub use crate::session::{
    AuthSession, Credentials, IdentityService, LoginOutcome, NoIdentityService, Principal,
    SessionStatus,
};

// === Reactive and view gating ===
pub use crate::gate::{GateMode, GateOptions, ViewElement, ViewGate};
pub use crate::reactive::Subscription;
