//! Rollcall - Core
//!
//! Role and permission based access control for multi-tenant school
//! management applications.
//!
//! # Overview
//!
//! Rollcall keeps an in-memory model of the signed-in principal's roles and
//! permissions and derives access decisions from it: single permissions,
//! any-of and all-of lists, roles, route and feature keys, and ownership
//! qualified checks. Decisions stay consistent while sessions move through
//! login, MFA, refresh and logout, and while permission sets reload in the
//! background. A principal whose permissions are still loading holds none.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rollcall_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RollcallConfig::load()?;
//!     init_logging(&config.logging.to_logging_config()?)?;
//!
//!     let directory = StaticDirectory::with_system_roles().assign("u1", "teacher");
//!     let access = AccessControl::from_config(&config, Arc::new(directory), Arc::new(NoIdentityService))?;
//!
//!     access.restore().await;
//!     let guard = NavigationGuard::new(access.clone());
//!     println!("/grades -> {:?}", guard.guard_route("/grades"));
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`rbac`] - Permission vocabulary, roles, requirements and the evaluator
//! - [`cache`] - Permission set cache with epoch-guarded loads
//! - [`session`] - Session state machine and identity/credential collaborators
//! - [`reactive`] - Change subjects and value-suppressing subscriptions
//! - [`gate`] - View gating (hide, disable, remove) with restore on release
//! - [`guard`] - Navigation guards
//! - [`access`] - `AccessControl`, the context tying the above together
//! - [`config`] / [`logging`] - TOML + environment configuration and logging

pub mod access;
pub mod cache;
pub mod config; // Configuration system with TOML support
pub mod gate;
pub mod guard;
pub mod logging; // Declarative logging with standard log crate integration
pub mod rbac; // Role-Based Access Control
pub mod reactive;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Prelude module for convenient imports
pub mod prelude;

pub use access::AccessControl;
pub use rbac::{Decision, DenyReason, Evaluator, MatchMode, Requirement};
pub use session::{AuthSession, SessionState, SessionStatus};
