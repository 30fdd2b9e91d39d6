//! Rollcall RBAC (Role-Based Access Control) Module
//!
//! The authorization vocabulary and the pure decision logic:
//! - [`Permission`], [`Role`] and the built-in [`SystemPermission`] / [`SystemRole`] sets
//! - [`Requirement`] and [`Decision`], the question and the answer
//! - [`AccessTable`], the static route and feature table
//! - [`PermissionDirectory`], the collaborator that knows who holds what
//! - [`Evaluator`], which answers requirements against one session and one
//!   permission snapshot
//!
//! # Example
//! ```rust,ignore
//! let ev = access.evaluator();
//! if ev.can_access_route("/students").allowed {
//!     // render the page
//! }
//! let decision = ev.authorize(&Requirement::any_permission([
//!     SystemPermission::GradesApprove,
//!     SystemPermission::GradesUpdate,
//! ]));
//! ```

mod directory;
mod evaluator;
mod permissions;
mod requirement;
mod roles;
mod table;

pub use directory::{DirectoryError, DirectoryGrant, PermissionDirectory, StaticDirectory};
pub use evaluator::Evaluator;
pub use permissions::{
    category_of, InvalidPermissionName, Permission, PermissionAction, PermissionCategory, PermissionName,
    SystemPermission, UnknownSystemPermission,
};
pub use requirement::{Decision, DenyReason, MatchMode, Requirement};
pub use roles::{Role, RoleScope, SystemRole, UnknownSystemRole};
pub use table::AccessTable;
