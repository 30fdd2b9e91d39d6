//! Authentication session for Rollcall
//!
//! This module tracks who is signed in and keeps the permission cache tied
//! to that identity:
//! - A three-state machine: unauthenticated, MFA pending, authenticated
//! - Login, MFA verification, refresh and sign-out flows over an [`IdentityService`]
//! - Credential persistence through a [`CredentialStore`] for session restore
//!
//! # Example
//!
//! ```no_run
//! use rollcall_core::cache::PermissionCache;
//! use rollcall_core::rbac::StaticDirectory;
//! use rollcall_core::session::{AuthSession, Credentials, MemoryCredentialStore, NoIdentityService, Principal};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let cache = PermissionCache::new(StaticDirectory::with_system_roles().assign("u1", "teacher"));
//! let session = AuthSession::new(cache, Arc::new(NoIdentityService), Arc::new(MemoryCredentialStore::new()));
//!
//! let load = session.complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("token"));
//! load.run().await.ok();
//! # }
//! ```

mod credentials;
mod identity;
mod manager;
mod state;

pub use credentials::{
    CredentialStore, CredentialStoreError, CredentialStoreResult, FileCredentialStore, MemoryCredentialStore,
};
pub use identity::{AuthGrant, IdentityError, IdentityService, LoginOutcome, NoIdentityService};
pub use manager::AuthSession;
pub use state::{Credentials, Principal, SessionEvent, SessionState, SessionStatus, Token};
