//! Application access context
//!
//! [`AccessControl`] wires one session, one permission cache and one access
//! table together. It is constructed explicitly and passed (cloned) to every
//! consumer; there is no process-global instance.
//!
//! # Example
//!
//! ```no_run
//! use rollcall_core::access::AccessControl;
//! use rollcall_core::rbac::{Requirement, StaticDirectory};
//! use rollcall_core::session::NoIdentityService;
//!
//! # async fn example() {
//! let directory = StaticDirectory::with_system_roles().assign("u1", "teacher");
//! let access = AccessControl::new(directory, NoIdentityService);
//!
//! let gate = access.watch_requirement(Requirement::route("/grades"), |decision| {
//!     println!("grades page allowed: {}", decision.allowed);
//! });
//! # drop(gate);
//! # }
//! ```


use crate::cache::PermissionCache;
use crate::config::RollcallConfig;
use crate::rbac::{AccessTable, Decision, Evaluator, PermissionDirectory, Requirement};
use crate::reactive::{self, Subscription};
use crate::session::{AuthSession, CredentialStore, IdentityService, MemoryCredentialStore, SessionStatus};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RESTORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared authorization context
#[derive(Clone, Debug)]
pub struct AccessControl {
    session: AuthSession,
    table: Arc<AccessTable>,
    load_timeout: Duration,
    restore_timeout: Duration,
}

impl AccessControl {
    /// Context with the built-in school tables and in-memory credentials
    pub fn new(directory: impl PermissionDirectory + 'static, identity: impl IdentityService + 'static) -> Self {
        Self::builder(Arc::new(directory), Arc::new(identity)).build()
    }

    pub fn builder(
        directory: Arc<dyn PermissionDirectory>,
        identity: Arc<dyn IdentityService>,
    ) -> AccessControlBuilder {
        AccessControlBuilder {
            directory,
            identity,
            credentials: None,
            table: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            restore_timeout: DEFAULT_RESTORE_TIMEOUT,
        }
    }

    /// Context configured from a validated [`RollcallConfig`]
    pub fn from_config(
        config: &RollcallConfig,
        directory: Arc<dyn PermissionDirectory>,
        identity: Arc<dyn IdentityService>,
    ) -> anyhow::Result<Self> {
        config.validate().context("Refusing to build access control from invalid config")?;

        let access = Self::builder(directory, identity)
            .with_access_table(config.access.to_table())
            .with_credential_store(config.sessions.credential_store())
            .with_load_timeout(config.sessions.load_timeout())
            .with_restore_timeout(config.sessions.restore_timeout())
            .build();

        log::info!(
            "Access control configured: {} routes, {} features, credential store {}",
            access.table.routes.len(),
            access.table.features.len(),
            config.sessions.credential_store_path.as_deref().unwrap_or("in memory")
        );
        Ok(access)
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn cache(&self) -> &PermissionCache {
        self.session.cache()
    }

    pub fn table(&self) -> &AccessTable {
        &self.table
    }

    pub fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    /// Evaluator over the current session and permission snapshots
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.session.snapshot(), self.cache().get(), Arc::clone(&self.table))
    }

    pub fn has_permission(&self, name: impl AsRef<str>) -> bool {
        self.evaluator().has_permission(name)
    }

    pub fn has_role(&self, name: impl AsRef<str>) -> bool {
        self.evaluator().has_role(name)
    }

    pub fn authorize(&self, requirement: &Requirement) -> Decision {
        self.evaluator().authorize(requirement)
    }

    /// Restore a persisted session, bounded by the configured restore timeout
    pub async fn restore(&self) -> SessionStatus {
        self.session.restore_with_timeout(self.restore_timeout).await
    }

    /// Reload the active principal's permissions, bounded by the load timeout
    pub async fn reload_permissions(&self) -> Result<(), crate::cache::LoadError> {
        let Some(principal_id) = self.session.snapshot().principal_id().map(str::to_string) else {
            return Ok(());
        };
        self.cache().load_with_timeout(principal_id, self.load_timeout).await
    }

    // ---- reactive ------------------------------------------------------

    /// Recompute `compute` on every session or cache change; see [`reactive::watch`]
    pub fn watch<T, C, F>(&self, compute: C, on_change: F) -> Subscription
    where
        T: PartialEq + Clone + Send + 'static,
        C: Fn(&Evaluator) -> T + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        reactive::watch(self, compute, on_change)
    }

    pub fn watch_requirement<F>(&self, requirement: Requirement, on_change: F) -> Subscription
    where
        F: Fn(&Decision) + Send + Sync + 'static,
    {
        self.watch(move |ev| ev.authorize(&requirement), on_change)
    }

    pub fn watch_permission<F>(&self, name: impl AsRef<str>, on_change: F) -> Subscription
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        let name = name.as_ref().to_string();
        self.watch(move |ev| ev.has_permission(&name), on_change)
    }

    pub fn watch_channel<T, C>(&self, compute: C) -> (Subscription, watch::Receiver<T>)
    where
        T: PartialEq + Clone + Send + Sync + 'static,
        C: Fn(&Evaluator) -> T + Send + Sync + 'static,
    {
        reactive::watch_channel(self, compute)
    }
}

/// Builder for [`AccessControl`]
pub struct AccessControlBuilder {
    directory: Arc<dyn PermissionDirectory>,
    identity: Arc<dyn IdentityService>,
    credentials: Option<Arc<dyn CredentialStore>>,
    table: Option<AccessTable>,
    load_timeout: Duration,
    restore_timeout: Duration,
}

impl AccessControlBuilder {
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn with_access_table(mut self, table: AccessTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_restore_timeout(mut self, timeout: Duration) -> Self {
        self.restore_timeout = timeout;
        self
    }

    pub fn build(self) -> AccessControl {
        let cache = PermissionCache::with_directory(self.directory);
        let credentials = self.credentials.unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let session = AuthSession::new(cache, self.identity, credentials);
        AccessControl {
            session,
            table: Arc::new(self.table.unwrap_or_else(AccessTable::school_defaults)),
            load_timeout: self.load_timeout,
            restore_timeout: self.restore_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::SystemRole;
    use crate::session::{Credentials, Principal};
    use crate::testing::{ScriptedDirectory, ScriptedIdentity};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_from_config_applies_table_overrides() {
        let mut config = RollcallConfig::default();
        config.access.routes.insert("/grades".into(), vec!["grades:approve".into()]);

        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Teacher);
        let access =
            AccessControl::from_config(&config, Arc::new(directory), Arc::new(ScriptedIdentity::new())).unwrap();
        access
            .session()
            .complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();

        assert!(!access.authorize(&Requirement::route("/grades")).allowed);
        assert!(access.authorize(&Requirement::route("/classes")).allowed);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = RollcallConfig::default();
        config.sessions.load_timeout_ms = 0;
        let result = AccessControl::from_config(
            &config,
            Arc::new(ScriptedDirectory::new()),
            Arc::new(ScriptedIdentity::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_watch_requirement_follows_principal() {
        let directory = ScriptedDirectory::new()
            .with_grant("t", SystemRole::Teacher)
            .with_grant("a", SystemRole::Accountant);
        let access = AccessControl::new(directory, ScriptedIdentity::new());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = access.watch_requirement(Requirement::feature("payments.approve"), move |d| {
            sink.lock().unwrap().push(d.allowed)
        });

        let session = access.session();
        session.complete_authentication(Principal::new("t", "t@school.test"), Credentials::new("1")).run().await.unwrap();
        session.complete_authentication(Principal::new("a", "a@school.test"), Credentials::new("2")).run().await.unwrap();

        // not authenticated, missing payments:approve, granted
        assert_eq!(*seen.lock().unwrap(), vec![false, false, true]);
    }

    #[tokio::test]
    async fn test_reload_permissions_picks_up_directory_changes() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Student);
        let access = AccessControl::new(directory.clone(), ScriptedIdentity::new());
        access
            .session()
            .complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();
        assert!(!access.has_permission("grades:create"));

        directory.set_grant("u1", SystemRole::Teacher);
        access.reload_permissions().await.unwrap();
        assert!(access.has_permission("grades:create"));
        assert!(access.has_role("teacher"));
    }
}
