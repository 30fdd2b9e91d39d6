//! Authentication session
//!
//! Owns the `Unauthenticated -> MfaPending -> Authenticated` state machine and
//! keeps the permission cache in step with it: every principal switch and
//! every logout resets the cache before anything else can observe the new
//! state.

use super::credentials::CredentialStore;
use super::identity::{AuthGrant, IdentityError, IdentityService, LoginOutcome};
use super::state::{Credentials, Principal, SessionEvent, SessionState, SessionStatus, Token};
use crate::cache::{PendingLoad, PermissionCache};
use crate::rbac::DirectoryGrant;
use crate::reactive::{ListenerId, Subject};
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Shared handle to the authentication session
#[derive(Clone)]
pub struct AuthSession {
    state: Arc<RwLock<Arc<SessionState>>>,
    events: Subject<SessionEvent>,
    cache: PermissionCache,
    identity: Arc<dyn IdentityService>,
    credentials: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession").field("state", &self.snapshot()).finish()
    }
}

impl AuthSession {
    pub fn new(
        cache: PermissionCache,
        identity: Arc<dyn IdentityService>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(Arc::new(SessionState::Unauthenticated))),
            events: Subject::new(),
            cache,
            identity,
            credentials,
        }
    }

    /// Current state
    pub fn snapshot(&self) -> Arc<SessionState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.snapshot().principal().cloned()
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    pub fn events(&self) -> &Subject<SessionEvent> {
        &self.events
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---- state machine primitives --------------------------------------

    /// `Unauthenticated -> MfaPending`. No-op from any other state, and for a
    /// blank challenge token.
    pub fn begin_mfa_challenge(&self, challenge_token: impl Into<Token>) -> bool {
        let challenge_token = challenge_token.into();
        if challenge_token.is_blank() {
            log::warn!("Ignoring MFA challenge with a blank token");
            return false;
        }
        let started = self.transition(|current| match current {
            SessionState::Unauthenticated => Some(SessionState::MfaPending { challenge_token }),
            _ => None,
        });
        if started {
            log::debug!("MFA challenge started");
            self.events.emit(&SessionEvent::MfaChallengeStarted);
        } else {
            log::debug!("Ignoring MFA challenge outside of an unauthenticated session");
        }
        started
    }

    /// `MfaPending -> Unauthenticated`. No-op from any other state.
    pub fn cancel_mfa(&self) -> bool {
        let cancelled = self.transition(|current| match current {
            SessionState::MfaPending { .. } => Some(SessionState::Unauthenticated),
            _ => None,
        });
        if cancelled {
            self.events.emit(&SessionEvent::MfaCancelled);
        }
        cancelled
    }

    /// Enter `Authenticated` and start loading the principal's permissions
    ///
    /// The cache is reset synchronously, before the state changes, so no
    /// reader ever sees the new principal with the previous principal's
    /// permissions. The returned load must be run to populate the cache.
    pub fn complete_authentication(&self, principal: Principal, credentials: Credentials) -> PendingLoad {
        let principal_id = principal.id.clone();
        self.cache.reset();
        self.enter_authenticated(principal, credentials);
        let pending = self.cache.begin_load(principal_id.clone());
        self.events.emit(&SessionEvent::Authenticated { principal_id });
        pending
    }

    /// Enter `Authenticated` with a grant the identity service already returned
    pub fn complete_authentication_with_grant(
        &self,
        principal: Principal,
        credentials: Credentials,
        grant: DirectoryGrant,
    ) {
        let principal_id = principal.id.clone();
        self.cache.reset();
        self.enter_authenticated(principal, credentials);
        self.cache.prime(principal_id.clone(), grant);
        self.events.emit(&SessionEvent::Authenticated { principal_id });
    }

    /// Drop the session, the cache and the persisted credentials
    ///
    /// Synchronous and idempotent.
    pub fn logout(&self) {
        let previous = self.replace_state(SessionState::Unauthenticated);
        self.cache.reset();
        if let Err(e) = self.credentials.clear() {
            log::warn!("Failed to clear persisted credentials: {}", e);
        }

        if previous.status() != SessionStatus::Unauthenticated {
            if let Some(principal_id) = previous.principal_id() {
                log::info!("Principal {} logged out", principal_id);
            }
            self.events.emit(&SessionEvent::LoggedOut);
        }
    }

    // ---- flows ---------------------------------------------------------

    /// Authenticate with email and password
    ///
    /// Returns the resulting status: `Authenticated`, or `MfaPending` when
    /// the identity service asks for a second factor.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionStatus, IdentityError> {
        self.cancel_mfa();
        match self.identity.login(email, password).await? {
            LoginOutcome::MfaRequired { challenge_token } => {
                self.begin_mfa_challenge(challenge_token);
                Ok(self.status())
            }
            LoginOutcome::Authenticated(grant) => {
                self.apply_grant(grant).await;
                Ok(SessionStatus::Authenticated)
            }
        }
    }

    /// Answer the pending MFA challenge with a one-time code
    pub async fn verify_mfa(&self, code: &str) -> Result<(), IdentityError> {
        let challenge = self.pending_challenge()?;
        let grant = self.identity.verify_mfa(&challenge, code).await?;
        self.finish_challenge(&challenge, grant).await
    }

    /// Answer the pending MFA challenge with a recovery code
    pub async fn verify_recovery_code(&self, recovery_code: &str) -> Result<(), IdentityError> {
        let challenge = self.pending_challenge()?;
        let grant = self.identity.verify_recovery_code(&challenge, recovery_code).await?;
        self.finish_challenge(&challenge, grant).await
    }

    /// Renew the credentials of the authenticated principal
    ///
    /// A refresh failure ends the session.
    pub async fn refresh(&self) -> Result<(), IdentityError> {
        let current = self.snapshot();
        let (Some(principal_id), Some(credentials)) = (current.principal_id(), current.credentials()) else {
            return Err(IdentityError::NotAuthenticated);
        };

        let grant = match self.identity.refresh(credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                log::warn!("Credential refresh failed for principal {}: {}", principal_id, e);
                if self.snapshot().principal_id() == Some(principal_id) {
                    self.logout();
                }
                return Err(e);
            }
        };

        if self.snapshot().principal_id() != Some(principal_id) {
            log::debug!("Session changed during refresh, dropping result");
            return Err(IdentityError::NotAuthenticated);
        }

        if grant.principal.id != principal_id {
            self.apply_grant(grant).await;
            return Ok(());
        }

        let AuthGrant { principal, credentials, access } = grant;
        self.enter_authenticated(principal, credentials);
        if let Some(access) = access {
            self.cache.prime(principal_id, access);
        }
        self.events.emit(&SessionEvent::CredentialsRefreshed { principal_id: principal_id.to_string() });
        Ok(())
    }

    /// Log out locally, then revoke the credentials server-side
    pub async fn sign_out(&self) {
        let credentials = self.snapshot().credentials().cloned();
        self.logout();
        if let Some(credentials) = credentials {
            if let Err(e) = self.identity.revoke(&credentials).await {
                log::warn!("Credential revocation failed: {}", e);
            }
        }
    }

    /// Re-establish a session from persisted credentials
    ///
    /// Returns the resulting status. Unusable or rejected credentials are
    /// cleared and leave the session unauthenticated.
    pub async fn restore_from_persisted_credentials(&self) -> SessionStatus {
        if self.is_authenticated() {
            return SessionStatus::Authenticated;
        }

        let stored = match self.credentials.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => return self.status(),
            Err(e) => {
                log::warn!("Failed to read persisted credentials: {}", e);
                self.discard_persisted();
                return self.status();
            }
        };

        if !stored.can_refresh() {
            log::debug!("Persisted credentials incomplete, discarding");
            self.discard_persisted();
            return self.status();
        }
        if stored.is_expired() {
            log::info!("Persisted credentials expired, discarding");
            self.discard_persisted();
            return self.status();
        }

        match self.identity.refresh(&stored).await {
            Ok(grant) => {
                self.apply_grant(grant).await;
                self.status()
            }
            Err(e) => {
                log::info!("Persisted credentials rejected: {}", e);
                self.discard_persisted();
                self.status()
            }
        }
    }

    /// [`restore_from_persisted_credentials`](Self::restore_from_persisted_credentials)
    /// bounded by `timeout`
    pub async fn restore_with_timeout(&self, timeout: Duration) -> SessionStatus {
        match tokio::time::timeout(timeout, self.restore_from_persisted_credentials()).await {
            Ok(status) => status,
            Err(_) => {
                log::warn!("Session restore timed out after {:?}", timeout);
                self.status()
            }
        }
    }

    // ---- internals -----------------------------------------------------

    async fn apply_grant(&self, grant: AuthGrant) {
        let AuthGrant { principal, credentials, access } = grant;
        match access {
            Some(access) => self.complete_authentication_with_grant(principal, credentials, access),
            None => {
                if let Err(e) = self.complete_authentication(principal, credentials).run().await {
                    log::warn!("Permission load after authentication failed: {}", e);
                }
            }
        }
    }

    async fn finish_challenge(&self, challenge: &Token, grant: AuthGrant) -> Result<(), IdentityError> {
        if self.snapshot().challenge_token() != Some(challenge) {
            log::debug!("MFA challenge superseded during verification");
            return Err(IdentityError::NoMfaChallenge);
        }
        self.apply_grant(grant).await;
        Ok(())
    }

    fn pending_challenge(&self) -> Result<Token, IdentityError> {
        self.snapshot().challenge_token().cloned().ok_or(IdentityError::NoMfaChallenge)
    }

    fn enter_authenticated(&self, principal: Principal, credentials: Credentials) {
        if let Err(e) = self.credentials.save(&credentials) {
            log::warn!("Failed to persist credentials: {}", e);
        }
        log::info!("Principal {} authenticated", principal.id);
        self.replace_state(SessionState::Authenticated { principal, credentials, since: Utc::now() });
    }

    fn discard_persisted(&self) {
        if let Err(e) = self.credentials.clear() {
            log::warn!("Failed to clear persisted credentials: {}", e);
        }
    }

    fn replace_state(&self, next: SessionState) -> Arc<SessionState> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *state, Arc::new(next))
    }

    fn transition<F>(&self, f: F) -> bool
    where
        F: FnOnce(&SessionState) -> Option<SessionState>,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match f(&state) {
            Some(next) => {
                *state = Arc::new(next);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{DirectoryError, SystemRole};
    use crate::session::credentials::MemoryCredentialStore;
    use crate::session::identity::NoIdentityService;
    use crate::testing::{ScriptedDirectory, ScriptedIdentity};
    use std::sync::Mutex;

    fn principal(id: &str) -> Principal {
        Principal::new(id, format!("{}@school.test", id))
    }

    fn creds(token: &str) -> Credentials {
        Credentials::new(format!("access-{}", token)).with_refresh_token(format!("refresh-{}", token))
    }

    fn session_with(directory: ScriptedDirectory, identity: ScriptedIdentity) -> (AuthSession, MemoryCredentialStore) {
        let store = MemoryCredentialStore::new();
        let session = AuthSession::new(
            PermissionCache::new(directory),
            Arc::new(identity),
            Arc::new(store.clone()),
        );
        (session, store)
    }

    #[tokio::test]
    async fn test_complete_authentication_loads_permissions() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Teacher);
        let (session, store) = session_with(directory, ScriptedIdentity::new());

        let pending = session.complete_authentication(principal("u1"), creds("1"));
        assert!(session.is_authenticated());
        assert!(session.cache().get().is_loading());

        pending.run().await.unwrap();
        assert!(session.cache().get().contains_role("teacher"));
        assert_eq!(store.load().unwrap(), Some(creds("1")));
    }

    #[tokio::test]
    async fn test_logout_is_synchronous_and_idempotent() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Admin);
        let (session, store) = session_with(directory, ScriptedIdentity::new());
        session.complete_authentication(principal("u1"), creds("1")).run().await.unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(session.cache().get().is_empty());
        assert!(store.load().unwrap().is_none());

        session.logout();
        assert_eq!(*events.lock().unwrap(), vec![SessionEvent::LoggedOut]);
    }

    #[tokio::test]
    async fn test_logout_during_load_keeps_cache_empty() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Admin);
        let gate = directory.hold("u1");
        let (session, _) = session_with(directory, ScriptedIdentity::new());

        let load = tokio::spawn(session.complete_authentication(principal("u1"), creds("1")).run());
        tokio::task::yield_now().await;
        session.logout();
        gate.notify_one();
        let _ = load.await.unwrap();

        assert!(session.cache().get().is_empty());
        assert!(!session.cache().get().is_loading());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_principal_switch_never_leaks_previous_permissions() {
        let directory = ScriptedDirectory::new()
            .with_grant("a", SystemRole::Admin)
            .with_grant("b", SystemRole::Student);
        let gate = directory.hold("a");
        let (session, _) = session_with(directory, ScriptedIdentity::new());

        let slow = tokio::spawn(session.complete_authentication(principal("a"), creds("a")).run());
        tokio::task::yield_now().await;
        session.complete_authentication(principal("b"), creds("b")).run().await.unwrap();
        gate.notify_one();
        let _ = slow.await.unwrap();

        let snapshot = session.cache().get();
        assert!(snapshot.contains_role("student"));
        assert!(!snapshot.contains_role("admin"));
        assert_eq!(session.principal().map(|p| p.id), Some("b".to_string()));
    }

    #[test]
    fn test_mfa_challenge_transitions() {
        let (session, _) = session_with(ScriptedDirectory::new(), ScriptedIdentity::new());

        assert!(session.begin_mfa_challenge("c1"));
        assert_eq!(session.status(), SessionStatus::MfaPending);
        assert!(!session.begin_mfa_challenge("c2"));

        assert!(session.cancel_mfa());
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(!session.cancel_mfa());
    }

    #[test]
    fn test_blank_mfa_challenge_is_rejected() {
        let (session, _) = session_with(ScriptedDirectory::new(), ScriptedIdentity::new());
        let started = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&started);
        session.subscribe(move |event| {
            if *event == SessionEvent::MfaChallengeStarted {
                *counter.lock().unwrap() += 1;
            }
        });

        assert!(!session.begin_mfa_challenge(""));
        assert!(!session.begin_mfa_challenge("   "));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(*started.lock().unwrap(), 0);
    }

    #[test]
    fn test_mfa_challenge_ignored_when_authenticated() {
        let (session, _) = session_with(ScriptedDirectory::new(), ScriptedIdentity::new());
        session.complete_authentication_with_grant(principal("u1"), creds("1"), SystemRole::Teacher.into());

        assert!(!session.begin_mfa_challenge("c1"));
        assert!(session.is_authenticated());
        assert!(session.cache().get().contains_role("teacher"));
    }

    #[tokio::test]
    async fn test_login_with_mfa_flow() {
        let identity = ScriptedIdentity::new()
            .with_account("ada@school.test", "pw", principal("ada"))
            .requiring_mfa("ada@school.test", "123456");
        let directory = ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher);
        let (session, _) = session_with(directory, identity);

        let status = session.login("ada@school.test", "pw").await.unwrap();
        assert_eq!(status, SessionStatus::MfaPending);

        assert_eq!(session.verify_mfa("000000").await, Err(IdentityError::InvalidMfaCode));
        assert_eq!(session.status(), SessionStatus::MfaPending);

        session.verify_mfa("123456").await.unwrap();
        assert!(session.is_authenticated());
        assert!(session.cache().get().contains_role("teacher"));
    }

    #[tokio::test]
    async fn test_verify_without_challenge() {
        let (session, _) = session_with(ScriptedDirectory::new(), ScriptedIdentity::new());
        assert_eq!(session.verify_mfa("123456").await, Err(IdentityError::NoMfaChallenge));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let (session, _) = session_with(ScriptedDirectory::new(), identity);

        assert_eq!(
            session.login("ada@school.test", "nope").await,
            Err(IdentityError::InvalidCredentials)
        );
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_from_persisted_credentials() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let directory = ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher);
        let store = MemoryCredentialStore::with_credentials(identity.issue_for("ada"));
        let session = AuthSession::new(
            PermissionCache::new(directory),
            Arc::new(identity),
            Arc::new(store.clone()),
        );

        assert_eq!(session.restore_from_persisted_credentials().await, SessionStatus::Authenticated);
        assert!(session.cache().get().contains_role("teacher"));
    }

    #[tokio::test]
    async fn test_restore_discards_rejected_credentials() {
        let store = MemoryCredentialStore::with_credentials(creds("stale"));
        let session = AuthSession::new(
            PermissionCache::new(ScriptedDirectory::new()),
            Arc::new(NoIdentityService),
            Arc::new(store.clone()),
        );

        assert_eq!(session.restore_from_persisted_credentials().await, SessionStatus::Unauthenticated);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_skips_refresh_for_expired_credentials() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let expired = identity.issue_for("ada").with_expiry(Utc::now() - chrono::Duration::minutes(5));
        assert!(expired.is_expired());
        let store = MemoryCredentialStore::with_credentials(expired);
        let session = AuthSession::new(
            PermissionCache::new(ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher)),
            Arc::new(identity),
            Arc::new(store.clone()),
        );

        assert_eq!(session.restore_from_persisted_credentials().await, SessionStatus::Unauthenticated);
        assert!(store.load().unwrap().is_none());
        assert!(session.cache().get().is_empty());
    }

    #[tokio::test]
    async fn test_restore_survives_directory_failure() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let directory = ScriptedDirectory::new();
        directory.fail_next(DirectoryError::Network("down".into()));
        let store = MemoryCredentialStore::with_credentials(identity.issue_for("ada"));
        let session = AuthSession::new(PermissionCache::new(directory), Arc::new(identity), Arc::new(store));

        assert_eq!(session.restore_from_persisted_credentials().await, SessionStatus::Authenticated);
        let snapshot = session.cache().get();
        assert!(snapshot.is_empty());
        assert!(snapshot.error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_with_timeout_clears_loading() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let directory = ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher);
        let _gate = directory.hold("ada");
        let store = MemoryCredentialStore::with_credentials(identity.issue_for("ada"));
        let session = AuthSession::new(PermissionCache::new(directory), Arc::new(identity), Arc::new(store));

        let status = session.restore_with_timeout(Duration::from_millis(100)).await;
        assert_eq!(status, SessionStatus::Authenticated);
        assert!(!session.cache().get().is_loading());
    }

    #[tokio::test]
    async fn test_refresh_failure_logs_out() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let (session, _) = session_with(ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher), identity);
        session.complete_authentication(principal("ada"), creds("forged")).run().await.unwrap();

        assert_eq!(session.refresh().await, Err(IdentityError::TokenExpired));
        assert!(!session.is_authenticated());
        assert!(session.cache().get().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rotates_credentials() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let issued = identity.issue_for("ada");
        let (session, store) =
            session_with(ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher), identity);
        session.complete_authentication(principal("ada"), issued.clone()).run().await.unwrap();

        session.refresh().await.unwrap();
        let current = store.load().unwrap().unwrap();
        assert_ne!(current, issued);
        assert!(session.cache().get().contains_role("teacher"));
    }

    #[tokio::test]
    async fn test_sign_out_revokes() {
        let identity = ScriptedIdentity::new().with_account("ada@school.test", "pw", principal("ada"));
        let (session, _) = session_with(ScriptedDirectory::new().with_grant("ada", SystemRole::Teacher), identity.clone());
        session.login("ada@school.test", "pw").await.unwrap();

        session.sign_out().await;
        assert!(!session.is_authenticated());
        assert_eq!(identity.revoked_count(), 1);
    }
}
