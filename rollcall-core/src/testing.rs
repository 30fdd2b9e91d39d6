//! Scripted collaborators for tests
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream test suites.

use crate::rbac::{DirectoryError, DirectoryGrant, PermissionDirectory};
use crate::session::{AuthGrant, Credentials, IdentityError, IdentityService, LoginOutcome, Principal, Token};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

#[derive(Default)]
struct DirectoryScript {
    grants: HashMap<String, DirectoryGrant>,
    failures: VecDeque<DirectoryError>,
    holds: HashMap<String, Arc<Notify>>,
    calls: Vec<String>,
}

/// Directory with per-principal grants, injectable failures and latches
#[derive(Clone, Default)]
pub struct ScriptedDirectory {
    script: Arc<Mutex<DirectoryScript>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(self, principal_id: impl Into<String>, grant: impl Into<DirectoryGrant>) -> Self {
        self.set_grant(principal_id, grant);
        self
    }

    /// Replace a principal's grant; later loads observe the new one
    pub fn set_grant(&self, principal_id: impl Into<String>, grant: impl Into<DirectoryGrant>) {
        self.lock().grants.insert(principal_id.into(), grant.into());
    }

    /// Make the next fetch, whoever it is for, fail with `error`
    pub fn fail_next(&self, error: DirectoryError) {
        self.lock().failures.push_back(error);
    }

    /// Block the next fetch for `principal_id` until the returned latch is notified
    pub fn hold(&self, principal_id: impl Into<String>) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.lock().holds.insert(principal_id.into(), Arc::clone(&notify));
        notify
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl PermissionDirectory for ScriptedDirectory {
    async fn fetch_permissions_and_roles(
        &self,
        principal_id: &str,
    ) -> Result<DirectoryGrant, DirectoryError> {
        let hold = {
            let mut script = self.lock();
            script.calls.push(principal_id.to_string());
            if let Some(error) = script.failures.pop_front() {
                return Err(error);
            }
            script.holds.remove(principal_id)
        };

        if let Some(hold) = hold {
            hold.notified().await;
        }

        self.lock()
            .grants
            .get(principal_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(principal_id.to_string()))
    }
}

struct Account {
    password: String,
    principal: Principal,
    mfa_code: Option<String>,
    recovery_code: Option<String>,
}

#[derive(Default)]
struct IdentityScript {
    accounts: HashMap<String, Account>,
    access: HashMap<String, DirectoryGrant>,
    challenges: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    issued: u64,
    revoked: usize,
}

impl IdentityScript {
    fn account_for(&self, principal_id: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.principal.id == principal_id)
    }

    fn issue(&mut self, principal_id: &str) -> Credentials {
        self.issued += 1;
        let refresh = format!("refresh-{}-{}", principal_id, self.issued);
        self.refresh_tokens.insert(refresh.clone(), principal_id.to_string());
        Credentials::new(format!("access-{}-{}", principal_id, self.issued)).with_refresh_token(refresh)
    }

    fn grant_for(&mut self, principal: Principal) -> AuthGrant {
        let credentials = self.issue(&principal.id);
        let access = self.access.get(&principal.id).cloned();
        AuthGrant { principal, credentials, access }
    }
}

/// Identity service over a fixed set of accounts
#[derive(Clone, Default)]
pub struct ScriptedIdentity {
    script: Arc<Mutex<IdentityScript>>,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: impl Into<String>, password: impl Into<String>, principal: Principal) -> Self {
        self.lock().accounts.insert(
            email.into(),
            Account { password: password.into(), principal, mfa_code: None, recovery_code: None },
        );
        self
    }

    /// Require a second factor for `email`, answered by `code`
    pub fn requiring_mfa(self, email: &str, code: impl Into<String>) -> Self {
        if let Some(account) = self.lock().accounts.get_mut(email) {
            account.mfa_code = Some(code.into());
        }
        self
    }

    pub fn with_recovery_code(self, email: &str, code: impl Into<String>) -> Self {
        if let Some(account) = self.lock().accounts.get_mut(email) {
            account.recovery_code = Some(code.into());
        }
        self
    }

    /// Return `grant` inline with every authentication of `principal_id`
    pub fn with_inline_access(self, principal_id: impl Into<String>, grant: impl Into<DirectoryGrant>) -> Self {
        self.lock().access.insert(principal_id.into(), grant.into());
        self
    }

    /// Credentials this service will accept for a refresh
    pub fn issue_for(&self, principal_id: &str) -> Credentials {
        self.lock().issue(principal_id)
    }

    /// Make every refresh token issued so far unusable
    pub fn expire_refresh_tokens(&self) {
        self.lock().refresh_tokens.clear();
    }

    pub fn revoked_count(&self) -> usize {
        self.lock().revoked
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IdentityScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer_challenge<F>(&self, challenge_token: &Token, check: F) -> Result<AuthGrant, IdentityError>
    where
        F: FnOnce(&Account) -> bool,
    {
        let mut script = self.lock();
        let email = script
            .challenges
            .get(challenge_token.expose())
            .cloned()
            .ok_or(IdentityError::NoMfaChallenge)?;
        let account = script.accounts.get(&email).ok_or(IdentityError::NoMfaChallenge)?;
        if !check(account) {
            return Err(IdentityError::InvalidMfaCode);
        }
        let principal = account.principal.clone();
        script.challenges.remove(challenge_token.expose());
        Ok(script.grant_for(principal))
    }
}

#[async_trait::async_trait]
impl IdentityService for ScriptedIdentity {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, IdentityError> {
        let mut script = self.lock();
        let account = script.accounts.get(email).ok_or(IdentityError::InvalidCredentials)?;
        if account.password != password {
            return Err(IdentityError::InvalidCredentials);
        }

        if account.mfa_code.is_some() {
            let token = format!("challenge-{}-{}", account.principal.id, script.challenges.len() + 1);
            script.challenges.insert(token.clone(), email.to_string());
            return Ok(LoginOutcome::MfaRequired { challenge_token: Token::new(token) });
        }

        let principal = account.principal.clone();
        Ok(LoginOutcome::Authenticated(script.grant_for(principal)))
    }

    async fn verify_mfa(&self, challenge_token: &Token, code: &str) -> Result<AuthGrant, IdentityError> {
        self.answer_challenge(challenge_token, |a| a.mfa_code.as_deref() == Some(code))
    }

    async fn verify_recovery_code(
        &self,
        challenge_token: &Token,
        recovery_code: &str,
    ) -> Result<AuthGrant, IdentityError> {
        self.answer_challenge(challenge_token, |a| a.recovery_code.as_deref() == Some(recovery_code))
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<AuthGrant, IdentityError> {
        let mut script = self.lock();
        let refresh = credentials.refresh_token.as_ref().ok_or(IdentityError::TokenExpired)?;
        let principal_id =
            script.refresh_tokens.remove(refresh.expose()).ok_or(IdentityError::TokenExpired)?;
        let principal = script
            .account_for(&principal_id)
            .map(|a| a.principal.clone())
            .ok_or(IdentityError::TokenExpired)?;
        Ok(script.grant_for(principal))
    }

    async fn revoke(&self, credentials: &Credentials) -> Result<(), IdentityError> {
        let mut script = self.lock();
        if let Some(refresh) = &credentials.refresh_token {
            script.refresh_tokens.remove(refresh.expose());
        }
        script.revoked += 1;
        Ok(())
    }
}
