//! Identity service collaborator

use super::state::{Credentials, Principal, Token};
use crate::rbac::DirectoryGrant;

/// Failure reported by the identity service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidMfaCode,
    #[error("No MFA challenge in progress")]
    NoMfaChallenge,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Session expired")]
    TokenExpired,
    #[error("Identity service unreachable: {0}")]
    Network(String),
    #[error("Identity service unavailable")]
    Unavailable,
}

/// Successful authentication
///
/// `access` is set when the identity service already returns the
/// principal's roles; the cache is then primed without a directory call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub principal: Principal,
    pub credentials: Credentials,
    pub access: Option<DirectoryGrant>,
}

impl AuthGrant {
    pub fn new(principal: Principal, credentials: Credentials) -> Self {
        Self { principal, credentials, access: None }
    }

    pub fn with_access(mut self, access: impl Into<DirectoryGrant>) -> Self {
        self.access = Some(access.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(AuthGrant),
    MfaRequired { challenge_token: Token },
}

/// Issues and renews credentials
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, IdentityError>;

    async fn verify_mfa(&self, challenge_token: &Token, code: &str) -> Result<AuthGrant, IdentityError>;

    async fn verify_recovery_code(
        &self,
        challenge_token: &Token,
        recovery_code: &str,
    ) -> Result<AuthGrant, IdentityError>;

    /// Exchange stored credentials for a fresh grant
    async fn refresh(&self, credentials: &Credentials) -> Result<AuthGrant, IdentityError>;

    /// Invalidate credentials server-side
    async fn revoke(&self, _credentials: &Credentials) -> Result<(), IdentityError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: IdentityService + ?Sized> IdentityService for std::sync::Arc<S> {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, IdentityError> {
        (**self).login(email, password).await
    }

    async fn verify_mfa(&self, challenge_token: &Token, code: &str) -> Result<AuthGrant, IdentityError> {
        (**self).verify_mfa(challenge_token, code).await
    }

    async fn verify_recovery_code(
        &self,
        challenge_token: &Token,
        recovery_code: &str,
    ) -> Result<AuthGrant, IdentityError> {
        (**self).verify_recovery_code(challenge_token, recovery_code).await
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<AuthGrant, IdentityError> {
        (**self).refresh(credentials).await
    }

    async fn revoke(&self, credentials: &Credentials) -> Result<(), IdentityError> {
        (**self).revoke(credentials).await
    }
}

/// Identity service for deployments that authenticate elsewhere
///
/// Every call fails with [`IdentityError::Unavailable`]; sessions are driven
/// through `complete_authentication` directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentityService;

#[async_trait::async_trait]
impl IdentityService for NoIdentityService {
    async fn login(&self, _email: &str, _password: &str) -> Result<LoginOutcome, IdentityError> {
        Err(IdentityError::Unavailable)
    }

    async fn verify_mfa(&self, _challenge_token: &Token, _code: &str) -> Result<AuthGrant, IdentityError> {
        Err(IdentityError::Unavailable)
    }

    async fn verify_recovery_code(
        &self,
        _challenge_token: &Token,
        _recovery_code: &str,
    ) -> Result<AuthGrant, IdentityError> {
        Err(IdentityError::Unavailable)
    }

    async fn refresh(&self, _credentials: &Credentials) -> Result<AuthGrant, IdentityError> {
        Err(IdentityError::Unavailable)
    }
}
