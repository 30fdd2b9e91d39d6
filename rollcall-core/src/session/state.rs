//! Session state machine values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque bearer secret, never printed by `Debug`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The authenticated person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub school_id: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            school_id: None,
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn with_school(mut self, school_id: impl Into<String>) -> Self {
        self.school_id = Some(school_id.into());
        self
    }

    /// "First Last", falling back to the email
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Tokens issued by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: Token,
    #[serde(default)]
    pub refresh_token: Option<Token>,
    /// End of the whole credential set, refresh token included
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_token: impl Into<Token>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None, expires_at: None }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<Token>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Both tokens present and non-blank
    pub fn can_refresh(&self) -> bool {
        !self.access_token.is_blank() && self.refresh_token.as_ref().is_some_and(|t| !t.is_blank())
    }
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    MfaPending {
        challenge_token: Token,
    },
    Authenticated {
        principal: Principal,
        credentials: Credentials,
        since: DateTime<Utc>,
    },
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionState::MfaPending { .. } => SessionStatus::MfaPending,
            SessionState::Authenticated { .. } => SessionStatus::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::Authenticated { principal, .. } => Some(principal),
            _ => None,
        }
    }

    pub fn principal_id(&self) -> Option<&str> {
        self.principal().map(|p| p.id.as_str())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            SessionState::Authenticated { credentials, .. } => Some(credentials),
            _ => None,
        }
    }

    pub fn challenge_token(&self) -> Option<&Token> {
        match self {
            SessionState::MfaPending { challenge_token } => Some(challenge_token),
            _ => None,
        }
    }
}

/// Field-less view of [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    MfaPending,
    Authenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Unauthenticated => "unauthenticated",
            SessionStatus::MfaPending => "mfa_pending",
            SessionStatus::Authenticated => "authenticated",
        };
        f.write_str(s)
    }
}

/// Session transitions, emitted after the state has changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    MfaChallengeStarted,
    MfaCancelled,
    Authenticated { principal_id: String },
    CredentialsRefreshed { principal_id: String },
    LoggedOut,
}
