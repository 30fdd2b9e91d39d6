//! Sessions configuration

use crate::session::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Sessions configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Upper bound for one permission load, in milliseconds
    /// Env: ROLLCALL_LOAD_TIMEOUT_MS
    /// Default: 10000
    pub load_timeout_ms: u64,

    /// Upper bound for restoring a session at startup, in milliseconds
    /// Env: ROLLCALL_RESTORE_TIMEOUT_MS
    /// Default: 10000
    pub restore_timeout_ms: u64,

    /// JSON file holding persisted credentials; in-memory when unset
    /// Env: ROLLCALL_CREDENTIAL_STORE ("memory" unsets it)
    /// Default: None
    pub credential_store_path: Option<String>,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { load_timeout_ms: 10_000, restore_timeout_ms: 10_000, credential_store_path: None }
    }
}

impl SessionsConfig {
    pub fn merge(&mut self, other: Self) {
        self.load_timeout_ms = other.load_timeout_ms;
        self.restore_timeout_ms = other.restore_timeout_ms;
        if other.credential_store_path.is_some() {
            self.credential_store_path = other.credential_store_path;
        }
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = lookup("ROLLCALL_LOAD_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.load_timeout_ms = t;
            }
        }

        if let Some(timeout) = lookup("ROLLCALL_RESTORE_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.restore_timeout_ms = t;
            }
        }

        if let Some(store) = lookup("ROLLCALL_CREDENTIAL_STORE") {
            self.credential_store_path = match store.trim() {
                "" | "memory" => None,
                path => Some(path.to_string()),
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.load_timeout_ms == 0 {
            bail!("Invalid load_timeout_ms: must be greater than 0");
        }

        if self.restore_timeout_ms == 0 {
            bail!("Invalid restore_timeout_ms: must be greater than 0");
        }

        if self.credential_store_path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            bail!("Invalid credential_store_path: must not be empty");
        }

        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }

    /// Build the configured credential store
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        match &self.credential_store_path {
            Some(path) => Arc::new(FileCredentialStore::new(path)),
            None => Arc::new(MemoryCredentialStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = SessionsConfig { load_timeout_ms: 0, ..SessionsConfig::default() };
        assert!(config.validate().is_err());

        let config = SessionsConfig { restore_timeout_ms: 0, ..SessionsConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credential_store_env() {
        let mut config = SessionsConfig::default();
        config.apply_env(|key| (key == "ROLLCALL_CREDENTIAL_STORE").then(|| "/tmp/rollcall.json".to_string()));
        assert_eq!(config.credential_store_path.as_deref(), Some("/tmp/rollcall.json"));

        config.apply_env(|key| (key == "ROLLCALL_CREDENTIAL_STORE").then(|| "memory".to_string()));
        assert!(config.credential_store_path.is_none());
    }

    #[test]
    fn test_bad_numbers_are_ignored() {
        let mut config = SessionsConfig::default();
        config.apply_env(|key| (key == "ROLLCALL_LOAD_TIMEOUT_MS").then(|| "soon".to_string()));
        assert_eq!(config.load_timeout(), Duration::from_secs(10));
    }
}
