//! Persisted credential storage
//!
//! Survives restarts so a session can be restored without a new login.

use super::state::Credentials;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Credential store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CredentialStoreResult<T> = Result<T, CredentialStoreError>;

/// Where credentials live between runs
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> CredentialStoreResult<Option<Credentials>>;
    fn save(&self, credentials: &Credentials) -> CredentialStoreResult<()>;
    fn clear(&self) -> CredentialStoreResult<()>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn load(&self) -> CredentialStoreResult<Option<Credentials>> {
        (**self).load()
    }

    fn save(&self, credentials: &Credentials) -> CredentialStoreResult<()> {
        (**self).save(credentials)
    }

    fn clear(&self) -> CredentialStoreResult<()> {
        (**self).clear()
    }
}

/// In-memory store, lost on restart
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<RwLock<Option<Credentials>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { slot: Arc::new(RwLock::new(Some(credentials))) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> CredentialStoreResult<Option<Credentials>> {
        Ok(self.slot.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, credentials: &Credentials) -> CredentialStoreResult<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> CredentialStoreResult<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> CredentialStoreResult<Option<Credentials>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, credentials: &Credentials) -> CredentialStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> CredentialStoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());

        let creds = Credentials::new("a").with_refresh_token("r");
        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), Some(creds));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("credentials.json");
        let creds = Credentials::new("access").with_refresh_token("refresh");

        FileCredentialStore::new(&path).save(&creds).unwrap();
        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(creds));

        reopened.clear().unwrap();
        assert!(reopened.load().unwrap().is_none());
        reopened.clear().unwrap();
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileCredentialStore::new(&path).load().unwrap_err();
        assert!(matches!(err, CredentialStoreError::Serialization(_)));
    }
}
