//! Credential persistence for the onboarding session.
//!
//! The credential is a single atomic value: either all four identity fields
//! are present and non-empty, or the session is absent. Partial credentials
//! are never treated as authenticated. The persistence medium sits behind
//! the `StorageBackend` trait so tests can inject an in-memory fake.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

/// Directory name under the user cache dir for persisted state
const APP_NAME: &str = "mono-session";

/// Credential file name in the cache directory
const CREDENTIAL_FILE: &str = "credential.json";

/// One authenticated session's identity fields.
///
/// Serialized field names match the persisted key layout
/// (`google_access_token`, `user_id`, `email`, `name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "google_access_token")]
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl Credential {
    /// A credential is only usable when every field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty()
            && !self.user_id.is_empty()
            && !self.email.is_empty()
            && !self.display_name.is_empty()
    }
}

/// Persistence medium for the credential document.
///
/// Writes must be atomic per call: a concurrent reader sees either the
/// previous document or the new one, never a partial write.
pub trait StorageBackend: Send + Sync {
    fn read(&self) -> Result<Option<String>, Error>;
    fn write(&self, contents: &str) -> Result<(), Error>;
    fn clear(&self) -> Result<(), Error>;
}

/// File-backed storage under the user cache directory.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new() -> Result<Self, Error> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Storage("Could not find cache directory".to_string()))?;
        Ok(Self {
            path: cache_dir.join(APP_NAME).join(CREDENTIAL_FILE),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StorageBackend for FileBackend {
    fn read(&self) -> Result<Option<String>, Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Failed to read credential file: {}", e)))
    }

    fn write(&self, contents: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create cache directory: {}", e)))?;
        }
        // Write to a sibling temp file, then rename over the target, so a
        // concurrent reader never observes a partial document.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)
            .map_err(|e| Error::Storage(format!("Failed to write credential file: {}", e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("Failed to replace credential file: {}", e)))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| Error::Storage(format!("Failed to remove credential file: {}", e)))?;
        }
        Ok(())
    }
}

/// In-memory storage for tests and embedding.
#[derive(Default)]
pub struct MemoryBackend {
    contents: Mutex<Option<String>>,
}

impl StorageBackend for MemoryBackend {
    // A panic while holding the lock cannot corrupt the single String inside,
    // so a poisoned lock is recovered rather than propagated.
    fn read(&self) -> Result<Option<String>, Error> {
        Ok(self
            .contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn write(&self, contents: &str) -> Result<(), Error> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Single source of truth for the current session's credential.
///
/// All other components access the credential only through this store, so
/// the storage mechanism can be swapped without touching consumers.
pub struct CredentialStore {
    backend: Box<dyn StorageBackend>,
}

impl CredentialStore {
    /// Store persisting to the user cache directory.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            backend: Box::new(FileBackend::new()?),
        })
    }

    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Non-persistent store, used by tests.
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryBackend::default()))
    }

    /// The current credential, if one is stored and complete. Never fails:
    /// storage problems and partial documents read as an absent session.
    pub fn get(&self) -> Option<Credential> {
        let contents = match self.backend.read() {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!("Credential read failed: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<Credential>(&contents) {
            Ok(credential) if credential.is_complete() => Some(credential),
            Ok(_) => {
                debug!("Stored credential is incomplete, treating session as absent");
                None
            }
            Err(e) => {
                warn!("Stored credential is unreadable: {}", e);
                None
            }
        }
    }

    /// Persist all four fields together as one atomic write.
    pub fn set(&self, credential: &Credential) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(credential)
            .map_err(|e| Error::Storage(format!("Failed to encode credential: {}", e)))?;
        self.backend.write(&contents)?;
        debug!(user_id = %credential.user_id, "Credential stored");
        Ok(())
    }

    /// Remove all credential fields atomically.
    pub fn clear(&self) -> Result<(), Error> {
        self.backend.clear()?;
        debug!("Credential cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            access_token: "abc".to_string(),
            user_id: "1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "A B".to_string(),
        }
    }

    #[test]
    fn test_get_roundtrip() {
        let store = CredentialStore::in_memory();
        assert!(store.get().is_none());

        store.set(&credential()).unwrap();
        assert_eq!(store.get(), Some(credential()));

        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_clear_on_empty_store_is_ok() {
        let store = CredentialStore::in_memory();
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_empty_field_reads_as_absent() {
        let store = CredentialStore::in_memory();
        let mut partial = credential();
        partial.email = String::new();
        store.set(&partial).unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_missing_field_reads_as_absent() {
        let backend = MemoryBackend::default();
        backend
            .write(r#"{"google_access_token":"abc","user_id":"1","email":"a@b.com"}"#)
            .unwrap();
        let store = CredentialStore::with_backend(Box::new(backend));
        assert!(store.get().is_none());
    }

    #[test]
    fn test_garbage_document_reads_as_absent() {
        let backend = MemoryBackend::default();
        backend.write("not json").unwrap();
        let store = CredentialStore::with_backend(Box::new(backend));
        assert!(store.get().is_none());
    }

    #[test]
    fn test_memory_backend_survives_poisoned_lock() {
        let backend = std::sync::Arc::new(MemoryBackend::default());
        let poisoner = std::sync::Arc::clone(&backend);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.contents.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        backend.write("x").unwrap();
        assert_eq!(backend.read().unwrap().as_deref(), Some("x"));
        backend.clear().unwrap();
        assert!(backend.read().unwrap().is_none());
    }

    #[test]
    fn test_persisted_key_layout() {
        let json = serde_json::to_value(credential()).unwrap();
        assert_eq!(json["google_access_token"], "abc");
        assert_eq!(json["user_id"], "1");
        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["name"], "A B");
    }

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        let store =
            CredentialStore::with_backend(Box::new(FileBackend::with_path(path.clone())));

        store.set(&credential()).unwrap();
        assert!(path.exists());
        assert_eq!(store.get(), Some(credential()));

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.get().is_none());
    }
}
