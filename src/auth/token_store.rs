//! Durable storage for the single Dropbox bearer token
//!
//! The client never touches storage directly; it goes through the
//! [`TokenStore`] trait so hosts can pick the OS credential manager, an
//! in-memory store, or a test double.

use async_trait::async_trait;
use keyring::Entry;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::security::AccessToken;

/// Account name of the keyring entry holding the token
pub const TOKEN_KEY: &str = "dropbox-token";

/// Errors that can occur during token storage operations
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Keyring operation failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Token file could not be read or written
    #[error("Token file error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing storage cannot be used
    #[error("Token storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage for at most one bearer token
///
/// Writers are last-write-wins; implementations need no coordination beyond
/// what their backing store provides.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persists the token, replacing any previous value
    async fn set(&self, token: AccessToken) -> Result<(), TokenStoreError>;

    /// Returns the current token, or `None` if nothing is stored
    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError>;

    /// Removes the stored token. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Token store backed by the OS credential manager
///
/// Durable on macOS (Keychain), Windows (Credential Manager) and on Linux
/// with the `linux-keyring` feature. Elsewhere keyring only offers its mock
/// store, which keeps the token for the lifetime of one store value; use
/// [`FileTokenStore`] there. [`KeyringTokenStore::is_durable`] tells which
/// case applies.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> Result<(), dbxlink::auth::TokenStoreError> {
/// use dbxlink::auth::{KeyringTokenStore, TokenStore};
///
/// let store = KeyringTokenStore::new()?;
/// store.set("sl.my-token".into()).await?;
/// assert!(store.get().await?.is_some());
/// store.clear().await?;
/// # Ok(())
/// # }
/// ```
pub struct KeyringTokenStore {
    service: String,
    entry: Entry,
}

impl KeyringTokenStore {
    /// Creates a store under the default service name
    pub fn new() -> Result<Self, TokenStoreError> {
        Self::with_service("dbxlink")
    }

    /// Creates a store under a custom service name
    ///
    /// Useful for testing or keeping several Dropbox apps apart.
    pub fn with_service(service: impl Into<String>) -> Result<Self, TokenStoreError> {
        let service = service.into();
        let entry = Entry::new(&service, TOKEN_KEY)?;
        Ok(Self { service, entry })
    }

    /// Returns the service name used for this store
    pub fn service(&self) -> &str {
        &self.service
    }

    /// True when tokens outlive the store value and the process
    pub fn is_durable() -> bool {
        cfg!(any(
            target_os = "macos",
            windows,
            all(target_os = "linux", feature = "linux-keyring")
        ))
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn set(&self, token: AccessToken) -> Result<(), TokenStoreError> {
        self.entry.set_password(token.as_str())?;
        Ok(())
    }

    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError> {
        match self.entry.get_password() {
            Ok(password) => Ok(Some(AccessToken::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(TokenStoreError::Keyring(e)),
        }
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(TokenStoreError::Keyring(e)),
        }
    }
}

/// Token store backed by a single file
///
/// The file holds the bare token. On Unix it is created readable by the owner
/// only.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stores the token next to the config file
    pub fn in_config_dir() -> Result<Self, TokenStoreError> {
        let config_path = crate::config::ClientConfig::default_path()
            .map_err(|e| TokenStoreError::Unavailable(e.to_string()))?;
        let dir = config_path
            .parent()
            .ok_or_else(|| TokenStoreError::Unavailable("config path has no parent".into()))?;
        Ok(Self::new(dir.join(TOKEN_KEY)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn set(&self, token: AccessToken) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, token.as_str()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(())
    }

    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(AccessToken::from(token)))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TokenStoreError::Io(e)),
        }
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TokenStoreError::Io(e)),
        }
    }
}

/// In-process token store
///
/// Each instance is isolated, so several clients can run side by side.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<AccessToken>>,
}

impl MemoryTokenStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding a token
    pub fn with_token(token: impl Into<AccessToken>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn set(&self, token: AccessToken) -> Result<(), TokenStoreError> {
        *self.token.write().await = Some(token);
        Ok(())
    }

    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError> {
        Ok(self.token.read().await.clone())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_and_get() {
        let store = MemoryTokenStore::new();
        assert!(store.get().await.unwrap().is_none());

        store.set("first".into()).await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), "first");
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryTokenStore::with_token("first");
        store.set("second".into()).await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), "second");
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = MemoryTokenStore::with_token("token");
        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());

        // Clearing again is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_stores_are_isolated() {
        let a = MemoryTokenStore::with_token("a");
        let b = MemoryTokenStore::new();
        assert!(a.get().await.unwrap().is_some());
        assert!(b.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token"));

        assert!(store.get().await.unwrap().is_none());

        store.set("sl.file-value".into()).await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), "sl.file-value");

        store.set("sl.replaced".into()).await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), "sl.replaced");

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token"));
        store.set("secret".into()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_file_store_ignores_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "\n").unwrap();

        assert!(FileTokenStore::new(path).get().await.unwrap().is_none());
    }

    #[test]
    fn test_keyring_store_creation() {
        let store = KeyringTokenStore::with_service("dbxlink-test").unwrap();
        assert_eq!(store.service(), "dbxlink-test");
    }

    #[tokio::test]
    async fn test_keyring_store_round_trip() {
        let store = KeyringTokenStore::with_service("dbxlink-test-roundtrip").unwrap();
        let _ = store.clear().await;

        store.set("sl.keyring-value".into()).await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), "sl.keyring-value");

        store.set("sl.replaced".into()).await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), "sl.replaced");

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keyring_store_visible_to_new_store_only_when_durable() {
        let writer = KeyringTokenStore::with_service("dbxlink-test-durable").unwrap();
        writer.set("sl.persisted".into()).await.unwrap();

        let reader = KeyringTokenStore::with_service("dbxlink-test-durable").unwrap();
        let seen = reader.get().await.unwrap();
        assert_eq!(seen.is_some(), KeyringTokenStore::is_durable());

        writer.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_keyring_store_clear_missing_entry() {
        let store = KeyringTokenStore::with_service("dbxlink-test-missing").unwrap();
        assert!(store.clear().await.is_ok());
    }
}
