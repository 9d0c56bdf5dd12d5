//! On-disk cache for the validated reporting key.
//!
//! The key is stored as `{ "key": ..., "expires_at": ... }` under
//! `~/.config/killtrack/key.json` (`%APPDATA%\killtrack\key.json` on
//! Windows). A cached key is trusted for a fixed lifetime after it was
//! activated and is re-validated against the service on every load.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use killtrack_protocol::StoredKey;

use crate::client::{self, Client};

/// Local lifetime of a freshly activated key, in hours.
pub const DEFAULT_KEY_TTL_HOURS: i64 = 72;

const KEY_FILE_NAME: &str = "key.json";

/// Errors from key cache operations.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no key cached at {}", .0.display())]
    NotFound(PathBuf),

    #[error("cached key expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("key rejected by the service")]
    Rejected,

    #[error(transparent)]
    Client(#[from] client::Error),

    #[error("config directory not available")]
    NoConfigDir,
}

/// Reads and writes the cached key record.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at the platform default location.
    pub fn default_location() -> Result<Self, KeyStoreError> {
        default_key_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached record if it is present and not expired at `now`.
    ///
    /// A record missing either field fails to parse.
    pub fn load(&self, now: DateTime<Utc>) -> Result<StoredKey, KeyStoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyStoreError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredKey = serde_json::from_str(&data)?;
        if stored.is_expired(now) {
            return Err(KeyStoreError::Expired(stored.expires_at));
        }
        Ok(stored)
    }

    /// Writes the record, creating parent directories. Owner-only on Unix.
    pub fn save(&self, stored: &StoredKey) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(stored)?;
        std::fs::write(&self.path, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Validates a newly entered key and caches it for `ttl`.
    pub async fn activate(
        &self,
        client: &Client,
        key: &str,
        ttl: Duration,
    ) -> Result<StoredKey, KeyStoreError> {
        let key = key.trim();
        if !client.validate_key(key).await? {
            return Err(KeyStoreError::Rejected);
        }
        let stored = StoredKey::issue(key, ttl, Utc::now());
        self.save(&stored)?;
        tracing::info!(
            path = %self.path.display(),
            expires_at = %stored.expires_at,
            "key activated"
        );
        Ok(stored)
    }

    /// Loads the cached key and confirms it with the service.
    pub async fn restore(&self, client: &Client) -> Result<StoredKey, KeyStoreError> {
        let stored = self.load(Utc::now())?;
        if !client.validate_key(&stored.key).await? {
            return Err(KeyStoreError::Rejected);
        }
        tracing::info!(expires_at = %stored.expires_at, "cached key restored");
        Ok(stored)
    }
}

/// Returns the default key file path.
pub fn default_key_path() -> Result<PathBuf, KeyStoreError> {
    let base = config_dir().ok_or(KeyStoreError::NoConfigDir)?;
    Ok(base.join("killtrack").join(KEY_FILE_NAME))
}

/// Returns the platform config directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::mock_server;

    fn ttl() -> Duration {
        Duration::hours(DEFAULT_KEY_TTL_HOURS)
    }

    fn store_in(dir: &tempfile::TempDir) -> KeyStore {
        KeyStore::new(dir.path().join("nested").join("key.json"))
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let now = Utc::now();
        let stored = StoredKey::issue("abc", ttl(), now);

        store.save(&stored).unwrap();
        assert_eq!(store.load(now).unwrap(), stored);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store
            .save(&StoredKey::issue("abc", ttl(), Utc::now()))
            .unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = store_in(&tmp).load(Utc::now()).unwrap_err();
        assert!(matches!(err, KeyStoreError::NotFound(_)));
    }

    #[test]
    fn expired_record_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let issued = Utc::now() - Duration::hours(73);
        store
            .save(&StoredKey::issue("abc", ttl(), issued))
            .unwrap();

        let err = store.load(Utc::now()).unwrap_err();
        assert!(matches!(err, KeyStoreError::Expired(_)));
    }

    #[test]
    fn record_missing_fields_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"key":"abc"}"#).unwrap();

        let err = store.load(Utc::now()).unwrap_err();
        assert!(matches!(err, KeyStoreError::Json(_)));
    }

    #[tokio::test]
    async fn activate_validates_and_caches() {
        let (url, _rx, handle) = mock_server(200, "{}", 1).await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let client = Client::new(&url).unwrap();

        let stored = store
            .activate(&client, " new-key \n", ttl())
            .await
            .unwrap();
        assert_eq!(stored.key, "new-key");
        assert_eq!(store.load(Utc::now()).unwrap().key, "new-key");
        handle.abort();
    }

    #[tokio::test]
    async fn activate_rejected_key_is_not_cached() {
        let (url, _rx, handle) = mock_server(403, "", 1).await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let client = Client::new(&url).unwrap();

        let err = store
            .activate(&client, "bad", ttl())
            .await
            .unwrap_err();
        assert!(matches!(err, KeyStoreError::Rejected));
        assert!(!store.path().exists());
        handle.abort();
    }

    #[tokio::test]
    async fn restore_revalidates() {
        let (url, mut rx, handle) = mock_server(401, "", 1).await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store
            .save(&StoredKey::issue("stale", ttl(), Utc::now()))
            .unwrap();

        let client = Client::new(&url).unwrap();
        let err = store.restore(&client).await.unwrap_err();
        assert!(matches!(err, KeyStoreError::Rejected));
        assert!(rx.recv().await.unwrap().contains("Bearer stale"));
        handle.abort();
    }
}
