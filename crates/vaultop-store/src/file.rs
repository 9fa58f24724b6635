//! File-backed keystore for local development.
//!
//! One file per key under a root directory. The operator's key-name scheme
//! only emits `[A-Za-z0-9:_-]`, so names map onto file names directly; the
//! backend still rejects anything with a path separator to keep a stray
//! key from escaping the root.
//!
//! This is a development stand-in for the cloud-KMS-wrapped backends used
//! in production. It does not encrypt values at rest.

use std::path::PathBuf;

use crate::{KeyStore, StoreError};

/// A keystore that writes each key to `<root>/<key>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first
    /// write, not here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(StoreError::InvalidKey {
                key: key.to_owned(),
                reason: "key contains path separators".to_owned(),
            });
        }
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl KeyStore for FileStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound {
                    key: key.to_owned(),
                })
            }
            Err(err) => Err(StoreError::Read {
                key: key.to_owned(),
                reason: err.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| StoreError::Write {
                key: key.to_owned(),
                reason: format!("creating store root: {err}"),
            })?;
        tokio::fs::write(&path, value)
            .await
            .map_err(|err| StoreError::Write {
                key: key.to_owned(),
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store.get("vault-unseal-0").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn set_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("vault-unseal-0", b"share-0").await.unwrap();
        assert_eq!(store.get("vault-unseal-0").await.unwrap(), b"share-0");
    }

    #[tokio::test]
    async fn set_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        store.set("vault-root", b"tok").await.unwrap();
        assert_eq!(store.get("vault-root").await.unwrap(), b"tok");
    }

    #[tokio::test]
    async fn recipient_tagged_keys_are_valid_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store
            .set("keybase:alice-vault-unseal-0", b"cipher")
            .await
            .unwrap();
        assert_eq!(
            store.get("keybase:alice-vault-unseal-0").await.unwrap(),
            b"cipher"
        );
    }

    #[tokio::test]
    async fn key_with_separator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.get("../escape").await.is_err());
        assert!(store.set("a/b", b"x").await.is_err());
    }
}
