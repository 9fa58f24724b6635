//! Keystore port for the `vaultop` operator.
//!
//! The operator persists unseal key shares, recovery key shares, and the
//! root token in an external key-value store, typically cloud-KMS-wrapped
//! object storage in production. The core only depends on the two-operation
//! port defined here; this crate additionally ships two reference backends:
//!
//! - [`MemoryStore`]: in-process `BTreeMap`, for tests.
//! - [`FileStore`]: one file per key, for local development.
//!
//! Absence is a first-class signal: backends MUST return
//! [`StoreError::NotFound`] for a missing key so callers can distinguish
//! "not written yet" from a broken backend.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors that can occur during keystore operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key does not exist in the store.
    #[error("key '{key}' not found in key store")]
    NotFound { key: String },

    /// The backend failed to read a value.
    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },

    /// The backend failed to write a value.
    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    /// The key name is not usable by this backend.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

impl StoreError {
    /// Whether this error is the distinguished absence signal.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Durable key–value store for operator-managed secret material.
///
/// Implementations must be safe to share across async tasks. Overwrite
/// semantics of `set` are backend-defined; the operator enforces
/// write-once where it matters by probing with `get` first.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the key has never been written; any
    /// other variant for backend failures.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not persist the value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}
