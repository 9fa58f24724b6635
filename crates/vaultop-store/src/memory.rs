//! In-memory keystore backend for testing.
//!
//! Stores all values in a `BTreeMap` behind a `RwLock`. Not persistent;
//! everything is lost when the process exits. Use this in unit tests and
//! single-process experiments where a real backend would be noise.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{KeyStore, StoreError};

/// An in-memory keystore backed by a `BTreeMap`.
///
/// Thread-safe and async-compatible. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored. Test helper.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no keys. Test helper.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl KeyStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let data = self.data.read().await;
        data.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            key: key.to_owned(),
        })
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}
