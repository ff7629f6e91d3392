//! In-process storage backed by a concurrent map.

use std::sync::Arc;

use dashmap::DashMap;

use crate::core::errors::StorageResult;

use super::{DurableStorage, StorageFuture};

/// Thread-safe in-memory storage; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageFuture<'_, StorageResult<Option<String>>> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: &str) -> StorageFuture<'_, StorageResult<()>> {
        self.entries.insert(key.to_string(), value.to_string());
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, key: &str) -> StorageFuture<'_, StorageResult<()>> {
        self.entries.remove(key);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_entries() {
        let storage = MemoryStorage::new();
        let other_tab = storage.clone();

        storage.set("auth_token", "abc").await.unwrap();
        assert_eq!(other_tab.get("auth_token").await.unwrap().as_deref(), Some("abc"));

        other_tab.remove("auth_token").await.unwrap();
        assert!(storage.get("auth_token").await.unwrap().is_none());
        assert!(storage.is_empty());
    }
}
