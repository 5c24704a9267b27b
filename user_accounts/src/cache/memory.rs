//! In-memory cache with TTL support

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{Cache, CacheResult};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Process-local cache. Expired entries are dropped on read and swept on
/// every write.
#[derive(Debug, Default)]
pub struct MemoryCache {
    storage: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub async fn size(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut storage = self.storage.write().await;
        let before = storage.len();
        storage.retain(|_, entry| !entry.is_expired());
        before - storage.len()
    }

    /// Whether `key` currently holds a live entry
    pub async fn contains(&self, key: &str) -> bool {
        self.storage
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut storage = self.storage.write().await;

        match storage.get(key) {
            Some(entry) if entry.is_expired() => {
                storage.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, expires: Duration) -> CacheResult<()> {
        let ttl = chrono::Duration::from_std(expires).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut storage = self.storage.write().await;
        storage.retain(|_, entry| !entry.is_expired());
        storage.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.storage.write().await.remove(key);
        Ok(())
    }
}
