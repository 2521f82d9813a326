use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use aqueduct_core::{AqueductError, CacheHealth, TaskCache};

struct CacheEntry {
    value: String,
    stored_at: Instant,
    ttl: Duration,
}

/// In-memory backing store with per-entry TTL expiration.
///
/// Expired entries are simply not returned; they are dropped lazily when
/// overwritten or cleared. Intended for tests and single-process deployments;
/// production uses the Redis store.
#[derive(Default)]
pub struct InMemoryCache {
    store: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AqueductError> {
        let store = self.store.read().await;
        match store.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= entry.ttl => {
                Ok(Some(entry.value.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AqueductError> {
        let mut store = self.store.write().await;
        store.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                stored_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<(), AqueductError> {
        let mut store = self.store.write().await;
        store.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), AqueductError> {
        let mut store = self.store.write().await;
        store.clear();
        Ok(())
    }

    async fn ping(&self) -> CacheHealth {
        CacheHealth {
            healthy: true,
            detail: "in-memory cache".to_string(),
        }
    }
}
