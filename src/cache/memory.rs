use super::{CacheStore, CachedResponse};
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    value: CachedResponse,
    expires_at: Instant,
}

/// Process-local cache. Expired entries are dropped lazily on lookup and on write.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, AppError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(e) if e.expires_at > now => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &CachedResponse, ttl: Duration) -> Result<(), AppError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}
