use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use serde::{Serialize, de::DeserializeOwned};

use super::{CacheBackend, CacheError};

#[derive(Clone)]
struct CachedValue {
    bytes: Arc<[u8]>,
    cost: u32,
}

/// Moka cache weighted by caller-assigned cost (TinyLFU admission, LRU eviction).
#[derive(Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, CachedValue>,
    capacity: u64,
}

impl InMemoryCache {
    pub fn new(capacity: u64) -> Self {
        let cache = MokaCache::builder()
            .weigher(|_key, value: &CachedValue| -> u32 { value.cost })
            .max_capacity(capacity)
            .build();
        Self { cache, capacity }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn set<T: Serialize + Send + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        cost: u32,
    ) -> Result<bool, CacheError> {
        if u64::from(cost) > self.capacity {
            return Ok(false);
        }
        let bytes = serde_json::to_vec(value)?;
        self.cache
            .insert(
                key.to_string(),
                CachedValue {
                    bytes: bytes.into(),
                    cost,
                },
            )
            .await;
        Ok(true)
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        match self.cache.get(key).await {
            Some(value) => serde_json::from_slice(&value.bytes)
                .map(Some)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) {
        self.cache.invalidate(key).await;
    }
}
