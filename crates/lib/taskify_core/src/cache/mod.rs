//! Bounded, cost-aware read-through cache.
//!
//! Values are stored serialized with a caller-assigned cost that counts toward a
//! global capacity. `EntityCache` layers fixed key namespaces, fixed costs and
//! typed accessors on top. Every fault is absorbed there; callers only ever see
//! a hit or a miss.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub mod entity;
pub mod memory;
pub mod null;

pub use entity::{CacheStats, EntityCache};

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
}

/// Contract shared by cache backends.
///
/// Implementations synchronize internally; callers never lock.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store `value` under `key` with the given cost. `Ok(false)` means the
    /// backend rejected the insert.
    async fn set<T: Serialize + Send + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        cost: u32,
    ) -> Result<bool, CacheError>;

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str);
}

/// Cache backend selected at startup.
#[derive(Clone)]
pub enum Cache {
    /// Moka-backed, weighted by entry cost.
    InMemory(memory::InMemoryCache),
    /// Caches nothing. Every read misses.
    Null(null::NullCache),
}

impl Cache {
    /// In-memory cache holding at most `capacity` cost units.
    pub fn in_memory(capacity: u64) -> Self {
        Self::InMemory(memory::InMemoryCache::new(capacity))
    }

    pub fn null() -> Self {
        Self::Null(null::NullCache)
    }
}

#[async_trait::async_trait]
impl CacheBackend for Cache {
    async fn set<T: Serialize + Send + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        cost: u32,
    ) -> Result<bool, CacheError> {
        match self {
            Self::InMemory(cache) => cache.set(key, value, cost).await,
            Self::Null(cache) => cache.set(key, value, cost).await,
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        match self {
            Self::InMemory(cache) => cache.get(key).await,
            Self::Null(cache) => cache.get(key).await,
        }
    }

    async fn delete(&self, key: &str) {
        match self {
            Self::InMemory(cache) => cache.delete(key).await,
            Self::Null(cache) => cache.delete(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct TestValue {
        field: String,
    }

    #[tokio::test]
    async fn basic_operations() {
        let cache = Cache::in_memory(1024 * 1024);
        let value = TestValue {
            field: "v".into(),
        };

        assert!(cache.set("k", &value, 10).await.unwrap());
        assert_eq!(cache.get::<TestValue>("k").await.unwrap(), Some(value));
        assert_eq!(cache.get::<TestValue>("missing").await.unwrap(), None);

        cache.delete("k").await;
        cache.delete("k").await;
        assert_eq!(cache.get::<TestValue>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn null_backend_never_hits() {
        let cache = Cache::null();
        assert!(!cache.set("k", &1u32, 1).await.unwrap());
        assert_eq!(cache.get::<u32>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_shape_is_a_deserialization_error() {
        let cache = Cache::in_memory(1024);
        cache.set("k", &"text", 1).await.unwrap();
        assert!(matches!(
            cache.get::<TestValue>("k").await,
            Err(CacheError::Deserialization(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_operations() {
        let cache = Cache::in_memory(1024 * 1024);
        let writer = cache.clone();

        let set_task = tokio::spawn(async move {
            for i in 0..100u32 {
                writer.set(&format!("key_{i}"), &i, 1).await.unwrap();
            }
        });
        let get_task = tokio::spawn(async move {
            for i in 0..100u32 {
                if let Ok(Some(v)) = cache.get::<u32>(&format!("key_{i}")).await {
                    assert_eq!(v, i);
                }
            }
        });

        let (a, b) = tokio::join!(set_task, get_task);
        a.unwrap();
        b.unwrap();
    }
}
