use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use super::{CacheBackend, CacheError};

/// Backend that stores nothing.
#[derive(Clone, Debug, Default)]
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    async fn set<T: Serialize + Send + Sync + ?Sized>(
        &self,
        _key: &str,
        _value: &T,
        _cost: u32,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        _key: &str,
    ) -> Result<Option<T>, CacheError> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) {}
}
