//! Cache storage seam used by the lifecycle controller and the interceptor.

use async_trait::async_trait;
use pwa_core::{CacheDb, CachedResponse, Error, RequestKey};

/// Named cache generations holding responses by request key.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn open_generation(&self, name: &str) -> Result<(), Error>;
    async fn generation_names(&self) -> Result<Vec<String>, Error>;
    async fn delete_generation(&self, name: &str) -> Result<bool, Error>;
    async fn put_entry(&self, cache_name: &str, entry: &CachedResponse) -> Result<(), Error>;
    async fn match_entry(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        CacheDb::open_generation(self, name).await
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        CacheDb::generation_names(self).await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        CacheDb::delete_generation(self, name).await
    }

    async fn put_entry(&self, cache_name: &str, entry: &CachedResponse) -> Result<(), Error> {
        CacheDb::put_entry(self, cache_name, entry).await
    }

    async fn match_entry(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        CacheDb::match_entry(self, cache_name, key).await
    }
}
