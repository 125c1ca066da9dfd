//! cache_purge tool implementation.
//!
//! Deletes a whole generation, or a single entry from one.

use pwa_core::{CacheDb, Error, RequestKey};
use pwa_worker::fetch::{parse_origin, resolve};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Generation to purge. With `url`, only that entry is removed.
    pub cache_name: Option<String>,

    /// Entry to remove, absolute or relative to the app origin. Defaults to the active generation.
    pub url: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePurgeOutput {
    pub cache_name: String,
    /// Entry removed, if a single entry was targeted.
    pub url: Option<String>,
    pub deleted: bool,
}

pub async fn purge_impl(
    cache: &CacheDb, origin: &str, active: &str, params: CachePurgeParams,
) -> Result<CallToolResult, McpError> {
    let output = match (params.cache_name, params.url) {
        (None, None) => {
            return Err(Error::InvalidInput("At least one of cache_name or url must be specified".to_string()).into());
        }
        (Some(name), None) => {
            let deleted = cache.delete_generation(&name).await?;
            tracing::info!(cache = %name, deleted, "purged cache generation");
            CachePurgeOutput { cache_name: name, url: None, deleted }
        }
        (name, Some(url)) => {
            let name = name.unwrap_or_else(|| active.to_string());
            let origin = parse_origin(origin).map_err(Error::from)?;
            let url = resolve(&origin, &url).map_err(Error::from)?;
            let deleted = cache.delete_entry(&name, &RequestKey::get(url.as_str())).await?;
            CachePurgeOutput { cache_name: name, url: Some(url.to_string()), deleted }
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;
    use pwa_core::CachedResponse;

    const ORIGIN: &str = "https://example.test";

    async fn seeded() -> CacheDb {
        let cache = CacheDb::open_in_memory().await.unwrap();
        for (name, url) in [("pwa-v1", "https://example.test/old.js"), ("pwa-v2", "https://example.test/app.js")] {
            let entry = CachedResponse::new(RequestKey::get(url), 200, Vec::new(), b"x".to_vec());
            cache.put_entry(name, &entry).await.unwrap();
        }
        cache
    }

    #[tokio::test]
    async fn test_purge_generation() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_name: Some("pwa-v1".into()), url: None };

        let out = output(&purge_impl(&cache, ORIGIN, "pwa-v2", params).await.unwrap());
        assert_eq!(out["deleted"], true);
        assert_eq!(cache.generation_names().await.unwrap(), vec!["pwa-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_entry_in_active_generation() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_name: None, url: Some("/app.js".into()) };

        let out = output(&purge_impl(&cache, ORIGIN, "pwa-v2", params).await.unwrap());
        assert_eq!(out["cache_name"], "pwa-v2");
        assert_eq!(out["url"], "https://example.test/app.js");
        assert_eq!(out["deleted"], true);
        assert!(cache.entry_keys("pwa-v2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_missing_entry() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_name: None, url: Some("/nope.js".into()) };

        let out = output(&purge_impl(&cache, ORIGIN, "pwa-v2", params).await.unwrap());
        assert_eq!(out["deleted"], false);
    }

    #[tokio::test]
    async fn test_purge_no_params() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let result = purge_impl(&cache, ORIGIN, "pwa-v1", CachePurgeParams::default()).await;
        assert!(result.is_err());
    }
}
