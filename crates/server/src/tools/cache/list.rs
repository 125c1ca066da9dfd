//! cache_list tool implementation.
//!
//! Lists cache generations, and optionally the request keys in one of them.

use pwa_core::cache::GenerationInfo;
use pwa_core::{CacheDb, Error, RequestKey};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Also list the entries of this generation.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheListOutput {
    /// Generation the worker reads from.
    pub active: String,
    pub generations: Vec<GenerationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<RequestKey>>,
}

pub async fn list_impl(cache: &CacheDb, active: &str, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let generations = cache.generation_infos().await?;

    let entries = match params.cache_name {
        Some(name) => {
            if !cache.has_generation(&name).await? {
                return Err(Error::NotFound(format!("cache {name}")).into());
            }
            Some(cache.entry_keys(&name).await?)
        }
        None => None,
    };

    json_result(&CacheListOutput { active: active.to_string(), generations, entries })
}
