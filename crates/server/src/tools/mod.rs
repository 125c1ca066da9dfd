//! MCP tool implementations.
//!
//! Each tool raises a worker event or inspects host state and answers with
//! pretty-printed JSON.

pub mod cache;
pub mod data;
pub mod notifications;
pub mod subscription;
pub mod worker;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::HostError;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use pwa_core::{AppConfig, CacheDb, Error};
    use pwa_worker::{Network, Request, Response, ResponseSource};
    use rmcp::model::CallToolResult;

    use crate::state::HostState;

    /// Serves fixed bodies by URL; everything else is unreachable.
    pub struct StaticNetwork {
        routes: HashMap<String, &'static str>,
    }

    impl StaticNetwork {
        pub fn new(routes: &[(&str, &'static str)]) -> Self {
            Self { routes: routes.iter().map(|(u, b)| (u.to_string(), *b)).collect() }
        }
    }

    #[async_trait]
    impl Network for StaticNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            let body: &'static str = *self
                .routes
                .get(request.url.as_str())
                .ok_or_else(|| Error::NetworkFailure(format!("unreachable: {}", request.url)))?;
            Ok(Response {
                url: request.url.clone(),
                status: pwa_worker::fetch::StatusCode::OK,
                headers: Default::default(),
                body: Bytes::from_static(body.as_bytes()),
                source: ResponseSource::Network,
            })
        }
    }

    pub fn config() -> AppConfig {
        AppConfig {
            origin: "https://example.test".into(),
            cache_prefix: "pwa".into(),
            version: "v1".into(),
            critical_assets: vec!["/".into(), "/app.js".into()],
            ..Default::default()
        }
    }

    pub async fn host() -> HostState {
        let network = StaticNetwork::new(&[
            ("https://example.test/", "<html>shell</html>"),
            ("https://example.test/app.js", "console.log(1)"),
        ]);
        let store = CacheDb::open_in_memory().await.unwrap();
        HostState::start(config(), store, Arc::new(network)).await.unwrap()
    }

    /// Parse the JSON text of a tool result.
    pub fn output(result: &CallToolResult) -> serde_json::Value {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
