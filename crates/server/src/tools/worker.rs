//! Lifecycle, fetch, message and sync tools.

use pwa_core::Error;
use pwa_worker::fetch::{Method, resolve};
use pwa_worker::platform::WindowClient;
use pwa_worker::{
    ActivateReport, CacheInfo, ControlMessage, Destination, EventOutcome, FetchResult, InstallReport,
    NotificationIntent, Request, ResponseSource, WorkerEvent, WorkerState,
};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::HostError;
use crate::state::HostState;

/// Output from worker_install.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutput {
    #[serde(flatten)]
    pub report: InstallReport,
    /// State once skip-waiting has been honored.
    pub state: WorkerState,
}

/// Output from worker_activate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateOutput {
    #[serde(flatten)]
    pub report: ActivateReport,
    pub state: WorkerState,
}

pub async fn install_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    let report = match state.handle.send(WorkerEvent::Install).await? {
        EventOutcome::Installed(report) => report,
        _ => return Err(HostError::UnexpectedOutcome("install").into()),
    };
    let output = InstallOutput { report, state: settled_state(state).await? };
    json_result(&output)
}

pub async fn activate_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    let report = match state.handle.send(WorkerEvent::Activate).await? {
        EventOutcome::Activated(report) => report,
        _ => return Err(HostError::UnexpectedOutcome("activate").into()),
    };
    json_result(&ActivateOutput { report, state: state.handle.worker().state() })
}

/// Let serialized follow-up work (skip-waiting activation) finish before reading the state.
async fn settled_state(state: &HostState) -> Result<WorkerState, McpError> {
    state.handle.send(WorkerEvent::Message(ControlMessage::GetCacheInfo)).await?;
    Ok(state.handle.worker().state())
}

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// URL to request, absolute or relative to the app origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request destination: "document" for navigations, empty for fetch() calls.
    #[serde(default)]
    pub destination: Option<String>,
}

/// Output from worker_fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerFetchOutput {
    pub url: String,
    pub status: u16,
    pub source: ResponseSource,
    pub content_type: Option<String>,
    pub body: String,
    /// Whether a background cache write stored the response.
    pub cached: bool,
    pub cache_warning: Option<String>,
}

pub async fn fetch_impl(state: &HostState, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let origin = state.handle.worker().origin();
    let url = resolve(origin, &params.url).map_err(Error::from)?;

    let method = match params.method.as_deref().map(str::trim) {
        None | Some("") => Method::GET,
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|e| HostError::InvalidParams(format!("invalid method {m}: {e}")))?,
    };
    let destination: Destination = params.destination.as_deref().unwrap_or("").parse()?;

    let result = match state.handle.send(WorkerEvent::Fetch(Request::new(method, url, destination))).await? {
        EventOutcome::Fetched(result) => result,
        _ => return Err(HostError::UnexpectedOutcome("fetch").into()),
    };

    let (response, cached, cache_warning) = match result {
        FetchResult::Passthrough(response) => (response, false, None),
        FetchResult::Intercepted(outcome) => match outcome.cache_write {
            None => (outcome.response, false, None),
            Some(write) => match write.await {
                Ok(Ok(())) => (outcome.response, true, None),
                Ok(Err(warning)) => (outcome.response, false, Some(warning.to_string())),
                Err(e) => (outcome.response, false, Some(e.to_string())),
            },
        },
    };

    let output = WorkerFetchOutput {
        url: response.url.to_string(),
        status: response.status.as_u16(),
        source: response.source,
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
        cached,
        cache_warning,
    };
    json_result(&output)
}

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message type: SKIP_WAITING or GET_CACHE_INFO.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkerMessageOutput {
    #[serde(rename_all = "camelCase")]
    SkipWaiting { skip_waiting: bool, state: WorkerState },
    CacheInfo(CacheInfo),
}

pub async fn message_impl(state: &HostState, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let message: ControlMessage = serde_json::from_value(serde_json::json!({ "type": params.kind.trim() }))
        .map_err(|_| HostError::InvalidParams(format!("unknown message type: {}", params.kind)))?;

    let output = match state.handle.send(WorkerEvent::Message(message)).await? {
        EventOutcome::SkipWaiting => {
            WorkerMessageOutput::SkipWaiting { skip_waiting: true, state: settled_state(state).await? }
        }
        EventOutcome::CacheInfo(info) => WorkerMessageOutput::CacheInfo(info),
        _ => return Err(HostError::UnexpectedOutcome("message").into()),
    };
    json_result(&output)
}

/// Parameters for the worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncParams {
    /// Sync tag; only "background-sync" runs anything.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSyncOutput {
    pub tag: String,
    pub ran: bool,
}

pub async fn sync_impl(state: &HostState, params: WorkerSyncParams) -> Result<CallToolResult, McpError> {
    match state.handle.send(WorkerEvent::Sync(params.tag)).await? {
        EventOutcome::Synced { tag, ran } => json_result(&WorkerSyncOutput { tag, ran }),
        _ => Err(HostError::UnexpectedOutcome("sync").into()),
    }
}

/// Output from worker_status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatusOutput {
    pub state: WorkerState,
    pub version: String,
    pub cache_name: String,
    pub origin: String,
    pub skip_waiting: bool,
    pub manifest: Vec<String>,
    pub clients: Vec<WindowClient>,
    pub notifications: Vec<NotificationIntent>,
}

pub async fn status_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    let worker = state.handle.worker();
    let output = WorkerStatusOutput {
        state: worker.state(),
        version: worker.version().to_string(),
        cache_name: worker.cache_name().to_string(),
        origin: worker.origin().to_string(),
        skip_waiting: worker.skip_waiting_requested(),
        manifest: worker.manifest().iter().map(ToString::to_string).collect(),
        clients: state.clients.windows().await,
        notifications: state.notifier.active().await,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{host, output};

    fn fetch(url: &str) -> WorkerFetchParams {
        WorkerFetchParams { url: url.into(), method: None, destination: None }
    }

    #[tokio::test]
    async fn test_install_activates_via_skip_waiting() {
        let state = host().await;
        let out = output(&install_impl(&state).await.unwrap());

        assert_eq!(out["cacheName"], "pwa-v1");
        assert_eq!(out["cached"].as_array().unwrap().len(), 2);
        assert_eq!(out["state"], "activated");
    }

    #[tokio::test]
    async fn test_activate_before_install_fails() {
        let state = host().await;
        assert!(activate_impl(&state).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_before_install_is_passthrough() {
        let state = host().await;
        let out = output(&fetch_impl(&state, fetch("/app.js")).await.unwrap());
        assert_eq!(out["source"], "passthrough");
        assert_eq!(out["body"], "console.log(1)");
    }

    #[tokio::test]
    async fn test_fetch_after_install_hits_cache() {
        let state = host().await;
        install_impl(&state).await.unwrap();

        let out = output(&fetch_impl(&state, fetch("/app.js")).await.unwrap());
        assert_eq!(out["source"], "cache");
        assert_eq!(out["status"], 200);
    }

    #[tokio::test]
    async fn test_offline_fetch_returns_fallback() {
        let state = host().await;
        install_impl(&state).await.unwrap();

        let out = output(&fetch_impl(&state, fetch("/api/items")).await.unwrap());
        assert_eq!(out["source"], "fallback");
        assert_eq!(out["contentType"], "application/json");
        let body: serde_json::Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["error"], pwa_worker::fetch::OFFLINE_ERROR);
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_destination() {
        let state = host().await;
        let params = WorkerFetchParams { destination: Some("iframe".into()), ..fetch("/") };
        assert!(fetch_impl(&state, params).await.is_err());
    }

    #[tokio::test]
    async fn test_message_cache_info() {
        let state = host().await;
        let out = output(&message_impl(&state, WorkerMessageParams { kind: "GET_CACHE_INFO".into() }).await.unwrap());
        assert_eq!(out, serde_json::json!({"cacheName": "pwa-v1", "version": "v1"}));

        assert!(message_impl(&state, WorkerMessageParams { kind: "RELOAD".into() }).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_tags() {
        let state = host().await;
        let out = output(&sync_impl(&state, WorkerSyncParams { tag: "background-sync".into() }).await.unwrap());
        assert_eq!(out["ran"], true);
        let out = output(&sync_impl(&state, WorkerSyncParams { tag: "other".into() }).await.unwrap());
        assert_eq!(out["ran"], false);
    }

    #[tokio::test]
    async fn test_status() {
        let state = host().await;
        let out = output(&status_impl(&state).await.unwrap());
        assert_eq!(out["state"], "parsed");
        assert_eq!(out["origin"], "https://example.test/");
        assert_eq!(out["manifest"].as_array().unwrap().len(), 2);
    }
}
