//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::state::HostState;
use crate::tools::cache::{CacheListParams, CachePurgeParams, list_impl, purge_impl};
use crate::tools::data::{
    DataDeleteParams, DataImportParams, DataSaveParams, DataUpdateParams, delete_impl, export_impl, import_impl,
    query_impl, save_impl, stats_impl, update_impl,
};
use crate::tools::notifications::{NotificationClickParams, PushReceiveParams, click_impl, receive_impl};
use crate::tools::subscription::{
    PushSimulateParams, simulate_impl, status_impl as push_status_impl, subscribe_impl, test_impl, unsubscribe_impl,
};
use crate::tools::worker::{
    WorkerFetchParams, WorkerMessageParams, WorkerSyncParams, activate_impl, fetch_impl, install_impl, message_impl,
    status_impl as worker_status_impl, sync_impl,
};

use pwa_core::cache::RecordQuery;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler that hosts the offline worker.
#[derive(Clone)]
pub struct PwaWorkerServer {
    state: HostState,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PwaWorkerServer {
    pub fn new(state: HostState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(description = "Fire the install event: cache the critical asset manifest into the current generation.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.state).await
    }

    #[tool(description = "Fire the activate event: delete stale cache generations and claim open clients.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.state).await
    }

    /// Route a request through the worker.
    ///
    /// Same-origin GETs are served cache-first once the worker is activated; unreachable
    /// resources get the offline fallback.
    #[tool(description = "Fetch a URL through the worker. Returns status, source (cache/network/fallback/passthrough) and body.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Post a control message to the worker: SKIP_WAITING or GET_CACHE_INFO.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.state, params.0).await
    }

    #[tool(description = "Fire a sync event with the given tag.")]
    async fn worker_sync(&self, params: Parameters<WorkerSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.state, params.0).await
    }

    #[tool(description = "Worker state, version, cache name, open clients and shown notifications.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        worker_status_impl(&self.state).await
    }

    #[tool(description = "Deliver a push message. JSON objects override notification fields; other text becomes the body.")]
    async fn push_receive(&self, params: Parameters<PushReceiveParams>) -> Result<CallToolResult, McpError> {
        receive_impl(&self.state, params.0).await
    }

    #[tool(description = "Click a shown notification (action open, close, or none) and report the window it focused or opened.")]
    async fn notification_click(
        &self, params: Parameters<NotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        click_impl(&self.state, params.0).await
    }

    #[tool(description = "Subscribe to push messages, requesting permission if needed. Idempotent.")]
    async fn push_subscribe(&self) -> Result<CallToolResult, McpError> {
        subscribe_impl(&self.state).await
    }

    #[tool(description = "Revoke the push subscription if there is one.")]
    async fn push_unsubscribe(&self) -> Result<CallToolResult, McpError> {
        unsubscribe_impl(&self.state).await
    }

    #[tool(description = "Push support, permission and masked subscription details.")]
    async fn push_status(&self) -> Result<CallToolResult, McpError> {
        push_status_impl(&self.state).await
    }

    #[tool(description = "Show a local test notification. Requires an active subscription.")]
    async fn push_test(&self) -> Result<CallToolResult, McpError> {
        test_impl(&self.state).await
    }

    #[tool(description = "Show a notification as if the application server had pushed it.")]
    async fn push_simulate(&self, params: Parameters<PushSimulateParams>) -> Result<CallToolResult, McpError> {
        simulate_impl(&self.state, params.0).await
    }

    #[tool(description = "List cache generations with entry counts and sizes, optionally the entries of one.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.state.store, self.state.handle.worker().cache_name(), params.0).await
    }

    #[tool(description = "Delete a cache generation, or a single entry by URL.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        let worker = self.state.handle.worker();
        purge_impl(&self.state.store, &self.state.config.origin, worker.cache_name(), params.0).await
    }

    #[tool(description = "Save a JSON record of the given kind to the local record log.")]
    async fn data_save(&self, params: Parameters<DataSaveParams>) -> Result<CallToolResult, McpError> {
        save_impl(&self.state.store, params.0).await
    }

    #[tool(description = "List records by timestamp, optionally filtered by kind, with limit/offset paging.")]
    async fn data_query(&self, params: Parameters<RecordQuery>) -> Result<CallToolResult, McpError> {
        query_impl(&self.state.store, params.0).await
    }

    #[tool(description = "Merge fields into a stored record's payload.")]
    async fn data_update(&self, params: Parameters<DataUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&self.state.store, params.0).await
    }

    #[tool(description = "Delete one record by id, or all records.")]
    async fn data_delete(&self, params: Parameters<DataDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.state.store, params.0).await
    }

    #[tool(description = "Record count, store name and schema version.")]
    async fn data_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.state.store).await
    }

    #[tool(description = "Export every record with an export date and count.")]
    async fn data_export(&self) -> Result<CallToolResult, McpError> {
        export_impl(&self.state.store).await
    }

    #[tool(description = "Re-save every record of a data_export dump. Ids and timestamps are reassigned.")]
    async fn data_import(&self, params: Parameters<DataImportParams>) -> Result<CallToolResult, McpError> {
        import_impl(&self.state.store, params.0).await
    }
}

impl ServerHandler for PwaWorkerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offline-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Hosts an offline caching worker. Run worker_install first; fetches are served cache-first once the \
                 worker is activated."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
