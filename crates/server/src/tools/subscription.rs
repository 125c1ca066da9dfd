//! Push subscription tools.

use pwa_core::PushSubscriptionRecord;
use pwa_worker::NotificationIntent;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::HostState;

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeOutput {
    pub subscription: PushSubscriptionRecord,
    pub existing: bool,
    pub warning: Option<String>,
}

pub async fn subscribe_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    let report = state.push.subscribe().await?;
    json_result(&SubscribeOutput {
        subscription: report.subscription,
        existing: report.existing,
        warning: report.warning.map(|w| w.to_string()),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeOutput {
    pub unsubscribed: bool,
}

pub async fn unsubscribe_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    let unsubscribed = state.push.unsubscribe().await?;
    json_result(&UnsubscribeOutput { unsubscribed })
}

/// Refreshes from the push service, then reports the masked state.
pub async fn status_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    state.push.check_subscription().await?;
    json_result(&state.push.debug_info().await)
}

/// Parameters for the push_simulate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushSimulateParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShownOutput {
    pub notification: NotificationIntent,
}

pub async fn test_impl(state: &HostState) -> Result<CallToolResult, McpError> {
    let notification = state.push.send_test_push(state.handle.worker().notifications()).await?;
    json_result(&ShownOutput { notification })
}

pub async fn simulate_impl(state: &HostState, params: PushSimulateParams) -> Result<CallToolResult, McpError> {
    let notification = state
        .push
        .simulate_server_push(state.handle.worker().notifications(), params.title.as_deref(), params.body.as_deref())
        .await?;
    json_result(&ShownOutput { notification })
}
