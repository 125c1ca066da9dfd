//! push_receive and notification_click.

use bytes::Bytes;
use pwa_core::Error;
use pwa_worker::{ClickOutcome, EventOutcome, NotificationIntent, WorkerEvent};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::HostError;
use crate::state::HostState;

/// Parameters for the push_receive tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushReceiveParams {
    /// Raw push payload. JSON objects override notification fields; other text becomes the body.
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushReceiveOutput {
    pub notification: NotificationIntent,
    pub warning: Option<String>,
}

pub async fn receive_impl(state: &HostState, params: PushReceiveParams) -> Result<CallToolResult, McpError> {
    let payload = params.payload.map(Bytes::from);
    let report = match state.handle.send(WorkerEvent::Push(payload)).await? {
        EventOutcome::Pushed(report) => report,
        _ => return Err(HostError::UnexpectedOutcome("push").into()),
    };
    json_result(&PushReceiveOutput {
        notification: report.notification,
        warning: report.warning.map(|w| w.to_string()),
    })
}

/// Parameters for the notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Tag of the shown notification (default: the configured notification tag).
    #[serde(default)]
    pub tag: Option<String>,

    /// Action button: "open", "close", or omitted for a click on the body.
    #[serde(default)]
    pub action: Option<String>,
}

pub async fn click_impl(state: &HostState, params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| state.config.notification.tag.clone());
    let notification = state
        .notifier
        .find(&tag)
        .await
        .ok_or_else(|| Error::NotFound(format!("no notification shown with tag {tag}")))?;

    let outcome: ClickOutcome =
        match state.handle.send(WorkerEvent::NotificationClick { action: params.action, notification }).await? {
            EventOutcome::Clicked(outcome) => outcome,
            _ => return Err(HostError::UnexpectedOutcome("notificationclick").into()),
        };
    json_result(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{host, output};

    fn push(payload: Option<&str>) -> PushReceiveParams {
        PushReceiveParams { payload: payload.map(str::to_string) }
    }

    #[tokio::test]
    async fn test_text_payload_becomes_body() {
        let state = host().await;
        let out = output(&receive_impl(&state, push(Some("Hello"))).await.unwrap());

        assert_eq!(out["notification"]["body"], "Hello");
        assert_eq!(out["notification"]["title"], state.config.notification.title);
        assert_eq!(out["notification"]["requireInteraction"], true);
        assert!(out["warning"].is_string());
    }

    #[tokio::test]
    async fn test_json_payload_overrides_title() {
        let state = host().await;
        let out = output(&receive_impl(&state, push(Some(r#"{"title":"Hi"}"#))).await.unwrap());
        assert_eq!(out["notification"]["title"], "Hi");
        assert!(out["warning"].is_null());
    }

    #[tokio::test]
    async fn test_click_opens_then_focuses() {
        let state = host().await;
        receive_impl(&state, push(None)).await.unwrap();

        let click = NotificationClickParams { tag: None, action: Some("open".into()) };
        let out = output(&click_impl(&state, click.clone()).await.unwrap());
        assert_eq!(out["outcome"], "opened");
        assert_eq!(out["client"]["url"], "https://example.test/");

        receive_impl(&state, push(None)).await.unwrap();
        let out = output(&click_impl(&state, click).await.unwrap());
        assert_eq!(out["outcome"], "focused");
        assert_eq!(state.clients.opened().await.len(), 1);
    }

    #[tokio::test]
    async fn test_click_without_notification() {
        let state = host().await;
        let click = NotificationClickParams { tag: Some("missing".into()), action: None };
        assert!(click_impl(&state, click).await.is_err());
    }

    #[tokio::test]
    async fn test_close_action_dismisses() {
        let state = host().await;
        receive_impl(&state, push(None)).await.unwrap();

        let click = NotificationClickParams { tag: None, action: Some("close".into()) };
        let out = output(&click_impl(&state, click).await.unwrap());
        assert_eq!(out["outcome"], "dismissed");
        assert!(state.notifier.active().await.is_empty());
    }
}
