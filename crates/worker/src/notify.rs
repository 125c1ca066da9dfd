//! Push notification delivery and click routing.
//!
//! ```text
//! no-notification --push--> shown --click / close--> no-notification
//! ```
//!
//! A shown notification stays until the user acts on it. Dropped pushes are
//! never replayed.

use std::sync::Arc;

use pwa_core::{Error, NotificationDefaults, Warning};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::fetch::{is_same_origin, resolve};
use crate::platform::{ClientType, Clients, Notifier, WindowClient};

pub const ACTION_OPEN: &str = "open";
pub const ACTION_CLOSE: &str = "close";

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Data carried by a notification and handed back on click.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything needed to display one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default)]
    pub require_interaction: bool,
}

impl NotificationIntent {
    /// Notification with the default fields and no actions.
    pub fn from_defaults(defaults: &NotificationDefaults) -> Self {
        Self {
            title: defaults.title.clone(),
            body: defaults.body.clone(),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            tag: defaults.tag.clone(),
            actions: Vec::new(),
            data: NotificationData::default(),
            require_interaction: false,
        }
    }
}

/// Take a string override from a parsed payload object. Non-string values are ignored.
fn override_field(target: &mut String, payload: &Map<String, Value>, key: &str) {
    if let Some(Value::String(value)) = payload.get(key) {
        target.clone_from(value);
    }
}

/// Result of handling a push event.
#[derive(Debug, Clone, PartialEq)]
pub struct PushReport {
    pub notification: NotificationIntent,
    pub warning: Option<Warning>,
}

/// What a notification click asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// The `open` button or a bare click on the notification body.
    Open,
    Close,
    Other(String),
}

impl ClickAction {
    pub fn parse(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            None | Some("") | Some(ACTION_OPEN) => Self::Open,
            Some(ACTION_CLOSE) => Self::Close,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "client", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// An existing same-origin window was focused.
    Focused(WindowClient),
    /// No window was open; a new one was created.
    Opened(WindowClient),
    /// The notification was closed and nothing else happened.
    Dismissed,
}

/// Turns push payloads into notifications and routes clicks.
pub struct NotificationDispatcher {
    origin: Url,
    defaults: NotificationDefaults,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
}

impl NotificationDispatcher {
    pub fn new(
        origin: Url, defaults: NotificationDefaults, notifier: Arc<dyn Notifier>, clients: Arc<dyn Clients>,
    ) -> Self {
        Self { origin, defaults, notifier, clients }
    }

    /// Build the notification for a push payload without showing it.
    ///
    /// JSON objects override the default fields; anything else is treated as
    /// text and becomes the body. An empty payload keeps every default.
    pub fn compose(&self, payload: Option<&[u8]>) -> (NotificationIntent, Option<Warning>) {
        let mut intent = NotificationIntent::from_defaults(&self.defaults);
        let mut warning = None;

        if let Some(bytes) = payload {
            match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(fields)) => {
                    override_field(&mut intent.title, &fields, "title");
                    override_field(&mut intent.body, &fields, "body");
                    override_field(&mut intent.icon, &fields, "icon");
                    override_field(&mut intent.badge, &fields, "badge");
                    override_field(&mut intent.tag, &fields, "tag");
                }
                parsed => {
                    let text = String::from_utf8_lossy(bytes);
                    if !text.is_empty() {
                        let reason = match parsed {
                            Ok(_) => "payload is not a JSON object".to_string(),
                            Err(e) => e.to_string(),
                        };
                        tracing::debug!(%reason, "push payload is not a JSON object, using it as body");
                        warning = Some(Warning::PayloadFallback(reason));
                        intent.body = text.into_owned();
                    }
                }
            }
        }

        intent.actions = vec![
            NotificationAction { action: ACTION_OPEN.into(), title: "Open App".into() },
            NotificationAction { action: ACTION_CLOSE.into(), title: "Close".into() },
        ];
        intent.data = NotificationData {
            url: Some(self.origin.to_string()),
            timestamp: chrono::Utc::now().timestamp_millis(),
            extra: Map::new(),
        };
        intent.require_interaction = true;

        (intent, warning)
    }

    /// Handle a push event: compose and display the notification.
    pub async fn on_push(&self, payload: Option<&[u8]>) -> Result<PushReport, Error> {
        let (notification, warning) = self.compose(payload);
        self.show(&notification).await?;
        tracing::info!(tag = %notification.tag, title = %notification.title, "push notification shown");
        Ok(PushReport { notification, warning })
    }

    /// Display a locally synthesized notification.
    pub async fn show(&self, notification: &NotificationIntent) -> Result<(), Error> {
        self.notifier.show(notification).await
    }

    /// Handle a click on `notification`.
    ///
    /// The notification is always closed. `open` or a bare click focuses an
    /// existing same-origin window, or opens one at `data.url` (the origin
    /// root when missing or unparseable).
    pub async fn on_click(
        &self, action: Option<&str>, notification: &NotificationIntent,
    ) -> Result<ClickOutcome, Error> {
        if let Err(e) = self.notifier.close(&notification.tag).await {
            tracing::warn!(tag = %notification.tag, error = %e, "failed to close notification");
        }

        let action = ClickAction::parse(action);
        tracing::info!(?action, tag = %notification.tag, "notification clicked");

        match action {
            ClickAction::Open => {}
            ClickAction::Close => return Ok(ClickOutcome::Dismissed),
            ClickAction::Other(name) => {
                tracing::debug!(action = %name, "unhandled notification action");
                return Ok(ClickOutcome::Dismissed);
            }
        }

        let windows = self.clients.match_all(ClientType::Window, true).await?;
        if let Some(existing) = windows.into_iter().find(|c| is_same_origin(&c.url, &self.origin)) {
            let focused = self.clients.focus(&existing.id).await?;
            return Ok(ClickOutcome::Focused(focused));
        }

        let target = notification
            .data
            .url
            .as_deref()
            .and_then(|u| resolve(&self.origin, u).ok())
            .unwrap_or_else(|| self.origin.clone());
        let opened = self.clients.open_window(&target).await?;
        Ok(ClickOutcome::Opened(opened))
    }
}
