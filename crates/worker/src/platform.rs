//! Platform collaborators the worker talks to.
//!
//! In a browser these are the clients list, the notification API and the
//! push manager. The worker only sees these traits; [`crate::local`] provides
//! in-memory implementations for hosts without a browser.

use async_trait::async_trait;
use pwa_core::{Error, PushSubscriptionRecord};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::notify::NotificationIntent;

/// Kind of client a page context is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Window,
    Worker,
    Sharedworker,
}

/// An open page or worker context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: Url,
    pub kind: ClientType,
    /// Whether this worker controls the client.
    pub controlled: bool,
    pub focused: bool,
}

#[async_trait]
pub trait Clients: Send + Sync {
    /// Clients of the given type. Uncontrolled clients are only included on request.
    async fn match_all(&self, kind: ClientType, include_uncontrolled: bool) -> Result<Vec<WindowClient>, Error>;

    /// Bring a client to the foreground.
    async fn focus(&self, id: &str) -> Result<WindowClient, Error>;

    /// Open a new top-level window.
    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error>;

    /// Take control of every open same-origin client. Returns how many are controlled afterwards.
    async fn claim(&self) -> Result<usize, Error>;
}

/// Displays notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification; one with the same tag is replaced.
    async fn show(&self, notification: &NotificationIntent) -> Result<(), Error>;

    /// Close the notification with this tag. Returns false if none was showing.
    async fn close(&self, tag: &str) -> Result<bool, Error>;
}

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Never asked.
    #[default]
    Default,
    Granted,
    Denied,
}

/// Handle to the worker registration push operations run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub scope: Url,
    pub active: bool,
}

/// The platform push manager.
#[async_trait]
pub trait PushService: Send + Sync {
    /// Whether the platform can deliver push messages at all.
    fn supports_push(&self) -> bool;

    async fn permission(&self) -> PermissionState;

    /// Prompt the user for notification permission.
    async fn request_permission(&self) -> Result<PermissionState, Error>;

    /// Wait for an active worker registration.
    async fn ready(&self) -> Result<Registration, Error>;

    /// Subscribe with the application server key.
    ///
    /// Returns the existing subscription when one is already active.
    async fn subscribe(
        &self, registration: &Registration, application_server_key: &[u8],
    ) -> Result<PushSubscriptionRecord, Error>;

    async fn get_subscription(&self, registration: &Registration) -> Result<Option<PushSubscriptionRecord>, Error>;

    /// Revoke the subscription with this endpoint. Returns false if it was not active.
    async fn unsubscribe(&self, registration: &Registration, endpoint: &str) -> Result<bool, Error>;
}
