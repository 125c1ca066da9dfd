//! Push subscription management.
//!
//! ```text
//! unsubscribed --subscribe--> subscribed --unsubscribe--> unsubscribed
//! ```
//!
//! A failed subscribe leaves the manager unsubscribed. The platform push
//! manager is the source of truth; the local mirror only records what the
//! application server would be told.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pwa_core::{CacheDb, Error, PushSubscriptionRecord, Warning};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::notify::{NotificationData, NotificationDispatcher, NotificationIntent};
use crate::platform::{PermissionState, PushService, Registration};

/// Uncompressed P-256 public keys are 65 bytes starting with 0x04.
const VAPID_KEY_LEN: usize = 65;

pub const TEST_PUSH_TAG: &str = "test-push";
pub const SIMULATION_TAG: &str = "server-simulation";

/// Where subscriptions are reported so the application server can send pushes.
#[async_trait]
pub trait SubscriptionMirror: Send + Sync {
    async fn store(&self, record: &PushSubscriptionRecord) -> Result<(), Error>;
    async fn remove(&self) -> Result<(), Error>;
}

#[async_trait]
impl SubscriptionMirror for CacheDb {
    async fn store(&self, record: &PushSubscriptionRecord) -> Result<(), Error> {
        self.save_subscription(record).await
    }

    async fn remove(&self) -> Result<(), Error> {
        self.remove_subscription().await.map(|_| ())
    }
}

/// Decode a base64url VAPID public key into raw bytes.
///
/// Padding is accepted. The result must be an uncompressed P-256 point.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, Error> {
    let trimmed = key.trim().trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| Error::InvalidInput(format!("application server key is not base64url: {e}")))?;

    if bytes.len() != VAPID_KEY_LEN || bytes[0] != 0x04 {
        return Err(Error::InvalidInput(format!(
            "application server key must be a {VAPID_KEY_LEN}-byte uncompressed P-256 point, got {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Result of a subscribe call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeReport {
    pub subscription: PushSubscriptionRecord,
    /// True when an active subscription was returned unchanged.
    pub existing: bool,
    pub warning: Option<Warning>,
}

/// Masked view of the current subscription, safe to log or display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub expiration_time: Option<i64>,
}

impl SubscriptionInfo {
    pub fn masked(record: &PushSubscriptionRecord) -> Self {
        Self {
            endpoint: format!("...{}", tail(&record.endpoint, 20)),
            p256dh: format!("••••{}", tail(&record.keys.p256dh, 8)),
            auth: format!("••••{}", tail(&record.keys.auth, 8)),
            expiration_time: record.expiration_time,
        }
    }
}

fn tail(s: &str, n: usize) -> &str {
    let start = s.char_indices().rev().nth(n.saturating_sub(1)).map(|(i, _)| i).unwrap_or(0);
    if n == 0 { "" } else { &s[start..] }
}

/// Diagnostic snapshot of the push state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushDebugInfo {
    pub supported: bool,
    pub permission: PermissionState,
    pub subscribed: bool,
    pub registration: Option<Registration>,
    pub application_server_key: bool,
    pub subscription: Option<SubscriptionInfo>,
}

#[derive(Default)]
struct PushManagerState {
    registration: Option<Registration>,
    subscription: Option<PushSubscriptionRecord>,
}

/// Obtains, mirrors and revokes the push subscription.
pub struct SubscriptionManager {
    service: Arc<dyn PushService>,
    mirror: Arc<dyn SubscriptionMirror>,
    application_server_key: Vec<u8>,
    state: Mutex<PushManagerState>,
}

impl SubscriptionManager {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the VAPID key does not decode.
    pub fn new(
        service: Arc<dyn PushService>, mirror: Arc<dyn SubscriptionMirror>, vapid_public_key: &str,
    ) -> Result<Self, Error> {
        let application_server_key = decode_application_server_key(vapid_public_key)?;
        Ok(Self { service, mirror, application_server_key, state: Mutex::new(PushManagerState::default()) })
    }

    /// Wait for the worker registration and pick up an existing subscription.
    ///
    /// Unsupported platforms are not an error here; the manager stays unsubscribed.
    pub async fn init(&self) -> Result<bool, Error> {
        if !self.service.supports_push() {
            tracing::warn!("push messaging is not supported");
            return Ok(false);
        }
        self.check_subscription().await
    }

    async fn registration(&self, state: &mut PushManagerState) -> Result<Registration, Error> {
        if let Some(registration) = &state.registration {
            return Ok(registration.clone());
        }
        let registration = self.service.ready().await?;
        state.registration = Some(registration.clone());
        Ok(registration)
    }

    /// Subscribe, prompting for permission if it has not been decided.
    ///
    /// Returns the active subscription unchanged when one already exists.
    /// A mirror failure is reported as a warning; the subscription stands.
    pub async fn subscribe(&self) -> Result<SubscribeReport, Error> {
        if !self.service.supports_push() {
            return Err(Error::CapabilityUnsupported("push messaging".into()));
        }

        let mut state = self.state.lock().await;

        if let Some(existing) = &state.subscription {
            return Ok(SubscribeReport { subscription: existing.clone(), existing: true, warning: None });
        }

        let registration = self.registration(&mut state).await?;

        let permission = match self.service.permission().await {
            PermissionState::Default => self.service.request_permission().await?,
            decided => decided,
        };
        if permission != PermissionState::Granted {
            tracing::info!(?permission, "push subscription refused");
            return Err(Error::PermissionDenied("notification permission not granted".into()));
        }

        let subscription = self.service.subscribe(&registration, &self.application_server_key).await?;

        let warning = match self.mirror.store(&subscription).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to mirror push subscription");
                Some(Warning::MirrorFailed(e.to_string()))
            }
        };

        tracing::info!(endpoint = %tail(&subscription.endpoint, 20), "push subscription created");
        state.subscription = Some(subscription.clone());
        Ok(SubscribeReport { subscription, existing: false, warning })
    }

    /// Revoke the subscription. Returns whether one was active.
    pub async fn unsubscribe(&self) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        let registration = self.registration(&mut state).await?;

        let current = match state.subscription.take() {
            Some(current) => Some(current),
            None => self.service.get_subscription(&registration).await?,
        };
        let Some(current) = current else {
            return Ok(false);
        };

        if let Err(e) = self.service.unsubscribe(&registration, &current.endpoint).await {
            state.subscription = Some(current);
            return Err(e);
        }

        if let Err(e) = self.mirror.remove().await {
            tracing::warn!(error = %e, "failed to remove mirrored push subscription");
        }
        tracing::info!("push subscription removed");
        Ok(true)
    }

    /// Refresh from the platform. Returns whether a subscription is active.
    pub async fn check_subscription(&self) -> Result<bool, Error> {
        if !self.service.supports_push() {
            return Ok(false);
        }
        let mut state = self.state.lock().await;
        let registration = self.registration(&mut state).await?;
        state.subscription = self.service.get_subscription(&registration).await?;
        Ok(state.subscription.is_some())
    }

    pub async fn is_subscribed(&self) -> bool {
        self.state.lock().await.subscription.is_some()
    }

    pub async fn subscription(&self) -> Option<PushSubscriptionRecord> {
        self.state.lock().await.subscription.clone()
    }

    /// Masked details of the active subscription.
    pub async fn subscription_info(&self) -> Option<SubscriptionInfo> {
        self.state.lock().await.subscription.as_ref().map(SubscriptionInfo::masked)
    }

    pub async fn debug_info(&self) -> PushDebugInfo {
        let permission = self.service.permission().await;
        let state = self.state.lock().await;
        PushDebugInfo {
            supported: self.service.supports_push(),
            permission,
            subscribed: state.subscription.is_some(),
            registration: state.registration.clone(),
            application_server_key: !self.application_server_key.is_empty(),
            subscription: state.subscription.as_ref().map(SubscriptionInfo::masked),
        }
    }

    /// Show a local notification confirming push works end to end.
    pub async fn send_test_push(&self, dispatcher: &NotificationDispatcher) -> Result<NotificationIntent, Error> {
        if !self.is_subscribed().await {
            return Err(Error::NotSubscribed);
        }

        let (mut intent, _) = dispatcher.compose(None);
        intent.title = "Push notification test 🎉".into();
        intent.body = "Your push notifications are working.".into();
        intent.tag = TEST_PUSH_TAG.into();
        intent.data.extra.insert("test".into(), json!(true));

        dispatcher.show(&intent).await?;
        Ok(intent)
    }

    /// Show a notification as if the application server had pushed it.
    ///
    /// Needs a worker registration but not a subscription.
    pub async fn simulate_server_push(
        &self, dispatcher: &NotificationDispatcher, title: Option<&str>, body: Option<&str>,
    ) -> Result<NotificationIntent, Error> {
        {
            let mut state = self.state.lock().await;
            self.registration(&mut state).await?;
        }

        let (base, _) = dispatcher.compose(None);
        let intent = NotificationIntent {
            title: title.map(str::to_string).unwrap_or_else(|| "Server update".into()),
            body: body.map(str::to_string).unwrap_or_else(|| "New content is available.".into()),
            tag: SIMULATION_TAG.into(),
            actions: Vec::new(),
            data: NotificationData {
                extra: [("source".to_string(), json!("server-simulation"))].into_iter().collect(),
                ..base.data.clone()
            },
            require_interaction: false,
            ..base
        };

        dispatcher.show(&intent).await?;
        Ok(intent)
    }
}
