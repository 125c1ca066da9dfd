//! In-memory platform for hosts that run the worker outside a browser.
//!
//! Windows, notifications and push subscriptions live in process memory and
//! are inspectable, which is what the MCP host and the tests need. The
//! diagnostic logs (opened, focused, shown) keep only the latest
//! [`LOG_LIMIT`] entries and at most [`MAX_WINDOWS`] windows stay open.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pwa_core::{Error, PushSubscriptionRecord, SubscriptionKeys};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use url::Url;

use crate::fetch::is_same_origin;
use crate::notify::NotificationIntent;
use crate::platform::{ClientType, Clients, Notifier, PermissionState, PushService, Registration, WindowClient};

/// Push endpoint base for subscriptions handed out by [`LocalPushService`].
pub const LOCAL_PUSH_ENDPOINT: &str = "https://push.local/send/";

/// Entries kept in each diagnostic log.
pub const LOG_LIMIT: usize = 50;

/// Open windows tracked at once; the oldest is closed to make room.
pub const MAX_WINDOWS: usize = 32;

fn push_capped<T>(log: &mut VecDeque<T>, item: T, limit: usize) {
    if log.len() == limit {
        log.pop_front();
    }
    log.push_back(item);
}

#[derive(Default)]
struct ClientsState {
    windows: VecDeque<WindowClient>,
    opened: VecDeque<Url>,
    focused: VecDeque<String>,
}

/// Open windows tracked in memory.
pub struct LocalClients {
    origin: Url,
    next_id: AtomicU64,
    state: Mutex<ClientsState>,
}

impl LocalClients {
    pub fn new(origin: Url) -> Self {
        Self { origin, next_id: AtomicU64::new(1), state: Mutex::new(ClientsState::default()) }
    }

    fn next_id(&self) -> String {
        format!("client-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a window that was opened outside the worker.
    pub async fn add_window(&self, url: Url, controlled: bool) -> WindowClient {
        let client = WindowClient { id: self.next_id(), url, kind: ClientType::Window, controlled, focused: false };
        push_capped(&mut self.state.lock().await.windows, client.clone(), MAX_WINDOWS);
        client
    }

    pub async fn windows(&self) -> Vec<WindowClient> {
        self.state.lock().await.windows.iter().cloned().collect()
    }

    /// Latest URLs passed to `open_window`, oldest first.
    pub async fn opened(&self) -> Vec<Url> {
        self.state.lock().await.opened.iter().cloned().collect()
    }

    /// Latest client ids passed to `focus`, oldest first.
    pub async fn focused(&self) -> Vec<String> {
        self.state.lock().await.focused.iter().cloned().collect()
    }
}

#[async_trait]
impl Clients for LocalClients {
    async fn match_all(&self, kind: ClientType, include_uncontrolled: bool) -> Result<Vec<WindowClient>, Error> {
        let state = self.state.lock().await;
        Ok(state
            .windows
            .iter()
            .filter(|c| c.kind == kind && (include_uncontrolled || c.controlled))
            .cloned()
            .collect())
    }

    async fn focus(&self, id: &str) -> Result<WindowClient, Error> {
        let mut state = self.state.lock().await;
        if !state.windows.iter().any(|c| c.id == id) {
            return Err(Error::NotFound(format!("client {id}")));
        }
        for client in &mut state.windows {
            client.focused = client.id == id;
        }
        push_capped(&mut state.focused, id.to_string(), LOG_LIMIT);
        state
            .windows
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("client {id}")))
    }

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error> {
        let controlled = is_same_origin(url, &self.origin);
        let client =
            WindowClient { id: self.next_id(), url: url.clone(), kind: ClientType::Window, controlled, focused: true };

        let mut state = self.state.lock().await;
        for other in &mut state.windows {
            other.focused = false;
        }
        push_capped(&mut state.windows, client.clone(), MAX_WINDOWS);
        push_capped(&mut state.opened, url.clone(), LOG_LIMIT);
        Ok(client)
    }

    async fn claim(&self) -> Result<usize, Error> {
        let mut state = self.state.lock().await;
        let mut controlled = 0;
        for client in state.windows.iter_mut().filter(|c| is_same_origin(&c.url, &self.origin)) {
            client.controlled = true;
            controlled += 1;
        }
        Ok(controlled)
    }
}

#[derive(Default)]
struct NotifierState {
    active: Vec<NotificationIntent>,
    history: VecDeque<NotificationIntent>,
}

/// Notifications kept in memory, one per tag.
#[derive(Default)]
pub struct LocalNotifier {
    state: Mutex<NotifierState>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently on screen.
    pub async fn active(&self) -> Vec<NotificationIntent> {
        self.state.lock().await.active.clone()
    }

    /// Latest notifications shown, oldest first.
    pub async fn history(&self) -> Vec<NotificationIntent> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    pub async fn find(&self, tag: &str) -> Option<NotificationIntent> {
        self.state.lock().await.active.iter().find(|n| n.tag == tag).cloned()
    }
}

#[async_trait]
impl Notifier for LocalNotifier {
    async fn show(&self, notification: &NotificationIntent) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.active.retain(|n| n.tag != notification.tag);
        state.active.push(notification.clone());
        push_capped(&mut state.history, notification.clone(), LOG_LIMIT);
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        let before = state.active.len();
        state.active.retain(|n| n.tag != tag);
        Ok(state.active.len() != before)
    }
}

struct PushState {
    permission: PermissionState,
    subscription: Option<PushSubscriptionRecord>,
}

/// Push manager that hands out deterministic local subscriptions.
pub struct LocalPushService {
    scope: Url,
    supported: bool,
    /// What a permission prompt resolves to.
    prompt_answer: PermissionState,
    state: Mutex<PushState>,
}

impl LocalPushService {
    /// A push manager whose permission prompt is granted.
    pub fn new(scope: Url) -> Self {
        Self::with_answer(scope, PermissionState::Granted)
    }

    pub fn with_answer(scope: Url, prompt_answer: PermissionState) -> Self {
        Self {
            scope,
            supported: true,
            prompt_answer,
            state: Mutex::new(PushState { permission: PermissionState::Default, subscription: None }),
        }
    }

    /// A platform without push support.
    pub fn unsupported(scope: Url) -> Self {
        Self { supported: false, ..Self::new(scope) }
    }

    fn derive(label: &str, scope: &Url, application_server_key: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(scope.as_str().as_bytes());
        hasher.update(application_server_key);
        hasher.finalize().to_vec()
    }
}

#[async_trait]
impl PushService for LocalPushService {
    fn supports_push(&self) -> bool {
        self.supported
    }

    async fn permission(&self) -> PermissionState {
        self.state.lock().await.permission
    }

    async fn request_permission(&self) -> Result<PermissionState, Error> {
        let mut state = self.state.lock().await;
        if state.permission == PermissionState::Default {
            state.permission = self.prompt_answer;
        }
        Ok(state.permission)
    }

    async fn ready(&self) -> Result<Registration, Error> {
        Ok(Registration { scope: self.scope.clone(), active: true })
    }

    async fn subscribe(
        &self, registration: &Registration, application_server_key: &[u8],
    ) -> Result<PushSubscriptionRecord, Error> {
        if !self.supported {
            return Err(Error::CapabilityUnsupported("push messaging".into()));
        }

        let mut state = self.state.lock().await;
        if state.permission != PermissionState::Granted {
            return Err(Error::PermissionDenied("notification permission not granted".into()));
        }
        if let Some(existing) = &state.subscription {
            return Ok(existing.clone());
        }

        let scope = &registration.scope;
        let record = PushSubscriptionRecord {
            endpoint: format!(
                "{LOCAL_PUSH_ENDPOINT}{}",
                hex::encode(Self::derive("endpoint", scope, application_server_key))
            ),
            keys: SubscriptionKeys {
                p256dh: URL_SAFE_NO_PAD.encode(Self::derive("p256dh", scope, application_server_key)),
                auth: URL_SAFE_NO_PAD.encode(&Self::derive("auth", scope, application_server_key)[..16]),
            },
            expiration_time: None,
        };
        state.subscription = Some(record.clone());
        Ok(record)
    }

    async fn get_subscription(&self, _registration: &Registration) -> Result<Option<PushSubscriptionRecord>, Error> {
        Ok(self.state.lock().await.subscription.clone())
    }

    async fn unsubscribe(&self, _registration: &Registration, endpoint: &str) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        match &state.subscription {
            Some(current) if current.endpoint == endpoint => {
                state.subscription = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
