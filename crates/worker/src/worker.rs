//! The worker and its event handlers.
//!
//! ```text
//! parsed --install--> installing --ok--> installed --activate--> activating --> activated
//!                         |                                                        |
//!                         +--error--> redundant                      activate (re-run)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use pwa_core::{AppConfig, CacheDb, Error};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use crate::fetch::{Network, Request, Response, ResponseSource, parse_origin, resolve};
use crate::intercept::{FetchInterceptor, FetchOutcome, Interception};
use crate::lifecycle::{ActivateReport, InstallReport, LifecycleController};
use crate::notify::{ClickOutcome, NotificationDispatcher, NotificationIntent, PushReport};
use crate::platform::{Clients, Notifier};
use crate::storage::CacheStorage;

/// Sync tag that triggers the background sync step.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Messages a page can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetCacheInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub cache_name: String,
    pub version: String,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(Option<Bytes>),
    NotificationClick { action: Option<String>, notification: NotificationIntent },
    Message(ControlMessage),
    Sync(String),
}

impl WorkerEvent {
    /// Lifecycle and message events run one at a time, in arrival order.
    pub fn is_serialized(&self) -> bool {
        matches!(self, Self::Install | Self::Activate | Self::Message(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
            Self::Push(_) => "push",
            Self::NotificationClick { .. } => "notificationclick",
            Self::Message(_) => "message",
            Self::Sync(_) => "sync",
        }
    }
}

/// How a fetch event was answered.
#[derive(Debug)]
pub enum FetchResult {
    /// The interceptor produced the response.
    Intercepted(FetchOutcome),
    /// The request went straight to the network.
    Passthrough(Response),
}

impl FetchResult {
    pub fn response(&self) -> &Response {
        match self {
            Self::Intercepted(outcome) => &outcome.response,
            Self::Passthrough(response) => response,
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(FetchResult),
    Pushed(PushReport),
    Clicked(ClickOutcome),
    SkipWaiting,
    CacheInfo(CacheInfo),
    Synced { tag: String, ran: bool },
}

/// Collaborators the worker is built from.
#[derive(Clone)]
pub struct Services {
    pub store: CacheDb,
    pub network: Arc<dyn Network>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct Worker {
    version: String,
    origin: Url,
    network: Arc<dyn Network>,
    lifecycle: LifecycleController,
    interceptor: FetchInterceptor,
    notifications: Arc<NotificationDispatcher>,
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the origin or a manifest entry does not parse.
    pub fn new(config: &AppConfig, services: Services) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin)?;
        let manifest = config
            .critical_assets
            .iter()
            .map(|asset| resolve(&origin, asset).map_err(Error::from))
            .collect::<Result<Vec<_>, _>>()?;
        let cache_name = config.cache_name();

        let Services { store, network, clients, notifier } = services;
        let store: Arc<dyn CacheStorage> = Arc::new(store);
        let lifecycle = LifecycleController::new(
            Arc::clone(&store),
            Arc::clone(&network),
            Arc::clone(&clients),
            cache_name.clone(),
            manifest,
        );
        let interceptor = FetchInterceptor::new(
            store,
            Arc::clone(&network),
            origin.clone(),
            cache_name,
            config.excluded_patterns.clone(),
        );
        let notifications =
            Arc::new(NotificationDispatcher::new(origin.clone(), config.notification.clone(), notifier, clients));

        Ok(Self {
            version: config.version.clone(),
            origin,
            network,
            lifecycle,
            interceptor,
            notifications,
            state: watch::Sender::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn cache_name(&self) -> &str {
        self.lifecycle.cache_name()
    }

    pub fn manifest(&self) -> &[Url] {
        self.lifecycle.manifest()
    }

    pub fn notifications(&self) -> &Arc<NotificationDispatcher> {
        &self.notifications
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn cache_info(&self) -> CacheInfo {
        CacheInfo { cache_name: self.cache_name().to_string(), version: self.version.clone() }
    }

    /// Move from one of `from` to `to`, or fail without changing anything.
    fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<WorkerState, Error> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                previous = Some(*state);
                *state = to;
                true
            } else {
                false
            }
        });
        match previous {
            Some(prev) => {
                tracing::info!(from = ?prev, to = ?to, "worker state changed");
                Ok(prev)
            }
            None => Err(Error::InvalidState(format!("cannot enter {to:?} from {:?}", self.state()))),
        }
    }

    fn set_state(&self, to: WorkerState) {
        let from = self.state.send_replace(to);
        tracing::info!(from = ?from, to = ?to, "worker state changed");
    }

    /// Handle one event to completion.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.fetch(request).await.map(EventOutcome::Fetched),
            WorkerEvent::Push(payload) => {
                self.notifications.on_push(payload.as_deref()).await.map(EventOutcome::Pushed)
            }
            WorkerEvent::NotificationClick { action, notification } => self
                .notifications
                .on_click(action.as_deref(), &notification)
                .await
                .map(EventOutcome::Clicked),
            WorkerEvent::Message(message) => Ok(self.message(message)),
            WorkerEvent::Sync(tag) => Ok(self.sync(tag)),
        }
    }

    /// Populate the current generation and request skip-waiting.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(&[WorkerState::Parsed], WorkerState::Installing)?;
        match self.lifecycle.install().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                self.skip_waiting.store(true, Ordering::SeqCst);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "install failed");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Clean up stale generations and take control.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let previous = self.transition(&[WorkerState::Installed, WorkerState::Activated], WorkerState::Activating)?;
        match self.lifecycle.activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "activate failed");
                self.set_state(previous);
                Err(e)
            }
        }
    }

    /// Answer a fetch. Only an activated worker intercepts.
    pub async fn fetch(&self, request: Request) -> Result<FetchResult, Error> {
        let request = if self.state() == WorkerState::Activated {
            match self.interceptor.intercept(request).await {
                Interception::Handled(outcome) => return Ok(FetchResult::Intercepted(outcome)),
                Interception::Bypass(_, request) => request,
            }
        } else {
            request
        };

        let mut response = self.network.fetch(&request).await?;
        response.source = ResponseSource::Passthrough;
        Ok(FetchResult::Passthrough(response))
    }

    pub fn message(&self, message: ControlMessage) -> EventOutcome {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                EventOutcome::SkipWaiting
            }
            ControlMessage::GetCacheInfo => EventOutcome::CacheInfo(self.cache_info()),
        }
    }

    pub fn sync(&self, tag: String) -> EventOutcome {
        let ran = tag == BACKGROUND_SYNC_TAG;
        if ran {
            tracing::info!(%tag, "background sync");
        } else {
            tracing::debug!(%tag, "ignoring sync tag");
        }
        EventOutcome::Synced { tag, ran }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalClients, LocalNotifier};
    use crate::testing::{ScriptedNetwork, url};

    fn config() -> AppConfig {
        AppConfig {
            origin: "https://example.test".into(),
            cache_prefix: "pwa".into(),
            version: "v1".into(),
            critical_assets: vec!["/".into(), "/app.js".into()],
            ..Default::default()
        }
    }

    async fn worker(network: Arc<ScriptedNetwork>) -> Worker {
        let services = Services {
            store: CacheDb::open_in_memory().await.unwrap(),
            network,
            clients: Arc::new(LocalClients::new(url("https://example.test"))),
            notifier: Arc::new(LocalNotifier::new()),
        };
        Worker::new(&config(), services).unwrap()
    }

    fn network() -> Arc<ScriptedNetwork> {
        Arc::new(
            ScriptedNetwork::new()
                .route("https://example.test/", 200, "shell")
                .route("https://example.test/app.js", 200, "js"),
        )
    }

    #[test]
    fn test_control_message_wire_format() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"GET_CACHE_INFO"}"#).unwrap();
        assert_eq!(msg, ControlMessage::GetCacheInfo);
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"NOPE"}"#).is_err());
    }

    #[test]
    fn test_only_lifecycle_and_messages_are_serialized() {
        assert!(WorkerEvent::Install.is_serialized());
        assert!(WorkerEvent::Activate.is_serialized());
        assert!(WorkerEvent::Message(ControlMessage::SkipWaiting).is_serialized());
        assert!(!WorkerEvent::Sync(BACKGROUND_SYNC_TAG.into()).is_serialized());
        assert!(!WorkerEvent::Push(None).is_serialized());
    }

    #[test]
    fn test_cache_info_shape() {
        let info = CacheInfo { cache_name: "pwa-v1".into(), version: "v1".into() };
        assert_eq!(serde_json::to_value(&info).unwrap(), serde_json::json!({"cacheName": "pwa-v1", "version": "v1"}));
    }

    #[tokio::test]
    async fn test_bad_manifest_entry_rejected() {
        let config = AppConfig { critical_assets: vec!["ftp://example.test/x".into()], ..config() };
        let services = Services {
            store: CacheDb::open_in_memory().await.unwrap(),
            network: network(),
            clients: Arc::new(LocalClients::new(url("https://example.test"))),
            notifier: Arc::new(LocalNotifier::new()),
        };
        assert!(matches!(Worker::new(&config, services), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let worker = worker(network()).await;
        assert_eq!(worker.state(), WorkerState::Parsed);
        assert!(matches!(worker.activate().await, Err(Error::InvalidState(_))));

        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        assert!(worker.skip_waiting_requested());
        assert!(matches!(worker.install().await, Err(Error::InvalidState(_))));

        worker.activate().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);
        worker.activate().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_fetch_passthrough_before_activation() {
        let network = network();
        let worker = worker(network.clone()).await;

        let result = worker.fetch(Request::get(url("https://example.test/app.js"))).await.unwrap();
        assert!(matches!(result, FetchResult::Passthrough(_)));
        assert_eq!(result.response().source, ResponseSource::Passthrough);
    }

    #[tokio::test]
    async fn test_fetch_served_from_cache_after_activation() {
        let network = network();
        let worker = worker(network.clone()).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        let calls_after_install = network.calls().len();

        let result = worker.fetch(Request::get(url("https://example.test/app.js"))).await.unwrap();
        assert_eq!(result.response().source, ResponseSource::Cache);
        assert_eq!(network.calls().len(), calls_after_install);
    }

    #[tokio::test]
    async fn test_bypassed_fetch_goes_to_network() {
        let network = Arc::new(ScriptedNetwork::new().route("https://cdn.test/lib.js", 200, "lib"));
        let worker = worker(network.clone()).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let result = worker.fetch(Request::get(url("https://cdn.test/lib.js"))).await.unwrap();
        assert!(matches!(result, FetchResult::Passthrough(_)));
    }

    #[tokio::test]
    async fn test_messages_and_sync() {
        let worker = worker(network()).await;

        assert!(matches!(worker.message(ControlMessage::SkipWaiting), EventOutcome::SkipWaiting));
        assert!(worker.skip_waiting_requested());

        match worker.message(ControlMessage::GetCacheInfo) {
            EventOutcome::CacheInfo(info) => assert_eq!(info.cache_name, "pwa-v1"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert!(matches!(worker.sync(BACKGROUND_SYNC_TAG.into()), EventOutcome::Synced { ran: true, .. }));
        assert!(matches!(worker.sync("other".into()), EventOutcome::Synced { ran: false, .. }));
    }

    #[tokio::test]
    async fn test_watch_state_sees_transitions() {
        let worker = worker(network()).await;
        let rx = worker.watch_state();
        worker.install().await.unwrap();
        assert_eq!(*rx.borrow(), WorkerState::Installed);
    }
}
