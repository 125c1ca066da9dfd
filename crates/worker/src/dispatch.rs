//! Event dispatch loop.
//!
//! A single task owns the event queue. Lifecycle and message events are
//! handled inline, so each one settles before the next is taken. Fetch, push,
//! click and sync events are spawned and settle independently. Every event is
//! answered exactly once over its reply channel.

use std::sync::Arc;

use pwa_core::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::worker::{EventOutcome, Worker, WorkerEvent, WorkerState};

const QUEUE_DEPTH: usize = 64;

type Reply = oneshot::Sender<Result<EventOutcome, Error>>;

struct Envelope {
    event: WorkerEvent,
    reply: Reply,
}

/// Cloneable handle for raising events on a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
    worker: Arc<Worker>,
}

impl WorkerHandle {
    /// Start the dispatch loop. It stops once every handle is dropped.
    pub fn spawn(worker: Arc<Worker>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::spawn(run(Arc::clone(&worker), rx));
        (Self { tx, worker }, task)
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    /// Raise an event and wait until it is settled.
    pub async fn send(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        let (reply, settled) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| Error::InvalidState("worker is not running".into()))?;
        settled
            .await
            .map_err(|_| Error::InvalidState("event handler did not settle".into()))?
    }
}

async fn run(worker: Arc<Worker>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { event, reply }) = rx.recv().await {
        let name = event.name();
        tracing::debug!(event = name, "dispatching");

        if !event.is_serialized() {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                let result = worker.dispatch(event).await;
                if let Err(e) = &result {
                    tracing::error!(event = name, error = %e, "event failed");
                }
                let _ = reply.send(result);
            });
            continue;
        }

        let result = worker.dispatch(event).await;
        if let Err(e) = &result {
            tracing::error!(event = name, error = %e, "event failed");
        }
        let _ = reply.send(result);

        if worker.skip_waiting_requested() && worker.state() == WorkerState::Installed {
            tracing::info!("skip waiting, activating");
            if let Err(e) = worker.activate().await {
                tracing::error!(error = %e, "activation after skip waiting failed");
            }
        }
    }
    tracing::debug!("dispatch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Request, ResponseSource};
    use crate::local::{LocalClients, LocalNotifier};
    use crate::notify::ClickOutcome;
    use crate::testing::{ScriptedNetwork, url};
    use crate::worker::{ControlMessage, Services};
    use bytes::Bytes;
    use pwa_core::{AppConfig, CacheDb};

    async fn handle(network: Arc<ScriptedNetwork>, clients: Arc<LocalClients>) -> WorkerHandle {
        let config = AppConfig {
            origin: "https://example.test".into(),
            cache_prefix: "pwa".into(),
            version: "v2".into(),
            critical_assets: vec!["/".into(), "/app.js".into()],
            ..Default::default()
        };
        let services = Services {
            store: CacheDb::open_in_memory().await.unwrap(),
            network,
            clients,
            notifier: Arc::new(LocalNotifier::new()),
        };
        let worker = Arc::new(Worker::new(&config, services).unwrap());
        WorkerHandle::spawn(worker).0
    }

    fn network() -> Arc<ScriptedNetwork> {
        Arc::new(
            ScriptedNetwork::new()
                .route("https://example.test/", 200, "shell")
                .route("https://example.test/app.js", 200, "js"),
        )
    }

    #[tokio::test]
    async fn test_install_then_skip_waiting_activates() {
        let handle = handle(network(), Arc::new(LocalClients::new(url("https://example.test")))).await;

        let outcome = handle.send(WorkerEvent::Install).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Installed(_)));

        let info = handle.send(WorkerEvent::Message(ControlMessage::GetCacheInfo)).await.unwrap();
        assert!(matches!(info, EventOutcome::CacheInfo(_)));
        assert_eq!(handle.worker().state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_errors_are_replies() {
        let handle = handle(network(), Arc::new(LocalClients::new(url("https://example.test")))).await;
        handle.send(WorkerEvent::Install).await.unwrap();

        let second = handle.send(WorkerEvent::Install).await;
        assert!(matches!(second, Err(Error::InvalidState(_))));

        let still_alive = handle.send(WorkerEvent::Sync("background-sync".into())).await;
        assert!(still_alive.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_all_settle() {
        let network = network();
        let handle = handle(network.clone(), Arc::new(LocalClients::new(url("https://example.test")))).await;
        handle.send(WorkerEvent::Install).await.unwrap();
        handle.send(WorkerEvent::Message(ControlMessage::GetCacheInfo)).await.unwrap();

        let mut pending = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            pending.push(tokio::spawn(async move {
                handle.send(WorkerEvent::Fetch(Request::get(url("https://example.test/app.js")))).await
            }));
        }

        for task in pending {
            match task.await.unwrap().unwrap() {
                EventOutcome::Fetched(result) => assert_eq!(result.response().source, ResponseSource::Cache),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_push_then_click_opens_window() {
        let clients = Arc::new(LocalClients::new(url("https://example.test")));
        let handle = handle(network(), clients.clone()).await;

        let pushed = handle.send(WorkerEvent::Push(Some(Bytes::from_static(b"Hello")))).await.unwrap();
        let EventOutcome::Pushed(report) = pushed else {
            panic!("expected a push report");
        };
        assert_eq!(report.notification.body, "Hello");

        let clicked = handle
            .send(WorkerEvent::NotificationClick { action: None, notification: report.notification })
            .await
            .unwrap();
        assert!(matches!(clicked, EventOutcome::Clicked(ClickOutcome::Opened(_))));
        assert_eq!(clients.opened().await.len(), 1);
    }
}
