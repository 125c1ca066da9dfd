//! Everything the tools operate on, wired once at startup.

use std::sync::Arc;

use pwa_core::{AppConfig, CacheDb, Error};
use pwa_worker::fetch::parse_origin;
use pwa_worker::{
    LocalClients, LocalNotifier, LocalPushService, Network, Services, SubscriptionManager, Worker, WorkerHandle,
};

/// Shared host state. Cloning is cheap.
#[derive(Clone)]
pub struct HostState {
    pub config: Arc<AppConfig>,
    pub store: CacheDb,
    pub handle: WorkerHandle,
    pub push: Arc<SubscriptionManager>,
    pub clients: Arc<LocalClients>,
    pub notifier: Arc<LocalNotifier>,
}

impl HostState {
    /// Build the worker and its in-memory platform and start the dispatch loop.
    pub async fn start(config: AppConfig, store: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin)?;
        let clients = Arc::new(LocalClients::new(origin.clone()));
        let notifier = Arc::new(LocalNotifier::new());

        let services = Services {
            store: store.clone(),
            network,
            clients: clients.clone(),
            notifier: notifier.clone(),
        };
        let worker = Arc::new(Worker::new(&config, services)?);
        let (handle, _loop) = WorkerHandle::spawn(worker);

        let push = Arc::new(SubscriptionManager::new(
            Arc::new(LocalPushService::new(origin)),
            Arc::new(store.clone()),
            &config.vapid_public_key,
        )?);
        if let Err(e) = push.init().await {
            tracing::warn!(error = %e, "could not check push subscription");
        }

        Ok(Self { config: Arc::new(config), store, handle, push, clients, notifier })
    }
}
