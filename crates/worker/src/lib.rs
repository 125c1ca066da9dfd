//! Offline caching worker.
//!
//! The worker sits between a web app and the network:
//! - [`lifecycle`] installs the versioned cache generation and activates it
//! - [`intercept`] answers same-origin GETs cache-first with an offline fallback
//! - [`notify`] turns push payloads into notifications and routes clicks
//! - [`push`] manages the push subscription
//!
//! [`Worker`] ties these together behind a state machine and [`WorkerHandle`]
//! feeds it events. The browser side is abstracted by the traits in
//! [`platform`]; [`local`] implements them in memory. Cache generations are
//! reached through [`storage::CacheStorage`].

pub mod dispatch;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod local;
pub mod notify;
pub mod platform;
pub mod push;
pub mod storage;
pub mod worker;

#[cfg(test)]
mod testing;

pub use dispatch::WorkerHandle;
pub use fetch::{Destination, FetchClient, FetchConfig, Network, Request, Response, ResponseSource};
pub use intercept::{Bypass, FetchInterceptor, FetchOutcome, Interception};
pub use lifecycle::{ActivateReport, InstallReport, LifecycleController};
pub use local::{LocalClients, LocalNotifier, LocalPushService};
pub use notify::{ClickOutcome, NotificationDispatcher, NotificationIntent, PushReport};
pub use platform::{Clients, Notifier, PermissionState, PushService};
pub use push::{SubscribeReport, SubscriptionInfo, SubscriptionManager, SubscriptionMirror};
pub use storage::CacheStorage;
pub use worker::{
    CacheInfo, ControlMessage, EventOutcome, FetchResult, Services, Worker, WorkerEvent, WorkerState,
};
