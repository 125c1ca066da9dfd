//! Core types and shared functionality for the offline worker.
//!
//! This crate provides:
//! - Cache storage with SQLite backend
//! - Unified error and warning types
//! - Configuration structures
//! - Push subscription mirror and record log tables

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CachedResponse, PushSubscriptionRecord, RequestKey, SubscriptionKeys};
pub use config::{AppConfig, ConfigError, NotificationDefaults};
pub use error::{Error, Warning};
