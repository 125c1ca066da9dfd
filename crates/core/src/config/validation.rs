//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) origin
    /// - `cache_prefix` or `version` is empty or contains whitespace
    /// - a critical asset is neither root-relative nor absolute http(s)
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `vapid_public_key` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) origin".into() });
        }

        for (field, value) in [("cache_prefix", &self.cache_prefix), ("version", &self.version)] {
            if value.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
            if value.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not contain whitespace".into() });
            }
        }

        if let Some(asset) = self
            .critical_assets
            .iter()
            .find(|a| !(a.starts_with('/') || a.starts_with("http://") || a.starts_with("https://")))
        {
            return Err(ConfigError::Invalid {
                field: "critical_assets".into(),
                reason: format!("{asset} must be root-relative or absolute"),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.vapid_public_key.is_empty() {
            return Err(ConfigError::Missing {
                field: "vapid_public_key".into(),
                hint: "Set PWA_WORKER_VAPID_PUBLIC_KEY environment variable".into(),
            });
        }

        if self.critical_assets.is_empty() {
            tracing::warn!(
                cache_name = %self.cache_name(),
                "critical_assets is empty; install will create an empty cache"
            );
        }

        Ok(())
    }
}
