//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PWA_WORKER_*)
//! 2. TOML config file (if PWA_WORKER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Public VAPID key the demo application subscribes with.
pub const DEFAULT_VAPID_PUBLIC_KEY: &str =
    "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-WkvGNg8dS1W6XJSNpmSNPrQc6MHd1_nXq0pd2d3m-W8n2feGT8Yds0E";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PWA_WORKER_*)
/// 2. TOML config file (if PWA_WORKER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite database holding caches, the subscription mirror and records.
    ///
    /// Set via PWA_WORKER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the worker is registered for (scheme, host and port).
    ///
    /// Set via PWA_WORKER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix of every cache generation name.
    ///
    /// Set via PWA_WORKER_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version of the deployed worker. Bump it on every deploy.
    ///
    /// Set via PWA_WORKER_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Critical asset manifest pre-populated on install, in order.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// Substrings of request URLs that are never intercepted.
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// User-Agent string for network requests.
    ///
    /// Set via PWA_WORKER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PWA_WORKER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per network response.
    ///
    /// Set via PWA_WORKER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Application server public key (base64url) used for push subscriptions.
    ///
    /// Set via PWA_WORKER_VAPID_PUBLIC_KEY environment variable.
    #[serde(default = "default_vapid_public_key")]
    pub vapid_public_key: String,

    /// Fields shown when a push payload does not override them.
    ///
    /// Set via PWA_WORKER_NOTIFICATION__TITLE etc.
    #[serde(default)]
    pub notification: NotificationDefaults,
}

/// Default notification fields merged under every push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "My Advanced PWA".into(),
            body: "You have a new notification! 🎉".into(),
            icon: "/icon-192.png".into(),
            badge: "/icon-72.png".into(),
            tag: "pwa-push-notification".into(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pwa-worker.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "pwa-lighthouse".into()
}

fn default_version() -> String {
    "v2".into()
}

fn default_critical_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/styles/styles.css",
        "/js/app.js",
        "/js/db.js",
        "/js/api-handlers.js",
        "/js/push-manager.js",
        "/manifest.json",
        "/icon-192.png",
        "/icon-512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded_patterns() -> Vec<String> {
    vec!["chrome-extension".into(), "fiveserver".into()]
}

fn default_user_agent() -> String {
    "pwa-worker/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_vapid_public_key() -> String {
    DEFAULT_VAPID_PUBLIC_KEY.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            critical_assets: default_critical_assets(),
            excluded_patterns: default_excluded_patterns(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            vapid_public_key: default_vapid_public_key(),
            notification: NotificationDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the cache generation owned by this version.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PWA_WORKER_`
    /// 2. TOML file from `PWA_WORKER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PWA_WORKER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PWA_WORKER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pwa-worker.sqlite"));
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.user_agent, "pwa-worker/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.critical_assets.len(), 10);
        assert_eq!(config.critical_assets[0], "/");
        assert_eq!(config.excluded_patterns, vec!["chrome-extension", "fiveserver"]);
        assert_eq!(config.notification.tag, "pwa-push-notification");
    }

    #[test]
    fn test_cache_name() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name(), "pwa-lighthouse-v2");

        let config = AppConfig { version: "v3".into(), ..Default::default() };
        assert_eq!(config.cache_name(), "pwa-lighthouse-v3");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_figment_toml_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "worker.toml",
                r#"
                version = "v9"
                critical_assets = ["/", "/app.css"]

                [notification]
                title = "Hi"
                body = "There"
                icon = "/i.png"
                badge = "/b.png"
                tag = "t"
                "#,
            )?;
            jail.set_env("PWA_WORKER_CONFIG_FILE", "worker.toml");
            jail.set_env("PWA_WORKER_ORIGIN", "https://example.test");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.version, "v9");
            assert_eq!(config.origin, "https://example.test");
            assert_eq!(config.critical_assets, vec!["/", "/app.css"]);
            assert_eq!(config.notification.title, "Hi");
            assert_eq!(config.cache_name(), "pwa-lighthouse-v9");
            Ok(())
        });
    }
}
