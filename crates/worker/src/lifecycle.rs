//! Install and activate.
//!
//! Install pre-populates the generation named after the current version from
//! the critical asset manifest. Activate deletes every other generation and
//! claims open clients. Neither fails because a single asset or a single stale
//! cache misbehaves; those become warnings in the report.

use std::sync::Arc;

use pwa_core::{Error, Warning};
use serde::Serialize;
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{Network, Request, filename};
use crate::platform::Clients;
use crate::storage::CacheStorage;

/// What an install run stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub cache_name: String,
    /// Manifest URLs that made it into the generation, in manifest order.
    pub cached: Vec<String>,
    #[serde(serialize_with = "warnings_as_text")]
    pub warnings: Vec<Warning>,
}

/// What an activation cleaned up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateReport {
    pub cache_name: String,
    pub deleted: Vec<String>,
    /// Clients controlled after the claim.
    pub claimed: usize,
    #[serde(serialize_with = "warnings_as_text")]
    pub warnings: Vec<Warning>,
}

pub(crate) fn warnings_as_text<S: serde::Serializer>(warnings: &[Warning], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(warnings.iter().map(ToString::to_string))
}

pub struct LifecycleController {
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    cache_name: String,
    manifest: Vec<Url>,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn CacheStorage>, network: Arc<dyn Network>, clients: Arc<dyn Clients>, cache_name: String,
        manifest: Vec<Url>,
    ) -> Self {
        Self { store, network, clients, cache_name, manifest }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Populate the current generation.
    ///
    /// Assets are fetched concurrently and stored one by one. Only `200 OK`
    /// responses are kept.
    ///
    /// # Errors
    ///
    /// Fails only if the generation itself cannot be opened.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.store.open_generation(&self.cache_name).await?;
        tracing::info!(cache = %self.cache_name, assets = self.manifest.len(), "installing");

        let mut tasks = JoinSet::new();
        for (index, url) in self.manifest.iter().cloned().enumerate() {
            let store = Arc::clone(&self.store);
            let network = Arc::clone(&self.network);
            let cache_name = self.cache_name.clone();
            tasks.spawn(async move { (index, cache_asset(store.as_ref(), network.as_ref(), &cache_name, url).await) });
        }

        let mut results: Vec<Option<Result<String, Warning>>> = vec![None; self.manifest.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "asset task failed"),
            }
        }

        let mut report =
            InstallReport { cache_name: self.cache_name.clone(), cached: Vec::new(), warnings: Vec::new() };
        for (url, result) in self.manifest.iter().zip(results) {
            match result {
                Some(Ok(cached)) => report.cached.push(cached),
                Some(Err(warning)) => report.warnings.push(warning),
                None => report
                    .warnings
                    .push(Warning::AssetUnavailable { url: url.to_string(), reason: "task aborted".into() }),
            }
        }

        tracing::info!(
            cache = %self.cache_name,
            cached = report.cached.len(),
            failed = report.warnings.len(),
            "install complete"
        );
        Ok(report)
    }

    /// Delete stale generations and claim clients.
    ///
    /// Running it twice is harmless: the second run finds nothing to delete.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let names = self.store.generation_names().await?;
        let mut report = ActivateReport {
            cache_name: self.cache_name.clone(),
            deleted: Vec::new(),
            claimed: 0,
            warnings: Vec::new(),
        };

        for name in names.into_iter().filter(|n| *n != self.cache_name) {
            match self.store.delete_generation(&name).await {
                Ok(_) => {
                    tracing::info!(cache = %name, "deleted stale cache");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(cache = %name, error = %e, "failed to delete stale cache");
                    report.warnings.push(Warning::CleanupFailed { name, reason: e.to_string() });
                }
            }
        }

        match self.clients.claim().await {
            Ok(count) => report.claimed = count,
            Err(e) => {
                tracing::warn!(error = %e, "failed to claim clients");
                report.warnings.push(Warning::ClaimFailed(e.to_string()));
            }
        }

        tracing::info!(cache = %self.cache_name, deleted = report.deleted.len(), claimed = report.claimed, "activated");
        Ok(report)
    }
}

async fn cache_asset(
    store: &dyn CacheStorage, network: &dyn Network, cache_name: &str, url: Url,
) -> Result<String, Warning> {
    let unavailable = |reason: String| Warning::AssetUnavailable { url: url.to_string(), reason };

    let request = Request::get(url.clone());
    let response = network.fetch(&request).await.map_err(|e| unavailable(e.to_string()))?;
    if !response.is_cacheable() {
        tracing::warn!(asset = filename(&url), status = response.status.as_u16(), "asset not cached");
        return Err(unavailable(format!("status {}", response.status.as_u16())));
    }

    store
        .put_entry(cache_name, &response.to_cached(request.key()))
        .await
        .map_err(|e| unavailable(e.to_string()))?;
    tracing::debug!(asset = filename(&url), "cached asset");
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalClients;
    use crate::testing::{FailingStore, ScriptedNetwork, UnclaimableClients, url};
    use pwa_core::{CacheDb, RequestKey};

    fn manifest() -> Vec<Url> {
        vec![url("https://example.test/"), url("https://example.test/app.js"), url("https://example.test/app.css")]
    }

    fn network() -> Arc<ScriptedNetwork> {
        Arc::new(
            ScriptedNetwork::new()
                .route("https://example.test/", 200, "<html>shell</html>")
                .route("https://example.test/app.js", 200, "console.log(1)")
                .route("https://example.test/app.css", 200, "body{}"),
        )
    }

    fn controller(db: &CacheDb, network: Arc<ScriptedNetwork>, version: &str) -> LifecycleController {
        LifecycleController::new(
            Arc::new(db.clone()),
            network,
            Arc::new(LocalClients::new(url("https://example.test"))),
            format!("pwa-{version}"),
            manifest(),
        )
    }

    #[tokio::test]
    async fn test_install_caches_manifest_in_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let report = controller(&db, network(), "v1").install().await.unwrap();

        assert_eq!(report.cached, manifest().iter().map(Url::to_string).collect::<Vec<_>>());
        assert!(report.warnings.is_empty());

        let entry = db.match_entry("pwa-v1", &RequestKey::get("https://example.test/app.js")).await.unwrap();
        assert_eq!(entry.unwrap().body, b"console.log(1)");
    }

    #[tokio::test]
    async fn test_partial_install_still_succeeds() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(
            ScriptedNetwork::new()
                .route("https://example.test/", 200, "<html>shell</html>")
                .route("https://example.test/app.js", 404, "missing"),
        );

        let report = controller(&db, network, "v1").install().await.unwrap();

        assert_eq!(report.cached, vec!["https://example.test/".to_string()]);
        assert_eq!(report.warnings.len(), 2);
        assert!(matches!(&report.warnings[0], Warning::AssetUnavailable { reason, .. } if reason == "status 404"));
        assert_eq!(db.entry_keys("pwa-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_install_offline_creates_empty_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = network();
        network.set_offline(true);

        let report = controller(&db, network, "v1").install().await.unwrap();
        assert!(report.cached.is_empty());
        assert_eq!(report.warnings.len(), 3);
        assert!(db.has_generation("pwa-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_activation_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let controller = controller(&db, network(), "v1");
        controller.install().await.unwrap();

        controller.activate().await.unwrap();
        let second = controller.activate().await.unwrap();

        assert!(second.deleted.is_empty());
        assert_eq!(db.generation_names().await.unwrap(), vec!["pwa-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_new_version_removes_old_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = controller(&db, network(), "v1");
        v1.install().await.unwrap();
        v1.activate().await.unwrap();
        db.open_generation("unrelated-cache").await.unwrap();

        let v2 = controller(&db, network(), "v2");
        v2.install().await.unwrap();
        let report = v2.activate().await.unwrap();

        assert_eq!(report.deleted.len(), 2);
        assert!(report.deleted.contains(&"pwa-v1".to_string()));
        assert_eq!(db.generation_names().await.unwrap(), vec!["pwa-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_claims_same_origin_clients() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let clients = Arc::new(LocalClients::new(url("https://example.test")));
        clients.add_window(url("https://example.test/page"), false).await;

        let controller =
            LifecycleController::new(Arc::new(db), network(), clients.clone(), "pwa-v1".into(), manifest());
        let report = controller.activate().await.unwrap();

        assert_eq!(report.claimed, 1);
        assert!(clients.windows().await.iter().all(|c| c.controlled));
    }

    #[tokio::test]
    async fn test_failed_cleanup_and_claim_do_not_fail_activation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["pwa-v0", "pwa-v1", "pwa-v2"] {
            db.open_generation(name).await.unwrap();
        }
        let store = FailingStore::new(db.clone()).failing_delete("pwa-v0");
        let controller = LifecycleController::new(
            Arc::new(store),
            network(),
            Arc::new(UnclaimableClients),
            "pwa-v2".into(),
            manifest(),
        );

        let report = controller.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["pwa-v1".to_string()]);
        assert_eq!(report.claimed, 0);
        assert_eq!(report.warnings.len(), 2);
        assert!(matches!(&report.warnings[0], Warning::CleanupFailed { name, .. } if name == "pwa-v0"));
        assert!(matches!(&report.warnings[1], Warning::ClaimFailed(_)));
        assert_eq!(db.generation_names().await.unwrap(), vec!["pwa-v0".to_string(), "pwa-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_asset_write_is_a_warning() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = FailingStore::new(db.clone()).failing_writes();
        let controller = LifecycleController::new(
            Arc::new(store),
            network(),
            Arc::new(LocalClients::new(url("https://example.test"))),
            "pwa-v1".into(),
            manifest(),
        );

        let report = controller.install().await.unwrap();

        assert!(report.cached.is_empty());
        assert_eq!(report.warnings.len(), 3);
        assert!(db.has_generation("pwa-v1").await.unwrap());
    }
}
