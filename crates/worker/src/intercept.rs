//! Cache-first request routing.
//!
//! ```text
//! request ─┬─ not GET / cross-origin / excluded ──> passthrough
//!          └─ cache hit ──> cached response
//!             └─ miss ──> network ─┬─ ok ──> response (+ background store)
//!                                  └─ failure ──> shell `/` for documents,
//!                                                 JSON fallback otherwise
//! ```

use std::sync::Arc;

use pwa_core::Warning;
use reqwest::Method;
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{Network, Request, Response, ResponseSource, filename, is_same_origin};
use crate::storage::CacheStorage;

/// Why a request was left to the network untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bypass {
    Method(Method),
    CrossOrigin,
    /// URL contains this exclusion pattern.
    Excluded(String),
}

/// A handled request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Response,
    /// Background cache write, if one was started.
    pub cache_write: Option<JoinHandle<Result<(), Warning>>>,
}

#[derive(Debug)]
pub enum Interception {
    Bypass(Bypass, Request),
    Handled(FetchOutcome),
}

pub struct FetchInterceptor {
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    origin: Url,
    cache_name: String,
    excluded: Vec<String>,
}

impl FetchInterceptor {
    pub fn new(
        store: Arc<dyn CacheStorage>, network: Arc<dyn Network>, origin: Url, cache_name: String,
        excluded: Vec<String>,
    ) -> Self {
        Self { store, network, origin, cache_name, excluded }
    }

    /// Whether the request should be left alone.
    pub fn bypass(&self, request: &Request) -> Option<Bypass> {
        if request.method != Method::GET {
            return Some(Bypass::Method(request.method.clone()));
        }
        if !is_same_origin(&request.url, &self.origin) {
            return Some(Bypass::CrossOrigin);
        }
        self.excluded
            .iter()
            .find(|pattern| request.url.as_str().contains(pattern.as_str()))
            .map(|pattern| Bypass::Excluded(pattern.clone()))
    }

    /// Route one request. Never fails: every eligible request gets a response.
    pub async fn intercept(&self, request: Request) -> Interception {
        if let Some(reason) = self.bypass(&request) {
            tracing::debug!(url = %request.url, ?reason, "not intercepted");
            return Interception::Bypass(reason, request);
        }
        Interception::Handled(self.handle(request).await)
    }

    async fn handle(&self, request: Request) -> FetchOutcome {
        let key = request.key();

        match self.store.match_entry(&self.cache_name, &key).await {
            Ok(Some(entry)) => match Response::from_cached(request.url.clone(), entry, ResponseSource::Cache) {
                Ok(response) => {
                    tracing::debug!(asset = filename(&request.url), "serving from cache");
                    return FetchOutcome { response, cache_write: None };
                }
                Err(e) => tracing::warn!(url = %request.url, error = %e, "unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => {
                let warning = Warning::CacheRead { url: request.url.to_string(), reason: e.to_string() };
                tracing::warn!(%warning, "cache lookup failed, using network");
            }
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                let cache_write = if response.is_cacheable() && !request.is_navigation() {
                    Some(self.store_in_background(&request, &response))
                } else {
                    None
                };
                FetchOutcome { response, cache_write }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed, serving fallback");
                FetchOutcome { response: self.fallback(&request).await, cache_write: None }
            }
        }
    }

    fn store_in_background(&self, request: &Request, response: &Response) -> JoinHandle<Result<(), Warning>> {
        let store = Arc::clone(&self.store);
        let cache_name = self.cache_name.clone();
        let entry = response.to_cached(request.key());
        let url = request.url.to_string();

        tokio::spawn(async move {
            store.put_entry(&cache_name, &entry).await.map_err(|e| {
                let warning = Warning::CacheWrite { url, reason: e.to_string() };
                tracing::warn!(%warning, "background cache write failed");
                warning
            })
        })
    }

    async fn fallback(&self, request: &Request) -> Response {
        if request.is_navigation() {
            let shell = self.origin.join("/").unwrap_or_else(|_| self.origin.clone());
            let key = Request::navigate(shell.clone()).key();
            match self.store.match_entry(&self.cache_name, &key).await {
                Ok(Some(entry)) => match Response::from_cached(request.url.clone(), entry, ResponseSource::Fallback) {
                    Ok(response) => return response,
                    Err(e) => tracing::warn!(error = %e, "unreadable app shell"),
                },
                Ok(None) => tracing::debug!(shell = %shell, "no cached app shell"),
                Err(e) => tracing::warn!(error = %e, "app shell lookup failed"),
            }
        }
        Response::offline_fallback(&request.url)
    }
}
