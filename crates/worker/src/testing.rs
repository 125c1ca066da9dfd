//! Scripted network and failing storage doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use pwa_core::{CacheDb, CachedResponse, Error, RequestKey};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use url::Url;

use crate::fetch::{Network, Request, Response, ResponseSource};
use crate::platform::{ClientType, Clients, WindowClient};
use crate::storage::CacheStorage;

/// Serves canned responses by URL and records every call.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, status: u16, body: &str) -> Self {
        self.set_route(url, status, body);
        self
    }

    pub fn set_route(&self, url: &str, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap();
        self.routes.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let Some((status, body)) = route else {
            return Err(Error::NetworkFailure(format!("no route for {}", request.url)));
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Ok(Response {
            url: request.url.clone(),
            status,
            headers,
            body: Bytes::from(body),
            source: ResponseSource::Network,
        })
    }
}

fn storage_failure() -> Error {
    Error::Database(tokio_rusqlite::Error::ConnectionClosed)
}

/// A real in-memory store whose reads, writes or deletes can be made to fail.
pub struct FailingStore {
    inner: CacheDb,
    fail_reads: bool,
    fail_writes: bool,
    fail_delete: Option<String>,
}

impl FailingStore {
    pub fn new(inner: CacheDb) -> Self {
        Self { inner, fail_reads: false, fail_writes: false, fail_delete: None }
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Refuse to delete this generation.
    pub fn failing_delete(mut self, name: &str) -> Self {
        self.fail_delete = Some(name.to_string());
        self
    }
}

#[async_trait]
impl CacheStorage for FailingStore {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        self.inner.open_generation(name).await
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.inner.generation_names().await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        if self.fail_delete.as_deref() == Some(name) {
            return Err(storage_failure());
        }
        self.inner.delete_generation(name).await
    }

    async fn put_entry(&self, cache_name: &str, entry: &CachedResponse) -> Result<(), Error> {
        if self.fail_writes {
            return Err(storage_failure());
        }
        self.inner.put_entry(cache_name, entry).await
    }

    async fn match_entry(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        if self.fail_reads {
            return Err(storage_failure());
        }
        self.inner.match_entry(cache_name, key).await
    }
}

/// Clients whose claim always fails.
pub struct UnclaimableClients;

#[async_trait]
impl Clients for UnclaimableClients {
    async fn match_all(&self, _kind: ClientType, _include_uncontrolled: bool) -> Result<Vec<WindowClient>, Error> {
        Ok(Vec::new())
    }

    async fn focus(&self, id: &str) -> Result<WindowClient, Error> {
        Err(Error::NotFound(format!("client {id}")))
    }

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error> {
        Err(Error::CapabilityUnsupported(format!("cannot open {url}")))
    }

    async fn claim(&self) -> Result<usize, Error> {
        Err(Error::InvalidState("worker is not active".into()))
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}
