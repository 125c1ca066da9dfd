//! Request and response descriptors exchanged with the worker.

use std::str::FromStr;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use pwa_core::{CachedResponse, Error, RequestKey};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Error marker placed in the offline fallback body.
pub const OFFLINE_ERROR: &str = "Content not available offline";

/// What the requesting page will do with the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    /// `fetch()`/XHR calls.
    #[default]
    Empty,
    Other,
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "script" => Ok(Self::Script),
            "style" => Ok(Self::Style),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            "manifest" => Ok(Self::Manifest),
            "" | "empty" => Ok(Self::Empty),
            "other" => Ok(Self::Other),
            other => Err(Error::InvalidInput(format!("unknown request destination: {other}"))),
        }
    }
}

/// An outgoing request from a controlled page.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url, destination: Destination) -> Self {
        Self { method, url, destination, headers: HeaderMap::new() }
    }

    /// A subresource GET.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, Destination::Empty)
    }

    /// A top-level navigation.
    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, Destination::Document)
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }
}

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Served from the active cache generation.
    Cache,
    /// Live network response for an intercepted request.
    Network,
    /// Synthesized or shell response after a network failure.
    Fallback,
    /// Request was not intercepted.
    Passthrough,
}

/// Body of the synthetic response served when the network is unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineFallback {
    pub error: String,
    pub url: String,
    pub timestamp: String,
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl Response {
    /// Only complete `200 OK` responses are worth storing.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Capture this response for the cache store.
    pub fn to_cached(&self, key: RequestKey) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        CachedResponse::new(key, self.status.as_u16(), headers, self.body.to_vec())
    }

    /// Rebuild a response from a cache entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Corrupt` if the stored status or headers are not valid HTTP.
    pub fn from_cached(url: Url, entry: CachedResponse, source: ResponseSource) -> Result<Self, Error> {
        let status = StatusCode::from_u16(entry.status).map_err(|e| Error::Corrupt(e.to_string()))?;
        let mut headers = HeaderMap::new();
        for (name, value) in &entry.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Corrupt(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Corrupt(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(Self { url, status, headers, body: Bytes::from(entry.body), source })
    }

    /// The synthetic JSON answer for an unreachable resource.
    ///
    /// Always `200 OK` so page code can parse one predictable shape instead of
    /// handling a transport error.
    pub fn offline_fallback(url: &Url) -> Self {
        let payload = OfflineFallback {
            error: OFFLINE_ERROR.to_string(),
            url: url.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let body = serde_json::to_vec(&payload).unwrap_or_default();

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Self {
            url: url.clone(),
            status: StatusCode::OK,
            headers,
            body: Bytes::from(body),
            source: ResponseSource::Fallback,
        }
    }
}
