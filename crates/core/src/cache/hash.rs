//! Request identity used to index cached responses.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute the storage key for a request: SHA-256 over method and URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// (method, absolute URL) pair identifying a cached response.
///
/// The URL is expected to be canonical already; the method is upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self { method: method.to_ascii_uppercase(), url: url.into() }
    }

    /// Key for a GET of `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn hash(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_request_key("GET", "https://example.com/app.js");
        let hash2 = compute_request_key("GET", "https://example.com/app.js");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_method_case_insensitive() {
        assert_eq!(
            compute_request_key("get", "https://example.com/"),
            compute_request_key("GET", "https://example.com/")
        );
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_request_key("GET", "https://example.com/");
        let head = compute_request_key("HEAD", "https://example.com/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_hash_format() {
        let hash = RequestKey::get("https://example.com/").hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_request_key_display() {
        let key = RequestKey::new("get", "https://example.com/a");
        assert_eq!(key.to_string(), "GET https://example.com/a");
    }
}
