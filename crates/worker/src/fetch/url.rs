//! URL canonicalization and origin checks.
//!
//! Every URL that reaches the cache is canonical, so two spellings of the same
//! resource map to the same request key.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("not an origin: {0}")]
    NotAnOrigin(String),
}

impl From<UrlError> for pwa_core::Error {
    fn from(err: UrlError) -> Self {
        pwa_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize an absolute URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an http(s) scheme
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Resolve a URL that may be relative to `origin` (e.g. `/app.js`) and canonicalize it.
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(joined)
}

/// Parse an origin such as `https://example.test` or `http://localhost:3000`.
///
/// Paths other than `/`, queries and fragments are rejected.
pub fn parse_origin(input: &str) -> Result<Url, UrlError> {
    let url = canonicalize(input)?;
    if url.path() != "/" || url.query().is_some() || url.host_str().is_none() {
        return Err(UrlError::NotAnOrigin(input.trim().to_string()));
    }
    Ok(url)
}

/// Whether `url` shares scheme, host and port with `origin`.
pub fn is_same_origin(url: &Url, origin: &Url) -> bool {
    url.origin() == origin.origin()
}

/// Last path segment for log lines, or the whole URL for directory paths.
pub fn filename(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or(url.as_str())
}

fn normalize(mut parsed: Url) -> Result<Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
