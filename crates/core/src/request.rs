//! Request and response snapshots exchanged between pages, the worker and the network.
//!
//! ### URL Resolution
//! - Trim whitespace; origin-relative paths (`/static/...`) resolve against the origin
//! - Absolute URLs keep their scheme; only `http`/`https` participate in caching
//! - Lowercase host, remove fragments, preserve query string

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::RequestKey;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a URL string against an origin for consistent cache identity.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Join relative references onto `origin`
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            parsed
                .set_host(Some(&lowered))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether a URL uses a scheme the worker is allowed to intercept.
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// The kind of resource a request is for, mirroring `Request.destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
}

/// How a response was obtained, mirroring `Response.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Basic,
    Cors,
    Default,
    Error,
    Opaque,
    OpaqueRedirect,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Default => "default",
            ResponseType::Error => "error",
            ResponseType::Opaque => "opaque",
            ResponseType::OpaqueRedirect => "opaqueredirect",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(ResponseType::Basic),
            "cors" => Some(ResponseType::Cors),
            "default" => Some(ResponseType::Default),
            "error" => Some(ResponseType::Error),
            "opaque" => Some(ResponseType::Opaque),
            "opaqueredirect" => Some(ResponseType::OpaqueRedirect),
            _ => None,
        }
    }

    /// Opaque and error responses carry no readable status and are never stored.
    pub fn is_readable(&self) -> bool {
        !matches!(self, ResponseType::Error | ResponseType::Opaque | ResponseType::OpaqueRedirect)
    }
}

/// A request seen by the worker's fetch handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub destination: Destination,
}

impl InterceptedRequest {
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new(), destination: Destination::Empty }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Build a GET request from a string, resolving relative paths against `origin`.
    pub fn parse(origin: &Url, input: &str) -> Result<Self, Error> {
        let url = resolve(origin, input).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::get(url))
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Case-insensitive header lookup (first match wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Only GET requests over http(s) take part in caching.
    pub fn participates(&self) -> bool {
        self.is_get() && is_http(&self.url)
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// A response as stored in a cache: status, headers and the full body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            response_type: ResponseType::Basic,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// The network-error response (`Response.error()`).
    pub fn error(url: impl Into<String>) -> Self {
        Self { response_type: ResponseType::Error, ..Self::new(url, 0, Bytes::new()) }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8000").unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&origin(), "/static/css/style.css").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/static/css/style.css");
    }

    #[test]
    fn test_resolve_absolute_keeps_host() {
        let url = resolve(&origin(), "https://cdn.example.com/a.png").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve(&origin(), "https://EXAMPLE.COM/x").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve(&origin(), "/blog#comments").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/blog");
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve(&origin(), "/api/posts?page=2&tag=rust").unwrap();
        assert_eq!(url.query(), Some("page=2&tag=rust"));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_non_http_does_not_participate() {
        let url = resolve(&origin(), "chrome-extension://abc/script.js").unwrap();
        let request = InterceptedRequest::get(url);
        assert!(!request.participates());
    }

    #[test]
    fn test_post_does_not_participate() {
        let request = InterceptedRequest::parse(&origin(), "/contact").unwrap().with_method("post");
        assert_eq!(request.method, "POST");
        assert!(!request.participates());
    }

    #[test]
    fn test_accepts_html() {
        let request = InterceptedRequest::parse(&origin(), "/")
            .unwrap()
            .with_header("Accept", "text/html,application/xhtml+xml");
        assert!(request.accepts_html());

        let bare = InterceptedRequest::parse(&origin(), "/").unwrap();
        assert!(!bare.accepts_html());
    }

    #[test]
    fn test_response_type_roundtrip_names() {
        for ty in [ResponseType::Basic, ResponseType::Cors, ResponseType::Opaque, ResponseType::Error] {
            assert_eq!(ResponseType::parse(ty.as_str()), Some(ty));
        }
        assert!(!ResponseType::Opaque.is_readable());
        assert!(ResponseType::Cors.is_readable());
    }

    #[test]
    fn test_stored_response_ok_range() {
        assert!(StoredResponse::new("http://x/", 204, "").is_ok());
        assert!(!StoredResponse::new("http://x/", 404, "").is_ok());
        assert!(!StoredResponse::error("http://x/").is_ok());
    }
}
