//! sw_fetch tool implementation.
//!
//! Sends a request through the worker's fetch interception and reports where
//! the response came from.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, json_result};
use leumas_client::fetch::navigation_accept;
use leumas_core::{Destination, InterceptedRequest};
use leumas_worker::{CacheManager, FetchSource};

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to fetch; relative paths resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Accept header, e.g. "text/html" for navigations.
    #[serde(default)]
    pub accept: Option<String>,

    /// Request destination (image, document, script, ...).
    #[serde(default)]
    pub destination: Option<Destination>,
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub source: FetchSource,
    pub status: Option<u16>,
    pub response_type: Option<String>,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: Option<String>,
    pub body_bytes: usize,
}

pub async fn fetch_impl(manager: &CacheManager, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let mut request = InterceptedRequest::parse(&manager.config().origin, &params.url)?;

    if let Some(method) = params.method.as_deref() {
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ToolError::InvalidInput(format!("invalid method: {method:?}")).into());
        }
        request = request.with_method(method);
    }
    match params.accept.as_deref() {
        Some(accept) => request = request.with_header("accept", accept),
        None if params.destination == Some(Destination::Document) => {
            let (name, value) = navigation_accept();
            request = request.with_header(name, value);
        }
        None => {}
    }
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }

    let outcome = manager.handle_fetch(&request).await;
    let response = outcome.response.as_ref();
    let output = SwFetchOutput {
        url: request.url.to_string(),
        source: outcome.source,
        status: response.map(|r| r.status),
        response_type: response.map(|r| r.response_type.as_str().to_string()),
        content_type: response.and_then(|r| r.content_type()).map(String::from),
        body: response.map(|r| r.body_text()),
        body_bytes: response.map_or(0, |r| r.body.len()),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use leumas_core::testing::MockTransport;
    use leumas_core::{AppConfig, MemoryCacheStorage};
    use leumas_worker::WorkerConfig;

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: None, accept: None, destination: None }
    }

    fn output(result: CallToolResult) -> serde_json::Value {
        let text = result.content[0].as_text().unwrap().text.clone();
        serde_json::from_str(&text).unwrap()
    }

    async fn manager(mock: Arc<MockTransport>) -> CacheManager {
        let mut config = WorkerConfig::from_app_config(&AppConfig::default()).unwrap();
        config.seed_assets = vec!["/".into(), "/offline.html".into()];
        let manager = CacheManager::new(config, Arc::new(MemoryCacheStorage::new()), mock);
        manager.install().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_fetch_from_cache() {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/", "home");
        mock.route("http://localhost:8000/offline.html", "offline");
        let manager = manager(mock).await;

        let json = output(fetch_impl(&manager, params("/")).await.unwrap());
        assert_eq!(json["source"], "cache");
        assert_eq!(json["status"], 200);
        assert_eq!(json["body"], "home");
    }

    #[tokio::test]
    async fn test_offline_navigation() {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/", "home");
        mock.route("http://localhost:8000/offline.html", "offline");
        let manager = manager(mock.clone()).await;
        mock.set_offline(true);

        let mut p = params("/portfolio/");
        p.accept = Some("text/html".into());
        let json = output(fetch_impl(&manager, p).await.unwrap());
        assert_eq!(json["source"], "offline_page");
        assert_eq!(json["body"], "offline");

        let mut p = params("/about/");
        p.destination = Some(Destination::Document);
        let json = output(fetch_impl(&manager, p).await.unwrap());
        assert_eq!(json["source"], "offline_page");

        let json = output(fetch_impl(&manager, params("/api/posts")).await.unwrap());
        assert_eq!(json["source"], "unavailable");
        assert!(json["status"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let manager = manager(Arc::new(MockTransport::new())).await;
        assert!(fetch_impl(&manager, params("")).await.is_err());

        let mut p = params("/");
        p.method = Some("GE T".into());
        let err = fetch_impl(&manager, p).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
