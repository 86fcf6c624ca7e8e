//! On-demand JSON module loading with a name-keyed memo cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use leumas_core::{Error, InterceptedRequest, Transport};

/// Request counters for module loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RequestCounters {
    pub pending: usize,
    pub completed: usize,
}

pub struct ModuleCache {
    transport: Arc<dyn Transport>,
    origin: Url,
    modules: HashMap<String, Value>,
    counters: RequestCounters,
}

impl ModuleCache {
    pub fn new(transport: Arc<dyn Transport>, origin: Url) -> Self {
        Self { transport, origin, modules: HashMap::new(), counters: RequestCounters::default() }
    }

    pub fn counters(&self) -> RequestCounters {
        self.counters
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Load the module at `path` under `name`, reusing a previous load.
    ///
    /// Failures are logged and yield `None`; they are not memoized.
    pub async fn load(&mut self, path: &str, name: &str) -> Option<Value> {
        if let Some(module) = self.modules.get(name) {
            return Some(module.clone());
        }

        self.counters.pending += 1;
        let result = self.fetch_json(path).await;
        self.counters.pending -= 1;

        match result {
            Ok(module) => {
                self.counters.completed += 1;
                self.modules.insert(name.to_string(), module.clone());
                Some(module)
            }
            Err(e) => {
                tracing::error!("failed to load module {}: {}", name, e);
                None
            }
        }
    }

    async fn fetch_json(&self, path: &str) -> Result<Value, Error> {
        let request = InterceptedRequest::parse(&self.origin, path)?.with_header("accept", "application/json");
        let response = self.transport.fetch(&request).await?;
        if !response.is_ok() {
            return Err(Error::Network(format!("HTTP {}", response.status)));
        }
        serde_json::from_slice(&response.body).map_err(|e| Error::InvalidInput(format!("invalid module JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leumas_core::testing::MockTransport;

    fn origin() -> Url {
        Url::parse("http://localhost:8000").unwrap()
    }

    #[tokio::test]
    async fn test_load_is_memoized() {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/static/modules/search.json", r#"{"fields":["title","tags"]}"#);
        let mut cache = ModuleCache::new(mock.clone(), origin());

        let first = cache.load("/static/modules/search.json", "search").await.unwrap();
        let second = cache.load("/static/modules/search.json", "search").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first["fields"][0], "title");
        assert_eq!(mock.call_count("http://localhost:8000/static/modules/search.json"), 1);
        assert_eq!(cache.counters(), RequestCounters { pending: 0, completed: 1 });
    }

    #[tokio::test]
    async fn test_http_error_yields_none() {
        let mock = Arc::new(MockTransport::new());
        let mut cache = ModuleCache::new(mock, origin());

        assert!(cache.load("/static/modules/missing.json", "missing").await.is_none());
        assert!(!cache.is_loaded("missing"));
        assert_eq!(cache.counters(), RequestCounters { pending: 0, completed: 0 });
    }

    #[tokio::test]
    async fn test_invalid_json_yields_none() {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/broken.json", "{not json");
        let mut cache = ModuleCache::new(mock, origin());
        assert!(cache.load("/broken.json", "broken").await.is_none());
    }
}
