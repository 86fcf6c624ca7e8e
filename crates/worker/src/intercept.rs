//! Fetch interception.
//!
//! ### Strategy
//! - Participating requests (GET over http(s), worker activated) look in
//!   the current store first
//! - Hit: answer from cache and refresh the entry in the background
//! - Miss: fetch, keep a copy of successful image and API responses
//! - Network failure: any store's copy, then the offline page for HTML
//!   requests, then nothing
//!
//! Storage errors never fail a fetch: reads degrade to a miss and writes are
//! logged and dropped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use leumas_core::{CacheStorage, Destination, Error, InterceptedRequest, StoredResponse, Transport};

use crate::manager::CacheManager;
use crate::state::WorkerState;

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to the network untouched.
    Passthrough,
    /// Cache first, network second.
    CacheFirst,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Cache,
    Network,
    OfflinePage,
    Passthrough,
    Unavailable,
}

/// Result of intercepting one request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Option<StoredResponse>,
    pub source: FetchSource,
    /// Background refresh started on a cache hit.
    pub refresh: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    fn new(response: Option<StoredResponse>, source: FetchSource) -> Self {
        Self { response, source, refresh: None }
    }

    fn unavailable() -> Self {
        Self::new(None, FetchSource::Unavailable)
    }

    /// Wait for the background refresh, if any, to finish.
    pub async fn settle(&mut self) {
        if let Some(task) = self.refresh.take()
            && let Err(e) = task.await
        {
            tracing::debug!("background refresh task failed: {}", e);
        }
    }
}

pub fn route(request: &InterceptedRequest, state: WorkerState) -> Route {
    if state.can_intercept_fetch() && request.participates() {
        Route::CacheFirst
    } else {
        Route::Passthrough
    }
}

/// Whether a network response to a missed request should be kept.
pub fn should_store(request: &InterceptedRequest, response: &StoredResponse, api_marker: &str) -> bool {
    if response.status != 200 || !response.response_type.is_readable() {
        return false;
    }
    request.destination == Destination::Image || (!api_marker.is_empty() && request.url.as_str().contains(api_marker))
}

/// Whether a background refresh response should replace the cached entry.
pub fn should_refresh(response: &StoredResponse) -> bool {
    response.is_ok()
}

/// Whether a failed request may be answered with the offline page.
pub fn offline_fallback_applies(request: &InterceptedRequest) -> bool {
    request.accepts_html()
}

impl CacheManager {
    /// Intercept one request. Never fails; see `FetchOutcome::source`.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> FetchOutcome {
        let state = self.state().await;
        match route(request, state) {
            Route::Passthrough => self.passthrough(request).await,
            Route::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> FetchOutcome {
        match self.transport.fetch(request).await {
            Ok(response) => FetchOutcome::new(Some(response), FetchSource::Passthrough),
            Err(e) => {
                tracing::debug!("passthrough {} {} failed: {}", request.method, request.url, e);
                FetchOutcome::unavailable()
            }
        }
    }

    async fn cache_first(&self, request: &InterceptedRequest) -> FetchOutcome {
        let key = request.key();
        let cache_name = &self.config.cache_version;

        let cached = match self.storage.match_request(cache_name, &key).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("cache lookup for {} failed: {}", key, e);
                None
            }
        };

        if let Some(response) = cached {
            tracing::debug!("cache hit {}", key);
            let refresh = self.spawn_refresh(request.clone());
            return FetchOutcome { response: Some(response), source: FetchSource::Cache, refresh: Some(refresh) };
        }

        match self.transport.fetch(request).await {
            Ok(response) => {
                if should_store(request, &response, &self.config.api_marker)
                    && let Err(e) = self.storage.put(cache_name, &key, &response).await
                {
                    tracing::warn!("failed to cache {}: {}", key, e);
                }
                FetchOutcome::new(Some(response), FetchSource::Network)
            }
            Err(e) => {
                tracing::debug!("network failed for {}: {}", key, e);
                self.fallback(request).await
            }
        }
    }

    async fn fallback(&self, request: &InterceptedRequest) -> FetchOutcome {
        match self.storage.match_any(&request.key()).await {
            Ok(Some(response)) => return FetchOutcome::new(Some(response), FetchSource::Cache),
            Ok(None) => {}
            Err(e) => tracing::warn!("fallback lookup for {} failed: {}", request.url, e),
        }

        if !offline_fallback_applies(request) {
            return FetchOutcome::unavailable();
        }

        let offline = match self.config.offline_key() {
            Ok(key) => self.storage.match_request(&self.config.cache_version, &key).await,
            Err(e) => Err(e),
        };
        match offline {
            Ok(Some(page)) => FetchOutcome::new(Some(page), FetchSource::OfflinePage),
            Ok(None) => {
                tracing::warn!("offline page {} is not cached", self.config.offline_page);
                FetchOutcome::unavailable()
            }
            Err(e) => {
                tracing::warn!("offline page lookup failed: {}", e);
                FetchOutcome::unavailable()
            }
        }
    }

    fn spawn_refresh(&self, request: InterceptedRequest) -> JoinHandle<()> {
        let storage = self.storage.clone();
        let transport = self.transport.clone();
        let cache_name = self.config.cache_version.clone();
        tokio::spawn(async move {
            if let Err(e) = refresh(storage, transport, &cache_name, &request).await {
                tracing::debug!("background refresh of {} failed: {}", request.url, e);
            }
        })
    }
}

async fn refresh(
    storage: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>, cache_name: &str, request: &InterceptedRequest,
) -> Result<(), Error> {
    let response = transport.fetch(request).await?;
    if !should_refresh(&response) {
        return Ok(());
    }
    // a store cleared while the fetch was in flight stays cleared
    if !storage.has(cache_name).await? {
        tracing::debug!("{} was deleted, dropping refresh of {}", cache_name, request.url);
        return Ok(());
    }
    storage.put(cache_name, &request.key(), &response).await
}
