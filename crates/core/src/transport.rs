//! Seams between pages, the worker and the network.

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::request::{InterceptedRequest, StoredResponse};

/// Anything that can turn a request into a response.
///
/// `Err` means no response was produced at all (offline, DNS failure,
/// connection reset). HTTP error statuses are returned as `Ok` responses.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<StoredResponse, Error>;
}

/// The result of registering a worker script from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Registration {
    pub script_path: String,
    pub scope: String,
    pub cache_version: String,
    pub state: String,
}

/// Page-side view of `navigator.serviceWorker.register`.
#[async_trait::async_trait]
pub trait WorkerRegistrar: Send + Sync {
    async fn register(&self, script_path: &str) -> Result<Registration, Error>;
}
