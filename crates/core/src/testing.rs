//! Test doubles: a scripted transport for exercising fetch paths without a
//! network, and a cache storage whose operations can be made to fail.
//!
//! Enabled for dependents through the `test-util` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::Error;
use crate::cache::{CacheStorage, MemoryCacheStorage, RequestKey};
use crate::request::{InterceptedRequest, StoredResponse};
use crate::transport::Transport;

/// A transport that answers from a table of canned responses.
///
/// - Unknown URLs answer 404.
/// - `set_offline(true)` makes every fetch fail with a network error.
/// - `hold()` parks fetches until `release()`, for controlling completion order.
pub struct MockTransport {
    routes: Mutex<HashMap<String, StoredResponse>>,
    failing: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, String)>>,
    offline: AtomicBool,
    gate: watch::Sender<bool>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            gate,
        }
    }

    /// Answer `url` with a 200 response carrying `body`.
    pub fn route(&self, url: &str, body: &str) -> &Self {
        self.respond(url, StoredResponse::new(url, 200, body.to_string()))
    }

    /// Answer `url` with an arbitrary response.
    pub fn respond(&self, url: &str, response: StoredResponse) -> &Self {
        lock(&self.routes).insert(url.to_string(), response);
        self
    }

    /// Make fetches of `url` fail with a network error.
    pub fn fail(&self, url: &str) -> &Self {
        lock(&self.failing).push(url.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Every (method, url) fetched so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|(_, u)| u == url).count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<StoredResponse, Error> {
        let url = request.url.to_string();
        lock(&self.calls).push((request.method.clone(), url.clone()));

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if self.offline.load(Ordering::SeqCst) || lock(&self.failing).contains(&url) {
            return Err(Error::Network(format!("failed to fetch {url}")));
        }

        let response = lock(&self.routes)
            .get(&url)
            .cloned()
            .unwrap_or_else(|| StoredResponse::new(url.clone(), 404, "not found"));

        if request.method == "HEAD" {
            return Ok(StoredResponse { body: bytes::Bytes::new(), ..response });
        }
        Ok(response)
    }
}

/// A `CacheStorage` operation that `FlakyStorage` can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Open,
    Has,
    Delete,
    Keys,
    Match,
    Put,
    Remove,
    EntryKeys,
}

/// In-memory cache storage with switchable failures.
///
/// Operations marked with `fail` return a database error until `recover`
/// is called; everything else goes to a `MemoryCacheStorage`.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryCacheStorage,
    failing: Mutex<HashSet<StorageOp>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: StorageOp) -> &Self {
        lock(&self.failing).insert(op);
        self
    }

    pub fn recover(&self, op: StorageOp) -> &Self {
        lock(&self.failing).remove(&op);
        self
    }

    fn check(&self, op: StorageOp) -> Result<(), Error> {
        if lock(&self.failing).contains(&op) {
            return Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.check(StorageOp::Open)?;
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.check(StorageOp::Has)?;
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.check(StorageOp::Delete)?;
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.check(StorageOp::Keys)?;
        self.inner.keys().await
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.check(StorageOp::Match)?;
        self.inner.match_request(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        self.check(StorageOp::Put)?;
        self.inner.put(name, key, response).await
    }

    async fn remove(&self, name: &str, key: &RequestKey) -> Result<bool, Error> {
        self.check(StorageOp::Remove)?;
        self.inner.remove(name, key).await
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.check(StorageOp::EntryKeys)?;
        self.inner.entry_keys(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_routes_and_404() {
        let mock = MockTransport::new();
        mock.route("http://localhost:8000/", "home");

        let hit = mock.fetch(&get("http://localhost:8000/")).await.unwrap();
        assert_eq!(hit.body_text(), "home");

        let miss = mock.fetch(&get("http://localhost:8000/missing")).await.unwrap();
        assert_eq!(miss.status, 404);
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_offline() {
        let mock = MockTransport::new();
        mock.route("http://localhost:8000/", "home");
        mock.set_offline(true);
        assert!(matches!(mock.fetch(&get("http://localhost:8000/")).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_hold_and_release() {
        let mock = std::sync::Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/", "home");
        mock.hold();

        let task = {
            let mock = mock.clone();
            tokio::spawn(async move { mock.fetch(&get("http://localhost:8000/")).await })
        };
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        mock.release();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_flaky_storage_fails_until_recovered() {
        let storage = FlakyStorage::new();
        let key = RequestKey::get(&Url::parse("http://localhost:8000/").unwrap());
        storage.put("v1", &key, &StoredResponse::new("/", 200, "home")).await.unwrap();

        storage.fail(StorageOp::Match);
        assert!(matches!(storage.match_request("v1", &key).await, Err(Error::Database(_))));
        assert!(storage.match_any(&key).await.is_err());
        assert_eq!(storage.entry_count("v1").await.unwrap(), 1);

        storage.recover(StorageOp::Match);
        assert!(storage.match_request("v1", &key).await.unwrap().is_some());
    }
}
