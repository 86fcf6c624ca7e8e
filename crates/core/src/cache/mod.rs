//! Named, versioned cache stores for request/response snapshots.
//!
//! This module mirrors the browser Cache Storage API as an async trait so
//! the worker can run against either backend:
//!
//! - `MemoryCacheStorage` keeps stores in process memory
//! - `CacheDb` persists stores in SQLite via tokio-rusqlite (WAL mode,
//!   automatic schema migrations)
//!
//! Entries are keyed by `RequestKey` (method + canonical URL). Writes to
//! the same key are last-write-wins.

pub mod connection;
pub mod entries;
pub mod key;
pub mod memory;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use key::RequestKey;
pub use memory::MemoryCacheStorage;

use crate::request::StoredResponse;

/// Cache Storage: a set of named stores, each mapping requests to responses.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it doesn't exist.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Whether a store with this name exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Delete a store and all of its entries. Returns false if it didn't exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Names of all stores, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Look up a request in one store.
    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error>;

    /// Store a response, creating the store if needed. Overwrites any existing entry.
    async fn put(&self, name: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error>;

    /// Remove one entry. Returns false if it wasn't present.
    async fn remove(&self, name: &str, key: &RequestKey) -> Result<bool, Error>;

    /// Request keys held by a store. A missing store has no keys.
    async fn entry_keys(&self, name: &str) -> Result<Vec<RequestKey>, Error>;

    /// Number of entries in a store.
    async fn entry_count(&self, name: &str) -> Result<usize, Error> {
        Ok(self.entry_keys(name).await?.len())
    }

    /// Look up a request across every store, oldest store first (`caches.match`).
    async fn match_any(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        for name in self.keys().await? {
            if let Some(response) = self.match_request(&name, key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
