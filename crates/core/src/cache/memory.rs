//! In-process cache storage.
//!
//! Uses a tokio RwLock over an ordered list of stores so store names come
//! back in creation order, like `caches.keys()`.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{CacheStorage, RequestKey};
use crate::Error;
use crate::request::StoredResponse;

#[derive(Debug, Default)]
struct NamedStore {
    name: String,
    entries: HashMap<RequestKey, StoredResponse>,
}

/// Cache storage held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    stores: RwLock<Vec<NamedStore>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        if !stores.iter().any(|s| s.name == name) {
            stores.push(NamedStore { name: name.to_string(), entries: HashMap::new() });
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.read().await.iter().any(|s| s.name == name))
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name != name);
        Ok(stores.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|s| s.name.clone()).collect())
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.entries.get(key))
            .cloned())
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        match stores.iter_mut().find(|s| s.name == name) {
            Some(store) => {
                store.entries.insert(key.clone(), response.clone());
            }
            None => {
                let mut entries = HashMap::new();
                entries.insert(key.clone(), response.clone());
                stores.push(NamedStore { name: name.to_string(), entries });
            }
        }
        Ok(())
    }

    async fn remove(&self, name: &str, key: &RequestKey) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        Ok(stores
            .iter_mut()
            .find(|s| s.name == name)
            .is_some_and(|s| s.entries.remove(key).is_some()))
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let stores = self.stores.read().await;
        let mut keys: Vec<RequestKey> = stores
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("http://localhost:8000").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let storage = MemoryCacheStorage::new();
        let response = StoredResponse::new("http://localhost:8000/a.png", 200, "png");
        storage.put("leumas-v1", &key("/a.png"), &response).await.unwrap();

        let found = storage.match_request("leumas-v1", &key("/a.png")).await.unwrap();
        assert_eq!(found, Some(response));
        assert!(storage.match_request("other", &key("/a.png")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage.open("v2").await.unwrap();
        storage.open("v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn test_delete_store() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("v1", &key("/"), &StoredResponse::new("http://localhost:8000/", 200, "home"))
            .await
            .unwrap();
        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert_eq!(storage.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("v1", &key("/api/x"), &StoredResponse::new("http://localhost:8000/api/x", 200, "old"))
            .await
            .unwrap();
        storage
            .put("v1", &key("/api/x"), &StoredResponse::new("http://localhost:8000/api/x", 200, "new"))
            .await
            .unwrap();

        let found = storage.match_request("v1", &key("/api/x")).await.unwrap().unwrap();
        assert_eq!(found.body_text(), "new");
        assert_eq!(storage.entry_count("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_match_any_searches_all_stores() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage
            .put("image-cache", &key("/b.png"), &StoredResponse::new("http://localhost:8000/b.png", 200, "b"))
            .await
            .unwrap();

        assert!(storage.match_any(&key("/b.png")).await.unwrap().is_some());
        assert!(storage.match_any(&key("/c.png")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("v1", &key("/x"), &StoredResponse::new("http://localhost:8000/x", 200, "x"))
            .await
            .unwrap();
        assert!(storage.remove("v1", &key("/x")).await.unwrap());
        assert!(!storage.remove("v1", &key("/x")).await.unwrap());
    }
}
