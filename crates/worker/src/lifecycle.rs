//! Install and activate.

use std::sync::atomic::Ordering;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use leumas_core::{Error, InterceptedRequest};

use crate::manager::CacheManager;
use crate::state::WorkerState;

/// Seed assets that made it into the store and those that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    /// Stale stores removed.
    pub deleted: Vec<String>,
    pub claimed: bool,
}

impl CacheManager {
    /// Seed the current store. Individual assets that fail are skipped.
    ///
    /// Activation follows immediately when `skip_waiting` is set or a page
    /// posted SKIP_WAITING during install; otherwise the worker waits in
    /// `Installed`. A failed activation leaves the worker installed and is
    /// not an install failure.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;

        let state = self.state().await;
        if !state.can_install() {
            return Err(Error::InvalidState(format!("cannot install while {state}")));
        }
        self.set_state(WorkerState::Installing).await;

        let report = match self.seed().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("install failed: {}", e);
                self.set_state(WorkerState::Redundant).await;
                return Err(e);
            }
        };
        tracing::info!(
            "installed {}: {} assets cached, {} skipped",
            self.config.cache_version,
            report.cached.len(),
            report.skipped.len()
        );
        self.set_state(WorkerState::Installed).await;

        if (self.config.skip_waiting || self.skip_requested.load(Ordering::SeqCst))
            && let Err(e) = self.run_activate().await
        {
            tracing::warn!("activation after install failed, waiting for SKIP_WAITING: {}", e);
        }
        Ok(report)
    }

    /// Activate a waiting worker.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.lifecycle.lock().await;
        self.run_activate().await
    }

    pub(crate) async fn run_activate(&self) -> Result<ActivateReport, Error> {
        let state = self.state().await;
        if !state.is_waiting() {
            return Err(Error::InvalidState(format!("cannot activate while {state}")));
        }
        self.set_state(WorkerState::Activating).await;

        let deleted = match self.purge_stale().await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!("activate failed: {}", e);
                self.set_state(WorkerState::Installed).await;
                return Err(e);
            }
        };
        self.claim_clients().await;
        self.skip_requested.store(false, Ordering::SeqCst);
        self.set_state(WorkerState::Activated).await;

        Ok(ActivateReport { deleted, claimed: true })
    }

    async fn seed(&self) -> Result<InstallReport, Error> {
        let cache_name = &self.config.cache_version;
        self.storage.open(cache_name).await?;

        let fetches = self.config.seed_assets.iter().map(|path| async move {
            let request = InterceptedRequest::get(self.config.resolve(path)?);
            let response = self.transport.fetch(&request).await?;
            if !response.is_ok() {
                return Err(Error::Network(format!("HTTP {}", response.status)));
            }
            Ok::<_, Error>((request, response))
        });
        let results = join_all(fetches).await;

        let mut report = InstallReport::default();
        for (path, result) in self.config.seed_assets.iter().zip(results) {
            let stored = match result {
                Ok((request, response)) => self.storage.put(cache_name, &request.key(), &response).await,
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => report.cached.push(path.clone()),
                Err(e) => {
                    tracing::warn!("failed to cache {}: {}", path, e);
                    report.skipped.push(path.clone());
                }
            }
        }
        Ok(report)
    }

    async fn purge_stale(&self) -> Result<Vec<String>, Error> {
        let current = &self.config.cache_version;
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let deletions = stale.iter().map(|name| async move {
            tracing::info!("deleting old cache {}", name);
            (name, self.storage.delete(name).await)
        });

        let mut deleted = Vec::new();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(_) => deleted.push(name.clone()),
                Err(e) => tracing::warn!("failed to delete cache {}: {}", name, e),
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::WorkerConfig;
    use leumas_core::testing::MockTransport;
    use leumas_core::{AppConfig, CacheStorage, MemoryCacheStorage, StoredResponse};

    fn config(skip_waiting: bool) -> WorkerConfig {
        let mut config = WorkerConfig::from_app_config(&AppConfig::default()).unwrap();
        config.seed_assets = vec!["/".into(), "/static/css/style.css".into(), "/offline.html".into()];
        config.skip_waiting = skip_waiting;
        config
    }

    fn routed() -> Arc<MockTransport> {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/", "home");
        mock.route("http://localhost:8000/static/css/style.css", "body{}");
        mock.route("http://localhost:8000/offline.html", "offline");
        mock
    }

    #[tokio::test]
    async fn test_install_caches_seed_assets_in_order() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let manager = CacheManager::new(config(false), storage.clone(), routed());

        let report = manager.install().await.unwrap();
        assert_eq!(report.cached, vec!["/", "/static/css/style.css", "/offline.html"]);
        assert!(report.skipped.is_empty());
        assert_eq!(manager.state().await, WorkerState::Installed);
        assert_eq!(storage.entry_count("leumas-v1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_install_skips_failed_assets() {
        let mock = routed();
        mock.fail("http://localhost:8000/static/css/style.css");
        mock.respond("http://localhost:8000/offline.html", StoredResponse::new("/offline.html", 500, "oops"));
        let manager = CacheManager::new(config(true), Arc::new(MemoryCacheStorage::new()), mock);

        let report = manager.install().await.unwrap();
        assert_eq!(report.cached, vec!["/"]);
        assert_eq!(report.skipped, vec!["/static/css/style.css", "/offline.html"]);
        assert_eq!(manager.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_versions() {
        let storage = Arc::new(MemoryCacheStorage::new());
        storage.open("v1").await.unwrap();
        storage.open("v2").await.unwrap();

        let mut config = config(false);
        config.cache_version = "v2".into();
        let manager = CacheManager::new(config, storage.clone(), routed());
        manager.install().await.unwrap();

        let report = manager.activate().await.unwrap();
        assert_eq!(report.deleted, vec!["v1"]);
        assert!(report.claimed);
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
        assert_eq!(manager.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activate_requires_waiting_worker() {
        let manager = CacheManager::new(config(false), Arc::new(MemoryCacheStorage::new()), routed());
        assert!(matches!(manager.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(manager.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let manager = CacheManager::new(config(true), Arc::new(MemoryCacheStorage::new()), routed());
        manager.install().await.unwrap();
        assert!(matches!(manager.install().await, Err(Error::InvalidState(_))));
    }
}
