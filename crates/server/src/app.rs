//! Application bootstrap: owns the worker and builds page-side loaders.
//!
//! Everything the page scripts kept as globals lives here as explicit
//! instances: one cache manager per process, one instrumented network
//! transport beneath it, and a fresh `ResourceLoader` per page.

use std::sync::Arc;

use leumas_client::{Capabilities, FetchConfig, HttpTransport, InstrumentedTransport, LoaderConfig, ResourceLoader};
use leumas_core::{AppConfig, CacheDb, CacheStorage, MemoryCacheStorage, Registration, Transport};
use leumas_worker::{CacheManager, WorkerConfig};

pub struct App {
    config: AppConfig,
    manager: Arc<CacheManager>,
    network: Arc<InstrumentedTransport>,
}

impl App {
    /// Compose the app from an explicit storage backend and network transport.
    pub fn new(config: AppConfig, storage: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        let network = Arc::new(InstrumentedTransport::new(transport, config.max_breadcrumbs));
        let worker_config = WorkerConfig::from_app_config(&config)?;
        let manager = Arc::new(CacheManager::new(worker_config, storage, network.clone()));
        Ok(Self { config, manager, network })
    }

    /// Build the production composition: SQLite storage when `db_path` is
    /// set (memory otherwise) and the reqwest transport.
    pub async fn bootstrap(config: AppConfig) -> anyhow::Result<Self> {
        let storage: Arc<dyn CacheStorage> = match &config.db_path {
            Some(path) => {
                tracing::info!("using cache database {}", path.display());
                Arc::new(CacheDb::open(path).await?)
            }
            None => Arc::new(MemoryCacheStorage::new()),
        };

        let transport = Arc::new(HttpTransport::new(FetchConfig::from_app_config(&config))?);

        Self::new(config, storage, transport)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    pub fn network(&self) -> &Arc<InstrumentedTransport> {
        &self.network
    }

    /// A page-side loader whose fetches go through the worker.
    pub fn loader(&self, capabilities: Capabilities) -> anyhow::Result<ResourceLoader> {
        let config = LoaderConfig::from_app_config(&self.config)?;
        let transport: Arc<dyn Transport> = self.manager.clone();
        Ok(ResourceLoader::new(config, capabilities, transport, Some(self.manager.storage().clone())))
    }

    /// Register the worker the way a page would on load.
    pub async fn start(&self) -> anyhow::Result<Option<Registration>> {
        let loader = self.loader(Capabilities::default())?;
        Ok(loader.register_service_worker(self.manager.as_ref()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leumas_client::{ElementDescriptor, IntersectionEntry, LoadState};
    use leumas_core::InterceptedRequest;
    use leumas_core::testing::MockTransport;
    use leumas_worker::{ControlMessage, ControlReply, WorkerState};
    use url::Url;

    fn mock() -> Arc<MockTransport> {
        let mock = Arc::new(MockTransport::new());
        for path in AppConfig::default().seed_assets {
            mock.route(&format!("http://localhost:8000{path}"), "asset");
        }
        mock
    }

    #[tokio::test]
    async fn test_start_registers_and_activates() {
        let app = App::new(AppConfig::default(), Arc::new(MemoryCacheStorage::new()), mock()).unwrap();
        let registration = app.start().await.unwrap().unwrap();

        assert_eq!(registration.cache_version, "leumas-v1");
        assert_eq!(app.manager().state().await, WorkerState::Activated);
        assert_eq!(
            app.manager().post_message(ControlMessage::GetCacheSize).await.unwrap(),
            Some(ControlReply::CacheSize { size: 10 })
        );
        assert_eq!(app.network().breadcrumbs().await.len(), 10);
    }

    #[tokio::test]
    async fn test_loader_images_flow_through_worker() {
        let mock = mock();
        mock.route("http://localhost:8000/media/hero.png", "png");
        let app = App::new(AppConfig::default(), Arc::new(MemoryCacheStorage::new()), mock.clone()).unwrap();
        app.start().await.unwrap();

        let mut loader = app.loader(Capabilities::default()).unwrap();
        loader.discover(&[ElementDescriptor::new(1, "img")
            .attr("data-lazy", "")
            .attr("data-src", "/media/hero.png")]);
        loader.init_lazy_loading();

        let entry = IntersectionEntry { target: 1, is_intersecting: true, intersection_ratio: 1.0 };
        assert_eq!(loader.on_intersection(&[entry]).await, vec![(1, LoadState::Loaded)]);
        loader.settle().await;

        let size = app.manager().post_message(ControlMessage::GetCacheSize).await.unwrap();
        assert_eq!(size, Some(ControlReply::CacheSize { size: 11 }));

        // the worker stored the image on its first miss
        mock.set_offline(true);
        let request = InterceptedRequest::get(Url::parse("http://localhost:8000/media/hero.png").unwrap());
        assert_eq!(app.manager().fetch(&request).await.unwrap().body_text(), "png");
    }
}
