//! Worker settings derived from the application config.

use url::Url;

use leumas_core::{AppConfig, ConfigError, Error, RequestKey};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    /// Name of the current cache store; every other store is stale.
    pub cache_version: String,
    /// Origin-relative paths cached at install, in order.
    pub seed_assets: Vec<String>,
    pub offline_page: String,
    pub script_path: String,
    /// Substring marking API responses worth caching on a miss.
    pub api_marker: String,
    pub skip_waiting: bool,
}

impl WorkerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: config.origin_url()?,
            cache_version: config.cache_version.clone(),
            seed_assets: config.seed_assets.clone(),
            offline_page: config.offline_page.clone(),
            script_path: config.script_path.clone(),
            api_marker: config.api_path_marker.clone(),
            skip_waiting: config.skip_waiting,
        })
    }

    pub fn resolve(&self, path: &str) -> Result<Url, Error> {
        self.origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    /// Cache key of the offline fallback page.
    pub fn offline_key(&self) -> Result<RequestKey, Error> {
        Ok(RequestKey::get(&self.resolve(&self.offline_page)?))
    }

    /// Registration scope: the directory holding the worker script.
    pub fn scope(&self) -> Result<Url, Error> {
        let script = self.resolve(&self.script_path)?;
        script
            .join("./")
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.script_path)))
    }
}
