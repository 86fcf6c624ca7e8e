//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LEUMAS_SW_*)
//! 2. TOML config file (if LEUMAS_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LEUMAS_SW_*)
/// 2. TOML config file (if LEUMAS_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the worker is installed for; seed paths resolve against it.
    ///
    /// Set via LEUMAS_SW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Version tag naming the current cache store.
    ///
    /// Set via LEUMAS_SW_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin-relative paths cached at install time, in order.
    ///
    /// Set via LEUMAS_SW_SEED_ASSETS as a TOML array, e.g. `["/", "/offline.html"]`.
    #[serde(default = "default_seed_assets")]
    pub seed_assets: Vec<String>,

    /// Page served to HTML navigations when cache and network both fail.
    ///
    /// Set via LEUMAS_SW_OFFLINE_PAGE environment variable.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Path pages register the worker script under.
    ///
    /// Set via LEUMAS_SW_SCRIPT_PATH environment variable.
    #[serde(default = "default_script_path")]
    pub script_path: String,

    /// URL fragment marking API responses that are cached on a miss.
    ///
    /// Set via LEUMAS_SW_API_PATH_MARKER environment variable.
    #[serde(default = "default_api_path_marker")]
    pub api_path_marker: String,

    /// Activate straight after install instead of waiting for SKIP_WAITING.
    ///
    /// Set via LEUMAS_SW_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Path to SQLite cache database. In-memory storage when unset.
    ///
    /// Set via LEUMAS_SW_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// User-Agent string for network requests.
    ///
    /// Set via LEUMAS_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via LEUMAS_SW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Transport request timeout in milliseconds.
    ///
    /// Set via LEUMAS_SW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pixels added around the viewport when testing lazy elements for visibility.
    ///
    /// Set via LEUMAS_SW_LAZY_ROOT_MARGIN_PX environment variable.
    #[serde(default = "default_lazy_root_margin_px")]
    pub lazy_root_margin_px: f64,

    /// Fraction of an element that must be visible before it loads.
    ///
    /// Set via LEUMAS_SW_LAZY_THRESHOLD environment variable.
    #[serde(default = "default_lazy_threshold")]
    pub lazy_threshold: f64,

    /// Maximum fetch breadcrumbs kept by the instrumented transport.
    ///
    /// Set via LEUMAS_SW_MAX_BREADCRUMBS environment variable.
    #[serde(default = "default_max_breadcrumbs")]
    pub max_breadcrumbs: usize,
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_cache_version() -> String {
    "leumas-v1".into()
}

fn default_seed_assets() -> Vec<String> {
    [
        "/",
        "/static/css/style.css",
        "/static/css/bootstrap.min.css",
        "/static/css/plugin.css",
        "/static/css/flaticon.css",
        "/static/js/jquery.js",
        "/static/js/bootstrap.min.js",
        "/static/js/main.js",
        "/static/js/performance-optimization.js",
        "/offline.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_script_path() -> String {
    "/static/js/service-worker.js".into()
}

fn default_api_path_marker() -> String {
    "/api/".into()
}

fn default_user_agent() -> String {
    "leumas-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_lazy_root_margin_px() -> f64 {
    50.0
}

fn default_lazy_threshold() -> f64 {
    0.01
}

fn default_max_breadcrumbs() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_version: default_cache_version(),
            seed_assets: default_seed_assets(),
            offline_page: default_offline_page(),
            script_path: default_script_path(),
            api_path_marker: default_api_path_marker(),
            skip_waiting: true,
            db_path: None,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            lazy_root_margin_px: default_lazy_root_margin_px(),
            lazy_threshold: default_lazy_threshold(),
            max_breadcrumbs: default_max_breadcrumbs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LEUMAS_SW_`
    /// 2. TOML file from `LEUMAS_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LEUMAS_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LEUMAS_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "http://localhost:8000");
        assert_eq!(config.cache_version, "leumas-v1");
        assert_eq!(config.seed_assets.len(), 10);
        assert_eq!(config.seed_assets.first().map(String::as_str), Some("/"));
        assert_eq!(config.seed_assets.last().map(String::as_str), Some("/offline.html"));
        assert_eq!(config.offline_page, "/offline.html");
        assert_eq!(config.script_path, "/static/js/service-worker.js");
        assert_eq!(config.api_path_marker, "/api/");
        assert!(config.skip_waiting);
        assert!(config.db_path.is_none());
        assert_eq!(config.max_breadcrumbs, 100);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:8000/");

        let bad = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(bad.origin_url(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_layers_env_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "sw.toml",
                r#"
                cache_version = "leumas-v2"
                skip_waiting = false
                "#,
            )?;
            jail.set_env("LEUMAS_SW_CONFIG_FILE", "sw.toml");
            jail.set_env("LEUMAS_SW_SKIP_WAITING", "true");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, "leumas-v2");
            assert!(config.skip_waiting);
            assert_eq!(config.offline_page, "/offline.html");
            Ok(())
        });
    }
}
