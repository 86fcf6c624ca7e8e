//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_version` or `user_agent` is empty
    /// - a seed asset, `offline_page` or `script_path` is not origin-relative
    /// - `offline_page` is not among the seed assets
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `lazy_threshold` is outside 0..=1 or `lazy_root_margin_px` is negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set LEUMAS_SW_CACHE_VERSION environment variable".into(),
            });
        }

        if let Some(asset) = self.seed_assets.iter().find(|a| !a.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "seed_assets".into(),
                reason: format!("{asset} must be an origin-relative path"),
            });
        }

        if !self.offline_page.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "offline_page".into(),
                reason: "must be an origin-relative path".into(),
            });
        }
        if !self.seed_assets.contains(&self.offline_page) {
            return Err(ConfigError::Invalid {
                field: "offline_page".into(),
                reason: "must be listed in seed_assets so it is cached at install".into(),
            });
        }

        if !self.script_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "script_path".into(),
                reason: "must be an origin-relative path".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !(0.0..=1.0).contains(&self.lazy_threshold) {
            return Err(ConfigError::Invalid { field: "lazy_threshold".into(), reason: "must be within 0..=1".into() });
        }
        if self.lazy_root_margin_px < 0.0 {
            return Err(ConfigError::Invalid {
                field: "lazy_root_margin_px".into(),
                reason: "must not be negative".into(),
            });
        }

        if self.api_path_marker.is_empty() {
            tracing::warn!("api_path_marker is empty; every successful GET miss will be cached");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_empty_cache_version() {
        let config = AppConfig { cache_version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "cache_version"));
    }

    #[test]
    fn test_validate_relative_seed_asset() {
        let mut config = AppConfig::default();
        config.seed_assets.push("static/app.js".into());
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "seed_assets"));
    }

    #[test]
    fn test_validate_offline_page_not_seeded() {
        let config = AppConfig { offline_page: "/offline-v2.html".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "offline_page"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let config = AppConfig { lazy_threshold: 1.5, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "lazy_threshold"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, lazy_threshold: 0.0, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
