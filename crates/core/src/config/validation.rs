//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::WorkerConfig;
use crate::partition::CacheRole;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_patterns(field: &str, patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        regex::Regex::new(pattern).map_err(|e| invalid(field, format!("bad pattern {pattern:?}: {e}")))?;
    }
    Ok(())
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `generation` or `prefix` is empty
    /// - `scope` is not an absolute http(s) URL
    /// - a precache entry is empty
    /// - `same_origin_partition` is neither shell nor runtime
    /// - `media_ceiling` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - a routing pattern does not compile
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.trim().is_empty() {
            return Err(invalid("generation", "must not be empty"));
        }
        if self.prefix.trim().is_empty() {
            return Err(invalid("prefix", "must not be empty"));
        }

        let scope = self.scope_url()?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(invalid("scope", format!("unsupported scheme: {}", scope.scheme())));
        }

        if self.precache.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("precache", "entries must not be empty"));
        }
        if self.shell_document.trim().is_empty() {
            return Err(invalid("shell_document", "must not be empty"));
        }

        if !matches!(self.same_origin_partition, CacheRole::Shell | CacheRole::Runtime) {
            return Err(invalid("same_origin_partition", "must be shell or runtime"));
        }

        if self.media_ceiling == 0 {
            return Err(invalid("media_ceiling", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        check_patterns("always_online", &self.always_online)?;
        check_patterns("font_hosts", &self.font_hosts)?;
        check_patterns("media_hosts", &self.media_hosts)?;

        if self.image_extensions.iter().any(|ext| ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric())) {
            return Err(invalid("image_extensions", "must be non-empty alphanumeric extensions without a dot"));
        }

        if self.enforce_max_age && self.media_max_age_secs == 0 {
            tracing::warn!("enforce_max_age is set with media_max_age_secs = 0; every media hit will revalidate");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_generation() {
        let config = WorkerConfig { generation: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "generation"));
    }

    #[test]
    fn test_validate_relative_scope() {
        let config = WorkerConfig { scope: "/app/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "scope"));
    }

    #[test]
    fn test_validate_non_http_scope() {
        let config = WorkerConfig { scope: "file:///srv/app/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "scope"));
    }

    #[test]
    fn test_validate_same_origin_partition() {
        let config = WorkerConfig { same_origin_partition: CacheRole::Media, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "same_origin_partition"));

        let config = WorkerConfig { same_origin_partition: CacheRole::Runtime, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_ceiling() {
        let config = WorkerConfig { media_ceiling: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "media_ceiling"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = WorkerConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = WorkerConfig { timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = WorkerConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let config = WorkerConfig { font_hosts: vec!["fonts\\.(".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "font_hosts"));
    }

    #[test]
    fn test_validate_image_extension_with_dot() {
        let config = WorkerConfig { image_extensions: vec![".png".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "image_extensions"));
    }
}
