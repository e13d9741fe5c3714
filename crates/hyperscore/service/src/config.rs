//! Configuration for the Hyperscore service

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Storage call bounds
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rule listing cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Behaviour when the store is unavailable
    #[serde(default)]
    pub degraded: DegradedConfig,

    /// Bootstrap data
    #[serde(default)]
    pub seed: SeedConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Rule cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a rule snapshot in seconds
    #[serde(default = "default_rule_ttl")]
    pub rule_ttl_secs: u64,

    /// Drop the snapshot on every rule write instead of waiting for expiry
    #[serde(default)]
    pub invalidate_on_write: bool,
}

impl CacheConfig {
    pub fn rule_ttl(&self) -> Duration {
        Duration::from_secs(self.rule_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rule_ttl_secs: default_rule_ttl(),
            invalidate_on_write: false,
        }
    }
}

/// Degraded-mode configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DegradedConfig {
    /// Serve the last good snapshot when a store read fails
    #[serde(default)]
    pub serve_stale: bool,
}

/// Seed data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Load the bundled catalog into empty collections
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Create the demo hypergraph and its schemes when none exists
    #[serde(default = "default_true")]
    pub demo_hypergraph: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            demo_hypergraph: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_rule_ttl() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `HYPERSCORE_` environment variables (`HYPERSCORE_CACHE__RULE_TTL_SECS`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ServiceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HYPERSCORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Configuration for tests and embedding: no seed data, writes drop the
    /// rule cache immediately.
    pub fn ephemeral() -> Self {
        Self {
            cache: CacheConfig {
                invalidate_on_write: true,
                ..Default::default()
            },
            seed: SeedConfig {
                enabled: false,
                demo_hypergraph: false,
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.storage.timeout(), Duration::from_millis(5_000));
        assert_eq!(config.cache.rule_ttl(), Duration::from_secs(60));
        assert!(!config.cache.invalidate_on_write);
        assert!(!config.degraded.serve_stale);
        assert!(config.seed.enabled);
        assert!(config.seed.demo_hypergraph);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"cache": {"invalidate_on_write": true}, "degraded": {"serve_stale": true}}"#,
        )
        .unwrap();
        assert!(config.cache.invalidate_on_write);
        assert_eq!(config.cache.rule_ttl_secs, 60);
        assert!(config.degraded.serve_stale);
        assert_eq!(config.storage.timeout_ms, 5_000);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServiceConfig::load(None).unwrap();
        assert_eq!(config.cache.rule_ttl_secs, 60);
        assert!(config.seed.enabled);
    }

    #[test]
    fn test_ephemeral_disables_seed() {
        let config = ServiceConfig::ephemeral();
        assert!(!config.seed.enabled);
        assert!(config.cache.invalidate_on_write);
    }
}
