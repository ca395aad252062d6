//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::scan::ScanLimits;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Directories that scans may be rooted in.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,

    /// Scanner defaults and ceilings.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Listing cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Stream session settings.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| Err(ConfigError::ValidationError { message });

        if self.scan.default_batch_size == 0 || self.scan.max_batch_size == 0 {
            return fail("scan batch sizes must be at least 1".to_string());
        }
        if self.scan.default_batch_size > self.scan.max_batch_size {
            return fail(format!(
                "scan.default_batch_size ({}) exceeds scan.max_batch_size ({})",
                self.scan.default_batch_size, self.scan.max_batch_size
            ));
        }
        if self.scan.default_max_depth == 0 {
            return fail("scan.default_max_depth must be at least 1".to_string());
        }
        if self.scan.default_max_depth > self.scan.max_depth_limit {
            return fail(format!(
                "scan.default_max_depth ({}) exceeds scan.max_depth_limit ({})",
                self.scan.default_max_depth, self.scan.max_depth_limit
            ));
        }
        if self.scan.memory_check_interval == 0 {
            return fail("scan.memory_check_interval must be at least 1".to_string());
        }
        if self.scan.max_entries == 0 {
            return fail("scan.max_entries must be at least 1".to_string());
        }
        if self.cache.capacity == 0 {
            return fail("cache.capacity must be at least 1".to_string());
        }
        if self.sessions.max_sessions == 0 {
            return fail("sessions.max_sessions must be at least 1".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return fail(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ));
        }
        Ok(())
    }
}

/// Scanner configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Depth used when a call does not specify one (1 = immediate children).
    #[serde(default = "default_max_depth")]
    pub default_max_depth: usize,

    /// Largest depth a caller may request.
    #[serde(default = "default_max_depth_limit")]
    pub max_depth_limit: usize,

    /// Page size used when a call does not specify one.
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Largest page size a caller may request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Allowed resident memory growth per scan, in MiB.
    #[serde(default = "default_memory_ceiling_mb")]
    pub memory_ceiling_mb: u64,

    /// Number of produced entries between memory samples.
    #[serde(default = "default_memory_check_interval")]
    pub memory_check_interval: usize,

    /// Wall-clock budget per scan, in milliseconds.
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,

    /// Maximum entries collected by a single listing scan.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl ScanConfig {
    /// Converts the configured ceilings into scanner limits.
    #[must_use]
    pub const fn limits(&self) -> ScanLimits {
        ScanLimits {
            memory_ceiling_bytes: self.memory_ceiling_mb.saturating_mul(1024 * 1024),
            check_interval: self.memory_check_interval,
            time_budget: Duration::from_millis(self.time_budget_ms),
            max_entries: self.max_entries,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            max_depth_limit: default_max_depth_limit(),
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
            memory_ceiling_mb: default_memory_ceiling_mb(),
            memory_check_interval: default_memory_check_interval(),
            time_budget_ms: default_time_budget_ms(),
            max_entries: default_max_entries(),
        }
    }
}

const fn default_max_depth() -> usize {
    1
}

const fn default_max_depth_limit() -> usize {
    32
}

const fn default_batch_size() -> usize {
    100
}

const fn default_max_batch_size() -> usize {
    1000
}

const fn default_memory_ceiling_mb() -> u64 {
    256
}

const fn default_memory_check_interval() -> usize {
    500
}

const fn default_time_budget_ms() -> u64 {
    10_000
}

const fn default_max_entries() -> usize {
    200_000
}

/// Listing cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether listings are cached at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live of a cached listing, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of cached listings.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_ttl_secs() -> u64 {
    30
}

const fn default_cache_capacity() -> usize {
    32
}

/// Stream session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a session is collected.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Maximum number of live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

const fn default_idle_timeout_secs() -> u64 {
    300
}

const fn default_max_sessions() -> usize {
    64
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.allowed_paths.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "allowed_paths": ["/srv/data"],
            "scan": {
                "default_max_depth": 2,
                "max_depth_limit": 8,
                "default_batch_size": 50,
                "max_batch_size": 500,
                "memory_ceiling_mb": 64,
                "memory_check_interval": 100,
                "time_budget_ms": 2000,
                "max_entries": 10000
            },
            "cache": {
                "enabled": false,
                "ttl_secs": 5,
                "capacity": 4
            },
            "sessions": {
                "idle_timeout_secs": 60,
                "max_sessions": 8
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.allowed_paths, vec![PathBuf::from("/srv/data")]);
        assert_eq!(config.scan.default_max_depth, 2);
        assert_eq!(config.scan.max_batch_size, 500);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.capacity, 4);
        assert_eq!(config.sessions.idle_timeout_secs, 60);
        assert_eq!(config.logging.level, "debug");

        let limits = config.scan.limits();
        assert_eq!(limits.memory_ceiling_bytes, 64 * 1024 * 1024);
        assert_eq!(limits.check_interval, 100);
        assert_eq!(limits.time_budget, Duration::from_secs(2));
        assert_eq!(limits.max_entries, 10_000);
    }

    #[test]
    fn scan_config_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.default_max_depth, 1);
        assert_eq!(config.default_batch_size, 100);
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.memory_ceiling_mb, 256);
    }

    #[test]
    fn cache_and_session_defaults() {
        let cache = CacheConfig::default();
        assert!(cache.enabled);
        assert_eq!(cache.ttl_secs, 30);
        assert_eq!(cache.capacity, 32);

        let sessions = SessionConfig::default();
        assert_eq!(sessions.idle_timeout_secs, 300);
        assert_eq!(sessions.max_sessions, 64);
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_default_batch_above_max() {
        let json = r#"{ "scan": { "default_batch_size": 2000 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_check_interval() {
        let json = r#"{ "scan": { "memory_check_interval": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_max_entries() {
        let json = r#"{ "scan": { "max_entries": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_memory_ceiling_saturates() {
        let json = r#"{ "scan": { "memory_ceiling_mb": 18446744073709551615 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan.limits().memory_ceiling_bytes, u64::MAX);
    }

    #[test]
    fn reject_invalid_log_level() {
        let json = r#"{ "logging": { "level": "loud" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
