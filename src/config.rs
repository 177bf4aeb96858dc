//! Client configuration module.
//!
//! Handles loading, validating, and merging `headshot-studio.toml`. Stock
//! defaults form the base layer; a user file only needs the keys it wants to
//! change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [service]
//! base_url = "http://127.0.0.1:8000"
//! timeout_secs = 60
//!
//! [limits]
//! max_upload_bytes = 12582912       # 12 MB per file
//! max_batch_images = 24
//! max_batch_total_bytes = 75497472  # 72 MB per batch
//!
//! [timing]
//! process_debounce_ms = 300
//! estimate_debounce_ms = 200
//! persist_debounce_ms = 250
//! notice_ms = 6500
//!
//! [history]
//! max_entries = 3
//!
//! [profiles]
//! max_profiles = 30
//! max_bundle_entries = 50
//!
//! [storage]
//! dir = ".headshot-studio"
//! ```
//!
//! Limits reported by the service's health endpoint take precedence over the
//! `[limits]` section at runtime.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "headshot-studio.toml";

const MB: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Client configuration loaded from `headshot-studio.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Where the processing service lives.
    pub service: ServiceConfig,
    /// Upload limits used until the service reports its own.
    pub limits: LimitsConfig,
    /// Debounce windows and notice duration, in milliseconds.
    pub timing: TimingConfig,
    /// Preview history settings.
    pub history: HistoryConfig,
    /// Saved profile collection settings.
    pub profiles: ProfilesConfig,
    /// Local persistence.
    pub storage: StorageConfig,
}

impl ClientConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.service.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "service.base_url must start with http:// or https://".into(),
            ));
        }
        if self.service.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "service.timeout_secs must be non-zero".into(),
            ));
        }
        if self.limits.max_upload_bytes == 0 || self.limits.max_batch_total_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits byte sizes must be non-zero".into(),
            ));
        }
        if self.limits.max_batch_images == 0 {
            return Err(ConfigError::Validation(
                "limits.max_batch_images must be non-zero".into(),
            ));
        }
        if self.history.max_entries == 0 {
            return Err(ConfigError::Validation(
                "history.max_entries must be non-zero".into(),
            ));
        }
        if self.profiles.max_profiles == 0 || self.profiles.max_bundle_entries == 0 {
            return Err(ConfigError::Validation(
                "profiles limits must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Processing service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Upload limits in bytes and image count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_upload_bytes: u64,
    pub max_batch_images: usize,
    pub max_batch_total_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 12 * MB,
            max_batch_images: 24,
            max_batch_total_bytes: 72 * MB,
        }
    }
}

/// Debounce windows in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub process_debounce_ms: u64,
    pub estimate_debounce_ms: u64,
    pub persist_debounce_ms: u64,
    pub notice_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            process_debounce_ms: 300,
            estimate_debounce_ms: 200,
            persist_debounce_ms: 250,
            notice_ms: 6_500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilesConfig {
    /// Most recent profiles kept; older ones are dropped on save or merge.
    pub max_profiles: usize,
    /// Largest bundle accepted for import.
    pub max_bundle_entries: usize,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            max_profiles: 30,
            max_bundle_entries: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory for persisted settings and profiles.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".headshot-studio"),
        }
    }
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ClientConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ClientConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ClientConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or stock defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `headshot-studio.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Headshot Studio Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Processing service
# ---------------------------------------------------------------------------
[service]
# Base URL of the processing service (no trailing path).
base_url = "http://127.0.0.1:8000"

# Per-request timeout in seconds. Background removal on large photos can be slow.
timeout_secs = 60

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------
# Used until the service reports its own limits from /api/health.
[limits]
# Largest single file accepted (12 MB).
max_upload_bytes = 12582912

# Most images sent in one batch; extra files are left out, not rejected.
max_batch_images = 24

# Combined size of one batch (72 MB).
max_batch_total_bytes = 75497472

# ---------------------------------------------------------------------------
# Timing (milliseconds)
# ---------------------------------------------------------------------------
[timing]
# Quiet period after the last edit before a preview is requested.
process_debounce_ms = 300

# Quiet period before the local size estimate is recomputed.
estimate_debounce_ms = 200

# Quiet period before settings are written to disk.
persist_debounce_ms = 250

# How long a notice stays visible.
notice_ms = 6500

# ---------------------------------------------------------------------------
# Preview history
# ---------------------------------------------------------------------------
[history]
# Processed previews kept for comparison.
max_entries = 3

# ---------------------------------------------------------------------------
# Saved profiles
# ---------------------------------------------------------------------------
[profiles]
# Most recent profiles kept.
max_profiles = 30

# Largest bundle accepted for import.
max_bundle_entries = 50

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory for persisted settings and profiles, relative to the working
# directory unless absolute.
dir = ".headshot-studio"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ClientConfig::default();
        assert_eq!(config.limits.max_upload_bytes, 12 * MB);
        assert_eq!(config.limits.max_batch_images, 24);
        assert_eq!(config.limits.max_batch_total_bytes, 72 * MB);
        assert_eq!(config.timing.process_debounce_ms, 300);
        assert_eq!(config.timing.estimate_debounce_ms, 200);
        assert_eq!(config.timing.persist_debounce_ms, 250);
        assert_eq!(config.timing.notice_ms, 6_500);
        assert_eq!(config.history.max_entries, 3);
        assert_eq!(config.profiles.max_profiles, 30);
        assert_eq!(config.profiles.max_bundle_entries, 50);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[service]
base_url = "https://headshots.example.com"
"#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.service.base_url, "https://headshots.example.com");
        assert_eq!(config.service.timeout_secs, 60);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[timing]
process_debounce = 100
"#;
        let result: Result<ClientConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = ClientConfig::default();
        config.service.base_url = "localhost:8000".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = ClientConfig::default();
        config.limits.max_batch_images = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.history.max_entries = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_overrides_leaf_and_keeps_siblings() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str("[timing]\nnotice_ms = 1000\n").unwrap();
        let merged = merge_toml(base, overlay);
        let config: ClientConfig = merged.try_into().unwrap();
        assert_eq!(config.timing.notice_ms, 1000);
        assert_eq!(config.timing.process_debounce_ms, 300);
    }

    #[test]
    fn merge_non_table_overlay_replaces() {
        let base = toml::Value::Integer(1);
        let overlay = toml::Value::String("x".into());
        assert_eq!(merge_toml(base, overlay), toml::Value::String("x".into()));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[profiles]
max_profiles = 5

[storage]
dir = "/var/lib/headshots"
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.profiles.max_profiles, 5);
        assert_eq!(config.profiles.max_bundle_entries, 50);
        assert_eq!(config.storage.dir, PathBuf::from("/var/lib/headshots"));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[service\nbase_url = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_runs_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[service]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: ClientConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
