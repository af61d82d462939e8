//! Configuration surface (spec §6): six sections deserialized from TOML,
//! validated with "unknown options warn, out-of-range values are
//! corrected toward the nearest bound" semantics — grounded on the
//! teacher's section-per-concern `VvtvConfig` shape and on
//! `original_source/src/telemetry/configuration/validation.py`'s
//! clamp-and-warn behavior.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CollectionConfig {
    pub enabled: bool,
    pub buffer_size: u32,
    pub batch_size: u32,
    pub flush_interval_secs: f64,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 1000,
            batch_size: 100,
            flush_interval_secs: 1.0,
            unknown: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    File,
    Tsdb,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct FileRotation {
    pub max_file_size_mb: u32,
    pub max_files: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct StorageConfig {
    pub kind: StorageType,
    pub directory: Option<String>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub retention_days: u32,
    pub file_rotation: FileRotation,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageType::File,
            directory: Some("./data".to_string()),
            url: None,
            token: None,
            org: None,
            bucket: None,
            retention_days: 30,
            file_rotation: FileRotation::default(),
            unknown: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PerformanceThresholds {
    pub resolution_time_ms: f64,
    pub memory_usage_mb: f64,
    pub error_rate_percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct QualityThresholds {
    pub confidence_score: f64,
    pub decline_percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct HealthThresholds {
    pub anomaly_threshold: f64,
    pub timeout_frequency_percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AlertThresholds {
    pub performance: PerformanceThresholds,
    pub quality: QualityThresholds,
    pub health: HealthThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Log,
    Email,
    Webhook,
    Slack,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RateLimit {
    pub max_per_hour: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Notifications {
    pub channels: Vec<NotificationChannel>,
    pub rate_limit: RateLimit,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AlertingConfig {
    pub enabled: bool,
    pub thresholds: AlertThresholds,
    pub notifications: Notifications,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: AlertThresholds::default(),
            notifications: Notifications::default(),
            unknown: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Performance,
    Usage,
    Health,
    Trends,
    Recommendations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ReportSchedule {
    pub frequency: ReportFrequency,
    pub time_of_day: String,
}

impl Default for ReportSchedule {
    fn default() -> Self {
        Self {
            frequency: ReportFrequency::Daily,
            time_of_day: "00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ReportingConfig {
    pub enabled: bool,
    pub types: Vec<ReportType>,
    pub schedule: ReportSchedule,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            types: Vec::new(),
            schedule: ReportSchedule::default(),
            unknown: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CacheConfig {
    pub size: u32,
    pub ttl_seconds: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PerformanceConfig {
    pub overhead_target_percent: f64,
    pub memory_threshold_mb: f64,
    pub cache: CacheConfig,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            overhead_target_percent: 2.0,
            memory_threshold_mb: 256.0,
            cache: CacheConfig {
                size: 1000,
                ttl_seconds: 300,
            },
            unknown: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    pub correlation_id_length: u32,
    pub timeouts: HashMap<String, f64>,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            correlation_id_length: 16,
            timeouts: HashMap::new(),
            unknown: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SelectorCoreConfig {
    pub collection: CollectionConfig,
    pub storage: StorageConfig,
    pub alerting: AlertingConfig,
    pub reporting: ReportingConfig,
    pub performance: PerformanceConfig,
    pub global: GlobalConfig,
}

impl SelectorCoreConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub corrected_values: HashMap<String, String>,
}

impl ConfigValidation {
    fn clamp_f64(&mut self, label: &str, value: &mut f64, min: f64, max: f64) {
        let clamped = value.clamp(min, max);
        if clamped != *value {
            self.corrected_values
                .insert(label.to_string(), format!("{value} -> {clamped}"));
            warn!(field = label, from = *value, to = clamped, "config value corrected");
            *value = clamped;
        }
    }

    fn clamp_u32(&mut self, label: &str, value: &mut u32, min: u32, max: u32) {
        let clamped = (*value).clamp(min, max);
        if clamped != *value {
            self.corrected_values
                .insert(label.to_string(), format!("{value} -> {clamped}"));
            warn!(field = label, from = *value, to = clamped, "config value corrected");
            *value = clamped;
        }
    }

    fn warn_unknown(&mut self, section: &str, unknown: &HashMap<String, toml::Value>) {
        for key in unknown.keys() {
            let message = format!("unknown option `{section}.{key}`");
            warn!(option = %message, "config_unknown_option");
            self.warnings.push(message);
        }
    }
}

/// Validates `config` in place, clamping out-of-range values toward the
/// nearest bound and collecting warnings for unrecognized keys. Never
/// fails outright — an invalid config is corrected, not rejected, except
/// for combinations that can't be made sensible (flagged in `errors`).
pub fn validate(config: &mut SelectorCoreConfig) -> ConfigValidation {
    let mut result = ConfigValidation {
        is_valid: true,
        ..Default::default()
    };

    result.clamp_u32(
        "collection.buffer_size",
        &mut config.collection.buffer_size,
        100,
        10_000,
    );
    result.clamp_u32(
        "collection.batch_size",
        &mut config.collection.batch_size,
        1,
        10_000,
    );
    result.clamp_f64(
        "collection.flush_interval_secs",
        &mut config.collection.flush_interval_secs,
        0.1,
        60.0,
    );
    result.warn_unknown("collection", &config.collection.unknown);

    result.clamp_u32(
        "storage.retention_days",
        &mut config.storage.retention_days,
        1,
        365,
    );
    if config.storage.kind == StorageType::File && config.storage.directory.is_none() {
        result.errors.push("storage.directory is required when storage.type = file".to_string());
        result.is_valid = false;
    }
    result.warn_unknown("storage", &config.storage.unknown);

    result.warn_unknown("alerting", &config.alerting.unknown);
    result.warn_unknown("reporting", &config.reporting.unknown);

    result.clamp_f64(
        "performance.overhead_target_percent",
        &mut config.performance.overhead_target_percent,
        0.0001,
        10.0,
    );
    if config.performance.memory_threshold_mb < 10.0 {
        result.corrected_values.insert(
            "performance.memory_threshold_mb".to_string(),
            format!("{} -> 10", config.performance.memory_threshold_mb),
        );
        config.performance.memory_threshold_mb = 10.0;
    }
    result.warn_unknown("performance", &config.performance.unknown);

    result.clamp_u32(
        "global.correlation_id_length",
        &mut config.global.correlation_id_length,
        4,
        32,
    );
    result.warn_unknown("global", &config.global.unknown);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_buffer_size_is_corrected_toward_bound() {
        let mut config = SelectorCoreConfig::default();
        config.collection.buffer_size = 50;
        let result = validate(&mut config);
        assert_eq!(config.collection.buffer_size, 100);
        assert!(result.corrected_values.contains_key("collection.buffer_size"));
    }

    #[test]
    fn unknown_option_is_a_warning_not_an_error() {
        let mut config = SelectorCoreConfig::default();
        config
            .collection
            .unknown
            .insert("legacy_flag".to_string(), toml::Value::Boolean(true));
        let result = validate(&mut config);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn file_storage_without_directory_is_an_error() {
        let mut config = SelectorCoreConfig::default();
        config.storage.directory = None;
        let result = validate(&mut config);
        assert!(!result.is_valid);
        assert!(!result.errors.is_empty());
    }
}
