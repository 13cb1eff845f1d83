use crate::analyzer::AnalyzerOptions;
use crate::common::constants::{
    DEFAULT_CLUSTER_CAPACITY, DEFAULT_MEMORY_INTENSIVE_MB, DEFAULT_POOR_CACHE_HIT_RATIO,
    DEFAULT_SESSION_CAPACITY, MAX_QUERY_LENGTH,
};
use crate::errors::{ProfilerError, Result};
use crate::logging::{LogRotation, LoggingConfig, DEFAULT_LEVEL_FILTER};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Profiler engine configuration, loadable from TOML.
///
/// Every key is optional; missing keys take the defaults below.
///
/// ```toml
/// session_capacity = 2048
/// cluster_capacity = 1024
/// max_query_length = 4096
/// parameterize_literals = true
/// track_memory = true
/// memory_intensive_threshold_mb = 50.0
/// poor_cache_hit_ratio = 0.5
///
/// [logging]
/// log_dir = "logs"
/// rotation = "daily"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session_capacity: usize,
    pub cluster_capacity: usize,
    pub max_query_length: usize,
    pub parameterize_literals: bool,
    /// Sample process memory at session start/stop
    pub track_memory: bool,
    pub memory_intensive_threshold_mb: f64,
    pub poor_cache_hit_ratio: f64,
    pub logging: Option<LoggingTomlConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_capacity: DEFAULT_SESSION_CAPACITY,
            cluster_capacity: DEFAULT_CLUSTER_CAPACITY,
            max_query_length: MAX_QUERY_LENGTH,
            parameterize_literals: true,
            track_memory: true,
            memory_intensive_threshold_mb: DEFAULT_MEMORY_INTENSIVE_MB,
            poor_cache_hit_ratio: DEFAULT_POOR_CACHE_HIT_RATIO,
            logging: None,
        }
    }
}

/// `[logging]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingTomlConfig {
    pub log_dir: Option<String>,
    pub level_filter: Option<String>,
    /// "daily", "hourly", or "size:<MB>"
    pub rotation: Option<String>,
    pub console_timestamps: Option<bool>,
    pub file_json_format: Option<bool>,
    /// Days to keep log files
    pub cleanup_days: Option<u32>,
}

impl LoggingTomlConfig {
    pub fn cleanup_days(&self) -> u32 {
        self.cleanup_days.unwrap_or(30)
    }

    pub fn to_logging_config(&self) -> Result<LoggingConfig> {
        let rotation = match &self.rotation {
            Some(r) => r.parse()?,
            None => LogRotation::Daily,
        };
        Ok(LoggingConfig {
            log_dir: self.log_dir.clone().unwrap_or_else(|| "logs".to_string()),
            level_filter: self
                .level_filter
                .clone()
                .unwrap_or_else(|| DEFAULT_LEVEL_FILTER.to_string()),
            rotation,
            console_timestamps: self.console_timestamps.unwrap_or(true),
            file_json_format: self.file_json_format.unwrap_or(true),
        })
    }
}

impl EngineConfig {
    /// Read, parse and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.as_ref().display(), "⚙️ Profiler configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_capacity == 0 || self.session_capacity > u32::MAX as usize {
            return Err(ProfilerError::Config(format!(
                "session_capacity must be between 1 and {}, got {}",
                u32::MAX,
                self.session_capacity
            )));
        }
        if self.cluster_capacity == 0 {
            return Err(ProfilerError::Config("cluster_capacity must be positive".to_string()));
        }
        if self.max_query_length == 0 {
            return Err(ProfilerError::Config("max_query_length must be positive".to_string()));
        }
        if !(self.memory_intensive_threshold_mb.is_finite() && self.memory_intensive_threshold_mb > 0.0) {
            return Err(ProfilerError::Config(format!(
                "memory_intensive_threshold_mb must be positive, got {}",
                self.memory_intensive_threshold_mb
            )));
        }
        if !(0.0..=1.0).contains(&self.poor_cache_hit_ratio) {
            return Err(ProfilerError::Config(format!(
                "poor_cache_hit_ratio must be within 0.0..=1.0, got {}",
                self.poor_cache_hit_ratio
            )));
        }
        if let Some(logging) = &self.logging {
            logging.to_logging_config()?;
        }
        Ok(())
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            cluster_capacity: self.cluster_capacity,
            max_query_length: self.max_query_length,
            parameterize_literals: self.parameterize_literals,
        }
    }

    pub fn logging_config(&self) -> Result<LoggingConfig> {
        match &self.logging {
            Some(logging) => logging.to_logging_config(),
            None => Ok(LoggingConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.session_capacity, 2048);
        assert_eq!(config.cluster_capacity, 1024);
        assert_eq!(config.max_query_length, 4096);
        assert!(config.parameterize_literals);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            session_capacity = 16
            parameterize_literals = false

            [logging]
            log_dir = "/tmp/profiler-logs"
            rotation = "hourly"
            "#,
        )
        .unwrap();
        assert_eq!(config.session_capacity, 16);
        assert_eq!(config.cluster_capacity, 1024);
        assert!(!config.analyzer_options().parameterize_literals);

        let logging = config.logging_config().unwrap();
        assert_eq!(logging.log_dir, "/tmp/profiler-logs");
        assert_eq!(logging.rotation, LogRotation::Hourly);
        assert!(logging.file_json_format);
        assert_eq!(config.logging.unwrap().cleanup_days(), 30);
    }

    #[test]
    fn test_validation_errors() {
        for toml in [
            "session_capacity = 0",
            "cluster_capacity = 0",
            "max_query_length = 0",
            "memory_intensive_threshold_mb = -1.0",
            "poor_cache_hit_ratio = 1.5",
            "[logging]\nrotation = \"weekly\"",
        ] {
            assert!(
                matches!(EngineConfig::from_toml_str(toml), Err(ProfilerError::Config(_))),
                "{} should be rejected",
                toml
            );
        }
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("session_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, ProfilerError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "session_capacity = 32\ncluster_capacity = 64").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.session_capacity, 32);
        assert_eq!(config.analyzer_options().cluster_capacity, 64);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/profiler.toml").unwrap_err();
        assert!(matches!(err, ProfilerError::Io(_)));
    }
}
