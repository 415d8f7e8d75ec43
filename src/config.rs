//! Configuration management for the claim fraud prediction service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `FRAUD_API__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "FRAUD_API";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub logging: LoggingConfig,
}

/// HTTP binding configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
        }
    }
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Serialized ONNX classifier
    pub model_path: String,
    /// JSON sidecar listing the trained feature names in order
    pub feature_info_path: String,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
    /// Optional persisted categorical code mapping; per-request encoding when unset
    pub categorical_mappings: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: "models/xgboost.onnx".to_string(),
            feature_info_path: "models/feature_info.json".to_string(),
            onnx_threads: 1,
            categorical_mappings: None,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Probabilities strictly above this are labelled fraud
    pub threshold: f64,
    /// Width of the feature vector the classifier was trained on
    pub expected_feature_count: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            expected_feature_count: 20,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file plus environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path.
    ///
    /// The file is optional; anything it leaves out falls back to defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.detection.threshold, 0.6);
        assert_eq!(config.detection.expected_feature_count, 20);
        assert_eq!(config.model.model_path, "models/xgboost.onnx");
        assert!(config.model.categorical_mappings.is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:5001");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8088\n\n[model]\ncategorical_mappings = \"models/codes.json\"\n\n[detection]\nthreshold = 0.75"
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.detection.threshold, 0.75);
        assert_eq!(config.detection.expected_feature_count, 20);
        assert_eq!(
            config.model.categorical_mappings.as_deref(),
            Some("models/codes.json")
        );
    }
}
