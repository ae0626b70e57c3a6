//! Service configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! `ANALOG_*` environment variables (e.g. `ANALOG_MODEL_PATH`).

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analogs::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::forecast::ForecastSettings;
use crate::sources::yahoo::{DEFAULT_BASE_URL, DEFAULT_RANGE};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "analog-forecast";
pub const ENV_PREFIX: &str = "ANALOG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// XGBoost JSON model file
    pub model_path: PathBuf,
    pub model_window_size: usize,
    pub default_days: usize,
    pub similarity_threshold: f64,
    #[serde(default)]
    pub top_k: Option<usize>,
    pub chart_base_url: String,
    pub history_range: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/xgb_hybrid_raf.json"),
            model_window_size: DEFAULT_WINDOW_SIZE,
            default_days: DEFAULT_WINDOW_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: None,
            chart_base_url: DEFAULT_BASE_URL.to_string(),
            history_range: DEFAULT_RANGE.to_string(),
            request_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration. An explicit `file` must exist; the default one is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("model_path", defaults.model_path.to_string_lossy().to_string())?
            .set_default("model_window_size", defaults.model_window_size as u64)?
            .set_default("default_days", defaults.default_days as u64)?
            .set_default("similarity_threshold", defaults.similarity_threshold)?
            .set_default("chart_base_url", defaults.chart_base_url)?
            .set_default("history_range", defaults.history_range)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("log_level", defaults.log_level)?;

        builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let config: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model_window_size == 0 {
            return Err(ConfigError::Message("model_window_size must be positive".into()));
        }
        if self.default_days == 0 {
            return Err(ConfigError::Message("default_days must be positive".into()));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Message(
                "similarity_threshold must lie in [-1, 1]".into(),
            ));
        }
        if self.top_k == Some(0) {
            return Err(ConfigError::Message("top_k must be positive when set".into()));
        }
        Ok(())
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            model_window_size: self.model_window_size,
            similarity_threshold: self.similarity_threshold,
            top_k: self.top_k,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "model_path = \"/tmp/model.json\"\nmodel_window_size = 20\ntop_k = 5\nlog_level = \"debug\""
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/tmp/model.json"));
        assert_eq!(config.model_window_size, 20);
        assert_eq!(config.top_k, Some(5));
        assert_eq!(config.default_days, 30);
        assert_eq!(config.similarity_threshold, 0.80);
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);

        let settings = config.forecast_settings();
        assert_eq!(settings.model_window_size, 20);
        assert_eq!(settings.top_k, Some(5));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "similarity_threshold = 1.5").unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_explicit_file_must_exist() {
        assert!(AppConfig::load(Some(Path::new("/definitely/missing.toml"))).is_err());
    }
}
