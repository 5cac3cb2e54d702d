//! Process configuration: buffers, grace periods, channels, storage
//!
//! Layers, lowest priority first: struct defaults, a TOML file, then the
//! environment. The result is validated before use.
//!
//! # Usage
//!
//! ```no_run
//! use tapedeck::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Reconciling every {}", config.server.interval);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be set as `TAPEDECK__<section>__<key>`. `dispatch.channels`
//! and `streams.timeouts` take comma-separated lists.
//!
//! - `TAPEDECK__SCHEDULE__BUFFER_START=120`
//! - `TAPEDECK__STREAMS__URL=https://feeder.example/streams.json`
//! - `TAPEDECK__DISPATCH__CHANNELS=https://hooks.example/a,https://hooks.example/b`
//!
//! # Configuration File
//!
//! `config/tapedeck.toml` unless `TAPEDECK_CONFIG` points elsewhere. S3
//! credentials are never read from the file.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, DispatchConfig, DispatchProvider, LogFormat, ScheduleConfig, ServerConfig,
    StorageConfig, StorageProvider, StreamSourceConfig, TelemetryConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load from the default file location and the environment, then validate
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from `path` instead of the default location, then validate
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_path(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[dispatch]
channels = ["http://worker-a/jobs"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.dispatch.channels.len(), 1);
        assert_eq!(config.streams.timeouts.len(), 3);
    }

    #[test]
    fn test_validation_catches_missing_channels() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[schedule]
buffer_start = 120
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::NoDispatchChannels)
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        let root = temp_dir.path().join("recordings");

        let toml_content = format!(
            r#"
[server]
bind_addr = "0.0.0.0:8080"
interval = "1m"
max_concurrency = 4

[schedule]
buffer_start = "2m"
buffer_end = "1m"
startup_grace = "2m"
heartbeat_grace = "30s"

[streams]
url = "https://feeder.example/streams.json"
timeouts = ["1s", "2s", "5s"]

[storage]
provider = "local"
bucket = "my-bucket"
root = "{}"

[dispatch]
provider = "http"
channels = ["https://hooks.example/a", "https://hooks.example/b"]
request_timeout = "5s"

[telemetry]
log_format = "json"
log_filter = "tapedeck=debug"
            "#,
            root.display()
        );

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.server.max_concurrency, 4);
        assert_eq!(config.schedule.buffer_start, HumanDuration::from_secs(120));
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(config.storage.root.as_deref(), Some(root.as_path()));
        assert_eq!(config.dispatch.channels.len(), 2);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }
}
