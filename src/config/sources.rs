use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "TAPEDECK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tapedeck.toml";
const ENV_PREFIX: &str = "TAPEDECK";
const ENV_SEPARATOR: &str = "__";
const LIST_SEPARATOR: &str = ",";
const LIST_KEYS: &[&str] = &["dispatch.channels", "streams.timeouts"];

/// Resolve the config file (`TAPEDECK_CONFIG` or `config/tapedeck.toml`) and load it.
///
/// Sources, lowest priority first: struct defaults, the TOML file, `.env`,
/// the process environment.
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_path(path)
}

/// Load an explicit config file, plus environment overrides and credentials
pub fn load_path(path: PathBuf) -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(path)?;
    config.storage.access_key = first_env(&["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]);
    config.storage.secret_key = first_env(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]);
    Ok(config)
}

/// Storage credentials only ever come from the environment
fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
}

/// File and `TAPEDECK__*` layers only
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading config file");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(path = %config_path.display(), "Config file missing, using defaults and env");
    }

    // TAPEDECK__SCHEDULE__BUFFER_START -> schedule.buffer_start
    // TAPEDECK__DISPATCH__CHANNELS=a,b -> dispatch.channels = ["a", "b"]
    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .list_separator(LIST_SEPARATOR)
        .try_parsing(true);
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }
    builder = builder.add_source(environment);

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatchProvider, StorageProvider};
    use crate::humanize::HumanDuration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.schedule.startup_grace, HumanDuration::from_secs(120));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
interval = "30s"

[schedule]
buffer_start = 120
buffer_end = "1m"
startup_grace = "2m"
heartbeat_grace = "30s"

[streams]
url = "http://my.config/streams.json"
timeouts = ["500ms", "1s"]

[storage]
provider = "s3"
bucket = "my-bucket"
prefix = "recordings"
region = "us-east-1"
marker_suffix = ".wip"

[dispatch]
provider = "log"
channels = ["topic1", "topic2"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.interval, HumanDuration::from_secs(30));
        assert_eq!(config.schedule.buffer_start, HumanDuration::from_secs(120));
        assert_eq!(config.schedule.buffer_end, HumanDuration::from_secs(60));
        assert_eq!(config.schedule.heartbeat_grace, HumanDuration::from_secs(30));
        assert_eq!(
            config.streams.url.as_deref(),
            Some("http://my.config/streams.json")
        );
        assert_eq!(
            config.streams.timeouts,
            vec![HumanDuration::from_millis(500), HumanDuration::from_secs(1)]
        );
        assert_eq!(config.storage.provider, StorageProvider::S3);
        assert_eq!(config.storage.prefix.as_deref(), Some("recordings"));
        assert_eq!(config.storage.marker_suffix, ".wip");
        assert_eq!(config.dispatch.provider, DispatchProvider::Log);
        assert_eq!(config.dispatch.channels, vec!["topic1", "topic2"]);
    }

    // Environment overrides are not exercised here: mutating process env is
    // unsafe under edition 2024 and races with parallel tests.
}
