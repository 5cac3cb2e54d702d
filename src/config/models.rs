use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub streams: StreamSourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Long-running `serve` mode settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// How often a reconciliation pass runs
    #[serde(default = "default_interval")]
    pub interval: HumanDuration,
    /// Upper bound on (stream, window) units reconciled at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            interval: default_interval(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_interval() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_max_concurrency() -> usize {
    16
}

/// Recording window buffers and liveness grace periods
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Start recording this long before the top of the hour
    #[serde(default)]
    pub buffer_start: HumanDuration,
    /// Keep recording this long after the end of the hour
    #[serde(default)]
    pub buffer_end: HumanDuration,
    /// How long a dispatched job may sit without a heartbeat before redispatch
    #[serde(default = "default_startup_grace")]
    pub startup_grace: HumanDuration,
    /// Maximum heartbeat age before a running job is presumed dead
    #[serde(default = "default_heartbeat_grace")]
    pub heartbeat_grace: HumanDuration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            buffer_start: HumanDuration::default(),
            buffer_end: HumanDuration::default(),
            startup_grace: default_startup_grace(),
            heartbeat_grace: default_heartbeat_grace(),
        }
    }
}

fn default_startup_grace() -> HumanDuration {
    HumanDuration::from_secs(120)
}

fn default_heartbeat_grace() -> HumanDuration {
    HumanDuration::from_secs(60)
}

/// Where the stream list comes from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSourceConfig {
    pub url: Option<String>,
    /// One fetch attempt per entry, each bounded by that timeout
    #[serde(default = "default_fetch_timeouts")]
    pub timeouts: Vec<HumanDuration>,
}

impl Default for StreamSourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeouts: default_fetch_timeouts(),
        }
    }
}

fn default_fetch_timeouts() -> Vec<HumanDuration> {
    vec![
        HumanDuration::from_secs(1),
        HumanDuration::from_secs(2),
        HumanDuration::from_secs(5),
    ]
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Local,
    #[default]
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Key prefix prepended to every window path
    pub prefix: Option<String>,
    /// Directory backing the `local` provider
    pub root: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
    /// Suffix distinguishing progress markers from recorded artifacts
    #[serde(default = "default_marker_suffix")]
    pub marker_suffix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            bucket: default_bucket(),
            prefix: None,
            root: None,
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
            marker_suffix: default_marker_suffix(),
        }
    }
}

fn default_bucket() -> String {
    "tapedeck-recordings".to_string()
}

fn default_marker_suffix() -> String {
    ".progress".to_string()
}

/// Dispatch transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchProvider {
    /// POST each job to the channel URL
    #[default]
    Http,
    /// Only log jobs (dry run)
    Log,
}

/// Recording worker dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub provider: DispatchProvider,
    /// Redundant delivery channels, selected by `attempt % channels.len()`
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_destination_mode")]
    pub destination_mode: String,
    #[serde(default = "default_callback_type")]
    pub callback_type: String,
    /// Output format when the source URL has no recognised audio extension
    #[serde(default = "default_format")]
    pub default_format: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            provider: DispatchProvider::default(),
            channels: Vec::new(),
            request_timeout: default_request_timeout(),
            destination_mode: default_destination_mode(),
            callback_type: default_callback_type(),
            default_format: default_format(),
        }
    }
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_destination_mode() -> String {
    "AWS/S3".to_string()
}

fn default_callback_type() -> String {
    "AWS/SQS".to_string()
}

fn default_format() -> String {
    "mp3".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Default filter directive, `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
