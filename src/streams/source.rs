//! HTTP config source with escalating timeouts and a last-good cache

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::models::StreamConfig;
use crate::config::StreamSourceConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Response is not a JSON array")]
    NotAnArray,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("No config source URL configured")]
    MissingUrl,

    #[error("Unable to fetch stream config after {attempts} attempts and no cached copy: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Last successfully fetched stream list.
///
/// Owned by the caller and passed into [`StreamSource::fetch`], so a
/// long-running process keeps it across passes and tests can [`clear`] it.
///
/// [`clear`]: ConfigCache::clear
#[derive(Debug, Clone, Default)]
pub struct ConfigCache {
    inner: Arc<RwLock<Option<Arc<Vec<StreamConfig>>>>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<Vec<StreamConfig>>> {
        self.inner.read().await.clone()
    }

    pub async fn store(&self, streams: Arc<Vec<StreamConfig>>) {
        *self.inner.write().await = Some(streams);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

/// Fetches the stream list from the config URL
pub struct StreamSource {
    client: Client,
    url: String,
    timeouts: Vec<Duration>,
}

impl StreamSource {
    /// Create a source; each entry of `timeouts` is one attempt
    pub fn new(url: impl Into<String>, timeouts: Vec<Duration>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tapedeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeouts,
        })
    }

    pub fn from_config(config: &StreamSourceConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(FetchError::MissingUrl)?;
        let timeouts = config.timeouts.iter().map(|t| t.as_duration()).collect();
        Self::new(url, timeouts)
    }

    /// Fetch the stream list, trying once per configured timeout.
    ///
    /// A successful fetch refreshes `cache`. When every attempt fails the
    /// cached list is returned instead; only an empty cache is an error.
    pub async fn fetch(&self, cache: &ConfigCache) -> Result<Arc<Vec<StreamConfig>>> {
        let mut last_error = String::from("no attempts configured");

        for (attempt, timeout) in self.timeouts.iter().enumerate() {
            match self.fetch_once(*timeout).await {
                Ok(streams) => {
                    if attempt > 0 {
                        debug!(url = %self.url, attempts = attempt + 1, "Config fetch succeeded after retry");
                    }
                    let streams = Arc::new(streams);
                    cache.store(streams.clone()).await;
                    return Ok(streams);
                }
                Err(e) => {
                    match &e {
                        FetchError::Status(_) | FetchError::NotAnArray => {
                            warn!(url = %self.url, attempt = attempt + 1, error = %e, "Config fetch rejected")
                        }
                        _ => {
                            error!(url = %self.url, attempt = attempt + 1, error = %e, "Config fetch failed")
                        }
                    }
                    last_error = e.to_string();
                }
            }
        }

        if let Some(cached) = cache.get().await {
            warn!(url = %self.url, streams = cached.len(), "Using cached stream config");
            return Ok(cached);
        }

        Err(FetchError::Exhausted {
            attempts: self.timeouts.len(),
            last_error,
        })
    }

    /// Fetch once (no retry)
    async fn fetch_once(&self, timeout: Duration) -> Result<Vec<StreamConfig>> {
        debug!(url = %self.url, ?timeout, "Fetching stream config");

        let response = self
            .client
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(timeout)
                } else {
                    FetchError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::RequestFailed(format!("Failed to read body: {}", e))
            }
        })?;

        let payload: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::InvalidJson(e.to_string()))?;

        parse_streams(payload)
    }
}

/// Decode a config payload, skipping entries that do not match the schema
pub fn parse_streams(payload: Value) -> Result<Vec<StreamConfig>> {
    let Value::Array(entries) = payload else {
        return Err(FetchError::NotAnArray);
    };

    let mut streams = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<StreamConfig>(entry) {
            Ok(stream) => {
                if !stream.unknown.is_empty() {
                    let keys: Vec<&str> = stream.unknown.keys().map(String::as_str).collect();
                    debug!(stream = %stream.label(), ?keys, "Ignoring unknown stream config keys");
                }
                streams.push(stream);
            }
            Err(e) => warn!(index, error = %e, "Skipping malformed stream config entry"),
        }
    }

    Ok(streams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_streams_skips_bad_entries() {
        let payload = json!([
            {"id": 1, "url": "http://a"},
            {"id": 2, "start_date": "not a date"},
            {"id": 3, "record_hours": [1, 2]}
        ]);

        let streams = parse_streams(payload).unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].stream_id.as_deref(), Some("1"));
        assert_eq!(streams[1].stream_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_streams_rejects_objects() {
        assert!(matches!(
            parse_streams(json!({"streams": []})),
            Err(FetchError::NotAnArray)
        ));
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = StreamSourceConfig::default();
        assert!(matches!(
            StreamSource::from_config(&config),
            Err(FetchError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = ConfigCache::new();
        assert!(cache.get().await.is_none());

        cache.store(Arc::new(vec![StreamConfig::default()])).await;
        assert_eq!(cache.get().await.unwrap().len(), 1);

        cache.clear().await;
        assert!(cache.get().await.is_none());
    }
}
