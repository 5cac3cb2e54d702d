//! Delivery transports for job descriptors

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

pub type Result<T> = std::result::Result<T, PublishError>;

/// Delivers a serialized job to one channel
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish message to channel
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()>;
}

/// POSTs each job as JSON to the channel URL
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: Client,
}

impl HttpPublisher {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("tapedeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::ConnectionError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(channel)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message)
            .send()
            .await
            .map_err(|e| PublishError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::PublishFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(())
    }
}

/// Logs jobs instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl LogPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()> {
        tracing::info!(
            channel,
            size = message.len(),
            job = %String::from_utf8_lossy(&message),
            "Dry-run publish"
        );
        Ok(())
    }
}

/// A message captured by [`MemoryPublisher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub message: Vec<u8>,
}

/// Captures published messages in memory, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    published: Arc<Mutex<Vec<Published>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order
    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()> {
        let mut published = self
            .published
            .lock()
            .map_err(|e| PublishError::PublishFailed(e.to_string()))?;
        published.push(Published {
            channel: channel.to_string(),
            message,
        });
        Ok(())
    }
}
