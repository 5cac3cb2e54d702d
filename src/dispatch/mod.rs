//! Dispatching recording jobs to the external worker
//!
//! The [`Dispatcher`] holds N redundant channels and picks one per send by
//! `attempt % N`. Repeated restarts of a stuck window therefore fan out across
//! independent delivery paths instead of hammering the one that failed.

pub mod job;
pub mod publisher;

pub use job::{JobDescriptor, JobTemplate, format_job, remaining_secs};
pub use publisher::{
    HttpPublisher, LogPublisher, MemoryPublisher, PublishError, Published, Publisher,
};

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{DispatchConfig, DispatchProvider};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No dispatch channels configured")]
    NoChannels,

    #[error("Failed to encode job: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Publish to channel {channel} failed: {source}")]
    Publish {
        channel: usize,
        #[source]
        source: PublishError,
    },
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Sends jobs to one of N rotating channels
#[derive(Clone)]
pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
    channels: Vec<String>,
}

impl Dispatcher {
    pub fn new(publisher: Arc<dyn Publisher>, channels: Vec<String>) -> Self {
        Self {
            publisher,
            channels,
        }
    }

    /// Build the publisher named by `config.provider`
    pub fn from_config(config: &DispatchConfig) -> std::result::Result<Self, PublishError> {
        let publisher: Arc<dyn Publisher> = match config.provider {
            DispatchProvider::Http => {
                Arc::new(HttpPublisher::new(config.request_timeout.as_duration())?)
            }
            DispatchProvider::Log => Arc::new(LogPublisher::new()),
        };

        tracing::info!(
            provider = ?config.provider,
            channels = config.channels.len(),
            "Dispatcher configured"
        );

        Ok(Self::new(publisher, config.channels.clone()))
    }

    /// Channel index used for `attempt`
    pub fn channel_for(&self, attempt: u32) -> Option<usize> {
        match self.channels.len() {
            0 => None,
            n => Some(attempt as usize % n),
        }
    }

    /// Publish `job` on the channel selected by `attempt`.
    ///
    /// Returns the channel index used, or `None` without publishing when
    /// there is no job.
    pub async fn send(&self, job: Option<&JobDescriptor>, attempt: u32) -> Result<Option<usize>> {
        let Some(job) = job else {
            return Ok(None);
        };

        let channel = self.channel_for(attempt).ok_or(DispatchError::NoChannels)?;
        let message = serde_json::to_vec(job)?;

        self.publisher
            .publish(&self.channels[channel], message)
            .await
            .map_err(|source| DispatchError::Publish { channel, source })?;

        debug!(job_id = %job.id(), attempt, channel, "Job published");

        Ok(Some(channel))
    }
}
