use super::models::{Config, StorageProvider};
use std::time::Duration;
use thiserror::Error;

const ONE_HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No dispatch channels configured")]
    NoDispatchChannels,

    #[error("Dispatch channel {index} is blank")]
    BlankDispatchChannel { index: usize },

    #[error("No config fetch timeouts configured")]
    NoFetchTimeouts,

    #[error("Config fetch timeout {index} must be positive")]
    ZeroFetchTimeout { index: usize },

    #[error("buffer_start ({start}s) + buffer_end ({end}s) must be shorter than one hour")]
    BuffersTooLong { start: u64, end: u64 },

    #[error("server.interval must be positive")]
    ZeroInterval,

    #[error("server.max_concurrency must be positive")]
    ZeroConcurrency,

    #[error("storage.bucket must not be empty")]
    EmptyBucket,

    #[error("Local storage provider requires storage.root")]
    MissingLocalRoot,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_dispatch(config)?;
    validate_streams(config)?;
    validate_schedule(config)?;
    validate_server(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_dispatch(config: &Config) -> Result<(), ValidationError> {
    if config.dispatch.channels.is_empty() {
        return Err(ValidationError::NoDispatchChannels);
    }

    if let Some(index) = config
        .dispatch
        .channels
        .iter()
        .position(|channel| channel.trim().is_empty())
    {
        return Err(ValidationError::BlankDispatchChannel { index });
    }

    Ok(())
}

fn validate_streams(config: &Config) -> Result<(), ValidationError> {
    if config.streams.timeouts.is_empty() {
        return Err(ValidationError::NoFetchTimeouts);
    }

    if let Some(index) = config.streams.timeouts.iter().position(|t| t.is_zero()) {
        return Err(ValidationError::ZeroFetchTimeout { index });
    }

    Ok(())
}

/// With both buffers under an hour combined, at most two windows overlap
fn validate_schedule(config: &Config) -> Result<(), ValidationError> {
    let start = config.schedule.buffer_start.as_duration();
    let end = config.schedule.buffer_end.as_duration();

    if start.checked_add(end).is_none_or(|sum| sum >= ONE_HOUR) {
        return Err(ValidationError::BuffersTooLong {
            start: start.as_secs(),
            end: end.as_secs(),
        });
    }

    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.interval.is_zero() {
        return Err(ValidationError::ZeroInterval);
    }

    if config.server.max_concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket);
    }

    if config.storage.provider == StorageProvider::Local && config.storage.root.is_none() {
        return Err(ValidationError::MissingLocalRoot);
    }

    Ok(())
}
