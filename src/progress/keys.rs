//! Storage key layout for recording windows
//!
//! Everything for one window lives under a single prefix:
//! `{prefix}/{group}/{stream}/{YYYY-MM-DD}/{HH}`. Each dispatch attempt mints
//! a fresh artifact name inside it, and the attempt's progress marker sits
//! next to the artifact with a distinct suffix, so listing the window prefix
//! finds every attempt's marker.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::streams::StreamConfig;

const UNKNOWN: &str = "_unknown";
const AUDIO_FORMATS: &[&str] = &["mp3", "aac", "flac", "ogg", "opus", "m4a", "wav"];

/// Key naming rules shared by the progress store and the job formatter
#[derive(Debug, Clone)]
pub struct KeyLayout {
    prefix: Option<String>,
    marker_suffix: String,
}

impl KeyLayout {
    pub fn new(prefix: Option<String>, marker_suffix: impl Into<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            prefix,
            marker_suffix: marker_suffix.into(),
        }
    }

    pub fn marker_suffix(&self) -> &str {
        &self.marker_suffix
    }

    /// Prefix holding every attempt for the hour starting at `hour_start`
    pub fn window_prefix(&self, stream: &StreamConfig, hour_start: DateTime<Utc>) -> String {
        let day = hour_start.format("%Y-%m-%d").to_string();
        let hour = hour_start.format("%H").to_string();

        [
            self.prefix.as_deref(),
            Some(stream.group_id.as_deref().unwrap_or(UNKNOWN)),
            Some(stream.stream_id.as_deref().unwrap_or(UNKNOWN)),
            Some(day.as_str()),
            Some(hour.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
    }

    /// Mint a new, unique artifact for one dispatch attempt
    pub fn new_artifact(
        &self,
        stream: &StreamConfig,
        hour_start: DateTime<Utc>,
        format: &str,
    ) -> ArtifactKey {
        ArtifactKey {
            prefix: self.window_prefix(stream, hour_start),
            name: format!("{}.{}", Uuid::new_v4(), format),
            marker_suffix: self.marker_suffix.clone(),
        }
    }

    pub fn is_marker(&self, key: &str) -> bool {
        key.ends_with(&self.marker_suffix)
    }
}

/// Where one attempt's recording and progress marker are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub prefix: String,
    pub name: String,
    marker_suffix: String,
}

impl ArtifactKey {
    /// Key the recording worker writes audio to
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.prefix, self.name)
    }

    /// Key of this attempt's progress marker
    pub fn marker_key(&self) -> String {
        format!("{}{}", self.object_key(), self.marker_suffix)
    }

    /// Output format, taken from the artifact's extension
    pub fn format(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default()
    }
}

/// Audio format of a source URL, falling back to `default` when the path
/// carries no recognised extension
pub fn audio_format(url: &str, default: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| AUDIO_FORMATS.contains(&ext.as_str()))
        .unwrap_or_else(|| default.to_string())
}
