use object_store::ObjectMeta;
use thiserror::Error;
use tracing::{debug, error};

use super::keys::{ArtifactKey, KeyLayout};
use super::record::ProgressRecord;
use crate::storage::{StorageClient, StorageError};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProgressError>;

/// Reads and writes progress markers for recording windows.
///
/// There is no locking: concurrent writers both succeed and the most
/// recently modified marker wins the next [`read`](ProgressStore::read).
#[derive(Clone)]
pub struct ProgressStore {
    storage: StorageClient,
    layout: KeyLayout,
}

impl ProgressStore {
    pub fn new(storage: StorageClient, layout: KeyLayout) -> Self {
        Self { storage, layout }
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Latest marker under `window_prefix`, if any.
    ///
    /// A marker whose body is not a valid record is logged and treated as
    /// absent, so the window becomes eligible for a fresh start.
    pub async fn read(&self, window_prefix: &str) -> Result<Option<ProgressRecord>> {
        let objects = self.storage.list(window_prefix).await?;

        let Some(latest) = latest_marker(&objects, &self.layout) else {
            debug!(prefix = window_prefix, "No progress markers");
            return Ok(None);
        };

        let key = latest.location.to_string();
        let body = self.storage.download(&key).await?;

        match serde_json::from_slice::<ProgressRecord>(&body) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                error!(
                    key = %key,
                    body = %String::from_utf8_lossy(&body),
                    error = %e,
                    "Progress marker parse error"
                );
                Ok(None)
            }
        }
    }

    /// Write the marker for `artifact`, replacing any previous body
    pub async fn write(&self, artifact: &ArtifactKey, record: &ProgressRecord) -> Result<()> {
        let key = artifact.marker_key();
        let body = serde_json::to_vec(record)?;
        self.storage.upload(&key, body).await?;
        debug!(key = %key, ?record, "Wrote progress marker");
        Ok(())
    }
}

/// Most recently modified marker; equal timestamps go to the larger object
pub fn latest_marker<'a>(objects: &'a [ObjectMeta], layout: &KeyLayout) -> Option<&'a ObjectMeta> {
    objects
        .iter()
        .filter(|meta| layout.is_marker(meta.location.as_ref()))
        .max_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then(a.size.cmp(&b.size))
        })
}
