//! Progress markers: the only state persisted between passes

pub mod keys;
pub mod record;
pub mod store;

pub use keys::{ArtifactKey, KeyLayout, audio_format};
pub use record::ProgressRecord;
pub use store::{ProgressError, ProgressStore, latest_marker};
