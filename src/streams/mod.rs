//! Stream configuration: schema and the remote source it is fetched from

pub mod models;
pub mod source;

pub use models::StreamConfig;
pub use source::{ConfigCache, FetchError, StreamSource, parse_streams};
