//! Object storage abstraction for progress markers
//! Uses Apache Arrow object_store crate

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectMeta, ObjectStore, path::Path as StoragePath};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Build the backend named by `config.provider`
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.provider {
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                if let Some(access_key) = &config.access_key {
                    builder = builder.with_access_key_id(access_key);
                }
                if let Some(secret_key) = &config.secret_key {
                    builder = builder.with_secret_access_key(secret_key);
                }
                Arc::new(builder.build()?)
            }
            StorageProvider::Local => {
                let root = config.root.as_ref().ok_or_else(|| {
                    StorageError::InvalidConfig("local provider requires storage.root".to_string())
                })?;
                std::fs::create_dir_all(root)?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            StorageProvider::Memory => Arc::new(InMemory::new()),
        };

        tracing::info!(provider = ?config.provider, bucket = %config.bucket, "Storage configured");

        Ok(Self::new(store))
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = StoragePath::from(key);
        let size = data.len();

        self.store.put(&path, data.into()).await?;

        tracing::debug!(key, size, "Uploaded to storage");

        Ok(())
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = self.store.get(&path).await?;

        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Downloaded from storage");

        Ok(bytes.to_vec())
    }

    /// List the objects directly under `prefix`
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let path = StoragePath::from(prefix);

        let listing = self.store.list_with_delimiter(Some(&path)).await?;

        tracing::debug!(prefix, count = listing.objects.len(), "Listed storage prefix");

        Ok(listing.objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_list_download() {
        let storage = StorageClient::in_memory();

        storage.upload("a/b/one.progress", b"{}".to_vec()).await.unwrap();
        storage.upload("a/b/two.mp3", b"audio".to_vec()).await.unwrap();
        storage.upload("a/c/three.progress", b"{}".to_vec()).await.unwrap();

        let listed = storage.list("a/b").await.unwrap();
        let mut keys: Vec<String> = listed.iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        assert_eq!(keys, vec!["a/b/one.progress", "a/b/two.mp3"]);

        assert_eq!(storage.download("a/b/two.mp3").await.unwrap(), b"audio");
        assert!(storage.download("a/c/missing").await.is_err());
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let storage = StorageClient::in_memory();
        assert!(storage.list("nothing/here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_provider() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            provider: StorageProvider::Local,
            root: Some(temp_dir.path().join("store")),
            ..Default::default()
        };

        let storage = StorageClient::from_config(&config).unwrap();
        storage.upload("x/y.progress", b"{}".to_vec()).await.unwrap();

        let listed = storage.list("x").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 2);
    }
}
