use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{BlobStore, Result};
use crate::error::StorageError;

type Key = (String, String);

/// In-memory blob store. Listing order is lexical by blob name.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    containers: RwLock<BTreeMap<Key, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob, creating the container if needed.
    pub async fn insert(&self, account: &str, container: &str, blob: &str, content: impl Into<Vec<u8>>) {
        let mut containers = self.containers.write().await;
        containers
            .entry((account.to_string(), container.to_string()))
            .or_default()
            .insert(blob.to_string(), content.into());
    }

    /// Create an empty container.
    pub async fn create_container(&self, account: &str, container: &str) {
        let mut containers = self.containers.write().await;
        containers
            .entry((account.to_string(), container.to_string()))
            .or_default();
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list_blob_names(&self, account: &str, container: &str) -> Result<Vec<String>> {
        let containers = self.containers.read().await;
        containers
            .get(&(account.to_string(), container.to_string()))
            .map(|blobs| blobs.keys().cloned().collect())
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))
    }

    async fn get_content(&self, account: &str, container: &str, blob: &str) -> Result<Vec<u8>> {
        let containers = self.containers.read().await;
        containers
            .get(&(account.to_string(), container.to_string()))
            .and_then(|blobs| blobs.get(blob))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                blob: blob.to_string(),
            })
    }

    async fn put_content(
        &self,
        account: &str,
        container: &str,
        blob: &str,
        content: &[u8],
        overwrite: bool,
    ) -> Result<()> {
        let mut containers = self.containers.write().await;
        let blobs = containers
            .entry((account.to_string(), container.to_string()))
            .or_default();

        if !overwrite && blobs.contains_key(blob) {
            return Err(StorageError::AlreadyExists {
                container: container.to_string(),
                blob: blob.to_string(),
            });
        }

        blobs.insert(blob.to_string(), content.to_vec());
        Ok(())
    }
}
