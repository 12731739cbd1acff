//! Blob storage abstraction.

mod local;
mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use glob::Pattern;

use crate::error::StorageError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Blob names grouped by folder, in first-seen order.
pub type BlobFolders = Vec<(String, Vec<String>)>;

/// Trait for blob storage backends.
///
/// Reads are idempotent and writes with `overwrite = true` may be repeated,
/// so callers can retry any operation safely.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every blob name in a container, in the backend's listing order.
    async fn list_blob_names(&self, account: &str, container: &str) -> Result<Vec<String>>;

    /// Read a blob. Fails with [`StorageError::NotFound`] if it is absent.
    async fn get_content(&self, account: &str, container: &str, blob: &str) -> Result<Vec<u8>>;

    /// Write a blob, creating the container if needed.
    async fn put_content(
        &self,
        account: &str,
        container: &str,
        blob: &str,
        content: &[u8],
        overwrite: bool,
    ) -> Result<()>;

    /// List blobs matching `pattern`, grouped by their root folder.
    async fn list_blobs(&self, account: &str, container: &str, pattern: &str) -> Result<BlobFolders> {
        let names = self.list_blob_names(account, container).await?;
        group_blobs_by_root_folder(container, &names, pattern)
    }
}

/// Group blob names by their first path segment.
///
/// Blobs at the container root are prefixed with the container name, so they
/// land in a folder named after the container. Folder order and the order of
/// blobs within each folder follow `names`.
///
/// The prefixed name is not a real blob: reading `{container}/{name}` fails,
/// so invoices stored at the container root are reported as failed
/// extractions. Keep invoices inside a folder.
pub fn group_blobs_by_root_folder(
    container: &str,
    names: &[String],
    pattern: &str,
) -> Result<BlobFolders> {
    let pattern = Pattern::new(pattern).map_err(|e| StorageError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut folders: BlobFolders = Vec::new();

    for name in names.iter().filter(|n| pattern.matches(n)) {
        let blob_name = if name.contains('/') {
            name.clone()
        } else {
            format!("{}/{}", container, name)
        };
        let folder = blob_name.split('/').next().unwrap_or_default().to_string();

        match folders.iter_mut().find(|(f, _)| *f == folder) {
            Some((_, blobs)) => blobs.push(blob_name),
            None => folders.push((folder, vec![blob_name])),
        }
    }

    Ok(folders)
}
