use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{BlobStore, Result};
use crate::error::StorageError;

/// Blob store backed by a local directory tree.
///
/// Layout is `{root}/{account}/{container}/{blob}`, where blob names use `/`
/// as the separator. Listing is recursive and lexically sorted.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, account: &str, container: &str) -> Result<PathBuf> {
        check_segment(account)?;
        check_segment(container)?;
        Ok(self.root.join(account).join(container))
    }

    fn blob_path(&self, account: &str, container: &str, blob: &str) -> Result<PathBuf> {
        let mut path = self.container_path(account, container)?;
        let relative = Path::new(blob);
        if blob.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidName(blob.to_string()));
        }
        path.push(relative);
        Ok(path)
    }
}

fn check_segment(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list_blob_names(&self, account: &str, container: &str) -> Result<Vec<String>> {
        let base = self.container_path(account, container)?;
        if !fs::try_exists(&base).await? {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }

        let mut names = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                    // In-flight writes
                    if name.ends_with(".tmp") && name.starts_with('.') {
                        continue;
                    }
                    if let Ok(relative) = path.strip_prefix(&base) {
                        let parts: Vec<String> = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect();
                        names.push(parts.join("/"));
                    }
                }
            }
        }

        names.sort();
        debug!(container, count = names.len(), "listed blobs");
        Ok(names)
    }

    async fn get_content(&self, account: &str, container: &str, blob: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(account, container, blob)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                container: container.to_string(),
                blob: blob.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_content(
        &self,
        account: &str,
        container: &str,
        blob: &str,
        content: &[u8],
        overwrite: bool,
    ) -> Result<()> {
        let path = self.blob_path(account, container, blob)?;

        if !overwrite && fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists {
                container: container.to_string(),
                blob: blob.to_string(),
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        debug!(container, blob, bytes = content.len(), "wrote blob");
        Ok(())
    }
}
