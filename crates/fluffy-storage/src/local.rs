use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use fluffy_core::{BoxedContent, StoredFile, StoredHtml};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Local filesystem storage implementation
///
/// Files and HTML pages live under two separate roots. Serving them is left
/// to a static file server configured to send files as downloads and HTML
/// roots as pages; the presentation attributes are not persisted here.
#[derive(Clone, Debug)]
pub struct FilesystemStorage {
    object_root: PathBuf,
    html_root: PathBuf,
}

impl FilesystemStorage {
    /// Create a new FilesystemStorage instance
    ///
    /// # Arguments
    /// * `object_root` - Directory for uploaded files (e.g., "/srv/fluffy/object")
    /// * `html_root` - Directory for generated HTML pages (e.g., "/srv/fluffy/html")
    pub fn new(object_root: impl Into<PathBuf>, html_root: impl Into<PathBuf>) -> Self {
        FilesystemStorage {
            object_root: object_root.into(),
            html_root: html_root.into(),
        }
    }

    /// Create both roots if they do not exist yet.
    pub async fn create_roots(&self) -> StorageResult<()> {
        for root in [&self.object_root, &self.html_root] {
            fs::create_dir_all(root).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    pub fn object_root(&self) -> &Path {
        &self.object_root
    }

    pub fn html_root(&self) -> &Path {
        &self.html_root
    }

    /// Resolve the destination for `key` under `root`.
    ///
    /// The key's parent directory is resolved with symlinks followed and must
    /// be the resolved root or a directory below it. An existing symlink at
    /// the destination itself is refused, since creating the file would follow
    /// it.
    async fn resolve_destination(root: &Path, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let real_root = fs::canonicalize(root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to resolve storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        let key_path = Path::new(key);
        let file_name = key_path
            .file_name()
            .ok_or_else(|| StorageError::InvalidKey(format!("key has no file name: {:?}", key)))?;
        let parent = match key_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => root.join(parent),
            _ => root.to_path_buf(),
        };

        let real_parent = fs::canonicalize(&parent).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to resolve directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        if !real_parent.starts_with(&real_root) {
            return Err(StorageError::OutsideRoot {
                path: real_parent.display().to_string(),
                root: real_root.display().to_string(),
            });
        }

        let destination = real_parent.join(file_name);
        if let Ok(meta) = fs::symlink_metadata(&destination).await {
            if meta.file_type().is_symlink() {
                return Err(StorageError::OutsideRoot {
                    path: destination.display().to_string(),
                    root: real_root.display().to_string(),
                });
            }
        }

        Ok(destination)
    }

    /// Write `content` to `key` under `root`. A partially written file is
    /// removed before the error is returned.
    async fn write(&self, root: &Path, key: &str, content: &mut BoxedContent) -> StorageResult<()> {
        let path = Self::resolve_destination(root, key).await?;
        let start = Instant::now();

        let file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        let written = fill_or_remove(&path, content, file).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(())
    }
}

/// Destination file that can be made durable.
#[async_trait]
trait DurableWrite: AsyncWrite + Unpin + Send {
    async fn sync_all(&mut self) -> std::io::Result<()>;
}

#[async_trait]
impl DurableWrite for fs::File {
    async fn sync_all(&mut self) -> std::io::Result<()> {
        fs::File::sync_all(self).await
    }
}

async fn copy_and_sync<W: DurableWrite>(
    content: &mut BoxedContent,
    file: &mut W,
) -> std::io::Result<u64> {
    let written = tokio::io::copy(content, file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// Copy `content` into `file` (already created at `path`), flush and sync.
/// On any failure the file at `path` is removed.
async fn fill_or_remove<W: DurableWrite>(
    path: &Path,
    content: &mut BoxedContent,
    mut file: W,
) -> StorageResult<u64> {
    match copy_and_sync(content, &mut file).await {
        Ok(written) => Ok(written),
        Err(e) => {
            drop(file);
            if let Err(remove_err) = fs::remove_file(path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %remove_err,
                    "Failed to remove partially written file"
                );
            }
            Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )))
        }
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn store_file(&self, mut file: StoredFile) -> StorageResult<()> {
        let key = file.key().to_string();
        self.write(&self.object_root, &key, file.content_mut()).await
    }

    async fn store_html(&self, mut html: StoredHtml) -> StorageResult<()> {
        let key = html.key().to_string();
        self.write(&self.html_root, &key, html.content_mut()).await
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.object_root.as_os_str().is_empty() {
            errors.push("Filesystem object root must not be empty".to_string());
        }
        if self.html_root.as_os_str().is_empty() {
            errors.push("Filesystem HTML root must not be empty".to_string());
        }
        errors
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Filesystem
    }
}
