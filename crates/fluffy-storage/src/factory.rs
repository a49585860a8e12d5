#[cfg(feature = "storage-filesystem")]
use crate::FilesystemStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{MemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use fluffy_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
///
/// The backend is validated before it is returned; any reported problem is
/// a startup error.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => Arc::new(S3Storage::new(&config.s3)?),

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => {
            return Err(StorageError::ConfigError(
                "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
            ))
        }

        #[cfg(feature = "storage-filesystem")]
        StorageBackend::Filesystem => {
            let storage = FilesystemStorage::new(&config.object_root, &config.html_root);
            // Validate before creating directories.
            ensure_valid(&storage)?;
            storage.create_roots().await?;
            return Ok(ready(Arc::new(storage)));
        }

        #[cfg(not(feature = "storage-filesystem"))]
        StorageBackend::Filesystem => {
            return Err(StorageError::ConfigError(
                "Filesystem storage backend not available (storage-filesystem feature not enabled)"
                    .to_string(),
            ))
        }

        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    ensure_valid(storage.as_ref())?;
    Ok(ready(storage))
}

fn ready(storage: Arc<dyn Storage>) -> Arc<dyn Storage> {
    tracing::info!(backend = %storage.backend_type(), "Storage backend ready");
    storage
}

fn ensure_valid(storage: &dyn Storage) -> StorageResult<()> {
    let errors = storage.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StorageError::ConfigError(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, String)]) -> Config {
        let pairs = pairs.to_vec();
        Config::from_vars(move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn creates_memory_backend() {
        let storage = create_storage(&config(&[("STORAGE_BACKEND", "memory".to_string())]))
            .await
            .unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[cfg(feature = "storage-filesystem")]
    #[tokio::test]
    async fn creates_filesystem_roots() {
        let dir = tempfile::TempDir::new().unwrap();
        let object_root = dir.path().join("object");
        let html_root = dir.path().join("html");
        let storage = create_storage(&config(&[
            ("STORAGE_BACKEND", "filesystem".to_string()),
            ("OBJECT_ROOT", object_root.display().to_string()),
            ("HTML_ROOT", html_root.display().to_string()),
        ]))
        .await
        .unwrap();

        assert_eq!(storage.backend_type(), StorageBackend::Filesystem);
        assert!(object_root.is_dir());
        assert!(html_root.is_dir());
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn s3_without_bucket_is_rejected() {
        let result = create_storage(&config(&[("STORAGE_BACKEND", "s3".to_string())])).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn s3_settings_are_reported_once() {
        let result = create_storage(&config(&[
            ("STORAGE_BACKEND", "s3".to_string()),
            ("S3_BUCKET", "uploads".to_string()),
            ("S3_REGION", "us-east-1".to_string()),
            ("S3_HTML_KEY_PREFIX", "html".to_string()),
        ]))
        .await;

        match result {
            Err(StorageError::ConfigError(msg)) => {
                assert_eq!(msg, "S3_HTML_KEY_PREFIX must end with a slash");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("invalid prefix was accepted"),
        }
    }
}
