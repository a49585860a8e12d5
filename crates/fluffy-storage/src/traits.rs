//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use fluffy_core::{StoredFile, StoredHtml};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Path {path} is outside of storage root {root}")]
    OutsideRoot { path: String, root: String },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (filesystem, S3, memory) implement this trait so the
/// upload pipeline never couples to a specific backend. Backends must be safe
/// to call concurrently: the upload orchestrator stores every object of a
/// request at the same time, in no particular order.
///
/// Each store takes ownership of the object; its body is released when the
/// call returns. Dropping the returned future abandons the store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a file so that it is never served as rendered HTML, even if the
    /// uploaded bytes happen to be HTML.
    async fn store_file(&self, file: StoredFile) -> StorageResult<()>;

    /// Store an HTML page so that it can be served as `text/html`.
    async fn store_html(&self, html: StoredHtml) -> StorageResult<()>;

    /// Report configuration problems. Called once at startup; a non-empty
    /// result means the service must not start.
    fn validate(&self) -> Vec<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
