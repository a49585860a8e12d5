//! Fluffy Core Library
//!
//! This crate provides the domain model, error types and configuration shared
//! by the storage backends, the upload pipeline and the binaries.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, S3Settings, UrlPatterns};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{BoxedContent, FileAttributes, ObjectContent, StoredFile, StoredHtml};
pub use storage_types::StorageBackend;
