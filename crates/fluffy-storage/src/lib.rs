//! Fluffy Storage Library
//!
//! This crate provides the [`Storage`] capability trait and its backends:
//! local filesystem, S3-compatible object store, and an in-memory backend used
//! by tests and development setups.
//!
//! # Key format
//!
//! Keys are flat: a random unique ID plus the upload's human file extension
//! (`k3XbT....tar.gz`). Backends never derive a location from the user's file
//! name. Keys must be clean relative paths (see the `keys` module); the
//! filesystem backend additionally resolves every destination and refuses to
//! write outside its root.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-filesystem")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use fluffy_core::StorageBackend;
#[cfg(feature = "storage-filesystem")]
pub use local::FilesystemStorage;
pub use memory::{MemoryObject, MemoryStorage};
#[cfg(feature = "storage-s3")]
pub use s3::{ObjectAcl, PutObjectRequest, S3Client, S3Storage};
pub use traits::{Storage, StorageError, StorageResult};
