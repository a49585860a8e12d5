//! Shared key checks for storage backends.
//!
//! Keys generated by the upload pipeline are flat, but the trait accepts any
//! string, so every backend rejects keys that are not clean relative paths
//! before touching storage.

use crate::traits::{StorageError, StorageResult};

/// Reject empty keys, absolute keys, and keys with empty, `.` or `..` segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }
    if key.starts_with('/') || key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "key contains invalid characters: {:?}",
            key
        )));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "key is not a clean relative path: {:?}",
            key
        )));
    }
    Ok(())
}

/// Join a configured prefix and an object key.
pub fn prefixed_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}
