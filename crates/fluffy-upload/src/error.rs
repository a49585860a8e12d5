use crate::ingest::format_bytes;
use fluffy_core::AppError;
use fluffy_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Upload pipeline errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Sorry, {name:?} has a forbidden file extension.")]
    ForbiddenExtension { name: String },

    #[error("File is too large; max size is {}.", format_bytes(.max.clone()))]
    TooLarge { size: u64, max: u64 },

    #[error("No files uploaded.")]
    NoFiles,

    #[error("Failed to determine if file is text: {0}")]
    Classification(#[source] std::io::Error),

    #[error("Failed to encode upload metadata: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to render upload details: {0}")]
    Render(#[from] askama::Error),

    #[error("Failed to store {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Store task failed: {0}")]
    TaskFailed(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Upload timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{} of {total} objects could not be stored", .errors.len())]
    StorageFailed {
        total: usize,
        errors: Vec<UploadError>,
    },
}

impl UploadError {
    /// Errors caused by the upload itself rather than by the service.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            UploadError::ForbiddenExtension { .. }
                | UploadError::TooLarge { .. }
                | UploadError::NoFiles
        )
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match err {
            UploadError::ForbiddenExtension { .. } => AppError::ForbiddenExtension(message),
            UploadError::TooLarge { .. } => AppError::PayloadTooLarge(message),
            UploadError::NoFiles => AppError::InvalidInput(message),
            UploadError::Classification(_) => AppError::Classification(message),
            UploadError::Store { .. } => AppError::Storage(message),
            UploadError::StorageFailed { total, errors } => AppError::UploadFailed {
                failed: errors.len(),
                total,
            },
            UploadError::Cancelled | UploadError::TimedOut(_) => AppError::Cancelled(message),
            UploadError::Manifest(_) | UploadError::Render(_) | UploadError::TaskFailed(_) => {
                AppError::Internal(message)
            }
        }
    }
}
