//! Error types module
//!
//! `AppError` is the application-level error every lower-level failure is
//! eventually converted into. It separates user errors (bad input, surfaced
//! with a specific message and a 4xx status) from internal errors (storage,
//! classification, configuration), which are surfaced with a generic message.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden file extension: {0}")]
    ForbiddenExtension(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upload failed: {failed} of {total} objects could not be stored")]
    UploadFailed { failed: usize, total: usize },

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this is the caller's fault (never retried).
    pub fn is_user_error(&self) -> bool {
        self.http_status_code() < 500
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        match self {
            AppError::InvalidInput(_) | AppError::ForbiddenExtension(_) => 400,
            AppError::PayloadTooLarge(_) => 413,
            AppError::Cancelled(_) => 503,
            AppError::Classification(_)
            | AppError::Storage(_)
            | AppError::UploadFailed { .. }
            | AppError::Config(_)
            | AppError::Internal(_) => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::ForbiddenExtension(_) => "FORBIDDEN_EXTENSION",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Classification(_) => "CLASSIFICATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::UploadFailed { .. } => "UPLOAD_FAILED",
            AppError::Cancelled(_) => "CANCELLED",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg)
            | AppError::ForbiddenExtension(msg)
            | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::Classification(_) => "Failed to determine if file is text.".to_string(),
            AppError::Storage(_) | AppError::UploadFailed { .. } => {
                "Failed to store objects.".to_string()
            }
            AppError::Cancelled(_) => "The upload was cancelled before it completed.".to_string(),
            AppError::Config(_) | AppError::Internal(_) => {
                "An unexpected error occurred.".to_string()
            }
        }
    }

    fn is_sensitive(&self) -> bool {
        !self.is_user_error()
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::InvalidInput(_)
            | AppError::ForbiddenExtension(_)
            | AppError::PayloadTooLarge(_) => LogLevel::Debug,
            AppError::Cancelled(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_keep_their_message() {
        let err = AppError::ForbiddenExtension(
            "Sorry, \"evil.exe\" has a forbidden file extension.".to_string(),
        );
        assert_eq!(err.http_status_code(), 400);
        assert!(err.is_user_error());
        assert!(!err.is_sensitive());
        assert_eq!(
            err.client_message(),
            "Sorry, \"evil.exe\" has a forbidden file extension."
        );
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn storage_failures_are_generic_to_clients() {
        let err = AppError::UploadFailed {
            failed: 1,
            total: 4,
        };
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "UPLOAD_FAILED");
        assert_eq!(err.client_message(), "Failed to store objects.");
        assert!(err.is_sensitive());
        assert_eq!(
            err.to_string(),
            "Upload failed: 1 of 4 objects could not be stored"
        );
    }

    #[test]
    fn config_errors_are_internal() {
        let err = AppError::Config("S3_BUCKET must not be empty".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert_eq!(err.client_message(), "An unexpected error occurred.");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn too_large_is_413() {
        let err = AppError::PayloadTooLarge("File is too large; max size is 10.0 MiB.".into());
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "PAYLOAD_TOO_LARGE");
    }
}
