//! Fluffy Upload Library
//!
//! The upload pipeline: name sanitization, content classification,
//! ingestion of incoming files, the per-request manifest and details page,
//! and the orchestrator that links and stores every object of a request.

pub mod classify;
pub mod details;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod orchestrator;
pub mod response;
pub mod sanitize;

// Re-export commonly used types
pub use classify::{determine_content_disposition, determine_mime_type, probably_text};
pub use details::UploadDetailsPage;
pub use error::UploadError;
pub use ingest::{format_bytes, prepare_file, prepare_files, IncomingFile, UploadPolicy};
pub use manifest::{PendingManifest, UploadManifest, UploadType, UploadedFile};
pub use orchestrator::{link_objects, LinkedBatch, UploadOrchestrator, UploadReceipt};
pub use response::{ErrorResponse, UploadResponse, UploadedFileEntry};
pub use sanitize::{generate_unique_id, human_file_extension, sanitize_upload_name, SanitizedKey};
pub use tokio_util::sync::CancellationToken;
