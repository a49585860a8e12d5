//! JSON bodies returned to upload clients.

use crate::orchestrator::UploadReceipt;
use fluffy_core::{AppError, ErrorMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Failure body carrying the client-facing message of `err`.
    pub fn from_error(err: &AppError) -> Self {
        Self {
            success: false,
            error: Some(err.client_message()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFileEntry {
    pub bytes: u64,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// URL of the upload details page.
    pub redirect: String,
    /// URL of the metadata manifest.
    pub metadata: String,
    /// Keyed by original file name; a repeated name keeps the last file.
    pub uploaded_files: BTreeMap<String, UploadedFileEntry>,
}

impl From<&UploadReceipt> for UploadResponse {
    fn from(receipt: &UploadReceipt) -> Self {
        let uploaded_files = receipt
            .manifest
            .uploaded_files
            .iter()
            .map(|file| {
                (
                    file.name.clone(),
                    UploadedFileEntry {
                        bytes: file.bytes,
                        raw: file.raw.clone(),
                    },
                )
            })
            .collect();

        Self {
            success: true,
            error: None,
            redirect: receipt.details_url.clone(),
            metadata: receipt.metadata_url.clone(),
            uploaded_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{UploadManifest, UploadType, UploadedFile};
    use serde_json::json;

    #[test]
    fn success_body_shape() {
        let receipt = UploadReceipt {
            details_url: "https://i.example/html/d.html".to_string(),
            metadata_url: "https://i.example/m.json".to_string(),
            manifest: UploadManifest {
                server_version: "1".to_string(),
                timestamp: 0,
                upload_type: UploadType::File,
                uploaded_files: vec![UploadedFile {
                    name: "test.txt".to_string(),
                    bytes: 5,
                    raw: "https://i.example/a.txt".to_string(),
                }],
            },
        };

        let body = serde_json::to_value(UploadResponse::from(&receipt)).unwrap();
        assert_eq!(
            body,
            json!({
                "success": true,
                "redirect": "https://i.example/html/d.html",
                "metadata": "https://i.example/m.json",
                "uploaded_files": {
                    "test.txt": {"bytes": 5, "raw": "https://i.example/a.txt"}
                }
            })
        );
    }

    #[test]
    fn error_body_uses_client_message() {
        let err = AppError::UploadFailed { failed: 1, total: 3 };
        let body = serde_json::to_value(ErrorResponse::from_error(&err)).unwrap();
        assert_eq!(body, json!({"success": false, "error": "Failed to store objects."}));
    }
}
