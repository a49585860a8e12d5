//! Per-request metadata manifest.
//!
//! Every upload request stores one JSON manifest next to its files. The JSON
//! shape is consumed by other tooling and must stay stable:
//!
//! ```json
//! {"server_version": "...", "timestamp": 1700000000, "upload_type": "file",
//!  "uploaded_files": [{"name": "test.txt", "bytes": 5, "raw": "https://..."}]}
//! ```

use crate::error::UploadError;
use crate::sanitize::generate_unique_id;
use fluffy_core::{FileAttributes, StoredFile, UrlPatterns};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

pub const MANIFEST_MIME_TYPE: &str = "application/json";
pub const MANIFEST_CONTENT_DISPOSITION: &str = "inline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: u64,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadManifest {
    pub server_version: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub upload_type: UploadType,
    pub uploaded_files: Vec<UploadedFile>,
}

/// A manifest together with the key it will be stored under.
#[derive(Debug, Clone)]
pub struct PendingManifest {
    key: String,
    manifest: UploadManifest,
}

impl PendingManifest {
    /// Describe `files` in order. Sizes are measured without moving the
    /// files' read positions.
    pub async fn build(
        server_version: &str,
        urls: &UrlPatterns,
        files: &mut [StoredFile],
    ) -> Result<Self, UploadError> {
        let mut uploaded_files = Vec::with_capacity(files.len());
        for file in files.iter_mut() {
            let bytes = file.size_bytes().await.map_err(UploadError::Classification)?;
            uploaded_files.push(UploadedFile {
                name: file.name().unwrap_or_default().to_string(),
                bytes,
                raw: urls.file_url(file.key()),
            });
        }

        Ok(Self {
            key: format!("{}.json", generate_unique_id()),
            manifest: UploadManifest {
                server_version: server_version.to_string(),
                timestamp: chrono::Utc::now().timestamp(),
                upload_type: UploadType::File,
                uploaded_files,
            },
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn manifest(&self) -> &UploadManifest {
        &self.manifest
    }

    pub fn url(&self, urls: &UrlPatterns) -> String {
        urls.file_url(&self.key)
    }

    /// Serialize into the File object that is stored with the request.
    pub fn to_stored_file(&self) -> Result<StoredFile, UploadError> {
        let json = serde_json::to_vec(&self.manifest)?;
        Ok(StoredFile::new(
            self.key.clone(),
            Box::new(Cursor::new(json)),
            FileAttributes {
                name: None,
                mime_type: MANIFEST_MIME_TYPE.to_string(),
                content_disposition: MANIFEST_CONTENT_DISPOSITION.to_string(),
            },
        ))
    }
}
