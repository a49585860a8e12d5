//! Turning incoming uploads into [`StoredFile`]s.

use crate::classify::{determine_content_disposition, determine_mime_type, probably_text};
use crate::error::UploadError;
use crate::sanitize::sanitize_upload_name;
use fluffy_core::models::content_length;
use fluffy_core::{BoxedContent, Config, FileAttributes, StoredFile};
use std::collections::BTreeSet;
use std::fmt;

/// Name given to uploads that arrive without a file name.
pub const DEFAULT_UPLOAD_NAME: &str = "file";

/// One user-submitted file, as extracted from a request.
pub struct IncomingFile {
    /// File name as sent by the client. May contain path components.
    pub name: String,
    /// Content type as sent by the client; empty when absent.
    pub declared_content_type: String,
    pub content: BoxedContent,
}

impl IncomingFile {
    pub fn new(
        name: impl Into<String>,
        declared_content_type: impl Into<String>,
        content: BoxedContent,
    ) -> Self {
        Self {
            name: name.into(),
            declared_content_type: declared_content_type.into(),
            content,
        }
    }
}

impl fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFile")
            .field("name", &self.name)
            .field("declared_content_type", &self.declared_content_type)
            .finish_non_exhaustive()
    }
}

/// Limits applied to every incoming file.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub forbidden_extensions: BTreeSet<String>,
    pub max_upload_bytes: u64,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            forbidden_extensions: config.forbidden_file_extensions.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Format a byte count with binary units, truncating to one decimal
/// (`1023.9 MiB` rather than a rounded `1024.0 MiB`).
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    let (unit, suffix) = match bytes {
        b if b >= GIB => (GIB, "GiB"),
        b if b >= MIB => (MIB, "MiB"),
        b if b >= KIB => (KIB, "KiB"),
        1 => return "1 byte".to_string(),
        b => return format!("{} bytes", b),
    };
    let whole = bytes / unit;
    let tenths = (bytes % unit) * 10 / unit;
    format!("{}.{} {}", whole, tenths, suffix)
}

/// Sanitize, size-check and classify one upload.
///
/// Nothing is written anywhere; the returned file still owns the content.
pub async fn prepare_file(
    incoming: IncomingFile,
    policy: &UploadPolicy,
) -> Result<StoredFile, UploadError> {
    let IncomingFile {
        name,
        declared_content_type,
        mut content,
    } = incoming;
    let name = if name.is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        name
    };

    let size = content_length(&mut content)
        .await
        .map_err(UploadError::Classification)?;
    if size > policy.max_upload_bytes {
        tracing::info!(file_name = %name, size_bytes = size, "File too large");
        return Err(UploadError::TooLarge {
            size,
            max: policy.max_upload_bytes,
        });
    }

    let key = sanitize_upload_name(&name, &policy.forbidden_extensions).inspect_err(|_| {
        tracing::info!(file_name = %name, "Forbidden extension");
    })?;

    let is_text = probably_text(&mut content)
        .await
        .map_err(UploadError::Classification)?;
    let mime_type = determine_mime_type(&name, &declared_content_type, is_text);
    let content_disposition = determine_content_disposition(&name, &mime_type, is_text);

    Ok(StoredFile::new(
        key.key(),
        content,
        FileAttributes {
            name: Some(name),
            mime_type,
            content_disposition,
        },
    ))
}

/// Prepare every upload of a request. The first failure aborts the batch.
pub async fn prepare_files(
    incoming: Vec<IncomingFile>,
    policy: &UploadPolicy,
) -> Result<Vec<StoredFile>, UploadError> {
    if incoming.is_empty() {
        return Err(UploadError::NoFiles);
    }
    let mut files = Vec::with_capacity(incoming.len());
    for file in incoming {
        files.push(prepare_file(file, policy).await?);
    }
    Ok(files)
}
