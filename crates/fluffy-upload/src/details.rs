//! Upload details page: the HTML object every upload request links to.

use crate::classify::is_image_mime_type;
use crate::error::UploadError;
use crate::ingest::format_bytes;
use crate::manifest::UploadManifest;
use crate::sanitize::generate_unique_id;
use askama::Template;
use fluffy_core::{StoredFile, StoredHtml};
use std::io::Cursor;

/// One row of the details page.
#[derive(Debug, Clone)]
pub struct DetailsEntry {
    pub name: String,
    pub raw: String,
    pub size: String,
    pub is_image: bool,
}

/// View model for the upload details page
#[derive(Template)]
#[template(path = "upload_details.html")]
pub struct UploadDetailsPage {
    pub branding: String,
    pub home_url: String,
    pub metadata_url: String,
    pub files: Vec<DetailsEntry>,
}

impl UploadDetailsPage {
    /// Rows follow the manifest's order; `files` supplies the MIME types.
    pub fn new(
        branding: &str,
        home_url: &str,
        metadata_url: String,
        manifest: &UploadManifest,
        files: &[StoredFile],
    ) -> Self {
        let files = manifest
            .uploaded_files
            .iter()
            .zip(files)
            .map(|(entry, file)| DetailsEntry {
                name: entry.name.clone(),
                raw: entry.raw.clone(),
                size: format_bytes(entry.bytes),
                is_image: is_image_mime_type(file.mime_type()),
            })
            .collect();

        Self {
            branding: branding.to_string(),
            home_url: home_url.to_string(),
            metadata_url,
            files,
        }
    }

    /// Render into a new HTML object with a fresh key.
    pub fn into_stored_html(self) -> Result<StoredHtml, UploadError> {
        let body = self.render()?;
        Ok(StoredHtml::new(
            format!("{}.html", generate_unique_id()),
            Box::new(Cursor::new(body.into_bytes())),
        ))
    }
}
