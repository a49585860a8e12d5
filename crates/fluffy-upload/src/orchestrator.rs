//! Upload orchestration.
//!
//! One upload request produces the user's files, one metadata manifest and
//! one or more HTML pages. All of them are stamped with the same link set
//! (the URL of every object in the request) and the manifest URL, then
//! stored concurrently. Store failures are collected per object and never
//! cancel siblings.
//!
//! Cancellation and the optional global deadline abort every store that is
//! still in flight; the caller then gets the cancellation as the only error.

use crate::details::UploadDetailsPage;
use crate::error::UploadError;
use crate::ingest::{prepare_files, IncomingFile, UploadPolicy};
use crate::manifest::{PendingManifest, UploadManifest};
use fluffy_core::{Config, StoredFile, StoredHtml, UrlPatterns};
use fluffy_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Objects of one request, stamped with their shared links.
#[derive(Debug)]
pub struct LinkedBatch {
    pub files: Vec<StoredFile>,
    pub htmls: Vec<StoredHtml>,
    pub links: Vec<String>,
}

/// Stamp every object with the URLs of all objects and with `metadata_url`.
///
/// Links list files first (in order), then HTML pages.
pub fn link_objects(
    urls: &UrlPatterns,
    files: Vec<StoredFile>,
    htmls: Vec<StoredHtml>,
    metadata_url: &str,
) -> LinkedBatch {
    let links: Vec<String> = files
        .iter()
        .map(|file| urls.file_url(file.key()))
        .chain(htmls.iter().map(|html| urls.html_url(html.key())))
        .collect();

    let files = files
        .into_iter()
        .map(|file| file.with_links(links.clone(), metadata_url.to_string()))
        .collect();
    let htmls = htmls
        .into_iter()
        .map(|html| html.with_links(links.clone(), metadata_url.to_string()))
        .collect();

    LinkedBatch {
        files,
        htmls,
        links,
    }
}

/// Outcome of a successful upload request.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// URL of the upload details page; where a browser is sent afterwards.
    pub details_url: String,
    pub metadata_url: String,
    pub manifest: UploadManifest,
}

pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    urls: UrlPatterns,
    policy: UploadPolicy,
    server_version: String,
    branding: String,
    home_url: String,
    max_concurrent_stores: usize,
    global_timeout: Option<Duration>,
}

impl UploadOrchestrator {
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self {
            storage,
            urls: config.urls.clone(),
            policy: UploadPolicy::from_config(config),
            server_version: config.server_version.clone(),
            branding: config.branding.clone(),
            home_url: config.home_url.clone(),
            max_concurrent_stores: config.max_concurrent_stores,
            global_timeout: config.global_timeout(),
        }
    }

    pub fn with_max_concurrent_stores(mut self, max_concurrent_stores: usize) -> Self {
        self.max_concurrent_stores = max_concurrent_stores;
        self
    }

    pub fn with_global_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.global_timeout = timeout;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn urls(&self) -> &UrlPatterns {
        &self.urls
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Build the manifest for `files`. Must run before [`Self::upload_objects`].
    pub async fn build_manifest(
        &self,
        files: &mut [StoredFile],
    ) -> Result<PendingManifest, UploadError> {
        PendingManifest::build(&self.server_version, &self.urls, files).await
    }

    /// Details page listing `files`, linking back to the manifest.
    pub fn details_page(
        &self,
        manifest: &PendingManifest,
        files: &[StoredFile],
    ) -> UploadDetailsPage {
        UploadDetailsPage::new(
            &self.branding,
            &self.home_url,
            manifest.url(&self.urls),
            manifest.manifest(),
            files,
        )
    }

    /// Store `files`, the manifest and `htmls` concurrently.
    ///
    /// Returns every per-object failure, or only [`UploadError::Cancelled`] /
    /// [`UploadError::TimedOut`] when the request is cancelled or runs out
    /// of time first. An empty result means every object was stored.
    pub async fn upload_objects(
        &self,
        cancel: &CancellationToken,
        mut files: Vec<StoredFile>,
        htmls: Vec<StoredHtml>,
        manifest: &PendingManifest,
    ) -> Vec<UploadError> {
        match manifest.to_stored_file() {
            Ok(manifest_file) => files.push(manifest_file),
            Err(e) => return vec![e],
        }

        let metadata_url = manifest.url(&self.urls);
        let batch = link_objects(&self.urls, files, htmls, &metadata_url);
        let file_count = batch.files.len();
        let html_count = batch.htmls.len();

        tracing::info!(files = file_count, htmls = html_count, "Uploading objects");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_stores.max(1)));
        let mut tasks = JoinSet::new();

        for (i, file) in batch.files.into_iter().enumerate() {
            let storage = Arc::clone(&self.storage);
            let semaphore = Arc::clone(&semaphore);
            let index = format!("{}/{}", i + 1, file_count);
            tasks.spawn(store_file(storage, semaphore, file, index));
        }
        for (i, html) in batch.htmls.into_iter().enumerate() {
            let storage = Arc::clone(&self.storage);
            let semaphore = Arc::clone(&semaphore);
            let index = format!("{}/{}", i + 1, html_count);
            tasks.spawn(store_html(storage, semaphore, html, index));
        }

        let deadline = self.global_timeout;
        let timer = async move {
            match deadline {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        let mut errors = Vec::new();
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    tracing::warn!(
                        in_flight = tasks.len(),
                        "Upload cancelled while storing objects"
                    );
                    return vec![UploadError::Cancelled];
                }
                _ = &mut timer => {
                    tasks.abort_all();
                    let timeout = deadline.unwrap_or_default();
                    tracing::error!(
                        in_flight = tasks.len(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Upload timed out while storing objects"
                    );
                    return vec![UploadError::TimedOut(timeout)];
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => errors.push(e),
                    Some(Err(join_err)) => {
                        tracing::error!(error = %join_err, "Store task failed");
                        errors.push(UploadError::TaskFailed(join_err.to_string()));
                    }
                },
            }
        }

        let total = file_count + html_count;
        if errors.is_empty() {
            tracing::info!(files = file_count, htmls = html_count, "Successfully uploaded");
        } else {
            tracing::error!(
                success_count = total - errors.len(),
                error_count = errors.len(),
                files = file_count,
                htmls = html_count,
                "Upload failed with errors"
            );
        }

        errors
    }

    /// Run a whole upload request: prepare, describe, link and store.
    ///
    /// Preparation failures abort before anything is stored. Any store
    /// failure fails the request as [`UploadError::StorageFailed`], since
    /// the stored objects would link to something that does not exist.
    pub async fn upload(
        &self,
        cancel: &CancellationToken,
        incoming: Vec<IncomingFile>,
    ) -> Result<UploadReceipt, UploadError> {
        let mut files = prepare_files(incoming, &self.policy).await?;
        let manifest = self.build_manifest(&mut files).await?;
        let details = self.details_page(&manifest, &files).into_stored_html()?;

        let details_url = self.urls.html_url(details.key());
        let metadata_url = manifest.url(&self.urls);
        let total = files.len() + 2;

        let mut errors = self
            .upload_objects(cancel, files, vec![details], &manifest)
            .await;

        if !errors.is_empty() {
            let is_store_error = |e: &UploadError| {
                matches!(e, UploadError::Store { .. } | UploadError::TaskFailed(_))
            };
            if errors.len() == 1 && !is_store_error(&errors[0]) {
                if let Some(err) = errors.pop() {
                    return Err(err);
                }
            }
            return Err(UploadError::StorageFailed { total, errors });
        }

        Ok(UploadReceipt {
            details_url,
            metadata_url,
            manifest: manifest.manifest().clone(),
        })
    }
}

async fn store_file(
    storage: Arc<dyn Storage>,
    semaphore: Arc<Semaphore>,
    file: StoredFile,
    index: String,
) -> Result<(), UploadError> {
    let key = file.key().to_string();
    let name = file.name().unwrap_or_default().to_string();
    let mime_type = file.mime_type().to_string();

    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| UploadError::TaskFailed(e.to_string()))?;

    tracing::info!(
        file_key = %key,
        file_name = %name,
        file_mime_type = %mime_type,
        file_upload_index = %index,
        "Storing file"
    );

    match storage.store_file(file).await {
        Ok(()) => {
            tracing::info!(file_key = %key, file_upload_index = %index, "Successfully stored file");
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                file_key = %key,
                file_name = %name,
                file_mime_type = %mime_type,
                file_upload_index = %index,
                "Storing file failed"
            );
            Err(UploadError::Store { key, source: e })
        }
    }
}

async fn store_html(
    storage: Arc<dyn Storage>,
    semaphore: Arc<Semaphore>,
    html: StoredHtml,
    index: String,
) -> Result<(), UploadError> {
    let key = html.key().to_string();

    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| UploadError::TaskFailed(e.to_string()))?;

    tracing::info!(html_key = %key, html_upload_index = %index, "Storing HTML");

    match storage.store_html(html).await {
        Ok(()) => {
            tracing::info!(html_key = %key, html_upload_index = %index, "Successfully stored HTML");
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                html_key = %key,
                html_upload_index = %index,
                "Storing HTML failed"
            );
            Err(UploadError::Store { key, source: e })
        }
    }
}
