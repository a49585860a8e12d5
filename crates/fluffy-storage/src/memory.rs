//! In-memory storage backend for tests and local development.

use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use fluffy_core::{BoxedContent, StoredFile, StoredHtml};
use std::collections::HashMap;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

/// Snapshot of a stored object: its full body and every attribute the
/// backend was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub key: String,
    pub content: Vec<u8>,
    pub name: Option<String>,
    pub mime_type: String,
    pub content_disposition: String,
    pub links: Vec<String>,
    pub metadata_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, MemoryObject>>,
    htmls: Mutex<HashMap<String, MemoryObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn file(&self, key: &str) -> Option<MemoryObject> {
        self.files.lock().await.get(key).cloned()
    }

    pub async fn html(&self, key: &str) -> Option<MemoryObject> {
        self.htmls.lock().await.get(key).cloned()
    }

    pub async fn files(&self) -> HashMap<String, MemoryObject> {
        self.files.lock().await.clone()
    }

    pub async fn htmls(&self) -> HashMap<String, MemoryObject> {
        self.htmls.lock().await.clone()
    }

    async fn read_all(key: &str, content: &mut BoxedContent) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read body for {}: {}", key, e))
        })?;
        Ok(buf)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store_file(&self, mut file: StoredFile) -> StorageResult<()> {
        let key = file.key().to_string();
        validate_key(&key)?;
        let content = Self::read_all(&key, file.content_mut()).await?;
        let object = MemoryObject {
            key,
            content,
            name: file.name().map(String::from),
            mime_type: file.mime_type().to_string(),
            content_disposition: file.content_disposition().to_string(),
            links: file.links().to_vec(),
            metadata_url: file.metadata_url().map(String::from),
        };

        tracing::debug!(
            key = %object.key,
            size_bytes = object.content.len(),
            "Stored file in memory"
        );
        self.files.lock().await.insert(object.key.clone(), object);
        Ok(())
    }

    async fn store_html(&self, mut html: StoredHtml) -> StorageResult<()> {
        let key = html.key().to_string();
        validate_key(&key)?;
        let content = Self::read_all(&key, html.content_mut()).await?;
        let object = MemoryObject {
            key,
            content,
            name: None,
            mime_type: html.mime_type().to_string(),
            content_disposition: html.content_disposition().to_string(),
            links: html.links().to_vec(),
            metadata_url: html.metadata_url().map(String::from),
        };

        tracing::debug!(
            key = %object.key,
            size_bytes = object.content.len(),
            "Stored HTML in memory"
        );
        self.htmls.lock().await.insert(object.key.clone(), object);
        Ok(())
    }

    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
