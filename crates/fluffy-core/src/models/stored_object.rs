//! Stored objects
//!
//! A stored object is one artifact produced by an upload request: either a
//! user file (or the generated metadata manifest) or an HTML page. Every
//! object carries the URLs of all of its siblings and the URL of the request's
//! manifest. Those are stamped in a second pass with [`StoredFile::with_links`]
//! / [`StoredHtml::with_links`] once every key in the request is known.

use std::fmt;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};

/// MIME type every HTML object is served with.
pub const HTML_MIME_TYPE: &str = "text/html; charset=utf-8";

/// Content-Disposition every HTML object is served with.
pub const HTML_CONTENT_DISPOSITION: &str = "inline";

/// Readable, seekable object body.
///
/// Dropping the value releases the underlying handle.
pub trait ObjectContent: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> ObjectContent for T where T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized {}

pub type BoxedContent = Box<dyn ObjectContent>;

/// Total length of a seekable body. The read position is left where it was.
pub async fn content_length<R>(reader: &mut R) -> std::io::Result<u64>
where
    R: AsyncSeek + Unpin + ?Sized,
{
    let current = reader.stream_position().await?;
    let end = reader.seek(SeekFrom::End(0)).await?;
    reader.seek(SeekFrom::Start(current)).await?;
    Ok(end)
}

/// Per-file presentation attributes resolved during ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    /// Original human file name (not sanitized, not unique). `None` for
    /// server-generated files such as the manifest.
    pub name: Option<String>,
    pub mime_type: String,
    pub content_disposition: String,
}

/// A file to be stored.
///
/// Backends must store it such that it is never rendered as HTML, regardless
/// of its contents.
pub struct StoredFile {
    key: String,
    attributes: FileAttributes,
    links: Vec<String>,
    metadata_url: Option<String>,
    content: BoxedContent,
}

impl StoredFile {
    pub fn new(key: impl Into<String>, content: BoxedContent, attributes: FileAttributes) -> Self {
        Self {
            key: key.into(),
            attributes,
            links: Vec::new(),
            metadata_url: None,
            content,
        }
    }

    /// Stamp the request-wide link set and manifest URL.
    pub fn with_links(mut self, links: Vec<String>, metadata_url: String) -> Self {
        self.links = links;
        self.metadata_url = Some(metadata_url);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.name.as_deref()
    }

    pub fn mime_type(&self) -> &str {
        &self.attributes.mime_type
    }

    pub fn content_disposition(&self) -> &str {
        &self.attributes.content_disposition
    }

    pub fn attributes(&self) -> &FileAttributes {
        &self.attributes
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn metadata_url(&self) -> Option<&str> {
        self.metadata_url.as_deref()
    }

    pub fn content_mut(&mut self) -> &mut BoxedContent {
        &mut self.content
    }

    /// Give up the attributes and keep only the body.
    pub fn into_content(self) -> BoxedContent {
        self.content
    }

    pub async fn size_bytes(&mut self) -> std::io::Result<u64> {
        content_length(&mut self.content).await
    }
}

impl fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredFile")
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .field("links", &self.links)
            .field("metadata_url", &self.metadata_url)
            .finish_non_exhaustive()
    }
}

/// An HTML page to be stored and later served as `text/html`.
pub struct StoredHtml {
    key: String,
    links: Vec<String>,
    metadata_url: Option<String>,
    content: BoxedContent,
}

impl StoredHtml {
    pub fn new(key: impl Into<String>, content: BoxedContent) -> Self {
        Self {
            key: key.into(),
            links: Vec::new(),
            metadata_url: None,
            content,
        }
    }

    /// Stamp the request-wide link set and manifest URL.
    pub fn with_links(mut self, links: Vec<String>, metadata_url: String) -> Self {
        self.links = links;
        self.metadata_url = Some(metadata_url);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn mime_type(&self) -> &'static str {
        HTML_MIME_TYPE
    }

    pub fn content_disposition(&self) -> &'static str {
        HTML_CONTENT_DISPOSITION
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn metadata_url(&self) -> Option<&str> {
        self.metadata_url.as_deref()
    }

    pub fn content_mut(&mut self) -> &mut BoxedContent {
        &mut self.content
    }

    /// Give up the attributes and keep only the body.
    pub fn into_content(self) -> BoxedContent {
        self.content
    }

    pub async fn size_bytes(&mut self) -> std::io::Result<u64> {
        content_length(&mut self.content).await
    }
}

impl fmt::Debug for StoredHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredHtml")
            .field("key", &self.key)
            .field("links", &self.links)
            .field("metadata_url", &self.metadata_url)
            .finish_non_exhaustive()
    }
}
