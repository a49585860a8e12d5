use crate::keys::{prefixed_key, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use fluffy_core::{BoxedContent, S3Settings, StoredFile, StoredHtml};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ClientOptions, ObjectStore};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// User-metadata key holding every URL of the upload request.
pub const LINKS_METADATA_KEY: &str = "fluffy-links";
/// User-metadata key holding the URL of the request's manifest.
pub const METADATA_URL_METADATA_KEY: &str = "fluffy-metadata";
/// Separator between URLs in [`LINKS_METADATA_KEY`].
pub const LINK_SEPARATOR: &str = "; ";

/// Canned ACL applied to every put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    BucketOwnerFullControl,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

/// One object write, as handed to an [`S3Client`].
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: BoxedContent,
    pub content_type: String,
    pub content_disposition: String,
    pub metadata: BTreeMap<String, String>,
    pub acl: ObjectAcl,
}

impl fmt::Debug for PutObjectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutObjectRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("metadata", &self.metadata)
            .field("acl", &self.acl)
            .finish_non_exhaustive()
    }
}

/// Minimal object-store client the S3 backend needs.
#[async_trait]
pub trait S3Client: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> StorageResult<()>;
}

/// [`S3Client`] backed by `object_store`'s Amazon S3 implementation.
///
/// Bodies are streamed through a buffered multipart writer, so large uploads
/// are never held in memory as a whole.
pub struct ObjectStoreS3Client {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    acl: ObjectAcl,
}

impl ObjectStoreS3Client {
    /// Build a client for `bucket`.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `acl` - Canned ACL sent with every request
    pub fn new(
        bucket: String,
        region: String,
        endpoint: Option<String>,
        acl: ObjectAcl,
    ) -> StorageResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-amz-acl"),
            HeaderValue::from_static(acl.as_str()),
        );

        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone())
            .with_client_options(ClientOptions::new().with_default_headers(headers));

        if let Some(endpoint) = endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            store: Arc::new(store),
            bucket,
            acl,
        })
    }
}

#[async_trait]
impl S3Client for ObjectStoreS3Client {
    async fn put_object(&self, mut request: PutObjectRequest) -> StorageResult<()> {
        if request.bucket != self.bucket {
            return Err(StorageError::ConfigError(format!(
                "Client is bound to bucket {}, got {}",
                self.bucket, request.bucket
            )));
        }
        if request.acl != self.acl {
            return Err(StorageError::ConfigError(format!(
                "Client sends ACL {}, got {}",
                self.acl.as_str(),
                request.acl.as_str()
            )));
        }

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, request.content_type.into());
        attributes.insert(
            Attribute::ContentDisposition,
            request.content_disposition.into(),
        );
        for (name, value) in request.metadata {
            attributes.insert(Attribute::Metadata(name.into()), value.into());
        }

        let mut writer = BufWriter::new(Arc::clone(&self.store), Path::from(request.key.clone()))
            .with_attributes(attributes);

        if let Err(e) = tokio::io::copy(&mut request.body, &mut writer).await {
            if let Err(abort_err) = writer.abort().await {
                tracing::warn!(
                    key = %request.key,
                    error = %abort_err,
                    "Failed to abort S3 upload"
                );
            }
            return Err(StorageError::UploadFailed(format!(
                "Failed to upload {}: {}",
                request.key, e
            )));
        }

        writer.shutdown().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to complete upload {}: {}", request.key, e))
        })
    }
}

/// S3 storage implementation
///
/// Files and HTML pages share one bucket and are separated by key prefix.
/// Each put carries the object's presentation (content type and disposition)
/// plus the request's links as user metadata.
pub struct S3Storage {
    client: Arc<dyn S3Client>,
    bucket: String,
    object_key_prefix: String,
    html_key_prefix: String,
}

impl S3Storage {
    /// Build the backend from configuration, talking to a real endpoint.
    pub fn new(settings: &S3Settings) -> StorageResult<Self> {
        let (Some(bucket), Some(region)) = (settings.bucket.clone(), settings.region.clone())
        else {
            return Err(StorageError::ConfigError(
                "S3_BUCKET and S3_REGION (or AWS_REGION) must be configured".to_string(),
            ));
        };

        let client = ObjectStoreS3Client::new(
            bucket.clone(),
            region,
            settings.endpoint.clone(),
            ObjectAcl::BucketOwnerFullControl,
        )?;

        Ok(Self::with_client(
            Arc::new(client),
            bucket,
            settings.object_key_prefix.clone(),
            settings.html_key_prefix.clone(),
        ))
    }

    /// Build the backend around an arbitrary client.
    pub fn with_client(
        client: Arc<dyn S3Client>,
        bucket: impl Into<String>,
        object_key_prefix: impl Into<String>,
        html_key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            object_key_prefix: object_key_prefix.into(),
            html_key_prefix: html_key_prefix.into(),
        }
    }

    fn metadata(links: &[String], metadata_url: Option<&str>) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        metadata.insert(LINKS_METADATA_KEY.to_string(), links.join(LINK_SEPARATOR));
        if let Some(url) = metadata_url {
            metadata.insert(METADATA_URL_METADATA_KEY.to_string(), url.to_string());
        }
        metadata
    }

    async fn put(&self, request: PutObjectRequest) -> StorageResult<()> {
        let key = request.key.clone();
        let start = Instant::now();

        self.client.put_object(request).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                "S3 upload failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn store_file(&self, file: StoredFile) -> StorageResult<()> {
        validate_key(file.key())?;
        let metadata = Self::metadata(file.links(), file.metadata_url());
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: prefixed_key(&self.object_key_prefix, file.key()),
            content_type: file.mime_type().to_string(),
            content_disposition: file.content_disposition().to_string(),
            metadata,
            acl: ObjectAcl::BucketOwnerFullControl,
            body: file.into_content(),
        };
        self.put(request).await
    }

    async fn store_html(&self, html: StoredHtml) -> StorageResult<()> {
        validate_key(html.key())?;
        let metadata = Self::metadata(html.links(), html.metadata_url());
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: prefixed_key(&self.html_key_prefix, html.key()),
            content_type: html.mime_type().to_string(),
            content_disposition: html.content_disposition().to_string(),
            metadata,
            acl: ObjectAcl::BucketOwnerFullControl,
            body: html.into_content(),
        };
        self.put(request).await
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.bucket.trim().is_empty() {
            errors.push("S3_BUCKET must not be empty".to_string());
        }
        for (name, prefix) in [
            ("S3_OBJECT_KEY_PREFIX", &self.object_key_prefix),
            ("S3_HTML_KEY_PREFIX", &self.html_key_prefix),
        ] {
            if prefix.starts_with('/') {
                errors.push(format!("{} must not start with a slash", name));
            }
            if !prefix.is_empty() && !prefix.ends_with('/') {
                errors.push(format!("{} must end with a slash", name));
            }
        }
        errors
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluffy_core::FileAttributes;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone)]
    struct RecordedPut {
        bucket: String,
        key: String,
        contents: Vec<u8>,
        content_type: String,
        content_disposition: String,
        metadata: BTreeMap<String, String>,
        acl: ObjectAcl,
    }

    #[derive(Default)]
    struct FakeS3Client {
        puts: Mutex<Vec<RecordedPut>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl S3Client for FakeS3Client {
        async fn put_object(&self, mut request: PutObjectRequest) -> StorageResult<()> {
            if let Some(msg) = &self.fail_with {
                return Err(StorageError::BackendError(msg.clone()));
            }
            let mut contents = Vec::new();
            request.body.read_to_end(&mut contents).await?;
            self.puts.lock().await.push(RecordedPut {
                bucket: request.bucket,
                key: request.key,
                contents,
                content_type: request.content_type,
                content_disposition: request.content_disposition,
                metadata: request.metadata,
                acl: request.acl,
            });
            Ok(())
        }
    }

    fn linked_file() -> StoredFile {
        StoredFile::new(
            "abc.txt",
            Box::new(Cursor::new(b"hello world".as_slice())),
            FileAttributes {
                name: Some("test.txt".to_string()),
                mime_type: "text/plain".to_string(),
                content_disposition: "inline; filename=\"test.txt\"; filename*=utf-8''test.txt"
                    .to_string(),
            },
        )
        .with_links(
            vec![
                "https://i.example/abc.txt".to_string(),
                "https://i.example/m.json".to_string(),
            ],
            "https://i.example/m.json".to_string(),
        )
    }

    #[tokio::test]
    async fn file_put_carries_presentation_and_links() {
        let client = Arc::new(FakeS3Client::default());
        let storage = S3Storage::with_client(client.clone(), "my-bucket", "object/", "html/");

        storage.store_file(linked_file()).await.unwrap();

        let puts = client.puts.lock().await;
        assert_eq!(puts.len(), 1);
        let put = &puts[0];
        assert_eq!(put.bucket, "my-bucket");
        assert_eq!(put.key, "object/abc.txt");
        assert_eq!(put.contents, b"hello world");
        assert_eq!(put.content_type, "text/plain");
        assert_eq!(
            put.content_disposition,
            "inline; filename=\"test.txt\"; filename*=utf-8''test.txt"
        );
        assert_eq!(put.acl, ObjectAcl::BucketOwnerFullControl);
        assert_eq!(
            put.metadata.get(LINKS_METADATA_KEY).map(String::as_str),
            Some("https://i.example/abc.txt; https://i.example/m.json")
        );
        assert_eq!(
            put.metadata.get(METADATA_URL_METADATA_KEY).map(String::as_str),
            Some("https://i.example/m.json")
        );
    }

    #[tokio::test]
    async fn html_put_uses_html_prefix_and_presentation() {
        let client = Arc::new(FakeS3Client::default());
        let storage = S3Storage::with_client(client.clone(), "my-bucket", "object/", "html/");

        let html = StoredHtml::new("page.html", Box::new(Cursor::new(b"<p>x</p>".as_slice())))
            .with_links(vec![], "https://i.example/m.json".to_string());
        storage.store_html(html).await.unwrap();

        let puts = client.puts.lock().await;
        assert_eq!(puts[0].key, "html/page.html");
        assert_eq!(puts[0].content_type, "text/html; charset=utf-8");
        assert_eq!(puts[0].content_disposition, "inline");
        assert_eq!(
            puts[0].metadata.get(LINKS_METADATA_KEY).map(String::as_str),
            Some("")
        );
    }

    #[tokio::test]
    async fn client_errors_are_propagated() {
        let client = Arc::new(FakeS3Client {
            fail_with: Some("access denied".to_string()),
            ..Default::default()
        });
        let storage = S3Storage::with_client(client, "my-bucket", "object/", "html/");

        let err = storage.store_file(linked_file()).await.unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn validate_reports_bad_settings() {
        let client = Arc::new(FakeS3Client::default());
        let storage = S3Storage::with_client(client, "", "/x", "y");
        assert_eq!(storage.validate().len(), 4);
        assert_eq!(storage.backend_type(), StorageBackend::S3);
    }

    #[test]
    fn new_requires_bucket_and_region() {
        let err = S3Storage::new(&S3Settings::default()).err().unwrap();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }
}
