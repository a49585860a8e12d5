//! Configuration module
//!
//! Configuration is read from the environment (optionally seeded from a `.env`
//! file) once at startup. [`Config::validate`] reports every problem at once so
//! the process can refuse to start with a complete list.

use std::collections::BTreeSet;
use std::env;

use serde::Serialize;

use crate::storage_types::StorageBackend;

const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const MAX_MULTIPART_MEMORY_BYTES: u64 = 10 * 1024 * 1024;
const MAX_CONCURRENT_STORES: usize = 16;
const DEFAULT_OBJECT_ROOT: &str = "tmp/object";
const DEFAULT_HTML_ROOT: &str = "tmp/html";
const DEFAULT_HOME_URL: &str = "http://localhost:8080";
const DEFAULT_FILE_URL_PATTERN: &str = "http://localhost:8080/dev/storage/object/:key:";
const DEFAULT_HTML_URL_PATTERN: &str = "http://localhost:8080/dev/storage/html/:key:";

/// Placeholder substituted with an object key in URL patterns.
pub const KEY_PLACEHOLDER: &str = ":key:";

/// Templates turning a stored key into its public URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UrlPatterns {
    pub file: String,
    pub html: String,
}

impl UrlPatterns {
    pub fn new(file: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            html: html.into(),
        }
    }

    pub fn file_url(&self, key: &str) -> String {
        self.file.replace(KEY_PLACEHOLDER, key)
    }

    pub fn html_url(&self, key: &str) -> String {
        self.html.replace(KEY_PLACEHOLDER, key)
    }

    fn validate(&self, errors: &mut Vec<String>) {
        for (var, pattern) in [("FILE_URL_PATTERN", &self.file), ("HTML_URL_PATTERN", &self.html)] {
            if !pattern.contains(KEY_PLACEHOLDER) {
                errors.push(format!(
                    "{} must contain a '{}' placeholder",
                    var, KEY_PLACEHOLDER
                ));
            }
            if !is_http_url(pattern) {
                errors.push(format!("{} must be an http(s) URL", var));
            }
        }
    }
}

/// Object-store (S3-compatible) settings.
#[derive(Clone, Debug, Default, Serialize)]
pub struct S3Settings {
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, etc.).
    pub endpoint: Option<String>,
    pub object_key_prefix: String,
    pub html_key_prefix: String,
}

/// Application configuration.
#[derive(Clone, Debug, Serialize)]
pub struct Config {
    pub server_version: String,
    pub branding: String,
    pub home_url: String,
    pub storage_backend: StorageBackend,
    pub object_root: String,
    pub html_root: String,
    pub s3: S3Settings,
    pub urls: UrlPatterns,
    /// Lower-case, no leading dot. Entries may contain dots (`tar.gz`).
    pub forbidden_file_extensions: BTreeSet<String>,
    pub max_upload_bytes: u64,
    /// In-memory buffering threshold for the HTTP layer's multipart
    /// parser. Only validated here; upload size is bounded by
    /// `max_upload_bytes`.
    pub max_multipart_memory_bytes: u64,
    /// 0 disables the deadline.
    pub global_timeout_ms: u64,
    pub max_concurrent_stores: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|s| !s.trim().is_empty());

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(s) => s.parse::<StorageBackend>()?,
            None => StorageBackend::Filesystem,
        };

        let forbidden_file_extensions = var("FORBIDDEN_FILE_EXTENSIONS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            server_version: non_empty("FLUFFY_SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            branding: non_empty("BRANDING").unwrap_or_else(|| "fluffy".to_string()),
            home_url: non_empty("HOME_URL").unwrap_or_else(|| DEFAULT_HOME_URL.to_string()),
            storage_backend,
            object_root: non_empty("OBJECT_ROOT")
                .unwrap_or_else(|| DEFAULT_OBJECT_ROOT.to_string()),
            html_root: non_empty("HTML_ROOT").unwrap_or_else(|| DEFAULT_HTML_ROOT.to_string()),
            s3: S3Settings {
                bucket: non_empty("S3_BUCKET"),
                region: non_empty("S3_REGION").or_else(|| non_empty("AWS_REGION")),
                endpoint: non_empty("S3_ENDPOINT"),
                object_key_prefix: var("S3_OBJECT_KEY_PREFIX").unwrap_or_default(),
                html_key_prefix: var("S3_HTML_KEY_PREFIX").unwrap_or_default(),
            },
            urls: UrlPatterns::new(
                non_empty("FILE_URL_PATTERN")
                    .unwrap_or_else(|| DEFAULT_FILE_URL_PATTERN.to_string()),
                non_empty("HTML_URL_PATTERN")
                    .unwrap_or_else(|| DEFAULT_HTML_URL_PATTERN.to_string()),
            ),
            forbidden_file_extensions,
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", MAX_UPLOAD_BYTES)?,
            max_multipart_memory_bytes: parse_or(
                &var,
                "MAX_MULTIPART_MEMORY_BYTES",
                MAX_MULTIPART_MEMORY_BYTES,
            )?,
            global_timeout_ms: parse_or(&var, "GLOBAL_TIMEOUT_MS", 0)?,
            max_concurrent_stores: parse_or(&var, "MAX_CONCURRENT_STORES", MAX_CONCURRENT_STORES)?,
        })
    }

    /// Check every setting and report all problems at once.
    ///
    /// Backends run their own `validate()` on top of this when they are built.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_version.is_empty() {
            errors.push("FLUFFY_SERVER_VERSION must not be empty".to_string());
        }
        if self.branding.is_empty() {
            errors.push("BRANDING must not be empty".to_string());
        }
        if self.max_upload_bytes == 0 {
            errors.push("MAX_UPLOAD_BYTES must be greater than 0".to_string());
        }
        if self.max_multipart_memory_bytes == 0 {
            errors.push("MAX_MULTIPART_MEMORY_BYTES must be greater than 0".to_string());
        }
        if self.max_concurrent_stores == 0 {
            errors.push("MAX_CONCURRENT_STORES must be greater than 0".to_string());
        }
        if !is_http_url(&self.home_url) {
            errors.push("HOME_URL must be an http(s) URL".to_string());
        } else if self.home_url.ends_with('/') {
            errors.push("HOME_URL must not end with a slash".to_string());
        }
        self.urls.validate(&mut errors);
        if self.storage_backend == StorageBackend::S3 {
            if self.s3.bucket.is_none() {
                errors.push("S3_BUCKET is required for the s3 backend".to_string());
            }
            if self.s3.region.is_none() {
                errors.push("S3_REGION or AWS_REGION is required for the s3 backend".to_string());
            }
        }
        for ext in &self.forbidden_file_extensions {
            if ext.starts_with('.') {
                errors.push(format!(
                    "FORBIDDEN_FILE_EXTENSIONS should not start with a dot: {}",
                    ext
                ));
            }
            if ext.to_lowercase() != *ext {
                errors.push(format!(
                    "FORBIDDEN_FILE_EXTENSIONS should be lowercase: {}",
                    ext
                ));
            }
        }

        errors
    }

    pub fn file_url(&self, key: &str) -> String {
        self.urls.file_url(key)
    }

    pub fn html_url(&self, key: &str) -> String {
        self.urls.html_url(key)
    }

    pub fn global_timeout(&self) -> Option<std::time::Duration> {
        (self.global_timeout_ms > 0)
            .then(|| std::time::Duration::from_millis(self.global_timeout_ms))
    }
}

fn parse_or<F, T>(var: &F, name: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(name).filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", name, raw)),
        None => Ok(default),
    }
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}
