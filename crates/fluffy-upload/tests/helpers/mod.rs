//! Test helpers: configuration, incoming files and instrumented backends.
//!
//! Run from workspace root: `cargo test -p fluffy-upload`.

#![allow(dead_code)]

use async_trait::async_trait;
use fluffy_core::{Config, StoredFile, StoredHtml};
use fluffy_storage::{MemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use fluffy_upload::IncomingFile;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const FILE_URL_PATTERN: &str = "https://i.example.com/:key:";
pub const HTML_URL_PATTERN: &str = "https://i.example.com/html/:key:";

pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("STORAGE_BACKEND".into(), "memory".into());
    vars.insert("FILE_URL_PATTERN".into(), FILE_URL_PATTERN.into());
    vars.insert("HTML_URL_PATTERN".into(), HTML_URL_PATTERN.into());
    vars.insert("FLUFFY_SERVER_VERSION".into(), "test-version".into());
    vars.insert("FORBIDDEN_FILE_EXTENSIONS".into(), "exe,scr".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_vars(|name| vars.get(name).cloned()).unwrap()
}

pub fn incoming(name: &str, body: &[u8]) -> IncomingFile {
    IncomingFile::new(name, "", Box::new(Cursor::new(body.to_vec())))
}

/// Memory backend that fails every store whose key ends with `fail_suffix`.
pub struct FailingStorage {
    pub inner: Arc<MemoryStorage>,
    pub fail_suffix: String,
}

impl FailingStorage {
    pub fn new(fail_suffix: &str) -> Self {
        Self {
            inner: Arc::new(MemoryStorage::new()),
            fail_suffix: fail_suffix.to_string(),
        }
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn store_file(&self, file: StoredFile) -> StorageResult<()> {
        if file.key().ends_with(&self.fail_suffix) {
            return Err(StorageError::BackendError("disk on fire".to_string()));
        }
        self.inner.store_file(file).await
    }

    async fn store_html(&self, html: StoredHtml) -> StorageResult<()> {
        if html.key().ends_with(&self.fail_suffix) {
            return Err(StorageError::BackendError("disk on fire".to_string()));
        }
        self.inner.store_html(html).await
    }

    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Counts stores that were started and stores whose future was dropped
/// before finishing.
#[derive(Default)]
pub struct StoreCounters {
    pub started: AtomicUsize,
    pub dropped: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

struct DropGuard {
    counters: Arc<StoreCounters>,
    finished: bool,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Backend whose stores take `delay` (forever when `None`).
pub struct SlowStorage {
    pub counters: Arc<StoreCounters>,
    pub delay: Option<Duration>,
}

impl SlowStorage {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            counters: Arc::new(StoreCounters::default()),
            delay,
        }
    }

    async fn store(&self) -> StorageResult<()> {
        let counters = &self.counters;
        counters.started.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut guard = DropGuard {
            counters: Arc::clone(counters),
            finished: false,
        };
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
        guard.finished = true;
        Ok(())
    }
}

#[async_trait]
impl Storage for SlowStorage {
    async fn store_file(&self, _file: StoredFile) -> StorageResult<()> {
        self.store().await
    }

    async fn store_html(&self, _html: StoredHtml) -> StorageResult<()> {
        self.store().await
    }

    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
