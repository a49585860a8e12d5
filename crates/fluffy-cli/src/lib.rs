use anyhow::Context;
use fluffy_core::{AppError, Config, ErrorMetadata, LogLevel};
use fluffy_storage::{create_storage, Storage};
use fluffy_upload::IncomingFile;
use std::path::Path;
use std::sync::Arc;

/// Whether `LOG_FORMAT` asks for JSON log lines.
pub fn log_format_is_json(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let json = log_format_is_json(std::env::var("LOG_FORMAT").ok().as_deref());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Name a local file is uploaded under: its final path component.
pub fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Open a local file as an upload. The declared content type is left empty
/// so classification falls back to the extension and the content sniff.
pub async fn open_incoming(path: &Path) -> anyhow::Result<IncomingFile> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Open {}", path.display()))?;
    Ok(IncomingFile::new(upload_name(path), "", Box::new(file)))
}

/// Validate `config` and build its storage backend. Every startup problem
/// is reported as [`AppError::Config`].
pub async fn build_storage(config: &Config) -> Result<Arc<dyn Storage>, AppError> {
    let problems = config.validate();
    if !problems.is_empty() {
        return Err(AppError::Config(problems.join("; ")));
    }
    create_storage(config)
        .await
        .map_err(|e| AppError::Config(e.to_string()))
}

/// Log `err` at the level its metadata asks for.
pub fn log_app_error(err: &AppError) {
    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %err, code = err.error_code(), "Upload rejected")
        }
        LogLevel::Warn => {
            tracing::warn!(error = %err, code = err.error_code(), "Upload rejected")
        }
        LogLevel::Error => {
            tracing::error!(error = %err, code = err.error_code(), "Upload failed")
        }
    }
}
