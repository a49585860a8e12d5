//! Fluffy CLI: upload local files through the configured storage backend.
//!
//! Configuration comes from the environment (and `.env`). See `print-config`
//! for the effective values.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fluffy_core::{AppError, Config};
use fluffy_cli::{build_storage, init_tracing, log_app_error, open_incoming};
use fluffy_upload::{CancellationToken, ErrorResponse, UploadOrchestrator, UploadResponse};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fluffy", about = "Fluffy upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more local files
    Upload {
        /// Print the JSON upload response instead of the details URL
        #[arg(long)]
        json: bool,
        /// Paths of the files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Validate the configuration and report every problem
    CheckConfig,
    /// Print the effective configuration as JSON
    PrintConfig,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Serialize response")?
    );
    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    Config::from_env().context("Load configuration")
}

async fn upload(config: Config, paths: Vec<PathBuf>, json: bool) -> anyhow::Result<ExitCode> {
    let storage = match build_storage(&config).await {
        Ok(storage) => storage,
        Err(err) => return report_failure(err, json),
    };
    let orchestrator = UploadOrchestrator::new(storage, &config);

    let mut incoming = Vec::with_capacity(paths.len());
    for path in &paths {
        incoming.push(open_incoming(path).await?);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling upload");
                cancel.cancel();
            }
        })
    };

    let result = orchestrator.upload(&cancel, incoming).await;
    on_interrupt.abort();

    match result {
        Ok(receipt) => {
            if json {
                print_json(&UploadResponse::from(&receipt))?;
            } else {
                println!("{}", receipt.details_url);
                for file in &receipt.manifest.uploaded_files {
                    println!("  {} -> {}", file.name, file.raw);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report_failure(AppError::from(err), json),
    }
}

/// Log `err` and print its client-facing form. Always a failing exit code.
fn report_failure(err: AppError, json: bool) -> anyhow::Result<ExitCode> {
    log_app_error(&err);
    let body = ErrorResponse::from_error(&err);
    if json {
        print_json(&body)?;
    } else {
        eprintln!("{}", body.error.unwrap_or_default());
    }
    Ok(ExitCode::FAILURE)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload { json, paths } => upload(load_config()?, paths, json).await,
        Commands::CheckConfig => {
            let config = load_config()?;
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration OK ({} backend)", config.storage_backend);
                Ok(ExitCode::SUCCESS)
            } else {
                for problem in &problems {
                    eprintln!("{}", problem);
                }
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::PrintConfig => {
            print_json(&load_config()?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
