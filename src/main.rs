//! PostgreSQL Backup Service
//!
//! Dumps a single PostgreSQL database with pg_dump, optionally compresses
//! the dump, and hands the artifact to object storage or a local directory.

// pgbackuptool/src/main.rs
mod backup;
mod config;
mod errors;
mod storage;
#[cfg(test)]
mod testutil;

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use config::{BackupSettings, StorageConfig};

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Backup completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // .env is optional; real environment variables win.
    let _ = dotenv::dotenv();

    println!("🚀 Starting PostgreSQL backup service...");

    let settings = BackupSettings::from_env()
        .context("Failed to load backup settings from environment")?;
    let storage_config = StorageConfig::from_env()
        .context("Failed to load storage configuration from environment")?;
    let storage = storage::storage_from_config(&storage_config);

    println!("PostgreSQL: {}:{}", settings.host, settings.port);
    println!("Database: {}", settings.database);
    println!(
        "Format: {}, compression: {}",
        settings.format, settings.compression
    );
    println!("Storage: {}", storage.kind());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Received Ctrl-C, cancelling backup...");
            signal_token.cancel();
        }
    });

    backup::run_backup_flow(&cancel, &settings, storage.as_ref(), &env::temp_dir())
        .await
        .context("Backup process failed")?;
    Ok(())
}
