// pgbackuptool/src/backup/logic.rs
use std::path::Path;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::backup::archive::archive_directory_dump;
use crate::backup::db_dump::DumpExecutor;
use crate::backup::naming::generate_backup_name;
use crate::backup::probe::ConnectionProber;
use crate::config::{BackupSettings, DumpFormat};
use crate::errors::{BackupError, DumpStep, Result};
use crate::storage::Storage;

/// One full backup run: name → probe → dump → upload → cleanup.
///
/// The temp artifact (and, for directory dumps, the packed archive) is
/// removed on every exit path. Removal failures are logged and never
/// override the run's outcome. No step is retried here; only the
/// connectivity probe retries internally.
pub async fn perform_backup(
    cancel: &CancellationToken,
    settings: &BackupSettings,
    prober: &ConnectionProber,
    executor: &DumpExecutor,
    storage: &dyn Storage,
    temp_dir: &Path,
) -> Result<()> {
    println!("Starting backup process...");

    let backup_name = generate_backup_name(
        &settings.database,
        settings.format,
        settings.compression,
        Utc::now(),
    );
    let temp_path = temp_dir.join(&backup_name);

    // Directory dumps are packed into a single archive before upload.
    let archive_path = (settings.format == DumpFormat::Directory)
        .then(|| temp_dir.join(format!("{backup_name}.tar.gz")));

    let result = execute_backup(
        cancel,
        settings,
        prober,
        executor,
        storage,
        &backup_name,
        &temp_path,
        archive_path.as_deref(),
    )
    .await;

    remove_artifact(&temp_path);
    if let Some(path) = &archive_path {
        remove_artifact(path);
    }

    result
}

#[allow(clippy::too_many_arguments)]
async fn execute_backup(
    cancel: &CancellationToken,
    settings: &BackupSettings,
    prober: &ConnectionProber,
    executor: &DumpExecutor,
    storage: &dyn Storage,
    backup_name: &str,
    temp_path: &Path,
    archive_path: Option<&Path>,
) -> Result<()> {
    prober.test_connection(cancel, settings).await?;
    executor.run_dump(cancel, settings, temp_path).await?;

    let (upload_path, upload_name) = match archive_path {
        Some(archive) => {
            archive_directory_dump(temp_path, archive).map_err(|e| BackupError::Dump {
                step: DumpStep::Archive,
                source: e,
            })?;
            (archive, format!("{backup_name}.tar.gz"))
        }
        None => (temp_path, backup_name.to_string()),
    };

    match storage.upload(cancel, upload_path, &upload_name).await {
        Ok(()) => {}
        Err(_) if cancel.is_cancelled() => return Err(BackupError::Cancelled("upload")),
        Err(e) => return Err(BackupError::Upload(e)),
    }

    println!(
        "Backup completed successfully: {} (storage: {})",
        upload_name,
        storage.kind()
    );
    Ok(())
}

fn remove_artifact(path: &Path) {
    if !path.exists() {
        return;
    }
    let removed = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(e) = removed {
        eprintln!(
            "Warning: failed to remove temp artifact {}: {}",
            path.display(),
            e
        );
    }
}
