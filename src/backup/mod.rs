pub(crate) mod archive;
pub(crate) mod db_dump;
mod logic;
pub(crate) mod naming;
pub(crate) mod probe;

use std::path::Path;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::config::BackupSettings;
use crate::storage::Storage;

pub use db_dump::DumpExecutor;
pub use probe::ConnectionProber;

/// Public entry point for the backup process. Locates the PostgreSQL
/// client tools and runs one probe → dump → upload → cleanup sequence.
pub async fn run_backup_flow(
    cancel: &CancellationToken,
    settings: &BackupSettings,
    storage: &dyn Storage,
    temp_dir: &Path,
) -> Result<()> {
    let prober = ConnectionProber::new()?;
    let executor = DumpExecutor::new()?;
    logic::perform_backup(cancel, settings, &prober, &executor, storage, temp_dir).await?;
    Ok(())
}
