// pgbackuptool/src/storage/local.rs
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::storage::Storage;

/// Fallback sink used when no object storage is configured: artifacts are
/// copied into a local backup directory.
pub struct LocalDirStorage {
    dir: PathBuf,
}

impl LocalDirStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl Storage for LocalDirStorage {
    async fn upload(
        &self,
        _cancel: &CancellationToken,
        local_path: &Path,
        destination_name: &str,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.with_context(|| {
            format!("failed to create local backup directory: {}", self.dir.display())
        })?;

        let dest = self.dir.join(destination_name);
        tokio::fs::copy(local_path, &dest).await.with_context(|| {
            format!(
                "failed to copy {} to {}",
                local_path.display(),
                dest.display()
            )
        })?;

        println!("Copied backup to {}", dest.display());
        Ok(())
    }

    fn kind(&self) -> &str {
        "local-directory"
    }
}
