// pgbackuptool/src/storage/mod.rs
pub(crate) mod local;
pub(crate) mod s3;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::StorageConfig;

/// Destination for finished backup artifacts. The backup flow only ever
/// hands over a local path and a destination name; everything else is the
/// sink's business.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(
        &self,
        cancel: &CancellationToken,
        local_path: &Path,
        destination_name: &str,
    ) -> Result<()>;

    /// Human-readable label for log lines.
    fn kind(&self) -> &str;
}

pub fn storage_from_config(config: &StorageConfig) -> Box<dyn Storage> {
    match config {
        StorageConfig::S3(cfg) => Box::new(s3::S3Storage::new(cfg.clone())),
        StorageConfig::LocalDir(dir) => Box::new(local::LocalDirStorage::new(dir.clone())),
    }
}
