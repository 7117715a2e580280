// pgbackuptool/src/storage/s3.rs
use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use tokio_util::sync::CancellationToken;

use crate::config::S3Config;
use crate::storage::Storage;

/// Uploads artifacts to an S3-compatible object storage service (AWS S3,
/// DigitalOcean Spaces, MinIO, ...).
pub struct S3Storage {
    config: S3Config,
}

impl S3Storage {
    pub fn new(config: S3Config) -> Self {
        Self { config }
    }

    async fn client(&self) -> s3::Client {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &self.config.access_key_id,
                &self.config.secret_access_key,
                None,
                None,
                "Static",
            ));
        if let Some(endpoint) = &self.config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        s3::Client::new(&loader.load().await)
    }

    fn object_key(&self, destination_name: &str) -> String {
        match &self.config.folder_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), destination_name),
            None => destination_name.to_string(),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(
        &self,
        cancel: &CancellationToken,
        local_path: &Path,
        destination_name: &str,
    ) -> Result<()> {
        let key = self.object_key(destination_name);
        println!(
            "Uploading {} to S3 bucket {} with key {}",
            local_path.display(),
            self.config.bucket_name,
            key
        );

        let client = self.client().await;
        let body = ByteStream::from_path(local_path).await.with_context(|| {
            format!("failed to read upload source: {}", local_path.display())
        })?;

        let put = client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(&key)
            .body(body)
            .send();

        tokio::select! {
            _ = cancel.cancelled() => bail!("upload to bucket {} was cancelled", self.config.bucket_name),
            result = put => {
                result.with_context(|| {
                    format!(
                        "failed to upload {} to S3 bucket {} with key {}",
                        local_path.display(),
                        self.config.bucket_name,
                        key
                    )
                })?;
            }
        }

        println!("✅ Uploaded {} to S3 bucket {}", key, self.config.bucket_name);
        Ok(())
    }

    fn kind(&self) -> &str {
        "s3"
    }
}
