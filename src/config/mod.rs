// pgbackuptool/src/config/mod.rs
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

const DEFAULT_LOCAL_BACKUP_DIR: &str = "./backups";

/// On-disk structure of a pg_dump artifact. The set is closed; anything
/// else coming from the environment is rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Plain,
    Custom,
    Directory,
    Tar,
}

impl DumpFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DumpFormat::Plain => "plain",
            DumpFormat::Custom => "custom",
            DumpFormat::Directory => "directory",
            DumpFormat::Tar => "tar",
        }
    }

    /// Single-character value for pg_dump's `-F` flag.
    pub fn format_flag(self) -> &'static str {
        match self {
            DumpFormat::Plain => "p",
            DumpFormat::Custom => "c",
            DumpFormat::Directory => "d",
            DumpFormat::Tar => "t",
        }
    }

    /// Artifact extension. Directory dumps produce a directory tree rather
    /// than a single file, so they carry no extension here.
    pub fn extension(self, compressed: bool) -> &'static str {
        match self {
            DumpFormat::Plain if compressed => ".sql.gz",
            DumpFormat::Plain => ".sql",
            DumpFormat::Custom => ".dump",
            DumpFormat::Tar => ".tar",
            DumpFormat::Directory => "",
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DumpFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(DumpFormat::Plain),
            "custom" => Ok(DumpFormat::Custom),
            "directory" => Ok(DumpFormat::Directory),
            "tar" => Ok(DumpFormat::Tar),
            other => Err(anyhow::anyhow!(
                "PGDUMP_FORMAT must be 'plain', 'custom', 'directory', or 'tar', got '{}'",
                other
            )),
        }
    }
}

/// Connection and dump parameters for one backup run. Immutable once
/// loaded; the backup flow never revalidates the format.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub format: DumpFormat,
    pub compression: bool,
    /// Extra pg_dump arguments, whitespace-separated, appended verbatim.
    pub dump_options: String,
}

impl BackupSettings {
    pub fn from_env() -> Result<Self> {
        let port = env_or("PGPORT", "5432");
        port.parse::<u16>()
            .with_context(|| format!("PGPORT must be a TCP port number, got '{}'", port))?;

        let format: DumpFormat = env_or("PGDUMP_FORMAT", "custom").parse()?;
        let compression = parse_bool(&env_or("BACKUP_COMPRESSION", "true"))
            .context("BACKUP_COMPRESSION must be a boolean (true/false)")?;

        Ok(Self {
            host: env_or("PGHOST", "localhost"),
            port,
            user: env_or("PGUSER", "postgres"),
            password: env::var("PGPASSWORD").unwrap_or_default(),
            database: env_or("PGDATABASE", "postgres"),
            format,
            compression,
            dump_options: env::var("PGDUMP_OPTIONS").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
    pub folder_prefix: Option<String>,
}

/// Where finished artifacts go. S3 wins when a bucket is configured,
/// otherwise artifacts are copied into a local directory.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(S3Config),
    LocalDir(PathBuf),
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        match env::var("S3_BUCKET") {
            Ok(bucket) if !bucket.is_empty() => {
                let region = env::var("S3_REGION")
                    .context("S3_REGION must be set when S3_BUCKET is configured")?;
                let access_key_id = env::var("S3_ACCESS_KEY_ID")
                    .context("S3_ACCESS_KEY_ID must be set when S3_BUCKET is configured")?;
                let secret_access_key = env::var("S3_SECRET_ACCESS_KEY")
                    .context("S3_SECRET_ACCESS_KEY must be set when S3_BUCKET is configured")?;
                Ok(StorageConfig::S3(S3Config {
                    bucket_name: bucket,
                    region,
                    access_key_id,
                    secret_access_key,
                    endpoint_url: env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
                    folder_prefix: env::var("S3_FOLDER_PREFIX").ok().filter(|s| !s.is_empty()),
                }))
            }
            _ => {
                let dir = env_or("LOCAL_BACKUP_DIR", DEFAULT_LOCAL_BACKUP_DIR);
                Ok(StorageConfig::LocalDir(PathBuf::from(dir)))
            }
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
