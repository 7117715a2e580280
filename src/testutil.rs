// pgbackuptool/src/testutil.rs
//! Shared helpers for tests that drive the backup flow with stand-in
//! executables instead of real PostgreSQL client tools.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::{BackupSettings, DumpFormat};

/// Writes an executable `sh` script into `dir` and returns its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn settings(database: &str, format: DumpFormat, compression: bool) -> BackupSettings {
    BackupSettings {
        host: "localhost".to_string(),
        port: "5432".to_string(),
        user: "postgres".to_string(),
        password: "secret".to_string(),
        database: database.to_string(),
        format,
        compression,
        dump_options: String::new(),
    }
}
