// pgbackuptool/src/backup/archive.rs
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::Builder;
use walkdir::WalkDir;

/// Packs a directory-format dump into a gzipped tarball so the storage
/// sink receives a single file. Paths inside the archive are relative to
/// `dump_dir`.
pub fn archive_directory_dump(dump_dir: &Path, archive_path: &Path) -> Result<()> {
    if !dump_dir.is_dir() {
        anyhow::bail!("dump output is not a directory: {}", dump_dir.display());
    }

    println!(
        "Packing directory dump {} into {}",
        dump_dir.display(),
        archive_path.display()
    );

    let archive_file = File::create(archive_path).with_context(|| {
        format!("failed to create archive file: {}", archive_path.display())
    })?;
    let encoder = GzEncoder::new(archive_file, Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in WalkDir::new(dump_dir).min_depth(1) {
        let entry = entry
            .with_context(|| format!("failed to walk dump directory: {}", dump_dir.display()))?;
        let path = entry.path();
        let name = path
            .strip_prefix(dump_dir)
            .with_context(|| format!("failed to relativize {}", path.display()))?;

        if path.is_dir() {
            builder
                .append_dir(name, path)
                .with_context(|| format!("failed to append directory {} to archive", path.display()))?;
        } else {
            builder
                .append_path_with_name(path, name)
                .with_context(|| format!("failed to append file {} to archive", path.display()))?;
        }
    }

    let encoder = builder
        .into_inner()
        .context("failed to finalize tar stream")?;
    encoder.finish().context("failed to finish gzip encoding")?;
    Ok(())
}
