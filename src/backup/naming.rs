// pgbackuptool/src/backup/naming.rs
use chrono::{DateTime, Utc};

use crate::config::DumpFormat;

/// Builds the artifact name for one backup run:
/// `pg-backup_<database>_<YYYY-MM-DD_HH-MM-SS><ext>`.
///
/// The timestamp is UTC at second resolution; the extension follows the
/// format/compression mapping on [`DumpFormat::extension`]. Pure function,
/// the caller supplies the clock.
pub fn generate_backup_name(
    database: &str,
    format: DumpFormat,
    compressed: bool,
    now: DateTime<Utc>,
) -> String {
    let timestamp = now.format("%Y-%m-%d_%H-%M-%S");
    format!(
        "pg-backup_{}_{}{}",
        database,
        timestamp,
        format.extension(compressed)
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn plain_compressed_name_matches_exactly() {
        let name = generate_backup_name("appdb", DumpFormat::Plain, true, fixed_now());
        assert_eq!(name, "pg-backup_appdb_2024-03-07_14-05-09.sql.gz");
    }

    #[test]
    fn extension_follows_format_and_compression() {
        let cases = [
            (DumpFormat::Plain, false, ".sql"),
            (DumpFormat::Plain, true, ".sql.gz"),
            (DumpFormat::Custom, false, ".dump"),
            (DumpFormat::Custom, true, ".dump"),
            (DumpFormat::Tar, false, ".tar"),
            (DumpFormat::Tar, true, ".tar"),
            (DumpFormat::Directory, false, ""),
            (DumpFormat::Directory, true, ""),
        ];
        for (format, compressed, ext) in cases {
            let name = generate_backup_name("appdb", format, compressed, fixed_now());
            assert_eq!(
                name,
                format!("pg-backup_appdb_2024-03-07_14-05-09{ext}"),
                "wrong name for {format} compressed={compressed}"
            );
        }
    }
}
