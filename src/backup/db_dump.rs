// pgbackuptool/src/backup/db_dump.rs
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, anyhow};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use which::which;

use crate::config::{BackupSettings, DumpFormat};
use crate::errors::{BackupError, DumpStep, Result};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Runs pg_dump for one database and routes its output to `output_path`.
///
/// Custom, tar, and directory formats are written by pg_dump itself via
/// `-f`. Plain format is consumed from the subprocess's stdout, either
/// straight into the output file or through a streaming gzip encoder when
/// compression is on.
pub struct DumpExecutor {
    program: PathBuf,
}

impl DumpExecutor {
    pub fn new() -> anyhow::Result<Self> {
        let program = which("pg_dump").context(
            "pg_dump executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH.",
        )?;
        Ok(Self::with_program(program))
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self { program }
    }

    pub async fn run_dump(
        &self,
        cancel: &CancellationToken,
        settings: &BackupSettings,
        output_path: &Path,
    ) -> Result<()> {
        println!("Running pg_dump for database '{}'...", settings.database);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-h")
            .arg(&settings.host)
            .arg("-p")
            .arg(&settings.port)
            .arg("-U")
            .arg(&settings.user)
            .arg("-d")
            .arg(&settings.database)
            .arg("-F")
            .arg(settings.format.format_flag());

        // Plain format streams through stdout; everything else lets pg_dump
        // write the artifact itself.
        if settings.format != DumpFormat::Plain {
            cmd.arg("-f").arg(output_path);
        }

        for extra in settings.dump_options.split_whitespace() {
            cmd.arg(extra);
        }

        // The password goes through the child's environment overlay, never
        // through argv where process listings would expose it.
        cmd.env("PGPASSWORD", &settings.password);
        cmd.stderr(Stdio::inherit());

        if settings.format == DumpFormat::Plain {
            if settings.compression {
                self.stream_through_gzip(cancel, cmd, output_path).await?;
            } else {
                self.stream_to_file(cancel, cmd, output_path).await?;
            }
        } else {
            self.wait_direct(cancel, cmd).await?;
        }

        println!("pg_dump completed successfully");
        Ok(())
    }

    async fn wait_direct(&self, cancel: &CancellationToken, mut cmd: Command) -> Result<()> {
        cmd.stdout(Stdio::null());
        let mut child = cmd
            .spawn()
            .map_err(|e| dump_error(DumpStep::Spawn, anyhow::Error::new(e).context("failed to start pg_dump")))?;
        check_exit(wait_child(cancel, &mut child).await?)
    }

    async fn stream_to_file(
        &self,
        cancel: &CancellationToken,
        mut cmd: Command,
        output_path: &Path,
    ) -> Result<()> {
        let out_file = File::create(output_path).map_err(|e| {
            dump_error(
                DumpStep::CreateFile,
                anyhow::Error::new(e)
                    .context(format!("failed to create output file: {}", output_path.display())),
            )
        })?;

        cmd.stdout(Stdio::from(out_file));
        let mut child = cmd
            .spawn()
            .map_err(|e| dump_error(DumpStep::Spawn, anyhow::Error::new(e).context("failed to start pg_dump")))?;
        check_exit(wait_child(cancel, &mut child).await?)
    }

    async fn stream_through_gzip(
        &self,
        cancel: &CancellationToken,
        mut cmd: Command,
        output_path: &Path,
    ) -> Result<()> {
        let out_file = File::create(output_path).map_err(|e| {
            dump_error(
                DumpStep::CreateFile,
                anyhow::Error::new(e)
                    .context(format!("failed to create output file: {}", output_path.display())),
            )
        })?;
        let mut encoder = GzEncoder::new(out_file, Compression::default());

        cmd.stdout(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| dump_error(DumpStep::Spawn, anyhow::Error::new(e).context("failed to start pg_dump")))?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            dump_error(DumpStep::Pipe, anyhow!("pg_dump stdout pipe was not captured"))
        })?;

        // Bounded-memory copy from the subprocess into the encoder.
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        loop {
            let n = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(BackupError::Cancelled("dump stream copy"));
                }
                read = stdout.read(&mut buf) => read.map_err(|e| {
                    dump_error(
                        DumpStep::StreamCopy,
                        anyhow::Error::new(e).context("failed to read pg_dump output"),
                    )
                })?,
            };
            if n == 0 {
                break;
            }
            encoder.write_all(&buf[..n]).map_err(|e| {
                dump_error(
                    DumpStep::StreamCopy,
                    anyhow::Error::new(e).context("failed to compress pg_dump output"),
                )
            })?;
        }
        drop(stdout);

        check_exit(wait_child(cancel, &mut child).await?)?;

        // Finish only after pg_dump exited cleanly; closing earlier would
        // truncate the trailing gzip block.
        let mut out_file = encoder
            .finish()
            .map_err(|e| dump_error(DumpStep::FinishEncoder, anyhow::Error::new(e)))?;
        out_file
            .flush()
            .map_err(|e| dump_error(DumpStep::FinishEncoder, anyhow::Error::new(e)))?;
        Ok(())
    }
}

async fn wait_child(cancel: &CancellationToken, child: &mut Child) -> Result<std::process::ExitStatus> {
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            Err(BackupError::Cancelled("pg_dump"))
        }
        status = child.wait() => status.map_err(|e| {
            dump_error(
                DumpStep::Wait,
                anyhow::Error::new(e).context("failed to wait for pg_dump"),
            )
        }),
    }
}

fn check_exit(status: std::process::ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(dump_error(
            DumpStep::Wait,
            anyhow!("pg_dump exited with {status}"),
        ))
    }
}

fn dump_error(step: DumpStep, source: anyhow::Error) -> BackupError {
    BackupError::Dump { step, source }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;
    use crate::testutil::{settings, write_script};

    fn gunzip(path: &Path) -> Vec<u8> {
        let mut decoder = GzDecoder::new(File::open(path).unwrap());
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn streaming_gzip_preserves_subprocess_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "dump.sh", "printf 'SELECT 1;'");
        let output = dir.path().join("out.sql.gz");

        let executor = DumpExecutor::with_program(script);
        let settings = settings("appdb", DumpFormat::Plain, true);
        executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap();

        assert_eq!(gunzip(&output), b"SELECT 1;");
    }

    #[tokio::test]
    async fn streaming_gzip_handles_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "dump.sh", ":");
        let output = dir.path().join("out.sql.gz");

        let executor = DumpExecutor::with_program(script);
        let settings = settings("appdb", DumpFormat::Plain, true);
        executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap();

        assert!(gunzip(&output).is_empty());
    }

    #[tokio::test]
    async fn streaming_gzip_handles_output_larger_than_copy_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let size = COPY_BUF_SIZE * 3 + 17;
        let script = write_script(
            dir.path(),
            "dump.sh",
            &format!("head -c {size} /dev/zero | tr '\\0' 'x'"),
        );
        let output = dir.path().join("out.sql.gz");

        let executor = DumpExecutor::with_program(script);
        let settings = settings("appdb", DumpFormat::Plain, true);
        executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap();

        assert_eq!(gunzip(&output), vec![b'x'; size]);
    }

    #[tokio::test]
    async fn nonzero_exit_mid_stream_is_a_dump_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "dump.sh", "printf 'partial'\nexit 3");
        let output = dir.path().join("out.sql.gz");

        let executor = DumpExecutor::with_program(script);
        let settings = settings("appdb", DumpFormat::Plain, true);
        let err = executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap_err();

        match err {
            BackupError::Dump { step, .. } => assert_eq!(step, DumpStep::Wait),
            other => panic!("expected Dump error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_uncompressed_writes_stdout_straight_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "dump.sh", "printf 'CREATE TABLE t ();'");
        let output = dir.path().join("out.sql");

        let executor = DumpExecutor::with_program(script);
        let settings = settings("appdb", DumpFormat::Plain, false);
        executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"CREATE TABLE t ();");
    }

    #[tokio::test]
    async fn direct_mode_passes_output_path_and_password_env() {
        let dir = tempfile::tempdir().unwrap();
        let argfile = dir.path().join("args");
        let envfile = dir.path().join("env");
        let body = format!(
            "printf '%s\\n' \"$@\" > {}\nprintf '%s' \"$PGPASSWORD\" > {}",
            argfile.display(),
            envfile.display()
        );
        let script = write_script(dir.path(), "dump.sh", &body);
        let output = dir.path().join("out.dump");

        let executor = DumpExecutor::with_program(script);
        let mut settings = settings("appdb", DumpFormat::Custom, false);
        settings.dump_options = "--no-owner --schema public".to_string();
        executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap();

        let args: Vec<String> = std::fs::read_to_string(&argfile)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        let output_arg = output.display().to_string();
        let expected = [
            "-h",
            "localhost",
            "-p",
            "5432",
            "-U",
            "postgres",
            "-d",
            "appdb",
            "-F",
            "c",
            "-f",
            output_arg.as_str(),
            "--no-owner",
            "--schema",
            "public",
        ];
        assert_eq!(args, expected);
        assert_eq!(std::fs::read_to_string(&envfile).unwrap(), "secret");
    }

    #[tokio::test]
    async fn direct_mode_nonzero_exit_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "dump.sh", "exit 2");
        let output = dir.path().join("out.dump");

        let executor = DumpExecutor::with_program(script);
        let settings = settings("appdb", DumpFormat::Custom, false);
        let err = executor
            .run_dump(&CancellationToken::new(), &settings, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Dump { step: DumpStep::Wait, .. }));
    }
}
