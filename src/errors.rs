use std::fmt;

use thiserror::Error;

/// The sub-step of a dump invocation that failed. Carried inside
/// [`BackupError::Dump`] so operators can tell a pipe failure from a
/// nonzero pg_dump exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStep {
    CreateFile,
    Pipe,
    Spawn,
    StreamCopy,
    Wait,
    FinishEncoder,
    Archive,
}

impl fmt::Display for DumpStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DumpStep::CreateFile => "creating the output file",
            DumpStep::Pipe => "creating the stdout pipe",
            DumpStep::Spawn => "starting the subprocess",
            DumpStep::StreamCopy => "streaming dump output",
            DumpStep::Wait => "waiting for the subprocess",
            DumpStep::FinishEncoder => "finishing the gzip stream",
            DumpStep::Archive => "archiving the dump directory",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("failed to connect to PostgreSQL after {attempts} attempts")]
    ConnectionExhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("pg_dump failed while {step}")]
    Dump {
        step: DumpStep,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to upload backup to storage")]
    Upload(#[source] anyhow::Error),

    #[error("operation cancelled during {0}")]
    Cancelled(&'static str),
}

pub type Result<T> = std::result::Result<T, BackupError>;
