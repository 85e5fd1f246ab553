// src/error.rs

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Errors raised while building or scoring ribosome profiles.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed read or alignment records.
    #[error("input format error: {0}")]
    InputFormat(String),

    /// An external executable (assembler, aligner, samtools) failed.
    #[error("{tool} exited with {status}: {stderr}")]
    ExternalTool {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool} did not finish within {after:?}")]
    Timeout { tool: String, after: Duration },

    /// Invalid mode/flag combination or out-of-range parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Zero-total frame counts or a zero-variance spectrum. Recovered per
    /// contig, never fatal for a run.
    #[error("degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl Error {
    /// Wraps an `io::Error` with the path it happened on.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
