//! Errors surfaced by [`crate::BenchmarkFan`].

use std::path::PathBuf;

/// Failure to drive, persist, or reload a benchmark run.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// `complete_run`/`record` called with no run started via `start_run`.
    #[error("no active benchmark run; call start_run first")]
    NoActiveRun,

    /// The results directory could not be created.
    #[error("failed to create results directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run file could not be written.
    #[error("failed to write results file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A previously persisted run file could not be read.
    #[error("failed to read results file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run file's JSON could not be (de)serialized.
    #[error("failed to (de)serialize benchmark run: {0}")]
    Serde(#[from] serde_json::Error),
}
