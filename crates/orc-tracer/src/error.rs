//! Errors surfaced by [`crate::ExecutionTracer`].

use std::path::PathBuf;

/// Failure to persist or manage an [`crate::ExecutionTrace`].
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    /// An operation requiring an in-flight trace was called without one.
    #[error("no trace is currently open")]
    NoActiveTrace,

    /// The trace output directory could not be created.
    #[error("failed to create trace directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The trace file could not be written.
    #[error("failed to write trace file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The trace could not be serialized to JSON.
    #[error("failed to serialize trace: {0}")]
    Serialize(#[from] serde_json::Error),
}
