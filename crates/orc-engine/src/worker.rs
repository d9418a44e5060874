//! The stage-worker capability contract: a single async method, object-safe,
//! implemented by whatever the host plugs in for a stage. Prompt construction
//! and LLM-response parsing live entirely on the other side of this trait.

use async_trait::async_trait;
use orc_types::{ErrorKind, TaskContext};

/// A structured failure returned by a stage worker, distinct from a raw
/// exception: the worker itself has already classified whether retrying
/// makes sense.
#[derive(Debug, Clone, thiserror::Error)]
#[error("stage worker failed: {message}")]
pub struct WorkerError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl WorkerError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    /// A non-retryable error of `kind`.
    #[must_use]
    pub fn terminal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, false)
    }

    /// A transient/retryable error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message, true)
    }
}

/// The capability set every stage worker implements. Modeled as a trait
/// object (`Arc<dyn StageWorker>`) rather than an inheritance hierarchy.
#[async_trait]
pub trait StageWorker: Send + Sync {
    /// Run this stage against the current context, returning a structured
    /// output or a structured, already-classified error.
    ///
    /// Implementations must not mutate `ctx`'s counters (`tokens_used`,
    /// `cost_usd`, `retry_count`) — those are engine-owned; only the
    /// returned [`orc_types::StageOutput`] is inspected by the engine.
    async fn run(
        &self,
        ctx: &TaskContext,
    ) -> Result<orc_types::StageOutput, WorkerError>;
}
