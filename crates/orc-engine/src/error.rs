//! The engine's own error taxonomy.
//!
//! `EngineError` is never returned to the caller — the engine never raises;
//! fatal conditions are recorded as `errors[]` entries on the context — it
//! exists purely so [`crate::engine::Engine`] has a structured value to
//! classify, log, and fold into an [`orc_types::ErrorRecord`].

use orc_types::{ErrorKind, Stage};

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// No worker was registered for the current stage's registry key.
    #[error("no stage worker registered for {stage}")]
    WorkerNotFound { stage: Stage },

    /// A stage worker returned a terminal (non-retryable, or retries
    /// exhausted) error.
    #[error("stage worker failed: {0}")]
    Worker(#[from] crate::worker::WorkerError),

    /// The per-task token or cost cap was hit before a stage could run.
    #[error("token or cost budget exceeded: {0}")]
    BudgetExceeded(String),

    /// The state machine rejected an edge the engine assumed existed.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// A rework loop (`Review`/`Validate` -> `Generate`) denied by the
    /// `ReworkBudget` guard.
    #[error("rework exhausted for {1}: {0}")]
    ReworkExhausted(String, Stage),

    /// A forward `SlotPopulated` guard denied the edge leaving `stage`
    /// because its own output didn't satisfy it — `success=false`, or the
    /// stage's `required_slot_field` was missing/empty. Spec §4.3: partial
    /// success is handled entirely by the outgoing edge's guard, never
    /// second-guessed by the engine. Distinct from [`EngineError::BudgetExceeded`]
    /// since no budget is involved here.
    #[error("{stage} output rejected by the outgoing guard: {reason}")]
    StageOutputRejected { stage: Stage, reason: String },

    /// The whole-task deadline elapsed before the run reached a terminal
    /// state.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

impl EngineError {
    /// The structured classification this error contributes to an
    /// [`orc_types::ErrorRecord`].
    #[must_use]
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            EngineError::WorkerNotFound { .. } | EngineError::InvalidTransition(_) => {
                ErrorKind::InvalidTransition
            }
            EngineError::Worker(e) => e.kind,
            EngineError::BudgetExceeded(_) => ErrorKind::BudgetExceeded,
            EngineError::ReworkExhausted(..) => ErrorKind::Other,
            EngineError::StageOutputRejected { .. } => ErrorKind::Other,
            EngineError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
        }
    }
}
