//! The per-task mutable record threaded through the state machine.

use crate::repo::TaskDescriptor;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The opaque bag a stage worker hands back.
///
/// `tokens_used` and `success` are the two canonical fields the engine
/// inspects; everything else is stage-specific and lives in `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    pub tokens_used: u64,
    pub success: bool,
    /// Stage-specific fields (e.g. `{"summary": "...", "severity": "high"}`).
    pub payload: serde_json::Value,
    /// Set by the worker when `tokens_used` is an approximation (e.g. a
    /// `len(text)/4` fallback) rather than an exact usage figure, so budget
    /// accounting downstream is not silently polluted by a guess.
    #[serde(default)]
    pub tokens_estimated: bool,
}

impl StageOutput {
    #[must_use]
    pub fn success(tokens_used: u64, payload: serde_json::Value) -> Self {
        Self {
            tokens_used,
            success: true,
            payload,
            tokens_estimated: false,
        }
    }

    #[must_use]
    pub fn failure(payload: serde_json::Value) -> Self {
        Self {
            tokens_used: 0,
            success: false,
            payload,
            tokens_estimated: false,
        }
    }

    /// Read a named field out of `payload` as a string, defaulting to empty.
    #[must_use]
    pub fn field_str(&self, name: &str) -> &str {
        self.payload.get(name).and_then(|v| v.as_str()).unwrap_or("")
    }

    /// Read a named field out of `payload` as a bool, defaulting to `false`.
    #[must_use]
    pub fn field_bool(&self, name: &str) -> bool {
        self.payload
            .get(name)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether `payload` has a `name` field that is present and non-empty:
    /// a missing or null field, an empty string, or an empty array all
    /// count as absent; any other value (including `0`/`false`) counts as
    /// present.
    #[must_use]
    pub fn field_non_empty(&self, name: &str) -> bool {
        match self.payload.get(name) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(serde_json::Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        }
    }
}

/// A stage's output as stored in the context, once the engine has recorded
/// it against that stage's slot.
pub type StageSlot = StageOutput;

/// Structured classification of a failure, independent of which error type
/// produced it. Shared between the engine, policies and the tracer so a
/// trace event and a retry decision agree on vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection/timeout/5xx — retryable with exponential backoff.
    Transient,
    /// Explicit 429 / rate-limit signal — retryable with rate-limit backoff.
    RateLimit,
    /// Missing/invalid credentials — terminal.
    Authentication,
    /// Upstream content filter tripped — terminal.
    ContentFilter,
    /// Token or cost budget exceeded — terminal, never retried.
    BudgetExceeded,
    /// Stage worker output failed to parse — retryable once, then terminal.
    Parsing,
    /// Illegal state-machine edge attempted — programmer error, terminal.
    InvalidTransition,
    /// The whole-task or per-stage deadline elapsed — terminal.
    DeadlineExceeded,
    /// No classification rule matched; never treated as retryable.
    Other,
}

/// One entry in the context's chronological error list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub stage: Option<Stage>,
    pub message: String,
    pub kind: ErrorKind,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(stage: Option<Stage>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind,
        }
    }
}

/// The mutable record carried from stage to stage.
///
/// Owned exclusively by the engine for the lifetime of a task; stage workers
/// receive it by shared reference and return a new [`StageOutput`] rather
/// than mutating it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: crate::TaskId,
    pub source_url: String,
    pub repository: crate::RepoCoordinates,

    /// One slot per working stage, keyed by [`Stage`]. A stage's slot is
    /// written exactly once per successful visit; on rework the prior value
    /// is overwritten atomically.
    slots: BTreeMap<Stage, StageSlot>,

    pub tokens_used: u64,
    pub cost_usd: f64,
    pub retry_count: u32,
    pub errors: Vec<ErrorRecord>,
}

impl TaskContext {
    #[must_use]
    pub fn new(descriptor: TaskDescriptor) -> Self {
        Self {
            task_id: descriptor.task_id,
            source_url: descriptor.source_url,
            repository: descriptor.repository,
            slots: BTreeMap::new(),
            tokens_used: 0,
            cost_usd: 0.0,
            retry_count: 0,
            errors: Vec::new(),
        }
    }

    /// Write (or overwrite) `stage`'s slot. Called by the engine only.
    pub fn set_slot(&mut self, stage: Stage, output: StageSlot) {
        self.slots.insert(stage, output);
    }

    #[must_use]
    pub fn slot(&self, stage: Stage) -> Option<&StageSlot> {
        self.slots.get(&stage)
    }

    #[must_use]
    pub fn has_slot(&self, stage: Stage) -> bool {
        self.slots.contains_key(&stage)
    }

    pub fn push_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoCoordinates;

    fn descriptor() -> TaskDescriptor {
        TaskDescriptor {
            task_id: crate::TaskId::new(),
            source_url: "https://example.com/issues/1".into(),
            repository: RepoCoordinates {
                owner: "octocat".into(),
                name: "hello-world".into(),
            },
        }
    }

    #[test]
    fn slot_write_is_overwrite_on_rework() {
        let mut ctx = TaskContext::new(descriptor());
        ctx.set_slot(
            Stage::Generate,
            StageOutput::success(10, serde_json::json!({"patches": ["a"]})),
        );
        assert_eq!(ctx.slot(Stage::Generate).unwrap().tokens_used, 10);

        ctx.set_slot(
            Stage::Generate,
            StageOutput::success(20, serde_json::json!({"patches": ["a", "b"]})),
        );
        assert_eq!(ctx.slot(Stage::Generate).unwrap().tokens_used, 20);
        assert!(!ctx.has_slot(Stage::Review));
    }
}
