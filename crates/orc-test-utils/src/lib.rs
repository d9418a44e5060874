//! Shared test fixtures for the `orc-*` crates: one place for scripted
//! [`StageWorker`] implementations and a scripted [`RateLimiterBackend`],
//! rather than duplicating mock setup per crate.

use async_trait::async_trait;
use orc_client::{ClientError, QuotaSnapshot, RateLimiterBackend};
use orc_engine::{StageWorker, WorkerError};
use orc_types::{ErrorKind, RepoCoordinates, StageOutput, TaskContext, TaskDescriptor, TaskId};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A `TaskDescriptor` pointing at a fixed, valid-looking repository.
#[must_use]
pub fn sample_task() -> TaskDescriptor {
    TaskDescriptor {
        task_id: TaskId::new(),
        source_url: "https://github.com/octocat/hello-world/issues/42".to_string(),
        repository: RepoCoordinates {
            owner: "octocat".to_string(),
            name: "hello-world".to_string(),
        },
    }
}

/// A worker that always succeeds with a fixed `tokens_used` and payload.
pub struct FixedWorker {
    pub tokens_used: u64,
    pub payload: serde_json::Value,
}

impl FixedWorker {
    #[must_use]
    pub fn new(tokens_used: u64, payload: serde_json::Value) -> Self {
        Self { tokens_used, payload }
    }
}

#[async_trait]
impl StageWorker for FixedWorker {
    async fn run(&self, _ctx: &TaskContext) -> Result<StageOutput, WorkerError> {
        Ok(StageOutput::success(self.tokens_used, self.payload.clone()))
    }
}

/// A worker that replays a fixed sequence of payloads, one per call,
/// holding on the last entry once exhausted. Used to script a stage whose
/// answer changes across rework loops (e.g. `Review` first demanding
/// changes, then passing).
pub struct ScriptedWorker {
    tokens_used: u64,
    calls: Vec<serde_json::Value>,
    index: AtomicUsize,
}

impl ScriptedWorker {
    #[must_use]
    pub fn new(tokens_used: u64, calls: Vec<serde_json::Value>) -> Self {
        assert!(!calls.is_empty(), "ScriptedWorker needs at least one scripted call");
        Self {
            tokens_used,
            calls,
            index: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StageWorker for ScriptedWorker {
    async fn run(&self, _ctx: &TaskContext) -> Result<StageOutput, WorkerError> {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let payload = self.calls[i.min(self.calls.len() - 1)].clone();
        Ok(StageOutput::success(self.tokens_used, payload))
    }
}

/// A worker that fails a fixed number of times with a given [`ErrorKind`]
/// before succeeding, for exercising the retry loop.
pub struct FlakyWorker {
    fail_times: u32,
    kind: ErrorKind,
    message: String,
    tokens_used: u64,
    payload: serde_json::Value,
    attempts: AtomicU32,
}

impl FlakyWorker {
    #[must_use]
    pub fn new(
        fail_times: u32,
        kind: ErrorKind,
        message: impl Into<String>,
        tokens_used: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            fail_times,
            kind,
            message: message.into(),
            tokens_used,
            payload,
            attempts: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageWorker for FlakyWorker {
    async fn run(&self, _ctx: &TaskContext) -> Result<StageOutput, WorkerError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return Err(WorkerError::new(self.kind, self.message.clone(), true));
        }
        Ok(StageOutput::success(self.tokens_used, self.payload.clone()))
    }
}

/// A worker that always returns a structured `success=false` output (no
/// exception) — spec §4.3's "partial success", left for the outgoing
/// edge's guard to judge rather than the engine second-guessing it.
pub struct UnsuccessfulWorker {
    pub payload: serde_json::Value,
}

impl UnsuccessfulWorker {
    #[must_use]
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl StageWorker for UnsuccessfulWorker {
    async fn run(&self, _ctx: &TaskContext) -> Result<StageOutput, WorkerError> {
        Ok(StageOutput::failure(self.payload.clone()))
    }
}

/// A worker whose `run` never returns within any reasonable deadline,
/// for exercising whole-task cancellation.
pub struct SleepyWorker {
    pub sleep: std::time::Duration,
}

#[async_trait]
impl StageWorker for SleepyWorker {
    async fn run(&self, _ctx: &TaskContext) -> Result<StageOutput, WorkerError> {
        tokio::time::sleep(self.sleep).await;
        Ok(StageOutput::success(0, serde_json::json!({})))
    }
}

/// A `RateLimiterBackend` that replays a fixed queue of snapshots/errors,
/// one per call, holding on the last entry once exhausted.
pub struct ScriptedBackend {
    script: Mutex<Vec<Result<QuotaSnapshot, String>>>,
    calls: AtomicU32,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new(script: Vec<Result<QuotaSnapshot, String>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiterBackend for ScriptedBackend {
    async fn fetch_quota(&self) -> Result<QuotaSnapshot, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.script.lock().expect("script mutex poisoned");
        let next = if guard.len() > 1 {
            guard.remove(0)
        } else {
            guard[0].clone()
        };
        next.map_err(ClientError::QuotaCheckFailed)
    }
}
