//! Drives the six-stage workflow to completion: looks up a stage worker,
//! runs it under retry and a deadline, merges its output into the task
//! context, and advances the state machine until a terminal state is
//! reached.
//!
//! Every stage invocation runs under a cancellation-safe `tokio::time::timeout`
//! rather than a bare blocking sleep, so a whole-task deadline can always cut
//! a retry loop or an in-flight worker call short.

mod config;
mod engine;
mod error;
mod registry;
mod worker;

pub use config::OrchestratorConfig;
pub use engine::{Engine, TaskOutcome};
pub use error::EngineError;
pub use registry::StageRegistry;
pub use worker::{StageWorker, WorkerError};
