//! Shared data model for the SWE agent orchestrator core.
//!
//! Every other `orc-*` crate depends on this one and nothing else in the
//! workspace; it carries no business logic, only the types the state
//! machine, policies, engine, tracer, client and benchmark fan all need to
//! agree on.

pub mod context;
pub mod ids;
pub mod repo;
pub mod stage;

pub use context::{ErrorKind, ErrorRecord, StageOutput, StageSlot, TaskContext};
pub use ids::{EventId, RunId, TaskId};
pub use repo::{RepoCache, RepoCoordinates, TaskDescriptor};
pub use stage::{GuardKind, Stage, Transition};
