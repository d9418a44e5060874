//! Drives the engine across a batch of tasks, records per-task outcomes,
//! and computes cross-task aggregates.

pub mod aggregate;
pub mod error;
pub mod run;

pub use aggregate::{
    aggregate_resolution_metrics, correctness, patch_minimality, pr_acceptance_likelihood,
    PatchMetrics, PrAcceptanceInputs, ResolutionAggregate, ResolutionMetrics, ResolutionStats,
};
pub use error::BenchError;
pub use run::{BenchmarkFan, BenchmarkRun, IssueResult, RunComparison, RunStats, RunSummary};
