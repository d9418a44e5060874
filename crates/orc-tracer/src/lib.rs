//! Durable execution tracing and metrics collection.
//!
//! Traces are written as append-only JSON files, one per task, and are
//! meant to survive a crash of the engine that produced them.

pub mod error;
pub mod metrics;
pub mod trace;

pub use error::TracerError;
pub use metrics::{MetricSummary, MetricsCollector};
pub use trace::{ExecutionTrace, ExecutionTracer, TraceEvent};
