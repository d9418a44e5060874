//! Tunable limits and safety checks for the orchestrator core: retry
//! backoff, token/cost budgets, named timeouts, and file/content security.

pub mod budget;
pub mod retry;
pub mod security;
pub mod timeout;

pub use budget::BudgetPolicy;
pub use retry::{looks_like_rate_limit, RetryDecision, RetryPolicy};
pub use security::SecurityPolicy;
pub use timeout::{TimeoutCategory, TimeoutPolicy};

use serde::{Deserialize, Serialize};

/// Aggregates the four policy groups into one TOML-loadable block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    pub retry: RetryPolicy,
    pub budget: BudgetPolicy,
    pub timeout: TimeoutPolicy,
    pub security: SecurityPolicy,
}
