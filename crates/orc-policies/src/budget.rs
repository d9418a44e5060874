//! Token and cost budget tracking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetPolicy {
    pub max_tokens_per_task: u64,
    pub max_cost_per_task_usd: f64,
    pub max_tokens_per_stage: u64,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            max_tokens_per_task: 100_000,
            max_cost_per_task_usd: 5.0,
            max_tokens_per_stage: 25_000,
            input_cost_per_1k: 0.00015,
            output_cost_per_1k: 0.0006,
        }
    }
}

impl BudgetPolicy {
    /// Whether `current + additional` stays within the per-task token cap.
    #[must_use]
    pub fn check_tokens(&self, current: u64, additional: u64) -> bool {
        current.saturating_add(additional) <= self.max_tokens_per_task
    }

    /// Whether `current + additional` stays within the per-stage token cap.
    #[must_use]
    pub fn check_stage_tokens(&self, current_in_stage: u64, additional: u64) -> bool {
        current_in_stage.saturating_add(additional) <= self.max_tokens_per_stage
    }

    /// Whether `current + additional` stays within the per-task cost cap.
    #[must_use]
    pub fn check_cost(&self, current: f64, additional: f64) -> bool {
        current + additional <= self.max_cost_per_task_usd
    }

    /// Estimate the USD cost of `input_tokens` + `output_tokens`.
    #[must_use]
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1000.0) * self.input_cost_per_1k;
        let output_cost = (output_tokens as f64 / 1000.0) * self.output_cost_per_1k;
        input_cost + output_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_tokens_boundary_is_inclusive() {
        let policy = BudgetPolicy::default();
        assert!(policy.check_tokens(policy.max_tokens_per_task, 0));
        assert!(!policy.check_tokens(policy.max_tokens_per_task + 1, 0));
    }

    #[test]
    fn estimate_cost_uses_distinct_input_output_rates() {
        let policy = BudgetPolicy::default();
        let cost = policy.estimate_cost(1000, 1000);
        assert!((cost - (policy.input_cost_per_1k + policy.output_cost_per_1k)).abs() < 1e-9);
    }

    #[test]
    fn check_cost_respects_cap() {
        let policy = BudgetPolicy::default();
        assert!(policy.check_cost(4.0, 1.0));
        assert!(!policy.check_cost(4.0, 1.01));
    }
}
