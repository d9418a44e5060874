//! Resolution-level metric aggregation, separate from a run's summary
//! statistics: patch minimality, correctness, and PR-acceptance likelihood
//! for individual issue resolutions, plus their cross-issue aggregate.

use serde::{Deserialize, Serialize};

/// Metrics describing a single generated patch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PatchMetrics {
    pub lines_added: u32,
    pub lines_removed: u32,
    pub files_changed: u32,
}

impl PatchMetrics {
    #[must_use]
    pub fn total_changes(&self) -> u32 {
        self.lines_added + self.lines_removed
    }
}

/// Metrics describing one issue's end-to-end resolution quality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionMetrics {
    pub issue_id: String,
    pub resolved: bool,
    pub tests_before: u32,
    pub tests_after: u32,
    pub passing_before: u32,
    pub passing_after: u32,
    pub regressions: u32,
    pub fixes: u32,
    pub execution_time_seconds: f64,
    pub tokens_used: u64,
}

impl ResolutionMetrics {
    #[must_use]
    pub fn test_delta(&self) -> i64 {
        i64::from(self.passing_after) - i64::from(self.passing_before)
    }

    #[must_use]
    pub fn is_improvement(&self) -> bool {
        self.test_delta() > 0 && self.regressions == 0
    }
}

/// Per-patch minimality: `1.0` when the patch is within the estimated
/// necessary change size; otherwise decays toward `0.0` as the excess
/// grows, floored at `0.0`.
#[must_use]
pub fn patch_minimality(lines_added: u32, lines_removed: u32, estimated_necessary: u32) -> f64 {
    let total_changes = f64::from(lines_added + lines_removed);
    if estimated_necessary == 0 {
        return if total_changes == 0.0 { 1.0 } else { 0.0 };
    }
    let estimated = f64::from(estimated_necessary);
    if total_changes <= estimated {
        return 1.0;
    }
    let excess_ratio = (total_changes - estimated) / estimated;
    (1.0 - excess_ratio * 0.5).max(0.0)
}

/// Correctness: `passed/total - min(1, 0.2 * regressions)`, floored at
/// `0`; an undefined total (no tests at all) yields `0.5`.
#[must_use]
pub fn correctness(tests_passed: u32, tests_total: u32, regressions: u32) -> f64 {
    if tests_total == 0 {
        return 0.5;
    }
    let pass_rate = f64::from(tests_passed) / f64::from(tests_total);
    let regression_penalty = (f64::from(regressions) * 0.2).min(1.0);
    (pass_rate - regression_penalty).max(0.0)
}

/// Inputs to [`pr_acceptance_likelihood`], all already on their native
/// scale (`code_quality_score`/`review_score` on a 0-100 scale) —
/// normalization to `[0,1]` happens inside the function.
#[derive(Debug, Clone, Copy)]
pub struct PrAcceptanceInputs {
    pub code_quality_score: f64,
    pub test_coverage_adequate: bool,
    pub blocking_issues: u32,
    pub review_score: f64,
}

/// PR-acceptance likelihood:
/// `0.3*quality + 0.4*review + 0.3*coverage - min(1, 0.3*blocking)`, all
/// normalized to `[0,1]`, floored at `0`.
#[must_use]
pub fn pr_acceptance_likelihood(inputs: PrAcceptanceInputs) -> f64 {
    let quality_factor = inputs.code_quality_score / 100.0;
    let review_factor = inputs.review_score / 100.0;
    let coverage_factor = if inputs.test_coverage_adequate { 1.0 } else { 0.7 };
    let blocking_penalty = (f64::from(inputs.blocking_issues) * 0.3).min(1.0);

    let base = quality_factor * 0.3 + review_factor * 0.4 + coverage_factor * 0.3;
    (base - blocking_penalty).max(0.0)
}

/// Aggregate result of [`aggregate_resolution_metrics`]; `NoResults` when
/// the input slice is empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResolutionAggregate {
    NoResults { status: String },
    Stats(ResolutionStats),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionStats {
    pub total_issues: usize,
    pub resolved: usize,
    pub resolution_rate: f64,
    pub improvements: usize,
    pub improvement_rate: f64,
    pub total_regressions: u32,
    pub total_fixes: u32,
    pub net_test_delta: i64,
    pub total_tokens: u64,
    pub avg_tokens_per_issue: f64,
    pub total_time_seconds: f64,
    pub avg_time_per_issue: f64,
}

/// Aggregate [`ResolutionMetrics`] across a batch of issue resolutions.
#[must_use]
pub fn aggregate_resolution_metrics(results: &[ResolutionMetrics]) -> ResolutionAggregate {
    if results.is_empty() {
        return ResolutionAggregate::NoResults { status: "no_results".to_string() };
    }

    let total = results.len();
    let resolved = results.iter().filter(|r| r.resolved).count();
    let improvements = results.iter().filter(|r| r.is_improvement()).count();
    let total_regressions: u32 = results.iter().map(|r| r.regressions).sum();
    let total_fixes: u32 = results.iter().map(|r| r.fixes).sum();
    let total_tokens: u64 = results.iter().map(|r| r.tokens_used).sum();
    let total_time_seconds: f64 = results.iter().map(|r| r.execution_time_seconds).sum();

    ResolutionAggregate::Stats(ResolutionStats {
        total_issues: total,
        resolved,
        resolution_rate: resolved as f64 / total as f64,
        improvements,
        improvement_rate: improvements as f64 / total as f64,
        total_regressions,
        total_fixes,
        net_test_delta: i64::from(total_fixes) - i64::from(total_regressions),
        total_tokens,
        avg_tokens_per_issue: total_tokens as f64 / total as f64,
        total_time_seconds,
        avg_time_per_issue: total_time_seconds / total as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_minimality_perfect_when_within_estimate() {
        assert_eq!(patch_minimality(5, 5, 20), 1.0);
    }

    #[test]
    fn patch_minimality_decays_past_estimate() {
        let score = patch_minimality(30, 0, 20);
        assert!((score - (1.0 - 0.5 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn patch_minimality_zero_estimate_rewards_empty_patch() {
        assert_eq!(patch_minimality(0, 0, 0), 1.0);
        assert_eq!(patch_minimality(1, 0, 0), 0.0);
    }

    #[test]
    fn correctness_penalizes_regressions() {
        let score = correctness(8, 10, 1);
        assert!((score - (0.8 - 0.2)).abs() < 1e-9);
    }

    #[test]
    fn correctness_undefined_total_is_uncertain() {
        assert_eq!(correctness(0, 0, 0), 0.5);
    }

    #[test]
    fn pr_acceptance_floors_at_zero_under_heavy_blocking() {
        let score = pr_acceptance_likelihood(PrAcceptanceInputs {
            code_quality_score: 50.0,
            test_coverage_adequate: true,
            blocking_issues: 10,
            review_score: 50.0,
        });
        assert_eq!(score, 0.0);
    }

    #[test]
    fn aggregate_empty_yields_no_results() {
        assert_eq!(
            aggregate_resolution_metrics(&[]),
            ResolutionAggregate::NoResults { status: "no_results".to_string() }
        );
    }

    #[test]
    fn aggregate_computes_rates_and_sums() {
        let results = vec![
            ResolutionMetrics {
                issue_id: "1".into(),
                resolved: true,
                tests_before: 10,
                tests_after: 10,
                passing_before: 8,
                passing_after: 10,
                regressions: 0,
                fixes: 2,
                execution_time_seconds: 5.0,
                tokens_used: 1000,
            },
            ResolutionMetrics {
                issue_id: "2".into(),
                resolved: false,
                tests_before: 10,
                tests_after: 10,
                passing_before: 8,
                passing_after: 7,
                regressions: 1,
                fixes: 0,
                execution_time_seconds: 3.0,
                tokens_used: 500,
            },
        ];
        let ResolutionAggregate::Stats(stats) = aggregate_resolution_metrics(&results) else {
            panic!("expected Stats");
        };
        assert_eq!(stats.total_issues, 2);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.improvements, 1);
        assert_eq!(stats.total_tokens, 1500);
        assert!((stats.avg_time_per_issue - 4.0).abs() < 1e-9);
    }
}
