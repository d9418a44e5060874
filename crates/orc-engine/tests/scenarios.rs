//! End-to-end scenarios driving the engine through the full workflow,
//! rework loops, budget exhaustion, rate-limited retries, and deadlines.

use orc_engine::{Engine, OrchestratorConfig, StageRegistry};
use orc_policies::{BudgetPolicy, RetryPolicy};
use orc_test_utils::{
    sample_task, FixedWorker, FlakyWorker, ScriptedWorker, SleepyWorker, UnsuccessfulWorker,
};
use orc_types::{ErrorKind, Stage};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
}

/// Happy path: all six stages succeed on the first attempt.
#[tokio::test]
async fn happy_path_completes_with_six_stage_completions() {
    let registry = StageRegistry::new()
        .with_worker(Stage::Analyze, Arc::new(FixedWorker::new(500, json!({"summary": "bug"}))))
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(400, json!({"severity": "high"}))))
        .with_worker(Stage::Plan, Arc::new(FixedWorker::new(600, json!({"plan_summary": "plan"}))))
        .with_worker(Stage::Generate, Arc::new(FixedWorker::new(3000, json!({"patch_files": ["a.rs"]}))))
        .with_worker(Stage::Review, Arc::new(FixedWorker::new(400, json!({"requires_changes": false}))))
        .with_worker(Stage::Validate, Arc::new(FixedWorker::new(300, json!({"tests_passed": true}))));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    let engine = Engine::new(cfg, registry);

    let outcome = engine.process(sample_task()).await;

    assert_eq!(outcome.state, Stage::Complete);
    assert_eq!(outcome.context.retry_count, 0);
    assert_eq!(outcome.context.tokens_used, 5200);

    let trace_path = outcome.trace_path.expect("trace file written");
    let trace: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(trace_path).unwrap()).unwrap();
    let completed: Vec<_> = trace["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "stage_completed")
        .collect();
    assert_eq!(completed.len(), 6);
}

/// One rework on review: `Review` demands changes once, then passes.
#[tokio::test]
async fn one_rework_on_review_reaches_complete() {
    let registry = StageRegistry::new()
        .with_worker(Stage::Analyze, Arc::new(FixedWorker::new(500, json!({"summary": "bug"}))))
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(400, json!({"severity": "high"}))))
        .with_worker(Stage::Plan, Arc::new(FixedWorker::new(600, json!({"plan_summary": "plan"}))))
        .with_worker(Stage::Generate, Arc::new(FixedWorker::new(3000, json!({"patch_files": ["a.rs"]}))))
        .with_worker(
            Stage::Review,
            Arc::new(ScriptedWorker::new(
                400,
                vec![json!({"requires_changes": true}), json!({"requires_changes": false})],
            )),
        )
        .with_worker(Stage::Validate, Arc::new(FixedWorker::new(300, json!({"tests_passed": true}))));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    let engine = Engine::new(cfg, registry);

    let outcome = engine.process(sample_task()).await;

    assert_eq!(outcome.state, Stage::Complete);
    assert!(outcome.context.retry_count >= 1, "one rework loop was taken");
}

/// Rework exhaustion: `Validate` never passes, so the task fails once
/// the rework budget is spent.
#[tokio::test]
async fn rework_exhaustion_fails_after_max_rework() {
    let registry = StageRegistry::new()
        .with_worker(Stage::Analyze, Arc::new(FixedWorker::new(10, json!({"summary": "bug"}))))
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(10, json!({"severity": "high"}))))
        .with_worker(Stage::Plan, Arc::new(FixedWorker::new(10, json!({"plan_summary": "plan"}))))
        .with_worker(Stage::Generate, Arc::new(FixedWorker::new(10, json!({"patch_files": ["a.rs"]}))))
        .with_worker(Stage::Review, Arc::new(FixedWorker::new(10, json!({"requires_changes": false}))))
        .with_worker(Stage::Validate, Arc::new(FixedWorker::new(10, json!({"tests_passed": false}))));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    cfg.max_rework = 3;
    let engine = Engine::new(cfg, registry);

    let outcome = engine.process(sample_task()).await;

    assert_eq!(outcome.state, Stage::Failed);
    let last_error = outcome.context.errors.last().expect("an error was recorded");
    assert!(last_error.message.to_lowercase().contains("rework"));
}

/// Token budget stop: `Analyze` alone blows the per-task cap, so the
/// guard on `Analyze -> Assess` denies and the task fails before `Assess`
/// ever runs.
#[tokio::test]
async fn token_budget_stop_before_assess() {
    let registry = StageRegistry::new()
        .with_worker(Stage::Analyze, Arc::new(FixedWorker::new(1500, json!({"summary": "bug"}))))
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(10, json!({"severity": "high"}))));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    cfg.policies.budget = BudgetPolicy {
        max_tokens_per_task: 1000,
        ..BudgetPolicy::default()
    };
    let engine = Engine::new(cfg, registry);

    let outcome = engine.process(sample_task()).await;

    assert_eq!(outcome.state, Stage::Failed);
    assert_eq!(outcome.context.tokens_used, 1500);

    let trace_path = outcome.trace_path.expect("trace file written");
    let trace: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(trace_path).unwrap()).unwrap();
    let assess_started = trace["events"].as_array().unwrap().iter().any(|e| {
        e["event_type"] == "stage_started" && e["agent"] == "impact_assessment"
    });
    assert!(!assess_started, "Assess must never have started");
}

/// Rate-limited retry: the first call raises a 429-style error, the
/// second succeeds.
#[tokio::test]
async fn rate_limited_retry_then_success() {
    let flaky = Arc::new(FlakyWorker::new(
        1,
        ErrorKind::RateLimit,
        "429 Too Many Requests",
        500,
        json!({"summary": "bug"}),
    ));
    let registry = StageRegistry::new()
        .with_worker(Stage::Analyze, flaky.clone())
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(10, json!({"severity": "high"}))))
        .with_worker(Stage::Plan, Arc::new(FixedWorker::new(10, json!({"plan_summary": "plan"}))))
        .with_worker(Stage::Generate, Arc::new(FixedWorker::new(10, json!({"patch_files": ["a.rs"]}))))
        .with_worker(Stage::Review, Arc::new(FixedWorker::new(10, json!({"requires_changes": false}))))
        .with_worker(Stage::Validate, Arc::new(FixedWorker::new(10, json!({"tests_passed": true}))));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    cfg.policies.retry = RetryPolicy {
        rate_limit_base_seconds: 0.01,
        ..RetryPolicy::default()
    };
    let engine = Engine::new(cfg, registry);

    let outcome = engine.process(sample_task()).await;

    assert_eq!(outcome.state, Stage::Complete);
    assert_eq!(flaky.attempts(), 2);
    assert_eq!(outcome.context.retry_count, 1);

    let trace_path = outcome.trace_path.expect("trace file written");
    let trace: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(trace_path).unwrap()).unwrap();
    let analyze_starts: Vec<i64> = trace["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "stage_started" && e["agent"] == "issue_intelligence")
        .map(|e| e["data"]["attempt"].as_i64().unwrap())
        .collect();
    assert_eq!(analyze_starts, vec![0, 1]);
}

/// Partial success: `Analyze` returns `success=false` with no exception.
/// The outgoing `SlotPopulated` guard denies the edge, and the recorded
/// error must be classified distinctly from a budget failure — this is a
/// rejected stage output, not an exhausted token/cost cap.
#[tokio::test]
async fn unsuccessful_stage_output_is_not_classified_as_budget_exceeded() {
    let registry = StageRegistry::new()
        .with_worker(Stage::Analyze, Arc::new(UnsuccessfulWorker::new(json!({"error": "could not analyze"}))))
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(10, json!({"severity": "high"}))));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    let engine = Engine::new(cfg, registry);

    let outcome = engine.process(sample_task()).await;

    assert_eq!(outcome.state, Stage::Failed);
    let last_error = outcome.context.errors.last().expect("an error was recorded");
    assert_eq!(last_error.kind, ErrorKind::Other);
    assert_ne!(last_error.kind, ErrorKind::BudgetExceeded);
}

/// Deadline exceeded: the whole-task timeout fires while a stage
/// worker is still sleeping.
#[tokio::test]
async fn whole_task_deadline_exceeded() {
    let registry = StageRegistry::new().with_worker(
        Stage::Analyze,
        Arc::new(SleepyWorker { sleep: Duration::from_secs(5) }),
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.trace_dir = dir.path().to_path_buf();
    cfg.policies.timeout.whole_task_seconds = 0;
    cfg.policies.timeout.stage_worker_seconds = 600;
    let engine = Engine::new(cfg, registry);

    let outcome = tokio::time::timeout(Duration::from_secs(5), engine.process(sample_task()))
        .await
        .expect("engine.process itself must return promptly once the whole-task deadline fires");

    assert_eq!(outcome.state, Stage::Failed);
    let last_error = outcome.context.errors.last().expect("an error was recorded");
    assert_eq!(last_error.kind, ErrorKind::DeadlineExceeded);
}
