//! Per-task results, a benchmark run, and the fan that drives the engine
//! across a batch of tasks.

use crate::error::BenchError;
use orc_engine::{Engine, TaskOutcome};
use orc_types::{RunId, Stage, TaskDescriptor};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// The outcome of processing a single task within a run. Field order and
/// names are the on-disk contract — both are normative for persisted JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResult {
    pub issue_id: String,
    pub issue_url: String,
    pub status: String,
    pub execution_time_seconds: f64,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub tests_passed: bool,
    pub regressions: u32,
    pub patch_generated: bool,
    #[serde(default)]
    pub patch_files: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub metrics: serde_json::Value,
}

impl IssueResult {
    /// Build a result from a finished [`TaskOutcome`] plus the wall-clock
    /// time the engine took. `tests_passed`/`regressions`/`patch_generated`
    /// are read out of the `Validate`/`Generate` slots when present — the
    /// engine's `StageOutput.payload` is stage-specific and opaque to this
    /// crate, so absent fields default conservatively to "unresolved".
    #[must_use]
    pub fn from_outcome(outcome: &TaskOutcome, execution_time_seconds: f64) -> Self {
        let ctx = &outcome.context;
        let tests_passed = ctx
            .slot(Stage::Validate)
            .map(|s| s.field_bool("tests_passed"))
            .unwrap_or(false);
        let regressions = ctx
            .slot(Stage::Validate)
            .and_then(|s| s.payload.get("regressions"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        let patch_generated = ctx.has_slot(Stage::Generate);
        let patch_files = ctx
            .slot(Stage::Generate)
            .and_then(|s| s.payload.get("patch_files"))
            .and_then(serde_json::Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            issue_id: ctx.task_id.to_string(),
            issue_url: ctx.source_url.clone(),
            status: if outcome.is_complete() { "success".to_string() } else { "failed".to_string() },
            execution_time_seconds,
            tokens_used: ctx.tokens_used,
            cost_usd: ctx.cost_usd,
            tests_passed,
            regressions,
            patch_generated,
            patch_files,
            errors: ctx.errors.iter().map(|e| e.message.clone()).collect(),
            metrics: serde_json::Value::Null,
        }
    }
}

/// Derived (never stored) cross-task aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RunSummary {
    NoResults { status: String },
    Stats(RunStats),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStats {
    pub run_id: String,
    pub target: String,
    pub total_issues: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub tests_passed: usize,
    pub test_pass_rate: f64,
    pub patches_generated: usize,
    pub total_regressions: u32,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_time_seconds: f64,
    pub avg_time_per_issue: f64,
}

/// A complete, durable record of one benchmark run. Frozen after
/// [`BenchmarkFan::complete_run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub run_id: RunId,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub target: String,
    pub total: usize,
    pub results: Vec<IssueResult>,
}

impl BenchmarkRun {
    fn new(run_id: RunId, target: impl Into<String>) -> Self {
        Self {
            run_id,
            started_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
            target: target.into(),
            total: 0,
            results: Vec::new(),
        }
    }

    fn add_result(&mut self, result: IssueResult) {
        self.results.push(result);
        self.total = self.results.len();
    }

    /// Compute the summary statistics. Division by zero (an empty result
    /// set) yields `{"status": "no_results"}`, modeled here as
    /// [`RunSummary::NoResults`].
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        if self.results.is_empty() {
            return RunSummary::NoResults { status: "no_results".to_string() };
        }

        let total = self.results.len();
        let successful = self.results.iter().filter(|r| r.status == "success").count();
        let failed = self.results.iter().filter(|r| r.status == "failed").count();
        let tests_passed = self.results.iter().filter(|r| r.tests_passed).count();
        let patches_generated = self.results.iter().filter(|r| r.patch_generated).count();
        let total_regressions: u32 = self.results.iter().map(|r| r.regressions).sum();
        let total_tokens: u64 = self.results.iter().map(|r| r.tokens_used).sum();
        let total_cost_usd: f64 = self.results.iter().map(|r| r.cost_usd).sum();
        let total_time_seconds: f64 = self.results.iter().map(|r| r.execution_time_seconds).sum();

        RunSummary::Stats(RunStats {
            run_id: self.run_id.to_string(),
            target: self.target.clone(),
            total_issues: total,
            successful,
            failed,
            success_rate: successful as f64 / total as f64,
            tests_passed,
            test_pass_rate: tests_passed as f64 / total as f64,
            patches_generated,
            total_regressions,
            total_tokens,
            total_cost_usd,
            total_time_seconds,
            avg_time_per_issue: total_time_seconds / total as f64,
        })
    }
}

/// Delta between two runs' summaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RunComparison {
    pub success_rate_delta: f64,
    pub test_pass_rate_delta: f64,
    pub avg_time_delta: f64,
    pub cost_delta: f64,
}

/// Drives the engine across a batch of tasks and persists/aggregates the
/// results.
pub struct BenchmarkFan {
    output_dir: PathBuf,
    current: Option<BenchmarkRun>,
}

impl BenchmarkFan {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            current: None,
        }
    }

    /// Start a new run, replacing any prior unfinished one.
    pub fn start_run(&mut self, target: impl Into<String>) -> RunId {
        let run = BenchmarkRun::new(RunId::new(), target);
        let run_id = run.run_id.clone();
        self.current = Some(run);
        run_id
    }

    /// Record one task's result against the active run. A no-op if no run
    /// is active.
    pub fn record(&mut self, result: IssueResult) {
        if let Some(run) = self.current.as_mut() {
            run.add_result(result);
        }
    }

    /// Freeze and persist the active run to
    /// `<output_dir>/<run_id>.json`, clearing the active-run slot.
    pub fn complete_run(&mut self) -> Result<PathBuf, BenchError> {
        let mut run = self.current.take().ok_or(BenchError::NoActiveRun)?;
        run.completed_at = Some(chrono::Utc::now().to_rfc3339());

        std::fs::create_dir_all(&self.output_dir).map_err(|source| BenchError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self.output_dir.join(format!("{}.json", run.run_id));
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&PersistedRun::from(&run))?;
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(|source| BenchError::Write {
                path: tmp_path.clone(),
                source,
            })?;
            file.write_all(&body).map_err(|source| BenchError::Write {
                path: tmp_path.clone(),
                source,
            })?;
            file.sync_all().map_err(|source| BenchError::Write {
                path: tmp_path.clone(),
                source,
            })?;
        }
        std::fs::rename(&tmp_path, &path).map_err(|source| BenchError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "benchmark run saved");
        Ok(path)
    }

    /// Load a previously persisted run by id.
    pub fn load_run(&self, run_id: &RunId) -> Result<BenchmarkRun, BenchError> {
        let path = self.output_dir.join(format!("{run_id}.json"));
        let text = std::fs::read_to_string(&path).map_err(|source| BenchError::Read {
            path: path.clone(),
            source,
        })?;
        let persisted: PersistedRun = serde_json::from_str(&text)?;
        Ok(persisted.into())
    }

    /// Compare two completed runs' summaries.
    pub fn compare(&self, run_id_a: &RunId, run_id_b: &RunId) -> Result<RunComparison, BenchError> {
        let a = self.load_run(run_id_a)?.summary();
        let b = self.load_run(run_id_b)?.summary();
        let (RunSummary::Stats(a), RunSummary::Stats(b)) = (a, b) else {
            return Ok(RunComparison {
                success_rate_delta: 0.0,
                test_pass_rate_delta: 0.0,
                avg_time_delta: 0.0,
                cost_delta: 0.0,
            });
        };
        Ok(RunComparison {
            success_rate_delta: b.success_rate - a.success_rate,
            test_pass_rate_delta: b.test_pass_rate - a.test_pass_rate,
            avg_time_delta: b.avg_time_per_issue - a.avg_time_per_issue,
            cost_delta: b.total_cost_usd - a.total_cost_usd,
        })
    }

    /// Drive `engine` across every task in `tasks`, up to `concurrency`
    /// tasks in flight at once, recording each result against the active
    /// run as it completes.
    ///
    /// Each spawned task calls `engine.process` end to end with no shared
    /// mutable task-scoped state; only the `Semaphore` is shared across them.
    pub async fn run_batch(
        &mut self,
        engine: Arc<Engine>,
        tasks: Vec<TaskDescriptor>,
        concurrency: usize,
    ) {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let engine = Arc::clone(&engine);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let start = std::time::Instant::now();
                let outcome = engine.process(task).await;
                let elapsed = start.elapsed().as_secs_f64();
                IssueResult::from_outcome(&outcome, elapsed)
            }));
        }
        for handle in handles {
            match handle.await {
                Ok(result) => self.record(result),
                Err(e) => tracing::error!(error = %e, "task panicked during benchmark run"),
            }
        }
    }
}

/// On-disk representation. Kept separate from [`BenchmarkRun`] only so the
/// fixed field order (`run_id`, `started_at`, `completed_at`, `target`,
/// `total`, `summary`, `results`) appears on disk while
/// [`BenchmarkRun::summary`] stays derived rather than stored.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRun {
    run_id: RunId,
    started_at: String,
    completed_at: Option<String>,
    target: String,
    total: usize,
    summary: RunSummary,
    results: Vec<IssueResult>,
}

impl From<&BenchmarkRun> for PersistedRun {
    fn from(run: &BenchmarkRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            started_at: run.started_at.clone(),
            completed_at: run.completed_at.clone(),
            target: run.target.clone(),
            total: run.total,
            summary: run.summary(),
            results: run.results.clone(),
        }
    }
}

impl From<PersistedRun> for BenchmarkRun {
    fn from(p: PersistedRun) -> Self {
        Self {
            run_id: p.run_id,
            started_at: p.started_at,
            completed_at: p.completed_at,
            target: p.target,
            total: p.total,
            results: p.results,
        }
    }
}

#[cfg(test)]
fn sample_result(status: &str, tokens: u64, tests_passed: bool) -> IssueResult {
    IssueResult {
        issue_id: "issue-1".to_string(),
        issue_url: "https://github.com/o/r/issues/1".to_string(),
        status: status.to_string(),
        execution_time_seconds: 12.5,
        tokens_used: tokens,
        cost_usd: 0.01,
        tests_passed,
        regressions: 0,
        patch_generated: true,
        patch_files: vec!["src/lib.rs".to_string()],
        errors: Vec::new(),
        metrics: serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_run_summary_is_no_results() {
        let run = BenchmarkRun::new(RunId::new(), "octocat/hello-world");
        assert_eq!(
            run.summary(),
            RunSummary::NoResults { status: "no_results".to_string() }
        );
    }

    #[test]
    fn summary_computes_rates_and_sums() {
        let mut run = BenchmarkRun::new(RunId::new(), "octocat/hello-world");
        run.add_result(sample_result("success", 1000, true));
        run.add_result(sample_result("failed", 500, false));

        let RunSummary::Stats(stats) = run.summary() else {
            panic!("expected Stats");
        };
        assert_eq!(stats.total_issues, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.tests_passed, 1);
        assert_eq!(stats.total_tokens, 1500);
    }

    #[test]
    fn start_record_complete_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut fan = BenchmarkFan::new(dir.path());

        let run_id = fan.start_run("octocat/hello-world");
        fan.record(sample_result("success", 1000, true));
        fan.record(sample_result("success", 2000, true));
        let path = fan.complete_run().expect("complete_run");
        assert!(path.exists());

        let loaded = fan.load_run(&run_id).expect("load_run");
        assert_eq!(loaded.run_id, run_id);
        assert_eq!(loaded.total, 2);
        assert_eq!(loaded.results.len(), 2);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn complete_run_without_start_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut fan = BenchmarkFan::new(dir.path());
        assert!(matches!(fan.complete_run(), Err(BenchError::NoActiveRun)));
    }

    #[test]
    fn compare_computes_deltas() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut fan = BenchmarkFan::new(dir.path());

        let run_a = fan.start_run("octocat/hello-world");
        fan.record(sample_result("failed", 1000, false));
        fan.complete_run().expect("complete a");

        let run_b = fan.start_run("octocat/hello-world");
        fan.record(sample_result("success", 1000, true));
        fan.complete_run().expect("complete b");

        let delta = fan.compare(&run_a, &run_b).expect("compare");
        assert!((delta.success_rate_delta - 1.0).abs() < 1e-9);
        assert!((delta.test_pass_rate_delta - 1.0).abs() < 1e-9);
    }
}
