//! Drives the state machine to completion.

use crate::config::OrchestratorConfig;
use crate::error::EngineError;
use crate::registry::StageRegistry;
use crate::worker::{StageWorker, WorkerError};
use orc_policies::PolicyConfig;
use orc_state::{GuardBudget, StateMachine, TransitionError};
use orc_tracer::ExecutionTracer;
use orc_types::{ErrorRecord, Stage, TaskContext, TaskDescriptor};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;

/// The reason a transition was taken, recorded on the `transition` trace
/// event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionReason {
    Linear,
    Rework,
    Failure,
}

impl TransitionReason {
    fn as_str(self) -> &'static str {
        match self {
            TransitionReason::Linear => "linear",
            TransitionReason::Rework => "rework",
            TransitionReason::Failure => "failure",
        }
    }
}

/// The finished record of one task's run: the context the workers built up,
/// the terminal stage it landed on, and where its trace was persisted.
///
/// [`TaskContext`] itself (shared by every `orc-*` crate) has no opinion on
/// "final state" — the engine is the only component that knows when a task
/// is done, so it packages the two together here.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub context: TaskContext,
    pub state: Stage,
    pub trace_path: Option<PathBuf>,
}

impl TaskOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == Stage::Complete
    }
}

/// Drives the six-stage workflow for one task at a time.
///
/// A single `Engine` instance is reused across tasks (it owns no per-task
/// mutable state); [`Engine::process`] constructs a fresh
/// [`TaskContext`]/[`StateMachine`]/[`ExecutionTracer`] for each call, so no
/// mutable task-scoped state is ever shared across calls.
pub struct Engine {
    registry: StageRegistry,
    policies: PolicyConfig,
    max_rework: u32,
    trace_dir: PathBuf,
}

impl Engine {
    #[must_use]
    pub fn new(config: OrchestratorConfig, registry: StageRegistry) -> Self {
        Self {
            registry,
            policies: config.policies,
            max_rework: config.max_rework,
            trace_dir: config.trace_dir,
        }
    }

    /// Drive `descriptor` through the workflow to a terminal state.
    ///
    /// Never raises to the caller: every fatal condition is recorded as an
    /// [`ErrorRecord`] on the returned context and the terminal stage is
    /// [`Stage::Failed`].
    pub async fn process(&self, descriptor: TaskDescriptor) -> TaskOutcome {
        let task_id = descriptor.task_id;
        let mut ctx = TaskContext::new(descriptor);
        let mut sm = StateMachine::new(GuardBudget {
            max_tokens_per_task: self.policies.budget.max_tokens_per_task,
            max_rework: self.max_rework,
        });
        let mut tracer = ExecutionTracer::new(&self.trace_dir);
        tracer.start_trace(task_id);
        tracer.add_event(
            "execution_started",
            json!({
                "source_url": ctx.source_url,
                "repository": ctx.repository.full_name(),
            }),
            None,
            None,
        );

        let whole_task_timeout =
            self.policies.timeout.duration(orc_policies::TimeoutCategory::WholeTask);

        let outcome = match tokio::time::timeout(
            whole_task_timeout,
            self.run_to_terminal(&mut ctx, &mut sm, &mut tracer),
        )
        .await
        {
            Ok(()) => sm.current(),
            Err(_elapsed) => {
                let err = EngineError::DeadlineExceeded(format!(
                    "whole-task deadline of {whole_task_timeout:?} exceeded"
                ));
                tracing::warn!(%task_id, %err, "task failing");
                ctx.push_error(ErrorRecord::new(None, err.error_kind(), err.to_string()));
                tracer.add_event(
                    "stage_failed",
                    json!({"reason": "deadline_exceeded"}),
                    None,
                    None,
                );
                Stage::Failed
            }
        };

        let status = if outcome == Stage::Complete { "success" } else { "failed" };
        tracing::info!(%task_id, %status, tokens_used = ctx.tokens_used, "task execution finished");
        tracer.add_event(
            "execution_completed",
            json!({"status": status, "total_tokens": ctx.tokens_used}),
            None,
            None,
        );
        let trace_path = tracer.complete_trace(status, ctx.tokens_used).ok().flatten();

        TaskOutcome {
            context: ctx,
            state: outcome,
            trace_path,
        }
    }

    /// Drive the state machine until it reaches `Complete` or `Failed`,
    /// mutating `ctx`/`sm`/`tracer` in place. Cancellation-safe: every
    /// `.await` inside is ordinary tokio I/O, so the caller's outer
    /// `tokio::time::timeout` can drop this future at any `.await` point
    /// without leaving `sm`/`tracer` inconsistent (the next read simply
    /// never happens).
    async fn run_to_terminal(
        &self,
        ctx: &mut TaskContext,
        sm: &mut StateMachine,
        tracer: &mut ExecutionTracer,
    ) {
        if let Err(e) = sm.transition(Stage::Analyze, ctx) {
            self.fail(ctx, sm, tracer, EngineError::BudgetExceeded(e.to_string()));
            return;
        }

        while !sm.is_terminal() {
            let stage = sm.current();
            let Some(worker) = self.registry.get(stage) else {
                self.fail(
                    ctx,
                    sm,
                    tracer,
                    EngineError::WorkerNotFound { stage },
                );
                return;
            };

            tracer.add_event(
                "budget_checkpoint",
                json!({"tokens_used": ctx.tokens_used, "cost_usd": ctx.cost_usd}),
                None,
                None,
            );

            let output = match self
                .run_stage_with_retry(ctx, stage, worker.as_ref(), tracer)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    self.fail(ctx, sm, tracer, e);
                    return;
                }
            };

            ctx.tokens_used = ctx.tokens_used.saturating_add(output.tokens_used);
            ctx.cost_usd += self.policies.budget.estimate_cost(0, output.tokens_used);
            ctx.set_slot(stage, output);

            let (target, reason) = self.next_target(stage, ctx);
            match sm.transition(target, ctx) {
                Ok(()) => {
                    if reason == TransitionReason::Rework {
                        // Shares the same cap and counter as a stage's own
                        // transient retries, so ReworkBudget can eventually deny.
                        ctx.retry_count += 1;
                    }
                    tracer.add_event(
                        "transition",
                        json!({"from": stage.to_string(), "to": target.to_string(), "reason": reason.as_str()}),
                        None,
                        None,
                    );
                }
                Err(TransitionError::GuardDenied { .. }) if reason == TransitionReason::Rework => {
                    let msg = format!("rework exhausted after {} attempts", ctx.retry_count);
                    self.fail(ctx, sm, tracer, EngineError::ReworkExhausted(msg, stage));
                    return;
                }
                Err(TransitionError::GuardDenied { .. }) => {
                    // Every non-rework linear edge still in play here is
                    // `SlotPopulated`: the stage's own output didn't satisfy
                    // its outgoing guard (success=false, or its required
                    // field was missing/empty). Spec §4.3: the engine never
                    // second-guesses a worker's structured output, it just
                    // fails the task when the guard it gates says no.
                    let msg = format!("transition {stage} -> {target} denied");
                    self.fail(
                        ctx,
                        sm,
                        tracer,
                        EngineError::StageOutputRejected { stage, reason: msg },
                    );
                    return;
                }
                Err(TransitionError::NoSuchEdge { from, to }) => {
                    let msg = format!("no transition {from} -> {to}");
                    self.fail(ctx, sm, tracer, EngineError::InvalidTransition(msg));
                    return;
                }
            }
        }
    }

    /// The linear-or-rework target for the edge leaving `stage`.
    fn next_target(&self, stage: Stage, ctx: &TaskContext) -> (Stage, TransitionReason) {
        match stage {
            Stage::Review => {
                let requires_changes = ctx
                    .slot(Stage::Review)
                    .map(|s| s.field_bool("requires_changes"))
                    .unwrap_or(false);
                if requires_changes {
                    (Stage::Generate, TransitionReason::Rework)
                } else {
                    (Stage::Validate, TransitionReason::Linear)
                }
            }
            Stage::Validate => {
                let tests_passed = ctx
                    .slot(Stage::Validate)
                    .map(|s| s.field_bool("tests_passed"))
                    .unwrap_or(false);
                if tests_passed {
                    (Stage::Complete, TransitionReason::Linear)
                } else {
                    (Stage::Generate, TransitionReason::Rework)
                }
            }
            Stage::Analyze => (Stage::Assess, TransitionReason::Linear),
            Stage::Assess => (Stage::Plan, TransitionReason::Linear),
            Stage::Plan => (Stage::Generate, TransitionReason::Linear),
            Stage::Generate => (Stage::Review, TransitionReason::Linear),
            Stage::Pending | Stage::Complete | Stage::Failed => {
                unreachable!("next_target called on a non-working stage")
            }
        }
    }

    /// Run `worker` under the per-stage timeout and the retry policy,
    /// looping until it succeeds, exhausts `max_retries`, or returns a
    /// non-retryable error.
    async fn run_stage_with_retry(
        &self,
        ctx: &mut TaskContext,
        stage: Stage,
        worker: &dyn StageWorker,
        tracer: &mut ExecutionTracer,
    ) -> Result<orc_types::StageOutput, EngineError> {
        let stage_timeout = self
            .policies
            .timeout
            .duration(orc_policies::TimeoutCategory::StageWorker);
        let worker_name = stage.worker_name();

        let mut attempt: u32 = 0;
        loop {
            if !self.policies.budget.check_tokens(ctx.tokens_used, 0) {
                return Err(EngineError::BudgetExceeded(format!(
                    "{} tokens already at/over the per-task cap",
                    ctx.tokens_used
                )));
            }

            tracer.add_event(
                "stage_started",
                json!({"attempt": attempt}),
                worker_name.map(str::to_string),
                None,
            );
            let start = Instant::now();

            let outcome = tokio::time::timeout(stage_timeout, worker.run(ctx)).await;
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

            let worker_error = match outcome {
                Ok(Ok(output)) => {
                    tracer.add_event(
                        "stage_completed",
                        json!({"attempt": attempt, "tokens_used": output.tokens_used}),
                        worker_name.map(str::to_string),
                        Some(duration_ms),
                    );
                    return Ok(output);
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => WorkerError::transient(format!(
                    "{stage} worker exceeded its {stage_timeout:?} timeout"
                )),
            };

            tracer.add_event(
                "stage_failed",
                json!({"attempt": attempt, "error": worker_error.message}),
                worker_name.map(str::to_string),
                Some(duration_ms),
            );

            if !worker_error.retryable {
                return Err(EngineError::Worker(worker_error));
            }

            let decision = self
                .policies
                .retry
                .decide(attempt, worker_error.kind, &worker_error.message);
            if !decision.should_retry {
                return Err(EngineError::Worker(worker_error));
            }

            tokio::time::sleep(std::time::Duration::from_secs_f64(decision.delay_seconds)).await;
            attempt += 1;
            ctx.retry_count += 1;
        }
    }

    /// Record `err` on the context and force the state machine to `Failed`.
    /// The `Failed` edge has no guard, so this transition can never itself
    /// fail.
    fn fail(
        &self,
        ctx: &mut TaskContext,
        sm: &mut StateMachine,
        tracer: &mut ExecutionTracer,
        err: EngineError,
    ) {
        let kind = err.error_kind();
        let stage = Some(sm.current()).filter(|s| !s.is_terminal());
        tracing::warn!(?stage, %err, "task failing");
        ctx.push_error(ErrorRecord::new(stage, kind, err.to_string()));
        tracer.add_event(
            "stage_failed",
            json!({"terminal": true, "error": err.to_string()}),
            None,
            None,
        );
        if sm.current() != Stage::Failed {
            let from = sm.current();
            sm.transition(Stage::Failed, ctx)
                .expect("Failed is reachable from every non-terminal state without a guard");
            tracer.add_event(
                "transition",
                json!({"from": from.to_string(), "to": "Failed", "reason": "failure"}),
                None,
                None,
            );
        }
    }
}
