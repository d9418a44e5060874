//! State machine enforcing the six-stage workflow's transition relation.
//!
//! The transition table is built once at construction; lookups distinguish
//! an edge that does not exist at all from one that exists but whose guard
//! denies the move, so callers can tell a structurally impossible move
//! apart from a policy-level denial.

use orc_types::{ErrorKind, GuardKind, Stage, TaskContext, Transition};
use thiserror::Error;

/// Thresholds a guard closes over. Kept as plain values rather than a
/// dependency on `orc-policies` so the state machine stays a leaf crate;
/// the engine is what actually threads policy config through.
#[derive(Debug, Clone, Copy)]
pub struct GuardBudget {
    pub max_tokens_per_task: u64,
    pub max_rework: u32,
}

impl Default for GuardBudget {
    fn default() -> Self {
        Self {
            max_tokens_per_task: 100_000,
            max_rework: 3,
        }
    }
}

/// Failure to transition. Distinguishes a structurally impossible edge from
/// an edge whose guard denied the move.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no transition from {from} to {to}")]
    NoSuchEdge { from: Stage, to: Stage },
    #[error("transition from {from} to {to} denied by guard")]
    GuardDenied { from: Stage, to: Stage },
}

impl TransitionError {
    /// The structured classification the engine attaches to its error
    /// record.
    #[must_use]
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            TransitionError::NoSuchEdge { .. } => ErrorKind::InvalidTransition,
            TransitionError::GuardDenied { .. } => ErrorKind::Other,
        }
    }
}

fn transition_table() -> Vec<Transition> {
    use GuardKind::{ReviewPassed, ReworkBudget, SlotPopulated, TokenBudget, ValidationPassed};
    use Stage::{Analyze, Assess, Complete, Failed, Generate, Pending, Plan, Review, Validate};

    vec![
        // Linear forward
        Transition::new(Pending, Analyze, Some(TokenBudget)),
        Transition::new(Analyze, Assess, Some(SlotPopulated(Analyze))),
        Transition::new(Assess, Plan, Some(SlotPopulated(Assess))),
        Transition::new(Plan, Generate, Some(SlotPopulated(Plan))),
        Transition::new(Generate, Review, Some(SlotPopulated(Generate))),
        Transition::new(Review, Validate, Some(ReviewPassed)),
        Transition::new(Validate, Complete, Some(ValidationPassed)),
        // Rework
        Transition::new(Review, Generate, Some(ReworkBudget)),
        Transition::new(Validate, Generate, Some(ReworkBudget)),
        // Failure from any non-terminal state
        Transition::new(Analyze, Failed, None),
        Transition::new(Assess, Failed, None),
        Transition::new(Plan, Failed, None),
        Transition::new(Generate, Failed, None),
        Transition::new(Review, Failed, None),
        Transition::new(Validate, Failed, None),
        Transition::new(Pending, Failed, None),
    ]
}

fn eval_guard(guard: GuardKind, ctx: &TaskContext, budget: GuardBudget) -> bool {
    match guard {
        GuardKind::TokenBudget => ctx.tokens_used < budget.max_tokens_per_task,
        GuardKind::SlotPopulated(stage) => ctx
            .slot(stage)
            .map(|slot| {
                slot.success
                    && stage
                        .required_slot_field()
                        .map(|field| slot.field_non_empty(field))
                        .unwrap_or(true)
            })
            .unwrap_or(false),
        GuardKind::ReviewPassed => ctx
            .slot(Stage::Review)
            .map(|slot| !slot.field_bool("requires_changes"))
            .unwrap_or(false),
        GuardKind::ValidationPassed => ctx
            .slot(Stage::Validate)
            .map(|slot| slot.field_bool("tests_passed"))
            .unwrap_or(false),
        GuardKind::ReworkBudget => ctx.retry_count < budget.max_rework,
    }
}

/// Drives the transition relation; owns its own history for `reset()`-based
/// test fixtures and for reconstructing a run's path from the live state
/// alone (the tracer keeps the authoritative event-level history).
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: Stage,
    history: Vec<Stage>,
    table: Vec<Transition>,
    budget: GuardBudget,
}

impl StateMachine {
    #[must_use]
    pub fn new(budget: GuardBudget) -> Self {
        Self {
            current: Stage::Pending,
            history: vec![Stage::Pending],
            table: transition_table(),
            budget,
        }
    }

    #[must_use]
    pub fn current(&self) -> Stage {
        self.current
    }

    #[must_use]
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// The stage worker registry key for the current state, if any.
    #[must_use]
    pub fn next_worker(&self) -> Option<&'static str> {
        self.current.worker_name()
    }

    fn edge(&self, to: Stage) -> Option<&Transition> {
        self.table
            .iter()
            .find(|t| t.from == self.current && t.to == to)
    }

    /// Edge exists AND (no guard OR guard passes).
    #[must_use]
    pub fn can_transition(&self, to: Stage, ctx: &TaskContext) -> bool {
        match self.edge(to) {
            None => false,
            Some(t) => t
                .guard
                .map(|g| eval_guard(g, ctx, self.budget))
                .unwrap_or(true),
        }
    }

    /// Attempt the transition, distinguishing "no such edge" from "guard
    /// denied" so callers can escalate a denied rework to `Failed` rather
    /// than treating it as a bug.
    pub fn transition(&mut self, to: Stage, ctx: &TaskContext) -> Result<(), TransitionError> {
        let Some(t) = self.edge(to) else {
            return Err(TransitionError::NoSuchEdge {
                from: self.current,
                to,
            });
        };
        if let Some(guard) = t.guard {
            if !eval_guard(guard, ctx, self.budget) {
                return Err(TransitionError::GuardDenied {
                    from: self.current,
                    to,
                });
            }
        }
        tracing::debug!(from = %self.current, to = %to, "state transition");
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Reset to `Pending` with an empty history, for test fixtures.
    pub fn reset(&mut self) {
        self.current = Stage::Pending;
        self.history = vec![Stage::Pending];
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(GuardBudget::default())
    }
}
