//! The fixed stage sequence and the transition relation over it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One leg of the fixed workflow, plus the three sentinel states that
/// bracket execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Pending,
    Analyze,
    Assess,
    Plan,
    Generate,
    Review,
    Validate,
    Complete,
    Failed,
}

impl Stage {
    /// All six working states, in pipeline order.
    pub const WORKING: [Stage; 6] = [
        Stage::Analyze,
        Stage::Assess,
        Stage::Plan,
        Stage::Generate,
        Stage::Review,
        Stage::Validate,
    ];

    /// Whether this state is terminal (`Complete` or `Failed`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    /// The registry key a stage worker is looked up under for this state,
    /// or `None` for sentinel states that have no worker.
    #[must_use]
    pub const fn worker_name(self) -> Option<&'static str> {
        match self {
            Stage::Analyze => Some("issue_intelligence"),
            Stage::Assess => Some("impact_assessment"),
            Stage::Plan => Some("planner"),
            Stage::Generate => Some("code_generator"),
            Stage::Review => Some("pr_reviewer"),
            Stage::Validate => Some("validator"),
            Stage::Pending | Stage::Complete | Stage::Failed => None,
        }
    }

    /// The payload field a `SlotPopulated` guard requires to be present and
    /// non-empty in this stage's slot before its outgoing linear edge may be
    /// taken (e.g. `Analyze -> Assess` requires `issue_analysis.summary`
    /// non-empty). `None` for stages whose outgoing edge isn't gated by
    /// `SlotPopulated`.
    #[must_use]
    pub const fn required_slot_field(self) -> Option<&'static str> {
        match self {
            Stage::Analyze => Some("summary"),
            Stage::Assess => Some("severity"),
            Stage::Plan => Some("plan_summary"),
            Stage::Generate => Some("patch_files"),
            Stage::Pending
            | Stage::Review
            | Stage::Validate
            | Stage::Complete
            | Stage::Failed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A guard predicate kind attached to a [`Transition`].
///
/// Kept as a closed enum (rather than a boxed `Fn`) so the state machine can
/// be built once, cloned cheaply, and inspected in tests without capturing
/// closures over policy state — each variant is evaluated against the
/// [`crate::TaskContext`] / retry budget it is given at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardKind {
    /// `Pending -> Analyze`: cumulative tokens below the per-task cap.
    TokenBudget,
    /// Upstream stage's slot succeeded and carries its
    /// [`Stage::required_slot_field`] non-empty (e.g. `Analyze`'s slot must
    /// have a non-empty `summary` before `Assess` may run).
    SlotPopulated(Stage),
    /// `Review -> Validate`: `review.requires_changes == false`.
    ReviewPassed,
    /// `Validate -> Complete`: `validation.tests_passed == true`.
    ValidationPassed,
    /// Rework edges: `retry_count < MAX_REWORK`.
    ReworkBudget,
}

/// A single edge in the transition relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub guard: Option<GuardKind>,
}

impl Transition {
    #[must_use]
    pub const fn new(from: Stage, to: Stage, guard: Option<GuardKind>) -> Self {
        Self { from, to, guard }
    }
}
