//! Per-task execution state.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::StageError;

/// Lifecycle of one task within one run.
///
/// `Pending → Ready → Running → {Completed, Failed}` or `Pending → Skipped`.
/// A `Ready` task that is cancelled before it starts moves straight to
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Skipped
        )
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Ready, Failed)
                | (Running, Completed)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why a task was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    PredicateFalse(String),
    MissingInputs(Vec<String>),
    RunCancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PredicateFalse(p) => write!(f, "predicate not satisfied: {p}"),
            SkipReason::MissingInputs(fields) => {
                write!(f, "inputs not committed: {}", fields.join(", "))
            }
            SkipReason::RunCancelled => write!(f, "run cancelled"),
        }
    }
}

/// Why a task failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Stage(StageError),
    Timeout(Duration),
    Cancelled,
    Panicked(String),
    Unregistered,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Stage(e) => write!(f, "{e}"),
            FailureReason::Timeout(after) => {
                write!(f, "timed out after {}ms", after.as_millis())
            }
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Panicked(msg) => write!(f, "stage panicked: {msg}"),
            FailureReason::Unregistered => write!(f, "no stage registered"),
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: TaskState,
    pub at: DateTime<Utc>,
}

/// Execution record for one task in one run.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub task_id: String,
    pub phase: u32,
    pub inputs_digest: String,
    pub attempts: u32,
    transitions: Vec<Transition>,
}

impl TaskRun {
    pub fn new(task_id: impl Into<String>, phase: u32, inputs_digest: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            phase,
            inputs_digest: inputs_digest.into(),
            attempts: 0,
            transitions: vec![Transition {
                state: TaskState::Pending,
                at: Utc::now(),
            }],
        }
    }

    pub fn state(&self) -> TaskState {
        self.transitions
            .last()
            .map(|t| t.state)
            .unwrap_or(TaskState::Pending)
    }

    /// Move to `next`. Returns `false` and leaves the state unchanged when
    /// the transition is not permitted.
    pub fn advance(&mut self, next: TaskState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            tracing::warn!(
                task = %self.task_id,
                from = %current,
                to = %next,
                "illegal task transition ignored"
            );
            return false;
        }
        self.transitions.push(Transition {
            state: next,
            at: Utc::now(),
        });
        true
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}
