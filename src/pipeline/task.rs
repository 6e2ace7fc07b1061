//! Outcomes of supervised pipeline tasks

use crate::error::Result;

/// How a sink task ended without an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Stopped because the run was cancelled
    Cancelled,
    /// The task gave up on its own; the run continues without it
    Disabled(String),
    /// The task ran out of work
    Finished,
}

impl TaskOutcome {
    /// Whether a run may keep going after a task ended this way
    pub fn is_benign(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled | TaskOutcome::Disabled(_))
    }
}

/// A finished task: its name and how it ended
pub type TaskExit = (String, Result<TaskOutcome>);
