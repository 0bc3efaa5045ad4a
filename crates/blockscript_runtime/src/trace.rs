// Run Trace - Per-block outcomes, run status and the final result

use std::fmt;

use blockscript_types::{BlockId, Value, VariableStore};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ExecutionError;

// ─────────────────────────────────────────────────────────────────────────────
// Trace
// ─────────────────────────────────────────────────────────────────────────────

/// What happened when the interpreter reached a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BlockOutcome {
    /// Ran with no effect on the store
    Executed,
    /// Wrote a variable
    Assigned { variable: String, value: Value },
    /// Condition evaluated; `taken` is the predicate result
    Branched { taken: bool },
    /// Loop finished after `iterations` passes
    Looped { iterations: u32 },
    /// Not reached through any live edge
    Skipped,
    /// Loop stopped by cancellation after `iterations` passes
    Interrupted { iterations: u32 },
    /// Raised the run's error
    Failed { reason: String },
}

/// One step of a run, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub block_id: BlockId,
    #[serde(flatten)]
    pub outcome: BlockOutcome,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.block_id)?;
        match &self.outcome {
            BlockOutcome::Executed => write!(f, "executed"),
            BlockOutcome::Assigned { variable, value } => write!(f, "{} = {}", variable, value),
            BlockOutcome::Branched { taken } => write!(f, "branched ({})", taken),
            BlockOutcome::Looped { iterations } => write!(f, "looped {} time(s)", iterations),
            BlockOutcome::Skipped => write!(f, "skipped"),
            BlockOutcome::Interrupted { iterations } => {
                write!(f, "interrupted after {} iteration(s)", iterations)
            }
            BlockOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run State
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl From<RunStatus> for RunState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Failed => RunState::Failed,
            RunStatus::Cancelled => RunState::Cancelled,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&RunState::from(*self), f)
    }
}

/// Current state of an interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// No run has started yet
    Idle = 0,
    /// Building the execution plan
    Validating = 1,
    /// Executing blocks
    Running = 2,
    /// Last run finished normally
    Completed = 3,
    /// Last run stopped on an error
    Failed = 4,
    /// Last run was cancelled at a loop boundary
    Cancelled = 5,
}

impl RunState {
    /// Convert from u8
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Validating,
            2 => Self::Running,
            3 => Self::Completed,
            5 => Self::Cancelled,
            _ => Self::Failed,
        }
    }

    /// Check if a run is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Validating | RunState::Running)
    }

    /// Check if this is the end state of a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Validating => write!(f, "validating"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run Result
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a run reports back
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Correlates log lines of one run
    pub run_id: Uuid,
    /// Graph version the run executed against
    pub graph_version: u64,
    pub status: RunStatus,
    /// Store snapshot at the end of the run
    pub variables: VariableStore,
    pub trace: Vec<TraceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Last recorded outcome for a block
    pub fn outcome_of(&self, block: BlockId) -> Option<&BlockOutcome> {
        self.trace
            .iter()
            .rev()
            .find(|entry| entry.block_id == block)
            .map(|entry| &entry.outcome)
    }

    /// Every outcome recorded for a block, in order
    pub fn outcomes_of(&self, block: BlockId) -> impl Iterator<Item = &BlockOutcome> {
        self.trace
            .iter()
            .filter(move |entry| entry.block_id == block)
            .map(|entry| &entry.outcome)
    }

    /// Whether the block did something other than being skipped
    pub fn ran(&self, block: BlockId) -> bool {
        self.outcomes_of(block)
            .any(|outcome| !matches!(outcome, BlockOutcome::Skipped))
    }
}
