//! Run and Session Errors
//!
//! Execution errors abort a run and are carried in its `RunResult`. Session
//! errors are returned synchronously by graph edits.

use blockscript_types::{ActionError, BlockId, GraphError, Value};
use serde::Serialize;

// ─────────────────────────────────────────────────────────────────────────────
// Execution Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that abort a run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("Cycle detected through blocks {blocks:?}")]
    CycleDetected { blocks: Vec<BlockId> },

    #[error("Loop {loop_block} has an invalid body: block {block} is entered from {from} outside the body")]
    InvalidLoopBody {
        loop_block: BlockId,
        block: BlockId,
        from: BlockId,
    },

    #[error("Loop-back edge {from} -> {loop_block} does not start inside the loop body")]
    LoopBackOutsideBody { loop_block: BlockId, from: BlockId },

    #[error("Input block {block} has no binding name")]
    MissingBinding { block: BlockId },

    #[error("No value supplied for input block {block}")]
    MissingExternalValue { block: BlockId },

    #[error("Loop {block} exceeded its budget of {limit} iterations")]
    LoopBudgetExceeded { block: BlockId, limit: u32 },

    #[error(
        "Block {block}: variable '{variable}' is {}, expected an integer",
        .found.type_name()
    )]
    NotAnInteger {
        block: BlockId,
        variable: String,
        found: Value,
    },

    #[error("Block {block}: integer overflow updating '{variable}'")]
    IntegerOverflow { block: BlockId, variable: String },

    #[error("Interpreter is already running")]
    AlreadyRunning,
}

impl ExecutionError {
    /// Attribute an action failure to the block that applied it
    pub fn from_action(block: BlockId, err: ActionError) -> Self {
        match err {
            ActionError::NotAnInteger { variable, found } => ExecutionError::NotAnInteger {
                block,
                variable,
                found,
            },
            ActionError::IntegerOverflow { variable } => {
                ExecutionError::IntegerOverflow { block, variable }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from editing a session's graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A run is in progress; the graph cannot be edited")]
    RunInProgress,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for session edits
pub type SessionResult<T> = Result<T, SessionError>;
