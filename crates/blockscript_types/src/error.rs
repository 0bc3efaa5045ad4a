//! Error types for graph edits and block actions.

use super::graph::{BlockId, EdgeKind};
use super::value::Value;

/// Why a connection was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionFault {
    #[error("a block cannot connect to itself")]
    SelfLoop,

    #[error("block {0} does not exist")]
    UnknownEndpoint(BlockId),

    #[error("{kind} edges must start at a {expected} block")]
    SourceKind { kind: EdgeKind, expected: &'static str },

    #[error("{kind} edges must end at a {expected} block")]
    TargetKind { kind: EdgeKind, expected: &'static str },
}

/// Errors raised synchronously by graph mutations. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Invalid connection {from} -> {to}: {fault}")]
    InvalidConnection {
        from: BlockId,
        to: BlockId,
        fault: ConnectionFault,
    },

    #[error("Block not found: {0}")]
    UnknownBlock(BlockId),
}

/// Errors raised while applying a generic block's action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Variable '{variable}' is {}, expected an integer", .found.type_name())]
    NotAnInteger { variable: String, found: Value },

    #[error("Integer overflow updating '{variable}'")]
    IntegerOverflow { variable: String },
}
