//! Blockscript Runtime - Execution engine for block programs
//!
//! This crate runs a `BlockGraph` from `blockscript_types`:
//!
//! - `ExecutionPlan` validates a graph (cycles, loop bodies) and orders it
//! - `Interpreter` walks the plan against a `VariableStore`, suspending at
//!   the end of every loop iteration
//! - `ScriptSession` owns an editable graph and locks it while a run reads it
//!
//! Inputs come from a `ValueProvider`; runs stop early through a
//! `CancelSignal`. Every run reports a `RunResult` with its trace.

mod cancel;
mod config;
mod error;
mod interpreter;
mod plan;
mod provider;
mod session;
mod trace;

pub use cancel::*;
pub use config::*;
pub use error::*;
pub use interpreter::*;
pub use plan::*;
pub use provider::*;
pub use session::*;
pub use trace::*;
