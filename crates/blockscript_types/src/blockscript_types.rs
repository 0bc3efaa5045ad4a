//! Blockscript Types - Core data structures for the block scripting system
//!
//! This crate contains the pure data structures of a visual block program:
//! runtime values, the per-run variable store, block predicates and actions,
//! and the block graph with its structural invariants.
//!
//! It has no knowledge of execution. The interpreter lives in
//! `blockscript_runtime`.

mod error;
mod graph;
mod predicate;
mod value;

pub use error::*;
pub use graph::*;
pub use predicate::*;
pub use value::*;
