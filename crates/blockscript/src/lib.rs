//! Blockscript host
//!
//! Wires a `ScriptSession` to a line-oriented console: commands read from
//! stdin edit the block graph, supply input literals and trigger runs.

pub mod config;
pub mod console;
