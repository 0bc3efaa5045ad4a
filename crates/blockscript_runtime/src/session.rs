// Script Session - Owns the editable graph and the interpreter that runs it
//
// Edits take the write lock without waiting and fail with `RunInProgress`
// while a run holds the read lock, so a run always sees one graph version.

use std::sync::Arc;

use blockscript_types::{BlockGraph, BlockId, BlockKind, EdgeKind, VariableStore};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::config::InterpreterConfig;
use crate::error::{SessionError, SessionResult};
use crate::interpreter::Interpreter;
use crate::provider::ValueProvider;
use crate::trace::{RunResult, RunState};

/// A block program being edited and run
pub struct ScriptSession {
    graph: Arc<RwLock<BlockGraph>>,
    interpreter: Interpreter,
}

impl ScriptSession {
    /// Create a session with an empty graph
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_graph(BlockGraph::new(), config)
    }

    /// Create a session around an existing graph
    pub fn with_graph(graph: BlockGraph, config: InterpreterConfig) -> Self {
        Self {
            graph: Arc::new(RwLock::new(graph)),
            interpreter: Interpreter::new(config),
        }
    }

    /// Apply an edit unless a run is in progress
    pub fn edit<R>(&self, f: impl FnOnce(&mut BlockGraph) -> R) -> SessionResult<R> {
        let mut graph = self
            .graph
            .try_write()
            .map_err(|_| SessionError::RunInProgress)?;
        Ok(f(&mut graph))
    }

    pub fn add_block(&self, kind: BlockKind, binding_name: Option<&str>) -> SessionResult<BlockId> {
        let id = self.edit(|graph| graph.add_block(kind, binding_name))?;
        debug!(block_id = %id, "Block added");
        Ok(id)
    }

    pub fn remove_block(&self, id: BlockId) -> SessionResult<bool> {
        self.edit(|graph| graph.remove_block(id).is_some())
    }

    pub fn add_connection(&self, from: BlockId, to: BlockId, kind: EdgeKind) -> SessionResult<()> {
        self.edit(|graph| graph.add_connection_with(from, to, kind))??;
        debug!(from = %from, to = %to, kind = %kind, "Connection added");
        Ok(())
    }

    pub fn remove_connection(&self, from: BlockId, to: BlockId) -> SessionResult<bool> {
        self.edit(|graph| graph.remove_connection(from, to))
    }

    pub fn set_binding_name(&self, id: BlockId, name: Option<&str>) -> SessionResult<()> {
        self.edit(|graph| graph.set_binding_name(id, name))??;
        Ok(())
    }

    pub fn set_label(&self, id: BlockId, label: Option<&str>) -> SessionResult<()> {
        self.edit(|graph| graph.set_label(id, label))??;
        Ok(())
    }

    /// Copy of the current graph
    pub async fn snapshot(&self) -> BlockGraph {
        self.graph.read().await.clone()
    }

    /// Run the current graph, holding the read lock for the whole run
    pub async fn run(
        &self,
        initial: VariableStore,
        provider: &dyn ValueProvider,
        cancel: CancelSignal,
    ) -> RunResult {
        let graph = self.graph.read().await;
        self.interpreter.run(&graph, initial, provider, cancel).await
    }

    pub fn state(&self) -> RunState {
        self.interpreter.state()
    }
}

impl Default for ScriptSession {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}
