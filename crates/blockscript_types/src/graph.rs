// Block Graph - Blocks, connections and the structural invariants between them
//
// The graph is the editable program. The UI mutates it only through the
// methods below; execution reads it through `blocks()` / `connections()` and
// the adjacency queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::{ConnectionFault, GraphError};
use super::predicate::{Action, Predicate};

// ─────────────────────────────────────────────────────────────────────────────
// Block Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Stable block identifier, unique for the lifetime of its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockId(u64);

impl BlockId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(BlockId)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// What a block does when executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Placeholder block, optionally carrying an action
    Generic { action: Option<Action> },
    /// Writes an externally supplied literal into its binding
    InputVariable,
    /// Chooses between its `then` and `else` successors
    Condition { predicate: Predicate },
    /// Repeats its body while the predicate holds
    Loop {
        predicate: Predicate,
        max_iterations: Option<u32>,
    },
}

impl BlockKind {
    /// Generic block with no effect
    pub fn generic() -> Self {
        BlockKind::Generic { action: None }
    }

    /// Generic block applying an action
    pub fn action(action: Action) -> Self {
        BlockKind::Generic {
            action: Some(action),
        }
    }

    pub fn condition(predicate: Predicate) -> Self {
        BlockKind::Condition { predicate }
    }

    pub fn looping(predicate: Predicate, max_iterations: Option<u32>) -> Self {
        BlockKind::Loop {
            predicate,
            max_iterations,
        }
    }

    /// Human-readable kind name
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Generic { .. } => "Generic",
            BlockKind::InputVariable => "Input variable",
            BlockKind::Condition { .. } => "Condition",
            BlockKind::Loop { .. } => "Loop",
        }
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, BlockKind::Condition { .. })
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, BlockKind::Loop { .. })
    }
}

/// A block instance within a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    /// Variable written by an input block
    pub binding_name: Option<String>,
    /// Display label (UI only)
    pub label: Option<String>,
}

impl Block {
    /// Label shown to the user, defaulting to the kind name
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.kind.name())
    }

    /// Binding name if present and non-empty
    pub fn binding(&self) -> Option<&str> {
        self.binding_name.as_deref().filter(|name| !name.trim().is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connections
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a connection in control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeKind {
    /// Plain sequencing
    #[default]
    Flow,
    /// Taken when the source condition holds
    Then,
    /// Taken when the source condition does not hold
    Else,
    /// Enters the body of the source loop
    Body,
    /// Closes an iteration back into the target loop
    LoopBack,
}

impl EdgeKind {
    /// Whether the edge participates in execution ordering
    pub fn is_ordering(&self) -> bool {
        !matches!(self, EdgeKind::LoopBack)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::Flow => "flow",
            EdgeKind::Then => "then",
            EdgeKind::Else => "else",
            EdgeKind::Body => "body",
            EdgeKind::LoopBack => "loopback",
        };
        f.write_str(name)
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flow" => Ok(EdgeKind::Flow),
            "then" => Ok(EdgeKind::Then),
            "else" => Ok(EdgeKind::Else),
            "body" => Ok(EdgeKind::Body),
            "loopback" | "loop-back" | "back" => Ok(EdgeKind::LoopBack),
            other => Err(format!("unknown edge kind '{}'", other)),
        }
    }
}

/// A directed edge: execution may proceed from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: BlockId,
    pub to: BlockId,
    pub kind: EdgeKind,
}

impl Connection {
    /// Whether this connection joins the given pair
    pub fn joins(&self, from: BlockId, to: BlockId) -> bool {
        self.from == from && self.to == to
    }

    /// Whether this connection touches the given block
    pub fn touches(&self, id: BlockId) -> bool {
        self.from == id || self.to == id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Block Graph
// ─────────────────────────────────────────────────────────────────────────────

/// The editable block program
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    /// Blocks keyed by id; ids are allocated in increasing order, so this is
    /// also creation order
    blocks: BTreeMap<BlockId, Block>,
    /// Connections in insertion order
    connections: Vec<Connection>,
    next_id: u64,
    version: u64,
}

impl BlockGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block and return its fresh id
    pub fn add_block(&mut self, kind: BlockKind, binding_name: Option<&str>) -> BlockId {
        self.next_id += 1;
        let id = BlockId(self.next_id);
        self.blocks.insert(
            id,
            Block {
                id,
                kind,
                binding_name: binding_name.map(str::to_string),
                label: None,
            },
        );
        self.touch();
        id
    }

    /// Remove a block and every connection touching it. Unknown ids are ignored.
    pub fn remove_block(&mut self, id: BlockId) -> Option<Block> {
        let removed = self.blocks.remove(&id)?;
        self.connections.retain(|c| !c.touches(id));
        self.touch();
        Some(removed)
    }

    /// Add a `Flow` connection
    pub fn add_connection(&mut self, from: BlockId, to: BlockId) -> Result<(), GraphError> {
        self.add_connection_with(from, to, EdgeKind::Flow)
    }

    /// Add a typed connection.
    ///
    /// Re-adding an existing `(from, to)` pair is a no-op that keeps the
    /// original kind.
    pub fn add_connection_with(
        &mut self,
        from: BlockId,
        to: BlockId,
        kind: EdgeKind,
    ) -> Result<(), GraphError> {
        self.check_connection(from, to, kind)
            .map_err(|fault| GraphError::InvalidConnection { from, to, fault })?;

        if self.connections.iter().any(|c| c.joins(from, to)) {
            return Ok(());
        }

        self.connections.push(Connection { from, to, kind });
        self.touch();
        Ok(())
    }

    fn check_connection(
        &self,
        from: BlockId,
        to: BlockId,
        kind: EdgeKind,
    ) -> Result<(), ConnectionFault> {
        if from == to {
            return Err(ConnectionFault::SelfLoop);
        }
        let source = self
            .blocks
            .get(&from)
            .ok_or(ConnectionFault::UnknownEndpoint(from))?;
        let target = self
            .blocks
            .get(&to)
            .ok_or(ConnectionFault::UnknownEndpoint(to))?;

        match kind {
            EdgeKind::Flow => Ok(()),
            EdgeKind::Then | EdgeKind::Else if !source.kind.is_condition() => {
                Err(ConnectionFault::SourceKind {
                    kind,
                    expected: "condition",
                })
            }
            EdgeKind::Body if !source.kind.is_loop() => Err(ConnectionFault::SourceKind {
                kind,
                expected: "loop",
            }),
            EdgeKind::LoopBack if !target.kind.is_loop() => Err(ConnectionFault::TargetKind {
                kind,
                expected: "loop",
            }),
            _ => Ok(()),
        }
    }

    /// Remove the connection between a pair. No-op if absent.
    pub fn remove_connection(&mut self, from: BlockId, to: BlockId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| !c.joins(from, to));
        let removed = self.connections.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Change the variable an input block writes
    pub fn set_binding_name(
        &mut self,
        id: BlockId,
        binding_name: Option<&str>,
    ) -> Result<(), GraphError> {
        let block = self.blocks.get_mut(&id).ok_or(GraphError::UnknownBlock(id))?;
        block.binding_name = binding_name.map(str::to_string);
        self.touch();
        Ok(())
    }

    /// Change a block's display label
    pub fn set_label(&mut self, id: BlockId, label: Option<&str>) -> Result<(), GraphError> {
        let block = self.blocks.get_mut(&id).ok_or(GraphError::UnknownBlock(id))?;
        block.label = label.map(str::to_string);
        self.touch();
        Ok(())
    }

    /// All blocks in creation order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// All connections in insertion order
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Get a block by id
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    /// Connections leaving a block, in insertion order
    pub fn outgoing(&self, id: BlockId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.from == id)
    }

    /// Connections entering a block, in insertion order
    pub fn incoming(&self, id: BlockId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.to == id)
    }

    /// Blocks with no incoming ordering connection, in creation order
    pub fn roots(&self) -> Vec<BlockId> {
        self.blocks
            .keys()
            .copied()
            .filter(|id| !self.incoming(*id).any(|c| c.kind.is_ordering()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Counter bumped by every effective mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(graph: &mut BlockGraph, name: &str) -> BlockId {
        graph.add_block(BlockKind::InputVariable, Some(name))
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut graph = BlockGraph::new();
        let a = graph.add_block(BlockKind::generic(), None);
        graph.remove_block(a);
        let b = graph.add_block(BlockKind::generic(), None);
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_remove_block_cascades() {
        let mut graph = BlockGraph::new();
        let a = input(&mut graph, "x");
        let b = graph.add_block(BlockKind::generic(), None);
        let c = graph.add_block(BlockKind::generic(), None);
        graph.add_connection(a, b).unwrap();
        graph.add_connection(b, c).unwrap();
        graph.add_connection(a, c).unwrap();

        graph.remove_block(b);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.connections().len(), 1);
        assert!(graph
            .connections()
            .iter()
            .all(|conn| graph.contains(conn.from) && graph.contains(conn.to)));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut graph = BlockGraph::new();
        let a = graph.add_block(BlockKind::generic(), None);
        let version = graph.version();
        graph.remove_block(a);
        assert!(graph.remove_block(a).is_none());
        assert!(!graph.remove_connection(a, a));
        assert_eq!(graph.version(), version + 1);
    }

    #[test]
    fn test_duplicate_connection_is_idempotent() {
        let mut graph = BlockGraph::new();
        let a = graph.add_block(BlockKind::generic(), None);
        let b = graph.add_block(BlockKind::generic(), None);

        graph.add_connection(a, b).unwrap();
        let snapshot = graph.connections().to_vec();
        let version = graph.version();

        graph.add_connection(a, b).unwrap();
        assert_eq!(graph.connections(), snapshot.as_slice());
        assert_eq!(graph.version(), version);
    }

    #[test]
    fn test_invalid_connections_leave_graph_unchanged() {
        let mut graph = BlockGraph::new();
        let a = graph.add_block(BlockKind::generic(), None);
        let b = graph.add_block(BlockKind::generic(), None);
        graph.remove_block(b);
        let version = graph.version();

        let err = graph.add_connection(a, a).unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidConnection {
                fault: ConnectionFault::SelfLoop,
                ..
            }
        ));

        let err = graph.add_connection(a, b).unwrap_err();
        assert_eq!(
            err,
            GraphError::InvalidConnection {
                from: a,
                to: b,
                fault: ConnectionFault::UnknownEndpoint(b),
            }
        );

        assert!(graph.connections().is_empty());
        assert_eq!(graph.version(), version);
    }

    #[test]
    fn test_edge_kind_endpoints() {
        let mut graph = BlockGraph::new();
        let plain = graph.add_block(BlockKind::generic(), None);
        let other = graph.add_block(BlockKind::generic(), None);
        let cond = graph.add_block(
            BlockKind::condition(Predicate::greater_than("x", 0)),
            None,
        );
        let looped = graph.add_block(
            BlockKind::looping(Predicate::greater_than("n", 0), None),
            None,
        );

        assert!(graph.add_connection_with(plain, other, EdgeKind::Then).is_err());
        assert!(graph.add_connection_with(plain, other, EdgeKind::Body).is_err());
        assert!(graph.add_connection_with(plain, other, EdgeKind::LoopBack).is_err());

        assert!(graph.add_connection_with(cond, plain, EdgeKind::Then).is_ok());
        assert!(graph.add_connection_with(cond, other, EdgeKind::Else).is_ok());
        assert!(graph.add_connection_with(looped, plain, EdgeKind::Body).is_ok());
        assert!(graph.add_connection_with(other, looped, EdgeKind::LoopBack).is_ok());
    }

    #[test]
    fn test_roots_ignore_loop_back_edges() {
        let mut graph = BlockGraph::new();
        let looped = graph.add_block(
            BlockKind::looping(Predicate::greater_than("n", 0), None),
            None,
        );
        let body = graph.add_block(BlockKind::generic(), None);
        let tail = graph.add_block(BlockKind::generic(), None);
        graph.add_connection_with(looped, body, EdgeKind::Body).unwrap();
        graph.add_connection_with(body, looped, EdgeKind::LoopBack).unwrap();
        graph.add_connection(looped, tail).unwrap();

        assert_eq!(graph.roots(), vec![looped]);
        assert_eq!(graph.outgoing(looped).count(), 2);
        assert_eq!(graph.incoming(looped).count(), 1);
    }

    #[test]
    fn test_binding_and_label() {
        let mut graph = BlockGraph::new();
        let id = graph.add_block(BlockKind::InputVariable, Some("  "));
        assert_eq!(graph.block(id).unwrap().binding(), None);
        assert_eq!(graph.block(id).unwrap().display_label(), "Input variable");

        graph.set_binding_name(id, Some("x")).unwrap();
        graph.set_label(id, Some("Enter x")).unwrap();
        let block = graph.block(id).unwrap();
        assert_eq!(block.binding(), Some("x"));
        assert_eq!(block.display_label(), "Enter x");

        graph.remove_block(id);
        assert_eq!(
            graph.set_label(id, None),
            Err(GraphError::UnknownBlock(id))
        );
    }

    #[test]
    fn test_parse_ids_and_kinds() {
        assert_eq!("#3".parse::<BlockId>().unwrap().get(), 3);
        assert_eq!("loopback".parse::<EdgeKind>().unwrap(), EdgeKind::LoopBack);
        assert!("sideways".parse::<EdgeKind>().is_err());
    }
}
