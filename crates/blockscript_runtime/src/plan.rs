// Execution Plan - Validated ordering and loop scopes for one run
//
// Built during Validating. Orders blocks topologically, finds the body of
// every loop and assigns each block to the innermost loop that owns it. No
// block executes until the plan is built.

use std::collections::{BTreeSet, HashMap, HashSet};

use blockscript_types::{BlockGraph, BlockId, EdgeKind};
use tracing::debug;

use crate::error::ExecutionError;

/// Ordering and scoping derived from a graph
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Every block in execution order
    order: Vec<BlockId>,
    /// Blocks with no incoming ordering edge
    roots: HashSet<BlockId>,
    /// Loop block -> every block of its body, in execution order
    bodies: HashMap<BlockId, Vec<BlockId>>,
    /// Innermost enclosing loop per block; absent at top level
    owners: HashMap<BlockId, BlockId>,
    /// Scope owner (None = top level) -> directly owned blocks, in execution order
    scopes: HashMap<Option<BlockId>, Vec<BlockId>>,
}

impl ExecutionPlan {
    /// Validate a graph and derive its plan
    pub fn build(graph: &BlockGraph) -> Result<Self, ExecutionError> {
        let order = topological_order(graph)?;
        let position: HashMap<BlockId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut bodies = HashMap::new();
        for block in graph.blocks().filter(|b| b.kind.is_loop()) {
            let body = loop_body(graph, block.id)?;
            let mut ordered: Vec<BlockId> = body.into_iter().collect();
            ordered.sort_by_key(|id| position[id]);
            bodies.insert(block.id, ordered);
        }

        // Bodies of closed loops nest, so the smallest enclosing body is the
        // innermost one.
        let mut owners: HashMap<BlockId, BlockId> = HashMap::new();
        for (loop_block, body) in &bodies {
            for id in body {
                let replace = match owners.get(id) {
                    Some(current) => bodies[current].len() > body.len(),
                    None => true,
                };
                if replace {
                    owners.insert(*id, *loop_block);
                }
            }
        }

        let mut scopes: HashMap<Option<BlockId>, Vec<BlockId>> = HashMap::new();
        for id in &order {
            scopes.entry(owners.get(id).copied()).or_default().push(*id);
        }

        let roots = graph.roots().into_iter().collect();

        debug!(
            blocks = order.len(),
            loops = bodies.len(),
            "Execution plan built"
        );

        Ok(Self {
            order,
            roots,
            bodies,
            owners,
            scopes,
        })
    }

    /// Every block in execution order
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    /// Blocks directly owned by a scope, in execution order
    pub fn scope(&self, owner: Option<BlockId>) -> &[BlockId] {
        self.scopes.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every block inside a loop's body, nested bodies included
    pub fn body(&self, loop_block: BlockId) -> &[BlockId] {
        self.bodies
            .get(&loop_block)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Innermost loop enclosing a block
    pub fn owner(&self, id: BlockId) -> Option<BlockId> {
        self.owners.get(&id).copied()
    }

    pub fn is_root(&self, id: BlockId) -> bool {
        self.roots.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

/// Depth-first Kahn ordering over every edge except loop-backs.
///
/// Roots are taken in creation order and ready successors in connection
/// order, so the first root's subtree is walked before the second root.
fn topological_order(graph: &BlockGraph) -> Result<Vec<BlockId>, ExecutionError> {
    let mut in_degree: HashMap<BlockId, usize> = graph.blocks().map(|b| (b.id, 0)).collect();
    for conn in graph.connections().iter().filter(|c| c.kind.is_ordering()) {
        if let Some(degree) = in_degree.get_mut(&conn.to) {
            *degree += 1;
        }
    }

    let mut stack: Vec<BlockId> = graph.roots();
    stack.reverse();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(id) = stack.pop() {
        order.push(id);

        let mut ready = Vec::new();
        for conn in graph.outgoing(id).filter(|c| c.kind.is_ordering()) {
            if let Some(degree) = in_degree.get_mut(&conn.to) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(conn.to);
                }
            }
        }
        stack.extend(ready.into_iter().rev());
    }

    if order.len() < graph.len() {
        let placed: HashSet<BlockId> = order.iter().copied().collect();
        let blocks = graph
            .blocks()
            .map(|b| b.id)
            .filter(|id| !placed.contains(id))
            .collect();
        return Err(ExecutionError::CycleDetected { blocks });
    }

    Ok(order)
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop Bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Collect and validate the body of a loop block.
///
/// Members are checked in creation order so a body with several faults
/// always reports the same one.
fn loop_body(graph: &BlockGraph, loop_block: BlockId) -> Result<BTreeSet<BlockId>, ExecutionError> {
    let mut body = BTreeSet::new();
    let mut pending: Vec<BlockId> = graph
        .outgoing(loop_block)
        .filter(|c| c.kind == EdgeKind::Body)
        .map(|c| c.to)
        .collect();

    while let Some(id) = pending.pop() {
        if !body.insert(id) {
            continue;
        }
        pending.extend(
            graph
                .outgoing(id)
                .filter(|c| c.kind.is_ordering())
                .map(|c| c.to),
        );
    }

    for id in &body {
        for conn in graph.incoming(*id).filter(|c| c.kind.is_ordering()) {
            let own_entry = conn.from == loop_block && conn.kind == EdgeKind::Body;
            if !own_entry && !body.contains(&conn.from) {
                return Err(ExecutionError::InvalidLoopBody {
                    loop_block,
                    block: *id,
                    from: conn.from,
                });
            }
        }
    }

    for conn in graph.incoming(loop_block) {
        if conn.kind == EdgeKind::LoopBack && !body.contains(&conn.from) {
            return Err(ExecutionError::LoopBackOutsideBody {
                loop_block,
                from: conn.from,
            });
        }
    }

    Ok(body)
}
