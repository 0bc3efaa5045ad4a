// Interpreter - Runs block graphs
//
// A run validates the graph into an ExecutionPlan, then walks the top-level
// scope in plan order. Conditions decide which outgoing edges are live; loops
// re-run their body scope while their predicate holds, suspending after each
// iteration. Cancellation is only observed at those suspension points.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};

use blockscript_types::{
    Action, Block, BlockGraph, BlockId, BlockKind, Connection, EdgeKind, Predicate, Value,
    VariableStore,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::config::InterpreterConfig;
use crate::error::ExecutionError;
use crate::plan::ExecutionPlan;
use crate::provider::ValueProvider;
use crate::trace::{BlockOutcome, RunResult, RunState, RunStatus, TraceEntry};

// ─────────────────────────────────────────────────────────────────────────────
// Run Context
// ─────────────────────────────────────────────────────────────────────────────

/// How a block left its outgoing edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Firing {
    /// Executed; flow edges are live
    Ran,
    /// Condition evaluated; flow edges plus the matching branch are live
    Branched(bool),
    /// Not reached; every outgoing edge is dead
    Skipped,
}

/// Mutable state of a single run
struct RunContext<'a> {
    run_id: Uuid,
    graph: &'a BlockGraph,
    plan: &'a ExecutionPlan,
    provider: &'a dyn ValueProvider,
    cancel: CancelSignal,
    /// The run's variable store
    variables: VariableStore,
    /// Latest firing per block (body blocks are overwritten each iteration)
    firings: HashMap<BlockId, Firing>,
    /// Literals already fetched from the provider
    literals: HashMap<BlockId, String>,
    trace: Vec<TraceEntry>,
}

impl RunContext<'_> {
    fn record(&mut self, block_id: BlockId, outcome: BlockOutcome) {
        self.trace.push(TraceEntry { block_id, outcome });
    }

    /// Whether a connection carries control in the current scope
    fn is_live(&self, conn: &Connection, scope: Option<BlockId>) -> bool {
        let firing = self.firings.get(&conn.from);
        match conn.kind {
            EdgeKind::Flow => matches!(firing, Some(Firing::Ran | Firing::Branched(_))),
            EdgeKind::Then => firing == Some(&Firing::Branched(true)),
            EdgeKind::Else => firing == Some(&Firing::Branched(false)),
            EdgeKind::Body => scope == Some(conn.from),
            EdgeKind::LoopBack => false,
        }
    }

    /// Record a failure against a block and abort the run
    fn fail(&mut self, block_id: BlockId, err: ExecutionError) -> Halt {
        warn!(
            run_id = %self.run_id,
            block_id = %block_id,
            error = %err,
            "Block failed"
        );
        self.record(
            block_id,
            BlockOutcome::Failed {
                reason: err.to_string(),
            },
        );
        Halt::Failed(err)
    }
}

/// Why a scope stopped early
enum Halt {
    /// Cancellation observed at a loop suspension point
    Cancelled,
    /// Block execution failed
    Failed(ExecutionError),
}

type ScopeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Halt>> + Send + 'a>>;

// ─────────────────────────────────────────────────────────────────────────────
// Interpreter
// ─────────────────────────────────────────────────────────────────────────────

/// Executes block graphs, one run at a time
pub struct Interpreter {
    config: InterpreterConfig,
    /// Current RunState as u8
    state: AtomicU8,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    /// Create an interpreter with the given settings
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(RunState::Idle as u8),
        }
    }

    /// Current state; the terminal state of the last run once it finishes
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run a graph against a seeded store.
    ///
    /// Never panics on bad programs: every failure is reported in the
    /// returned `RunResult` together with the trace so far.
    pub async fn run(
        &self,
        graph: &BlockGraph,
        initial: VariableStore,
        provider: &dyn ValueProvider,
        cancel: CancelSignal,
    ) -> RunResult {
        let run_id = Uuid::new_v4();
        let graph_version = graph.version();

        let claimed = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if RunState::from_u8(current).is_active() {
                    None
                } else {
                    Some(RunState::Validating as u8)
                }
            });
        if claimed.is_err() {
            warn!(run_id = %run_id, "Run rejected: interpreter is already running");
            return RunResult {
                run_id,
                graph_version,
                status: RunStatus::Failed,
                variables: initial,
                trace: Vec::new(),
                error: Some(ExecutionError::AlreadyRunning),
            };
        }
        let mut guard = StateGuard {
            state: &self.state,
            finished: false,
        };

        info!(
            run_id = %run_id,
            blocks = graph.len(),
            connections = graph.connections().len(),
            graph_version,
            "Starting block program run"
        );

        let plan = match ExecutionPlan::build(graph) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Graph validation failed");
                self.set_state(RunState::Failed);
                guard.finished = true;
                return RunResult {
                    run_id,
                    graph_version,
                    status: RunStatus::Failed,
                    variables: initial,
                    trace: Vec::new(),
                    error: Some(err),
                };
            }
        };

        self.set_state(RunState::Running);

        let mut ctx = RunContext {
            run_id,
            graph,
            plan: &plan,
            provider,
            cancel,
            variables: initial,
            firings: HashMap::new(),
            literals: HashMap::new(),
            trace: Vec::new(),
        };

        let (status, error) = match self.run_scope(&mut ctx, None).await {
            Ok(()) => (RunStatus::Completed, None),
            Err(Halt::Cancelled) => (RunStatus::Cancelled, None),
            Err(Halt::Failed(err)) => (RunStatus::Failed, Some(err)),
        };

        match status {
            RunStatus::Completed => info!(
                run_id = %run_id,
                steps = ctx.trace.len(),
                "Block program completed"
            ),
            RunStatus::Cancelled => warn!(
                run_id = %run_id,
                steps = ctx.trace.len(),
                "Block program cancelled"
            ),
            RunStatus::Failed => warn!(
                run_id = %run_id,
                steps = ctx.trace.len(),
                "Block program failed"
            ),
        }

        self.set_state(status.into());
        guard.finished = true;

        RunResult {
            run_id,
            graph_version,
            status,
            variables: ctx.variables,
            trace: ctx.trace,
            error,
        }
    }

    /// Run every block owned by a scope, in plan order
    fn run_scope<'a, 'b: 'a>(
        &'a self,
        ctx: &'a mut RunContext<'b>,
        scope: Option<BlockId>,
    ) -> ScopeFuture<'a> {
        Box::pin(async move {
            let graph = ctx.graph;
            let plan = ctx.plan;

            for &id in plan.scope(scope) {
                let Some(block) = graph.block(id) else {
                    continue;
                };

                let reached = (scope.is_none() && plan.is_root(id))
                    || graph
                        .incoming(id)
                        .any(|conn| ctx.is_live(conn, scope));

                if reached {
                    self.execute_block(ctx, block).await?;
                } else {
                    skip_block(ctx, block);
                }
            }

            Ok(())
        })
    }

    /// Execute one reached block
    async fn execute_block(&self, ctx: &mut RunContext<'_>, block: &Block) -> Result<(), Halt> {
        let id = block.id;
        debug!(run_id = %ctx.run_id, block_id = %id, kind = block.kind.name(), "Executing block");

        match &block.kind {
            BlockKind::Generic { action: None } => {
                ctx.record(id, BlockOutcome::Executed);
                ctx.firings.insert(id, Firing::Ran);
            }
            BlockKind::Generic {
                action: Some(action),
            } => apply_action(ctx, id, action)?,
            BlockKind::InputVariable => read_input(ctx, block)?,
            BlockKind::Condition { predicate } => {
                let taken = predicate.evaluate(&ctx.variables);
                debug!(run_id = %ctx.run_id, block_id = %id, %predicate, taken, "Condition evaluated");
                ctx.record(id, BlockOutcome::Branched { taken });
                ctx.firings.insert(id, Firing::Branched(taken));
            }
            BlockKind::Loop {
                predicate,
                max_iterations,
            } => {
                let cap = self.config.iteration_cap(*max_iterations);
                self.run_loop(ctx, id, predicate, cap).await?;
            }
        }

        Ok(())
    }

    /// Repeat a loop body while its predicate holds
    async fn run_loop(
        &self,
        ctx: &mut RunContext<'_>,
        id: BlockId,
        predicate: &Predicate,
        cap: u32,
    ) -> Result<(), Halt> {
        let mut iterations: u32 = 0;

        while predicate.evaluate(&ctx.variables) {
            // Checked before the body runs, so `iterations` stays below `cap`
            if iterations >= cap {
                return Err(ctx.fail(
                    id,
                    ExecutionError::LoopBudgetExceeded {
                        block: id,
                        limit: cap,
                    },
                ));
            }

            match self.run_scope(ctx, Some(id)).await {
                Ok(()) => {}
                Err(Halt::Cancelled) => {
                    ctx.record(id, BlockOutcome::Interrupted { iterations });
                    return Err(Halt::Cancelled);
                }
                Err(err) => return Err(err),
            }
            iterations += 1;
            debug!(run_id = %ctx.run_id, block_id = %id, iterations, "Loop iteration finished");

            self.suspend(&ctx.cancel).await;
            if ctx.cancel.is_cancelled() {
                warn!(run_id = %ctx.run_id, block_id = %id, iterations, "Loop cancelled");
                ctx.record(id, BlockOutcome::Interrupted { iterations });
                return Err(Halt::Cancelled);
            }
        }

        ctx.record(id, BlockOutcome::Looped { iterations });
        ctx.firings.insert(id, Firing::Ran);
        Ok(())
    }

    /// End-of-iteration suspension point
    async fn suspend(&self, cancel: &CancelSignal) {
        if self.config.loop_delay.is_zero() {
            tokio::task::yield_now().await;
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.loop_delay) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

/// Record a block (and, for loops, its whole body) as skipped
fn skip_block(ctx: &mut RunContext<'_>, block: &Block) {
    debug!(run_id = %ctx.run_id, block_id = %block.id, "Skipping block");
    ctx.record(block.id, BlockOutcome::Skipped);
    ctx.firings.insert(block.id, Firing::Skipped);

    if block.kind.is_loop() {
        let plan = ctx.plan;
        for &inner in plan.body(block.id) {
            ctx.record(inner, BlockOutcome::Skipped);
            ctx.firings.insert(inner, Firing::Skipped);
        }
    }
}

fn apply_action(ctx: &mut RunContext<'_>, id: BlockId, action: &Action) -> Result<(), Halt> {
    match action.apply(&mut ctx.variables) {
        Ok(value) => {
            ctx.record(
                id,
                BlockOutcome::Assigned {
                    variable: action.variable().to_string(),
                    value,
                },
            );
            ctx.firings.insert(id, Firing::Ran);
            Ok(())
        }
        Err(err) => Err(ctx.fail(id, ExecutionError::from_action(id, err))),
    }
}

/// Write the block's external literal into its binding
fn read_input(ctx: &mut RunContext<'_>, block: &Block) -> Result<(), Halt> {
    let id = block.id;
    let Some(name) = block.binding() else {
        return Err(ctx.fail(id, ExecutionError::MissingBinding { block: id }));
    };

    let literal = match ctx.literals.get(&id) {
        Some(literal) => literal.clone(),
        None => match ctx.provider.provide_value(id) {
            Some(literal) => {
                ctx.literals.insert(id, literal.clone());
                literal
            }
            None => {
                return Err(ctx.fail(id, ExecutionError::MissingExternalValue { block: id }));
            }
        },
    };

    let value = Value::from_literal(&literal);
    ctx.variables.set(name, value.clone());
    ctx.record(
        id,
        BlockOutcome::Assigned {
            variable: name.to_string(),
            value,
        },
    );
    ctx.firings.insert(id, Firing::Ran);
    Ok(())
}

/// Marks the interpreter cancelled if a run future is dropped mid-run
struct StateGuard<'a> {
    state: &'a AtomicU8,
    finished: bool,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state
                .store(RunState::Cancelled as u8, Ordering::Release);
        }
    }
}
