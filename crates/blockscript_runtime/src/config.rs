// Interpreter Config - Pacing and budget settings for runs

use std::time::Duration;

/// Default pause at the end of each loop iteration
pub const DEFAULT_LOOP_DELAY: Duration = Duration::from_millis(10);

/// Default iteration cap for loops without their own
pub const DEFAULT_LOOP_BUDGET: u32 = 10_000;

/// Settings shared by every run of an interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Suspension after each loop iteration. Zero yields to the scheduler
    /// without sleeping.
    pub loop_delay: Duration,
    /// Cap for loops that do not set `max_iterations`. `None` is unbounded.
    pub default_loop_budget: Option<u32>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            loop_delay: DEFAULT_LOOP_DELAY,
            default_loop_budget: Some(DEFAULT_LOOP_BUDGET),
        }
    }
}

impl InterpreterConfig {
    pub fn with_loop_delay(mut self, delay: Duration) -> Self {
        self.loop_delay = delay;
        self
    }

    pub fn with_loop_budget(mut self, budget: Option<u32>) -> Self {
        self.default_loop_budget = budget;
        self
    }

    /// Effective cap for a loop, preferring the block's own
    pub fn loop_budget(&self, block_cap: Option<u32>) -> Option<u32> {
        block_cap.or(self.default_loop_budget)
    }

    /// Hard iteration limit for a loop. Unbounded loops stop at `u32::MAX`
    /// so the iteration counter never overflows.
    pub fn iteration_cap(&self, block_cap: Option<u32>) -> u32 {
        self.loop_budget(block_cap).unwrap_or(u32::MAX)
    }
}
