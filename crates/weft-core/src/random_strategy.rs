//! Uniform-random scheduling strategy.
//!
//! The baseline exploration strategy: at every decision point, pick one of
//! the currently enabled operations uniformly at random. Fair — every
//! enabled operation has positive probability at every step — and carries no
//! state between iterations beyond the step counter.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use tracing::debug;

use crate::operation::{AsyncOperation, OperationId};

/// Uniform-random choice among enabled operations.
#[derive(Debug, Clone)]
pub struct RandomStrategy {
    seed: u64,
    rng: Pcg64Mcg,
    max_steps: u64,
    step_count: u64,
}

impl RandomStrategy {
    /// `max_steps == 0` means unlimited.
    pub fn new(max_steps: u64, seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg64Mcg::seed_from_u64(seed),
            max_steps,
            step_count: 0,
        }
    }

    /// Reset per-iteration state. Always reports that another iteration is
    /// meaningful.
    pub fn initialize_next_iteration(&mut self, iteration: u64) -> bool {
        debug!(iteration, "random strategy: next iteration");
        self.step_count = 0;
        true
    }

    /// Pick the next operation to resume, or `None` when nothing is enabled
    /// (deadlock).
    pub fn next_operation(
        &mut self,
        ops: &[AsyncOperation],
        _current: OperationId,
        _is_yielding: bool,
    ) -> Option<OperationId> {
        let enabled: Vec<OperationId> =
            ops.iter().filter(|op| op.is_enabled()).map(|op| op.id).collect();
        let chosen = *enabled.choose(&mut self.rng)?;
        self.step_count += 1;
        Some(chosen)
    }

    /// True with probability `1/max_value`.
    pub fn next_boolean_choice(&mut self, _current: OperationId, max_value: u64) -> bool {
        self.step_count += 1;
        self.rng.gen_range(0..max_value.max(1)) == 0
    }

    /// Uniform in `[0, max_value)`.
    pub fn next_integer_choice(&mut self, _current: OperationId, max_value: u64) -> u64 {
        self.step_count += 1;
        self.rng.gen_range(0..max_value.max(1))
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn is_max_steps_reached(&self) -> bool {
        self.max_steps != 0 && self.step_count >= self.max_steps
    }

    /// Every enabled operation keeps positive probability at every step.
    pub fn is_fair(&self) -> bool {
        true
    }

    pub fn description(&self) -> String {
        format!("random[seed '{}']", self.seed)
    }

    /// Restore construction-time state; a reset instance replays identically
    /// to a pristine one.
    pub fn reset(&mut self) {
        self.rng = Pcg64Mcg::seed_from_u64(self.seed);
        self.step_count = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
