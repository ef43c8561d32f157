//! PCT with change points anchored at synchronization events.
//!
//! Classic PCT spreads its priority-change points uniformly over step
//! indices, most of which fall on uninteresting local steps. This variant
//! records, during each iteration, the step indices at which a
//! synchronization-classified operation (send, receive, join, yield,
//! create) was scheduled, and samples the next iteration's change points
//! from those indices instead. Priority reversals then land on logical
//! communication boundaries, where reorderings actually matter for
//! message-passing programs.
//!
//! Group formation, deprioritization, and selection are shared with
//! [`PctStrategy`].

use crate::operation::{AsyncOperation, OperationId};
use crate::operation_group::GroupRegistry;
use crate::pct_strategy::{ChangePointMode, PctStrategy};

/// PCT variant sampling priority-change points from synchronization steps.
#[derive(Debug)]
pub struct PctCpStrategy {
    inner: PctStrategy,
}

impl PctCpStrategy {
    /// `max_steps == 0` means unlimited; `priority_switch_bound` is the `d`
    /// parameter (`0` or `1` mean priorities never change once assigned).
    pub fn new(max_steps: u64, priority_switch_bound: u64, seed: u64) -> Self {
        Self {
            inner: PctStrategy::with_mode(
                max_steps,
                priority_switch_bound,
                seed,
                ChangePointMode::SyncEvent,
            ),
        }
    }

    /// Reset per-iteration state and install change points sampled from the
    /// previous iteration's synchronization steps.
    pub fn initialize_next_iteration(&mut self, iteration: u64) -> bool {
        self.inner.initialize_next_iteration(iteration)
    }

    /// Pick the next operation to resume, or `None` when nothing is enabled
    /// (deadlock).
    pub fn next_operation(
        &mut self,
        ops: &mut [AsyncOperation],
        current: OperationId,
        is_yielding: bool,
    ) -> Option<OperationId> {
        self.inner.next_operation(ops, current, is_yielding)
    }

    /// True with probability `1/max_value`.
    pub fn next_boolean_choice(&mut self, current: OperationId, max_value: u64) -> bool {
        self.inner.next_boolean_choice(current, max_value)
    }

    /// Uniform in `[0, max_value)`.
    pub fn next_integer_choice(&mut self, current: OperationId, max_value: u64) -> u64 {
        self.inner.next_integer_choice(current, max_value)
    }

    pub fn step_count(&self) -> u64 {
        self.inner.step_count()
    }

    pub fn is_max_steps_reached(&self) -> bool {
        self.inner.is_max_steps_reached()
    }

    pub fn is_fair(&self) -> bool {
        false
    }

    pub fn description(&self) -> String {
        format!("pctcp[seed '{}']", self.inner.seed())
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Group bookkeeping, exposed for invariant checks in tests.
    pub fn groups(&self) -> &GroupRegistry {
        self.inner.groups()
    }

    /// Longest schedule observed across iterations so far.
    pub fn schedule_length(&self) -> u64 {
        self.inner.schedule_length()
    }

    /// Number of priority-change points installed for this iteration.
    pub fn change_point_count(&self) -> usize {
        self.inner.change_point_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
