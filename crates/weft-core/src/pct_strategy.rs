//! Probabilistic concurrency testing (PCT) over task-operation groups.
//!
//! PCT keeps a totally ordered priority list of operation groups and always
//! runs an enabled member of the highest-priority enabled group. At up to
//! `d-1` step indices per iteration — drawn uniformly without replacement
//! from the longest schedule observed so far — the currently winning group
//! is demoted to the tail. With `n` tasks and schedule length `k`, a bug of
//! depth `d` is found with probability at least `1/(n * k^(d-1))`; grouping
//! continuations under their owning task is what makes `n` count tasks
//! rather than continuations.
//!
//! Voluntary yields also demote the yielding operation's group, so a task
//! that spins on `yield` cannot monopolize the schedule.

use std::collections::BTreeSet;
use std::mem;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use tracing::{debug, trace};

use crate::operation::{AsyncOperation, OperationId};
use crate::operation_group::GroupRegistry;

// ---------------------------------------------------------------------------
// ChangePointMode — where priority-change points come from
// ---------------------------------------------------------------------------

/// Source of the per-iteration priority-change points. Step-index mode is
/// classic PCT; sync-event mode (used by the PCT-CP wrapper) samples from
/// the step indices at which a synchronization-classified operation was
/// scheduled in the previous iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangePointMode {
    StepIndex,
    SyncEvent,
}

// ---------------------------------------------------------------------------
// PctStrategy
// ---------------------------------------------------------------------------

/// Priority-list scheduler with operation groups and randomized
/// priority-change points.
#[derive(Debug)]
pub struct PctStrategy {
    seed: u64,
    rng: Pcg64Mcg,
    max_steps: u64,
    /// The `d` parameter: at most `d-1` priority-change points per iteration.
    priority_switch_bound: u64,
    mode: ChangePointMode,
    registry: GroupRegistry,
    change_points: BTreeSet<u64>,
    /// Step indices of synchronization events in the current iteration;
    /// consumed at the next initialization in sync-event mode.
    sync_steps: Vec<u64>,
    /// Longest schedule observed so far, in strategy steps.
    schedule_length: u64,
    step_count: u64,
}

impl PctStrategy {
    /// `max_steps == 0` means unlimited; `priority_switch_bound` is the `d`
    /// parameter (`0` or `1` mean priorities never change once assigned).
    pub fn new(max_steps: u64, priority_switch_bound: u64, seed: u64) -> Self {
        Self::with_mode(max_steps, priority_switch_bound, seed, ChangePointMode::StepIndex)
    }

    pub(crate) fn with_mode(
        max_steps: u64,
        priority_switch_bound: u64,
        seed: u64,
        mode: ChangePointMode,
    ) -> Self {
        Self {
            seed,
            rng: Pcg64Mcg::seed_from_u64(seed),
            max_steps,
            priority_switch_bound,
            mode,
            registry: GroupRegistry::new(),
            change_points: BTreeSet::new(),
            sync_steps: Vec::new(),
            schedule_length: 0,
            step_count: 0,
        }
    }

    /// Reset per-iteration state, carrying the observed schedule length
    /// forward and drawing the next change-point set. Always reports that
    /// another iteration is meaningful.
    pub fn initialize_next_iteration(&mut self, iteration: u64) -> bool {
        self.schedule_length = self.schedule_length.max(self.step_count);
        self.step_count = 0;
        self.registry.clear();
        self.change_points.clear();
        let recorded = mem::take(&mut self.sync_steps);

        if iteration > 0 && self.priority_switch_bound > 1 {
            let budget = (self.priority_switch_bound - 1) as usize;
            let mut pool: Vec<u64> = match self.mode {
                ChangePointMode::StepIndex => (0..self.schedule_length).collect(),
                ChangePointMode::SyncEvent => recorded,
            };
            pool.shuffle(&mut self.rng);
            pool.truncate(budget.min(pool.len()));
            self.change_points = pool.into_iter().collect();
        }

        debug!(
            iteration,
            schedule_length = self.schedule_length,
            change_points = self.change_points.len(),
            "pct strategy: next iteration"
        );
        true
    }

    /// Pick the next operation to resume, or `None` when nothing is enabled
    /// (deadlock).
    pub fn next_operation(
        &mut self,
        ops: &mut [AsyncOperation],
        current: OperationId,
        is_yielding: bool,
    ) -> Option<OperationId> {
        let enabled: BTreeSet<OperationId> =
            ops.iter().filter(|op| op.is_enabled()).map(|op| op.id).collect();
        if enabled.is_empty() {
            debug!(step = self.step_count, "pct strategy: no enabled operation");
            return None;
        }

        self.registry.observe(ops, &mut self.rng);

        // A single enabled operation leaves no scheduling decision to make;
        // spending a change point on it would waste the budget.
        if enabled.len() > 1 {
            if self.change_points.contains(&self.step_count) {
                if let Some(group) = self.registry.highest_enabled_group(&enabled) {
                    trace!(step = self.step_count, group, "change point reached");
                    self.registry.deprioritize(group);
                }
            } else if is_yielding {
                if let Some(group) = self.registry.group_of(current) {
                    trace!(step = self.step_count, group, "yield demotes current group");
                    self.registry.deprioritize(group);
                }
            }
        }

        let winner = self.registry.highest_enabled_group(&enabled).unwrap_or_else(|| {
            panic!("an enabled operation is not covered by any registered group")
        });
        let members = self.registry.enabled_members(winner, &enabled);
        let chosen = *members
            .choose(&mut self.rng)
            .expect("winning group has at least one enabled member");

        if self.mode == ChangePointMode::SyncEvent {
            let kind = ops
                .iter()
                .find(|op| op.id == chosen)
                .map(|op| op.kind)
                .expect("chosen operation is in the candidate set");
            if kind.is_synchronization() {
                self.sync_steps.push(self.step_count);
            }
        }

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

    /// PCT starves low-priority groups on purpose.
    pub fn is_fair(&self) -> bool {
        false
    }

    pub fn description(&self) -> String {
        format!("pct[seed '{}']", self.seed)
    }

    /// Restore construction-time state; a reset instance replays identically
    /// to a pristine one.
    pub fn reset(&mut self) {
        self.rng = Pcg64Mcg::seed_from_u64(self.seed);
        self.registry.clear();
        self.change_points.clear();
        self.sync_steps.clear();
        self.schedule_length = 0;
        self.step_count = 0;
    }

    /// Group bookkeeping, exposed for invariant checks in tests and for
    /// the exploration driver's reporting.
    pub fn groups(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Longest schedule observed across iterations so far.
    pub fn schedule_length(&self) -> u64 {
        self.schedule_length
    }

    /// Number of priority-change points installed for this iteration.
    pub fn change_point_count(&self) -> usize {
        self.change_points.len()
    }

    pub(crate) fn seed(&self) -> u64 {
        self.seed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
