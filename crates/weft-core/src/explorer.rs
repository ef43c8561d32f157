//! Iteration driver over a controlled program.
//!
//! Repeatedly re-executes a program model under a scheduling strategy,
//! one deterministic schedule per iteration, and reports how each
//! iteration ended. The driver owns the iteration lifecycle — strategy
//! re-initialization, deadlock detection, step-budget cutoff — while the
//! program supplies the candidate operations and applies the effects of
//! each scheduling decision.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::operation::{AsyncOperation, OperationId, OperationStatus};
use crate::strategy::Strategy;

// ---------------------------------------------------------------------------
// ControlledProgram — what the explorer drives
// ---------------------------------------------------------------------------

/// A deterministic program model the explorer can re-execute.
///
/// The model owns its operation table. `advance` applies the effects of
/// running the chosen operation up to its next decision point — spawning,
/// blocking, unblocking, or completing operations as the modeled program
/// would.
pub trait ControlledProgram {
    /// Restore the initial state for a fresh iteration.
    fn reset(&mut self);

    /// The complete candidate set at the current decision point.
    fn candidates(&mut self) -> &mut [AsyncOperation];

    /// The operation that executed since the previous decision point.
    fn current(&self) -> OperationId;

    /// Whether the current operation voluntarily relinquished execution.
    fn is_yielding(&self) -> bool;

    /// Run `op` until its next decision point.
    fn advance(&mut self, op: OperationId);
}

// ---------------------------------------------------------------------------
// IterationOutcome / IterationSummary
// ---------------------------------------------------------------------------

/// How one iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterationOutcome {
    /// Every operation ran to completion.
    Completed { steps: u64 },
    /// Live operations remained but none was enabled.
    Deadlocked { steps: u64 },
    /// The per-iteration step budget ran out.
    BudgetExhausted { steps: u64 },
}

impl IterationOutcome {
    pub fn steps(&self) -> u64 {
        match self {
            Self::Completed { steps }
            | Self::Deadlocked { steps }
            | Self::BudgetExhausted { steps } => *steps,
        }
    }
}

impl fmt::Display for IterationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { steps } => write!(f, "completed({steps} steps)"),
            Self::Deadlocked { steps } => write!(f, "deadlocked({steps} steps)"),
            Self::BudgetExhausted { steps } => write!(f, "budget_exhausted({steps} steps)"),
        }
    }
}

/// One explored iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: u64,
    pub outcome: IterationOutcome,
}

// ---------------------------------------------------------------------------
// ExplorationReport
// ---------------------------------------------------------------------------

/// Output artifact of an exploration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationReport {
    /// Strategy tag, e.g. `pct[seed '42']`.
    pub strategy: String,
    pub iterations: Vec<IterationSummary>,
}

impl ExplorationReport {
    pub fn completed_count(&self) -> usize {
        self.count(|o| matches!(o, IterationOutcome::Completed { .. }))
    }

    pub fn deadlock_count(&self) -> usize {
        self.count(|o| matches!(o, IterationOutcome::Deadlocked { .. }))
    }

    pub fn budget_exhausted_count(&self) -> usize {
        self.count(|o| matches!(o, IterationOutcome::BudgetExhausted { .. }))
    }

    /// Longest schedule across all iterations, in strategy steps.
    pub fn max_schedule_length(&self) -> u64 {
        self.iterations
            .iter()
            .map(|summary| summary.outcome.steps())
            .max()
            .unwrap_or(0)
    }

    pub fn all_completed(&self) -> bool {
        self.deadlock_count() == 0 && self.budget_exhausted_count() == 0
    }

    fn count(&self, predicate: impl Fn(&IterationOutcome) -> bool) -> usize {
        self.iterations
            .iter()
            .filter(|summary| predicate(&summary.outcome))
            .count()
    }
}

// ---------------------------------------------------------------------------
// ScheduleExplorer
// ---------------------------------------------------------------------------

/// Drives a controlled program through many deterministic iterations.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleExplorer {
    iterations: u64,
}

impl ScheduleExplorer {
    pub fn new(iterations: u64) -> Self {
        Self { iterations }
    }

    /// Explore the program under the given strategy, one schedule per
    /// iteration.
    pub fn run(
        &self,
        program: &mut dyn ControlledProgram,
        strategy: &mut Strategy,
    ) -> ExplorationReport {
        let mut iterations = Vec::with_capacity(self.iterations as usize);

        for iteration in 0..self.iterations {
            strategy.initialize_next_iteration(iteration);
            program.reset();
            let outcome = self.run_iteration(program, strategy);
            debug!(iteration, %outcome, "iteration finished");
            iterations.push(IterationSummary { iteration, outcome });
        }

        let report = ExplorationReport {
            strategy: strategy.description(),
            iterations,
        };
        info!(
            strategy = %report.strategy,
            completed = report.completed_count(),
            deadlocked = report.deadlock_count(),
            "exploration finished"
        );
        report
    }

    fn run_iteration(
        &self,
        program: &mut dyn ControlledProgram,
        strategy: &mut Strategy,
    ) -> IterationOutcome {
        loop {
            let all_done = program
                .candidates()
                .iter()
                .all(|op| op.status == OperationStatus::Completed);
            if all_done {
                return IterationOutcome::Completed {
                    steps: strategy.step_count(),
                };
            }

            if strategy.is_max_steps_reached() {
                return IterationOutcome::BudgetExhausted {
                    steps: strategy.step_count(),
                };
            }

            let current = program.current();
            let is_yielding = program.is_yielding();
            match strategy.next_operation(program.candidates(), current, is_yielding) {
                Some(op) => program.advance(op),
                None => {
                    return IterationOutcome::Deadlocked {
                        steps: strategy.step_count(),
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
