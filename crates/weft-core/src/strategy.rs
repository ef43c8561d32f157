//! The closed set of exploration strategies behind one dispatch surface.
//!
//! The controlled runtime talks to a [`Strategy`] value; which concrete
//! strategy is inside is fixed at construction. A sum type rather than a
//! trait object keeps the set closed and lets the compiler check every
//! dispatch arm when a strategy is added.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::operation::{AsyncOperation, OperationId};
use crate::pct_cp_strategy::PctCpStrategy;
use crate::pct_strategy::PctStrategy;
use crate::random_strategy::RandomStrategy;

// ---------------------------------------------------------------------------
// StrategyKind
// ---------------------------------------------------------------------------

/// Which exploration strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    Random,
    Pct,
    PctCp,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Pct => f.write_str("pct"),
            Self::PctCp => f.write_str("pctcp"),
        }
    }
}

/// Error for an unrecognized strategy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy '{0}' (expected one of: random, pct, pctcp)")]
pub struct UnknownStrategy(String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "pct" => Ok(Self::Pct),
            "pctcp" => Ok(Self::PctCp),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A scheduling strategy instance. Deterministic given its seed and an
/// identical sequence of calls.
#[derive(Debug)]
pub enum Strategy {
    Random(RandomStrategy),
    Pct(PctStrategy),
    PctCp(PctCpStrategy),
}

impl Strategy {
    /// Construct a strategy of the given kind. `priority_switch_bound` is
    /// ignored by the random strategy.
    pub fn new(kind: StrategyKind, max_steps: u64, priority_switch_bound: u64, seed: u64) -> Self {
        match kind {
            StrategyKind::Random => Self::Random(RandomStrategy::new(max_steps, seed)),
            StrategyKind::Pct => {
                Self::Pct(PctStrategy::new(max_steps, priority_switch_bound, seed))
            }
            StrategyKind::PctCp => {
                Self::PctCp(PctCpStrategy::new(max_steps, priority_switch_bound, seed))
            }
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Random(_) => StrategyKind::Random,
            Self::Pct(_) => StrategyKind::Pct,
            Self::PctCp(_) => StrategyKind::PctCp,
        }
    }

    /// Reset per-iteration state. Returns whether another iteration is
    /// meaningful; every strategy here explores an unbounded schedule space,
    /// so the answer is always yes.
    pub fn initialize_next_iteration(&mut self, iteration: u64) -> bool {
        match self {
            Self::Random(s) => s.initialize_next_iteration(iteration),
            Self::Pct(s) => s.initialize_next_iteration(iteration),
            Self::PctCp(s) => s.initialize_next_iteration(iteration),
        }
    }

    /// Select the next operation to resume; `None` signals deadlock (no
    /// enabled candidate).
    pub fn next_operation(
        &mut self,
        ops: &mut [AsyncOperation],
        current: OperationId,
        is_yielding: bool,
    ) -> Option<OperationId> {
        match self {
            Self::Random(s) => s.next_operation(ops, current, is_yielding),
            Self::Pct(s) => s.next_operation(ops, current, is_yielding),
            Self::PctCp(s) => s.next_operation(ops, current, is_yielding),
        }
    }

    /// True with probability `1/max_value`.
    pub fn next_boolean_choice(&mut self, current: OperationId, max_value: u64) -> bool {
        match self {
            Self::Random(s) => s.next_boolean_choice(current, max_value),
            Self::Pct(s) => s.next_boolean_choice(current, max_value),
            Self::PctCp(s) => s.next_boolean_choice(current, max_value),
        }
    }

    /// Uniform in `[0, max_value)`.
    pub fn next_integer_choice(&mut self, current: OperationId, max_value: u64) -> u64 {
        match self {
            Self::Random(s) => s.next_integer_choice(current, max_value),
            Self::Pct(s) => s.next_integer_choice(current, max_value),
            Self::PctCp(s) => s.next_integer_choice(current, max_value),
        }
    }

    pub fn step_count(&self) -> u64 {
        match self {
            Self::Random(s) => s.step_count(),
            Self::Pct(s) => s.step_count(),
            Self::PctCp(s) => s.step_count(),
        }
    }

    pub fn is_max_steps_reached(&self) -> bool {
        match self {
            Self::Random(s) => s.is_max_steps_reached(),
            Self::Pct(s) => s.is_max_steps_reached(),
            Self::PctCp(s) => s.is_max_steps_reached(),
        }
    }

    /// Whether every enabled operation keeps positive scheduling
    /// probability at every step.
    pub fn is_fair(&self) -> bool {
        match self {
            Self::Random(s) => s.is_fair(),
            Self::Pct(s) => s.is_fair(),
            Self::PctCp(s) => s.is_fair(),
        }
    }

    /// Stable human-readable tag, e.g. `pct[seed '42']`.
    pub fn description(&self) -> String {
        match self {
            Self::Random(s) => s.description(),
            Self::Pct(s) => s.description(),
            Self::PctCp(s) => s.description(),
        }
    }

    /// Restore construction-time state; a reset instance replays
    /// identically to a pristine one.
    pub fn reset(&mut self) {
        match self {
            Self::Random(s) => s.reset(),
            Self::Pct(s) => s.reset(),
            Self::PctCp(s) => s.reset(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
