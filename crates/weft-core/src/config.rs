//! Exploration configuration.
//!
//! Bundles the knobs a test harness sets once per exploration: which
//! strategy, the RNG seed, the per-iteration step budget, the PCT priority
//! switch bound, and how many iterations to run.

use serde::{Deserialize, Serialize};

use crate::strategy::{Strategy, StrategyKind};

/// Configuration errors surfaced before exploration starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown strategy '{name}' (expected one of: random, pct, pctcp)")]
    UnknownStrategy { name: String },
    #[error("iteration count must be at least 1")]
    ZeroIterations,
}

/// Knobs for one exploration run.
///
/// Defaults: random strategy, one iteration, unlimited steps, and a
/// priority switch bound of 1 — PCT with fixed priorities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationConfig {
    pub strategy: StrategyKind,
    /// Seed for the strategy RNG; required for reproducibility, so there is
    /// no entropy-derived default.
    pub seed: u64,
    /// Per-iteration step budget; 0 means unlimited.
    pub max_steps: u64,
    /// The PCT `d` parameter: at most `d-1` priority-change points per
    /// iteration. Ignored by the random strategy.
    pub priority_switch_bound: u64,
    /// Number of iterations to explore.
    pub iterations: u64,
}

impl ExplorationConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            strategy: StrategyKind::Random,
            seed,
            max_steps: 0,
            priority_switch_bound: 1,
            iterations: 1,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Parse the strategy from its command-line name.
    pub fn with_strategy_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.strategy = name.parse().map_err(|_| ConfigError::UnknownStrategy {
            name: name.to_string(),
        })?;
        Ok(self)
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_priority_switch_bound(mut self, bound: u64) -> Self {
        self.priority_switch_bound = bound;
        self
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Validate the configuration and construct the strategy it describes.
    pub fn build(&self) -> Result<Strategy, ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(Strategy::new(
            self.strategy,
            self.max_steps,
            self.priority_switch_bound,
            self.seed,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
