//! Pipeline configuration.
//!
//! All fields have defaults and serde derives, so a config can be loaded
//! from a partial JSON/TOML document.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::scheduler::BoundConfig;
use crate::solver::Strategy;

/// Configuration of a [`Scheduler`](crate::pipeline::Scheduler) run.
///
/// # Examples
///
/// ```
/// use u_jobshop::config::SchedulerConfig;
/// use u_jobshop::solver::{Strategy, MilpConfig};
///
/// let config = SchedulerConfig::default()
///     .with_time_limit_ms(2_000)
///     .with_strategy(Strategy::Milp(MilpConfig::default()));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Greedy bound estimation.
    pub bound: BoundConfig,
    /// Explicit makespan bound. Skips greedy estimation when set.
    pub max_makespan: Option<i64>,
    /// Solving strategy.
    pub strategy: Strategy,
    /// Solver time limit in milliseconds.
    pub time_limit_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            bound: BoundConfig::default(),
            max_makespan: None,
            strategy: Strategy::default(),
            time_limit_ms: 10_000,
        }
    }
}

impl SchedulerConfig {
    /// Sets the bound estimation parameters.
    pub fn with_bound(mut self, bound: BoundConfig) -> Self {
        self.bound = bound;
        self
    }

    /// Sets an explicit makespan bound.
    pub fn with_max_makespan(mut self, max_makespan: i64) -> Self {
        self.max_makespan = Some(max_makespan);
        self
    }

    /// Sets the strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the solver time limit.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Solver time limit as a [`Duration`].
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> Result<()> {
        self.bound.validate()?;
        self.strategy.validate()?;
        if self.time_limit_ms == 0 {
            return Err(ScheduleError::InvalidConfig(
                "time_limit_ms must be positive".into(),
            ));
        }
        if let Some(bound) = self.max_makespan {
            if bound < 0 {
                return Err(ScheduleError::InvalidConfig(format!(
                    "max_makespan must be non-negative, got {bound}"
                )));
            }
        }
        Ok(())
    }
}
