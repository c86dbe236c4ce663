//! Solver backends behind one contract.
//!
//! Every strategy implements [`SolverBackend`]: it takes either a
//! [`Model`] or the raw [`Instance`] plus [`SolveLimits`] and returns a
//! [`RawResult`]. Strategies are selected through the [`Strategy`] enum
//! and instantiated by [`create_backend`].
//!
//! | Strategy | Input | Method |
//! |----------|-------|--------|
//! | `Constraint` | Model | Propagation + depth-first branch-and-bound |
//! | `Permutation` | Instance (flow-shop only) | NEH + simulated annealing |
//! | `Milp` | Model | `good_lp` with the `microlp` backend |
//!
//! Infeasibility and time-limit hits are reported through the result,
//! never as errors.

mod cache;
mod constraint;
mod limits;
mod milp;
mod permutation;

use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub use cache::{CacheKey, CachedSolve, MemoryCache, SolveCache};
pub use constraint::{ConstraintBackend, ConstraintConfig};
pub use limits::{Deadline, SolveLimits};
pub use milp::{MilpBackend, MilpConfig};
pub use permutation::{flow_shop_finish_times, PermutationBackend, PermutationConfig};

pub use crate::cp::VarKey;
use crate::cp::Model;
use crate::error::Result;
use crate::models::Instance;

/// Status of a backend after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Search completed with a proven optimal solution.
    Optimal,
    /// A feasible solution was found, optimality not proven.
    Feasible,
    /// Search completed without any feasible solution.
    Infeasible,
    /// Stopped before finding a solution or proving infeasibility.
    Unknown,
}

impl SolveStatus {
    /// Whether a feasible solution was found.
    pub fn is_solution_found(&self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible)
    }
}

/// Best permutation found by the order-based strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationOutcome {
    /// Job indices (into [`Instance::jobs`]) in processing order.
    pub order: Vec<usize>,
    /// Shared resource order.
    pub resources: Vec<String>,
    /// `finish[m][pos]`: finish time of `order[pos]` on `resources[m]`.
    pub finish: Vec<Vec<i64>>,
}

impl PermutationOutcome {
    /// Makespan of the permutation.
    pub fn makespan(&self) -> i64 {
        self.finish
            .last()
            .and_then(|row| row.last())
            .copied()
            .unwrap_or(0)
    }

    /// Finish time of job `job_index` on `resource`.
    pub fn finish_of(&self, job_index: usize, resource: &str) -> Option<i64> {
        let pos = self.order.iter().position(|&j| j == job_index)?;
        let m = self.resources.iter().position(|r| r == resource)?;
        self.finish.get(m)?.get(pos).copied()
    }
}

/// Backend output, consumed once by [`crate::normalize::normalize`].
#[derive(Debug, Clone)]
pub struct RawResult {
    /// Termination status.
    pub status: SolveStatus,
    /// Whether `values` / `permutation` hold a feasible solution.
    pub feasible: bool,
    /// Objective (makespan) of the returned solution.
    pub objective: Option<i64>,
    /// Assigned values by variable identity.
    pub values: FxHashMap<VarKey, i64>,
    /// Order-based solution, if the backend works on permutations.
    pub permutation: Option<PermutationOutcome>,
    /// The budget elapsed before the search finished.
    pub time_limit_reached: bool,
    /// The search was stopped by the cancel flag.
    pub cancelled: bool,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl RawResult {
    /// A result without a solution.
    pub fn no_solution(status: SolveStatus, deadline: &Deadline) -> Self {
        Self {
            status,
            feasible: false,
            objective: None,
            values: FxHashMap::default(),
            permutation: None,
            time_limit_reached: deadline.timed_out(),
            cancelled: deadline.cancelled(),
            elapsed: deadline.elapsed(),
        }
    }

    /// Value of a variable.
    pub fn value(&self, key: &VarKey) -> Option<i64> {
        self.values.get(key).copied()
    }

    /// Assigned start of `job` on `resource`, if present in `values`.
    pub fn start(&self, job: &str, resource: &str) -> Option<i64> {
        self.value(&VarKey::Start {
            job: job.to_string(),
            resource: resource.to_string(),
        })
    }
}

/// What a backend consumes.
#[derive(Debug, Clone, Copy)]
pub enum SolverInput<'a> {
    /// A constraint model.
    Model(&'a Model),
    /// The raw instance.
    Instance(&'a Instance),
}

impl SolverInput<'_> {
    /// Kind of this input.
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Model(_) => InputKind::Model,
            Self::Instance(_) => InputKind::Instance,
        }
    }
}

/// Input kind expected by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Consumes a [`Model`].
    Model,
    /// Consumes an [`Instance`].
    Instance,
}

/// Uniform solving contract.
///
/// Implementors must poll their deadline and return the best result found
/// so far once it expires.
pub trait SolverBackend: Send + Sync {
    /// Short backend name.
    fn name(&self) -> &'static str;

    /// The input this backend consumes.
    fn input_kind(&self) -> InputKind;

    /// Solves within `limits`.
    fn solve(&self, input: SolverInput<'_>, limits: &SolveLimits) -> Result<RawResult>;
}

/// Solving strategy with its strategy-specific configuration.
#[derive(Debug, Clone, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Exact search over the constraint model.
    Constraint(ConstraintConfig),
    /// Order-based search over job permutations (flow-shop only).
    Permutation(PermutationConfig),
    /// Generic mixed-integer solver over the constraint model.
    Milp(MilpConfig),
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Constraint(ConstraintConfig::default())
    }
}

impl Strategy {
    /// Strategy kind without configuration.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Constraint(_) => StrategyKind::Constraint,
            Self::Permutation(_) => StrategyKind::Permutation,
            Self::Milp(_) => StrategyKind::Milp,
        }
    }

    /// Validates the strategy configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Constraint(c) => c.validate(),
            Self::Permutation(c) => c.validate(),
            Self::Milp(c) => c.validate(),
        }
    }
}

/// Strategy discriminant, used for cache keys and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// See [`Strategy::Constraint`].
    Constraint,
    /// See [`Strategy::Permutation`].
    Permutation,
    /// See [`Strategy::Milp`].
    Milp,
}

impl StrategyKind {
    /// Stable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constraint => "constraint",
            Self::Permutation => "permutation",
            Self::Milp => "milp",
        }
    }

    /// Input consumed by this strategy.
    pub fn input_kind(&self) -> InputKind {
        match self {
            Self::Permutation => InputKind::Instance,
            Self::Constraint | Self::Milp => InputKind::Model,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instantiates the backend for `strategy`.
pub fn create_backend(strategy: &Strategy) -> Box<dyn SolverBackend> {
    match strategy {
        Strategy::Constraint(c) => Box::new(ConstraintBackend::new(c.clone())),
        Strategy::Permutation(c) => Box::new(PermutationBackend::new(c.clone())),
        Strategy::Milp(c) => Box::new(MilpBackend::new(c.clone())),
    }
}

/// Solves `input` with `strategy` within `limits`.
///
/// # Example
/// ```
/// use u_jobshop::cp::build_model;
/// use u_jobshop::models::Instance;
/// use u_jobshop::solver::{solve, SolveLimits, SolverInput, Strategy};
///
/// let instance = Instance::from_routes([
///     ("A", vec![("R1", 3), ("R2", 2)]),
///     ("B", vec![("R1", 2), ("R2", 4)]),
/// ]).unwrap();
/// let model = build_model(&instance, 12).unwrap();
///
/// let raw = solve(SolverInput::Model(&model), &Strategy::default(), &SolveLimits::default()).unwrap();
/// assert!(raw.feasible);
/// assert_eq!(raw.objective, Some(8));
/// ```
pub fn solve(input: SolverInput<'_>, strategy: &Strategy, limits: &SolveLimits) -> Result<RawResult> {
    strategy.validate()?;
    create_backend(strategy).solve(input, limits)
}

/// Rejects inputs of the wrong kind.
pub(crate) fn expect_model<'a>(backend: &'static str, input: SolverInput<'a>) -> Result<&'a Model> {
    match input {
        SolverInput::Model(model) => Ok(model),
        SolverInput::Instance(_) => Err(crate::error::ScheduleError::UnsupportedInput {
            backend,
            expected: "model",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_serde_tagged() {
        let json = serde_json::to_string(&Strategy::Milp(MilpConfig::default())).unwrap();
        assert!(json.contains("\"kind\":\"milp\""));
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), StrategyKind::Milp);

        let parsed: Strategy = serde_json::from_str(r#"{"kind":"permutation","seed":9}"#).unwrap();
        match parsed {
            Strategy::Permutation(c) => assert_eq!(c.seed, 9),
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn test_create_backend_names() {
        let strategies = [
            Strategy::Constraint(ConstraintConfig::default()),
            Strategy::Permutation(PermutationConfig::default()),
            Strategy::Milp(MilpConfig::default()),
        ];
        for s in &strategies {
            let backend = create_backend(s);
            assert_eq!(backend.name(), s.kind().as_str());
            assert_eq!(backend.input_kind(), s.kind().input_kind());
        }
    }

    #[test]
    fn test_permutation_outcome_lookup() {
        let outcome = PermutationOutcome {
            order: vec![1, 0],
            resources: vec!["R1".into(), "R2".into()],
            finish: vec![vec![2, 5], vec![6, 8]],
        };
        assert_eq!(outcome.makespan(), 8);
        assert_eq!(outcome.finish_of(0, "R2"), Some(8));
        assert_eq!(outcome.finish_of(1, "R1"), Some(2));
        assert_eq!(outcome.finish_of(2, "R1"), None);
        assert_eq!(outcome.finish_of(0, "R9"), None);
    }

    #[test]
    fn test_status_solution_found() {
        assert!(SolveStatus::Optimal.is_solution_found());
        assert!(SolveStatus::Feasible.is_solution_found());
        assert!(!SolveStatus::Infeasible.is_solution_found());
        assert!(!SolveStatus::Unknown.is_solution_found());
    }
}
