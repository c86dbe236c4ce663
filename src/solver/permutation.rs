//! Order-based strategy for flow shops.
//!
//! When every job visits the resources in the same order, a schedule is
//! fully determined by the job permutation. Finish times follow the
//! recurrence
//!
//! `finish[m][j] = max(finish[m-1][j], finish[m][j-1]) + duration[m][order[j]]`
//!
//! # Algorithm
//!
//! 1. NEH construction: insert jobs by decreasing total processing time at
//!    the position that minimizes the partial makespan.
//! 2. Simulated annealing from the NEH order with swap and insert moves,
//!    run by `u_metaheur::sa::SaRunner` with geometric cooling.
//!
//! The runner polls its cancel flag once per temperature level. A watcher
//! thread raises that flag when the deadline expires, so the stop margin
//! is one level (`iterations_per_temperature` evaluations).
//!
//! # References
//! - Nawaz, Enscore & Ham (1983), "A heuristic algorithm for the
//!   m-machine, n-job flow-shop sequencing problem"
//! - Kirkpatrick et al. (1983), "Optimization by Simulated Annealing"

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use u_metaheur::sa::{CoolingSchedule, SaConfig, SaProblem, SaResult, SaRunner};

use super::{
    Deadline, InputKind, PermutationOutcome, RawResult, SolveLimits, SolveStatus, SolverBackend,
    SolverInput, VarKey,
};
use crate::error::{Result, ScheduleError};
use crate::models::FlowShopMatrix;
use crate::validation::validate_instance;

/// How often the watcher thread checks the deadline.
const DEADLINE_POLL: Duration = Duration::from_millis(5);

/// Configuration of the permutation strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutationConfig {
    /// Seed for the annealing RNG.
    pub seed: u64,
    /// Hard cap on annealing iterations. 0 = run until the temperature
    /// floor or the deadline.
    pub max_iterations: usize,
    /// Initial temperature.
    pub initial_temperature: f64,
    /// Temperature floor; annealing stops below it.
    pub min_temperature: f64,
    /// Geometric cooling factor in (0, 1).
    pub cooling_alpha: f64,
    /// Iterations at each temperature level.
    pub iterations_per_temperature: usize,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_iterations: 20_000,
            initial_temperature: 10.0,
            min_temperature: 0.01,
            cooling_alpha: 0.95,
            iterations_per_temperature: 100,
        }
    }
}

impl std::hash::Hash for PermutationConfig {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.seed.hash(state);
        self.max_iterations.hash(state);
        self.initial_temperature.to_bits().hash(state);
        self.min_temperature.to_bits().hash(state);
        self.cooling_alpha.to_bits().hash(state);
        self.iterations_per_temperature.hash(state);
    }
}

impl PermutationConfig {
    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the iteration cap.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Sets the initial temperature.
    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    /// Sets the geometric cooling factor.
    pub fn with_cooling_alpha(mut self, alpha: f64) -> Self {
        self.cooling_alpha = alpha;
        self
    }

    /// Sets the iterations per temperature level.
    pub fn with_iterations_per_temperature(mut self, n: usize) -> Self {
        self.iterations_per_temperature = n;
        self
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.initial_temperature.is_nan() || self.initial_temperature <= 0.0 {
            return Err(ScheduleError::InvalidConfig(
                "initial_temperature must be positive".into(),
            ));
        }
        if self.min_temperature.is_nan()
            || self.min_temperature <= 0.0
            || self.min_temperature >= self.initial_temperature
        {
            return Err(ScheduleError::InvalidConfig(
                "min_temperature must be positive and below initial_temperature".into(),
            ));
        }
        if !(self.cooling_alpha > 0.0 && self.cooling_alpha < 1.0) {
            return Err(ScheduleError::InvalidConfig(
                "cooling_alpha must be in (0, 1)".into(),
            ));
        }
        if self.iterations_per_temperature == 0 {
            return Err(ScheduleError::InvalidConfig(
                "iterations_per_temperature must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn sa_config(&self) -> SaConfig {
        SaConfig::default()
            .with_initial_temperature(self.initial_temperature)
            .with_min_temperature(self.min_temperature)
            .with_cooling(CoolingSchedule::Geometric {
                alpha: self.cooling_alpha,
            })
            .with_iterations_per_temperature(self.iterations_per_temperature)
            .with_max_iterations(self.max_iterations)
            .with_seed(self.seed)
    }
}

/// Job orders over the columns of a [`FlowShopMatrix`], starting from a
/// fixed order.
struct FlowShopProblem<'a> {
    durations: &'a [Vec<i64>],
    initial: Vec<usize>,
}

impl SaProblem for FlowShopProblem<'_> {
    type Solution = Vec<usize>;

    fn initial_solution<R: Rng>(&self, _rng: &mut R) -> Vec<usize> {
        self.initial.clone()
    }

    fn cost(&self, order: &Vec<usize>) -> f64 {
        makespan_of(self.durations, order) as f64
    }

    fn neighbor<R: Rng>(&self, order: &Vec<usize>, rng: &mut R) -> Vec<usize> {
        let n = order.len();
        let mut next = order.clone();
        if n < 2 {
            return next;
        }
        let i = rng.random_range(0..n);
        let mut j = rng.random_range(0..n - 1);
        if j >= i {
            j += 1;
        }
        if rng.random_bool(0.5) {
            next.swap(i, j);
        } else {
            let job = next.remove(i);
            next.insert(j, job);
        }
        next
    }
}

/// Permutation search backend over an [`Instance`](crate::models::Instance).
#[derive(Debug, Clone, Default)]
pub struct PermutationBackend {
    config: PermutationConfig,
}

impl PermutationBackend {
    /// Creates the backend.
    pub fn new(config: PermutationConfig) -> Self {
        Self { config }
    }
}

impl SolverBackend for PermutationBackend {
    fn name(&self) -> &'static str {
        "permutation"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Instance
    }

    fn solve(&self, input: SolverInput<'_>, limits: &SolveLimits) -> Result<RawResult> {
        let SolverInput::Instance(instance) = input else {
            return Err(ScheduleError::UnsupportedInput {
                backend: self.name(),
                expected: "instance",
            });
        };
        self.config.validate()?;
        validate_instance(instance).map_err(ScheduleError::InvalidInstance)?;
        let matrix = instance
            .flow_shop_matrix()
            .ok_or_else(|| ScheduleError::UnsupportedStrategy {
                strategy: "permutation",
                reason: "jobs visit resources in different orders".into(),
            })?;
        let deadline = limits.deadline();

        let neh = neh_order(&matrix);
        let trivial = matrix.job_count() < 2 || matrix.machine_count() == 0;
        let (positions, stopped) = if trivial {
            (neh, false)
        } else {
            let problem = FlowShopProblem {
                durations: &matrix.durations,
                initial: neh,
            };
            let sa = self.anneal(&problem, &deadline)?;
            debug!(
                target: "u_jobshop::solver",
                "permutation search: {} iterations, best {}, stopped={}",
                sa.iterations,
                sa.best_cost,
                sa.cancelled
            );
            (sa.best, sa.cancelled)
        };

        let finish = flow_shop_finish_times(&matrix.durations, &positions);
        let outcome = PermutationOutcome {
            order: positions.iter().map(|&p| matrix.jobs[p]).collect(),
            resources: matrix.resources.clone(),
            finish,
        };
        let makespan = outcome.makespan();

        let status = if trivial {
            SolveStatus::Optimal
        } else {
            SolveStatus::Feasible
        };
        let mut result = RawResult::no_solution(status, &deadline);
        result.time_limit_reached = stopped && deadline.timed_out();
        result.cancelled = stopped && deadline.cancelled();
        result.feasible = true;
        result.objective = Some(makespan);
        result.values.insert(VarKey::Makespan, makespan);
        result.permutation = Some(outcome);
        Ok(result)
    }
}

impl PermutationBackend {
    /// Runs the annealer with a watcher that turns `deadline` into the
    /// runner's cancel flag.
    fn anneal(
        &self,
        problem: &FlowShopProblem<'_>,
        deadline: &Deadline,
    ) -> Result<SaResult<Vec<usize>>> {
        let config = self.config.sa_config();
        let stop = Arc::new(AtomicBool::new(deadline.expired()));
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            thread::Builder::new()
                .name("u-jobshop-sa-deadline".into())
                .spawn_scoped(s, || {
                    while !done.load(Ordering::Relaxed) {
                        if deadline.expired() {
                            stop.store(true, Ordering::Relaxed);
                            break;
                        }
                        thread::sleep(DEADLINE_POLL.min(deadline.remaining()));
                    }
                })
                .map_err(|e| ScheduleError::Solver {
                    backend: "permutation",
                    message: e.to_string(),
                })?;

            let result = SaRunner::run_with_cancel(problem, &config, Some(stop.clone()));
            done.store(true, Ordering::Relaxed);
            Ok(result)
        })
    }
}

/// Finish-time matrix `finish[m][pos]` of `order` (column indices into
/// `durations[m]`).
pub fn flow_shop_finish_times(durations: &[Vec<i64>], order: &[usize]) -> Vec<Vec<i64>> {
    let mut finish = vec![vec![0i64; order.len()]; durations.len()];
    for (m, row) in durations.iter().enumerate() {
        for (pos, &j) in order.iter().enumerate() {
            let above = if m > 0 { finish[m - 1][pos] } else { 0 };
            let left = if pos > 0 { finish[m][pos - 1] } else { 0 };
            finish[m][pos] = above.max(left) + row[j];
        }
    }
    finish
}

/// Makespan of `order` using one rolling row of finish times.
fn makespan_of(durations: &[Vec<i64>], order: &[usize]) -> i64 {
    let mut row = vec![0i64; durations.len()];
    for &j in order {
        let mut above = 0;
        for (m, f) in row.iter_mut().enumerate() {
            *f = (*f).max(above) + durations[m][j];
            above = *f;
        }
    }
    row.last().copied().unwrap_or(0)
}

/// NEH construction heuristic; returns column indices.
fn neh_order(matrix: &FlowShopMatrix) -> Vec<usize> {
    let n = matrix.job_count();
    let total = |j: usize| -> i64 { matrix.durations.iter().map(|row| row[j]).sum() };
    let mut by_total: Vec<usize> = (0..n).collect();
    // Stable: equal totals keep registration order.
    by_total.sort_by_key(|&j| std::cmp::Reverse(total(j)));

    let mut order: Vec<usize> = Vec::with_capacity(n);
    for j in by_total {
        let mut best_pos = 0;
        let mut best_cost = i64::MAX;
        for pos in 0..=order.len() {
            order.insert(pos, j);
            let cost = makespan_of(&matrix.durations, &order);
            order.remove(pos);
            if cost < best_cost {
                best_cost = cost;
                best_pos = pos;
            }
        }
        order.insert(best_pos, j);
    }
    order
}
