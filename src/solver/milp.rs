//! Generic mixed-integer strategy via `good_lp`.
//!
//! The model is translated variable-for-variable into a `good_lp` problem
//! and solved by the pure-Rust `microlp` backend on a worker thread.
//!
//! # Time limit
//!
//! The worker hands the remaining budget to microlp, which stops its own
//! branch-and-bound at the deadline. If microlp holds an incumbent by then
//! it is returned as a `Feasible` best-so-far with `time_limit_reached`;
//! otherwise the result is `Unknown` with no solution. The LP relaxation
//! itself is not interruptible, so the first feasible point can arrive
//! late or not at all on large instances, where the constraint strategy
//! usually reports something sooner.
//!
//! The calling thread waits in poll slices. It returns at most one slice
//! past the deadline; a worker still running then is abandoned and its
//! late result dropped. The worker itself ends once microlp honours its
//! time limit, so an abandoned worker never runs unbounded. A raised
//! cancel flag returns immediately and leaves the worker to finish on
//! the same budget.
//!
//! Returned values are rounded to integers and re-checked against the
//! model before being reported as feasible.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::{
    default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolutionStatus, SolverModel, WithTimeLimit,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{
    expect_model, Deadline, InputKind, RawResult, SolveLimits, SolveStatus, SolverBackend,
    SolverInput,
};
use crate::cp::{Model, VarKind};
use crate::error::{Result, ScheduleError};

/// Budgets above this are passed to microlp as "no limit".
const MAX_SOLVER_LIMIT: Duration = Duration::from_secs(365 * 24 * 3600);

/// Configuration of the MILP strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MilpConfig {
    /// How often the caller checks the deadline while the worker runs (ms).
    pub poll_interval_ms: u64,
}

impl Default for MilpConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 25,
        }
    }
}

impl MilpConfig {
    /// Sets the poll interval.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ScheduleError::InvalidConfig(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// MILP backend over a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct MilpBackend {
    config: MilpConfig,
}

impl MilpBackend {
    /// Creates the backend.
    pub fn new(config: MilpConfig) -> Self {
        Self { config }
    }
}

/// What the worker thread reports back.
#[derive(Debug)]
enum WorkerOutcome {
    /// Variable values in model order; `proven` when microlp closed the gap.
    Solved { values: Vec<i64>, proven: bool },
    Infeasible,
    /// microlp hit its time limit before finding any integer point.
    NoIncumbent,
}

type WorkerResult = std::result::Result<WorkerOutcome, String>;

impl SolverBackend for MilpBackend {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Model
    }

    fn solve(&self, input: SolverInput<'_>, limits: &SolveLimits) -> Result<RawResult> {
        let model = expect_model(self.name(), input)?;
        model.validate()?;
        self.config.validate()?;
        let deadline = limits.deadline();

        if model.variables().iter().any(|v| v.lower > v.upper) {
            return Ok(RawResult::no_solution(SolveStatus::Infeasible, &deadline));
        }
        if deadline.expired() {
            return Ok(stopped(&deadline));
        }

        let owned = model.clone();
        let budget = deadline.remaining();
        let (tx, rx) = mpsc::channel::<WorkerResult>();
        thread::Builder::new()
            .name("u-jobshop-milp".into())
            .spawn(move || {
                // The receiver is gone if the caller gave up; nothing to do then.
                let _ = tx.send(solve_with_good_lp(&owned, budget));
            })
            .map_err(|e| ScheduleError::Solver {
                backend: "milp",
                message: e.to_string(),
            })?;

        let slice = Duration::from_millis(self.config.poll_interval_ms);
        let mut grace_used = false;
        let outcome = loop {
            if deadline.cancelled() {
                info!(target: "u_jobshop::solver", "milp worker abandoned on cancel");
                return Ok(stopped(&deadline));
            }
            let wait = if deadline.timed_out() {
                // One last slice for microlp to hand back its incumbent.
                if grace_used {
                    info!(target: "u_jobshop::solver", "milp worker abandoned at the deadline");
                    return Ok(stopped(&deadline));
                }
                grace_used = true;
                slice
            } else {
                slice.min(deadline.remaining()).max(Duration::from_millis(1))
            };
            match rx.recv_timeout(wait) {
                Ok(outcome) => break outcome,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ScheduleError::Solver {
                        backend: "milp",
                        message: "worker exited without a result".into(),
                    })
                }
            }
        };

        let (values, proven) = match outcome {
            Ok(WorkerOutcome::Solved { values, proven }) => (values, proven),
            Ok(WorkerOutcome::Infeasible) => {
                return Ok(RawResult::no_solution(SolveStatus::Infeasible, &deadline))
            }
            Ok(WorkerOutcome::NoIncumbent) => return Ok(stopped(&deadline)),
            Err(message) => {
                return Err(ScheduleError::Solver {
                    backend: "milp",
                    message,
                })
            }
        };

        let keyed = model.keyed_values(&values);
        let violated = model.violations(&keyed);
        if !violated.is_empty() {
            warn!(
                target: "u_jobshop::solver",
                "milp solution violates {} constraint(s), first: {}",
                violated.len(),
                violated[0]
            );
            return Ok(RawResult::no_solution(SolveStatus::Infeasible, &deadline));
        }

        let status = if proven {
            SolveStatus::Optimal
        } else {
            SolveStatus::Feasible
        };
        let mut result = RawResult::no_solution(status, &deadline);
        result.feasible = true;
        result.objective = Some(values[model.makespan_var().0]);
        result.values = keyed;
        result.time_limit_reached = !proven;
        result.cancelled = false;
        Ok(result)
    }
}

/// No solution because the budget ran out or the caller cancelled.
fn stopped(deadline: &Deadline) -> RawResult {
    let mut result = RawResult::no_solution(SolveStatus::Unknown, deadline);
    result.time_limit_reached = deadline.timed_out();
    result
}

fn solve_with_good_lp(model: &Model, budget: Duration) -> WorkerResult {
    let mut vars = ProblemVariables::new();
    let handles: Vec<good_lp::Variable> = model
        .variables()
        .iter()
        .map(|v| match v.kind {
            VarKind::Binary => vars.add(variable().binary()),
            VarKind::Integer => vars.add(
                variable()
                    .integer()
                    .min(v.lower as f64)
                    .max(v.upper as f64),
            ),
        })
        .collect();

    let objective: Expression = handles[model.makespan_var().0].into();
    let mut problem = vars.minimise(objective).using(default_solver);
    if budget < MAX_SOLVER_LIMIT {
        problem = problem.with_time_limit(budget.as_secs_f64());
    }
    for c in model.constraints() {
        let mut lhs = Expression::from(0.0);
        for &(v, coef) in &c.terms {
            lhs.add_mul(coef as f64, handles[v.0]);
        }
        problem = problem.with(lhs.geq(Expression::from(c.rhs as f64)));
    }

    match problem.solve() {
        Ok(solution) => Ok(WorkerOutcome::Solved {
            proven: matches!(solution.status(), SolutionStatus::Optimal),
            values: handles
                .iter()
                .map(|&h| solution.value(h).round() as i64)
                .collect(),
        }),
        Err(ResolutionError::Infeasible) => Ok(WorkerOutcome::Infeasible),
        // microlp's "time limit reached before finding a feasible solution".
        Err(ResolutionError::Other(_)) => Ok(WorkerOutcome::NoIncumbent),
        Err(e) => Err(e.to_string()),
    }
}
