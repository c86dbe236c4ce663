//! Exact strategy: bounds propagation with depth-first branch-and-bound.
//!
//! # Algorithm
//!
//! 1. Propagate every linear constraint `Σ a·x >= b` to a fixpoint:
//!    each term is bounded by `a·x >= b - max(rest)`.
//! 2. Branch on an unfixed ordering binary, picking the pair with the
//!    earliest start lower bound and trying the job that can start first
//!    as the predecessor.
//! 3. Once every binary is fixed, all remaining constraints are difference
//!    constraints, so the lower bounds form a solution. If they do not,
//!    split the widest integer domain instead.
//! 4. Each solution tightens `makespan <= best - 1` for the rest of the
//!    search.
//!
//! The deadline is polled at every node and periodically inside
//! propagation.
//!
//! # Reference
//! Baptiste et al. (2001), "Constraint-Based Scheduling", Ch. 2

use std::collections::VecDeque;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{expect_model, Deadline, RawResult, SolveLimits, SolveStatus, SolverBackend, SolverInput};
use super::InputKind;
use crate::cp::{Model, VarId, VarKey, VarKind};
use crate::error::{Result, ScheduleError};

/// Configuration of the constraint strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Maximum search nodes. 0 = no limit.
    pub node_limit: u64,
    /// Stop after the first feasible solution.
    pub stop_after_first: bool,
}

impl ConstraintConfig {
    /// Sets the node limit.
    pub fn with_node_limit(mut self, node_limit: u64) -> Self {
        self.node_limit = node_limit;
        self
    }

    /// Stops at the first solution.
    pub fn with_stop_after_first(mut self, stop: bool) -> Self {
        self.stop_after_first = stop;
        self
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Branch-and-bound backend over a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ConstraintBackend {
    config: ConstraintConfig,
}

impl ConstraintBackend {
    /// Creates the backend.
    pub fn new(config: ConstraintConfig) -> Self {
        Self { config }
    }
}

impl SolverBackend for ConstraintBackend {
    fn name(&self) -> &'static str {
        "constraint"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Model
    }

    fn solve(&self, input: SolverInput<'_>, limits: &SolveLimits) -> Result<RawResult> {
        let model = expect_model(self.name(), input)?;
        model.validate()?;
        let deadline = limits.deadline();

        let mut search = Search::new(model, &self.config, &deadline)?;
        let outcome = search.run();
        debug!(
            target: "u_jobshop::solver",
            "constraint search: {} nodes, exhausted={}",
            search.nodes,
            outcome.exhausted
        );

        let status = match (&search.incumbent, outcome.exhausted) {
            (Some(_), true) => SolveStatus::Optimal,
            (Some(_), false) => SolveStatus::Feasible,
            (None, true) => SolveStatus::Infeasible,
            (None, false) => SolveStatus::Unknown,
        };
        let stopped_by_deadline = !outcome.exhausted && outcome.deadline_hit;
        if stopped_by_deadline {
            info!(target: "u_jobshop::solver", "constraint search stopped at the deadline");
        }

        let mut result = RawResult::no_solution(status, &deadline);
        result.time_limit_reached = stopped_by_deadline && deadline.timed_out();
        result.cancelled = stopped_by_deadline && deadline.cancelled();
        if let Some(best) = search.incumbent.take() {
            result.feasible = true;
            result.objective = Some(best[model.makespan_var().0]);
            result.values = model.keyed_values(&best);
        }
        Ok(result)
    }
}

/// Per-node variable bounds.
#[derive(Debug, Clone)]
struct Domains {
    lo: Vec<i64>,
    hi: Vec<i64>,
}

impl Domains {
    fn is_fixed(&self, v: usize) -> bool {
        self.lo[v] == self.hi[v]
    }
}

struct Node {
    domains: Domains,
    /// Variables changed by the branching decision.
    changed: Vec<usize>,
}

struct Outcome {
    exhausted: bool,
    deadline_hit: bool,
}

enum Propagation {
    Consistent,
    Failed,
    Interrupted,
}

/// An ordering binary with the start variables of its two operations.
struct OrderingPair {
    y: usize,
    first: usize,
    second: usize,
}

struct Search<'a> {
    model: &'a Model,
    config: &'a ConstraintConfig,
    deadline: &'a Deadline,
    /// Constraint indices per variable.
    watches: Vec<Vec<usize>>,
    pairs: Vec<OrderingPair>,
    incumbent: Option<Vec<i64>>,
    nodes: u64,
}

/// Propagation pops between deadline polls.
const POLL_EVERY: usize = 1024;

impl<'a> Search<'a> {
    fn new(model: &'a Model, config: &'a ConstraintConfig, deadline: &'a Deadline) -> Result<Self> {
        let mut watches = vec![Vec::new(); model.variable_count()];
        for (c, constraint) in model.constraints().iter().enumerate() {
            for &(v, _) in &constraint.terms {
                watches[v.0].push(c);
            }
        }

        let mut pairs = Vec::new();
        for (y, var) in model.variables().iter().enumerate() {
            if let VarKey::Precedes {
                first,
                second,
                resource,
            } = &var.key
            {
                let lookup = |job: &str| {
                    model.start_var(job, resource).ok_or_else(|| {
                        ScheduleError::InvalidModel(format!(
                            "ordering variable {} has no start variable for job '{job}'",
                            var.key
                        ))
                    })
                };
                pairs.push(OrderingPair {
                    y,
                    first: lookup(first)?.0,
                    second: lookup(second)?.0,
                });
            }
        }

        Ok(Self {
            model,
            config,
            deadline,
            watches,
            pairs,
            incumbent: None,
            nodes: 0,
        })
    }

    fn run(&mut self) -> Outcome {
        let root = Domains {
            lo: self.model.variables().iter().map(|v| v.lower).collect(),
            hi: self.model.variables().iter().map(|v| v.upper).collect(),
        };
        if root.lo.iter().zip(&root.hi).any(|(lo, hi)| lo > hi) {
            return Outcome {
                exhausted: true,
                deadline_hit: false,
            };
        }

        let all: Vec<usize> = (0..self.model.variable_count()).collect();
        let mut stack = vec![Node {
            domains: root,
            changed: all,
        }];
        let makespan = self.model.makespan_var().0;

        while let Some(node) = stack.pop() {
            if self.deadline.expired() {
                return Outcome {
                    exhausted: false,
                    deadline_hit: true,
                };
            }
            if self.config.node_limit > 0 && self.nodes >= self.config.node_limit {
                return Outcome {
                    exhausted: false,
                    deadline_hit: false,
                };
            }
            self.nodes += 1;

            let Node {
                mut domains,
                mut changed,
            } = node;

            if let Some(best) = &self.incumbent {
                let cap = best[makespan] - 1;
                if domains.hi[makespan] > cap {
                    domains.hi[makespan] = cap;
                    if domains.lo[makespan] > cap {
                        continue;
                    }
                    changed.push(makespan);
                }
            }

            match self.propagate(&mut domains, &changed) {
                Propagation::Failed => continue,
                Propagation::Interrupted => {
                    return Outcome {
                        exhausted: false,
                        deadline_hit: true,
                    }
                }
                Propagation::Consistent => {}
            }

            if let Some((y, first_value)) = self.pick_ordering(&domains) {
                // Push the alternative first so the preferred branch is explored next.
                for value in [1 - first_value, first_value] {
                    let mut child = domains.clone();
                    child.lo[y] = value;
                    child.hi[y] = value;
                    stack.push(Node {
                        domains: child,
                        changed: vec![y],
                    });
                }
                continue;
            }

            if self
                .model
                .constraints()
                .iter()
                .all(|c| c.is_satisfied(&domains.lo))
            {
                debug!(
                    target: "u_jobshop::solver",
                    "incumbent makespan {} at node {}",
                    domains.lo[makespan],
                    self.nodes
                );
                self.incumbent = Some(domains.lo);
                if self.config.stop_after_first {
                    return Outcome {
                        exhausted: false,
                        deadline_hit: false,
                    };
                }
                continue;
            }

            if let Some(v) = self.widest_integer(&domains) {
                let mid = domains.lo[v] + (domains.hi[v] - domains.lo[v]) / 2;
                let mut upper = domains.clone();
                upper.lo[v] = mid + 1;
                let mut lower = domains;
                lower.hi[v] = mid;
                stack.push(Node {
                    domains: upper,
                    changed: vec![v],
                });
                stack.push(Node {
                    domains: lower,
                    changed: vec![v],
                });
            }
        }

        Outcome {
            exhausted: true,
            deadline_hit: false,
        }
    }

    /// Tightens bounds until no constraint changes anything.
    fn propagate(&self, d: &mut Domains, changed: &[usize]) -> Propagation {
        let constraints = self.model.constraints();
        let mut queued = vec![false; constraints.len()];
        let mut queue = VecDeque::new();
        for &v in changed {
            for &c in &self.watches[v] {
                if !queued[c] {
                    queued[c] = true;
                    queue.push_back(c);
                }
            }
        }

        let mut pops = 0usize;
        while let Some(c) = queue.pop_front() {
            queued[c] = false;
            pops += 1;
            if pops % POLL_EVERY == 0 && self.deadline.expired() {
                return Propagation::Interrupted;
            }

            let constraint = &constraints[c];
            let rhs = constraint.rhs as i128;
            let max_sum: i128 = constraint
                .terms
                .iter()
                .map(|&(v, a)| term_max(a, d.lo[v.0], d.hi[v.0]))
                .sum();
            if max_sum < rhs {
                return Propagation::Failed;
            }

            for &(VarId(v), a) in &constraint.terms {
                if a == 0 {
                    continue;
                }
                let rest = max_sum - term_max(a, d.lo[v], d.hi[v]);
                let need = rhs - rest;
                let a = a as i128;
                let tightened = if a > 0 {
                    let bound = ceil_div(need, a);
                    if bound > d.lo[v] as i128 {
                        if bound > d.hi[v] as i128 {
                            return Propagation::Failed;
                        }
                        d.lo[v] = bound as i64;
                        true
                    } else {
                        false
                    }
                } else {
                    let bound = floor_div(need, a);
                    if bound < d.hi[v] as i128 {
                        if bound < d.lo[v] as i128 {
                            return Propagation::Failed;
                        }
                        d.hi[v] = bound as i64;
                        true
                    } else {
                        false
                    }
                };
                if tightened {
                    for &w in &self.watches[v] {
                        if !queued[w] {
                            queued[w] = true;
                            queue.push_back(w);
                        }
                    }
                }
            }
        }
        Propagation::Consistent
    }

    /// Next ordering binary to branch on and the value to try first.
    fn pick_ordering(&self, d: &Domains) -> Option<(usize, i64)> {
        self.pairs
            .iter()
            .filter(|p| !d.is_fixed(p.y))
            .min_by_key(|p| (d.lo[p.first].min(d.lo[p.second]), p.y))
            .map(|p| {
                let first_goes_first = d.lo[p.first] <= d.lo[p.second];
                (p.y, i64::from(first_goes_first))
            })
    }

    fn widest_integer(&self, d: &Domains) -> Option<usize> {
        self.model
            .variables()
            .iter()
            .enumerate()
            .filter(|(v, var)| var.kind == VarKind::Integer && !d.is_fixed(*v))
            .max_by_key(|(v, _)| (d.hi[*v] - d.lo[*v], std::cmp::Reverse(*v)))
            .map(|(v, _)| v)
    }
}

#[inline]
fn term_max(a: i64, lo: i64, hi: i64) -> i128 {
    let a = a as i128;
    (a * lo as i128).max(a * hi as i128)
}

#[inline]
fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

#[inline]
fn ceil_div(a: i128, b: i128) -> i128 {
    -floor_div(-a, b)
}
