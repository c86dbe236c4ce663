//! Disjunctive model construction.
//!
//! # Formulation
//!
//! - `start[j, r]` integer in `[earliest, latest]` from
//!   [`Instance::task_time_bounds`]
//! - `makespan` integer in `[0, bound]`
//! - `precedes[j, k, r]` binary for every pair `j < k` sharing `r`
//!
//! Constraints, with `M = bound`:
//! - Precedence: `start[j, curr] - start[j, prev] >= d_prev`
//! - Disjunctive: `start[j] - start[k] + M·y >= d_k` and
//!   `start[k] - start[j] - M·y >= d_j - M`, so `y = 1` puts `j` first
//!   and `y = 0` puts `k` first
//! - Makespan: `makespan - start[j, last] >= d_last`
//!
//! `M = bound` is large enough because every start domain already lies in
//! `[0, bound - d]`.
//!
//! Constraint labels quote the job and resource names (`disjunction1["a",
//! "b", "R1"]`), so names containing separators cannot collide.
//!
//! # Reference
//! Manne (1960), "On the Job-Shop Scheduling Problem", Operations Research 8(2)

use log::debug;

use super::model::{ConstraintKind, Model, VarId, VarKey, VarKind};
use crate::error::{Result, ScheduleError};
use crate::models::Instance;
use crate::validation::validate_instance;

/// Builds a [`Model`] from an [`Instance`] and a makespan bound.
///
/// # Example
/// ```
/// use u_jobshop::cp::ModelBuilder;
/// use u_jobshop::models::Instance;
///
/// let instance = Instance::from_routes([
///     ("A", vec![("R1", 3), ("R2", 2)]),
///     ("B", vec![("R1", 2), ("R2", 4)]),
/// ]).unwrap();
///
/// let model = ModelBuilder::new(&instance).build(12).unwrap();
/// let stats = model.stats();
/// assert_eq!(stats.binary_vars, 2);
/// assert_eq!(stats.disjunctive_constraints, 4);
/// ```
pub struct ModelBuilder<'a> {
    instance: &'a Instance,
    name: String,
}

impl<'a> ModelBuilder<'a> {
    /// Creates a builder for `instance`.
    pub fn new(instance: &'a Instance) -> Self {
        Self {
            instance,
            name: "jobshop".to_string(),
        }
    }

    /// Sets the model name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the model with makespan bound (and big-M) `bound`.
    pub fn build(&self, bound: i64) -> Result<Model> {
        if bound < 0 {
            return Err(ScheduleError::InvalidConfig(format!(
                "makespan bound must be non-negative, got {bound}"
            )));
        }
        validate_instance(self.instance).map_err(ScheduleError::InvalidInstance)?;

        let mut model = Model::new(self.name.clone(), bound);
        let starts = self.add_start_variables(&mut model, bound)?;
        self.add_precedence_constraints(&mut model, &starts);
        self.add_disjunctive_constraints(&mut model, &starts, bound);
        self.add_makespan_constraints(&mut model, &starts);

        debug!(target: "u_jobshop::cp", "built model '{}': {}", model.name, model.stats());
        Ok(model)
    }

    /// One start variable per operation; `starts[job][position]`.
    fn add_start_variables(&self, model: &mut Model, bound: i64) -> Result<Vec<Vec<VarId>>> {
        let mut starts = Vec::with_capacity(self.instance.job_count());
        for (job, route) in self.instance.routes() {
            let mut row = Vec::with_capacity(route.len());
            for (position, op) in route.iter().enumerate() {
                let (lower, upper) = self.instance.task_time_bounds(job, position, bound)?;
                let key = VarKey::Start {
                    job: job.to_string(),
                    resource: op.resource.clone(),
                };
                row.push(model.add_variable(key, VarKind::Integer, lower, upper));
            }
            starts.push(row);
        }
        Ok(starts)
    }

    fn add_precedence_constraints(&self, model: &mut Model, starts: &[Vec<VarId>]) {
        for (j, (job, route)) in self.instance.routes().enumerate() {
            for p in 1..route.len() {
                let prev = &route[p - 1];
                let curr = &route[p];
                model.add_constraint(
                    format!("precedence[{job:?}, {:?}]", curr.resource),
                    ConstraintKind::Precedence,
                    vec![(starts[j][p], 1), (starts[j][p - 1], -1)],
                    prev.duration,
                );
            }
        }
    }

    fn add_disjunctive_constraints(&self, model: &mut Model, starts: &[Vec<VarId>], big_m: i64) {
        for resource in self.instance.resources() {
            // (job index, start var, duration) of every operation on this resource.
            let visits: Vec<(usize, VarId, i64)> = self
                .instance
                .routes()
                .enumerate()
                .filter_map(|(j, (_, route))| {
                    route
                        .iter()
                        .position(|op| &op.resource == resource)
                        .map(|p| (j, starts[j][p], route[p].duration))
                })
                .collect();

            for (a, &(j, xj, dj)) in visits.iter().enumerate() {
                for &(k, xk, dk) in &visits[a + 1..] {
                    let job_j = &self.instance.jobs()[j];
                    let job_k = &self.instance.jobs()[k];
                    let y = model.add_variable(
                        VarKey::Precedes {
                            first: job_j.clone(),
                            second: job_k.clone(),
                            resource: resource.clone(),
                        },
                        VarKind::Binary,
                        0,
                        1,
                    );
                    model.add_constraint(
                        format!("disjunction1[{job_j:?}, {job_k:?}, {resource:?}]"),
                        ConstraintKind::Disjunctive,
                        vec![(xj, 1), (xk, -1), (y, big_m)],
                        dk,
                    );
                    model.add_constraint(
                        format!("disjunction2[{job_j:?}, {job_k:?}, {resource:?}]"),
                        ConstraintKind::Disjunctive,
                        vec![(xk, 1), (xj, -1), (y, -big_m)],
                        dj - big_m,
                    );
                }
            }
        }
    }

    fn add_makespan_constraints(&self, model: &mut Model, starts: &[Vec<VarId>]) {
        let makespan = model.makespan_var();
        for (j, (job, route)) in self.instance.routes().enumerate() {
            if let Some(last) = route.last() {
                model.add_constraint(
                    format!("makespan[{job:?}]"),
                    ConstraintKind::Makespan,
                    vec![(makespan, 1), (starts[j][route.len() - 1], -1)],
                    last.duration,
                );
            }
        }
    }
}

/// Builds a model for `instance` with makespan bound `bound`.
pub fn build_model(instance: &Instance, bound: i64) -> Result<Model> {
    ModelBuilder::new(instance).build(bound)
}
