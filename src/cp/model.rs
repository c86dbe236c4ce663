//! Linear disjunctive model definition.
//!
//! Every constraint is stored in the normalized form `Σ coef·var >= rhs`
//! over integer coefficients. The objective is always "minimize the
//! makespan variable".

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Index of a variable inside a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

/// Backend-independent identity of a decision variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKey {
    /// Start time of `job`'s operation on `resource`.
    Start { job: String, resource: String },
    /// The schedule's makespan.
    Makespan,
    /// 1 when `first` occupies `resource` before `second`.
    Precedes {
        first: String,
        second: String,
        resource: String,
    },
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { job, resource } => write!(f, "start[{job}, {resource}]"),
            Self::Makespan => f.write_str("makespan"),
            Self::Precedes {
                first,
                second,
                resource,
            } => write!(f, "precedes[{first}, {second}, {resource}]"),
        }
    }
}

/// Variable domain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Integer in `[lower, upper]`.
    Integer,
    /// 0/1 variable.
    Binary,
}

/// A decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Identity of the variable.
    pub key: VarKey,
    /// Domain type.
    pub kind: VarKind,
    /// Inclusive lower bound.
    pub lower: i64,
    /// Inclusive upper bound. `upper < lower` is an empty domain.
    pub upper: i64,
}

/// Constraint family, used for statistics and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Consecutive operations of one job.
    Precedence,
    /// One side of a big-M no-overlap pair.
    Disjunctive,
    /// Makespan covers a job's final operation.
    Makespan,
}

/// A linear constraint `Σ coef·var >= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    /// Unique label.
    pub label: String,
    /// Constraint family.
    pub kind: ConstraintKind,
    /// `(variable, coefficient)` terms.
    pub terms: Vec<(VarId, i64)>,
    /// Right-hand side.
    pub rhs: i64,
}

impl LinearConstraint {
    /// Left-hand side value under a full assignment indexed by [`VarId`].
    pub fn lhs(&self, values: &[i64]) -> i128 {
        self.terms
            .iter()
            .map(|&(v, c)| c as i128 * values[v.0] as i128)
            .sum()
    }

    /// Whether the constraint holds under `values`.
    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        self.lhs(values) >= self.rhs as i128
    }
}

/// Size summary of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    /// Integer variables (starts and makespan).
    pub integer_vars: usize,
    /// Binary ordering variables.
    pub binary_vars: usize,
    /// Precedence constraints.
    pub precedence_constraints: usize,
    /// Disjunctive constraints (two per ordered pair).
    pub disjunctive_constraints: usize,
    /// Makespan constraints.
    pub makespan_constraints: usize,
}

impl ModelStats {
    /// Total variables.
    pub fn variable_count(&self) -> usize {
        self.integer_vars + self.binary_vars
    }

    /// Total constraints.
    pub fn constraint_count(&self) -> usize {
        self.precedence_constraints + self.disjunctive_constraints + self.makespan_constraints
    }
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} variables ({} integer, {} binary), {} constraints ({} precedence, {} disjunctive, {} makespan)",
            self.variable_count(),
            self.integer_vars,
            self.binary_vars,
            self.constraint_count(),
            self.precedence_constraints,
            self.disjunctive_constraints,
            self.makespan_constraints
        )
    }
}

/// A makespan-minimization model over integer and binary variables.
///
/// Built once per solve by [`ModelBuilder`](super::ModelBuilder) and never
/// mutated by a backend.
///
/// # Examples
///
/// ```
/// use u_jobshop::cp::{Model, VarKey, VarKind, ConstraintKind};
///
/// let mut model = Model::new("example", 10);
/// let x = model.add_variable(
///     VarKey::Start { job: "A".into(), resource: "R1".into() },
///     VarKind::Integer, 0, 7,
/// );
/// let ms = model.makespan_var();
/// model.add_constraint("makespan_A", ConstraintKind::Makespan, vec![(ms, 1), (x, -1)], 3);
/// assert!(model.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Model {
    /// Model name.
    pub name: String,
    bound: i64,
    variables: Vec<Variable>,
    constraints: Vec<LinearConstraint>,
    lookup: FxHashMap<VarKey, VarId>,
    makespan: VarId,
}

impl Model {
    /// Creates a model holding only the makespan variable, domain `[0, bound]`.
    pub fn new(name: impl Into<String>, bound: i64) -> Self {
        let mut model = Self {
            name: name.into(),
            bound,
            variables: Vec::new(),
            constraints: Vec::new(),
            lookup: FxHashMap::default(),
            makespan: VarId(0),
        };
        model.makespan = model.add_variable(VarKey::Makespan, VarKind::Integer, 0, bound);
        model
    }

    /// Adds a variable and returns its id.
    ///
    /// Binary variables always get domain `[0, 1]`. Re-adding an existing
    /// key returns the existing id unchanged.
    pub fn add_variable(&mut self, key: VarKey, kind: VarKind, lower: i64, upper: i64) -> VarId {
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let (lower, upper) = match kind {
            VarKind::Binary => (0, 1),
            VarKind::Integer => (lower, upper),
        };
        let id = VarId(self.variables.len());
        self.lookup.insert(key.clone(), id);
        self.variables.push(Variable {
            key,
            kind,
            lower,
            upper,
        });
        id
    }

    /// Adds a constraint `Σ coef·var >= rhs`.
    pub fn add_constraint(
        &mut self,
        label: impl Into<String>,
        kind: ConstraintKind,
        terms: Vec<(VarId, i64)>,
        rhs: i64,
    ) {
        self.constraints.push(LinearConstraint {
            label: label.into(),
            kind,
            terms,
            rhs,
        });
    }

    /// The makespan bound the model was built with (also the big-M).
    pub fn bound(&self) -> i64 {
        self.bound
    }

    /// The objective variable.
    pub fn makespan_var(&self) -> VarId {
        self.makespan
    }

    /// All variables, indexed by [`VarId`].
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// All constraints.
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// Variable by id.
    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    /// Id of the variable with `key`.
    pub fn var(&self, key: &VarKey) -> Option<VarId> {
        self.lookup.get(key).copied()
    }

    /// Id of the start variable of `job` on `resource`.
    pub fn start_var(&self, job: &str, resource: &str) -> Option<VarId> {
        self.var(&VarKey::Start {
            job: job.to_string(),
            resource: resource.to_string(),
        })
    }

    /// Number of variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Counts variables and constraints by family.
    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats::default();
        for v in &self.variables {
            match v.kind {
                VarKind::Integer => stats.integer_vars += 1,
                VarKind::Binary => stats.binary_vars += 1,
            }
        }
        for c in &self.constraints {
            match c.kind {
                ConstraintKind::Precedence => stats.precedence_constraints += 1,
                ConstraintKind::Disjunctive => stats.disjunctive_constraints += 1,
                ConstraintKind::Makespan => stats.makespan_constraints += 1,
            }
        }
        stats
    }

    /// Validates the model structure.
    ///
    /// Checks that every term references an existing variable and that
    /// labels are unique. Empty domains are not structural errors; they
    /// make the model infeasible.
    pub fn validate(&self) -> Result<()> {
        let n = self.variables.len();
        let mut labels = FxHashSet::default();
        for c in &self.constraints {
            if let Some(&(v, _)) = c.terms.iter().find(|(v, _)| v.0 >= n) {
                return Err(ScheduleError::InvalidModel(format!(
                    "constraint '{}' references unknown variable {}",
                    c.label, v.0
                )));
            }
            if !labels.insert(c.label.as_str()) {
                return Err(ScheduleError::InvalidModel(format!(
                    "duplicate constraint label '{}'",
                    c.label
                )));
            }
        }
        Ok(())
    }

    /// Converts a dense assignment into a keyed map.
    pub fn keyed_values(&self, values: &[i64]) -> FxHashMap<VarKey, i64> {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, &x)| (v.key.clone(), x))
            .collect()
    }

    /// Converts a keyed map into a dense assignment. `None` if any
    /// variable is missing.
    pub fn dense_values(&self, values: &FxHashMap<VarKey, i64>) -> Option<Vec<i64>> {
        self.variables
            .iter()
            .map(|v| values.get(&v.key).copied())
            .collect()
    }

    /// Labels of everything `values` violates: missing variables, domain
    /// bounds, and constraints. Empty means the assignment is feasible.
    pub fn violations(&self, values: &FxHashMap<VarKey, i64>) -> Vec<String> {
        let mut out = Vec::new();
        let mut dense = Vec::with_capacity(self.variables.len());
        for v in &self.variables {
            match values.get(&v.key) {
                Some(&x) => {
                    if x < v.lower || x > v.upper {
                        out.push(format!("domain of {}", v.key));
                    }
                    dense.push(x);
                }
                None => {
                    out.push(format!("missing value for {}", v.key));
                    dense.push(0);
                }
            }
        }
        if !out.is_empty() {
            return out;
        }
        out.extend(
            self.constraints
                .iter()
                .filter(|c| !c.is_satisfied(&dense))
                .map(|c| c.label.clone()),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(job: &str, resource: &str) -> VarKey {
        VarKey::Start {
            job: job.into(),
            resource: resource.into(),
        }
    }

    #[test]
    fn test_new_model_has_makespan() {
        let model = Model::new("m", 12);
        assert_eq!(model.variable_count(), 1);
        let ms = model.variable(model.makespan_var()).unwrap();
        assert_eq!(ms.key, VarKey::Makespan);
        assert_eq!((ms.lower, ms.upper), (0, 12));
    }

    #[test]
    fn test_binary_domain_forced() {
        let mut model = Model::new("m", 10);
        let key = VarKey::Precedes {
            first: "A".into(),
            second: "B".into(),
            resource: "R".into(),
        };
        let y = model.add_variable(key.clone(), VarKind::Binary, -5, 9);
        let var = model.variable(y).unwrap();
        assert_eq!((var.lower, var.upper), (0, 1));
        assert_eq!(model.add_variable(key, VarKind::Binary, 0, 1), y);
    }

    #[test]
    fn test_validate_rejects_unknown_variable() {
        let mut model = Model::new("m", 10);
        model.add_constraint("bad", ConstraintKind::Precedence, vec![(VarId(7), 1)], 0);
        assert!(matches!(
            model.validate(),
            Err(ScheduleError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_label() {
        let mut model = Model::new("m", 10);
        let ms = model.makespan_var();
        model.add_constraint("c", ConstraintKind::Makespan, vec![(ms, 1)], 0);
        model.add_constraint("c", ConstraintKind::Makespan, vec![(ms, 1)], 1);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_violations() {
        let mut model = Model::new("m", 10);
        let x = model.add_variable(start("A", "R1"), VarKind::Integer, 0, 7);
        let ms = model.makespan_var();
        model.add_constraint("makespan_A", ConstraintKind::Makespan, vec![(ms, 1), (x, -1)], 3);

        let mut values = FxHashMap::default();
        values.insert(VarKey::Makespan, 5);
        values.insert(start("A", "R1"), 2);
        assert!(model.violations(&values).is_empty());

        values.insert(VarKey::Makespan, 4);
        assert_eq!(model.violations(&values), vec!["makespan_A".to_string()]);

        values.insert(start("A", "R1"), 8);
        assert!(model.violations(&values)[0].starts_with("domain of"));

        values.remove(&VarKey::Makespan);
        assert!(model.violations(&values)[0].starts_with("missing value"));
    }

    #[test]
    fn test_keyed_and_dense_values() {
        let mut model = Model::new("m", 10);
        model.add_variable(start("A", "R1"), VarKind::Integer, 0, 7);
        let keyed = model.keyed_values(&[6, 1]);
        assert_eq!(keyed[&VarKey::Makespan], 6);
        assert_eq!(model.dense_values(&keyed), Some(vec![6, 1]));

        let mut partial = keyed.clone();
        partial.remove(&start("A", "R1"));
        assert_eq!(model.dense_values(&partial), None);
    }

    #[test]
    fn test_var_key_display() {
        assert_eq!(start("A", "R1").to_string(), "start[A, R1]");
        assert_eq!(VarKey::Makespan.to_string(), "makespan");
    }
}
