//! Disjunctive (big-M) scheduling formulation.
//!
//! Converts an [`Instance`](crate::models::Instance) plus a makespan bound
//! into a backend-agnostic [`Model`]: integer start variables, binary
//! ordering variables, and linear precedence, disjunctive, and makespan
//! constraints with a minimize-makespan objective.
//!
//! The model has `O(jobs² × resources)` disjunctive constraints and
//! `O(jobs × operations per job)` precedence constraints.
//!
//! # Reference
//! - Manne (1960), "On the Job-Shop Scheduling Problem"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

mod builder;
mod model;

pub use builder::{build_model, ModelBuilder};
pub use model::{
    ConstraintKind, LinearConstraint, Model, ModelStats, VarId, VarKey, VarKind, Variable,
};
