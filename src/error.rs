//! Error taxonomy.
//!
//! Mutation errors (`InvalidDuration`, `InvalidPosition`, `NotFound`,
//! `DuplicateJob`) are local: the instance is left unchanged.
//! `IncompleteSolution` signals a backend contract violation and is fatal.
//!
//! Infeasibility and time-limit hits are *not* errors. They are reported
//! through [`SolveStatus`](crate::solver::SolveStatus) and the
//! `feasible` / `time_limit_reached` flags of a result.

use thiserror::Error;

use crate::validation::ValidationError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Errors raised by the scheduling engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// An operation was given a negative duration.
    #[error("duration {duration} must be non-negative")]
    InvalidDuration { duration: i64 },

    /// An explicit position lies outside the job's route.
    #[error("position {position} is out of range for job '{job}' with {len} operations")]
    InvalidPosition {
        job: String,
        position: usize,
        len: usize,
    },

    /// A job, resource, or operation lookup failed.
    #[error("{0} not found")]
    NotFound(String),

    /// `add_job` was called for a job that is already registered.
    #[error("job '{0}' already in instance")]
    DuplicateJob(String),

    /// A backend reported a feasible result without a value for an operation.
    #[error("feasible solution is missing a start time for job '{job}' on resource '{resource}'")]
    IncompleteSolution { job: String, resource: String },

    /// The selected strategy cannot handle this instance.
    #[error("strategy '{strategy}' is not applicable: {reason}")]
    UnsupportedStrategy {
        strategy: &'static str,
        reason: String,
    },

    /// A backend was handed the wrong kind of input.
    #[error("backend '{backend}' expects {expected} input")]
    UnsupportedInput {
        backend: &'static str,
        expected: &'static str,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The instance failed structural validation.
    #[error("invalid instance: {}", summarize(.0))]
    InvalidInstance(Vec<ValidationError>),

    /// The model references undefined variables or is otherwise malformed.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A backend failed for reasons other than infeasibility.
    #[error("solver '{backend}' failed: {message}")]
    Solver {
        backend: &'static str,
        message: String,
    },
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ScheduleError {
    pub(crate) fn job_not_found(job: &str) -> Self {
        Self::NotFound(format!("job '{job}'"))
    }

    pub(crate) fn resource_not_found(resource: &str) -> Self {
        Self::NotFound(format!("resource '{resource}'"))
    }
}
