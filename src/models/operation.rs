//! Operation (task) model.
//!
//! An operation is the smallest schedulable unit of work: one job occupies
//! exactly one resource for a fixed, non-preemptible duration.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 2

use serde::{Deserialize, Serialize};

/// A single processing step of a job on one resource.
///
/// Owned by its job's route inside an [`Instance`](super::Instance);
/// resource-indexed views only borrow it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// Owning job identifier.
    pub job: String,
    /// Resource (machine) the operation runs on.
    pub resource: String,
    /// Processing time in time units. Never negative inside an instance.
    pub duration: i64,
}

impl Operation {
    /// Creates a new operation.
    pub fn new(job: impl Into<String>, resource: impl Into<String>, duration: i64) -> Self {
        Self {
            job: job.into(),
            resource: resource.into(),
            duration,
        }
    }

    /// End time if the operation starts at `start`.
    #[inline]
    pub fn finish_from(&self, start: i64) -> i64 {
        start + self.duration
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{job: {}, resource: {}, duration: {}}}",
            self.job, self.resource, self.duration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_new() {
        let op = Operation::new("J1", "M2", 7);
        assert_eq!(op.job, "J1");
        assert_eq!(op.resource, "M2");
        assert_eq!(op.duration, 7);
        assert_eq!(op.finish_from(3), 10);
    }

    #[test]
    fn test_operation_display() {
        let op = Operation::new("0", "press", 4);
        assert_eq!(op.to_string(), "{job: 0, resource: press, duration: 4}");
    }
}
