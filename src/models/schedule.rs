//! Schedule (solution) model.
//!
//! A schedule is the canonical, backend-independent form of a solution:
//! one row per operation with its start and finish time. Rows keep the
//! order they were produced in; use [`crate::analysis::sort_schedule`]
//! for display orderings.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A complete schedule.
///
/// For a feasible schedule, rows of the same job are ordered by position
/// with `start[i] >= finish[i-1]`, and no two rows of the same resource
/// overlap in `[start, finish)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Operation rows.
    pub rows: Vec<ScheduleRow>,
}

/// One scheduled operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Job identifier.
    pub job: String,
    /// Job index in the originating instance (registration order).
    pub job_index: usize,
    /// Resource identifier.
    pub resource: String,
    /// Position of the operation within its job's route.
    pub position: usize,
    /// Processing time.
    pub duration: i64,
    /// Start time.
    pub start: i64,
    /// Finish time (`start + duration`).
    pub finish: i64,
}

impl ScheduleRow {
    /// Creates a row; `finish` is derived from `start + duration`.
    pub fn new(
        job: impl Into<String>,
        job_index: usize,
        resource: impl Into<String>,
        position: usize,
        duration: i64,
        start: i64,
    ) -> Self {
        Self {
            job: job.into(),
            job_index,
            resource: resource.into(),
            position,
            duration,
            start,
            finish: start + duration,
        }
    }

    /// Whether two rows occupy overlapping `[start, finish)` intervals.
    ///
    /// Zero-duration rows never overlap anything.
    #[inline]
    pub fn overlaps(&self, other: &ScheduleRow) -> bool {
        self.start.max(other.start) < self.finish.min(other.finish)
    }
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row.
    pub fn push(&mut self, row: ScheduleRow) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the schedule has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Makespan: latest finish across all rows (0 when empty).
    pub fn makespan(&self) -> i64 {
        self.rows.iter().map(|r| r.finish).max().unwrap_or(0)
    }

    /// The row for `job` on `resource`.
    pub fn row(&self, job: &str, resource: &str) -> Option<&ScheduleRow> {
        self.rows
            .iter()
            .find(|r| r.job == job && r.resource == resource)
    }

    /// Rows of a job, in schedule order.
    pub fn rows_for_job(&self, job: &str) -> Vec<&ScheduleRow> {
        self.rows.iter().filter(|r| r.job == job).collect()
    }

    /// Rows on a resource, in schedule order.
    pub fn rows_for_resource(&self, resource: &str) -> Vec<&ScheduleRow> {
        self.rows.iter().filter(|r| r.resource == resource).collect()
    }

    /// Completion time of a job (latest finish of its rows).
    pub fn job_completion_time(&self, job: &str) -> Option<i64> {
        self.rows
            .iter()
            .filter(|r| r.job == job)
            .map(|r| r.finish)
            .max()
    }

    /// Busy time of a resource divided by `horizon`.
    ///
    /// Returns `None` if `horizon` is not positive.
    pub fn resource_utilization(&self, resource: &str, horizon: i64) -> Option<f64> {
        if horizon <= 0 {
            return None;
        }
        let busy: i64 = self
            .rows
            .iter()
            .filter(|r| r.resource == resource)
            .map(|r| r.duration)
            .sum();
        Some(busy as f64 / horizon as f64)
    }

    /// Utilization of every resource that has rows, over the makespan.
    pub fn all_utilizations(&self) -> FxHashMap<String, f64> {
        let horizon = self.makespan();
        if horizon <= 0 {
            return FxHashMap::default();
        }
        let mut busy: FxHashMap<String, i64> = FxHashMap::default();
        for r in &self.rows {
            *busy.entry(r.resource.clone()).or_insert(0) += r.duration;
        }
        busy.into_iter()
            .map(|(id, b)| (id, b as f64 / horizon as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> Schedule {
        let mut s = Schedule::new();
        s.push(ScheduleRow::new("A", 0, "R1", 0, 3, 2));
        s.push(ScheduleRow::new("A", 0, "R2", 1, 2, 6));
        s.push(ScheduleRow::new("B", 1, "R1", 0, 2, 0));
        s.push(ScheduleRow::new("B", 1, "R2", 1, 4, 2));
        s
    }

    #[test]
    fn test_schedule_makespan() {
        assert_eq!(sample_schedule().makespan(), 8);
        assert_eq!(Schedule::new().makespan(), 0);
    }

    #[test]
    fn test_row_lookup() {
        let s = sample_schedule();
        let row = s.row("B", "R2").unwrap();
        assert_eq!((row.start, row.finish), (2, 6));
        assert!(s.row("C", "R1").is_none());
        assert_eq!(s.rows_for_job("A").len(), 2);
        assert_eq!(s.rows_for_resource("R1").len(), 2);
    }

    #[test]
    fn test_job_completion_time() {
        let s = sample_schedule();
        assert_eq!(s.job_completion_time("A"), Some(8));
        assert_eq!(s.job_completion_time("B"), Some(6));
        assert_eq!(s.job_completion_time("Z"), None);
    }

    #[test]
    fn test_overlaps() {
        let a = ScheduleRow::new("A", 0, "R", 0, 3, 0);
        let b = ScheduleRow::new("B", 1, "R", 0, 3, 3);
        let c = ScheduleRow::new("C", 2, "R", 0, 2, 2);
        let zero = ScheduleRow::new("D", 3, "R", 0, 0, 1);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(!a.overlaps(&zero));
    }

    #[test]
    fn test_utilization() {
        let s = sample_schedule();
        // R2: 2 + 4 busy over makespan 8
        let util = s.resource_utilization("R2", 8).unwrap();
        assert!((util - 0.75).abs() < 1e-10);
        assert!(s.resource_utilization("R2", 0).is_none());

        let all = s.all_utilizations();
        assert!((all["R1"] - 0.625).abs() < 1e-10);
    }
}
