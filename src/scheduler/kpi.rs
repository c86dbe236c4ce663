//! Schedule quality metrics (KPIs).
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan (C_max) | Latest completion time |
//! | Job completion (C_j) | Latest finish of each job's operations |
//! | Total completion | Sum of C_j |
//! | Utilization | Busy time / makespan, per resource |
//! | Avg Utilization | Mean over resources that have operations |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::Schedule;

/// Schedule performance indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleKpi {
    /// Makespan: latest completion time.
    pub makespan: i64,
    /// Completion time per job.
    pub completion_by_job: FxHashMap<String, i64>,
    /// Sum of job completion times.
    pub total_completion: i64,
    /// Average resource utilization (0.0..1.0).
    pub avg_utilization: f64,
    /// Per-resource utilization.
    pub utilization_by_resource: FxHashMap<String, f64>,
}

impl ScheduleKpi {
    /// Computes KPIs from a schedule.
    pub fn calculate(schedule: &Schedule) -> Self {
        let mut completion_by_job: FxHashMap<String, i64> = FxHashMap::default();
        for row in &schedule.rows {
            let entry = completion_by_job.entry(row.job.clone()).or_insert(row.finish);
            *entry = (*entry).max(row.finish);
        }
        let total_completion = completion_by_job.values().sum();

        let utilization_by_resource = schedule.all_utilizations();
        let avg_utilization = if utilization_by_resource.is_empty() {
            0.0
        } else {
            let sum: f64 = utilization_by_resource.values().sum();
            sum / utilization_by_resource.len() as f64
        };

        Self {
            makespan: schedule.makespan(),
            completion_by_job,
            total_completion,
            avg_utilization,
            utilization_by_resource,
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: i64, min_utilization: f64) -> bool {
        self.makespan <= max_makespan && self.avg_utilization >= min_utilization
    }
}
