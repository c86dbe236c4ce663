//! Conflict analysis and display orderings.
//!
//! # Conflicts
//!
//! Rows are grouped by resource and every pair within a group is tested
//! with `max(start_i, start_j) < min(finish_i, finish_j)`. All pairs are
//! checked, not only neighbours after sorting, because durations vary.
//! O(k²) per resource with k rows on it.
//!
//! # Orderings
//!
//! [`sort_schedule`] returns a reordered copy; the input is never mutated.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::{Instance, Schedule, ScheduleRow};

/// A schedule row annotated with its conflict flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRow {
    /// The scheduled operation.
    #[serde(flatten)]
    pub row: ScheduleRow,
    /// Whether the row overlaps another row on the same resource.
    pub has_conflict: bool,
}

/// Result of [`analyze_conflicts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Rows in schedule order.
    pub rows: Vec<ConflictRow>,
    /// Overlapping row pairs `(i, j)` with `i < j`, indices into `rows`.
    pub pairs: Vec<(usize, usize)>,
}

impl ConflictReport {
    /// Number of overlapping pairs.
    pub fn conflict_count(&self) -> usize {
        self.pairs.len()
    }

    /// Whether any row conflicts.
    pub fn has_conflicts(&self) -> bool {
        !self.pairs.is_empty()
    }

    /// Rows flagged as conflicting.
    pub fn conflicting_rows(&self) -> impl Iterator<Item = &ConflictRow> {
        self.rows.iter().filter(|r| r.has_conflict)
    }
}

/// Detects pairwise resource overlaps.
///
/// Symmetric: if row A conflicts with row B, both are flagged.
pub fn analyze_conflicts(schedule: &Schedule) -> ConflictReport {
    let mut groups: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for (i, row) in schedule.rows.iter().enumerate() {
        groups.entry(row.resource.as_str()).or_default().push(i);
    }

    let mut flags = vec![false; schedule.rows.len()];
    let mut pairs = Vec::new();
    for members in groups.values() {
        for (a, &i) in members.iter().enumerate() {
            for &j in &members[a + 1..] {
                if schedule.rows[i].overlaps(&schedule.rows[j]) {
                    flags[i] = true;
                    flags[j] = true;
                    pairs.push((i, j));
                }
            }
        }
    }
    pairs.sort_unstable();

    ConflictReport {
        rows: schedule
            .rows
            .iter()
            .cloned()
            .zip(flags)
            .map(|(row, has_conflict)| ConflictRow { row, has_conflict })
            .collect(),
        pairs,
    }
}

/// Display ordering for [`sort_schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Job index ascending, then route position.
    Job,
    /// Start time ascending; ties keep their current order.
    Start,
}

/// Returns a copy of `schedule` sorted by `key`.
pub fn sort_schedule(schedule: &Schedule, key: SortKey) -> Schedule {
    let mut rows = schedule.rows.clone();
    match key {
        SortKey::Job => rows.sort_by_key(|r| (r.job_index, r.position)),
        SortKey::Start => rows.sort_by_key(|r| r.start),
    }
    Schedule { rows }
}

/// Every job at its earliest precedence-only start times, ignoring
/// resource exclusivity.
///
/// Running [`analyze_conflicts`] on this view shows the overlaps a solver
/// has to resolve.
pub fn unscheduled_view(instance: &Instance) -> Schedule {
    let mut schedule = Schedule::new();
    for (j, (job, route)) in instance.routes().enumerate() {
        let mut t = 0;
        for (position, op) in route.iter().enumerate() {
            let row = ScheduleRow::new(job, j, op.resource.clone(), position, op.duration, t);
            t = row.finish;
            schedule.push(row);
        }
    }
    schedule
}
