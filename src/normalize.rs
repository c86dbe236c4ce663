//! Raw result → canonical [`Schedule`].
//!
//! Start times come from the result's `Start` values when present, and
//! otherwise from the permutation outcome as `finish - duration`. An
//! infeasible result normalizes to an empty schedule.

use crate::error::{Result, ScheduleError};
use crate::models::{Instance, Schedule, ScheduleRow};
use crate::solver::RawResult;

/// Maps `raw` onto `instance`, one row per operation in job order.
///
/// Fails with [`ScheduleError::IncompleteSolution`] if a feasible result
/// has no start for some operation.
pub fn normalize(raw: &RawResult, instance: &Instance) -> Result<Schedule> {
    let mut schedule = Schedule::new();
    if !raw.feasible {
        return Ok(schedule);
    }

    for (j, (job, route)) in instance.routes().enumerate() {
        for (position, op) in route.iter().enumerate() {
            let start = raw
                .start(job, &op.resource)
                .or_else(|| {
                    raw.permutation
                        .as_ref()
                        .and_then(|p| p.finish_of(j, &op.resource))
                        .map(|finish| finish - op.duration)
                })
                .ok_or_else(|| ScheduleError::IncompleteSolution {
                    job: job.to_string(),
                    resource: op.resource.clone(),
                })?;
            schedule.push(ScheduleRow::new(
                job,
                j,
                op.resource.clone(),
                position,
                op.duration,
                start,
            ));
        }
    }
    Ok(schedule)
}
