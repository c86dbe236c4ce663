//! Randomized greedy dispatcher.
//!
//! # Algorithm
//!
//! Event-driven earliest-start dispatching:
//! 1. For every unfinished job, its next operation can start at
//!    `max(job_ready, resource_free)`.
//! 2. Among the jobs achieving the minimum start, pick one uniformly at
//!    random and schedule its next operation there.
//! 3. Advance that job's cursor and the resource's free time; repeat.
//!
//! Every run yields a feasible (generally non-optimal) schedule. The only
//! source of randomness is the injected RNG, so runs are reproducible.
//!
//! # Complexity
//! O(n * J) per run where n = operations, J = jobs.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use rand::Rng;

use crate::models::{Instance, Schedule, ScheduleRow};

/// Greedy dispatcher over an [`Instance`].
///
/// # Example
///
/// ```
/// use rand::{rngs::StdRng, SeedableRng};
/// use u_jobshop::models::Instance;
/// use u_jobshop::scheduler::GreedyDispatcher;
///
/// let instance = Instance::from_routes([
///     ("A", vec![("R1", 3), ("R2", 2)]),
///     ("B", vec![("R1", 2), ("R2", 4)]),
/// ]).unwrap();
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let schedule = GreedyDispatcher::new(&instance).dispatch(&mut rng);
/// assert_eq!(schedule.len(), 4);
/// assert!(schedule.makespan() >= 8);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GreedyDispatcher<'a> {
    instance: &'a Instance,
}

impl<'a> GreedyDispatcher<'a> {
    /// Creates a dispatcher for `instance`.
    pub fn new(instance: &'a Instance) -> Self {
        Self { instance }
    }

    /// Runs one randomized dispatch and returns the full schedule.
    pub fn dispatch<R: Rng + ?Sized>(&self, rng: &mut R) -> Schedule {
        let mut schedule = Schedule::new();
        self.run(rng, |row| schedule.push(row));
        schedule
    }

    /// Runs one randomized dispatch and returns only its makespan.
    pub fn makespan<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let mut makespan = 0;
        self.run(rng, |row| makespan = makespan.max(row.finish));
        makespan
    }

    fn run<R: Rng + ?Sized>(&self, rng: &mut R, mut emit: impl FnMut(ScheduleRow)) {
        let instance = self.instance;
        let job_count = instance.job_count();
        let mut cursor = vec![0usize; job_count];
        let mut job_ready = vec![0i64; job_count];
        let mut resource_free = vec![0i64; instance.resource_count()];
        let mut tied: Vec<usize> = Vec::with_capacity(job_count);

        loop {
            let mut best = i64::MAX;
            tied.clear();
            for j in 0..job_count {
                let Some(op) = instance.route(j).get(cursor[j]) else {
                    continue;
                };
                let r = self.resource_slot(&op.resource);
                let start = job_ready[j].max(resource_free[r]);
                if start < best {
                    best = start;
                    tied.clear();
                }
                if start == best {
                    tied.push(j);
                }
            }
            if tied.is_empty() {
                break;
            }

            let j = tied[rng.random_range(0..tied.len())];
            let position = cursor[j];
            let op = &instance.route(j)[position];
            let row = ScheduleRow::new(
                op.job.clone(),
                j,
                op.resource.clone(),
                position,
                op.duration,
                best,
            );
            resource_free[self.resource_slot(&op.resource)] = row.finish;
            job_ready[j] = row.finish;
            cursor[j] += 1;
            emit(row);
        }
    }

    fn resource_slot(&self, resource: &str) -> usize {
        // Routes only reference registered resources.
        self.instance.resource_index(resource).unwrap_or_default()
    }
}
