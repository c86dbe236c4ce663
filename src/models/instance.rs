//! Scheduling instance (problem data).
//!
//! An instance registers jobs and resources and owns each job's route:
//! the ordered sequence of operations the job must execute. Route order
//! encodes process precedence.
//!
//! Instances are built incrementally by a loader and treated as read-only
//! once handed to the bound estimator, model builder, or a solver backend.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 1-2

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use super::Operation;
use crate::error::{Result, ScheduleError};

/// A job-shop / flow-shop scheduling instance.
///
/// Jobs and resources keep their registration order; a job's index is its
/// registration position.
///
/// # Example
/// ```
/// use u_jobshop::models::Instance;
///
/// let mut instance = Instance::new();
/// instance.add_operation("A", "R1", 3, None).unwrap();
/// instance.add_operation("A", "R2", 2, None).unwrap();
/// instance.add_operation("B", "R1", 2, None).unwrap();
///
/// assert_eq!(instance.job_count(), 2);
/// assert_eq!(instance.resource_count(), 2);
/// assert_eq!(instance.total_job_duration("A").unwrap(), 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InstanceData", into = "InstanceData")]
pub struct Instance {
    jobs: Vec<String>,
    resources: Vec<String>,
    routes: Vec<Vec<Operation>>,
    job_lookup: FxHashMap<String, usize>,
    resource_lookup: FxHashMap<String, usize>,
}

/// Flow-shop view of an instance: one shared resource order for all jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowShopMatrix {
    /// Resource order visited by every job.
    pub resources: Vec<String>,
    /// Job indices (into [`Instance::jobs`]) that have operations.
    pub jobs: Vec<usize>,
    /// `durations[m][j]`: processing time of `jobs[j]` on `resources[m]`.
    pub durations: Vec<Vec<i64>>,
}

impl FlowShopMatrix {
    /// Number of machines (stages).
    pub fn machine_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of jobs with operations.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

impl Instance {
    /// Creates an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an instance from `(job, [(resource, duration), ...])` routes.
    ///
    /// Routes are appended in iteration order.
    pub fn from_routes<I, J, R, S>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (J, R)>,
        J: Into<String>,
        R: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut instance = Self::new();
        for (job, steps) in routes {
            let job = job.into();
            if !instance.contains_job(&job) {
                instance.add_job(job.clone())?;
            }
            for (resource, duration) in steps {
                instance.add_operation(job.clone(), resource, duration, None)?;
            }
        }
        Ok(instance)
    }

    /// Registers a job with an empty route.
    ///
    /// Returns the job index. Fails if the job already exists.
    pub fn add_job(&mut self, job: impl Into<String>) -> Result<usize> {
        let job = job.into();
        if self.job_lookup.contains_key(&job) {
            return Err(ScheduleError::DuplicateJob(job));
        }
        let index = self.jobs.len();
        self.job_lookup.insert(job.clone(), index);
        self.jobs.push(job);
        self.routes.push(Vec::new());
        Ok(index)
    }

    /// Registers a resource. Idempotent; returns the resource index.
    pub fn add_resource(&mut self, resource: impl Into<String>) -> usize {
        let resource = resource.into();
        if let Some(&index) = self.resource_lookup.get(&resource) {
            return index;
        }
        let index = self.resources.len();
        self.resource_lookup.insert(resource.clone(), index);
        self.resources.push(resource);
        index
    }

    /// Adds an operation to a job's route.
    ///
    /// Unknown jobs and resources are registered on the fly. With
    /// `position = None` the operation is appended; otherwise it is inserted
    /// at `position`, shifting later operations back.
    ///
    /// Returns the position the operation ended up at. On error the
    /// instance is left untouched.
    pub fn add_operation(
        &mut self,
        job: impl Into<String>,
        resource: impl Into<String>,
        duration: i64,
        position: Option<usize>,
    ) -> Result<usize> {
        let job = job.into();
        let resource = resource.into();

        if duration < 0 {
            return Err(ScheduleError::InvalidDuration { duration });
        }

        let len = self
            .job_lookup
            .get(&job)
            .map_or(0, |&idx| self.routes[idx].len());
        let position = position.unwrap_or(len);
        if position > len {
            return Err(ScheduleError::InvalidPosition { job, position, len });
        }

        self.add_resource(resource.clone());
        let job_idx = match self.job_lookup.get(&job) {
            Some(&idx) => idx,
            None => self.add_job(job.clone())?,
        };

        self.routes[job_idx].insert(position, Operation::new(job, resource, duration));
        Ok(position)
    }

    /// Removes and returns the operation at `position` in `job`'s route.
    pub fn remove_operation(&mut self, job: &str, position: usize) -> Result<Operation> {
        let idx = self.require_job(job)?;
        let route = &mut self.routes[idx];
        if position >= route.len() {
            return Err(ScheduleError::NotFound(format!(
                "operation {position} of job '{job}'"
            )));
        }
        Ok(route.remove(position))
    }

    /// Removes a job and returns its route.
    ///
    /// Resources stay registered even if no operation uses them anymore.
    pub fn remove_job(&mut self, job: &str) -> Result<Vec<Operation>> {
        let idx = self.require_job(job)?;
        self.jobs.remove(idx);
        let route = self.routes.remove(idx);
        self.job_lookup = self
            .jobs
            .iter()
            .enumerate()
            .map(|(i, j)| (j.clone(), i))
            .collect();
        Ok(route)
    }

    /// Registered jobs in registration order.
    pub fn jobs(&self) -> &[String] {
        &self.jobs
    }

    /// Registered resources in registration order.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Index of a job, if registered.
    pub fn job_index(&self, job: &str) -> Option<usize> {
        self.job_lookup.get(job).copied()
    }

    /// Index of a resource, if registered.
    pub fn resource_index(&self, resource: &str) -> Option<usize> {
        self.resource_lookup.get(resource).copied()
    }

    /// Whether the job is registered.
    pub fn contains_job(&self, job: &str) -> bool {
        self.job_lookup.contains_key(job)
    }

    /// Whether the resource is registered.
    pub fn contains_resource(&self, resource: &str) -> bool {
        self.resource_lookup.contains_key(resource)
    }

    /// Ordered route of a job.
    pub fn operations_of_job(&self, job: &str) -> Result<&[Operation]> {
        let idx = self.require_job(job)?;
        Ok(&self.routes[idx])
    }

    /// Route of the job at `index`. Empty for out-of-range indices.
    pub fn route(&self, index: usize) -> &[Operation] {
        self.routes.get(index).map_or(&[], Vec::as_slice)
    }

    /// Iterates `(job, route)` pairs in job order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &[Operation])> {
        self.jobs
            .iter()
            .zip(&self.routes)
            .map(|(job, route)| (job.as_str(), route.as_slice()))
    }

    /// All operations, job by job.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.routes.iter().flatten()
    }

    /// The operation of `job` on `resource`.
    pub fn operation_on(&self, job: &str, resource: &str) -> Result<&Operation> {
        let position = self.position_on(job, resource)?;
        Ok(&self.routes[self.require_job(job)?][position])
    }

    /// Position of `job`'s operation on `resource` within its route.
    pub fn position_on(&self, job: &str, resource: &str) -> Result<usize> {
        let idx = self.require_job(job)?;
        if !self.contains_resource(resource) {
            return Err(ScheduleError::resource_not_found(resource));
        }
        self.routes[idx]
            .iter()
            .position(|op| op.resource == resource)
            .ok_or_else(|| {
                ScheduleError::NotFound(format!("operation of job '{job}' on '{resource}'"))
            })
    }

    /// All operations that run on `resource`, in job order.
    pub fn operations_on_resource(&self, resource: &str) -> Result<Vec<&Operation>> {
        if !self.contains_resource(resource) {
            return Err(ScheduleError::resource_not_found(resource));
        }
        Ok(self
            .operations()
            .filter(|op| op.resource == resource)
            .collect())
    }

    /// The final operation of every non-empty job.
    pub fn last_operations(&self) -> Vec<&Operation> {
        self.routes.iter().filter_map(|r| r.last()).collect()
    }

    /// Total processing time of a job.
    pub fn total_job_duration(&self, job: &str) -> Result<i64> {
        Ok(self.operations_of_job(job)?.iter().map(|op| op.duration).sum())
    }

    /// Longest job (sum of its durations). 0 for an instance without jobs.
    pub fn max_job_duration(&self) -> i64 {
        self.routes
            .iter()
            .map(|r| r.iter().map(|op| op.duration).sum::<i64>())
            .max()
            .unwrap_or(0)
    }

    /// Sum of every duration: the makespan of running all operations serially.
    pub fn sum_of_all_durations(&self) -> i64 {
        self.operations().map(|op| op.duration).sum()
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of registered resources.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of operations across all jobs.
    pub fn operation_count(&self) -> usize {
        self.routes.iter().map(Vec::len).sum()
    }

    /// Whether the instance has no operations at all.
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Start-time window of the operation at `position` in `job`'s route.
    ///
    /// `earliest` is the total duration of the preceding operations;
    /// `latest` is `makespan_bound` minus the duration of the operation and
    /// of everything after it. `latest < earliest` means the bound is too
    /// tight for this job.
    pub fn task_time_bounds(
        &self,
        job: &str,
        position: usize,
        makespan_bound: i64,
    ) -> Result<(i64, i64)> {
        let route = self.operations_of_job(job)?;
        let op = route.get(position).ok_or_else(|| {
            ScheduleError::NotFound(format!("operation {position} of job '{job}'"))
        })?;
        let before: i64 = route[..position].iter().map(|o| o.duration).sum();
        let after: i64 = route[position + 1..].iter().map(|o| o.duration).sum();
        Ok((before, makespan_bound - after - op.duration))
    }

    /// Whether every job with operations follows the same resource sequence.
    pub fn is_flow_shop(&self) -> bool {
        let mut sequences = self.routes.iter().filter(|r| !r.is_empty());
        let Some(first) = sequences.next() else {
            return true;
        };
        sequences.all(|route| {
            route.len() == first.len()
                && route
                    .iter()
                    .zip(first)
                    .all(|(a, b)| a.resource == b.resource)
        })
    }

    /// Flow-shop duration matrix, or `None` for job-shop instances.
    pub fn flow_shop_matrix(&self) -> Option<FlowShopMatrix> {
        if !self.is_flow_shop() {
            return None;
        }
        let jobs: Vec<usize> = (0..self.routes.len())
            .filter(|&j| !self.routes[j].is_empty())
            .collect();
        let resources: Vec<String> = jobs
            .first()
            .map(|&j| self.routes[j].iter().map(|op| op.resource.clone()).collect())
            .unwrap_or_default();
        let durations = (0..resources.len())
            .map(|m| jobs.iter().map(|&j| self.routes[j][m].duration).collect())
            .collect();
        Some(FlowShopMatrix {
            resources,
            jobs,
            durations,
        })
    }

    /// Order-sensitive content hash of jobs, resources, and routes.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.jobs.hash(&mut hasher);
        self.resources.hash(&mut hasher);
        self.routes.hash(&mut hasher);
        hasher.finish()
    }

    fn require_job(&self, job: &str) -> Result<usize> {
        self.job_index(job)
            .ok_or_else(|| ScheduleError::job_not_found(job))
    }
}

/// Serialized form of an [`Instance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceData {
    #[serde(default)]
    resources: Vec<String>,
    jobs: Vec<JobData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobData {
    id: String,
    #[serde(default)]
    operations: Vec<RouteStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RouteStep {
    resource: String,
    duration: i64,
}

impl TryFrom<InstanceData> for Instance {
    type Error = ScheduleError;

    fn try_from(data: InstanceData) -> Result<Self> {
        let mut instance = Instance::new();
        for resource in data.resources {
            instance.add_resource(resource);
        }
        for job in data.jobs {
            instance.add_job(job.id.clone())?;
            for step in job.operations {
                instance.add_operation(job.id.clone(), step.resource, step.duration, None)?;
            }
        }
        Ok(instance)
    }
}

impl From<Instance> for InstanceData {
    fn from(instance: Instance) -> Self {
        let jobs = instance
            .jobs
            .into_iter()
            .zip(instance.routes)
            .map(|(id, route)| JobData {
                id,
                operations: route
                    .into_iter()
                    .map(|op| RouteStep {
                        resource: op.resource,
                        duration: op.duration,
                    })
                    .collect(),
            })
            .collect();
        Self {
            resources: instance.resources,
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> Instance {
        Instance::from_routes([
            ("A", vec![("R1", 3), ("R2", 2)]),
            ("B", vec![("R1", 2), ("R2", 4)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_add_operation_registers_members() {
        let mut inst = Instance::new();
        inst.add_operation("J1", "M1", 5, None).unwrap();
        inst.add_operation("J1", "M2", 3, None).unwrap();

        assert!(inst.contains_job("J1"));
        assert!(inst.contains_resource("M1"));
        assert!(inst.contains_resource("M2"));
        assert_eq!(inst.operation_count(), 2);
        for op in inst.operations() {
            assert!(inst.contains_job(&op.job));
            assert!(inst.contains_resource(&op.resource));
        }
    }

    #[test]
    fn test_add_operation_at_position() {
        let mut inst = Instance::new();
        inst.add_operation("J1", "M1", 5, None).unwrap();
        inst.add_operation("J1", "M3", 1, None).unwrap();
        let pos = inst.add_operation("J1", "M2", 2, Some(1)).unwrap();
        assert_eq!(pos, 1);

        let resources: Vec<&str> = inst
            .operations_of_job("J1")
            .unwrap()
            .iter()
            .map(|op| op.resource.as_str())
            .collect();
        assert_eq!(resources, vec!["M1", "M2", "M3"]);
    }

    #[test]
    fn test_negative_duration_leaves_instance_unchanged() {
        let mut inst = Instance::new();
        let err = inst.add_operation("J1", "M1", -1, None).unwrap_err();
        assert_eq!(err, ScheduleError::InvalidDuration { duration: -1 });
        assert_eq!(inst.job_count(), 0);
        assert_eq!(inst.resource_count(), 0);
    }

    #[test]
    fn test_position_out_of_range() {
        let mut inst = Instance::new();
        inst.add_operation("J1", "M1", 1, None).unwrap();
        let err = inst.add_operation("J1", "M2", 1, Some(5)).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidPosition { position: 5, len: 1, .. }));
        assert!(!inst.contains_resource("M2"));

        let err = inst.add_operation("J2", "M1", 1, Some(1)).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidPosition { .. }));
        assert!(!inst.contains_job("J2"));
    }

    #[test]
    fn test_add_job_duplicate() {
        let mut inst = Instance::new();
        assert_eq!(inst.add_job("J1").unwrap(), 0);
        assert_eq!(
            inst.add_job("J1").unwrap_err(),
            ScheduleError::DuplicateJob("J1".into())
        );
    }

    #[test]
    fn test_remove_operation_and_job() {
        let mut inst = sample_instance();
        let op = inst.remove_operation("A", 0).unwrap();
        assert_eq!(op.resource, "R1");
        assert_eq!(inst.operations_of_job("A").unwrap().len(), 1);
        assert!(inst.remove_operation("A", 3).is_err());

        let route = inst.remove_job("A").unwrap();
        assert_eq!(route.len(), 1);
        assert!(!inst.contains_job("A"));
        assert_eq!(inst.job_index("B"), Some(0));
        assert_eq!(inst.resource_count(), 2);
        assert!(inst.remove_job("A").is_err());
    }

    #[test]
    fn test_operation_on() {
        let inst = sample_instance();
        let op = inst.operation_on("B", "R2").unwrap();
        assert_eq!(op.duration, 4);
        assert_eq!(inst.position_on("B", "R2").unwrap(), 1);

        let mut partial = sample_instance();
        partial.add_operation("C", "R1", 1, None).unwrap();
        assert!(matches!(
            partial.operation_on("C", "R2"),
            Err(ScheduleError::NotFound(_))
        ));
        assert!(inst.operation_on("Z", "R1").is_err());
        assert!(inst.operation_on("A", "R9").is_err());
    }

    #[test]
    fn test_duration_queries() {
        let inst = sample_instance();
        assert_eq!(inst.total_job_duration("A").unwrap(), 5);
        assert_eq!(inst.total_job_duration("B").unwrap(), 6);
        assert_eq!(inst.max_job_duration(), 6);
        assert_eq!(inst.sum_of_all_durations(), 11);
        assert_eq!(inst.job_count(), 2);
        assert_eq!(inst.resource_count(), 2);
        assert!(inst.total_job_duration("Z").is_err());
    }

    #[test]
    fn test_empty_instance_queries() {
        let inst = Instance::new();
        assert!(inst.is_empty());
        assert_eq!(inst.max_job_duration(), 0);
        assert_eq!(inst.sum_of_all_durations(), 0);
        assert!(inst.is_flow_shop());
        assert_eq!(inst.flow_shop_matrix().unwrap().job_count(), 0);
    }

    #[test]
    fn test_task_time_bounds() {
        let inst = Instance::from_routes([("J", vec![("M1", 2), ("M2", 3), ("M3", 4)])]).unwrap();
        // Middle operation: 2 before, 4 after, own duration 3.
        assert_eq!(inst.task_time_bounds("J", 1, 20).unwrap(), (2, 13));
        assert_eq!(inst.task_time_bounds("J", 0, 20).unwrap(), (0, 11));
        assert_eq!(inst.task_time_bounds("J", 2, 20).unwrap(), (5, 16));
        assert!(inst.task_time_bounds("J", 3, 20).is_err());
    }

    #[test]
    fn test_flow_shop_detection() {
        let flow = sample_instance();
        assert!(flow.is_flow_shop());
        let matrix = flow.flow_shop_matrix().unwrap();
        assert_eq!(matrix.resources, vec!["R1", "R2"]);
        assert_eq!(matrix.durations, vec![vec![3, 2], vec![2, 4]]);

        let job_shop = Instance::from_routes([
            ("A", vec![("R1", 3), ("R2", 2)]),
            ("B", vec![("R2", 2), ("R1", 4)]),
        ])
        .unwrap();
        assert!(!job_shop.is_flow_shop());
        assert!(job_shop.flow_shop_matrix().is_none());
    }

    #[test]
    fn test_fingerprint_is_content_sensitive() {
        let a = sample_instance();
        let b = sample_instance();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = sample_instance();
        c.add_operation("C", "R1", 1, None).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_serde_round_trip_through_validation() {
        let inst = sample_instance();
        let json = serde_json::to_string(&inst).unwrap();
        let back: Instance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inst);

        let bad = r#"{"jobs":[{"id":"J","operations":[{"resource":"M","duration":-2}]}]}"#;
        assert!(serde_json::from_str::<Instance>(bad).is_err());
    }
}
