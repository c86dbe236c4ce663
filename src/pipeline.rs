//! End-to-end solve pipeline.
//!
//! validate → empty short-circuit → strategy applicability → cache lookup
//! → bound → model (model-consuming strategies only) → solve → normalize
//! → cache store.
//!
//! Infeasible results are returned as a report with `feasible = false`
//! and an empty schedule; time-limit hits set `time_limit_reached`.
//! Neither is an error, and a timed-out solve is never retried here.
//!
//! Only conclusive results are cached: a cancelled run or one that ended
//! with [`SolveStatus::Unknown`] is recomputed next time.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::cp::build_model;
use crate::error::{Result, ScheduleError};
use crate::models::{Instance, Schedule};
use crate::normalize::normalize;
use crate::scheduler::{estimate_bound, ScheduleKpi};
use crate::solver::{
    self, CacheKey, CachedSolve, InputKind, RawResult, SolveCache, SolveLimits, SolveStatus,
    SolverInput, StrategyKind,
};
use crate::validation::validate_instance;

/// Outcome of [`Scheduler::run`]. Every field is always populated.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    /// Canonical schedule (empty when infeasible).
    pub schedule: Schedule,
    /// Whether a feasible schedule was found.
    pub feasible: bool,
    /// Makespan of `schedule` (0 when empty).
    pub makespan: i64,
    /// Completion and utilization figures of `schedule`.
    pub kpi: ScheduleKpi,
    /// Makespan bound the model was sized with.
    pub bound: i64,
    /// Backend status.
    pub status: SolveStatus,
    /// Strategy used.
    pub strategy: StrategyKind,
    /// The solver stopped at its time limit.
    pub time_limit_reached: bool,
    /// The report was served from the cache.
    pub from_cache: bool,
}

/// Solves instances according to a [`SchedulerConfig`].
///
/// # Example
///
/// ```
/// use u_jobshop::config::SchedulerConfig;
/// use u_jobshop::models::Instance;
/// use u_jobshop::pipeline::Scheduler;
///
/// let instance = Instance::from_routes([
///     ("A", vec![("R1", 3), ("R2", 2)]),
///     ("B", vec![("R1", 2), ("R2", 4)]),
/// ]).unwrap();
///
/// let report = Scheduler::new(SchedulerConfig::default()).run(&instance).unwrap();
/// assert!(report.feasible);
/// assert_eq!(report.makespan, 8);
/// ```
#[derive(Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    cache: Option<Arc<dyn SolveCache>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("cache", &self.cache.as_ref().map(|c| c.len()))
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cache: None,
            cancel: None,
        }
    }

    /// Injects a solve cache.
    pub fn with_cache(mut self, cache: Arc<dyn SolveCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches a cancellation flag, checked by the solver while it runs.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Solves `instance`.
    pub fn run(&self, instance: &Instance) -> Result<SolveReport> {
        self.config.validate()?;
        validate_instance(instance).map_err(ScheduleError::InvalidInstance)?;
        let strategy = self.config.strategy.kind();

        if instance.is_empty() {
            debug!(target: "u_jobshop::pipeline", "instance has no operations");
            let schedule = Schedule::new();
            return Ok(SolveReport {
                kpi: ScheduleKpi::calculate(&schedule),
                schedule,
                feasible: true,
                makespan: 0,
                bound: 0,
                status: SolveStatus::Optimal,
                strategy,
                time_limit_reached: false,
                from_cache: false,
            });
        }

        if strategy == StrategyKind::Permutation && !instance.is_flow_shop() {
            return Err(ScheduleError::UnsupportedStrategy {
                strategy: strategy.as_str(),
                reason: "jobs visit resources in different orders".into(),
            });
        }

        let key = CacheKey::new(instance, &self.config);
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(target: "u_jobshop::pipeline", "cache hit for {key:?}");
            return self.report(&cached.raw, instance, cached.bound, true);
        }

        let bound = match self.config.max_makespan {
            Some(bound) => bound,
            None => estimate_bound(instance, &self.config.bound)?,
        };
        info!(
            target: "u_jobshop::pipeline",
            "solving {} jobs x {} resources with {strategy}, bound {bound}",
            instance.job_count(),
            instance.resource_count()
        );

        let mut limits = SolveLimits::new(self.config.time_limit());
        if let Some(flag) = &self.cancel {
            limits = limits.with_cancel_flag(flag.clone());
        }

        let raw = match strategy.input_kind() {
            InputKind::Model => {
                let model = build_model(instance, bound)?;
                info!(target: "u_jobshop::pipeline", "model: {}", model.stats());
                solver::solve(SolverInput::Model(&model), &self.config.strategy, &limits)?
            }
            InputKind::Instance => {
                solver::solve(SolverInput::Instance(instance), &self.config.strategy, &limits)?
            }
        };

        if !raw.feasible {
            warn!(
                target: "u_jobshop::pipeline",
                "no feasible schedule found (status {:?}, bound {bound})",
                raw.status
            );
        }
        if raw.time_limit_reached {
            info!(
                target: "u_jobshop::pipeline",
                "time limit of {} ms reached, using best result found",
                self.config.time_limit_ms
            );
        }

        let report = self.report(&raw, instance, bound, false)?;
        if let Some(cache) = &self.cache {
            if !raw.cancelled && raw.status != SolveStatus::Unknown {
                cache.put(key, CachedSolve { raw, bound });
            }
        }
        Ok(report)
    }

    fn report(
        &self,
        raw: &RawResult,
        instance: &Instance,
        bound: i64,
        from_cache: bool,
    ) -> Result<SolveReport> {
        let schedule = normalize(raw, instance)?;
        Ok(SolveReport {
            makespan: schedule.makespan(),
            kpi: ScheduleKpi::calculate(&schedule),
            schedule,
            feasible: raw.feasible,
            bound,
            status: raw.status,
            strategy: self.config.strategy.kind(),
            time_limit_reached: raw.time_limit_reached,
            from_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_conflicts;
    use crate::solver::{ConstraintConfig, MemoryCache, PermutationConfig, Strategy};
    use std::sync::atomic::Ordering;

    fn two_by_two() -> Instance {
        Instance::from_routes([
            ("A", vec![("R1", 3), ("R2", 2)]),
            ("B", vec![("R1", 2), ("R2", 4)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_run_default() {
        let report = Scheduler::new(SchedulerConfig::default())
            .run(&two_by_two())
            .unwrap();
        assert!(report.feasible);
        assert_eq!(report.makespan, 8);
        assert_eq!(report.bound, 12);
        assert_eq!(report.status, SolveStatus::Optimal);
        assert!(!report.from_cache);
        assert_eq!(analyze_conflicts(&report.schedule).conflict_count(), 0);
        assert_eq!(report.kpi.makespan, 8);
        assert!(report.kpi.meets_thresholds(8, 0.5));
    }

    #[test]
    fn test_explicit_bound_too_tight() {
        let config = SchedulerConfig::default().with_max_makespan(7);
        let report = Scheduler::new(config).run(&two_by_two()).unwrap();
        assert!(!report.feasible);
        assert_eq!(report.status, SolveStatus::Infeasible);
        assert!(report.schedule.is_empty());
        assert_eq!(report.makespan, 0);
        assert_eq!(report.bound, 7);
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = Arc::new(MemoryCache::default());
        let scheduler = Scheduler::new(SchedulerConfig::default()).with_cache(cache.clone());
        let first = scheduler.run(&two_by_two()).unwrap();
        assert!(!first.from_cache);
        assert_eq!(cache.len(), 1);

        let second = scheduler.run(&two_by_two()).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.schedule, first.schedule);
        assert_eq!(second.bound, first.bound);

        cache.invalidate(two_by_two().fingerprint());
        assert!(!scheduler.run(&two_by_two()).unwrap().from_cache);
    }

    #[test]
    fn test_shared_cache_separates_configurations() {
        let cache = Arc::new(MemoryCache::default());
        let tight = Scheduler::new(SchedulerConfig::default().with_max_makespan(7))
            .with_cache(cache.clone());
        let default = Scheduler::new(SchedulerConfig::default()).with_cache(cache.clone());

        assert!(!tight.run(&two_by_two()).unwrap().feasible);
        let report = default.run(&two_by_two()).unwrap();
        assert!(!report.from_cache);
        assert!(report.feasible);
        assert_eq!(report.bound, 12);
        assert_eq!(cache.len(), 2);

        assert!(tight.run(&two_by_two()).unwrap().from_cache);
        assert!(default.run(&two_by_two()).unwrap().from_cache);
    }

    #[test]
    fn test_inconclusive_result_not_cached() {
        let cache = Arc::new(MemoryCache::default());
        let starved = Scheduler::new(SchedulerConfig::default().with_strategy(
            Strategy::Constraint(ConstraintConfig::default().with_node_limit(1)),
        ))
        .with_cache(cache.clone());
        let report = starved.run(&two_by_two()).unwrap();
        assert_eq!(report.status, SolveStatus::Unknown);
        assert!(cache.is_empty());

        let report = Scheduler::new(SchedulerConfig::default())
            .with_cache(cache.clone())
            .run(&two_by_two())
            .unwrap();
        assert!(!report.from_cache);
        assert!(report.feasible);
    }

    #[test]
    fn test_cancelled_result_not_cached() {
        let cache = Arc::new(MemoryCache::default());
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Relaxed);
        let scheduler = Scheduler::new(SchedulerConfig::default())
            .with_cache(cache.clone())
            .with_cancel_flag(flag);
        let report = scheduler.run(&two_by_two()).unwrap();
        assert!(!report.feasible);
        assert_eq!(report.status, SolveStatus::Unknown);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_permutation_rejects_job_shop() {
        let inst = Instance::from_routes([
            ("A", vec![("R1", 3), ("R2", 2)]),
            ("B", vec![("R2", 2), ("R1", 4)]),
        ])
        .unwrap();
        let config = SchedulerConfig::default()
            .with_strategy(Strategy::Permutation(PermutationConfig::default()));
        let err = Scheduler::new(config).run(&inst).unwrap_err();
        assert!(matches!(err, ScheduleError::UnsupportedStrategy { .. }));
    }

    #[test]
    fn test_invalid_instance() {
        let inst = Instance::from_routes([("A", vec![("R1", 1), ("R1", 1)])]).unwrap();
        let err = Scheduler::new(SchedulerConfig::default()).run(&inst).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidInstance(_)));
    }
}
