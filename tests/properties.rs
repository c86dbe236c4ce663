use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use u_jobshop::analysis::{analyze_conflicts, sort_schedule, unscheduled_view, SortKey};
use u_jobshop::scheduler::{estimate_bound, BoundConfig, GreedyDispatcher};
use u_jobshop::solver::{ConstraintConfig, MilpConfig, PermutationConfig};
use u_jobshop::validation::validate_instance;
use u_jobshop::{
    Instance, Schedule, Scheduler, SchedulerConfig, SolveReport, SolveStatus,
    Strategy as SolveStrategy,
};

const RESOURCES: [&str; 4] = ["R1", "R2", "R3", "R4"];

/// Random instances: up to 5 jobs, each visiting distinct resources.
fn instance_strategy() -> impl Strategy<Value = Instance> {
    prop::collection::vec(
        prop::collection::vec((0..RESOURCES.len(), 1i64..8), 1..=RESOURCES.len()),
        1..=5,
    )
    .prop_map(|jobs| {
        let mut instance = Instance::new();
        for (j, steps) in jobs.into_iter().enumerate() {
            let job = format!("J{j}");
            let mut seen = [false; RESOURCES.len()];
            for (r, duration) in steps {
                if !std::mem::replace(&mut seen[r], true) {
                    instance
                        .add_operation(job.clone(), RESOURCES[r], duration, None)
                        .unwrap();
                }
            }
        }
        instance
    })
}

/// Small job-shops: up to 3 jobs over up to 3 resources, short durations.
fn small_job_shop() -> impl Strategy<Value = Instance> {
    prop::collection::vec(
        prop::collection::vec((0..3usize, 1i64..6), 1..=3),
        1..=3,
    )
    .prop_map(|jobs| {
        let mut instance = Instance::new();
        for (j, steps) in jobs.into_iter().enumerate() {
            let job = format!("J{j}");
            let mut seen = [false; 3];
            for (r, duration) in steps {
                if !std::mem::replace(&mut seen[r], true) {
                    instance
                        .add_operation(job.clone(), RESOURCES[r], duration, None)
                        .unwrap();
                }
            }
        }
        instance
    })
}

/// Flow-shops: every job visits the same resources in the same order.
fn small_flow_shop() -> impl Strategy<Value = Instance> {
    (1..=3usize, 1..=3usize).prop_flat_map(|(jobs, machines)| {
        prop::collection::vec(prop::collection::vec(1i64..6, machines), jobs).prop_map(
            move |rows| {
                let mut instance = Instance::new();
                for (j, durations) in rows.into_iter().enumerate() {
                    for (r, duration) in durations.into_iter().enumerate() {
                        instance
                            .add_operation(format!("J{j}"), RESOURCES[r], duration, None)
                            .unwrap();
                    }
                }
                instance
            },
        )
    })
}

fn solve_with(instance: &Instance, strategy: SolveStrategy) -> SolveReport {
    Scheduler::new(SchedulerConfig::default().with_strategy(strategy))
        .run(instance)
        .unwrap()
}

fn assert_precedence(schedule: &Schedule, instance: &Instance) -> Result<(), TestCaseError> {
    for job in instance.jobs() {
        let mut rows = schedule.rows_for_job(job);
        rows.sort_by_key(|r| r.position);
        for pair in rows.windows(2) {
            prop_assert!(pair[1].start >= pair[0].finish);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_generated_instances_are_valid(instance in instance_strategy()) {
        prop_assert!(validate_instance(&instance).is_ok());
        for op in instance.operations() {
            prop_assert!(instance.contains_job(&op.job));
            prop_assert!(instance.contains_resource(&op.resource));
        }
    }

    #[test]
    fn test_greedy_schedules_are_feasible(instance in instance_strategy(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let schedule = GreedyDispatcher::new(&instance).dispatch(&mut rng);
        prop_assert_eq!(schedule.len(), instance.operation_count());
        prop_assert_eq!(analyze_conflicts(&schedule).conflict_count(), 0);
        assert_precedence(&schedule, &instance)?;
    }

    #[test]
    fn test_bound_is_deterministic(instance in instance_strategy(), seed in any::<u64>()) {
        let config = BoundConfig::default().with_samples(10).with_seed(seed);
        let first = estimate_bound(&instance, &config).unwrap();
        prop_assert_eq!(first, estimate_bound(&instance, &config).unwrap());
        prop_assert!(first >= instance.max_job_duration());
    }

    #[test]
    fn test_sort_round_trip(instance in instance_strategy()) {
        let by_job = sort_schedule(&unscheduled_view(&instance), SortKey::Job);
        let by_start = sort_schedule(&by_job, SortKey::Start);
        prop_assert_eq!(by_start.len(), by_job.len());
        prop_assert_eq!(sort_schedule(&by_start, SortKey::Job), by_job);
    }

    #[test]
    fn test_conflicts_are_symmetric(instance in instance_strategy()) {
        let report = analyze_conflicts(&unscheduled_view(&instance));
        for &(i, j) in &report.pairs {
            prop_assert!(i < j);
            prop_assert!(report.rows[i].has_conflict);
            prop_assert!(report.rows[j].has_conflict);
            prop_assert_eq!(&report.rows[i].row.resource, &report.rows[j].row.resource);
        }
        let flagged = report.conflicting_rows().count();
        let mut in_pairs: Vec<usize> = report.pairs.iter().flat_map(|&(i, j)| [i, j]).collect();
        in_pairs.sort_unstable();
        in_pairs.dedup();
        prop_assert_eq!(flagged, in_pairs.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_exact_backends_agree(instance in small_job_shop()) {
        let constraint = solve_with(&instance, SolveStrategy::Constraint(ConstraintConfig::default()));
        let milp = solve_with(&instance, SolveStrategy::Milp(MilpConfig::default()));

        for report in [&constraint, &milp] {
            prop_assert!(report.feasible);
            prop_assert_eq!(report.status, SolveStatus::Optimal);
            prop_assert_eq!(report.schedule.len(), instance.operation_count());
            prop_assert_eq!(analyze_conflicts(&report.schedule).conflict_count(), 0);
            prop_assert!(report.makespan <= report.bound);
            prop_assert!(report.makespan >= instance.max_job_duration());
            assert_precedence(&report.schedule, &instance)?;
        }
        prop_assert_eq!(constraint.makespan, milp.makespan);
    }

    #[test]
    fn test_permutation_never_beats_milp(instance in small_flow_shop()) {
        prop_assert!(instance.is_flow_shop());
        let permutation = solve_with(
            &instance,
            SolveStrategy::Permutation(PermutationConfig::default().with_seed(7)),
        );
        let milp = solve_with(&instance, SolveStrategy::Milp(MilpConfig::default()));

        prop_assert!(permutation.feasible);
        prop_assert!(milp.feasible);
        prop_assert_eq!(milp.status, SolveStatus::Optimal);
        prop_assert_eq!(analyze_conflicts(&permutation.schedule).conflict_count(), 0);
        assert_precedence(&permutation.schedule, &instance)?;
        prop_assert!(permutation.makespan >= milp.makespan);
    }
}
