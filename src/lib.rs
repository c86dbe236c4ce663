//! Job-shop scheduling with pluggable solver backends.
//!
//! Builds a constraint model from a job/resource instance, solves it for
//! minimum makespan, and returns a conflict-checked schedule.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Instance`, `Operation`, `Schedule`, `ScheduleRow`
//! - **`validation`**: Input integrity checks (repeated resources, dangling references)
//! - **`scheduler`**: Randomized greedy dispatching, makespan bound estimation, KPIs
//! - **`cp`**: Disjunctive (big-M) constraint model and its builder
//! - **`solver`**: Backends (constraint search, flow-shop permutation, MILP),
//!   time limits, and the solve cache
//! - **`normalize`**: Backend output → canonical `Schedule`
//! - **`analysis`**: Conflict detection and display orderings
//! - **`config`** / **`pipeline`**: End-to-end `Scheduler`
//!
//! # Example
//!
//! ```
//! use u_jobshop::{Instance, Scheduler, SchedulerConfig, analyze_conflicts};
//!
//! let instance = Instance::from_routes([
//!     ("A", vec![("R1", 3), ("R2", 2)]),
//!     ("B", vec![("R1", 2), ("R2", 4)]),
//! ]).unwrap();
//!
//! let report = Scheduler::new(SchedulerConfig::default()).run(&instance).unwrap();
//! assert_eq!(report.makespan, 8);
//! assert!(!analyze_conflicts(&report.schedule).has_conflicts());
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Manne (1960), "On the Job-Shop Scheduling Problem"
//! - Nawaz, Enscore & Ham (1983), "A heuristic algorithm for the m-machine, n-job flow-shop sequencing problem"

pub mod analysis;
pub mod config;
pub mod cp;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod solver;
pub mod validation;

pub use analysis::{analyze_conflicts, sort_schedule, unscheduled_view, ConflictReport, SortKey};
pub use config::SchedulerConfig;
pub use error::{Result, ScheduleError};
pub use models::{Instance, Operation, Schedule, ScheduleRow};
pub use pipeline::{Scheduler, SolveReport};
pub use solver::{SolveStatus, Strategy, StrategyKind};
