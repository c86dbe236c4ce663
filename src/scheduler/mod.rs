//! Greedy dispatching, makespan bounds, and KPI evaluation.
//!
//! # Algorithm
//!
//! `GreedyDispatcher` uses a randomized earliest-start dispatching
//! heuristic. It is not optimal, but every run is feasible, which makes
//! the best of many runs a usable upper bound on the makespan
//! (`estimate_bound`).
//!
//! # KPI
//!
//! `ScheduleKpi` computes makespan, job completion times, and resource
//! utilization.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Baker & Trietsch (2019), "Principles of Sequencing and Scheduling"

mod bound;
mod greedy;
mod kpi;

pub use bound::{estimate_bound, estimate_bound_with_rng, BoundConfig};
pub use greedy::GreedyDispatcher;
pub use kpi::ScheduleKpi;
