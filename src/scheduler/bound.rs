//! Makespan upper-bound estimation.
//!
//! Runs the [`GreedyDispatcher`] `samples` times with independent random
//! tie-breaking, keeps the best makespan, and scales it by a safety
//! multiplier. The result only sizes variable domains; the model's
//! makespan constraint enforces feasibility on its own.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::GreedyDispatcher;
use crate::error::{Result, ScheduleError};
use crate::models::Instance;

/// Bound estimation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundConfig {
    /// Number of greedy trials.
    pub samples: usize,
    /// Safety multiplier applied to the best greedy makespan (>= 1.0).
    pub multiplier: f64,
    /// Seed for the trial RNG.
    pub seed: u64,
}

impl Default for BoundConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            multiplier: 1.4,
            seed: 0,
        }
    }
}

impl std::hash::Hash for BoundConfig {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.samples.hash(state);
        self.multiplier.to_bits().hash(state);
        self.seed.hash(state);
    }
}

impl BoundConfig {
    /// Sets the number of greedy trials.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Sets the safety multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(ScheduleError::InvalidConfig(
                "samples must be at least 1".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ScheduleError::InvalidConfig(format!(
                "multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Estimates a makespan upper bound, seeded from `config.seed`.
///
/// Deterministic for a fixed instance, sample count, multiplier, and seed.
/// An instance without operations has bound 0.
pub fn estimate_bound(instance: &Instance, config: &BoundConfig) -> Result<i64> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    estimate_bound_with_rng(instance, config.samples, config.multiplier, &mut rng)
}

/// Estimates a makespan upper bound with an injected random source.
///
/// Each trial gets its own RNG seeded from `rng`, so the result does not
/// depend on whether trials run sequentially or in parallel.
pub fn estimate_bound_with_rng<R: Rng + ?Sized>(
    instance: &Instance,
    samples: usize,
    multiplier: f64,
    rng: &mut R,
) -> Result<i64> {
    BoundConfig {
        samples,
        multiplier,
        seed: 0,
    }
    .validate()?;

    if instance.is_empty() {
        return Ok(0);
    }

    let seeds: Vec<u64> = (0..samples).map(|_| rng.random()).collect();
    let best = best_greedy_makespan(instance, &seeds);
    let bound = scale(best, multiplier);
    debug!(
        target: "u_jobshop::bound",
        "greedy best makespan {best} over {samples} samples, bound {bound}"
    );
    Ok(bound)
}

#[cfg(not(feature = "parallel"))]
fn best_greedy_makespan(instance: &Instance, seeds: &[u64]) -> i64 {
    let dispatcher = GreedyDispatcher::new(instance);
    seeds
        .iter()
        .map(|&seed| dispatcher.makespan(&mut StdRng::seed_from_u64(seed)))
        .min()
        .unwrap_or(0)
}

#[cfg(feature = "parallel")]
fn best_greedy_makespan(instance: &Instance, seeds: &[u64]) -> i64 {
    use rayon::prelude::*;

    let dispatcher = GreedyDispatcher::new(instance);
    seeds
        .par_iter()
        .map(|&seed| dispatcher.makespan(&mut StdRng::seed_from_u64(seed)))
        .min()
        .unwrap_or(0)
}

fn scale(makespan: i64, multiplier: f64) -> i64 {
    // Absorb float noise such as 10 * 1.4 = 14.000000000000002.
    let scaled = makespan as f64 * multiplier;
    (scaled - 1e-9).ceil().max(makespan as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Instance {
        Instance::from_routes([
            ("A", vec![("R1", 3), ("R2", 2)]),
            ("B", vec![("R1", 2), ("R2", 4)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = BoundConfig::default();
        assert_eq!(config.samples, 100);
        assert!((config.multiplier - 1.4).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(BoundConfig::default().with_samples(0).validate().is_err());
        assert!(BoundConfig::default().with_multiplier(0.5).validate().is_err());
        assert!(BoundConfig::default()
            .with_multiplier(f64::NAN)
            .validate()
            .is_err());
        assert!(estimate_bound(&two_by_two(), &BoundConfig::default().with_samples(0)).is_err());
    }

    #[test]
    fn test_two_by_two_bound() {
        // Best greedy run finds the optimum 8; 8 * 1.4 = 11.2 rounds up.
        let bound = estimate_bound(&two_by_two(), &BoundConfig::default()).unwrap();
        assert_eq!(bound, 12);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let inst = two_by_two();
        let config = BoundConfig::default().with_samples(10).with_seed(42);
        let a = estimate_bound(&inst, &config).unwrap();
        let b = estimate_bound(&inst, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multiplier_one_is_greedy_makespan() {
        let inst = two_by_two();
        let config = BoundConfig::default().with_multiplier(1.0);
        let bound = estimate_bound(&inst, &config).unwrap();
        assert!(bound >= 8);
        assert!(bound <= inst.sum_of_all_durations());
    }

    #[test]
    fn test_empty_instance_bound() {
        let mut inst = Instance::new();
        inst.add_job("idle").unwrap();
        assert_eq!(estimate_bound(&inst, &BoundConfig::default()).unwrap(), 0);
    }

    #[test]
    fn test_scale_rounding() {
        assert_eq!(scale(10, 1.4), 14);
        assert_eq!(scale(8, 1.4), 12);
        assert_eq!(scale(5, 1.0), 5);
        assert_eq!(scale(0, 1.4), 0);
    }
}
