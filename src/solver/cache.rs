//! Injectable solve cache.
//!
//! Results are keyed by the instance fingerprint, the strategy with its
//! full configuration, the bound input (explicit `max_makespan` or the
//! greedy estimation settings), and the time limit. Entries leave the
//! cache through explicit invalidation of a fingerprint,
//! [`SolveCache::clear`], or capacity eviction (oldest first). Callers
//! must not store cancelled or `Unknown` results.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use rustc_hash::{FxHashMap, FxHasher};

use super::{RawResult, StrategyKind};
use crate::config::SchedulerConfig;
use crate::models::Instance;

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// [`Instance::fingerprint`] of the solved instance.
    pub fingerprint: u64,
    /// Strategy used.
    pub strategy: StrategyKind,
    /// Hash of the strategy configuration and the bound input.
    pub settings: u64,
    /// Time limit in milliseconds.
    pub time_limit_ms: u64,
}

impl CacheKey {
    /// Builds the key for solving `instance` under `config`.
    pub fn new(instance: &Instance, config: &SchedulerConfig) -> Self {
        let mut hasher = FxHasher::default();
        config.strategy.hash(&mut hasher);
        match config.max_makespan {
            Some(bound) => {
                0u8.hash(&mut hasher);
                bound.hash(&mut hasher);
            }
            None => {
                1u8.hash(&mut hasher);
                config.bound.hash(&mut hasher);
            }
        }
        Self {
            fingerprint: instance.fingerprint(),
            strategy: config.strategy.kind(),
            settings: hasher.finish(),
            time_limit_ms: config.time_limit_ms,
        }
    }
}

/// A cached solve: the raw backend result and the bound it was solved with.
#[derive(Debug, Clone)]
pub struct CachedSolve {
    /// Backend output.
    pub raw: RawResult,
    /// Makespan bound used for the model.
    pub bound: i64,
}

/// Cache abstraction injected into the [`Scheduler`](crate::pipeline::Scheduler).
pub trait SolveCache: Send + Sync {
    /// Looks up a cached solve.
    fn get(&self, key: &CacheKey) -> Option<CachedSolve>;

    /// Stores a solve, replacing any previous entry for `key`.
    fn put(&self, key: CacheKey, value: CachedSolve);

    /// Drops every entry for `fingerprint`; returns how many were removed.
    fn invalidate(&self, fingerprint: u64) -> usize;

    /// Drops every entry.
    fn clear(&self);

    /// Number of entries.
    fn len(&self) -> usize;

    /// Whether the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: FxHashMap<CacheKey, CachedSolve>,
    order: VecDeque<CacheKey>,
}

/// In-memory cache with FIFO eviction.
///
/// # Example
/// ```
/// use u_jobshop::solver::{MemoryCache, SolveCache};
///
/// let cache = MemoryCache::new(16);
/// assert!(cache.is_empty());
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries. Capacity 0
    /// stores nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SolveCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CachedSolve> {
        self.lock().entries.get(key).cloned()
    }

    fn put(&self, key: CacheKey, value: CachedSolve) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        if state.entries.insert(key.clone(), value).is_some() {
            return;
        }
        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    fn invalidate(&self, fingerprint: u64) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|k, _| k.fingerprint != fingerprint);
        state.order.retain(|k| k.fingerprint != fingerprint);
        before - state.entries.len()
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::BoundConfig;
    use crate::solver::{
        ConstraintConfig, PermutationConfig, SolveLimits, SolveStatus, Strategy,
    };

    fn key(fingerprint: u64, time_limit_ms: u64) -> CacheKey {
        CacheKey {
            fingerprint,
            strategy: StrategyKind::Constraint,
            settings: 0,
            time_limit_ms,
        }
    }

    fn entry(bound: i64) -> CachedSolve {
        let deadline = SolveLimits::default().deadline();
        CachedSolve {
            raw: RawResult::no_solution(SolveStatus::Infeasible, &deadline),
            bound,
        }
    }

    #[test]
    fn test_put_get() {
        let cache = MemoryCache::new(4);
        cache.put(key(1, 100), entry(10));
        assert_eq!(cache.get(&key(1, 100)).unwrap().bound, 10);
        assert!(cache.get(&key(1, 200)).is_none());
        assert_eq!(cache.len(), 1);

        cache.put(key(1, 100), entry(11));
        assert_eq!(cache.get(&key(1, 100)).unwrap().bound, 11);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = MemoryCache::new(2);
        cache.put(key(1, 1), entry(1));
        cache.put(key(2, 1), entry(2));
        cache.put(key(3, 1), entry(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1, 1)).is_none());
        assert!(cache.get(&key(3, 1)).is_some());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = MemoryCache::new(8);
        cache.put(key(1, 1), entry(1));
        cache.put(key(1, 2), entry(1));
        cache.put(key(2, 1), entry(2));
        assert_eq!(cache.invalidate(1), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity() {
        let cache = MemoryCache::new(0);
        cache.put(key(1, 1), entry(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_tracks_instance_content() {
        let a = Instance::from_routes([("A", vec![("R1", 3)])]).unwrap();
        let b = Instance::from_routes([("A", vec![("R1", 4)])]).unwrap();
        let config = SchedulerConfig::default().with_time_limit_ms(1000);
        let ka = CacheKey::new(&a, &config);
        assert_eq!(ka, CacheKey::new(&a, &config));
        assert_ne!(ka, CacheKey::new(&b, &config));
        assert_eq!(ka.time_limit_ms, 1000);
    }

    #[test]
    fn test_key_tracks_configuration() {
        let inst = Instance::from_routes([("A", vec![("R1", 3)])]).unwrap();
        let base = SchedulerConfig::default();
        let key = CacheKey::new(&inst, &base);

        let variants = [
            base.clone().with_max_makespan(7),
            base.clone().with_max_makespan(8),
            base.clone().with_bound(BoundConfig::default().with_seed(1)),
            base.clone().with_bound(BoundConfig::default().with_multiplier(2.0)),
            base.clone()
                .with_strategy(Strategy::Constraint(ConstraintConfig::default().with_node_limit(1))),
            base.clone()
                .with_strategy(Strategy::Permutation(PermutationConfig::default().with_seed(9))),
            base.clone().with_time_limit_ms(5),
        ];
        for (i, config) in variants.iter().enumerate() {
            let other = CacheKey::new(&inst, config);
            assert_ne!(key, other, "variant {i}");
            for later in &variants[i + 1..] {
                assert_ne!(other, CacheKey::new(&inst, later));
            }
        }

        // Estimation settings do not matter once the bound is explicit.
        let explicit = base.clone().with_max_makespan(7);
        assert_eq!(
            CacheKey::new(&inst, &explicit),
            CacheKey::new(&inst, &explicit.clone().with_bound(BoundConfig::default().with_seed(3)))
        );
    }
}
