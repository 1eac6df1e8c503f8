//! Analysis result cache
//!
//! Content/parameter-keyed memoization with bounded capacity, LRU
//! eviction and a singleflight discipline: concurrent callers for one key
//! share a single computation instead of racing. Failures are never
//! stored; they are delivered to every current waiter and the key is
//! freed for retry.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::analysis::{AnalysisResult, AnalyzerKind};
use crate::error::AnalysisError;
use crate::model::Fingerprint;

/// Default number of entries kept when none is configured
pub const DEFAULT_CAPACITY: usize = 32;

/// Key of a cached analysis: score content, analyzer, parameters
///
/// Parameters are part of the key, so re-running with different settings
/// never returns a stale result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Content fingerprint of the score model
    pub fingerprint: Fingerprint,

    /// Which analyzer the entry belongs to
    pub analyzer: AnalyzerKind,

    /// Canonical encoding of the analyzer's options
    pub params: String,
}

impl CacheKey {
    /// Build a key from a model fingerprint and serializable options
    pub fn new<O: Serialize>(
        fingerprint: &Fingerprint,
        analyzer: AnalyzerKind,
        options: &O,
    ) -> Self {
        // Field order of an options struct is fixed, so the JSON encoding
        // is canonical
        let params = serde_json::to_string(options).unwrap_or_default();
        Self {
            fingerprint: fingerprint.clone(),
            analyzer,
            params,
        }
    }
}

/// A stored result plus its bookkeeping metadata
struct CacheEntry {
    result: AnalysisResult,
    created: Instant,
    last_access: Instant,
    /// Monotonic access counter backing the LRU order
    tick: u64,
}

/// Shared slot a leader fills and waiters block on
#[derive(Default)]
struct Flight {
    slot: Mutex<Option<Result<AnalysisResult, AnalysisError>>>,
    ready: Condvar,
}

struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, Arc<Flight>>,
    tick: u64,
}

/// Bounded, thread-safe memoization layer for analysis results
pub struct AnalysisCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl AnalysisCache {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Return the cached result for `key`, computing it with `compute` on
    /// a miss
    ///
    /// At most one computation per key runs at a time: concurrent callers
    /// for an in-flight key wait for and share the leader's result. A
    /// failed computation is re-raised to the leader and every waiter,
    /// wrapped as [`AnalysisError::CacheComputation`], and nothing is
    /// stored.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<AnalysisResult, AnalysisError>
    where
        F: FnOnce() -> Result<AnalysisResult, AnalysisError>,
    {
        let flight = {
            let mut state = self.lock();
            state.tick += 1;
            let tick = state.tick;

            if let Some(entry) = state.entries.get_mut(&key) {
                entry.last_access = Instant::now();
                entry.tick = tick;
                log::debug!("Cache hit: {} {}", key.analyzer, key.fingerprint);
                return Ok(entry.result.clone());
            }

            if let Some(flight) = state.in_flight.get(&key) {
                let flight = Arc::clone(flight);
                drop(state);
                log::debug!("Cache wait: {} {}", key.analyzer, key.fingerprint);
                return wait_for(&flight);
            }

            let flight = Arc::new(Flight::default());
            state.in_flight.insert(key.clone(), Arc::clone(&flight));
            flight
        };

        log::debug!("Cache miss, computing: {} {}", key.analyzer, key.fingerprint);

        // If compute panics the guard still completes the flight, so
        // waiters unblock instead of hanging on a poisoned key
        let mut guard = FlightGuard {
            cache: self,
            key: &key,
            flight: &flight,
            done: false,
        };
        let result = compute();
        guard.complete(result)
    }

    /// Drop the entry for `key`, if any; in-flight computations are
    /// unaffected
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drop every stored entry
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Age of the entry for `key`, if stored
    pub fn entry_age(&self, key: &CacheKey) -> Option<std::time::Duration> {
        self.lock().entries.get(key).map(|e| e.created.elapsed())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // State updates never hold the lock across user code, so a
        // poisoned lock still guards consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a finished flight: store successes, free the key, wake
    /// waiters
    fn finish_flight(
        &self,
        key: &CacheKey,
        flight: &Flight,
        result: Result<AnalysisResult, AnalysisError>,
    ) {
        {
            let mut state = self.lock();
            state.in_flight.remove(key);
            if let Ok(value) = &result {
                state.tick += 1;
                let tick = state.tick;
                Self::evict_to_fit(&mut state, self.capacity);
                let now = Instant::now();
                state.entries.insert(
                    key.clone(),
                    CacheEntry {
                        result: value.clone(),
                        created: now,
                        last_access: now,
                        tick,
                    },
                );
            }
        }

        let mut slot = flight.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(result);
        flight.ready.notify_all();
    }

    /// Evict least-recently-used entries until one slot is free
    ///
    /// Keys with an in-flight computation are never evicted.
    fn evict_to_fit(state: &mut CacheState, capacity: usize) {
        while state.entries.len() >= capacity {
            let victim = state
                .entries
                .iter()
                .filter(|(key, _)| !state.in_flight.contains_key(*key))
                .min_by_key(|(_, entry)| entry.tick)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    log::debug!("Cache evict: {} {}", key.analyzer, key.fingerprint);
                    state.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Block until the leader publishes, then share its outcome
fn wait_for(flight: &Flight) -> Result<AnalysisResult, AnalysisError> {
    let mut slot = flight.slot.lock().unwrap_or_else(PoisonError::into_inner);
    while slot.is_none() {
        slot = flight
            .ready
            .wait(slot)
            .unwrap_or_else(PoisonError::into_inner);
    }
    match slot.as_ref() {
        Some(Ok(value)) => Ok(value.clone()),
        Some(Err(err)) => Err(err.clone().cache_wrap()),
        None => unreachable!("slot checked above"),
    }
}

/// Completes the flight exactly once, even if the computation panicked
struct FlightGuard<'a> {
    cache: &'a AnalysisCache,
    key: &'a CacheKey,
    flight: &'a Flight,
    done: bool,
}

impl FlightGuard<'_> {
    fn complete(
        &mut self,
        result: Result<AnalysisResult, AnalysisError>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.done = true;
        self.cache
            .finish_flight(self.key, self.flight, result.clone());
        result.map_err(AnalysisError::cache_wrap)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.cache.finish_flight(
                self.key,
                self.flight,
                Err(AnalysisError::CacheComputation {
                    message: "computation aborted before producing a result".to_string(),
                }),
            );
        }
    }
}
