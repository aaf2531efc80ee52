//! In-memory memoization of fetches and indicator columns.
//!
//! `ResultCache` maps a key to a per-key slot. The slot map is only touched
//! long enough to find or create a slot; computation happens under the slot's
//! own lock. Two callers racing on the same key therefore run the computation
//! once (the second blocks and reuses the value), while callers on different
//! keys never wait on each other.
//!
//! Failed computations leave the slot empty, so the next caller retries. No
//! entry expires on its own; `clear` is the refresh mechanism.

use crate::domain::{Interval, Period, PriceSeries};
use crate::indicators::IndicatorParams;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Hit and computation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub computations: u64,
}

type Slot<V> = Arc<Mutex<Option<V>>>;

/// Get-or-compute cache with per-key mutual exclusion.
pub struct ResultCache<K, V> {
    slots: DashMap<K, Slot<V>>,
    hits: AtomicU64,
    computations: AtomicU64,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            hits: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, computing it if absent.
    ///
    /// At most one `compute` runs per key at a time. An `Err` from `compute`
    /// is returned to this caller only and nothing is stored.
    pub fn get_or_compute<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        // Clone the slot handle so the shard lock is released before computing
        let slot = Arc::clone(self.slots.entry(key).or_default().value());
        // A panic inside a previous compute leaves the slot empty; treat it as a miss
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value.clone());
        }

        self.computations.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    /// Cached value for `key`, without computing.
    ///
    /// Blocks while a computation for `key` is in flight.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.get(key).map(|s| Arc::clone(s.value()))?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of completed entries.
    ///
    /// Waits on slots whose computation is in flight, but never while holding
    /// a shard lock of the slot map.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        slots
            .iter()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. In-flight computations finish into detached slots.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies one price-history fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
}

impl FetchKey {
    pub fn new(symbol: impl Into<String>, period: Period, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            interval,
        }
    }
}

/// One cached fetch. `id` is unique per computation, so a refetch after
/// `clear` never shares indicator columns with the series it replaced.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub id: u64,
    pub series: Arc<PriceSeries>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ColumnKey {
    fetch_id: u64,
    params: IndicatorParams,
}

/// The two caches a screening run goes through.
///
/// Columns are keyed by the id of the fetch they were computed from, not by
/// the fetch parameters.
#[derive(Default)]
pub struct ScreeningCache {
    prices: ResultCache<FetchKey, Fetched>,
    columns: ResultCache<ColumnKey, Arc<[f64]>>,
    next_fetch_id: AtomicU64,
}

impl ScreeningCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached price history for `key`, running `fetch` on a miss.
    pub fn fetch_or_compute<E, F>(&self, key: FetchKey, fetch: F) -> Result<Fetched, E>
    where
        F: FnOnce() -> Result<PriceSeries, E>,
    {
        self.prices.get_or_compute(key, || {
            let series = fetch()?;
            Ok(Fetched {
                id: self.next_fetch_id.fetch_add(1, Ordering::Relaxed),
                series: Arc::new(series),
            })
        })
    }

    /// Cached indicator column computed on `fetched`.
    pub fn column_or_compute<E, F>(
        &self,
        fetched: &Fetched,
        params: &IndicatorParams,
        compute: F,
    ) -> Result<Arc<[f64]>, E>
    where
        F: FnOnce() -> Result<Vec<f64>, E>,
    {
        let key = ColumnKey {
            fetch_id: fetched.id,
            params: params.clone(),
        };
        self.columns.get_or_compute(key, || compute().map(Arc::from))
    }

    pub fn prices_len(&self) -> usize {
        self.prices.len()
    }

    pub fn columns_len(&self) -> usize {
        self.columns.len()
    }

    pub fn price_stats(&self) -> CacheStats {
        self.prices.stats()
    }

    pub fn column_stats(&self) -> CacheStats {
        self.columns.stats()
    }

    pub fn clear(&self) {
        self.prices.clear();
        self.columns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn computes_once_then_hits() {
        let cache: ResultCache<&str, u32> = ResultCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || -> Result<u32, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };

        assert_eq!(cache.get_or_compute("a", compute), Ok(7));
        assert_eq!(cache.get_or_compute("a", compute), Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                computations: 1
            }
        );
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: ResultCache<&str, u32> = ResultCache::new();
        assert_eq!(cache.get_or_compute("a", || Err("offline")), Err("offline"));
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.get_or_compute("a", || Ok::<_, &str>(3)), Ok(3));
        assert_eq!(cache.get(&"a"), Some(3));
    }

    #[test]
    fn distinct_keys_compute_separately() {
        let cache: ResultCache<String, String> = ResultCache::new();
        for k in ["a", "b", "c"] {
            let v = cache
                .get_or_compute(k.to_string(), || Ok::<_, ()>(k.to_uppercase()))
                .unwrap();
            assert_eq!(v, k.to_uppercase());
        }
        assert_eq!(cache.len(), 3);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        const CALLERS: usize = 16;
        let cache: Arc<ResultCache<&str, u64>> = Arc::new(ResultCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute("SPY", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok::<_, ()>(42)
                    })
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, (CALLERS - 1) as u64);
    }

    #[test]
    fn slow_key_does_not_block_other_keys() {
        let cache: Arc<ResultCache<&str, u32>> = Arc::new(ResultCache::new());
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache.get_or_compute("slow", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<_, ()>(1)
                })
            })
        };

        started_rx.recv().unwrap();
        // "slow" is mid-computation; an unrelated key must go straight through
        assert_eq!(cache.get_or_compute("fast", || Ok::<_, ()>(2)), Ok(2));
        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), Ok(1));
    }

    #[test]
    fn panicking_compute_leaves_slot_retryable() {
        let cache: Arc<ResultCache<&str, u32>> = Arc::new(ResultCache::new());
        let c = Arc::clone(&cache);
        let result = thread::spawn(move || {
            let _ = c.get_or_compute("k", || -> Result<u32, ()> { panic!("boom") });
        })
        .join();
        assert!(result.is_err());
        assert_eq!(cache.get_or_compute("k", || Ok::<_, ()>(5)), Ok(5));
    }

    #[test]
    fn len_while_computing_does_not_stall_inserts() {
        let cache: Arc<ResultCache<u32, u32>> = Arc::new(ResultCache::new());
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache.get_or_compute(0, || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<_, ()>(0)
                })
            })
        };
        started_rx.recv().unwrap();

        // Waits on key 0 until it is released
        let counter = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.len())
        };
        thread::sleep(Duration::from_millis(20));

        // Enough keys to land in every shard, including the one holding key 0
        for k in 1..=256 {
            assert_eq!(cache.get_or_compute(k, || Ok::<_, ()>(k)), Ok(k));
        }

        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), Ok(0));
        assert!(counter.join().unwrap() >= 1);
        assert_eq!(cache.len(), 257);
    }

    fn price_series(closes: &[f64]) -> PriceSeries {
        crate::indicators::make_series(closes).prices().clone()
    }

    #[test]
    fn refetch_after_clear_does_not_reuse_old_columns() {
        let cache = ScreeningCache::new();
        let key = FetchKey::new("SPY", Period::Months(6), Interval::OneDay);
        let params = IndicatorParams::MovingAverage { window: 2 };

        let first = cache
            .fetch_or_compute(key.clone(), || Ok::<_, ()>(price_series(&[1.0, 2.0, 3.0])))
            .unwrap();
        let old = cache
            .column_or_compute(&first, &params, || Ok::<_, ()>(vec![f64::NAN, 1.5, 2.5]))
            .unwrap();
        assert_eq!(old.len(), 3);

        // A caller still holding `first` keeps working on its own columns
        cache.clear();
        let second = cache
            .fetch_or_compute(key, || Ok::<_, ()>(price_series(&[1.0, 2.0, 3.0, 4.0, 5.0])))
            .unwrap();
        assert_ne!(first.id, second.id);

        let fresh = cache
            .column_or_compute(&second, &params, || Ok::<_, ()>(vec![f64::NAN, 1.5, 2.5, 3.5, 4.5]))
            .unwrap();
        assert_eq!(fresh.len(), second.series.len());

        let reused = cache
            .column_or_compute(&first, &params, || Ok::<_, ()>(vec![f64::NAN, 1.5, 2.5]))
            .unwrap();
        assert_eq!(reused.len(), first.series.len());
        assert_eq!(cache.prices_len(), 1);
        assert_eq!(cache.columns_len(), 2);
        assert_eq!(cache.price_stats().computations, 2);
    }
}
