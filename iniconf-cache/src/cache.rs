//! Single-flight loading cache with lazy TTL expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use iniconf_core::error::{ConfError, Result};

/// Produces the value for a key on a cache miss.
pub type Loader<V> = Box<dyn Fn(&str) -> Result<V> + Send + Sync>;

/// One in-progress load. Waiters park on `done` until `outcome` is set.
struct Flight<V> {
    outcome: Mutex<Option<Result<V>>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<V> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut outcome);
        }
    }

    fn complete(&self, result: Result<V>) {
        *self.outcome.lock() = Some(result);
        self.done.notify_all();
    }
}

/// Cache entry: a loaded value, or the flight loading it.
enum Slot<V> {
    Ready { value: V, inserted_at: Instant },
    Loading(Arc<Flight<V>>),
}

struct State<V> {
    slots: HashMap<String, Slot<V>>,
    closed: bool,
}

enum Lookup<V> {
    Hit(V),
    Wait(Arc<Flight<V>>),
    Load(Arc<Flight<V>>),
}

/// Cache configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a loaded value; `None` keeps values until invalidated
    pub ttl: Option<Duration>,
    /// Initial capacity of the key map
    pub initial_capacity: usize,
}

impl CacheConfig {
    /// Sets the time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// An entry is stale once its age reaches the TTL.
fn is_stale(age: Duration, ttl: Option<Duration>) -> bool {
    matches!(ttl, Some(ttl) if age >= ttl)
}

/// Concurrent cache that loads missing or expired keys through a loader.
///
/// At most one load per key runs at a time: callers that miss while a load
/// is in flight block until it finishes and share its outcome. Failed loads
/// are not remembered, so the next miss retries. The map lock is never held
/// while a loader runs, so loads of different keys do not block each other.
pub struct LoadingCache<V> {
    state: RwLock<State<V>>,
    loader: Loader<V>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
}

impl<V: Clone> LoadingCache<V> {
    /// Creates a cache with default configuration (no expiry).
    pub fn new(loader: impl Fn(&str) -> Result<V> + Send + Sync + 'static) -> Self {
        Self::with_config(CacheConfig::default(), loader)
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(
        config: CacheConfig,
        loader: impl Fn(&str) -> Result<V> + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: RwLock::new(State {
                slots: HashMap::with_capacity(config.initial_capacity),
                closed: false,
            }),
            loader: Box::new(loader),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
        }
    }

    /// Returns the configured time-to-live.
    pub fn ttl(&self) -> Option<Duration> {
        self.config.ttl
    }

    fn is_expired(&self, inserted_at: Instant) -> bool {
        is_stale(inserted_at.elapsed(), self.config.ttl)
    }

    /// Gets the value for `key`, loading it if absent or expired.
    ///
    /// Concurrent callers for the same key share one loader invocation and
    /// all receive its value or error.
    pub fn get(&self, key: &str) -> Result<V> {
        {
            let state = self.state.read();
            if state.closed {
                return Err(ConfError::Closed);
            }
            if let Some(Slot::Ready { value, inserted_at }) = state.slots.get(key) {
                if !self.is_expired(*inserted_at) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value.clone());
                }
            }
        }

        self.get_slow(key)
    }

    fn get_slow(&self, key: &str) -> Result<V> {
        let lookup = {
            let mut state = self.state.write();
            if state.closed {
                return Err(ConfError::Closed);
            }
            let existing = match state.slots.get(key) {
                Some(Slot::Ready { value, inserted_at }) if !self.is_expired(*inserted_at) => {
                    Some(Lookup::Hit(value.clone()))
                }
                Some(Slot::Loading(flight)) => Some(Lookup::Wait(Arc::clone(flight))),
                _ => None,
            };
            match existing {
                Some(lookup) => lookup,
                None => {
                    let flight = Arc::new(Flight::new());
                    state
                        .slots
                        .insert(key.to_string(), Slot::Loading(Arc::clone(&flight)));
                    Lookup::Load(flight)
                }
            }
        };

        match lookup {
            Lookup::Hit(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Lookup::Wait(flight) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Waiting on in-flight load");
                flight.wait()
            }
            Lookup::Load(flight) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.run_flight(key, flight)
            }
        }
    }

    #[instrument(skip(self, flight))]
    fn run_flight(&self, key: &str, flight: Arc<Flight<V>>) -> Result<V> {
        let mut guard = FlightGuard {
            cache: self,
            key,
            flight: Some(flight),
        };

        self.loads.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = (self.loader)(key);

        match &result {
            Ok(_) => debug!(elapsed = ?started.elapsed(), "Loaded"),
            Err(e) => {
                self.load_failures.fetch_add(1, Ordering::Relaxed);
                debug!(elapsed = ?started.elapsed(), error = %e, "Load failed");
            }
        }

        match guard.flight.take() {
            Some(flight) => self.finish(key, &flight, result),
            None => result,
        }
    }

    /// Installs a load outcome and wakes every waiter of the flight.
    fn finish(&self, key: &str, flight: &Arc<Flight<V>>, result: Result<V>) -> Result<V> {
        {
            let mut state = self.state.write();
            let ours = matches!(
                state.slots.get(key),
                Some(Slot::Loading(current)) if Arc::ptr_eq(current, flight)
            );
            if ours {
                match &result {
                    Ok(value) if !state.closed => {
                        state.slots.insert(
                            key.to_string(),
                            Slot::Ready {
                                value: value.clone(),
                                inserted_at: Instant::now(),
                            },
                        );
                    }
                    _ => {
                        state.slots.remove(key);
                    }
                }
            }
        }

        flight.complete(result.clone());
        result
    }

    /// Drops the loaded value for `key` so the next access reloads it.
    ///
    /// An in-flight load is left alone. Returns true if a value was dropped.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.state.write();
        if matches!(state.slots.get(key), Some(Slot::Ready { .. })) {
            state.slots.remove(key);
            true
        } else {
            false
        }
    }

    /// Drops every loaded value. In-flight loads are left alone.
    pub fn clear(&self) {
        self.state
            .write()
            .slots
            .retain(|_, slot| matches!(slot, Slot::Loading(_)));
    }

    /// Removes all expired values. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.state.write();
        let before = state.slots.len();
        state.slots.retain(|_, slot| match slot {
            Slot::Ready { inserted_at, .. } => !self.is_expired(*inserted_at),
            Slot::Loading(_) => true,
        });
        before - state.slots.len()
    }

    /// Closes the cache and drops every entry.
    ///
    /// Later `get` calls fail with `ConfError::Closed`. Loads already in
    /// flight still deliver their outcome to their waiters but are not
    /// installed. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            debug!("Cache already closed");
            return Ok(());
        }
        state.closed = true;
        state.slots.clear();
        debug!("Cache closed");
        Ok(())
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Returns the number of loaded values (including expired ones not yet
    /// reloaded).
    pub fn len(&self) -> usize {
        self.state
            .read()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    /// Returns true if no values are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        let mut entries = 0;
        let mut expired_entries = 0;
        let mut in_flight = 0;
        for slot in state.slots.values() {
            match slot {
                Slot::Ready { inserted_at, .. } => {
                    entries += 1;
                    if self.is_expired(*inserted_at) {
                        expired_entries += 1;
                    }
                }
                Slot::Loading(_) => in_flight += 1,
            }
        }

        CacheStats {
            entries,
            expired_entries,
            in_flight,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
        }
    }
}

/// Publishes an error to waiters if the loader unwinds.
struct FlightGuard<'a, V: Clone> {
    cache: &'a LoadingCache<V>,
    key: &'a str,
    flight: Option<Arc<Flight<V>>>,
}

impl<V: Clone> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if let Some(flight) = self.flight.take() {
            let err = ConfError::Internal(format!("loader panicked while loading {:?}", self.key));
            self.cache.load_failures.fetch_add(1, Ordering::Relaxed);
            let _ = self.cache.finish(self.key, &flight, Err(err));
        }
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loaded values, including expired ones
    pub entries: usize,
    /// Loaded values past their TTL
    pub expired_entries: usize,
    /// Loads currently running
    pub in_flight: usize,
    /// Gets served from a loaded value
    pub hits: u64,
    /// Gets that started or waited on a load
    pub misses: u64,
    /// Loader invocations
    pub loads: u64,
    /// Loader invocations that failed or panicked
    pub load_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;

    fn counting_cache(
        config: CacheConfig,
    ) -> (Arc<LoadingCache<Arc<String>>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = LoadingCache::with_config(config, move |key| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if key == "missing" {
                return Err(ConfError::SectionNotFound(key.to_string()));
            }
            Ok(Arc::new(format!("{key}#{n}")))
        });
        (Arc::new(cache), calls)
    }

    /// Spins until `cond` holds or a generous deadline passes.
    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_get_caches_value() {
        let (cache, calls) = counting_cache(CacheConfig::default());

        let first = cache.get("a").unwrap();
        let second = cache.get("a").unwrap();
        assert_eq!(*first, "a#1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_keys_cached_independently() {
        let (cache, calls) = counting_cache(CacheConfig::default());
        assert_eq!(*cache.get("a").unwrap(), "a#1");
        assert_eq!(*cache.get("b").unwrap(), "b#2");
        assert_eq!(*cache.get("a").unwrap(), "a#1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_load_not_cached() {
        let (cache, calls) = counting_cache(CacheConfig::default());

        assert!(matches!(cache.get("missing"), Err(ConfError::SectionNotFound(_))));
        assert!(matches!(cache.get("missing"), Err(ConfError::SectionNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().load_failures, 2);

        // Other keys are unaffected.
        assert_eq!(*cache.get("a").unwrap(), "a#3");
    }

    #[test]
    fn test_single_flight_under_concurrency() {
        const CALLERS: u64 = 16;
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let counter = Arc::clone(&calls);
        let cache = Arc::new(LoadingCache::new(move |key: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            release_rx.lock().recv().ok();
            Ok(Arc::new(key.to_string()))
        }));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get("shared"))
            })
            .collect();

        wait_until(|| cache.stats().misses == CALLERS);
        release_tx.send(()).unwrap();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|v| Arc::ptr_eq(v, &results[0])));
        assert_eq!(cache.stats().loads, 1);
    }

    #[test]
    fn test_single_flight_shares_error() {
        const CALLERS: u64 = 8;
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let counter = Arc::clone(&calls);
        let cache = Arc::new(LoadingCache::<Arc<String>>::new(move |_key: &str| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                release_rx.lock().recv().ok();
            }
            Err(ConfError::Parse {
                line: 1,
                content: "not a valid line".into(),
            })
        }));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get("broken"))
            })
            .collect();

        wait_until(|| cache.stats().misses == CALLERS);
        release_tx.send(()).unwrap();

        for handle in handles {
            assert!(matches!(
                handle.join().unwrap(),
                Err(ConfError::Parse { line: 1, .. })
            ));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The failure is not remembered.
        assert!(cache.get("broken").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_different_keys_do_not_block() {
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);

        let cache = Arc::new(LoadingCache::new(move |key: &str| {
            if key == "slow" {
                started_tx.lock().send(()).ok();
                release_rx.lock().recv().ok();
            }
            Ok(Arc::new(key.to_string()))
        }));

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("slow"))
        };
        started_rx.recv().unwrap();

        // Completes while "slow" is still loading.
        assert_eq!(*cache.get("fast").unwrap(), "fast");
        assert_eq!(cache.stats().in_flight, 1);

        release_tx.send(()).unwrap();
        assert_eq!(*slow.join().unwrap().unwrap(), "slow");
    }

    #[test]
    fn test_ttl_expiry_reloads() {
        let (cache, calls) =
            counting_cache(CacheConfig::default().with_ttl(Duration::from_millis(50)));

        assert_eq!(*cache.get("a").unwrap(), "a#1");
        assert_eq!(*cache.get("a").unwrap(), "a#1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.stats().expired_entries, 1);
        assert_eq!(*cache.get("a").unwrap(), "a#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_at_exact_ttl() {
        let ttl = Some(Duration::from_millis(10));
        assert!(!is_stale(Duration::from_millis(9), ttl));
        assert!(is_stale(Duration::from_millis(10), ttl));
        assert!(is_stale(Duration::from_millis(11), ttl));
        assert!(!is_stale(Duration::from_secs(86_400), None));
    }

    #[test]
    fn test_nanosecond_ttl_reloads_every_get() {
        let (cache, calls) =
            counting_cache(CacheConfig::default().with_ttl(Duration::from_nanos(1)));

        assert_eq!(*cache.get("a").unwrap(), "a#1");
        thread::sleep(Duration::from_millis(1));
        assert_eq!(*cache.get("a").unwrap(), "a#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = CacheConfig {
            ttl: Some(Duration::from_millis(1500)),
            initial_capacity: 8,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["ttl"]["secs"], 1);
        assert_eq!(json["ttl"]["nanos"], 500_000_000);

        let back: CacheConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);

        let unbounded: CacheConfig =
            serde_json::from_str(r#"{"ttl":null,"initial_capacity":0}"#).unwrap();
        assert_eq!(unbounded, CacheConfig::default());
    }

    #[test]
    fn test_long_ttl_uses_fast_path() {
        let (cache, calls) =
            counting_cache(CacheConfig::default().with_ttl(Duration::from_secs(3600)));
        for _ in 0..10 {
            cache.get("a").unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 9);
    }

    #[test]
    fn test_loader_panic_wakes_waiters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let counter = Arc::clone(&calls);
        let cache = Arc::new(LoadingCache::new(move |key: &str| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                release_rx.lock().recv().ok();
                panic!("loader exploded");
            }
            Ok(Arc::new(key.to_string()))
        }));

        let loader_thread = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("boom"))
        };
        wait_until(|| cache.stats().misses == 1);

        let waiter = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("boom"))
        };
        wait_until(|| cache.stats().misses == 2);
        release_tx.send(()).unwrap();

        assert!(loader_thread.join().is_err());
        assert!(matches!(waiter.join().unwrap(), Err(ConfError::Internal(_))));

        // Next call retries with a fresh load.
        assert_eq!(*cache.get("boom").unwrap(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (cache, calls) = counting_cache(CacheConfig::default());
        cache.get("a").unwrap();

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(*cache.get("a").unwrap(), "a#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear() {
        let (cache, _calls) = counting_cache(CacheConfig::default());
        cache.get("a").unwrap();
        cache.get("b").unwrap();

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let (cache, _calls) =
            counting_cache(CacheConfig::default().with_ttl(Duration::from_millis(20)));
        cache.get("a").unwrap();
        cache.get("b").unwrap();

        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.cleanup_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_after_close() {
        let (cache, calls) = counting_cache(CacheConfig::default());
        cache.get("a").unwrap();

        cache.close().unwrap();
        assert!(cache.is_closed());
        assert!(cache.is_empty());
        assert!(matches!(cache.get("a"), Err(ConfError::Closed)));
        assert!(matches!(cache.get("b"), Err(ConfError::Closed)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second close is a no-op.
        assert!(cache.close().is_ok());
    }

    #[test]
    fn test_close_during_flight_does_not_install() {
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);

        let cache = Arc::new(LoadingCache::new(move |key: &str| {
            started_tx.lock().send(()).ok();
            release_rx.lock().recv().ok();
            Ok(Arc::new(key.to_string()))
        }));

        let loading = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("a"))
        };
        started_rx.recv().unwrap();

        cache.close().unwrap();
        release_tx.send(()).unwrap();

        assert_eq!(*loading.join().unwrap().unwrap(), "a");
        assert!(cache.is_empty());
        assert!(matches!(cache.get("a"), Err(ConfError::Closed)));
    }
}
