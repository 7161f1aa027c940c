//! Compute-once-per-key map.
//!
//! Exactly one caller per key runs the constructor; every other caller for the
//! same key blocks until that construction finishes and then receives a clone
//! of the same value (construct `Arc`s to share one allocation).
//!
//! A key whose construction failed, panicked or produced no value is poisoned
//! for the lifetime of the map (or until [`SingletonMap::clear`]): the
//! triggering caller sees the real cause, every later caller sees
//! [`InvalidResult::PreviouslyInvalid`], and the constructor is never re-run.

use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use loaderscope_plugin::BoxError;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How often a blocked interruptible waiter re-checks its token.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum SingletonError {
    /// The constructor failed on this call. Only the triggering caller sees it.
    #[error("failed to construct singleton: {0}")]
    Construction(BoxError),
    #[error("invalid singleton result: {0}")]
    InvalidResult(InvalidResult),
    #[error("interrupted while waiting for singleton construction")]
    Interrupted,
}

impl SingletonError {
    /// True for both the triggering caller's failure and later poisoned reads.
    pub fn is_invalid_result(&self) -> bool {
        matches!(
            self,
            SingletonError::Construction(_) | SingletonError::InvalidResult(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidResult {
    #[error("constructor returned no value")]
    NoValue,
    #[error("a previous construction for this key failed or returned no value")]
    PreviouslyInvalid,
}

pub type Constructor<K, V> = dyn Fn(&K) -> Result<Option<V>, BoxError> + Send + Sync;

enum HolderState<V> {
    Pending,
    Ready(V),
    Invalid,
}

/// Placeholder inserted into the map before its value exists, so that the
/// insert itself elects the constructing thread.
struct SingletonHolder<V> {
    state: Mutex<HolderState<V>>,
    initialized: Condvar,
}

impl<V: Clone> SingletonHolder<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(HolderState::Pending),
            initialized: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HolderState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, value: Option<V>) {
        let mut state = self.lock();
        *state = match value {
            Some(value) => HolderState::Ready(value),
            None => HolderState::Invalid,
        };
        self.initialized.notify_all();
    }

    fn settled(state: &HolderState<V>) -> Option<Option<V>> {
        match state {
            HolderState::Pending => None,
            HolderState::Ready(value) => Some(Some(value.clone())),
            HolderState::Invalid => Some(None),
        }
    }

    /// Block until the holder is set. `None` means the slot is poisoned.
    fn wait(&self) -> Option<V> {
        let mut state = self.lock();
        loop {
            if let Some(value) = Self::settled(&state) {
                return value;
            }
            state = self
                .initialized
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Self::wait`], but gives up once `interrupt` is cancelled. A
    /// holder that is already set is returned even if the token is cancelled.
    fn wait_interruptible(&self, interrupt: &CancellationToken) -> Result<Option<V>, SingletonError> {
        let mut state = self.lock();
        loop {
            if let Some(value) = Self::settled(&state) {
                return Ok(value);
            }
            if interrupt.is_cancelled() {
                return Err(SingletonError::Interrupted);
            }
            state = self
                .initialized
                .wait_timeout(state, INTERRUPT_POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Marks the holder invalid if construction unwinds before completing, so
/// that waiters on other threads are released.
struct InitGuard<'a, V: Clone> {
    holder: &'a SingletonHolder<V>,
    completed: bool,
}

impl<V: Clone> InitGuard<'_, V> {
    fn complete(mut self, value: Option<V>) {
        self.completed = true;
        self.holder.set(value);
    }
}

impl<V: Clone> Drop for InitGuard<'_, V> {
    fn drop(&mut self) {
        if !self.completed {
            self.holder.set(None);
        }
    }
}

enum Creation<V> {
    Created(V),
    Existing(Arc<SingletonHolder<V>>),
}

pub struct SingletonMap<K, V> {
    map: DashMap<K, Arc<SingletonHolder<V>>>,
    /// Holders that lost the insert race. They were never published, so they
    /// are still pristine.
    recycler: SegQueue<Arc<SingletonHolder<V>>>,
    constructor: Box<Constructor<K, V>>,
}

impl<K, V> SingletonMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn(&K) -> Result<Option<V>, BoxError> + Send + Sync + 'static,
    {
        Self {
            map: DashMap::new(),
            recycler: SegQueue::new(),
            constructor: Box::new(constructor),
        }
    }

    /// Return the value for `key`, constructing it if this is the first
    /// request. Blocks without bound while another thread constructs it.
    pub fn get(&self, key: &K) -> Result<V, SingletonError> {
        self.get_with(key, |holder| Ok(holder.wait()))
    }

    /// [`Self::get`], but a wait on another thread's construction ends with
    /// [`SingletonError::Interrupted`] once `interrupt` is cancelled.
    pub fn get_interruptible(
        &self,
        key: &K,
        interrupt: &CancellationToken,
    ) -> Result<V, SingletonError> {
        self.get_with(key, |holder| holder.wait_interruptible(interrupt))
    }

    /// Return the value for `key` if a construction was ever started for it,
    /// without starting one.
    ///
    /// This is not a non-blocking probe: if the construction is still running
    /// the call waits for it. Poisoned keys read as `None`.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.holder(key).and_then(|holder| holder.wait())
    }

    pub fn peek_interruptible(
        &self,
        key: &K,
        interrupt: &CancellationToken,
    ) -> Result<Option<V>, SingletonError> {
        match self.holder(key) {
            Some(holder) => holder.wait_interruptible(interrupt),
            None => Ok(None),
        }
    }

    /// All valid values present at call time, waiting for any that are still
    /// under construction.
    pub fn values(&self) -> Vec<V> {
        // Snapshot first; never block while holding a shard lock.
        let holders: Vec<_> = self.map.iter().map(|e| Arc::clone(e.value())).collect();
        holders.iter().filter_map(|holder| holder.wait()).collect()
    }

    /// Drop every slot. Constructions already running finish and hand their
    /// value to the callers waiting on them, but the value is not retained.
    pub fn clear(&self) {
        self.map.clear();
    }

    /// Number of slots, including poisoned and in-flight ones.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn holder(&self, key: &K) -> Option<Arc<SingletonHolder<V>>> {
        self.map.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn get_with<W>(&self, key: &K, wait: W) -> Result<V, SingletonError>
    where
        W: Fn(&SingletonHolder<V>) -> Result<Option<V>, SingletonError>,
    {
        let holder = match self.holder(key) {
            Some(holder) => holder,
            None => match self.create_singleton(key)? {
                Creation::Created(value) => return Ok(value),
                Creation::Existing(holder) => holder,
            },
        };
        wait(&holder)?.ok_or(SingletonError::InvalidResult(
            InvalidResult::PreviouslyInvalid,
        ))
    }

    /// Insert a fresh placeholder for `key`; if that wins, run the constructor
    /// and publish its result.
    fn create_singleton(&self, key: &K) -> Result<Creation<V>, SingletonError> {
        let fresh = self
            .recycler
            .pop()
            .unwrap_or_else(|| Arc::new(SingletonHolder::new()));

        let existing = match self.map.entry(key.clone()) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&fresh));
                None
            }
        };
        if let Some(existing) = existing {
            self.recycler.push(fresh);
            return Ok(Creation::Existing(existing));
        }

        let guard = InitGuard {
            holder: &fresh,
            completed: false,
        };
        match (self.constructor)(key) {
            Ok(Some(value)) => {
                guard.complete(Some(value.clone()));
                Ok(Creation::Created(value))
            }
            Ok(None) => {
                guard.complete(None);
                warn!("Singleton constructor for {:?} returned no value", key);
                Err(SingletonError::InvalidResult(InvalidResult::NoValue))
            }
            Err(e) => {
                guard.complete(None);
                warn!("Exception while attempting to create singleton {:?}: {}", key, e);
                Err(SingletonError::Construction(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_map(
        counter: Arc<AtomicUsize>,
    ) -> SingletonMap<String, Arc<String>> {
        SingletonMap::new(move |key: &String| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Arc::new(format!("value-of-{key}"))))
        })
    }

    #[test]
    fn test_concurrent_get_constructs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let map = counting_map(counter.clone());
        let threads = 16;
        let barrier = Barrier::new(threads);

        let results: Vec<Arc<String>> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        map.get(&"k".to_string()).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), threads);
        for value in &results {
            assert!(Arc::ptr_eq(value, &results[0]));
        }
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_no_value_poisons_key_permanently() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let map: SingletonMap<u32, Arc<u32>> = SingletonMap::new(move |_key: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        let first = map.get(&7).unwrap_err();
        assert!(matches!(
            first,
            SingletonError::InvalidResult(InvalidResult::NoValue)
        ));

        let second = map.get(&7).unwrap_err();
        assert!(matches!(
            second,
            SingletonError::InvalidResult(InvalidResult::PreviouslyInvalid)
        ));
        assert!(second.is_invalid_result());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(map.peek(&7).is_none());
        assert!(map.values().is_empty());
    }

    #[test]
    fn test_constructor_error_reaches_first_caller_only() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let map: SingletonMap<u32, Arc<u32>> = SingletonMap::new(move |key: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            if *key == 1 {
                Err("disk on fire".into())
            } else {
                Ok(Some(Arc::new(*key)))
            }
        });

        match map.get(&1) {
            Err(SingletonError::Construction(e)) => assert_eq!(e.to_string(), "disk on fire"),
            other => panic!("expected construction error, got {:?}", other),
        }
        assert!(matches!(
            map.get(&1),
            Err(SingletonError::InvalidResult(InvalidResult::PreviouslyInvalid))
        ));

        // Unrelated keys are unaffected.
        assert_eq!(*map.get(&2).unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_constructor_releases_slot() {
        let map: SingletonMap<u32, Arc<u32>> =
            SingletonMap::new(|_key: &u32| panic!("constructor blew up"));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| map.get(&3)));
        assert!(outcome.is_err());

        // The slot was marked ready, so this returns instead of hanging.
        assert!(matches!(
            map.get(&3),
            Err(SingletonError::InvalidResult(InvalidResult::PreviouslyInvalid))
        ));
    }

    #[test]
    fn test_peek_does_not_construct() {
        let counter = Arc::new(AtomicUsize::new(0));
        let map = counting_map(counter.clone());

        assert!(map.peek(&"a".to_string()).is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(map.is_empty());

        let value = map.get(&"a".to_string()).unwrap();
        let peeked = map.peek(&"a".to_string()).unwrap();
        assert!(Arc::ptr_eq(&value, &peeked));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_values_and_clear() {
        let counter = Arc::new(AtomicUsize::new(0));
        let map = counting_map(counter);

        let b = map.get(&"b".to_string()).unwrap();
        let a = map.get(&"a".to_string()).unwrap();

        let mut values: Vec<String> = map.values().iter().map(|v| v.to_string()).collect();
        values.sort();
        assert_eq!(values, vec![a.to_string(), b.to_string()]);

        map.clear();
        assert!(map.values().is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_clear_does_not_disturb_in_flight_construction() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let (s, r) = (started.clone(), release.clone());
        let map: SingletonMap<&'static str, Arc<String>> =
            SingletonMap::new(move |key: &&'static str| {
                if *key == "slow" {
                    s.wait();
                    r.wait();
                }
                Ok(Some(Arc::new(key.to_string())))
            });

        thread::scope(|scope| {
            let worker = scope.spawn(|| map.get(&"slow"));

            started.wait();
            map.clear();
            assert!(map.values().is_empty());
            release.wait();

            let value = worker.join().unwrap().unwrap();
            assert_eq!(value.as_str(), "slow");
        });

        assert!(map.values().is_empty());
        assert_eq!(map.get(&"fast").unwrap().as_str(), "fast");
        assert_eq!(map.values().len(), 1);
    }

    #[test]
    fn test_interrupted_wait_is_distinct() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let (s, r) = (started.clone(), release.clone());
        let map: SingletonMap<u8, Arc<u8>> = SingletonMap::new(move |key: &u8| {
            s.wait();
            r.wait();
            Ok(Some(Arc::new(*key)))
        });
        let interrupt = CancellationToken::new();

        thread::scope(|scope| {
            let constructor = scope.spawn(|| map.get(&1));
            started.wait();

            let waiter = scope.spawn(|| map.get_interruptible(&1, &interrupt));
            interrupt.cancel();
            let waited = waiter.join().unwrap();
            assert!(matches!(waited, Err(SingletonError::Interrupted)));
            assert!(!waited.unwrap_err().is_invalid_result());

            release.wait();
            assert_eq!(*constructor.join().unwrap().unwrap(), 1);
        });

        // Once the value exists a cancelled token no longer matters.
        assert_eq!(*map.get_interruptible(&1, &interrupt).unwrap(), 1);
        assert_eq!(map.peek_interruptible(&1, &interrupt).unwrap().as_deref(), Some(&1));
    }

    #[test]
    fn test_recycled_holders_are_indistinguishable() {
        let counter = Arc::new(AtomicUsize::new(0));
        let map = counting_map(counter.clone());
        let barrier = Barrier::new(8);

        // Lots of racing losers feed the recycler; later keys reuse them.
        for round in 0..20 {
            let key = format!("k{round}");
            thread::scope(|s| {
                for _ in 0..8 {
                    s.spawn(|| {
                        barrier.wait();
                        map.get(&key).unwrap()
                    });
                }
            });
        }

        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(map.values().len(), 20);
        for round in 0..20 {
            let key = format!("k{round}");
            assert_eq!(map.peek(&key).unwrap().as_str(), format!("value-of-{key}"));
        }
    }
}
