use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::cache::CancelToken;
use crate::foundation::error::{MediaError, MediaResult};

/// How often a blocked waiter re-checks its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(5);

/// Outcome of a cache lookup: a shared value or the error that produced it.
#[derive(Debug)]
pub enum CacheEntry<T> {
    /// Successfully computed value.
    Value(Arc<T>),
    /// Computation failed with this error.
    Error(Arc<MediaError>),
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(v) => Self::Value(Arc::clone(v)),
            Self::Error(e) => Self::Error(Arc::clone(e)),
        }
    }
}

impl<T> CacheEntry<T> {
    /// Entry carrying `err`.
    pub fn from_error(err: MediaError) -> Self {
        Self::Error(Arc::new(err))
    }

    /// Entry returned to a caller that stopped waiting.
    pub fn cancelled() -> Self {
        Self::from_error(MediaError::Cancelled)
    }

    /// The value, when present.
    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            Self::Value(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    /// The error, when present.
    pub fn error(&self) -> Option<&MediaError> {
        match self {
            Self::Value(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    /// `true` for [`CacheEntry::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// `true` for the entry handed to callers whose wait or computation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.error().is_some_and(MediaError::is_cancelled)
    }

    /// Convert into a `Result`, cloning the cached error.
    pub fn into_result(self) -> MediaResult<Arc<T>> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Error(e) => Err(MediaError::clone(&e)),
        }
    }
}

enum Outcome<T> {
    Done(CacheEntry<T>),
    Abandoned,
}

struct Flight<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    ready: Condvar,
}

impl<T> Flight<T> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, outcome: Outcome<T>) {
        *lock(&self.outcome) = Some(outcome);
        self.ready.notify_all();
    }

    /// Block until the computing thread finishes. `None` means retry the lookup.
    fn wait(&self, cancel: &CancelToken) -> Option<CacheEntry<T>> {
        let mut outcome = lock(&self.outcome);
        loop {
            match &*outcome {
                Some(Outcome::Done(entry)) => return Some(entry.clone()),
                Some(Outcome::Abandoned) => return None,
                None => {}
            }
            if cancel.is_cancelled() {
                return Some(CacheEntry::cancelled());
            }
            outcome = self
                .ready
                .wait_timeout(outcome, CANCEL_POLL)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}

enum Slot<T> {
    Ready { entry: CacheEntry<T>, tick: u64 },
    Pending(Arc<Flight<T>>),
}

struct Table<K, T> {
    slots: HashMap<K, Slot<T>>,
    order: BTreeMap<u64, K>,
    next_tick: u64,
    capacity: usize,
}

impl<K: Clone + Eq + Hash, T> Table<K, T> {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn evict_to_capacity(&mut self) {
        while self.order.len() > self.capacity {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.slots.remove(&key);
            tracing::debug!(remaining = self.order.len(), "cache entry evicted");
        }
    }

    fn remove(&mut self, key: &K) {
        if let Some(Slot::Ready { tick, .. }) = self.slots.remove(key) {
            self.order.remove(&tick);
        }
    }
}

/// Bounded least-recently-used map with at most one computation in flight per key.
///
/// Every entry costs one unit of capacity. Values and errors are both retained; cancelled
/// computations are not. Callers asking for a key that is being computed block until the
/// computation finishes, then share its result.
pub struct LruCache<K, T> {
    table: Mutex<Table<K, T>>,
}

impl<K, T> std::fmt::Debug for LruCache<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = lock(&self.table);
        f.debug_struct("LruCache")
            .field("len", &table.order.len())
            .field("capacity", &table.capacity)
            .finish()
    }
}

impl<K: Clone + Eq + Hash, T> LruCache<K, T> {
    /// Empty cache retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            table: Mutex::new(Table {
                slots: HashMap::new(),
                order: BTreeMap::new(),
                next_tick: 0,
                capacity,
            }),
        }
    }

    /// Look `key` up, computing and publishing it on a miss.
    ///
    /// `compute` runs on the calling thread without the table lock held. If it returns
    /// [`MediaError::Cancelled`] or panics, nothing is cached and blocked callers retry.
    pub fn get_or_compute<F>(&self, key: &K, cancel: &CancelToken, compute: F) -> CacheEntry<T>
    where
        F: FnOnce() -> MediaResult<T>,
    {
        let flight = loop {
            let waiting = {
                let mut table = lock(&self.table);
                let tick = table.tick();
                let table = &mut *table;
                match table.slots.get_mut(key) {
                    Some(Slot::Ready { entry, tick: used }) => {
                        table.order.remove(&*used);
                        *used = tick;
                        table.order.insert(tick, key.clone());
                        tracing::debug!("cache hit");
                        return entry.clone();
                    }
                    Some(Slot::Pending(flight)) => Arc::clone(flight),
                    None => {
                        let flight = Arc::new(Flight::new());
                        table
                            .slots
                            .insert(key.clone(), Slot::Pending(Arc::clone(&flight)));
                        break flight;
                    }
                }
            };
            if let Some(entry) = waiting.wait(cancel) {
                return entry;
            }
        };

        let mut guard = FlightGuard {
            cache: self,
            key,
            flight,
            published: false,
        };
        let entry = match compute() {
            Ok(value) => CacheEntry::Value(Arc::new(value)),
            Err(e) if e.is_cancelled() => return CacheEntry::cancelled(),
            Err(e) => CacheEntry::from_error(e),
        };
        guard.publish(entry.clone());
        entry
    }

    /// Drop `key`; an in-flight computation finishes but is not retained.
    pub fn erase(&self, key: &K) {
        lock(&self.table).remove(key);
    }

    /// Drop every key matching `pred`.
    pub fn erase_where(&self, mut pred: impl FnMut(&K) -> bool) {
        let mut table = lock(&self.table);
        let doomed: Vec<K> = table.slots.keys().filter(|k| pred(k)).cloned().collect();
        for key in &doomed {
            table.remove(key);
        }
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut table = lock(&self.table);
        table.slots.clear();
        table.order.clear();
    }

    /// Change the capacity, evicting least recently used entries immediately.
    pub fn set_capacity(&self, capacity: usize) {
        let mut table = lock(&self.table);
        table.capacity = capacity;
        table.evict_to_capacity();
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        lock(&self.table).capacity
    }

    /// Number of retained (completed) entries.
    pub fn len(&self) -> usize {
        lock(&self.table).order.len()
    }

    /// `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed entry for `key`, if any; never computes and does not touch recency.
    pub fn peek(&self, key: &K) -> Option<CacheEntry<T>> {
        match lock(&self.table).slots.get(key) {
            Some(Slot::Ready { entry, .. }) => Some(entry.clone()),
            _ => None,
        }
    }

    /// `true` when `key` holds a completed entry; does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        matches!(lock(&self.table).slots.get(key), Some(Slot::Ready { .. }))
    }
}

/// Clears the in-flight marker and wakes waiters if the computation never published.
struct FlightGuard<'a, K: Clone + Eq + Hash, T> {
    cache: &'a LruCache<K, T>,
    key: &'a K,
    flight: Arc<Flight<T>>,
    published: bool,
}

impl<K: Clone + Eq + Hash, T> FlightGuard<'_, K, T> {
    fn publish(&mut self, entry: CacheEntry<T>) {
        {
            let mut table = lock(&self.cache.table);
            if self.owns_slot(&table) {
                let tick = table.tick();
                table.slots.insert(
                    self.key.clone(),
                    Slot::Ready {
                        entry: entry.clone(),
                        tick,
                    },
                );
                table.order.insert(tick, self.key.clone());
                table.evict_to_capacity();
            }
        }
        self.flight.finish(Outcome::Done(entry));
        self.published = true;
    }

    fn owns_slot(&self, table: &MutexGuard<'_, Table<K, T>>) -> bool {
        matches!(
            table.slots.get(self.key),
            Some(Slot::Pending(f)) if Arc::ptr_eq(f, &self.flight)
        )
    }
}

impl<K: Clone + Eq + Hash, T> Drop for FlightGuard<'_, K, T> {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        {
            let mut table = lock(&self.cache.table);
            if self.owns_slot(&table) {
                table.slots.remove(self.key);
            }
        }
        tracing::debug!("cache computation abandoned");
        self.flight.finish(Outcome::Abandoned);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "../../tests/unit/cache/lru.rs"]
mod tests;
