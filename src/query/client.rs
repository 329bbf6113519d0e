//! The query cache
//!
//! `QueryClient` owns every cache entry, deduplicates concurrent fetches per
//! key, applies completions in a well-defined order, and notifies
//! subscribers after each state transition.
//!
//! # Concurrency
//! Loaders run in spawned Tokio tasks, so a fetch always runs to completion
//! even if every awaiter and subscriber has gone away. Store state lives
//! behind one mutex that is held only for bookkeeping: never across an
//! `.await` and never while a listener runs. Ordering between racing fetches
//! is decided by logical ticks (see [`super::entry`]), not by the lock.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::{debug, warn};

use super::entry::{CacheEntry, QueryState, QueryStatus};
use super::error::LoaderError;
use super::key::{KeyFilter, QueryKey};

/// Future produced by a loader
pub type LoaderFuture<T> = BoxFuture<'static, Result<T, LoaderError>>;

/// Performs the actual I/O for a key; opaque to the cache
pub type Loader<T> = Arc<dyn Fn() -> LoaderFuture<T> + Send + Sync>;

/// Handle on an in-flight fetch, cloneable and awaitable by many callers
pub type FetchHandle<T> = Shared<LoaderFuture<T>>;

type Listener<T> = Arc<dyn Fn(&QueryState<T>) + Send + Sync>;

/// Wraps an async closure as a [`Loader`]
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, LoaderError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Cache-wide settings
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long a value counts as fresh after it lands. Zero means a value
    /// is stale as soon as any time passes, so every mount read revalidates.
    pub stale_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
        }
    }
}

struct Slot<T> {
    entry: CacheEntry<T>,
    loader: Option<Loader<T>>,
    in_flight: Option<(u64, FetchHandle<T>)>,
    listeners: Vec<(u64, Listener<T>)>,
    outbox: SharedOutbox<T>,
}

impl<T: Clone> Slot<T> {
    fn new(key: QueryKey) -> Self {
        Self {
            entry: CacheEntry::new(key),
            loader: None,
            in_flight: None,
            listeners: Vec::new(),
            outbox: Arc::new(Mutex::new(Outbox {
                queue: VecDeque::new(),
                draining: false,
            })),
        }
    }
}

struct Inner<T> {
    slots: HashMap<QueryKey, Slot<T>>,
    /// Logical clock shared by fetch starts and invalidations
    clock: u64,
    next_listener: u64,
}

impl<T> Inner<T> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Per-key queue of notifications awaiting delivery
///
/// Snapshots are queued while the store lock is held, so the queue order is
/// the order of the transitions. One thread at a time drains it and calls
/// the listeners with no lock held; anyone else who finds it draining only
/// enqueues. Listeners may call back into the client.
struct Outbox<T> {
    queue: VecDeque<(Vec<Listener<T>>, QueryState<T>)>,
    draining: bool,
}

type SharedOutbox<T> = Arc<Mutex<Outbox<T>>>;

fn lock_outbox<T>(outbox: &Mutex<Outbox<T>>) -> MutexGuard<'_, Outbox<T>> {
    outbox
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the draining flag even if a listener panics
struct DrainGuard<'a, T> {
    outbox: &'a Mutex<Outbox<T>>,
    finished: bool,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            lock_outbox(self.outbox).draining = false;
        }
    }
}

fn drain<T>(outbox: &Mutex<Outbox<T>>) {
    {
        let mut guard = lock_outbox(outbox);
        if guard.draining {
            return;
        }
        guard.draining = true;
    }
    let mut drain_guard = DrainGuard {
        outbox,
        finished: false,
    };
    loop {
        let next = {
            let mut guard = lock_outbox(outbox);
            let next = guard.queue.pop_front();
            if next.is_none() {
                guard.draining = false;
                drain_guard.finished = true;
            }
            next
        };
        let Some((listeners, state)) = next else {
            return;
        };
        for listener in listeners {
            listener(&state);
        }
    }
}

/// Outboxes written to under the lock, drained after releasing it
struct Pending<T> {
    outboxes: Vec<SharedOutbox<T>>,
}

impl<T> Pending<T> {
    fn new() -> Self {
        Self {
            outboxes: Vec::new(),
        }
    }

    /// Queues `state` for the slot's current listeners; call with the store locked
    fn push(&mut self, slot: &Slot<T>, state: QueryState<T>) {
        if slot.listeners.is_empty() {
            return;
        }
        lock_outbox(&slot.outbox)
            .queue
            .push_back((listeners_of(slot), state));
        if !self
            .outboxes
            .iter()
            .any(|outbox| Arc::ptr_eq(outbox, &slot.outbox))
        {
            self.outboxes.push(Arc::clone(&slot.outbox));
        }
    }

    fn deliver(self) {
        for outbox in self.outboxes {
            drain(&outbox);
        }
    }
}

/// Keyed request cache with deduplication and invalidation
///
/// Every clone shares the same store. Methods that
/// start fetches must be called from within a Tokio runtime.
pub struct QueryClient<T> {
    inner: Arc<Mutex<Inner<T>>>,
    config: QueryConfig,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for QueryClient<T> {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl<T: Clone + Send + Sync + 'static> QueryClient<T> {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                clock: 0,
                next_listener: 0,
            })),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        lock_inner(&self.inner)
    }

    /// Returns the entry for `key`, creating an Idle one if needed
    pub fn get(&self, key: &QueryKey) -> QueryState<T> {
        let mut inner = self.lock();
        let slot = inner
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone()));
        slot.entry
            .snapshot(slot.in_flight.is_some(), self.config.stale_time)
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<T> {
        let inner = self.lock();
        inner
            .slots
            .get(key)
            .and_then(|slot| slot.entry.data().cloned())
    }

    /// Fetches `key` with `loader`, joining the in-flight fetch if there is one
    pub fn fetch(&self, key: &QueryKey, loader: Loader<T>) -> FetchHandle<T> {
        let mut pending = Pending::new();
        let handle = {
            let mut inner = self.lock();
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone()));
            slot.loader = Some(loader);
            let joined = slot
                .in_flight
                .as_ref()
                .map(|(fetch_id, handle)| (*fetch_id, handle.clone()));
            match joined {
                Some((fetch_id, handle)) => {
                    debug!(key = %key, fetch_id, "joining in-flight fetch");
                    handle
                }
                None => self.start_fetch(&mut inner, key, &mut pending),
            }
        };
        pending.deliver();
        handle
    }

    /// Starts a new fetch with the key's stored loader, even if one is in flight
    ///
    /// The new fetch supersedes the old one: whichever of them started later
    /// decides the final state. Returns `None` when no loader was ever used
    /// for `key`.
    pub fn refetch(&self, key: &QueryKey) -> Option<FetchHandle<T>> {
        let mut pending = Pending::new();
        let handle = {
            let mut inner = self.lock();
            let has_loader = inner
                .slots
                .get(key)
                .is_some_and(|slot| slot.loader.is_some());
            if !has_loader {
                return None;
            }
            self.start_fetch(&mut inner, key, &mut pending)
        };
        pending.deliver();
        Some(handle)
    }

    /// Mount-style read: returns the current state without waiting
    ///
    /// Schedules a background fetch when the entry has nothing yet, holds an
    /// error, or is stale, unless a fetch is already running. A key without
    /// a value therefore reads as Loading until its first fetch settles.
    pub fn read(&self, key: &QueryKey, loader: Loader<T>) -> QueryState<T> {
        let mut pending = Pending::new();
        let state = {
            let mut inner = self.lock();
            let stale_time = self.config.stale_time;
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone()));
            slot.loader = Some(loader);
            let needs_fetch = slot.in_flight.is_none()
                && (matches!(slot.entry.status(), QueryStatus::Idle | QueryStatus::Error)
                    || slot.entry.is_stale(stale_time, tokio::time::Instant::now()));
            if needs_fetch {
                self.start_fetch(&mut inner, key, &mut pending);
            }
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone()));
            slot.entry.snapshot(slot.in_flight.is_some(), stale_time)
        };
        pending.deliver();
        state
    }

    /// Marks matching entries stale and refetches the ones being watched
    ///
    /// Values are kept so observers can keep showing them while the refetch
    /// runs. Returns how many entries matched.
    pub fn invalidate(&self, filter: impl Into<KeyFilter>) -> usize {
        let filter = filter.into();
        let mut pending = Pending::new();
        let matched = {
            let mut inner = self.lock();
            let tick = inner.tick();
            let keys: Vec<QueryKey> = inner
                .slots
                .keys()
                .filter(|key| filter.matches(key))
                .cloned()
                .collect();

            for key in &keys {
                let Some(slot) = inner.slots.get_mut(key) else {
                    continue;
                };
                slot.entry.mark_stale(tick);
                let watched = !slot.listeners.is_empty() && slot.loader.is_some();
                if watched {
                    self.start_fetch(&mut inner, key, &mut pending);
                } else {
                    let state = slot
                        .entry
                        .snapshot(slot.in_flight.is_some(), self.config.stale_time);
                    pending.push(slot, state);
                }
            }
            debug!(filter = ?filter, matched = keys.len(), tick, "invalidated queries");
            keys.len()
        };
        pending.deliver();
        matched
    }

    /// Writes `value` as a fresh Success for `key`
    pub fn set_query_data(&self, key: &QueryKey, value: T) {
        let mut pending = Pending::new();
        {
            let mut inner = self.lock();
            let tick = inner.tick();
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone()));
            slot.entry.set_data(tick, value);
            let state = slot
                .entry
                .snapshot(slot.in_flight.is_some(), self.config.stale_time);
            pending.push(slot, state);
        }
        pending.deliver();
    }

    /// Calls `listener` after every state transition of `key`
    ///
    /// The listener stays registered until the returned [`Subscription`]
    /// is dropped.
    pub fn subscribe<F>(&self, key: &QueryKey, listener: F) -> Subscription<T>
    where
        F: Fn(&QueryState<T>) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_listener += 1;
        let id = inner.next_listener;
        inner
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone()))
            .listeners
            .push((id, Arc::new(listener)));
        debug!(key = %key, subscription = id, "subscribed");
        Subscription {
            id,
            key: key.clone(),
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock()
            .slots
            .get(key)
            .map_or(0, |slot| slot.listeners.len())
    }

    /// Spawns the slot's loader and records it as the tracked fetch
    ///
    /// The slot must exist and have a loader.
    fn start_fetch(
        &self,
        inner: &mut Inner<T>,
        key: &QueryKey,
        pending: &mut Pending<T>,
    ) -> FetchHandle<T> {
        let fetch_id = inner.tick();
        let stale_time = self.config.stale_time;
        let slot = inner
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone()));
        let loader = match &slot.loader {
            Some(loader) => Arc::clone(loader),
            None => {
                let missing: Loader<T> = Arc::new(|| {
                    futures::future::ready(Err(LoaderError::Aborted(
                        "no loader registered".to_string(),
                    )))
                    .boxed()
                });
                missing
            }
        };

        slot.entry.begin_fetch();
        debug!(key = %key, fetch_id, "fetch started");

        let client = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(loader())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(LoaderError::Aborted("loader panicked".to_string())));
            client.settle(&task_key, fetch_id, result.clone());
            result
        });
        let handle = async move {
            task.await
                .unwrap_or_else(|err| Err(LoaderError::Aborted(err.to_string())))
        }
        .boxed()
        .shared();

        slot.in_flight = Some((fetch_id, handle.clone()));
        let state = slot.entry.snapshot(true, stale_time);
        pending.push(slot, state);
        handle
    }

    /// Applies a finished fetch to its entry and notifies subscribers
    fn settle(&self, key: &QueryKey, fetch_id: u64, result: Result<T, LoaderError>) {
        let mut pending = Pending::new();
        {
            let mut inner = self.lock();
            let Some(slot) = inner.slots.get_mut(key) else {
                return;
            };
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|(tracked, _)| *tracked == fetch_id)
            {
                slot.in_flight = None;
            }
            if let Err(err) = &result {
                warn!(key = %key, fetch_id, error = %err, "fetch failed");
            }
            match slot.entry.settle(fetch_id, result) {
                Ok(()) => {
                    debug!(key = %key, fetch_id, "fetch settled");
                    let state = slot
                        .entry
                        .snapshot(slot.in_flight.is_some(), self.config.stale_time);
                    pending.push(slot, state);
                }
                Err(err) => {
                    debug!(error = %err, "discarded out-of-order completion");
                }
            }
        }
        pending.deliver();
    }
}

fn lock_inner<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn listeners_of<T>(slot: &Slot<T>) -> Vec<Listener<T>> {
    slot.listeners
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct Subscription<T> {
    id: u64,
    key: QueryKey,
    store: Weak<Mutex<Inner<T>>>,
}

impl<T> Subscription<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Explicit form of dropping the handle
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let mut inner = lock_inner(&store);
        if let Some(slot) = inner.slots.get_mut(&self.key) {
            slot.listeners.retain(|(id, _)| *id != self.id);
        }
        debug!(key = %self.key, subscription = self.id, "unsubscribed");
    }
}
