//! # Query Cache
//!
//! Keyed store of fetched API data with staleness and retention windows.
//!
//! ## Entry Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Cache Entry                                 │
//! │                                                                         │
//! │  fetched_at          stale_at                      expires_at           │
//! │      │◄── stale_after ──►│                              │               │
//! │      │◄──────────────────── retain_for ───────────────►│               │
//! │      │                   │                              │               │
//! │   FRESH: reads return    STALE: reads refetch,          EXPIRED: reads  │
//! │   cached data, no call   old data still visible         see no entry,   │
//! │                                                         sweep evicts    │
//! │                                                                         │
//! │  invalidate(prefix) jumps straight to STALE without touching the data. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## De-duplication
//! ```text
//! read(k) ──► fresh? ──yes──► cached data
//!               │no
//!               ▼
//!         in flight for k? ──yes──► await the same shared fetch
//!               │no
//!               ▼
//!         spawn fetch task, publish it as in flight, await it
//! ```
//!
//! The fetch itself runs as a spawned task, so the cache write happens
//! exactly once even if every caller awaiting it is dropped.
//!
//! All state sits behind one `std::sync::Mutex`. The lock is never held
//! across an `.await` and never while a subscriber callback runs.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use nexus_core::QueryKey;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{SyncError, SyncResult};

/// Produces the JSON for one key. Called once per underlying fetch.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, SyncResult<Value>> + Send + Sync>;

/// A fetch that any number of callers can await.
pub type InFlightFetch = Shared<BoxFuture<'static, SyncResult<Value>>>;

type Listener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// Wraps an async closure as a [`Fetcher`].
pub fn fetcher<F, Fut>(f: F) -> Fetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<Value>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

// =============================================================================
// Options
// =============================================================================

/// Staleness and retention windows for a query.
///
/// Retention is never shorter than staleness; [`QueryOptions::new`] raises
/// it when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    stale: Duration,
    retain: Duration,
}

impl QueryOptions {
    pub fn new(stale: Duration, retain: Duration) -> Self {
        QueryOptions {
            stale,
            retain: retain.max(stale),
        }
    }

    pub fn from_millis(stale_ms: u64, retain_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(stale_ms),
            Duration::from_millis(retain_ms),
        )
    }

    pub fn stale(&self) -> Duration {
        self.stale
    }

    pub fn retain(&self) -> Duration {
        self.retain
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            stale: Duration::ZERO,
            retain: Duration::from_secs(300),
        }
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::Idle => write!(f, "idle"),
            QueryStatus::Loading => write!(f, "loading"),
            QueryStatus::Success => write!(f, "success"),
            QueryStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of one cached query.
///
/// The cache owns the live entry; callers only ever see clones.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    key: QueryKey,
    data: Option<Value>,
    /// Set only by a successful fetch or `set`.
    fetched_at: Option<Instant>,
    created_at: Instant,
    options: QueryOptions,
    status: QueryStatus,
    error: Option<SyncError>,
    invalidated: bool,
    /// Bumped by every invalidation. A fetch that started under an older
    /// generation stores its data as already stale.
    generation: u64,
    /// Id of the newest fetch started or `set` applied. A detached fetch
    /// only lands while it is still the newest.
    latest_write: u64,
}

impl CacheEntry {
    fn new(key: QueryKey, options: QueryOptions, now: Instant) -> Self {
        CacheEntry {
            key,
            data: None,
            fetched_at: None,
            created_at: now,
            options,
            status: QueryStatus::Idle,
            error: None,
            invalidated: false,
            generation: 0,
            latest_write: 0,
        }
    }

    /// Forgets everything but the key and options.
    fn reset(&mut self, now: Instant) {
        self.data = None;
        self.fetched_at = None;
        self.created_at = now;
        self.status = QueryStatus::Idle;
        self.error = None;
        self.invalidated = false;
    }

    fn record_success(&mut self, data: Value, now: Instant, generation: u64) {
        self.data = Some(data);
        self.fetched_at = Some(now);
        self.status = QueryStatus::Success;
        self.error = None;
        self.invalidated = generation != self.generation;
    }

    fn record_error(&mut self, error: SyncError) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
    }

    /// Status the entry would have with no fetch running.
    fn settled_status(&self) -> QueryStatus {
        match (&self.error, &self.data) {
            (Some(_), _) => QueryStatus::Error,
            (None, Some(_)) => QueryStatus::Success,
            (None, None) => QueryStatus::Idle,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Last good data. Kept through errors and invalidation.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Error from the most recent failed fetch, cleared by the next success.
    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn stale_after(&self) -> Duration {
        self.options.stale
    }

    pub fn retain_for(&self) -> Duration {
        self.options.retain
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// When the data stops being fresh.
    pub fn stale_at(&self) -> Option<Instant> {
        self.fetched_at.map(|at| at + self.options.stale)
    }

    /// When the entry may be evicted. Measured from the last successful
    /// fetch, or from creation if there never was one.
    pub fn expires_at(&self) -> Instant {
        self.fetched_at.unwrap_or(self.created_at) + self.options.retain
    }

    pub fn is_stale_at(&self, now: Instant) -> bool {
        self.invalidated
            || self.data.is_none()
            || self.stale_at().map_or(true, |stale_at| now >= stale_at)
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    pub fn is_fresh_at(&self, now: Instant) -> bool {
        !self.is_stale_at(now) && !self.is_expired_at(now)
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }
}

// =============================================================================
// Shared State
// =============================================================================

struct InFlight {
    id: u64,
    fetch: InFlightFetch,
}

type Notification = (Vec<Listener>, CacheEntry);

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    in_flight: HashMap<QueryKey, InFlight>,
    /// Last fetcher used per key, for refetches that have no caller.
    fetchers: HashMap<QueryKey, Fetcher>,
    listeners: HashMap<QueryKey, Vec<(u64, Listener)>>,
    next_id: u64,
    /// Bumped by `clear`; fetches from an older epoch are dropped.
    epoch: u64,
}

impl CacheState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn notification(&self, key: &QueryKey) -> Option<Notification> {
        let listeners = self.listeners.get(key)?;
        let entry = self.entries.get(key)?;
        Some((
            listeners.iter().map(|(_, l)| l.clone()).collect(),
            entry.clone(),
        ))
    }
}

fn notify(notification: Option<Notification>) {
    if let Some((listeners, entry)) = notification {
        for listener in listeners {
            listener(&entry);
        }
    }
}

// =============================================================================
// Query Cache
// =============================================================================

/// Process-memory query cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    defaults: QueryOptions,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_defaults(QueryOptions::default())
    }

    /// Cache whose directly-`set` entries use `defaults`.
    pub fn with_defaults(defaults: QueryOptions) -> Self {
        QueryCache {
            state: Arc::new(Mutex::new(CacheState::default())),
            defaults,
        }
    }

    pub fn defaults(&self) -> QueryOptions {
        self.defaults
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Entry for `key`. Expired entries read as absent.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned()
    }

    /// Cached data for `key`, fresh or not.
    pub fn get_data(&self, key: &QueryKey) -> Option<Value> {
        self.get(key).and_then(|entry| entry.data)
    }

    /// Cached data for `key` only if it is fresh.
    pub fn fresh_data(&self, key: &QueryKey) -> Option<Value> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now))
            .and_then(|entry| entry.data.clone())
    }

    /// True while a fetch for `key` is running.
    pub fn is_loading(&self, key: &QueryKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .map_or(false, CacheEntry::is_loading)
    }

    /// Every stored key.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Stored keys under `prefix`.
    pub fn keys_matching(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        self.lock()
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Freshness-aware read: cached data when fresh, otherwise a fetch
    /// (joining one already in flight).
    pub async fn read(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: Fetcher,
    ) -> SyncResult<Value> {
        if let Some(data) = self.fresh_data(key) {
            trace!(key = %key, "Cache hit");
            return Ok(data);
        }
        self.start_fetch(key, options, fetcher).await
    }

    /// Fetches regardless of freshness, joining any fetch in flight.
    pub async fn fetch(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: Fetcher,
    ) -> SyncResult<Value> {
        self.start_fetch(key, options, fetcher).await
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Starts a fetch for `key`, or returns the one already in flight.
    ///
    /// Must be called inside a Tokio runtime. The returned future does not
    /// need to be awaited for the result to land in the cache.
    pub fn start_fetch(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: Fetcher,
    ) -> InFlightFetch {
        let now = Instant::now();
        let (fetch, notification) = {
            let mut state = self.lock();
            state.fetchers.insert(key.clone(), fetcher.clone());

            if let Some(in_flight) = state.in_flight.get(key) {
                trace!(key = %key, "Joining in-flight fetch");
                return in_flight.fetch.clone();
            }

            let id = state.next_id();
            let epoch = state.epoch;
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), options, now));
            if entry.is_expired_at(now) {
                entry.reset(now);
            }
            entry.options = options;
            entry.status = QueryStatus::Loading;
            entry.latest_write = id;
            let generation = entry.generation;

            let task = tokio::spawn(self.clone().run_fetch(
                key.clone(),
                id,
                epoch,
                generation,
                fetcher,
            ));
            let fetch = async move {
                task.await
                    .unwrap_or_else(|e| Err(SyncError::Internal(format!("Fetch task failed: {}", e))))
            }
            .boxed()
            .shared();

            state.in_flight.insert(
                key.clone(),
                InFlight {
                    id,
                    fetch: fetch.clone(),
                },
            );
            debug!(key = %key, "Fetch started");

            (fetch, state.notification(key))
        };

        notify(notification);
        fetch
    }

    /// Refetches `key` with its last known fetcher. `None` if the key was
    /// never fetched through this cache.
    pub fn start_refetch(&self, key: &QueryKey) -> Option<InFlightFetch> {
        let (fetcher, options) = {
            let state = self.lock();
            let fetcher = state.fetchers.get(key)?.clone();
            let options = state
                .entries
                .get(key)
                .map_or(self.defaults, CacheEntry::options);
            (fetcher, options)
        };
        Some(self.start_fetch(key, options, fetcher))
    }

    /// Remembers how to fetch `key` without fetching it.
    pub fn set_fetcher(&self, key: &QueryKey, fetcher: Fetcher) {
        self.lock().fetchers.insert(key.clone(), fetcher);
    }

    async fn run_fetch(
        self,
        key: QueryKey,
        id: u64,
        epoch: u64,
        generation: u64,
        fetcher: Fetcher,
    ) -> SyncResult<Value> {
        let result = fetcher().await;

        let notification = {
            let mut state = self.lock();

            if state.epoch != epoch {
                debug!(key = %key, "Cache cleared while fetching, result dropped");
                return result;
            }

            let detached = match state.in_flight.get(&key).map(|f| f.id) {
                Some(current) if current == id => {
                    state.in_flight.remove(&key);
                    false
                }
                Some(_) => {
                    debug!(key = %key, "Superseded by a newer fetch, result dropped");
                    return result;
                }
                // Detached by invalidation
                None => true,
            };

            let now = Instant::now();
            match state.entries.get_mut(&key) {
                Some(entry) if detached && entry.latest_write != id => {
                    debug!(key = %key, "Newer data already stored, detached result dropped");
                    None
                }
                Some(entry) => {
                    match &result {
                        Ok(data) => {
                            entry.record_success(data.clone(), now, generation);
                            debug!(key = %key, stale = entry.invalidated, "Fetch succeeded");
                        }
                        Err(error) => {
                            entry.record_error(error.clone());
                            warn!(key = %key, kind = error.kind(), %error, "Fetch failed");
                        }
                    }
                    state.notification(&key)
                }
                None => {
                    debug!(key = %key, "Entry removed while fetching, result dropped");
                    None
                }
            }
        };

        notify(notification);
        result
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes fresh data for `key` as if it had just been fetched. A new
    /// entry gets the cache defaults; an existing one keeps its options.
    pub fn set(&self, key: &QueryKey, data: Value) {
        self.write(key, data, None);
    }

    /// Like [`QueryCache::set`], replacing the entry's options.
    pub fn set_with_options(&self, key: &QueryKey, data: Value, options: QueryOptions) {
        self.write(key, data, Some(options));
    }

    fn write(&self, key: &QueryKey, data: Value, options: Option<QueryOptions>) {
        let now = Instant::now();
        let notification = {
            let mut state = self.lock();
            let id = state.next_id();
            let initial = options.unwrap_or(self.defaults);
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), initial, now));
            if let Some(options) = options {
                entry.options = options;
            }
            entry.latest_write = id;
            let generation = entry.generation;
            entry.record_success(data, now, generation);
            debug!(key = %key, "Entry set");
            state.notification(key)
        };
        notify(notification);
    }

    /// Marks `key` as failed. Previously cached data stays readable.
    pub fn set_error(&self, key: &QueryKey, error: SyncError) {
        let now = Instant::now();
        let notification = {
            let mut state = self.lock();
            let defaults = self.defaults;
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), defaults, now));
            if entry.is_expired_at(now) {
                entry.reset(now);
            }
            entry.record_error(error);
            state.notification(key)
        };
        notify(notification);
    }

    /// Marks every entry under `prefix` stale without deleting its data,
    /// and detaches fetches in flight for those keys.
    ///
    /// Returns the keys whose state changed. An entry that is already
    /// stale with nothing in flight is left alone.
    pub fn invalidate(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        let now = Instant::now();
        let (marked, notifications) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let mut marked = Vec::new();

            for (key, entry) in state.entries.iter_mut() {
                if !key.starts_with(prefix) {
                    continue;
                }
                let detached = state.in_flight.remove(key).is_some();
                if !detached && entry.is_stale_at(now) {
                    continue;
                }
                if detached {
                    entry.status = entry.settled_status();
                }
                state.next_id += 1;
                entry.generation = state.next_id;
                entry.invalidated = true;
                marked.push(key.clone());
            }

            let notifications: Vec<_> = marked
                .iter()
                .filter_map(|key| state.notification(key))
                .collect();
            (marked, notifications)
        };

        for notification in notifications {
            notify(Some(notification));
        }

        debug!(prefix = %prefix, count = marked.len(), "Invalidated");
        marked
    }

    /// Drops one entry.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let mut state = self.lock();
        state.in_flight.remove(key);
        state.entries.remove(key).is_some()
    }

    /// Drops every entry and forgets fetches in flight. Subscriptions and
    /// known fetchers survive.
    pub fn clear(&self) {
        let mut state = self.lock();
        let count = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        state.epoch += 1;
        debug!(count, "Cache cleared");
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Calls `callback` on every state transition of `key` until the
    /// returned handle is dropped.
    pub fn subscribe<F>(&self, key: &QueryKey, callback: F) -> Subscription
    where
        F: Fn(&CacheEntry) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_id();
        state
            .listeners
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            state: Arc::downgrade(&self.state),
            key: key.clone(),
            id,
        }
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock().listeners.get(key).map_or(0, Vec::len)
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Removes expired entries that nobody subscribes to and nothing is
    /// fetching. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let before = state.entries.len();
        let listeners = &state.listeners;
        let in_flight = &state.in_flight;
        state.entries.retain(|key, entry| {
            !entry.is_expired_at(now) || listeners.contains_key(key) || in_flight.contains_key(key)
        });
        let removed = before - state.entries.len();

        let entries = &state.entries;
        state
            .fetchers
            .retain(|key, _| entries.contains_key(key) || listeners.contains_key(key));

        if removed > 0 {
            debug!(removed, "Evicted expired entries");
        }
        removed
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Unsubscribes on drop.
pub struct Subscription {
    state: Weak<Mutex<CacheState>>,
    key: QueryKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(listeners) = state.listeners.get_mut(&self.key) {
            listeners.retain(|(id, _)| *id != self.id);
            if listeners.is_empty() {
                state.listeners.remove(&self.key);
            }
        }
    }
}
