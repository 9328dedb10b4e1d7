//! # Poller
//!
//! Keeps selected keys fresh on a fixed cadence while somebody watches them.
//!
//! ## Registrations and Tickers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ["dashboard","resumen"]                                               │
//! │    ├── registration #1  every 60 s  enabled: has_token()               │
//! │    └── registration #2  every 15 s  enabled: || true                   │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │    ONE ticker task at min(60 s, 15 s) = 15 s                           │
//! │                                                                         │
//! │  On each tick:                                                         │
//! │    any registration enabled? ──no──► skip                              │
//! │    entry loading?            ──yes─► skip                              │
//! │    otherwise refetch, ignoring the staleness window                    │
//! │                                                                         │
//! │  Last registration dropped ──► ticker aborted, key forgotten           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use nexus_core::QueryKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::cache::QueryCache;
use crate::error::{SyncError, SyncResult};

/// Predicate gating a registration's ticks.
pub type EnabledFn = Arc<dyn Fn() -> bool + Send + Sync>;

struct Registration {
    id: u64,
    interval: Duration,
    enabled: EnabledFn,
}

struct KeyPoll {
    registrations: Vec<Registration>,
    interval: Duration,
    task: JoinHandle<()>,
}

impl KeyPoll {
    fn shortest_interval(&self) -> Option<Duration> {
        self.registrations.iter().map(|r| r.interval).min()
    }
}

#[derive(Default)]
struct PollerState {
    keys: HashMap<QueryKey, KeyPoll>,
    next_id: u64,
}

/// Schedules recurring refreshes through a [`QueryCache`].
#[derive(Clone)]
pub struct Poller {
    cache: QueryCache,
    state: Arc<Mutex<PollerState>>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("keys", &self.lock().keys.len())
            .finish()
    }
}

impl Poller {
    pub fn new(cache: QueryCache) -> Self {
        Poller {
            cache,
            state: Arc::new(Mutex::new(PollerState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Polls `key` every `interval` while `enabled()` holds, until the
    /// returned registration is dropped.
    ///
    /// The key must have a fetcher known to the cache by the first tick;
    /// ticks without one are skipped.
    pub fn register(
        &self,
        key: QueryKey,
        interval: Duration,
        enabled: EnabledFn,
    ) -> SyncResult<PollRegistration> {
        if interval.is_zero() {
            return Err(SyncError::InvalidConfig(format!(
                "poll interval for {} must be greater than 0",
                key
            )));
        }

        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        let registration = Registration {
            id,
            interval,
            enabled,
        };

        match state.keys.get_mut(&key) {
            Some(poll) => {
                poll.registrations.push(registration);
                if interval < poll.interval {
                    poll.task.abort();
                    poll.interval = interval;
                    poll.task = self.spawn_ticker(key.clone(), interval);
                    debug!(key = %key, ?interval, "Poll interval shortened");
                }
            }
            None => {
                let task = self.spawn_ticker(key.clone(), interval);
                state.keys.insert(
                    key.clone(),
                    KeyPoll {
                        registrations: vec![registration],
                        interval,
                        task,
                    },
                );
                debug!(key = %key, ?interval, "Polling started");
            }
        }

        Ok(PollRegistration {
            state: Arc::downgrade(&self.state),
            cache: self.cache.clone(),
            key,
            id,
        })
    }

    /// True while at least one registration for `key` is alive.
    pub fn is_polling(&self, key: &QueryKey) -> bool {
        self.lock().keys.contains_key(key)
    }

    /// Effective interval for `key`.
    pub fn interval(&self, key: &QueryKey) -> Option<Duration> {
        self.lock().keys.get(key).map(|poll| poll.interval)
    }

    fn spawn_ticker(&self, key: QueryKey, period: Duration) -> JoinHandle<()> {
        spawn_ticker(self.cache.clone(), Arc::downgrade(&self.state), key, period)
    }
}

fn spawn_ticker(
    cache: QueryCache,
    state: Weak<Mutex<PollerState>>,
    key: QueryKey,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(shared) = state.upgrade() else {
                break;
            };

            // Predicates run outside the lock
            let predicates: Vec<EnabledFn> = {
                let state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                match state.keys.get(&key) {
                    Some(poll) => poll.registrations.iter().map(|r| r.enabled.clone()).collect(),
                    None => break,
                }
            };

            if !predicates.iter().any(|enabled| enabled()) {
                trace!(key = %key, "Poll tick skipped, disabled");
                continue;
            }

            if cache.is_loading(&key) {
                trace!(key = %key, "Poll tick skipped, fetch in flight");
                continue;
            }

            match cache.start_refetch(&key) {
                Some(_) => trace!(key = %key, "Poll refetch started"),
                None => debug!(key = %key, "Poll tick skipped, no fetcher known"),
            }
        }
    })
}

// =============================================================================
// Registration Handle
// =============================================================================

/// Keeps a poll alive. Dropping it deregisters; dropping the last one for a
/// key stops that key's ticker at once.
pub struct PollRegistration {
    state: Weak<Mutex<PollerState>>,
    cache: QueryCache,
    key: QueryKey,
    id: u64,
}

impl PollRegistration {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl std::fmt::Debug for PollRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollRegistration")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for PollRegistration {
    fn drop(&mut self) {
        let Some(shared) = self.state.upgrade() else {
            return;
        };
        let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(poll) = state.keys.get_mut(&self.key) else {
            return;
        };
        poll.registrations.retain(|r| r.id != self.id);

        match poll.shortest_interval() {
            None => {
                poll.task.abort();
                state.keys.remove(&self.key);
                debug!(key = %self.key, "Polling stopped");
            }
            Some(interval) if interval != poll.interval => {
                poll.task.abort();
                poll.interval = interval;
                poll.task = spawn_ticker(
                    self.cache.clone(),
                    Arc::downgrade(&shared),
                    self.key.clone(),
                    interval,
                );
                debug!(key = %self.key, ?interval, "Poll interval lengthened");
            }
            Some(_) => {}
        }
    }
}
