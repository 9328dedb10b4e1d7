//! # Query Client
//!
//! The session object views talk to. It owns one cache, one poller and one
//! dispatcher, all sharing the same [`ApiClient`].
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          QueryClient                                    │
//! │                                                                         │
//! │   read_query / watch_query / prefetch        mutate                     │
//! │            │                                    │                       │
//! │            ▼                                    ▼                       │
//! │   ┌────────────────┐  start_refetch   ┌────────────────────┐            │
//! │   │   QueryCache   │◄─────────────────│ MutationDispatcher │            │
//! │   └───────┬────────┘     invalidate   └────────────────────┘            │
//! │           │ ▲                                                           │
//! │   fetcher │ │ start_refetch on tick                                     │
//! │           ▼ │                                                           │
//! │   ┌──────────────┐          ┌────────┐                                  │
//! │   │  ApiClient   │          │ Poller │                                  │
//! │   └──────────────┘          └────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no global instance: build one per signed-in session and pass it
//! to whoever needs it.

use nexus_core::QueryKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{encode, ApiClient};
use crate::cache::{self, CacheEntry, Fetcher, QueryCache, Subscription};
use crate::config::{CacheSettings, SyncConfig};
use crate::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::dispatcher::{MutationDescriptor, MutationDispatcher};
use crate::error::{SyncError, SyncResult};
use crate::executor::RequestExecutor;
use crate::poller::{EnabledFn, PollRegistration, Poller};
use crate::queries::Query;

/// Cache, poller and dispatcher bound to one API.
#[derive(Debug, Clone)]
pub struct QueryClient {
    api: ApiClient,
    cache: QueryCache,
    poller: Poller,
    dispatcher: MutationDispatcher,
    refetch_on_invalidate: bool,
    sweep_interval: Duration,
}

impl QueryClient {
    pub fn new(api: ApiClient, settings: &CacheSettings) -> Self {
        let cache = QueryCache::with_defaults(settings.default_options());
        QueryClient {
            api,
            poller: Poller::new(cache.clone()),
            dispatcher: MutationDispatcher::new(cache.clone()),
            cache,
            refetch_on_invalidate: settings.refetch_on_invalidate,
            sweep_interval: settings.sweep_interval(),
        }
    }

    /// Builds the whole stack from configuration. The token is persisted to
    /// `token_path()` when one is available, otherwise kept in memory.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let executor = RequestExecutor::from_settings(&config.api)?;
        let credentials: Arc<dyn CredentialStore> = match config.token_path() {
            Some(path) => Arc::new(FileCredentialStore::new(path)),
            None => {
                warn!("No token location available, credentials will not persist");
                Arc::new(MemoryCredentialStore::new())
            }
        };
        Ok(Self::new(ApiClient::new(executor, credentials), &config.cache))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Freshness-aware read decoded into `T`.
    ///
    /// Queries that require auth fail with `Unauthenticated` while no token
    /// is stored, without touching the network.
    pub async fn read_query<T: DeserializeOwned>(&self, query: &Query) -> SyncResult<T> {
        if !self.is_enabled(query) {
            return Err(SyncError::Unauthenticated);
        }
        let value = self
            .cache
            .read(&query.key, query.options, self.fetcher_for(query))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribes `callback` to the query's key, starts a fetch unless the
    /// data is fresh, and registers the poll when the query has one.
    ///
    /// Everything is torn down when the returned observer is dropped.
    /// Must be called inside a Tokio runtime.
    pub fn watch_query<F>(&self, query: &Query, callback: F) -> SyncResult<QueryObserver>
    where
        F: Fn(&CacheEntry) + Send + Sync + 'static,
    {
        let subscription = self.cache.subscribe(&query.key, callback);
        let fetcher = self.fetcher_for(query);
        self.cache.set_fetcher(&query.key, fetcher.clone());

        let enabled = self.enabled_fn(query);
        if enabled() && self.cache.fresh_data(&query.key).is_none() {
            // The result lands in the cache and reaches the callback.
            drop(self.cache.start_fetch(&query.key, query.options, fetcher));
        }

        let poll = match query.poll {
            Some(interval) => Some(self.poller.register(query.key.clone(), interval, enabled)?),
            None => None,
        };

        debug!(key = %query.key, polling = poll.is_some(), "Watching query");
        Ok(QueryObserver {
            cache: self.cache.clone(),
            key: query.key.clone(),
            _subscription: subscription,
            poll,
        })
    }

    /// Warms the cache. Skipped when the data is fresh; failures are logged.
    pub async fn prefetch(&self, query: &Query) {
        if !self.is_enabled(query) {
            debug!(key = %query.key, "Prefetch skipped, not authenticated");
            return;
        }
        if let Err(error) = self
            .cache
            .read(&query.key, query.options, self.fetcher_for(query))
            .await
        {
            warn!(key = %query.key, kind = error.kind(), %error, "Prefetch failed");
        }
    }

    /// Writes `value` under `key` as freshly fetched data.
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, value: &T) -> SyncResult<()> {
        self.cache.set(key, encode(value)?);
        Ok(())
    }

    /// Writes `value` as the result of `query`, with the query's windows.
    pub fn set_query<T: Serialize>(&self, query: &Query, value: &T) -> SyncResult<()> {
        self.cache
            .set_with_options(&query.key, encode(value)?, query.options);
        Ok(())
    }

    /// Cached data for `key` without fetching. Expired entries read as `None`.
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> SyncResult<Option<T>> {
        self.cache
            .get_data(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(SyncError::from)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Marks everything under `prefix` stale. Returns how many entries
    /// changed. Observed keys under `prefix` are refetched either way when
    /// `refetch_on_invalidate` is on.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let marked = self.cache.invalidate(prefix);
        if self.refetch_on_invalidate {
            self.refetch_observed(&self.cache.keys_matching(prefix));
        }
        marked.len()
    }

    /// Dispatches a mutation. On success, observed keys it made stale are
    /// refetched in the background when `refetch_on_invalidate` is on.
    pub async fn mutate<I, T>(&self, descriptor: &MutationDescriptor<I, T>, input: I) -> SyncResult<T> {
        let value = self.dispatcher.dispatch(descriptor, input).await?;
        if self.refetch_on_invalidate {
            let keys: Vec<QueryKey> = descriptor
                .invalidates()
                .iter()
                .flat_map(|prefix| self.cache.keys_matching(prefix))
                .collect();
            self.refetch_observed(&keys);
        }
        Ok(value)
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.cache.clear();
        info!("Query cache cleared");
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Starts the periodic eviction sweep.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let cache = self.cache.clone();
        let period = self.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(?period, "Cache sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Cache sweeper shutting down");
                        break;
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn fetcher_for(&self, query: &Query) -> Fetcher {
        let api = self.api.clone();
        let request = query.request.clone();
        cache::fetcher(move || {
            let api = api.clone();
            let request = request.clone();
            async move { api.send(&request).await }
        })
    }

    fn is_enabled(&self, query: &Query) -> bool {
        !query.requires_auth || self.api.has_token()
    }

    fn enabled_fn(&self, query: &Query) -> EnabledFn {
        if query.requires_auth {
            let api = self.api.clone();
            Arc::new(move || api.has_token())
        } else {
            Arc::new(|| true)
        }
    }

    fn refetch_observed(&self, keys: &[QueryKey]) {
        for key in keys {
            if self.cache.subscriber_count(key) == 0 {
                continue;
            }
            if self.cache.start_refetch(key).is_some() {
                debug!(key = %key, "Refetching invalidated query");
            }
        }
    }
}

// =============================================================================
// Observer
// =============================================================================

/// A live view of one query. Dropping it unsubscribes and stops polling.
#[derive(Debug)]
pub struct QueryObserver {
    cache: QueryCache,
    key: QueryKey,
    _subscription: Subscription,
    poll: Option<PollRegistration>,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current entry snapshot.
    pub fn entry(&self) -> Option<CacheEntry> {
        self.cache.get(&self.key)
    }

    /// Current data decoded into `T`.
    pub fn data<T: DeserializeOwned>(&self) -> SyncResult<Option<T>> {
        self.cache
            .get_data(&self.key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(SyncError::from)
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }
}

// =============================================================================
// Sweeper Handle
// =============================================================================

/// Controls the sweep task. Dropping it also stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper and waits for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = (&mut self.task).await;
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
