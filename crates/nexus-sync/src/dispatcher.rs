//! # Mutation Dispatcher
//!
//! Runs a write and, only once it has succeeded, invalidates the query keys
//! that depend on it.
//!
//! ## Dispatch Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  dispatch(checkout, input)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  execute(input).await ─────────── Err ──► return Err, cache untouched  │
//! │       │ Ok (response fully received)                                    │
//! │       ▼                                                                 │
//! │  invalidate ["ventas"]     ─┐                                          │
//! │  invalidate ["dashboard"]   ├── every prefix, in order                 │
//! │  invalidate ["productos"]  ─┘                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  return Ok(value)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use futures_util::future::{BoxFuture, FutureExt};
use nexus_core::QueryKey;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::error::SyncResult;

type Execute<I, T> = Arc<dyn Fn(I) -> BoxFuture<'static, SyncResult<T>> + Send + Sync>;

/// A write operation plus the key prefixes it makes stale.
pub struct MutationDescriptor<I, T> {
    name: &'static str,
    execute: Execute<I, T>,
    invalidates: Vec<QueryKey>,
}

impl<I, T> Clone for MutationDescriptor<I, T> {
    fn clone(&self) -> Self {
        MutationDescriptor {
            name: self.name,
            execute: self.execute.clone(),
            invalidates: self.invalidates.clone(),
        }
    }
}

impl<I, T> std::fmt::Debug for MutationDescriptor<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDescriptor")
            .field("name", &self.name)
            .field("invalidates", &self.invalidates)
            .finish()
    }
}

impl<I: 'static, T: 'static> MutationDescriptor<I, T> {
    pub fn new<F, Fut>(name: &'static str, execute: F, invalidates: Vec<QueryKey>) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<T>> + Send + 'static,
    {
        MutationDescriptor {
            name,
            execute: Arc::new(move |input: I| execute(input).boxed()),
            invalidates,
        }
    }
}

impl<I, T> MutationDescriptor<I, T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Prefixes invalidated after a successful run.
    pub fn invalidates(&self) -> &[QueryKey] {
        &self.invalidates
    }

    /// Runs the write without touching any cache.
    pub async fn execute(&self, input: I) -> SyncResult<T> {
        (self.execute)(input).await
    }
}

/// Dispatches mutations against one cache.
#[derive(Debug, Clone)]
pub struct MutationDispatcher {
    cache: QueryCache,
}

impl MutationDispatcher {
    pub fn new(cache: QueryCache) -> Self {
        MutationDispatcher { cache }
    }

    /// Executes `descriptor` and invalidates its prefixes on success.
    ///
    /// On failure nothing is invalidated and the error is returned as is.
    pub async fn dispatch<I, T>(
        &self,
        descriptor: &MutationDescriptor<I, T>,
        input: I,
    ) -> SyncResult<T> {
        match descriptor.execute(input).await {
            Ok(value) => {
                let marked: usize = descriptor
                    .invalidates
                    .iter()
                    .map(|prefix| self.cache.invalidate(prefix).len())
                    .sum();
                info!(
                    mutation = descriptor.name,
                    prefixes = descriptor.invalidates.len(),
                    invalidated = marked,
                    "Mutation succeeded"
                );
                Ok(value)
            }
            Err(error) => {
                warn!(mutation = descriptor.name, kind = error.kind(), %error, "Mutation failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, QueryStatus};
    use crate::error::SyncError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded_cache() -> QueryCache {
        let cache = QueryCache::with_defaults(crate::cache::QueryOptions::new(
            std::time::Duration::from_secs(60),
            std::time::Duration::from_secs(300),
        ));
        cache.set(&QueryKey::from(["ventas"]), json!([]));
        cache.set(&QueryKey::from(["dashboard", "resumen"]), json!({"hoy": 0}));
        cache.set(&QueryKey::from(["dashboard", "tiempo-real"]), json!([]));
        cache.set(&QueryKey::from(["productos"]), json!([{"stock_actual": 5}]));
        cache.set(&QueryKey::from(["user"]), json!({"id": "u1"}));
        cache
    }

    fn snapshot(cache: &QueryCache) -> Vec<(QueryKey, Option<serde_json::Value>, QueryStatus, bool)> {
        let mut keys = cache.keys();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| cache.get(&key))
            .map(|e: CacheEntry| (e.key().clone(), e.data().cloned(), e.status(), e.is_stale()))
            .collect()
    }

    fn checkout_like(outcome: SyncResult<String>) -> MutationDescriptor<u32, String> {
        MutationDescriptor::new(
            "checkout",
            move |_items: u32| {
                let outcome = outcome.clone();
                async move { outcome }
            },
            vec![
                QueryKey::from(["ventas"]),
                QueryKey::from(["dashboard"]),
                QueryKey::from(["productos"]),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_invalidates_every_prefix() {
        let cache = seeded_cache();
        let dispatcher = MutationDispatcher::new(cache.clone());

        let value = dispatcher
            .dispatch(&checkout_like(Ok("v1".into())), 2)
            .await
            .unwrap();
        assert_eq!(value, "v1");

        for key in [
            QueryKey::from(["ventas"]),
            QueryKey::from(["dashboard", "resumen"]),
            QueryKey::from(["dashboard", "tiempo-real"]),
            QueryKey::from(["productos"]),
        ] {
            let entry = cache.get(&key).unwrap();
            assert!(entry.is_stale(), "{key} should be stale");
            assert!(entry.data().is_some(), "{key} should keep its data");
        }
        assert!(!cache.get(&QueryKey::from(["user"])).unwrap().is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_changes_nothing() {
        let cache = seeded_cache();
        let before = snapshot(&cache);
        let dispatcher = MutationDispatcher::new(cache.clone());

        let err = dispatcher
            .dispatch(
                &checkout_like(Err(SyncError::Api {
                    status: 400,
                    message: "Stock insuficiente".into(),
                })),
                2,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Stock insuficiente");
        assert_eq!(snapshot(&cache), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_waits_for_response() {
        let cache = seeded_cache();
        let dispatcher = MutationDispatcher::new(cache.clone());
        let probe = cache.clone();
        let stale_while_running = Arc::new(AtomicUsize::new(0));
        let seen = stale_while_running.clone();

        let descriptor = MutationDescriptor::new(
            "slow write",
            move |_: ()| {
                let probe = probe.clone();
                let seen = seen.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    if probe.get(&QueryKey::from(["ventas"])).unwrap().is_stale() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                }
            },
            vec![QueryKey::from(["ventas"])],
        );

        dispatcher.dispatch(&descriptor, ()).await.unwrap();
        assert_eq!(stale_while_running.load(Ordering::SeqCst), 0);
        assert!(cache.get(&QueryKey::from(["ventas"])).unwrap().is_stale());
    }
}
