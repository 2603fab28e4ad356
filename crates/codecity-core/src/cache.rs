use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Default lifetime of a cached analysis.
pub const DEFAULT_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// Longest lifetime the cache accepts; larger values are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Upper bound on projects held in memory at once.
pub const MAX_ENTRIES: u64 = 256;

#[derive(Debug, Clone)]
pub enum CacheError {
    /// The computation failed; every waiter on the same flight receives the same error.
    Computation(Arc<anyhow::Error>),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Computation(_) => f.write_str("computation failed"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Computation(shared) => {
                let inner: &(dyn std::error::Error + Send + Sync + 'static) = &***shared;
                Some(inner)
            }
        }
    }
}

/// Cache-aside store with single-flight computation and a bounded lifetime
/// for successful results.
#[derive(Clone)]
pub struct ResultCache<T> {
    ttl: Duration,
    inner: Cache<String, T>,
}

impl<T: Clone + Send + Sync + 'static> ResultCache<T> {
    pub fn new(ttl: Duration) -> Self {
        let ttl = ttl.min(MAX_TTL);
        let inner = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .eviction_listener(|key, _value, cause| {
                tracing::debug!(key = %key, ?cause, "result cache evicted entry");
            })
            .build();
        Self { ttl, inner }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, joining an in-flight computation or
    /// starting `compute` when there is neither.
    ///
    /// Failures are handed to every caller waiting on the same flight and are
    /// not stored.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let init = async move {
            tracing::debug!(key, "result cache miss; computing");
            compute().await
        };
        self.inner
            .try_get_with(key.to_string(), init)
            .await
            .map_err(|e| {
                tracing::warn!(key, "computation failed, not caching: {e:#}");
                CacheError::Computation(e)
            })
    }

    /// Whether a live value is stored for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Drop any stored value for `key`.
    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Number of stored values, after pending expirations are applied.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
