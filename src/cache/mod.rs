//! Cache Module
//!
//! The public caching facade: binds one [`Store`] to the stale-while-revalidate
//! [`wrap`](Cache::wrap) engine and passes plain reads and writes through.

mod in_flight;
mod ttl;
mod wrap;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::{ensure_cacheable, Store};

pub use in_flight::{Flight, FlightHandle, FlightOwner, InFlight};
pub use ttl::Ttl;

/// Observer for failed background refreshes: `(key, error)`.
pub type RefreshErrorHook = Arc<dyn Fn(&str, &CacheError) + Send + Sync>;

// == Cache Options ==
/// Facade-wide defaults.
#[derive(Clone, Default)]
pub struct CacheOptions {
    /// TTL in milliseconds for writes that do not carry one. Falls back to
    /// the store default when unset.
    pub ttl: Option<u64>,
    /// Remaining-TTL cutoff in milliseconds below which `wrap` refreshes a
    /// hit in the background.
    pub refresh_threshold: Option<u64>,
    /// Deadline for a wrapped computation.
    pub compute_timeout: Option<Duration>,
    /// Called with every error of a background refresh.
    pub on_background_refresh_error: Option<RefreshErrorHook>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl = Some(ttl_ms);
        self
    }

    pub fn refresh_threshold(mut self, threshold_ms: u64) -> Self {
        self.refresh_threshold = Some(threshold_ms);
        self
    }

    pub fn compute_timeout(mut self, timeout: Duration) -> Self {
        self.compute_timeout = Some(timeout);
        self
    }

    pub fn on_background_refresh_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &CacheError) + Send + Sync + 'static,
    {
        self.on_background_refresh_error = Some(Arc::new(hook));
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: None,
            refresh_threshold: config.refresh_threshold_ms,
            compute_timeout: config.compute_timeout_ms.map(Duration::from_millis),
            on_background_refresh_error: None,
        }
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("ttl", &self.ttl)
            .field("refresh_threshold", &self.refresh_threshold)
            .field("compute_timeout", &self.compute_timeout)
            .field(
                "on_background_refresh_error",
                &self.on_background_refresh_error.is_some(),
            )
            .finish()
    }
}

// == Wrap Options ==
/// Per-call settings of [`Cache::wrap_with`], overriding the facade defaults.
#[derive(Clone, Debug, Default)]
pub struct WrapOptions {
    pub ttl: Option<Ttl>,
    pub refresh_threshold: Option<u64>,
}

impl WrapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    pub fn refresh_threshold(mut self, threshold_ms: u64) -> Self {
        self.refresh_threshold = Some(threshold_ms);
        self
    }
}

// == Cache ==
/// Caching facade over a shared [`Store`].
///
/// Clones share the store and the in-flight registry. Separately constructed
/// facades over the same store deduplicate independently.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn Store>,
    in_flight: InFlight,
    options: Arc<CacheOptions>,
}

impl Cache {
    pub fn new(store: impl Store, options: CacheOptions) -> Self {
        Self::with_store(Arc::new(store), options)
    }

    /// Creates a facade over a store that may be shared with other facades.
    pub fn with_store(store: Arc<dyn Store>, options: CacheOptions) -> Self {
        Self {
            store,
            in_flight: InFlight::new(),
            options: Arc::new(options),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// TTL applied to writes that carry none: the facade default, then the
    /// store default.
    pub fn default_ttl(&self) -> Option<u64> {
        self.options.ttl.or_else(|| self.store.default_ttl())
    }

    /// Number of wrapped computations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.store.get(key).await
    }

    /// Stores `value`; `null` is rejected before the store is touched.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Ttl>) -> Result<()> {
        ensure_cacheable(key, &value)?;
        let ttl = ttl::resolve(key, ttl.as_ref(), self.default_ttl(), &value)?;
        self.store.set(key, value, ttl).await
    }

    pub async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Value>>> {
        self.store.mget(keys).await
    }

    pub async fn mset(&self, pairs: Vec<(String, Value)>, ttl: Option<u64>) -> Result<()> {
        self.store.mset(pairs, ttl.or_else(|| self.default_ttl())).await
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        self.store.del(key).await
    }

    pub async fn mdel(&self, keys: &[&str]) -> Result<()> {
        self.store.mdel(keys).await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.store.keys().await
    }

    pub async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        self.store.ttl(key).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.reset().await
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store.name())
            .field("in_flight", &self.in_flight)
            .field("options", &self.options)
            .finish()
    }
}
