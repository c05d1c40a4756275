//! Wrap Engine
//!
//! Stale-while-revalidate memoization on top of the facade's store.
//!
//! A call to [`Cache::wrap`] serves a cached value when there is one. A hit
//! whose remaining TTL dropped below the refresh threshold is still served,
//! and additionally recomputed in a detached background task. A miss runs the
//! computation, deduplicated per key through the [`InFlight`](super::InFlight)
//! registry, and writes the result to the store.
//!
//! Computations are spawned eagerly on the tokio runtime. The owning caller
//! and all joiners await the same shared outcome, so a caller that is dropped
//! mid-await does not cancel the computation for the others.
//!
//! A failing `Store::get` is propagated and never treated as a miss.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::in_flight::{Flight, FlightHandle, FlightOwner};
use super::ttl::{self, Ttl};
use super::{Cache, WrapOptions};
use crate::error::{CacheError, Result};
use crate::store::ensure_cacheable;

impl Cache {
    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// Uses the facade's default TTL and refresh threshold.
    pub async fn wrap<F, Fut, E>(&self, key: &str, f: F) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Value, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        self.wrap_with(key, f, WrapOptions::default()).await
    }

    /// Like [`wrap`](Cache::wrap), with per-call TTL and refresh threshold.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Computation`] if `f` fails; every caller sharing the
    ///   computation receives the same error and nothing is stored.
    /// - [`CacheError::NotCacheable`] if `f` produced `null`.
    /// - [`CacheError::TtlResolution`] if a computed TTL fails.
    /// - [`CacheError::Timeout`] if a compute timeout is configured and elapsed.
    /// - Store errors, unchanged.
    ///
    /// Errors of a background refresh are never returned; they are logged and
    /// handed to the configured refresh error hook.
    pub async fn wrap_with<F, Fut, E>(
        &self,
        key: &str,
        f: F,
        options: WrapOptions,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Value, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let WrapOptions { ttl, refresh_threshold } = options;

        if let Some(cached) = self.store.get(key).await? {
            if let Some(threshold) = refresh_threshold.or(self.options.refresh_threshold) {
                self.refresh_if_stale(key, threshold, f, ttl).await;
            }
            return Ok(cached);
        }

        let handle = match self.in_flight.acquire_or_join(key) {
            Flight::Owner(owner) => {
                trace!(key, "computing missing value");
                self.spawn_computation(owner, f, ttl, false)
            }
            Flight::Joined(handle) => {
                debug!(key, "joined running computation");
                handle
            }
        };

        handle.wait().await
    }

    /// Schedules a background recomputation if the entry's remaining TTL is
    /// below `threshold`. Never waits for the recomputation itself.
    async fn refresh_if_stale<F, Fut, E>(
        &self,
        key: &str,
        threshold: u64,
        f: F,
        ttl: Option<Ttl>,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Value, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let remaining = match self.store.ttl(key).await {
            Ok(Some(remaining)) => remaining,
            // no expiry, or gone since the read
            Ok(None) => return,
            Err(err) => {
                warn!(key, error = %err, "could not read remaining ttl, skipping refresh");
                return;
            }
        };

        if remaining >= threshold {
            return;
        }

        match self.in_flight.acquire_or_join(key) {
            Flight::Owner(owner) => {
                debug!(key, remaining, threshold, "refreshing stale value in background");
                let _not_awaiting = self.spawn_computation(owner, f, ttl, true);
            }
            Flight::Joined(_) => {
                trace!(key, "refresh already running");
            }
        }
    }

    /// Runs the computation for an owned key as a separate task and returns a
    /// handle on its outcome.
    ///
    /// The task settles the registry record whatever happens. A panicking
    /// computation settles as `Interrupted`.
    fn spawn_computation<F, Fut, E>(
        &self,
        owner: FlightOwner,
        f: F,
        ttl: Option<Ttl>,
        is_refresh: bool,
    ) -> FlightHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Value, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let handle = owner.handle();
        let cache = self.clone();

        tokio::spawn(async move {
            let key = owner.key().to_string();
            let computation = async {
                if !is_refresh {
                    // A previous owner may have stored the value between our
                    // miss and taking over the key.
                    match cache.store.get(&key).await {
                        Ok(Some(value)) => {
                            trace!(key = %key, "value stored while waiting for the key");
                            return Ok(value);
                        }
                        Ok(None) => {}
                        Err(err) => return Err(err),
                    }
                }
                cache.compute(&key, f, ttl.as_ref()).await
            };
            let outcome = AssertUnwindSafe(computation)
                .catch_unwind()
                .await
                .unwrap_or_else(|_panic| {
                    Err(CacheError::Interrupted {
                        key: key.clone(),
                    })
                });

            if is_refresh {
                if let Err(err) = &outcome {
                    cache.report_refresh_error(&key, err);
                }
            }

            owner.settle(outcome);
        });

        handle
    }

    /// Produces the value, resolves its TTL and writes it to the store.
    async fn compute<F, Fut, E>(&self, key: &str, f: F, ttl: Option<&Ttl>) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: Into<anyhow::Error>,
    {
        let produced = match self.options.compute_timeout {
            Some(timeout) => tokio::time::timeout(timeout, f())
                .await
                .map_err(|_elapsed| CacheError::Timeout {
                    key: key.to_string(),
                    timeout,
                })?,
            None => f().await,
        };
        let value = produced.map_err(CacheError::computation)?;

        ensure_cacheable(key, &value)?;
        let ttl = ttl::resolve(key, ttl, self.default_ttl(), &value)?;
        self.store.set(key, value.clone(), ttl).await?;

        Ok(value)
    }

    fn report_refresh_error(&self, key: &str, err: &CacheError) {
        warn!(key, error = %err, "background refresh failed");
        if let Some(hook) = &self.options.on_background_refresh_error {
            hook(key, err);
        }
    }
}
