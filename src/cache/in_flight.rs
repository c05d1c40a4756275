//! In-Flight Registry
//!
//! Deduplicates concurrent computations of the same key. The first caller for
//! a key becomes its owner; everybody arriving while the computation runs
//! joins the owner's shared outcome instead of computing again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{CacheError, Result};

type Outcome = Result<Value>;
type OutcomeChannel = Shared<oneshot::Receiver<Outcome>>;
type ComputationMap = Arc<Mutex<HashMap<String, OutcomeChannel>>>;

/// Registry of running computations, keyed by cache key.
///
/// Cloning yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct InFlight {
    computations: ComputationMap,
}

/// Result of [`InFlight::acquire_or_join`].
#[derive(Debug)]
pub enum Flight {
    /// No computation was running; the caller must run one and settle it.
    Owner(FlightOwner),
    /// A computation is already running; await its outcome.
    Joined(FlightHandle),
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the caller as owner of `key`, or joins the running computation.
    ///
    /// Lookup and insertion happen under one lock, so two callers can never
    /// both become owner of the same key.
    pub fn acquire_or_join(&self, key: &str) -> Flight {
        let mut computations = self.computations.lock();

        if let Some(channel) = computations.get(key) {
            return Flight::Joined(FlightHandle {
                key: key.to_string(),
                channel: channel.clone(),
            });
        }

        let (sender, receiver) = oneshot::channel();
        let channel = receiver.shared();
        computations.insert(key.to_string(), channel.clone());

        Flight::Owner(FlightOwner {
            handle: FlightHandle {
                key: key.to_string(),
                channel,
            },
            sender,
            release: Release {
                key: key.to_string(),
                computations: self.computations.clone(),
            },
        })
    }

    /// Number of computations currently running.
    pub fn len(&self) -> usize {
        self.computations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.computations.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.computations.lock().contains_key(key)
    }
}

/// A shared view on the outcome of a running computation.
#[derive(Clone)]
pub struct FlightHandle {
    key: String,
    channel: OutcomeChannel,
}

impl FlightHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the computation to settle.
    ///
    /// Fails with [`CacheError::Interrupted`] if the owner went away without
    /// settling, e.g. because the computing task panicked.
    pub async fn wait(self) -> Result<Value> {
        let key = self.key;
        self.channel
            .await
            .unwrap_or_else(|_canceled| Err(CacheError::Interrupted { key }))
    }
}

/// Ownership of a key's computation.
///
/// Dropping the owner without calling [`settle`](FlightOwner::settle) releases
/// the key and fails every joined handle.
pub struct FlightOwner {
    handle: FlightHandle,
    sender: oneshot::Sender<Outcome>,
    release: Release,
}

impl FlightOwner {
    pub fn key(&self) -> &str {
        &self.handle.key
    }

    /// A handle on this computation's outcome, like the ones joiners receive.
    pub fn handle(&self) -> FlightHandle {
        self.handle.clone()
    }

    /// Publishes the outcome to every handle and releases the key.
    pub fn settle(self, outcome: Outcome) {
        let FlightOwner { sender, release, .. } = self;
        // Release first: later callers either join a channel that will still
        // receive data, or start a fresh computation.
        drop(release);
        sender.send(outcome).ok();
    }
}

/// Removes the registry record when dropped.
struct Release {
    key: String,
    computations: ComputationMap,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.computations.lock().remove(&self.key);
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight").field("running", &self.len()).finish()
    }
}

impl fmt::Debug for FlightHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightHandle").field("key", &self.key).finish()
    }
}

impl fmt::Debug for FlightOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightOwner").field("key", &self.key()).finish()
    }
}
