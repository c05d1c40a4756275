//! TTL Resolution
//!
//! Turns a caller supplied [`Ttl`] into the concrete millisecond TTL handed to a store.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CacheError, Result};

type TtlFn = dyn Fn(&Value) -> anyhow::Result<u64> + Send + Sync;

/// How long a value should live, in milliseconds. `0` means no expiry.
#[derive(Clone)]
pub enum Ttl {
    /// The same TTL for every value.
    Fixed(u64),
    /// A TTL derived from the freshly computed value.
    Computed(Arc<TtlFn>),
}

impl Ttl {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<u64> + Send + Sync + 'static,
    {
        Ttl::Computed(Arc::new(f))
    }

    /// Resolves this TTL for `value`, which was cached under `key`.
    ///
    /// A computed TTL is evaluated on every call, so callers invoke this once
    /// per produced value.
    pub fn resolve(&self, key: &str, value: &Value) -> Result<u64> {
        match self {
            Ttl::Fixed(ms) => Ok(*ms),
            Ttl::Computed(f) => f(value).map_err(|err| CacheError::TtlResolution {
                key: key.to_string(),
                reason: Arc::new(err),
            }),
        }
    }
}

impl From<u64> for Ttl {
    fn from(ms: u64) -> Self {
        Ttl::Fixed(ms)
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Fixed(ms) => f.debug_tuple("Fixed").field(ms).finish(),
            Ttl::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Picks the TTL for a write: the per-call TTL, then `fallback`.
///
/// `None` leaves the choice to the store.
pub fn resolve(
    key: &str,
    ttl: Option<&Ttl>,
    fallback: Option<u64>,
    value: &Value,
) -> Result<Option<u64>> {
    match ttl {
        Some(ttl) => ttl.resolve(key, value).map(Some),
        None => Ok(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fixed_ttl_is_returned_unchanged() {
        assert_eq!(Ttl::Fixed(1500).resolve("k", &json!(1)).unwrap(), 1500);
        assert_eq!(Ttl::from(0).resolve("k", &json!(1)).unwrap(), 0);
    }

    #[test]
    fn test_computed_ttl_sees_value() {
        let ttl = Ttl::computed(|value| Ok(value["ttl"].as_u64().unwrap_or(10)));

        assert_eq!(ttl.resolve("k", &json!({"ttl": 42})).unwrap(), 42);
        assert_eq!(ttl.resolve("k", &json!("plain")).unwrap(), 10);
    }

    #[test]
    fn test_computed_ttl_error_is_wrapped() {
        let ttl = Ttl::computed(|_| Err(anyhow::anyhow!("no ttl for you")));

        match ttl.resolve("profile", &json!(1)) {
            Err(CacheError::TtlResolution { key, reason }) => {
                assert_eq!(key, "profile");
                assert!(reason.to_string().contains("no ttl for you"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_precedence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let ttl = Ttl::computed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        });

        assert_eq!(resolve("k", Some(&ttl), Some(100), &json!(1)).unwrap(), Some(7));
        assert_eq!(resolve("k", None, Some(100), &json!(1)).unwrap(), Some(100));
        assert_eq!(resolve("k", None, None, &json!(1)).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
