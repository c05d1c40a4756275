//! swr_cache - A caching facade with stale-while-revalidate memoization
//!
//! Binds pluggable key/value [`Store`]s with TTL expiry to a [`Cache`] facade
//! whose [`wrap`](Cache::wrap) computes missing values once per key, however
//! many callers ask concurrently, and refreshes aging values in the background.
//!
//! ```ignore
//! let cache = Cache::new(MemoryStore::new(1000, 0), CacheOptions::new().refresh_threshold(4_000));
//! let user = cache
//!     .wrap_with("user:1", || fetch_user(1), WrapOptions::new().ttl(5_000))
//!     .await?;
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheOptions, Ttl, WrapOptions};
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::{MemoryStore, MultiStore, Store};
pub use tasks::spawn_cleanup_task;
