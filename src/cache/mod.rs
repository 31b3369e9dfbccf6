//! Index page cache.
//!
//! A single named entry holds the rendered front page and is served
//! until its TTL lapses, so readers may briefly see a stale index after
//! new posts land. Detail, group and profile pages are never cached.
//!
//! Behavior is controlled via `yatube.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! ```

mod config;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use middleware::{CacheState, index_cache_layer};
pub use store::{CachedPage, IndexCache};
