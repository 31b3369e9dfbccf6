//! Single-entry storage for the rendered index page.
//!
//! Writes after creation do not invalidate the entry; readers keep the
//! stale page until the TTL lapses.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A rendered page captured at response time.
#[derive(Clone)]
pub struct CachedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    stored_at: Instant,
}

impl CachedPage {
    pub fn new(status: u16, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
            stored_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.stored_at) < ttl
    }
}

/// Holds at most one page, the index, under a fixed TTL.
pub struct IndexCache {
    ttl: Duration,
    entry: RwLock<Option<CachedPage>>,
}

impl IndexCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached page, if present and still within its TTL.
    pub fn get(&self) -> Option<CachedPage> {
        self.get_at(Instant::now())
    }

    fn get_at(&self, now: Instant) -> Option<CachedPage> {
        let guard = rw_read(&self.entry, SOURCE, "get");
        guard
            .as_ref()
            .filter(|page| page.is_fresh(self.ttl, now))
            .cloned()
    }

    /// Replace the entry, restarting the TTL clock.
    pub fn store(&self, page: CachedPage) {
        *rw_write(&self.entry, SOURCE, "store") = Some(page);
    }

    /// Drop the entry, used by tests and operational tooling.
    pub fn clear(&self) {
        *rw_write(&self.entry, SOURCE, "clear") = None;
    }
}
