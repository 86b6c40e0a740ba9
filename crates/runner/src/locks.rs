//! Per-scraper run exclusion.
//!
//! Two runs of the same scraper would race on one working copy and one
//! data directory, so at most one may be active at a time. The lock table
//! is the only shared mutable state in the orchestrator and must be safe
//! under concurrent access from simultaneously orchestrated scrapers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use quarry_core::Slug;

/// Process-wide table of scrapers with a run in flight.
#[derive(Clone, Default)]
pub struct RunLocks {
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run lock for a scraper.
    ///
    /// Returns `None` when a run is already in flight. The returned guard
    /// releases the lock on drop, so a panicking run cannot wedge its
    /// scraper.
    pub fn acquire(&self, slug: &Slug) -> Option<RunLockGuard> {
        let mut active = self.active.lock().expect("run lock table poisoned");
        if active.insert(slug.as_str().to_string()) {
            Some(RunLockGuard {
                slug: slug.as_str().to_string(),
                active: Arc::clone(&self.active),
            })
        } else {
            None
        }
    }

    /// Whether a run is currently in flight for this scraper.
    pub fn is_active(&self, slug: &Slug) -> bool {
        self.active
            .lock()
            .expect("run lock table poisoned")
            .contains(slug.as_str())
    }
}

/// Held for the duration of one run; releases the scraper's lock on drop.
pub struct RunLockGuard {
    slug: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.slug);
        }
    }
}
