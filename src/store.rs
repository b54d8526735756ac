//! Run-wide result deduplication.

use dashmap::DashMap;

/// Concurrent set of every result URL seen during one run.
///
/// Backed by `DashMap`, so `insert_if_absent` is a single shard-locked
/// operation and unrelated inserts proceed in parallel.
#[derive(Debug, Default)]
pub struct ResultStore {
    seen: DashMap<String, ()>,
}

impl ResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `url`, returning true iff it was not already present.
    pub fn insert_if_absent(&self, url: &str) -> bool {
        if self.seen.contains_key(url) {
            return false;
        }
        self.seen.insert(url.to_string(), ()).is_none()
    }

    /// Returns every stored URL in no particular order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.seen.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns every stored URL sorted by byte order.
    #[must_use]
    pub fn sorted(&self) -> Vec<String> {
        let mut urls = self.snapshot();
        urls.sort_unstable();
        urls
    }

    /// Number of unique URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
