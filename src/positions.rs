//! Remembered scroll positions, per feed.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Last selected row of recently viewed feeds.
///
/// Bounded so that hopping between many feeds does not grow without limit.
pub struct PositionStore {
    entries: LruCache<String, usize>,
}

impl PositionStore {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn save(&mut self, feed: &str, selected: usize) {
        self.entries.put(feed.to_string(), selected);
    }

    /// Position saved for `feed`, marking it recently used.
    pub fn restore(&mut self, feed: &str) -> Option<usize> {
        self.entries.get(feed).copied()
    }

    pub fn forget(&mut self, feed: &str) {
        self.entries.pop(feed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
