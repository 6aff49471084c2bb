use std::collections::{BTreeMap, HashMap};

use crate::common::{PageId, Timestamp};

/// LRU Replacement Policy
///
/// Tracks the last access time of every cached page. The victim is the page
/// with the oldest last access among those the caller reports as evictable.
///
/// The replacer has no lock of its own; the buffer pool keeps it inside the
/// same mutex as its page table so both always change together.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Current timestamp (monotonically increasing)
    current_timestamp: Timestamp,
    /// Last access time of each tracked page
    last_access: HashMap<PageId, Timestamp>,
    /// Pages ordered by last access, oldest first
    by_age: BTreeMap<Timestamp, PageId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the page was accessed now, tracking it if it is new.
    pub fn record_access(&mut self, page_id: PageId) {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        if let Some(previous) = self.last_access.insert(page_id, timestamp) {
            self.by_age.remove(&previous);
        }
        self.by_age.insert(timestamp, page_id);
    }

    /// Returns the least recently used page for which `is_evictable` holds,
    /// without removing it.
    pub fn victim<F>(&self, mut is_evictable: F) -> Option<PageId>
    where
        F: FnMut(PageId) -> bool,
    {
        self.by_age
            .values()
            .copied()
            .find(|&page_id| is_evictable(page_id))
    }

    /// Stops tracking a page.
    pub fn remove(&mut self, page_id: PageId) {
        if let Some(timestamp) = self.last_access.remove(&page_id) {
            self.by_age.remove(&timestamp);
        }
    }

    /// Returns the number of tracked pages.
    pub fn len(&self) -> usize {
        self.last_access.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_access.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(0), n)
    }

    #[test]
    fn test_lru_replacer_empty() {
        let replacer = LruReplacer::new();
        assert!(replacer.is_empty());
        assert_eq!(replacer.victim(|_| true), None);
    }

    #[test]
    fn test_lru_replacer_oldest_first() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        assert_eq!(replacer.len(), 3);
        assert_eq!(replacer.victim(|_| true), Some(pid(0)));
        // victim only peeks
        assert_eq!(replacer.victim(|_| true), Some(pid(0)));
    }

    #[test]
    fn test_lru_replacer_access_refreshes() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(0));

        assert_eq!(replacer.len(), 2);
        assert_eq!(replacer.victim(|_| true), Some(pid(1)));
    }

    #[test]
    fn test_lru_replacer_skips_unevictable() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        assert_eq!(replacer.victim(|p| p != pid(0)), Some(pid(1)));
        assert_eq!(replacer.victim(|p| p == pid(2)), Some(pid(2)));
        assert_eq!(replacer.victim(|_| false), None);
    }

    #[test]
    fn test_lru_replacer_remove() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));

        replacer.remove(pid(0));
        replacer.remove(pid(7));

        assert_eq!(replacer.len(), 1);
        assert_eq!(replacer.victim(|_| true), Some(pid(1)));
    }
}
