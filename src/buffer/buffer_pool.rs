use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::common::{PageId, Permissions, Result, StorageError, TableId, TransactionId};
use crate::concurrency::{LockManager, LockMode};
use crate::storage::disk::DiskScheduler;
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;

use super::LruReplacer;

/// Shared handle to a cached page. The page latch is held only while a page
/// is read or mutated; transaction-level isolation comes from page locks.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// Page table and replacement order, always changed together
struct PoolState {
    pages: HashMap<PageId, PageHandle>,
    replacer: LruReplacer,
}

impl PoolState {
    /// A cached page can be evicted once no caller holds a handle to it.
    fn is_evictable(&self, page_id: PageId) -> bool {
        self.pages
            .get(&page_id)
            .map_or(true, |page| Arc::strong_count(page) == 1)
    }
}

/// BufferPool caches up to `capacity` heap pages in memory and is the only
/// way transactions reach page contents.
///
/// Every `get_page` first takes a page lock through the `LockManager`,
/// waiting at most the configured lock timeout, and then returns the cached
/// page, loading it through the `DiskScheduler` on a miss. When the pool is
/// full the least recently used page that nobody holds a handle to is evicted,
/// after being written back if it is dirty.
///
/// Lock order: the pool state mutex may be taken before a page latch, never
/// after one.
pub struct BufferPool {
    /// Maximum number of cached pages
    capacity: usize,
    /// Upper bound on a single lock wait
    lock_timeout: Duration,
    state: Mutex<PoolState>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    disk_scheduler: DiskScheduler,
}

impl BufferPool {
    /// Creates a buffer pool holding at most `capacity` pages of the tables
    /// registered in `catalog`.
    pub fn new(capacity: usize, lock_timeout: Duration, catalog: Arc<Catalog>) -> Self {
        Self {
            capacity,
            lock_timeout,
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(capacity),
                replacer: LruReplacer::new(),
            }),
            lock_manager: LockManager::new(),
            catalog,
            disk_scheduler: DiskScheduler::new(),
        }
    }

    /// Locks a page for `txn` with the given permissions and returns it.
    ///
    /// Blocks while another transaction holds a conflicting lock. Fails with
    /// `TransactionAborted` if the lock is not granted within the lock
    /// timeout, and with `BufferPoolFull` if the page has to be loaded but
    /// every cached page is in use. A lock taken by a call that fails is
    /// released again unless the transaction held it before.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PageHandle> {
        let held_before = self.lock_manager.holds(page_id, txn);
        self.lock_manager
            .acquire(page_id, txn, LockMode::from(perm), self.lock_timeout)?;

        let fetched = self.fetch_page(page_id);
        if fetched.is_err() && !held_before {
            self.lock_manager.release(page_id, txn);
        }
        fetched
    }

    /// Returns the cached page, loading it from its heap file on a miss.
    fn fetch_page(&self, page_id: PageId) -> Result<PageHandle> {
        let mut state = self.state.lock();

        if let Some(page) = state.pages.get(&page_id) {
            let page = Arc::clone(page);
            state.replacer.record_access(page_id);
            return Ok(page);
        }

        if state.pages.len() >= self.capacity {
            self.evict_page(&mut state)?;
        }

        let file = self.catalog.file(page_id.table_id())?;
        let page = Arc::new(RwLock::new(
            self.disk_scheduler.schedule_read_sync(file, page_id)?,
        ));
        debug!("loaded {}", page_id);

        state.pages.insert(page_id, Arc::clone(&page));
        state.replacer.record_access(page_id);
        Ok(page)
    }

    /// Makes `page` the cached copy of its page id.
    fn admit(&self, page: PageHandle) -> Result<PageHandle> {
        let page_id = page.read().id();
        let mut state = self.state.lock();

        let same_copy = state
            .pages
            .get(&page_id)
            .map(|cached| Arc::ptr_eq(cached, &page));
        match same_copy {
            Some(true) => {}
            Some(false) => {
                state.pages.insert(page_id, Arc::clone(&page));
            }
            None => {
                if state.pages.len() >= self.capacity {
                    self.evict_page(&mut state)?;
                }
                state.pages.insert(page_id, Arc::clone(&page));
            }
        }
        state.replacer.record_access(page_id);
        Ok(page)
    }

    /// Evicts the least recently used page nobody holds a handle to.
    /// A dirty victim is written back first; if that fails it stays cached.
    fn evict_page(&self, state: &mut PoolState) -> Result<()> {
        let victim = state
            .replacer
            .victim(|page_id| state.is_evictable(page_id))
            .ok_or(StorageError::BufferPoolFull)?;

        if let Some(page) = state.pages.get(&victim) {
            let mut page = page.write();
            if page.is_dirty() {
                if let Err(e) = self.write_back(&mut page) {
                    warn!("could not flush {} for eviction: {}", victim, e);
                    return Err(e);
                }
            }
        }

        state.pages.remove(&victim);
        state.replacer.remove(victim);
        debug!("evicted {}", victim);
        Ok(())
    }

    /// Writes a page to its heap file and marks it clean.
    /// The caller holds the page's write latch for the whole write.
    fn write_back(&self, page: &mut HeapPage) -> Result<()> {
        let page_id = page.id();
        let file = self.catalog.file(page_id.table_id())?;
        self.disk_scheduler
            .schedule_write_sync(file, page_id, page.page_data())?;
        page.mark_clean();
        Ok(())
    }

    /// Releases the transaction's lock on a page. The page stays cached.
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.lock_manager.release(page_id, txn);
    }

    /// Returns true if the transaction holds a lock on the page.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(page_id, txn)
    }

    /// Inserts a tuple into a table on behalf of `txn`.
    ///
    /// The pages modified by the insert are marked dirty by `txn` and kept
    /// cached so later reads see the new tuple. On success the tuple carries
    /// its record ID.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageHandle>> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, txn, tuple)?;

        let mut cached = Vec::with_capacity(pages.len());
        for page in pages {
            page.write().mark_dirty(txn);
            cached.push(self.admit(page)?);
        }
        Ok(cached)
    }

    /// Removes a tuple on behalf of `txn`. The tuple's page must already be
    /// cached, since a tuple is only ever located by reading its page.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<PageHandle> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotLocated)?;
        let page_id = record_id.page_id;
        if !self.is_cached(page_id) {
            return Err(StorageError::PageNotResident(page_id));
        }

        let file = self.catalog.file(page_id.table_id())?;
        let page = file.delete_tuple(self, txn, tuple)?;
        page.write().mark_dirty(txn);
        Ok(page)
    }

    /// Writes a cached page to disk if it is dirty.
    /// Returns false if the page is not cached.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let Some(page) = self.state.lock().pages.get(&page_id).cloned() else {
            return Ok(false);
        };

        let mut page = page.write();
        if page.is_dirty() {
            self.write_back(&mut page)?;
        }
        Ok(true)
    }

    /// Writes every page dirtied by `txn` to disk.
    pub fn flush_pages(&self, txn: TransactionId) -> Result<()> {
        self.flush_where(|page| page.dirtied_by() == Some(txn))
    }

    /// Writes every dirty cached page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        self.flush_where(HeapPage::is_dirty)
    }

    fn flush_where<F>(&self, should_flush: F) -> Result<()>
    where
        F: Fn(&HeapPage) -> bool,
    {
        let pages: Vec<PageHandle> = self.state.lock().pages.values().cloned().collect();
        for page in pages {
            let mut page = page.write();
            if should_flush(&page) {
                self.write_back(&mut page)?;
            }
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it back.
    /// Returns false if the page was not cached.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        state.replacer.remove(page_id);
        state.pages.remove(&page_id).is_some()
    }

    /// Ends a transaction. On commit the pages it dirtied are written to disk
    /// first; either way every lock it holds is released.
    ///
    /// Aborting does not roll back pages the transaction dirtied.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        let result = if commit {
            self.flush_pages(txn)
        } else {
            let dirty = self.dirty_page_count(txn);
            if dirty > 0 {
                warn!("{} aborted with {} dirty pages still cached", txn, dirty);
            }
            Ok(())
        };

        self.lock_manager.release_all(txn);
        result
    }

    fn dirty_page_count(&self, txn: TransactionId) -> usize {
        let pages: Vec<PageHandle> = self.state.lock().pages.values().cloned().collect();
        pages
            .iter()
            .filter(|page| page.read().dirtied_by() == Some(txn))
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pages currently cached.
    pub fn cached_page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().pages.contains_key(&page_id)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}
