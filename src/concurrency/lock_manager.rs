use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::{PageId, Permissions, Result, StorageError, TransactionId};

/// Page lock modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// A blocked lock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockRequest {
    txn: TransactionId,
    mode: LockMode,
}

/// Lock state of a single page
#[derive(Debug, Default)]
struct PageLockState {
    /// Current holders: any number of shared holders or one exclusive holder
    holders: HashMap<TransactionId, LockMode>,
    /// Requests waiting for the page, oldest first
    waiters: VecDeque<LockRequest>,
}

impl PageLockState {
    fn already_holds(&self, txn: TransactionId, mode: LockMode) -> bool {
        match self.holders.get(&txn) {
            Some(LockMode::Exclusive) => true,
            Some(LockMode::Shared) => mode == LockMode::Shared,
            None => false,
        }
    }

    /// Sole shared holder asking for exclusive
    fn is_upgrade(&self, txn: TransactionId, mode: LockMode) -> bool {
        mode == LockMode::Exclusive && self.holders.len() == 1 && self.holders.contains_key(&txn)
    }

    fn compatible(&self, txn: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self
                .holders
                .iter()
                .all(|(holder, held)| *holder == txn || *held == LockMode::Shared),
            LockMode::Exclusive => self.holders.keys().all(|holder| *holder == txn),
        }
    }

    /// FIFO rule: a request that is not queued may only proceed when nobody
    /// waits; a queued exclusive request must be at the head; a queued shared
    /// request must only have shared requests ahead of it.
    fn queue_allows(&self, txn: TransactionId, mode: LockMode) -> bool {
        match self.waiters.iter().position(|req| req.txn == txn) {
            None => self.waiters.is_empty(),
            Some(0) => true,
            Some(pos) => {
                mode == LockMode::Shared
                    && self
                        .waiters
                        .iter()
                        .take(pos)
                        .all(|req| req.mode == LockMode::Shared)
            }
        }
    }

    fn grantable(&self, txn: TransactionId, mode: LockMode) -> bool {
        self.already_holds(txn, mode)
            || self.is_upgrade(txn, mode)
            || (self.compatible(txn, mode) && self.queue_allows(txn, mode))
    }

    fn dequeue(&mut self, txn: TransactionId) {
        self.waiters.retain(|req| req.txn != txn);
    }

    fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.waiters.is_empty()
    }
}

#[derive(Debug, Default)]
struct LockTable {
    pages: HashMap<PageId, PageLockState>,
    /// Reverse index used by `release_all`
    txn_pages: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn grant(&mut self, page_id: PageId, txn: TransactionId, mode: LockMode) {
        let state = self.pages.entry(page_id).or_default();
        let held = state.holders.entry(txn).or_insert(mode);
        if mode == LockMode::Exclusive {
            *held = LockMode::Exclusive;
        }
        self.txn_pages.entry(txn).or_default().insert(page_id);
        trace!("{} granted {:?} on {}", txn, mode, page_id);
    }

    fn release(&mut self, page_id: PageId, txn: TransactionId) -> bool {
        let Some(state) = self.pages.get_mut(&page_id) else {
            return false;
        };
        let released = state.holders.remove(&txn).is_some();
        if state.is_idle() {
            self.pages.remove(&page_id);
        }
        if let Some(pages) = self.txn_pages.get_mut(&txn) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.txn_pages.remove(&txn);
            }
        }
        if released {
            trace!("{} released {}", txn, page_id);
        }
        released
    }
}

/// LockManager keeps page-level shared/exclusive locks for transactions.
///
/// A page is either unlocked, shared by one or more transactions, or held
/// exclusively by exactly one transaction. A sole shared holder may upgrade to
/// exclusive in place. Blocked requests wait in a per-page FIFO queue and are
/// woken through a condition variable whenever a lock is released; consecutive
/// shared waiters at the head of the queue are admitted together.
///
/// There is no deadlock detection. Blocking acquisition is bounded by a
/// timeout and reports `TransactionAborted` when it expires.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
        }
    }

    /// Tries to take a lock without waiting.
    /// Returns false, leaving the lock table unchanged, if it cannot be granted now.
    pub fn try_acquire(&self, page_id: PageId, txn: TransactionId, mode: LockMode) -> bool {
        let mut table = self.table.lock();
        let grantable = table
            .pages
            .get(&page_id)
            .map_or(true, |state| state.grantable(txn, mode));
        if grantable {
            table.grant(page_id, txn, mode);
        }
        grantable
    }

    /// Tries to take a shared lock without waiting.
    pub fn acquire_shared(&self, page_id: PageId, txn: TransactionId) -> bool {
        self.try_acquire(page_id, txn, LockMode::Shared)
    }

    /// Tries to take an exclusive lock (or upgrade a sole shared lock) without waiting.
    pub fn acquire_exclusive(&self, page_id: PageId, txn: TransactionId) -> bool {
        self.try_acquire(page_id, txn, LockMode::Exclusive)
    }

    /// Takes a lock, waiting in the page's FIFO queue for at most `timeout`.
    pub fn acquire(
        &self,
        page_id: PageId,
        txn: TransactionId,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut table = self.table.lock();

        let state = table.pages.entry(page_id).or_default();
        if state.grantable(txn, mode) {
            table.grant(page_id, txn, mode);
            return Ok(());
        }
        state.waiters.push_back(LockRequest { txn, mode });
        trace!("{} waiting for {:?} on {}", txn, mode, page_id);

        loop {
            let timed_out = self.released.wait_until(&mut table, deadline).timed_out();

            let state = table.pages.entry(page_id).or_default();
            if state.grantable(txn, mode) {
                state.dequeue(txn);
                table.grant(page_id, txn, mode);
                // The next shared waiter may now be admissible too
                self.released.notify_all();
                return Ok(());
            }

            if timed_out {
                state.dequeue(txn);
                if state.is_idle() {
                    table.pages.remove(&page_id);
                }
                self.released.notify_all();
                warn!("{} timed out waiting for {:?} on {}", txn, mode, page_id);
                return Err(StorageError::TransactionAborted { txn, page_id });
            }
        }
    }

    /// Releases the transaction's lock on a page and wakes waiters.
    /// Returns false if the transaction held no lock on the page.
    pub fn release(&self, page_id: PageId, txn: TransactionId) -> bool {
        let released = self.table.lock().release(page_id, txn);
        if released {
            self.released.notify_all();
        }
        released
    }

    /// Releases every lock held by the transaction.
    pub fn release_all(&self, txn: TransactionId) {
        let mut table = self.table.lock();
        let pages = table.txn_pages.remove(&txn).unwrap_or_default();
        for page_id in pages {
            table.release(page_id, txn);
        }
        drop(table);
        self.released.notify_all();
    }

    /// Returns true if the transaction holds any lock on the page.
    pub fn holds(&self, page_id: PageId, txn: TransactionId) -> bool {
        self.lock_mode(page_id, txn).is_some()
    }

    /// Returns the mode in which the transaction holds the page, if any.
    pub fn lock_mode(&self, page_id: PageId, txn: TransactionId) -> Option<LockMode> {
        self.table
            .lock()
            .pages
            .get(&page_id)
            .and_then(|state| state.holders.get(&txn).copied())
    }

    /// Returns the pages the transaction currently holds locks on.
    pub fn locked_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .table
            .lock()
            .txn_pages
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Returns the number of requests waiting on a page.
    pub fn waiting_count(&self, page_id: PageId) -> usize {
        self.table
            .lock()
            .pages
            .get(&page_id)
            .map_or(0, |state| state.waiters.len())
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
