use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{PageId, Permissions, Result, StorageError, TransactionId};
use crate::tuple::Tuple;

use super::HeapFile;

/// Position of the scan: the next slot to examine on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanPosition {
    page_no: u32,
    slot: usize,
}

impl ScanPosition {
    const START: ScanPosition = ScanPosition {
        page_no: 0,
        slot: 0,
    };
}

/// Sequential scan over a heap file.
///
/// Pages are fetched through the buffer pool under a shared lock, in page
/// order, and each page's slots are visited in slot order. The scan keeps
/// only its position between calls, never a page handle, so every page it
/// has moved past can be evicted. Pages found to hold no tuples are skipped;
/// if the transaction did not already hold a lock on such a page, the lock
/// taken to inspect it is released again.
///
/// `close` keeps the position so that a later `open` resumes from it;
/// `rewind` starts over from page 0.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    pool: &'a BufferPool,
    txn: TransactionId,
    position: ScanPosition,
    is_open: bool,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(file: Arc<HeapFile>, pool: &'a BufferPool, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            position: ScanPosition::START,
            is_open: false,
        }
    }

    /// Opens the scan, resuming from where a previous `close` left it.
    pub fn open(&mut self) -> Result<()> {
        self.is_open = true;
        Ok(())
    }

    /// Finds the next stored tuple at or after the current position and
    /// moves the position onto it.
    fn seek(&mut self) -> Result<Option<Tuple>> {
        while self.position.page_no < self.file.num_pages() {
            let page_id = PageId::new(self.file.table_id(), self.position.page_no);
            let held_before = self.pool.holds_lock(self.txn, page_id);

            let page = self.pool.get_page(self.txn, page_id, Permissions::ReadOnly)?;
            let (found, is_empty) = {
                let page = page.read();
                let found = page
                    .next_used_slot(self.position.slot)
                    .and_then(|slot| page.tuple(slot).map(|t| (slot, t.clone())));
                (found, page.is_empty())
            };
            drop(page);

            if let Some((slot, tuple)) = found {
                self.position.slot = slot;
                return Ok(Some(tuple));
            }
            if is_empty && !held_before {
                self.pool.release_page(self.txn, page_id);
            }
            self.position = ScanPosition {
                page_no: self.position.page_no + 1,
                slot: 0,
            };
        }
        Ok(None)
    }

    /// Returns true if another tuple is available.
    pub fn has_next(&mut self) -> Result<bool> {
        if !self.is_open {
            return Ok(false);
        }
        Ok(self.seek()?.is_some())
    }

    /// Returns the next tuple in page and slot order.
    pub fn next(&mut self) -> Result<Tuple> {
        if !self.is_open {
            return Err(StorageError::NoSuchElement("iterator is not open"));
        }
        let tuple = self
            .seek()?
            .ok_or(StorageError::NoSuchElement("no more tuples in file"))?;
        self.position.slot += 1;
        Ok(tuple)
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) -> Result<()> {
        self.position = ScanPosition::START;
        self.open()
    }

    /// Closes the scan, keeping its position for a later `open`.
    pub fn close(&mut self) {
        self.is_open = false;
    }
}
