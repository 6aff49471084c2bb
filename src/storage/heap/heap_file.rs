use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::{BufferPool, PageHandle};
use crate::common::{
    PageId, Permissions, Result, StorageError, TableId, TransactionId, PAGE_SIZE,
};
use crate::storage::page::HeapPage;
use crate::tuple::{Schema, Tuple};

use super::HeapFileIterator;

/// HeapFile stores the tuples of one table, in no particular order, as a
/// sequence of fixed-size heap pages in a single file.
///
/// Page n lives at byte offset n * PAGE_SIZE and the file only ever grows by
/// appending whole pages. Reads and writes here go straight to disk; anything
/// that must respect transaction locks goes through the `BufferPool`.
pub struct HeapFile {
    table_id: TableId,
    schema: Arc<Schema>,
    file: Mutex<File>,
    path: PathBuf,
    /// Number of pages currently in the file
    num_pages: AtomicU32,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId, schema: Arc<Schema>) -> Result<Self> {
        HeapPage::check_schema(&schema)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "heap file length {} is not a multiple of the page size",
                    file_size
                ),
            )
            .into());
        }

        Ok(Self {
            table_id,
            schema,
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
            num_pages: AtomicU32::new((file_size / PAGE_SIZE as u64) as u32),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    fn check_page(&self, page_id: PageId) -> Result<u64> {
        if page_id.table_id() != self.table_id || page_id.page_no() >= self.num_pages() {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(page_id.page_no() as u64 * PAGE_SIZE as u64)
    }

    /// Reads the raw bytes of a page.
    pub fn read_page_data(&self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>> {
        let offset = self.check_page(page_id)?;
        let mut data = HeapPage::empty_page_data();

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data[..])?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(data)
    }

    /// Reads a page and decodes it with this table's schema.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        let data = self.read_page_data(page_id)?;
        HeapPage::from_bytes(page_id, Arc::clone(&self.schema), &data[..])
    }

    /// Overwrites the byte range of an existing page.
    /// The buffer must be exactly PAGE_SIZE bytes.
    pub fn write_page_data(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let offset = self.check_page(page_id)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes the current contents of a page to its slot in the file.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let data = page.page_data();
        self.write_page_data(page.id(), &data[..])
    }

    /// Appends one empty page to the file and returns its ID.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let page_no = self.num_pages.load(Ordering::Acquire);

        file.seek(SeekFrom::Start(page_no as u64 * PAGE_SIZE as u64))?;
        file.write_all(&HeapPage::empty_page_data()[..])?;
        file.flush()?;

        self.num_pages.store(page_no + 1, Ordering::Release);
        self.num_writes.fetch_add(1, Ordering::Relaxed);

        let page_id = PageId::new(self.table_id, page_no);
        debug!("grew {} to {} pages", self.table_id, page_no + 1);
        Ok(page_id)
    }

    /// Inserts a tuple on behalf of `txn` and returns the pages it modified.
    ///
    /// Pages are probed first-fit in page order under a shared lock; the page
    /// that receives the tuple is upgraded to an exclusive lock. Full pages
    /// are released again unless the transaction already held a lock on them.
    /// When no page has room the file grows by one page.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageHandle>> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(self.table_id));
        }

        for page_no in 0..self.num_pages() {
            let page_id = PageId::new(self.table_id, page_no);
            let held_before = pool.holds_lock(txn, page_id);

            let page = pool.get_page(txn, page_id, Permissions::ReadOnly)?;
            let has_room = page.read().num_empty_slots() > 0;
            drop(page);

            if !has_room {
                if !held_before {
                    pool.release_page(txn, page_id);
                }
                continue;
            }

            let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
            let inserted = page.write().insert_tuple(tuple);
            match inserted {
                Ok(_) => return Ok(vec![page]),
                Err(StorageError::PageFull(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        let page_id = self.allocate_page()?;
        let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
        page.write().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Removes a tuple, located by its record ID, on behalf of `txn`.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<PageHandle> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotLocated)?;
        if record_id.page_id.table_id() != self.table_id {
            return Err(StorageError::PageNotFound(record_id.page_id));
        }

        let page = pool.get_page(txn, record_id.page_id, Permissions::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(page)
    }

    /// Returns a cursor over every tuple of the table, read under `txn`.
    pub fn iterator<'a>(
        self: &Arc<Self>,
        pool: &'a BufferPool,
        txn: TransactionId,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator::new(Arc::clone(self), pool, txn)
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        let file = self.file.get_mut();
        let _ = file.sync_all();
    }
}
