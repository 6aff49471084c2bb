use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{DatabaseConfig, Result, TableId, TransactionId};
use crate::tuple::Schema;

/// Database bundles the catalog, the buffer pool and the transaction id
/// allocator of one storage engine instance.
///
/// Components hold explicit references to each other, so several independent
/// engines can live in the same process.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    next_txn: AtomicU64,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(
            config.pool_pages,
            config.lock_timeout,
            Arc::clone(&catalog),
        ));

        Self {
            catalog,
            buffer_pool,
            next_txn: AtomicU64::new(1),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Registers a table backed by the heap file at `path`.
    pub fn add_table<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        schema: Arc<Schema>,
    ) -> Result<TableId> {
        self.catalog.add_table(name, path, schema)
    }

    /// Returns a fresh transaction id.
    pub fn begin_transaction(&self) -> TransactionId {
        TransactionId::new(self.next_txn.fetch_add(1, Ordering::Relaxed))
    }

    /// Commits a transaction, flushing the pages it dirtied.
    pub fn commit(&self, txn: TransactionId) -> Result<()> {
        self.buffer_pool.transaction_complete(txn, true)
    }

    /// Aborts a transaction, releasing its locks.
    pub fn abort(&self, txn: TransactionId) -> Result<()> {
        self.buffer_pool.transaction_complete(txn, false)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}
