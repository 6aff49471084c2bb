use std::time::Duration;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Default buffer pool size (number of pages)
pub const DEFAULT_PAGES: usize = 50;

/// Default upper bound on a single lock wait before the transaction is aborted
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Depth of the disk scheduler's request queue
pub const DISK_REQUEST_QUEUE_DEPTH: usize = 128;

/// Engine configuration consumed by `Database::new`.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Maximum number of pages cached by the buffer pool
    pub pool_pages: usize,
    /// How long `get_page` waits for a lock before aborting the transaction
    pub lock_timeout: Duration,
}

impl DatabaseConfig {
    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_pages: DEFAULT_PAGES,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}
