use thiserror::Error;

use super::types::{PageId, SlotId, TableId, TransactionId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Tuple has no record location")]
    TupleNotLocated,

    #[error("Page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    #[error("Transaction {txn} aborted waiting for a lock on {page_id}")]
    TransactionAborted { txn: TransactionId, page_id: PageId },

    #[error("Buffer pool is full, no evictable pages available")]
    BufferPoolFull,

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Page {0} is full")]
    PageFull(PageId),

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Slot {slot:?} of {page_id} is empty")]
    SlotEmpty { page_id: PageId, slot: SlotId },

    #[error("Tuple schema does not match the schema of {0}")]
    SchemaMismatch(TableId),

    #[error("Record width {0} does not fit in a page")]
    RecordTooLarge(usize),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Page {0} holds a malformed record")]
    CorruptPage(PageId),

    #[error("Invalid value for column {column}: {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("No such element: {0}")]
    NoSuchElement(&'static str),
}

pub type Result<T> = std::result::Result<T, StorageError>;
