//! Strata - a page-oriented heap storage engine in Rust
//!
//! This crate stores table rows as fixed-width records in heap files, caches
//! their pages in a bounded buffer pool and isolates concurrent transactions
//! with page-level shared/exclusive locks.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Tuple Layer** (`tuple`): Typed values, schemas and the fixed-width record codec
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `HeapPage`: Occupancy bitmap plus fixed-width record slots
//!   - `HeapFile`: One table's pages in a single file, first-fit inserts
//!   - `HeapFileIterator`: Sequential scan under shared page locks
//!   - `DiskScheduler`: Background worker that performs page I/O
//!
//! - **Concurrency** (`concurrency`): Page locks for transactions
//!   - `LockManager`: Shared/exclusive locks, FIFO waiters, timeout aborts
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPool`: Locks, caches and writes back pages
//!   - `LruReplacer`: Least recently used eviction order
//!
//! - **Catalog** (`catalog`): Table names, ids, schemas and files
//!
//! # Example
//!
//! ```rust,no_run
//! use strata::common::DatabaseConfig;
//! use strata::tuple::{DataType, Schema, Tuple, Value};
//! use strata::Database;
//!
//! let db = Database::new(DatabaseConfig::default().with_pool_pages(16));
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Char(32))
//!     .build_arc();
//! let table = db.add_table("people", "people.dat", schema.clone()).unwrap();
//!
//! // Insert a row and commit
//! let txn = db.begin_transaction();
//! let mut row = Tuple::new(schema, vec![Value::Integer(1), Value::from("Ada")]).unwrap();
//! db.buffer_pool().insert_tuple(txn, table, &mut row).unwrap();
//! db.commit(txn).unwrap();
//!
//! // Scan it back
//! let txn = db.begin_transaction();
//! let file = db.catalog().file(table).unwrap();
//! let mut scan = file.iterator(db.buffer_pool(), txn);
//! scan.open().unwrap();
//! while scan.has_next().unwrap() {
//!     println!("{}", scan.next().unwrap());
//! }
//! scan.close();
//! db.commit(txn).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod database;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, StorageError, TableId, TransactionId};
pub use database::Database;
