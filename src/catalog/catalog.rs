use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::common::{Result, StorageError, TableId};
use crate::storage::heap::HeapFile;
use crate::tuple::Schema;

struct TableEntry {
    name: String,
    file: Arc<HeapFile>,
}

#[derive(Default)]
struct CatalogTables {
    by_id: BTreeMap<TableId, TableEntry>,
    by_name: HashMap<String, TableId>,
    next_id: u32,
}

/// Catalog maps table names and ids to the heap files that store them.
///
/// Ids are handed out sequentially from 0 in registration order. Every page a
/// table owns carries its id, so the buffer pool can find the right file for
/// any page it has to load.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<CatalogTables>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table backed by the heap file at `path`, creating the file
    /// if needed, and returns its new id.
    pub fn add_table<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        schema: Arc<Schema>,
    ) -> Result<TableId> {
        let mut tables = self.tables.write();
        if tables.by_name.contains_key(name) {
            return Err(StorageError::TableAlreadyExists(name.to_string()));
        }

        let table_id = TableId::new(tables.next_id);
        let file = HeapFile::open(path.as_ref(), table_id, schema)?;
        tables.next_id += 1;

        info!(
            "registered table '{}' as {} at {} ({} pages)",
            name,
            table_id,
            path.as_ref().display(),
            file.num_pages()
        );
        tables.by_name.insert(name.to_string(), table_id);
        tables.by_id.insert(
            table_id,
            TableEntry {
                name: name.to_string(),
                file: Arc::new(file),
            },
        );
        Ok(table_id)
    }

    /// Looks up a table id by name.
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables.read().by_name.get(name).copied()
    }

    /// Returns the heap file of a table.
    pub fn file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn schema(&self, table_id: TableId) -> Result<Arc<Schema>> {
        self.file(table_id).map(|file| Arc::clone(file.schema()))
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or(StorageError::TableNotFound(table_id))
    }

    /// Returns the ids of all registered tables in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().by_id.keys().copied().collect()
    }
}
