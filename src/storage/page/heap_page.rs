use std::sync::Arc;

use bytes::BufMut;

use crate::common::{
    PageId, RecordId, Result, SlotId, StorageError, TransactionId, PAGE_SIZE,
};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// +------------------+
/// | Header bitmap    |  ceil(num_slots / 8) bytes, bit i = slot i in use
/// +------------------+
/// | Slot 0           |  record_width bytes
/// | Slot 1           |
/// | ...              |
/// | Slot n-1         |
/// +------------------+
/// | Zero padding     |
/// +------------------+
///
/// Bit i of the header lives in byte i / 8 at position i % 8 (LSB first).
/// Each slot costs record_width bytes plus one header bit, so
/// num_slots = floor(PAGE_SIZE * 8 / (record_width * 8 + 1)).
/// Unused slots are written as zeros.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    /// Transaction that last dirtied the page, None when clean
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Returns the number of records of the given width that fit on one page.
    pub fn slots_per_page(record_width: usize) -> usize {
        (PAGE_SIZE * 8) / (record_width * 8 + 1)
    }

    /// Returns the size of the occupancy bitmap for the given slot count.
    pub fn header_size(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Checks that records of this schema can be stored in heap pages.
    pub fn check_schema(schema: &Schema) -> Result<()> {
        if schema.column_count() == 0 {
            return Err(StorageError::InvalidSchema(
                "a table needs at least one column".to_string(),
            ));
        }
        if Self::slots_per_page(schema.record_width()) == 0 {
            return Err(StorageError::RecordTooLarge(schema.record_width()));
        }
        Ok(())
    }

    /// Returns the bytes of a page with every slot empty.
    pub fn empty_page_data() -> Box<[u8; PAGE_SIZE]> {
        Box::new([0u8; PAGE_SIZE])
    }

    /// Creates an in-memory page with every slot empty.
    pub fn new_empty(page_id: PageId, schema: Arc<Schema>) -> Result<Self> {
        Self::check_schema(&schema)?;
        let num_slots = Self::slots_per_page(schema.record_width());

        Ok(Self {
            page_id,
            schema,
            header: vec![0u8; Self::header_size(num_slots)],
            slots: vec![None; num_slots],
            dirtied_by: None,
        })
    }

    /// Builds a page from its on-disk bytes.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::CorruptPage(page_id));
        }

        let mut page = Self::new_empty(page_id, schema)?;
        let header_size = page.header.len();
        page.header.copy_from_slice(&data[..header_size]);

        let width = page.schema.record_width();
        for slot in 0..page.slots.len() {
            if !page.is_slot_used(slot) {
                continue;
            }
            let start = header_size + slot * width;
            let mut record = &data[start..start + width];
            let mut tuple = Tuple::deserialize(Arc::clone(&page.schema), &mut record)
                .ok_or(StorageError::CorruptPage(page_id))?;
            tuple.set_record_id(Some(RecordId::new(page_id, SlotId::new(slot as u16))));
            page.slots[slot] = Some(tuple);
        }

        Ok(page)
    }

    /// Serializes the page. The result is always exactly PAGE_SIZE bytes.
    pub fn page_data(&self) -> Box<[u8; PAGE_SIZE]> {
        let mut data = Self::empty_page_data();
        let width = self.schema.record_width();
        {
            let mut buf: &mut [u8] = &mut data[..];
            buf.put_slice(&self.header);
            for slot in &self.slots {
                match slot {
                    Some(tuple) => tuple.serialize_into(&mut buf),
                    None => buf.put_bytes(0, width),
                }
            }
        }
        data
    }

    pub fn id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.slots.len()).filter(|&i| !self.is_slot_used(i)).count()
    }

    /// Returns true if no slot on the page is in use.
    pub fn is_empty(&self) -> bool {
        self.header.iter().all(|&b| b == 0)
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Returns the tuple stored in the given slot.
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Returns the first used slot at or after `from`.
    pub fn next_used_slot(&self, from: usize) -> Option<usize> {
        (from..self.slots.len()).find(|&i| self.is_slot_used(i))
    }

    /// Stores a tuple in the first free slot and records the location on the
    /// tuple itself.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(self.page_id.table_id()));
        }

        let slot = (0..self.slots.len())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(StorageError::PageFull(self.page_id))?;

        let record_id = RecordId::new(self.page_id, SlotId::new(slot as u16));
        tuple.set_record_id(Some(record_id));
        self.set_slot_used(slot, true);
        self.slots[slot] = Some(tuple.clone());

        Ok(record_id)
    }

    /// Removes a tuple from the slot named by its record ID.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotLocated)?;
        if record_id.page_id != self.page_id {
            return Err(StorageError::PageNotFound(record_id.page_id));
        }

        let slot = record_id.slot_id.as_usize();
        if slot >= self.slots.len() {
            return Err(StorageError::InvalidSlotId(record_id.slot_id.as_u16()));
        }
        if !self.is_slot_used(slot) {
            return Err(StorageError::SlotEmpty {
                page_id: self.page_id,
                slot: record_id.slot_id,
            });
        }

        self.set_slot_used(slot, false);
        self.slots[slot] = None;
        Ok(())
    }

    /// Iterates over the stored tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn mark_dirty(&mut self, txn: TransactionId) {
        self.dirtied_by = Some(txn);
    }

    pub fn mark_clean(&mut self) {
        self.dirtied_by = None;
    }

    /// Returns the transaction that last dirtied the page, if it is dirty.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }
}
