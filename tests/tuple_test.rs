use std::sync::Arc;

use strata::common::{DatabaseConfig, Permissions, StorageError, PAGE_SIZE};
use strata::storage::page::HeapPage;
use strata::tuple::{DataType, Schema, Tuple, Value};
use strata::Database;

use tempfile::TempDir;

fn create_user_schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(100))
        .column("balance", DataType::BigInt)
        .column("score", DataType::Double)
        .column("active", DataType::Boolean)
        .build_arc()
}

fn user(id: i32, name: &str) -> Tuple {
    Tuple::new(
        create_user_schema(),
        vec![
            Value::Integer(id),
            Value::from(name),
            Value::BigInt(-(id as i64) * 1_000_000_007),
            Value::Double(id as f64 / 3.0),
            Value::Boolean(id % 2 == 1),
        ],
    )
    .unwrap()
}

#[test]
fn test_tuple_to_heap_page_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(DatabaseConfig::default().with_pool_pages(4));
    let table = db
        .add_table("users", temp_dir.path().join("users.dat"), create_user_schema())
        .unwrap();

    let txn = db.begin_transaction();
    let mut original = user(1, "Alice");
    drop(db.buffer_pool().insert_tuple(txn, table, &mut original).unwrap());
    db.commit(txn).unwrap();

    // Read back from disk, not from the cached copy
    let record_id = original.record_id().unwrap();
    assert!(db.buffer_pool().discard_page(record_id.page_id));

    let txn = db.begin_transaction();
    let page = db
        .buffer_pool()
        .get_page(txn, record_id.page_id, Permissions::ReadOnly)
        .unwrap();
    let page = page.read();
    let stored = page.tuple(record_id.slot_id.as_usize()).unwrap();

    assert_eq!(stored.values(), original.values());
    assert_eq!(stored.value_by_name("name").and_then(Value::as_str), Some("Alice"));
    assert_eq!(stored.record_id(), Some(record_id));
}

#[test]
fn test_tuple_page_capacity_matches_record_width() {
    let schema = create_user_schema();
    // 4 + (4 + 100) + 8 + 8 + 1
    assert_eq!(schema.record_width(), 125);

    let slots = HeapPage::slots_per_page(schema.record_width());
    assert_eq!(slots, PAGE_SIZE * 8 / (125 * 8 + 1));
    assert!(HeapPage::header_size(slots) + slots * schema.record_width() <= PAGE_SIZE);
}

#[test]
fn test_tuple_rejects_oversized_string() {
    let long = "x".repeat(101);
    let result = Tuple::new(
        create_user_schema(),
        vec![
            Value::Integer(1),
            Value::from(long.as_str()),
            Value::BigInt(0),
            Value::Double(0.0),
            Value::Boolean(false),
        ],
    );
    assert!(matches!(
        result,
        Err(StorageError::InvalidValue { column, .. }) if column == "name"
    ));
}

#[test]
fn test_tuple_bytes_decode_back() {
    let original = user(7, "Grace");
    let bytes = original.to_bytes();
    assert_eq!(bytes.len(), original.schema().record_width());

    let decoded = Tuple::deserialize(create_user_schema(), &mut bytes.as_slice()).unwrap();
    assert_eq!(decoded.values(), original.values());
    assert!(decoded.record_id().is_none());
    assert_eq!(decoded.to_string(), original.to_string());
}
