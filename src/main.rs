use std::time::Duration;

use strata::common::{DatabaseConfig, Permissions};
use strata::tuple::{DataType, Schema, Tuple, Value};
use strata::{Database, PageId, StorageError};

fn main() {
    println!("Strata - a page-oriented heap storage engine in Rust");
    println!("====================================================\n");

    // Create a temporary table file for demonstration
    let db_path = "demo_people.dat";
    std::fs::remove_file(db_path).ok();

    let config = DatabaseConfig::default()
        .with_pool_pages(8)
        .with_lock_timeout(Duration::from_millis(200));
    let db = Database::new(config);
    println!("Created database with an 8 page buffer pool\n");

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(24))
        .column("active", DataType::Boolean)
        .build_arc();
    let table = db
        .add_table("people", db_path, schema.clone())
        .expect("Failed to register table");
    println!("Registered table 'people' as {}: {}", table, schema);

    // Insert some tuples
    let txn = db.begin_transaction();
    let names = ["Ada", "Grace", "Edsger", "Barbara", "Donald"];
    let mut rows = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let mut row = Tuple::new(
            schema.clone(),
            vec![
                Value::Integer(i as i32),
                Value::from(*name),
                Value::Boolean(i % 2 == 0),
            ],
        )
        .expect("Failed to build tuple");
        db.buffer_pool()
            .insert_tuple(txn, table, &mut row)
            .expect("Failed to insert tuple");
        println!("Inserted {} at {:?}", row, row.record_id());
        rows.push(row);
    }

    // Delete one of them again
    db.buffer_pool()
        .delete_tuple(txn, &rows[1])
        .expect("Failed to delete tuple");
    println!("Deleted {}", rows[1]);

    db.commit(txn).expect("Failed to commit");
    println!("\nCommitted {}", txn);

    // A writer holding page 0 makes a concurrent reader time out
    let writer = db.begin_transaction();
    let reader = db.begin_transaction();
    let page_id = PageId::new(table, 0);
    let _page = db
        .buffer_pool()
        .get_page(writer, page_id, Permissions::ReadWrite)
        .expect("Failed to lock page");
    match db.buffer_pool().get_page(reader, page_id, Permissions::ReadOnly) {
        Err(StorageError::TransactionAborted { txn, .. }) => {
            println!("{} aborted waiting for {}", txn, page_id);
            db.abort(reader).expect("Failed to abort");
        }
        other => println!("Unexpected result: {:?}", other.map(|_| ())),
    }
    db.commit(writer).expect("Failed to commit");

    // Read the data back
    let txn = db.begin_transaction();
    let file = db.catalog().file(table).expect("Table not found");
    let mut scan = file.iterator(db.buffer_pool(), txn);
    scan.open().expect("Failed to open scan");

    println!("\nScanning {} ({} pages):", table, file.num_pages());
    while scan.has_next().expect("Scan failed") {
        println!("  - {}", scan.next().expect("Scan failed"));
    }
    scan.close();
    db.commit(txn).expect("Failed to commit");

    // Clean up
    drop(scan);
    drop(file);
    drop(db);
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
