//! Dynamic table example.
//!
//! A dynamic table starts with nothing but its key. Every save that brings a
//! field the table has not seen yet adds a column for it, and the full-text
//! index follows along.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=recordstore_sqlite=debug cargo run -p recordstore-demos --example dynamic_table
//! ```

use recordstore_core::{Condition, Record};
use recordstore_db::TableDefinitions;
use recordstore_sqlite::Store;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_path(dir.path().join("events.db"), TableDefinitions::empty()).unwrap();
    let events = store.dynamic_record_store("events").unwrap();

    println!("=== Columns grow with the data ===\n");
    let login = events
        .save(Record::new().with("kind", "login").with("user", "ada"))
        .unwrap();
    print_columns(&events);

    events
        .save(
            Record::new()
                .with("kind", "error")
                .with("user", "grace")
                .with("code", 500),
        )
        .unwrap();
    print_columns(&events);

    println!("\n=== Partial update vs. replace ===\n");
    events
        .update_by_id(Record::new().with("ip", "10.0.0.7"), login.clone())
        .unwrap();
    println!("after update_by_id: {:?}", events.query_by_id(login.clone()).unwrap());

    events
        .save(Record::new().with("_id", login.clone()).with("kind", "login"))
        .unwrap();
    println!("after save (replace): {:?}", events.query_by_id(login).unwrap());

    println!("\n=== Conditions ===\n");
    let errors = events
        .query(&Condition::new().and_eq("kind", "error").and_gte("code", 500))
        .unwrap();
    println!("server errors: {}", errors.len());
    println!(
        "events without a user: {}",
        events.count(&Condition::new().and_null("user")).unwrap()
    );

    store.close().unwrap();

    println!("\n=== Reopen ===\n");
    let store = Store::open_path(dir.path().join("events.db"), TableDefinitions::empty()).unwrap();
    let schema = store.schema("events").unwrap();
    println!(
        "'{}' is still {:?} with key '{}'",
        schema.name, schema.kind, schema.primary_key
    );
}

fn print_columns(events: &recordstore_sqlite::RecordStore) {
    let schema = events.schema().unwrap();
    let columns: Vec<&str> = schema.column_names().collect();
    println!("columns: {columns:?}, searchable: {:?}", schema.searchable);
}
