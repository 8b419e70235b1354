//! Static table example.
//!
//! Static tables come from definition files. Their columns are fixed by the
//! definition: fields a record brings that the table does not declare are
//! dropped on save.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p recordstore-demos --example static_tables
//! ```

use recordstore_core::{ColumnType, Condition, Record, TableSchema};
use recordstore_db::TableDefinitions;
use recordstore_sqlite::Store;

fn main() {
    let dir = tempfile::tempdir().unwrap();
    let tables = dir.path().join("tables");
    std::fs::create_dir(&tables).unwrap();

    let contacts = TableSchema::new("contacts", "id")
        .with_column("id", ColumnType::Integer)
        .with_column("name", ColumnType::Text)
        .with_column("city", ColumnType::Text)
        .with_column("age", ColumnType::Integer);
    std::fs::write(
        tables.join("contacts.yaml"),
        serde_yaml::to_string(&contacts).unwrap(),
    )
    .unwrap();

    let definitions = TableDefinitions::load(&tables).unwrap();
    println!("Loaded {} table definition(s) from {:?}", definitions.len(), definitions.source());

    let store = Store::open_path(dir.path().join("contacts.db"), definitions).unwrap();
    let contacts = store.record_store("contacts").unwrap();

    let people = [
        ("ada", "london", 36),
        ("grace", "arlington", 45),
        ("linus", "portland", 28),
        ("barbara", "boston", 52),
        ("ken", "berkeley", 41),
    ];
    let keys = contacts
        .save_many(people.iter().map(|(name, city, age)| {
            Record::new()
                .with("name", *name)
                .with("city", *city)
                .with("age", *age)
                .with("favorite_color", "blue")
        }))
        .unwrap();
    println!("Generated keys: {keys:?}");

    let first = contacts.query_by_id(keys[0].clone()).unwrap().unwrap();
    println!("Undeclared fields are dropped: {first:?}");

    println!("\nPages of two, oldest first:");
    for page in 1..=3 {
        let rows = contacts
            .query(&Condition::new().selects(["name", "age"]).desc("age").page(page, 2))
            .unwrap();
        println!("  page {page}: {rows:?}");
    }

    let over_forty = Condition::new().and_gt("age", 40);
    let moved = contacts
        .update(Record::new().with("city", "remote"), &over_forty)
        .unwrap();
    println!("\nMoved {moved} contacts over forty to 'remote'");

    let removed = contacts
        .remove(&Condition::new().and_in("name", ["ada", "ken"]))
        .unwrap();
    println!("Removed {removed}; {} left", contacts.count(&Condition::new()).unwrap());
}
