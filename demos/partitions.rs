//! Store manager example.
//!
//! A YAML configuration names partitions, each its own database file. The
//! manager opens them on demand and hands out table handles; handles taken
//! before a partition is closed stop working after it.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p recordstore-demos --example partitions
//! ```

use recordstore_core::Record;
use recordstore_db::{ManagerConfig, PartitionConfig};
use recordstore_sqlite::{SYSTEM_PARTITION, StoreManager, USER_PARTITION};

fn main() {
    let dir = tempfile::tempdir().unwrap();
    let config = ManagerConfig::new()
        .with_partition(USER_PARTITION, PartitionConfig::new(dir.path().join("user.db")))
        .with_partition(
            SYSTEM_PARTITION,
            PartitionConfig::new(dir.path().join("system.db")).with_busy_timeout_ms(2000),
        );
    let config_path = dir.path().join("recordstore.yaml");
    config.save(&config_path).unwrap();
    println!("{}", std::fs::read_to_string(&config_path).unwrap());

    let manager = StoreManager::from_file(&config_path).unwrap();

    let settings = manager
        .dynamic_record_store_with_key(SYSTEM_PARTITION, "settings", "name")
        .unwrap();
    settings
        .save_or_update_list([
            Record::new().with("name", "theme").with("value", "dark"),
            Record::new().with("name", "locale").with("value", "en_GB"),
        ])
        .unwrap();

    let drafts = manager.dynamic_record_store(USER_PARTITION, "drafts").unwrap();
    drafts.save(Record::new().with("text", "hello")).unwrap();

    println!("open partitions:");
    for partition in manager.partitions() {
        println!("  {partition}: {}", manager.is_open(&partition));
    }

    manager.close(USER_PARTITION).unwrap();
    println!("\nafter closing '{USER_PARTITION}': {:?}", drafts.query_all());

    let reopened = manager.user_table("drafts").unwrap();
    println!("reopened: {:?}", reopened.query_all().unwrap());
    println!("theme: {:?}", manager.system_table("settings").unwrap().query_by_id("theme").unwrap());

    manager.close_all().unwrap();
}
