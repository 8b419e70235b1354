//! SQLite engine for the dynamic record store.
//!
//! Records are plain field-to-value maps ([`Record`](recordstore_core::Record))
//! stored in ordinary SQLite tables. Tables are either *static*, declared up
//! front through [`TableDefinitions`](recordstore_db::TableDefinitions), or
//! *dynamic*, growing a column for every new field a write brings in.
//!
//! # Architecture
//!
//! - **`store`**: [`Store`], one database and the worker thread that owns its
//!   connection. Every operation is a job on that worker.
//! - **`registry`**: the in-memory table schemas, seeded at open from the
//!   definitions and the `_rs_tables` catalog, extended by dynamic writes.
//! - **`record_store`**: [`RecordStore`], CRUD and search on one table.
//! - **`search`**: FTS5 matching and snippet highlighting.
//! - **`manager`**: [`StoreManager`], named partitions opened from a
//!   [`ManagerConfig`](recordstore_db::ManagerConfig).
//! - **`executor`**: the worker machinery and the process-wide
//!   [`work_queue`].
//!
//! # Quick start
//!
//! ```no_run
//! use recordstore_core::{Condition, HighlightMarker, Record};
//! use recordstore_sqlite::StoreManager;
//!
//! let manager = StoreManager::from_file("recordstore.yaml").unwrap();
//! let notes = manager.dynamic_record_store("user", "notes").unwrap();
//!
//! notes.save(Record::new().with("title", "alpha beta").with("pinned", 1)).unwrap();
//!
//! let pinned = notes.query(&Condition::new().and_eq("pinned", 1).desc("title")).unwrap();
//! println!("{} pinned notes", pinned.len());
//!
//! for hit in notes.search_with_snippets("alpha", &["title"], &HighlightMarker::default()).unwrap() {
//!     println!("{}", hit.snippets["title"]);
//! }
//! ```
//!
//! # Encryption
//!
//! A partition's `encryption_key` is applied with `PRAGMA key` before any
//! other statement. It only encrypts when the crate is built with the
//! `sqlcipher` feature.

mod convert;
mod error;
mod executor;
mod manager;
mod record_store;
mod registry;
mod schema;
mod search;
mod store;

pub use error::{Result, StoreError};
pub use executor::{WorkQueue, work_queue};
pub use manager::{SYSTEM_PARTITION, StoreManager, USER_PARTITION};
pub use record_store::RecordStore;
pub use registry::SchemaRegistry;
pub use schema::META_TABLE;
pub use search::SearchHit;
pub use store::Store;
