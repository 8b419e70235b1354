//! Table definition loading and store manager configuration.
//!
//! This crate turns files on disk into the inputs a record store needs at
//! open time:
//!
//! - [`TableDefinitions`]: validated static table declarations, loaded from a
//!   directory of per-table files or a single [`DefinitionBundle`] file
//!   (JSON or YAML), optionally through a [`DefinitionsBuilder`] fallback
//!   chain.
//! - [`ManagerConfig`]: the YAML configuration naming every partition, its
//!   database path, definition source, encryption key and busy timeout.
//!
//! # Quick start
//!
//! ```no_run
//! use recordstore_db::{ManagerConfig, TableDefinitions};
//!
//! let config = ManagerConfig::load("recordstore.yml").unwrap();
//! config.validate().unwrap();
//!
//! for name in config.partition_names() {
//!     let partition = config.partition(name).unwrap();
//!     let defs = partition.load_definitions().unwrap();
//!     println!("{name}: {} static tables", defs.len());
//! }
//!
//! let defs = TableDefinitions::builder()
//!     .from_dir("tables/user/")
//!     .from_bundle("tables/user.yaml")
//!     .build()
//!     .unwrap();
//! ```
//!
//! [`DefinitionBundle`]: recordstore_core::DefinitionBundle

mod config;
mod error;
mod loader;

pub use config::{
    DEFAULT_BUSY_TIMEOUT_MS, EncryptionKey, IN_MEMORY_PATH, ManagerConfig, PartitionConfig,
};
pub use error::{DefinitionError, Result};
pub use loader::{DefinitionSource, DefinitionsBuilder, TableDefinitions};
