//! One database file served by one worker thread.
//!
//! A [`Store`] opens its connection, applies the partition's key and pragmas,
//! synchronizes its [`SchemaRegistry`] and then hands both to a dedicated
//! worker. Every operation afterwards is a job on that worker, wrapped in a
//! transaction when it writes, and the caller blocks until it completes.
//!
//! # Example
//!
//! ```
//! use recordstore_core::{Condition, Record};
//! use recordstore_db::TableDefinitions;
//! use recordstore_sqlite::Store;
//!
//! let store = Store::open_in_memory(TableDefinitions::empty()).unwrap();
//! let events = store.dynamic_record_store("events").unwrap();
//!
//! let id = events.save(Record::new().with("kind", "login").with("user", "ada")).unwrap();
//! let found = events.query_by_id(id).unwrap().unwrap();
//! assert_eq!(found.get("user").and_then(|v| v.as_text()), Some("ada"));
//!
//! assert_eq!(events.count(&Condition::new().and_eq("kind", "login")).unwrap(), 1);
//! store.close().unwrap();
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use recordstore_core::{DYNAMIC_PRIMARY_KEY, TableSchema};
use recordstore_db::{PartitionConfig, TableDefinitions};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::executor::{Worker, WorkerHandle};
use crate::record_store::RecordStore;
use crate::registry::{SchemaRegistry, StagedSchemas};

/// Everything a store's worker owns.
pub(crate) struct StoreState {
    pub(crate) conn: Connection,
    pub(crate) registry: SchemaRegistry,
}

impl StoreState {
    /// Runs `op` in a transaction. Schema changes staged by `op` reach the
    /// registry only if the transaction commits.
    pub(crate) fn write<T>(
        &mut self,
        table: &str,
        op: impl FnOnce(&Transaction<'_>, &mut SchemaRegistry, &mut StagedSchemas) -> Result<T>,
    ) -> Result<T> {
        let StoreState { conn, registry } = self;
        let tx = conn.transaction()?;
        let mut staged = StagedSchemas::default();
        let value = match op(&tx, &mut *registry, &mut staged) {
            Ok(value) => value,
            Err(err) => {
                warn!(table, error = %err, "Write rolled back");
                return Err(err);
            }
        };
        if let Err(err) = tx.commit() {
            warn!(table, error = %err, "Commit failed, write rolled back");
            return Err(err.into());
        }
        if !staged.is_empty() {
            debug!(table, "Schema changes applied");
            registry.apply(staged);
        }
        Ok(value)
    }
}

/// Opens the connection for a partition and applies key and pragmas.
fn open_connection(config: &PartitionConfig) -> Result<Connection> {
    let conn = if config.is_in_memory() {
        Connection::open_in_memory()?
    } else {
        Connection::open(&config.path)?
    };
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, config: &PartitionConfig) -> Result<()> {
    // The key must be the first statement on the connection. Plain SQLite
    // ignores the unknown pragma.
    if let Some(key) = &config.encryption_key {
        conn.execute_batch(&format!(
            "PRAGMA key = '{}';",
            key.expose().replace('\'', "''")
        ))?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA recursive_triggers = ON;")?;
    if !config.is_in_memory() {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms()))?;
    Ok(())
}

/// A single database file (or in-memory database) and its worker.
pub struct Store {
    name: String,
    worker: Mutex<Option<Worker<StoreState>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Store {
    /// Opens the partition `name` described by `config`.
    ///
    /// Loads the partition's definitions, opens the connection, applies the
    /// encryption key and pragmas, synchronizes declared tables and loads
    /// recorded dynamic tables, then starts the worker.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Definitions`] if the definitions cannot be
    /// loaded, [`StoreError::Database`] if the file cannot be opened (a wrong
    /// key surfaces here too), and [`StoreError::SchemaConflict`] if a
    /// declared table contradicts the existing database.
    pub fn open(name: &str, config: &PartitionConfig) -> Result<Arc<Self>> {
        let definitions = config.load_definitions()?;
        Self::open_with_definitions(name, config, &definitions)
    }

    /// Opens a store with definitions supplied in code.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_definitions(
        name: &str,
        config: &PartitionConfig,
        definitions: &TableDefinitions,
    ) -> Result<Arc<Self>> {
        let mut conn = open_connection(config)?;
        let registry = SchemaRegistry::load(&mut conn, definitions)?;
        let tables = registry.tables().len();
        let worker = Worker::spawn(format!("recordstore-{name}"), StoreState { conn, registry })?;
        info!(
            partition = name,
            path = %config.path.display(),
            tables,
            "Store opened"
        );
        Ok(Arc::new(Self {
            name: name.to_string(),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_in_memory(definitions: TableDefinitions) -> Result<Arc<Self>> {
        Self::open_with_definitions("memory", &PartitionConfig::in_memory(), &definitions)
    }

    /// Opens a file-backed store with default settings.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_path(path: impl AsRef<Path>, definitions: TableDefinitions) -> Result<Arc<Self>> {
        let config = PartitionConfig::new(path.as_ref());
        let name = path
            .as_ref()
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("store")
            .to_string();
        Self::open_with_definitions(&name, &config, &definitions)
    }

    /// Partition name this store was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self) -> Result<WorkerHandle<StoreState>> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Worker::handle)
            .ok_or(StoreError::Closed)
    }

    /// Runs `job` on the worker and waits for it.
    pub(crate) fn execute<T: Send + 'static>(
        &self,
        job: impl FnOnce(&mut StoreState) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        self.handle()?.run(job)?
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stops the worker after queued jobs finish and releases the
    /// connection. Idempotent. Later calls on this store or its handles fail
    /// with [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Worker`] if the worker thread panicked.
    pub fn close(&self) -> Result<()> {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut worker) = worker {
            worker.shutdown()?;
            info!(partition = %self.name, "Store closed");
        }
        Ok(())
    }

    /// Every table the store manages, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] on a closed store.
    pub fn tables(&self) -> Result<Vec<TableSchema>> {
        self.execute(|state| {
            Ok(state
                .registry
                .tables()
                .into_iter()
                .cloned()
                .collect())
        })
    }

    /// Current schema of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] if the table is not registered.
    pub fn schema(&self, table: &str) -> Result<TableSchema> {
        let table = table.to_string();
        self.execute(move |state| {
            state
                .registry
                .get(&table)
                .cloned()
                .ok_or(StoreError::UnknownTable(table))
        })
    }

    /// Handle on a registered table, static or dynamic.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] if the table is not registered.
    pub fn record_store(self: &Arc<Self>, table: &str) -> Result<RecordStore> {
        self.schema(table)?;
        Ok(RecordStore::new(Arc::clone(self), table))
    }

    /// Handle on a dynamic table keyed by the synthetic `_id` column,
    /// declaring the table if needed.
    ///
    /// # Errors
    ///
    /// See [`dynamic_record_store_with_key`](Self::dynamic_record_store_with_key).
    pub fn dynamic_record_store(self: &Arc<Self>, table: &str) -> Result<RecordStore> {
        self.dynamic_record_store_with_key(table, DYNAMIC_PRIMARY_KEY)
    }

    /// Handle on a dynamic table keyed by `primary_key`, declaring the table
    /// if needed. The physical table is created by the first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotDynamic`] for a static table,
    /// [`StoreError::SchemaConflict`] if the table already has another key,
    /// and [`StoreError::Validation`] for invalid names.
    pub fn dynamic_record_store_with_key(
        self: &Arc<Self>,
        table: &str,
        primary_key: &str,
    ) -> Result<RecordStore> {
        let (name, key) = (table.to_string(), primary_key.to_string());
        self.execute(move |state| {
            let StoreState { conn, registry } = state;
            registry.declare_dynamic(conn, &name, &key).map(|_| ())
        })?;
        Ok(RecordStore::new(Arc::clone(self), table))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
