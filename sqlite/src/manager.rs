//! Partitioned stores opened on demand from a [`ManagerConfig`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use recordstore_db::ManagerConfig;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::record_store::RecordStore;
use crate::store::Store;

/// Partition holding user data.
pub const USER_PARTITION: &str = "user";

/// Partition holding application data.
pub const SYSTEM_PARTITION: &str = "system";

/// Owns one [`Store`] per opened partition.
///
/// # Example
///
/// ```
/// use recordstore_core::Record;
/// use recordstore_db::{ManagerConfig, PartitionConfig};
/// use recordstore_sqlite::{StoreManager, USER_PARTITION};
///
/// let config = ManagerConfig::new().with_partition(USER_PARTITION, PartitionConfig::in_memory());
/// let manager = StoreManager::new(config).unwrap();
///
/// let notes = manager.dynamic_record_store(USER_PARTITION, "notes").unwrap();
/// notes.save(Record::new().with("title", "hello")).unwrap();
/// assert_eq!(notes.query_all().unwrap().len(), 1);
///
/// manager.close_all().unwrap();
/// ```
#[derive(Debug)]
pub struct StoreManager {
    config: ManagerConfig,
    stores: Mutex<HashMap<String, Arc<Store>>>,
}

impl StoreManager {
    /// Validates `config`. No store is opened yet.
    ///
    /// # Errors
    ///
    /// [`StoreError::Config`] if the configuration is unusable.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| StoreError::Config(err.to_string()))?;
        Ok(Self {
            config,
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// Loads a YAML configuration file and validates it.
    ///
    /// # Errors
    ///
    /// [`StoreError::Definitions`] if the file cannot be read or parsed,
    /// [`StoreError::Config`] if it is unusable.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(ManagerConfig::load(path.as_ref())?)
    }

    /// The configuration this manager was built from.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Configured partition names, sorted.
    pub fn partitions(&self) -> Vec<String> {
        self.config.partition_names().map(String::from).collect()
    }

    fn stores(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Store>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens `partition`, or returns the already open store.
    ///
    /// Partitions open independently: the lock is not held while a store
    /// opens. If two callers race on the same partition, the first store
    /// registered wins and the other is closed.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownPartition`] if the partition is not configured;
    /// otherwise see [`Store::open`].
    pub fn open(&self, partition: &str) -> Result<Arc<Store>> {
        let config = self
            .config
            .partition(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        if let Some(store) = self.stores().get(partition) {
            return Ok(Arc::clone(store));
        }

        let opened = Store::open(partition, config)?;
        let winner = Arc::clone(
            self.stores()
                .entry(partition.to_string())
                .or_insert_with(|| Arc::clone(&opened)),
        );
        if !Arc::ptr_eq(&winner, &opened) {
            opened.close()?;
        }
        Ok(winner)
    }

    /// Opens every configured partition.
    ///
    /// # Errors
    ///
    /// Stops at the first partition that fails to open.
    pub fn open_all(&self) -> Result<()> {
        for partition in self.partitions() {
            self.open(&partition)?;
        }
        info!(partitions = self.partitions().len(), "All partitions open");
        Ok(())
    }

    /// Returns `true` if `partition` is currently open.
    pub fn is_open(&self, partition: &str) -> bool {
        self.stores().contains_key(partition)
    }

    /// Closes `partition`. Closing a partition that is not open is a no-op.
    /// Handles obtained earlier fail with [`StoreError::Closed`] afterwards.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownPartition`] if the partition is not configured,
    /// [`StoreError::Worker`] if its worker panicked.
    pub fn close(&self, partition: &str) -> Result<()> {
        if self.config.partition(partition).is_none() {
            return Err(StoreError::UnknownPartition(partition.to_string()));
        }
        let store = self.stores().remove(partition);
        match store {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    /// Closes every open partition, reporting the first failure after
    /// trying all of them.
    ///
    /// # Errors
    ///
    /// [`StoreError::Worker`] if a worker panicked.
    pub fn close_all(&self) -> Result<()> {
        let stores: Vec<Arc<Store>> = self.stores().drain().map(|(_, store)| store).collect();
        let mut first_error = None;
        for store in stores {
            if let Err(err) = store.close() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Handle on a registered table of `partition`, opening it if needed.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open) and [`Store::record_store`].
    pub fn record_store(&self, partition: &str, table: &str) -> Result<RecordStore> {
        self.open(partition)?.record_store(table)
    }

    /// Dynamic table handle keyed by `_id` on `partition`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open) and [`Store::dynamic_record_store`].
    pub fn dynamic_record_store(&self, partition: &str, table: &str) -> Result<RecordStore> {
        self.open(partition)?.dynamic_record_store(table)
    }

    /// Dynamic table handle keyed by `primary_key` on `partition`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open) and [`Store::dynamic_record_store_with_key`].
    pub fn dynamic_record_store_with_key(
        &self,
        partition: &str,
        table: &str,
        primary_key: &str,
    ) -> Result<RecordStore> {
        self.open(partition)?
            .dynamic_record_store_with_key(table, primary_key)
    }

    /// Table handle on the [`USER_PARTITION`].
    ///
    /// # Errors
    ///
    /// See [`record_store`](Self::record_store).
    pub fn user_table(&self, table: &str) -> Result<RecordStore> {
        self.record_store(USER_PARTITION, table)
    }

    /// Table handle on the [`SYSTEM_PARTITION`].
    ///
    /// # Errors
    ///
    /// See [`record_store`](Self::record_store).
    pub fn system_table(&self, table: &str) -> Result<RecordStore> {
        self.record_store(SYSTEM_PARTITION, table)
    }
}

impl Drop for StoreManager {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}
