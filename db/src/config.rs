//! Store manager configuration.
//!
//! Defines the YAML-serializable configuration that names every partition a
//! store manager can open: where its database file lives, where its static
//! table definitions come from, and how its connection is set up.
//!
//! # Example YAML
//!
//! ```yaml
//! partitions:
//!   user:
//!     path: /var/lib/app/user.db
//!     definitions: /usr/share/app/tables/user
//!     encryption_key: "s3cret"
//!     busy_timeout_ms: 5000
//!   system:
//!     path: /var/lib/app/system.db
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use recordstore_core::validate_identifier;
use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, Result};
use crate::loader::TableDefinitions;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Busy timeout applied when a partition does not set one.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Opaque database encryption key.
///
/// The key is handed to the engine as-is and never interpreted. Its `Debug`
/// output is redacted so it cannot leak through logs or error messages.
///
/// ```
/// use recordstore_db::EncryptionKey;
///
/// let key = EncryptionKey::new("hunter2");
/// assert_eq!(key.expose(), "hunter2");
/// assert_eq!(format!("{key:?}"), "EncryptionKey(<redacted>)");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptionKey(String);

impl EncryptionKey {
    /// Wraps a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Settings for one named store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// Directory or bundle file of static table definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<PathBuf>,
    /// Key applied with `PRAGMA key` right after the connection opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<EncryptionKey>,
    /// How long a statement waits on a locked database, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,
}

impl PartitionConfig {
    /// A file-backed partition with no definitions.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            definitions: None,
            encryption_key: None,
            busy_timeout_ms: None,
        }
    }

    /// A private in-memory partition.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_PATH)
    }

    /// Sets the definition source.
    pub fn with_definitions(mut self, path: impl Into<PathBuf>) -> Self {
        self.definitions = Some(path.into());
        self
    }

    /// Sets the encryption key.
    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Sets the busy timeout.
    pub fn with_busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = Some(millis);
        self
    }

    /// Returns `true` if the partition lives in memory.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Busy timeout, falling back to [`DEFAULT_BUSY_TIMEOUT_MS`].
    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Loads the partition's static definitions, or an empty set if none are
    /// configured.
    ///
    /// # Errors
    ///
    /// Propagates [`TableDefinitions::load`] failures.
    pub fn load_definitions(&self) -> Result<TableDefinitions> {
        match &self.definitions {
            Some(path) => TableDefinitions::load(path),
            None => Ok(TableDefinitions::empty()),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(DefinitionError::InvalidConfig(format!(
                "partition '{name}' has an empty path"
            )));
        }
        if !self.is_in_memory() {
            if self.path.is_dir() {
                return Err(DefinitionError::InvalidConfig(format!(
                    "partition '{name}' path {} is a directory",
                    self.path.display()
                )));
            }
            let parent_missing = self
                .path
                .parent()
                .is_some_and(|parent| !parent.as_os_str().is_empty() && !parent.is_dir());
            if parent_missing {
                return Err(DefinitionError::InvalidConfig(format!(
                    "partition '{name}' path {} has no parent directory",
                    self.path.display()
                )));
            }
        }
        if let Some(definitions) = &self.definitions {
            if !definitions.exists() {
                return Err(DefinitionError::InvalidConfig(format!(
                    "partition '{name}' definitions {} do not exist",
                    definitions.display()
                )));
            }
        }
        Ok(())
    }
}

/// Top-level store manager configuration.
///
/// # Examples
///
/// ```
/// use recordstore_db::{ManagerConfig, PartitionConfig};
///
/// let config = ManagerConfig::new()
///     .with_partition("user", PartitionConfig::in_memory())
///     .with_partition("system", PartitionConfig::in_memory());
/// assert!(config.validate().is_ok());
/// assert_eq!(config.partition_names().collect::<Vec<_>>(), vec!["system", "user"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Partitions by name.
    #[serde(default)]
    pub partitions: BTreeMap<String, PartitionConfig>,
}

impl ManagerConfig {
    /// Creates a configuration with no partitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a partition.
    pub fn with_partition(mut self, name: impl Into<String>, partition: PartitionConfig) -> Self {
        self.partitions.insert(name.into(), partition);
        self
    }

    /// Looks up a partition.
    pub fn partition(&self, name: &str) -> Option<&PartitionConfig> {
        self.partitions.get(name)
    }

    /// Partition names in sorted order.
    pub fn partition_names(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Io`] if the file cannot be read, or
    /// [`DefinitionError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Io`] if the file cannot be written, or
    /// [`DefinitionError::Yaml`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks that the configuration can be opened.
    ///
    /// There must be at least one partition; partition names must be plain
    /// identifiers; file paths must be non-empty, not directories and sit in
    /// an existing directory; configured definition sources must exist.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::InvalidConfig`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<()> {
        if self.partitions.is_empty() {
            return Err(DefinitionError::InvalidConfig(
                "no partitions configured".to_string(),
            ));
        }
        for (name, partition) in &self.partitions {
            if validate_identifier(name).is_err() {
                return Err(DefinitionError::InvalidConfig(format!(
                    "invalid partition name '{name}'"
                )));
            }
            partition.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
partitions:
  user:
    path: ":memory:"
    encryption_key: "s3cret"
    busy_timeout_ms: 250
  system:
    path: ":memory:"
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: ManagerConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let user = config.partition("user").unwrap();
        assert!(user.is_in_memory());
        assert_eq!(user.encryption_key.as_ref().unwrap().expose(), "s3cret");
        assert_eq!(user.busy_timeout_ms(), 250);

        let system = config.partition("system").unwrap();
        assert_eq!(system.busy_timeout_ms(), DEFAULT_BUSY_TIMEOUT_MS);
        assert!(system.definitions.is_none());
    }

    #[test]
    fn test_key_not_in_debug() {
        let config: ManagerConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(
            ManagerConfig::new().validate(),
            Err(DefinitionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_partition_name() {
        let config = ManagerConfig::new().with_partition("no spaces", PartitionConfig::in_memory());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_paths() {
        let dir = tempfile::tempdir().unwrap();

        let is_dir = ManagerConfig::new().with_partition("user", PartitionConfig::new(dir.path()));
        assert!(is_dir.validate().is_err());

        let no_parent = ManagerConfig::new().with_partition(
            "user",
            PartitionConfig::new(dir.path().join("missing").join("user.db")),
        );
        assert!(no_parent.validate().is_err());

        let no_defs = ManagerConfig::new().with_partition(
            "user",
            PartitionConfig::new(dir.path().join("user.db"))
                .with_definitions(dir.path().join("tables")),
        );
        assert!(no_defs.validate().is_err());

        let ok = ManagerConfig::new()
            .with_partition("user", PartitionConfig::new(dir.path().join("user.db")));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_relative_path_is_valid() {
        let config = ManagerConfig::new().with_partition("user", PartitionConfig::new("user.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recordstore.yml");

        let original: ManagerConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = ManagerConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_definitions_defaults_to_empty() {
        let defs = PartitionConfig::in_memory().load_definitions().unwrap();
        assert!(defs.is_empty());
    }
}
