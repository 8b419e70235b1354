//! Table definition loading with builder pattern and fallback chains.
//!
//! Provides [`TableDefinitions`], the validated set of table declarations a
//! store is seeded from, and [`DefinitionsBuilder`] for loading it from
//! several candidate sources with automatic fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use recordstore_db::TableDefinitions;
//!
//! // A directory with one table per *.json / *.yaml / *.yml file
//! let defs = TableDefinitions::from_dir("tables/user/").unwrap();
//! assert!(defs.get("contacts").is_some());
//!
//! // A single DefinitionBundle file
//! let defs = TableDefinitions::from_bundle("tables/user.yaml").unwrap();
//!
//! // First source that loads wins
//! let defs = TableDefinitions::builder()
//!     .from_dir("/etc/app/tables/")
//!     .from_bundle("/usr/share/app/tables.json")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Every table is checked with [`validate_table`] while loading, so a
//! successfully loaded set never carries a malformed declaration.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use recordstore_core::{DefinitionBundle, TableSchema, validate_bundle, validate_table};
use serde::de::DeserializeOwned;

use crate::error::{DefinitionError, Result};

/// Describes where a [`TableDefinitions`] set was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionSource {
    /// Built in code.
    Inline,
    /// A directory of per-table files.
    Directory(PathBuf),
    /// A single [`DefinitionBundle`] file.
    Bundle(PathBuf),
    /// A fallback chain of sources.
    Multiple(Vec<DefinitionSource>),
}

/// File formats accepted for definition files, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml" | "yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

fn declared_spelling(table: &TableSchema, name: &str) -> String {
    table
        .column(name)
        .map_or_else(|| name.to_string(), |column| column.name.clone())
}

fn read_file<T: DeserializeOwned>(path: &Path, format: Format) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    let value = match format {
        Format::Json => serde_json::from_reader(reader)?,
        Format::Yaml => serde_yaml::from_reader(reader)?,
    };
    Ok(value)
}

/// Validated table declarations keyed by table name.
///
/// # Examples
///
/// ```
/// use recordstore_core::{ColumnType, TableSchema};
/// use recordstore_db::TableDefinitions;
///
/// let defs = TableDefinitions::from_tables([
///     TableSchema::new("contacts", "id")
///         .with_column("id", ColumnType::Integer)
///         .with_column("name", ColumnType::Text),
/// ])
/// .unwrap();
///
/// assert_eq!(defs.len(), 1);
/// assert!(defs.contains("contacts"));
/// ```
#[derive(Debug, Clone)]
pub struct TableDefinitions {
    /// Keyed by the ASCII-lowercased table name.
    tables: BTreeMap<String, TableSchema>,
    source: DefinitionSource,
}

impl TableDefinitions {
    /// Returns a new [`DefinitionsBuilder`] for configuring a fallback chain.
    pub fn builder() -> DefinitionsBuilder {
        DefinitionsBuilder::new()
    }

    /// An empty set, for stores that only hold dynamic tables.
    pub fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
            source: DefinitionSource::Inline,
        }
    }

    /// Builds a set from in-memory declarations.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Validation`] for the first malformed table,
    /// or [`DefinitionError::InvalidDefinition`] if two tables share a name.
    pub fn from_tables(tables: impl IntoIterator<Item = TableSchema>) -> Result<Self> {
        let mut defs = Self::empty();
        for table in tables {
            defs.add(table, "<inline>")?;
        }
        Ok(defs)
    }

    fn add(&mut self, mut table: TableSchema, origin: &str) -> Result<()> {
        if let Some(err) = validate_table(&table).into_iter().next() {
            return Err(err.into());
        }
        // Key and searchable columns take the spelling of their declaration.
        let primary_key = declared_spelling(&table, &table.primary_key);
        let searchable: Vec<String> = table
            .searchable
            .iter()
            .map(|name| declared_spelling(&table, name))
            .collect();
        table.primary_key = primary_key;
        table.searchable = searchable;
        let key = table.name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            return Err(DefinitionError::InvalidDefinition {
                path: origin.to_string(),
                message: format!("table '{}' is declared more than once", table.name),
            });
        }
        self.tables.insert(key, table);
        Ok(())
    }

    /// Loads every `*.json`, `*.yaml` and `*.yml` file in `path`, each
    /// holding one [`TableSchema`]. Other files are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Io`] if the directory or a file cannot be
    /// read, [`DefinitionError::Json`] / [`DefinitionError::Yaml`] if a file
    /// does not parse, and the validation errors of
    /// [`from_tables`](Self::from_tables).
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if let Some(format) = Format::from_path(&file_path) {
                files.push((file_path, format));
            }
        }
        // Directory iteration order is platform dependent.
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut defs = Self::empty();
        for (file_path, format) in files {
            let table: TableSchema = read_file(&file_path, format)?;
            defs.add(table, &file_path.display().to_string())?;
        }
        defs.source = DefinitionSource::Directory(path.to_path_buf());
        Ok(defs)
    }

    /// Loads a single [`DefinitionBundle`] file, JSON or YAML by extension.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::InvalidDefinition`] for an unsupported
    /// extension or duplicate table, plus the I/O, parse and validation
    /// errors of [`from_dir`](Self::from_dir).
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| DefinitionError::InvalidDefinition {
            path: path.display().to_string(),
            message: "expected a .json, .yaml or .yml file".to_string(),
        })?;
        let bundle: DefinitionBundle = read_file(path, format)?;
        if let Some(err) = validate_bundle(&bundle).into_iter().next() {
            return Err(err.into());
        }

        let mut defs = Self::empty();
        for table in bundle.tables {
            defs.add(table, &path.display().to_string())?;
        }
        defs.source = DefinitionSource::Bundle(path.to_path_buf());
        Ok(defs)
    }

    /// Loads from a directory or a bundle file, whichever `path` is.
    ///
    /// # Errors
    ///
    /// See [`from_dir`](Self::from_dir) and [`from_bundle`](Self::from_bundle).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_bundle(path)
        }
    }

    /// Looks up a table declaration. Table names compare ASCII
    /// case-insensitively.
    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(&table.to_ascii_lowercase())
    }

    /// Returns `true` if `table` is declared.
    pub fn contains(&self, table: &str) -> bool {
        self.get(table).is_some()
    }

    /// Number of declared tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if no table is declared.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Declared table names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.values().map(|table| table.name.as_str())
    }

    /// Declarations in table-name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    /// Where the set was loaded from.
    pub fn source(&self) -> &DefinitionSource {
        &self.source
    }
}

impl Default for TableDefinitions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builder for loading [`TableDefinitions`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first one that loads
/// wins; if all fail, [`DefinitionError::NoSourcesAvailable`] is returned.
///
/// ```no_run
/// use recordstore_db::TableDefinitions;
///
/// let defs = TableDefinitions::builder()
///     .from_dir("/etc/app/tables/")
///     .from_bundle("/usr/share/app/tables.yaml")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct DefinitionsBuilder {
    sources: Vec<DefinitionSource>,
}

impl DefinitionsBuilder {
    /// Creates a builder with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of per-table files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DefinitionSource::Directory(path.into()));
        self
    }

    /// Adds a bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DefinitionSource::Bundle(path.into()));
        self
    }

    /// Tries each source in order and returns the first that loads.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::NoSourcesAvailable`] if no source was
    /// added or all of them failed.
    pub fn build(self) -> Result<TableDefinitions> {
        if self.sources.is_empty() {
            return Err(DefinitionError::NoSourcesAvailable);
        }

        for source in &self.sources {
            let result = match source {
                DefinitionSource::Directory(path) => TableDefinitions::from_dir(path),
                DefinitionSource::Bundle(path) => TableDefinitions::from_bundle(path),
                DefinitionSource::Inline | DefinitionSource::Multiple(_) => continue,
            };

            if let Ok(mut defs) = result {
                defs.source = DefinitionSource::Multiple(self.sources.clone());
                return Ok(defs);
            }
        }

        Err(DefinitionError::NoSourcesAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstore_core::{ColumnType, ValidationError};
    use std::io::Write;

    fn table(name: &str) -> TableSchema {
        TableSchema::new(name, "id")
            .with_column("id", ColumnType::Integer)
            .with_column("title", ColumnType::Text)
    }

    fn write_json(dir: &Path, schema: &TableSchema) {
        let path = dir.join(format!("{}.json", schema.name));
        let mut f = File::create(path).unwrap();
        serde_json::to_writer_pretty(&mut f, schema).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_from_dir_mixed_formats() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), &table("notes"));
        std::fs::write(
            dir.path().join("tags.yml"),
            "name: tags\nprimary_key: tag\ncolumns:\n  - name: tag\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let defs = TableDefinitions::from_dir(dir.path()).unwrap();
        assert_eq!(defs.len(), 2);
        assert!(defs.contains("notes"));
        assert_eq!(defs.get("tags").unwrap().primary_key, "tag");
        assert_eq!(defs.source(), &DefinitionSource::Directory(dir.path().to_path_buf()));
    }

    #[test]
    fn test_from_dir_rejects_duplicate_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), &table("notes"));
        let yaml = serde_yaml::to_string(&table("notes")).unwrap();
        std::fs::write(dir.path().join("copy.yaml"), yaml).unwrap();

        let err = TableDefinitions::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_table_names_ignore_case() {
        let defs = TableDefinitions::from_tables([table("Notes")]).unwrap();
        assert!(defs.contains("notes"));
        assert_eq!(defs.get("NOTES").unwrap().name, "Notes");
        assert_eq!(defs.names().collect::<Vec<_>>(), vec!["Notes"]);

        let mixed = TableSchema::new("tags", "TAG")
            .with_column("tag", ColumnType::Text)
            .searchable(["Tag"]);
        let defs = TableDefinitions::from_tables([mixed]).unwrap();
        let tags = defs.get("tags").unwrap();
        assert_eq!(tags.primary_key, "tag");
        assert_eq!(tags.searchable, vec!["tag"]);

        let err = TableDefinitions::from_tables([table("notes"), table("NOTES")]).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_from_bundle_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.yaml");
        let mut bundle = DefinitionBundle::new("user", "1");
        bundle.tables.push(table("notes"));
        bundle.tables.push(table("links"));
        std::fs::write(&path, serde_yaml::to_string(&bundle).unwrap()).unwrap();

        let defs = TableDefinitions::from_bundle(&path).unwrap();
        let names: Vec<&str> = defs.names().collect();
        assert_eq!(names, vec!["links", "notes"]);
    }

    #[test]
    fn test_from_bundle_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.toml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            TableDefinitions::from_bundle(&path),
            Err(DefinitionError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_invalid_table_rejected() {
        let bad = TableSchema::new("_rs_tables", "id").with_column("id", ColumnType::Integer);
        let err = TableDefinitions::from_tables([bad]).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Validation(ValidationError::ReservedName(_))
        ));
    }

    #[test]
    fn test_load_dispatches_on_path_kind() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), &table("notes"));
        assert_eq!(TableDefinitions::load(dir.path()).unwrap().len(), 1);

        let bundle_path = dir.path().join("bundle.json");
        let mut bundle = DefinitionBundle::new("user", "1");
        bundle.tables.push(table("other"));
        std::fs::write(&bundle_path, serde_json::to_string(&bundle).unwrap()).unwrap();
        assert!(TableDefinitions::load(&bundle_path).unwrap().contains("other"));
    }

    #[test]
    fn test_builder_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), &table("notes"));

        let defs = TableDefinitions::builder()
            .from_dir("/nonexistent/tables/")
            .from_dir(dir.path())
            .build()
            .unwrap();
        assert!(defs.contains("notes"));
        assert!(matches!(defs.source(), DefinitionSource::Multiple(sources) if sources.len() == 2));
    }

    #[test]
    fn test_builder_all_fail() {
        assert!(matches!(
            TableDefinitions::builder().build(),
            Err(DefinitionError::NoSourcesAvailable)
        ));
        assert!(matches!(
            TableDefinitions::builder()
                .from_bundle("/nonexistent/bundle.json")
                .build(),
            Err(DefinitionError::NoSourcesAvailable)
        ));
    }
}
