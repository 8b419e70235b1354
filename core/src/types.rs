//! Table schema definitions.
//!
//! A [`TableSchema`] describes one table the store knows about: its primary
//! key, its ordered columns, whether it may grow at runtime, and which
//! columns feed its full-text index. Static schemas come from definition
//! files; dynamic schemas start with just a primary key and grow as records
//! present new fields.

use serde::{Deserialize, Serialize};

/// Primary-key column used by dynamic tables unless the caller picks one.
pub const DYNAMIC_PRIMARY_KEY: &str = "_id";

/// Prefix reserved for the store's own tables, indexes and triggers.
pub const RESERVED_PREFIX: &str = "_rs_";

/// Whether a table's column set is fixed by its definition or grows from
/// incoming records.
///
/// # Examples
///
/// ```
/// use recordstore_core::TableKind;
///
/// assert_eq!(TableKind::default(), TableKind::Static);
/// assert_eq!(TableKind::Dynamic.as_str(), "dynamic");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Declared by a table definition; never extended at runtime.
    #[default]
    Static,
    /// Columns are added the first time a record carries an unknown field.
    Dynamic,
}

impl TableKind {
    /// Stable storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Static => "static",
            TableKind::Dynamic => "dynamic",
        }
    }

    /// Parses a storage name produced by [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "static" => Some(TableKind::Static),
            "dynamic" => Some(TableKind::Dynamic),
            _ => None,
        }
    }
}

/// Declared SQL type of a column.
///
/// Only affects static tables. Dynamic columns are always declared `BLOB`
/// so SQLite stores whatever scalar arrives without coercing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// `TEXT` affinity.
    #[default]
    Text,
    /// `INTEGER` affinity. An integer primary key aliases the rowid and is
    /// assigned by the engine when omitted.
    Integer,
    /// `REAL` affinity.
    Real,
    /// `BLOB` (no affinity).
    Blob,
    /// `NUMERIC` affinity.
    Numeric,
}

impl ColumnType {
    /// SQL type name used in `CREATE TABLE` / `ADD COLUMN`.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
            ColumnType::Numeric => "NUMERIC",
        }
    }
}

/// A single column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Adds a `NOT NULL` constraint.
    #[serde(default)]
    pub not_null: bool,
}

impl ColumnDef {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
        }
    }

    /// Marks the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Schema of one table.
///
/// # Examples
///
/// ```
/// use recordstore_core::{ColumnType, TableSchema};
///
/// let notes = TableSchema::new("notes", "id")
///     .with_column("id", ColumnType::Integer)
///     .with_column("title", ColumnType::Text)
///     .with_column("body", ColumnType::Text)
///     .searchable(["title", "body"]);
///
/// assert!(notes.has_column("title"));
/// assert_eq!(notes.column_names().count(), 3);
/// assert!(!notes.is_dynamic());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Primary-key column name.
    pub primary_key: String,
    /// Columns in declaration order. Includes the primary key.
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    /// Static or dynamic.
    #[serde(default)]
    pub kind: TableKind,
    /// Columns covered by the full-text index, in index order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searchable: Vec<String>,
}

impl TableSchema {
    /// Creates a static schema with no columns yet.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            columns: Vec::new(),
            kind: TableKind::Static,
            searchable: Vec::new(),
        }
    }

    /// Creates a dynamic schema holding only its primary-key column.
    ///
    /// ```
    /// use recordstore_core::{DYNAMIC_PRIMARY_KEY, TableSchema};
    ///
    /// let events = TableSchema::dynamic("events", DYNAMIC_PRIMARY_KEY);
    /// assert!(events.is_dynamic());
    /// assert!(events.has_column("_id"));
    /// ```
    pub fn dynamic(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Self {
            name: name.into(),
            columns: vec![ColumnDef::new(primary_key.clone(), ColumnType::Blob).not_null()],
            primary_key,
            kind: TableKind::Dynamic,
            searchable: Vec::new(),
        }
    }

    /// Builder-style column append.
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef::new(name, column_type));
        self
    }

    /// Sets the full-text indexed columns.
    pub fn searchable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` for [`TableKind::Dynamic`].
    pub fn is_dynamic(&self) -> bool {
        self.kind == TableKind::Dynamic
    }

    /// Returns `true` if `name` is a declared column. Column names compare
    /// ASCII case-insensitively, as SQLite compares them.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Looks up a column declaration, ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Returns `true` if the primary key aliases SQLite's rowid, meaning the
    /// engine assigns it when a record omits it.
    pub fn has_rowid_key(&self) -> bool {
        self.column(&self.primary_key)
            .is_some_and(|column| column.column_type == ColumnType::Integer)
    }

    /// Returns `true` if the table has a full-text index.
    pub fn is_searchable(&self) -> bool {
        !self.searchable.is_empty()
    }

    /// Columns a dynamic table indexes for full-text search: every column
    /// except the primary key.
    pub fn dynamic_search_columns(&self) -> Vec<String> {
        self.column_names()
            .filter(|name| !name.eq_ignore_ascii_case(&self.primary_key))
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_kind_roundtrip_names() {
        for kind in [TableKind::Static, TableKind::Dynamic] {
            assert_eq!(TableKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TableKind::parse("other"), None);
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let notes = TableSchema::new("notes", "id")
            .with_column("id", ColumnType::Integer)
            .with_column("title", ColumnType::Text);
        assert!(notes.has_column("TITLE"));
        assert_eq!(notes.column("Title").map(|c| c.name.as_str()), Some("title"));
        assert!(!notes.has_column("body"));
        assert!(notes.has_rowid_key());
    }

    #[test]
    fn test_rowid_key_detection() {
        let integer_key = TableSchema::new("a", "id").with_column("id", ColumnType::Integer);
        let text_key = TableSchema::new("b", "id").with_column("id", ColumnType::Text);
        assert!(integer_key.has_rowid_key());
        assert!(!text_key.has_rowid_key());
        assert!(!TableSchema::dynamic("c", DYNAMIC_PRIMARY_KEY).has_rowid_key());
    }

    #[test]
    fn test_dynamic_search_columns_skip_key() {
        let mut schema = TableSchema::dynamic("events", DYNAMIC_PRIMARY_KEY);
        schema.columns.push(ColumnDef::new("title", ColumnType::Blob));
        schema.columns.push(ColumnDef::new("body", ColumnType::Blob));
        assert_eq!(schema.dynamic_search_columns(), vec!["title", "body"]);
    }

    #[test]
    fn test_schema_deserializes_from_yaml() {
        let yaml = r#"
name: contacts
primary_key: id
columns:
  - name: id
    type: integer
  - name: name
    type: text
    not_null: true
  - name: note
searchable: [name, note]
"#;
        let schema: TableSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.kind, TableKind::Static);
        assert_eq!(schema.columns.len(), 3);
        assert!(schema.columns[1].not_null);
        assert_eq!(schema.columns[2].column_type, ColumnType::Text);
        assert_eq!(schema.searchable, vec!["name", "note"]);
    }
}
