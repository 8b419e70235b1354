use serde::{Deserialize, Serialize};

use crate::TableSchema;

/// Serializable group of static table declarations.
///
/// A bundle is the on-disk unit a store is seeded from: every table a
/// partition starts with, plus version metadata so deployments can tell
/// definition sets apart.
///
/// # Examples
///
/// ```
/// use recordstore_core::*;
///
/// let mut bundle = DefinitionBundle::new("user", "1.0.0");
/// bundle.tables.push(
///     TableSchema::new("contacts", "id")
///         .with_column("id", ColumnType::Integer)
///         .with_column("name", ColumnType::Text),
/// );
///
/// assert_eq!(bundle.table_count(), 1);
/// assert!(bundle.table("contacts").is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionBundle {
    /// Bundle name, usually the partition it seeds.
    pub name: String,
    /// Definition set version.
    pub version: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Table declarations.
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl DefinitionBundle {
    /// Creates an empty bundle.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            tables: Vec::new(),
        }
    }

    /// Returns the number of tables in this bundle.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Looks up a table declaration by name.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name.eq_ignore_ascii_case(name))
    }
}
