//! Identifier, table and bundle validation.
//!
//! Every name that ends up inside SQL text (tables, columns, condition
//! fields) goes through [`validate_identifier`] first. Values are always
//! bound as parameters, so identifiers are the only caller-supplied text the
//! store ever splices into a statement.
//!
//! # Examples
//!
//! ```
//! use recordstore_core::*;
//!
//! assert!(validate_identifier("user_name").is_ok());
//! assert!(validate_identifier("drop table;--").is_err());
//!
//! // Column names additionally may not shadow the rowid.
//! assert!(validate_column_name("rowid").is_err());
//!
//! let table = TableSchema::new("notes", "id").with_column("id", ColumnType::Integer);
//! assert!(validate_table(&table).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{DefinitionBundle, RESERVED_PREFIX, TableSchema};

/// Maximum identifier length accepted for tables and columns.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Names SQLite resolves to the implicit rowid of an ordinary table.
const ROWID_ALIASES: [&str; 3] = ["rowid", "oid", "_rowid_"];

/// Validation failures, raised before any statement reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Name is empty, too long, or contains characters outside
    /// `[A-Za-z0-9_]` (or starts with a digit).
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),
    /// Name collides with a rowid alias or the store's reserved prefix.
    #[error("reserved name: '{0}'")]
    ReservedName(String),
    /// Bundle version string is empty.
    #[error("bundle version cannot be empty")]
    EmptyBundleVersion,
    /// Two tables in one bundle share a name.
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    /// Two columns in one table share a name.
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// The primary key is not one of the declared columns.
    #[error("primary key '{primary_key}' is not a column of table '{table}'")]
    MissingPrimaryKey {
        /// Table name.
        table: String,
        /// Primary-key column name.
        primary_key: String,
    },
    /// A searchable column is not declared.
    #[error("searchable column '{column}' is not a column of table '{table}'")]
    UnknownSearchColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// An id-based operation received a `NULL` or blank key.
    #[error("primary key '{0}' must not be empty")]
    EmptyPrimaryKey(String),
    /// Two fields of one record differ only in case and so name the same
    /// column.
    #[error("fields '{first}' and '{second}' name the same column")]
    ConflictingFields {
        /// Field seen first.
        first: String,
        /// Field that collides with it.
        second: String,
    },
    /// Page numbers start at 1.
    #[error("page number must be at least 1")]
    InvalidPage,
}

/// Checks that `name` is a plain SQL identifier: ASCII letters, digits and
/// underscores, not starting with a digit, at most
/// [`MAX_IDENTIFIER_LEN`] characters.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start
        || name.len() > MAX_IDENTIFIER_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ValidationError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validates a name used for a user table.
pub fn validate_table_name(name: &str) -> Result<(), ValidationError> {
    validate_identifier(name)?;
    if is_reserved_prefix(name) || name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(ValidationError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Validates a name used for a writable column.
///
/// Rejects the rowid aliases (`rowid`, `oid`, `_rowid_`, any case) and the
/// reserved `_rs_` prefix on top of the identifier rules.
pub fn validate_column_name(name: &str) -> Result<(), ValidationError> {
    validate_identifier(name)?;
    let lowered = name.to_ascii_lowercase();
    if ROWID_ALIASES.contains(&lowered.as_str()) || is_reserved_prefix(name) {
        return Err(ValidationError::ReservedName(name.to_string()));
    }
    Ok(())
}

fn is_reserved_prefix(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with(RESERVED_PREFIX)
}

/// Validates a definition bundle.
///
/// Checks for an empty version, duplicate table names, and validates each
/// table. Stops at the first failing table.
///
/// # Examples
///
/// ```
/// use recordstore_core::*;
///
/// let mut bundle = DefinitionBundle::new("user", "1");
/// bundle.tables.push(TableSchema::new("t", "id").with_column("id", ColumnType::Integer));
/// assert!(validate_bundle(&bundle).is_empty());
///
/// bundle.tables.push(TableSchema::new("t", "id").with_column("id", ColumnType::Integer));
/// let errors = validate_bundle(&bundle);
/// assert_eq!(errors, vec![ValidationError::DuplicateTable("t".into())]);
/// ```
pub fn validate_bundle(bundle: &DefinitionBundle) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if bundle.version.trim().is_empty() {
        errors.push(ValidationError::EmptyBundleVersion);
        return errors;
    }

    let mut seen: HashSet<String> = HashSet::new();
    for table in &bundle.tables {
        if !seen.insert(table.name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateTable(table.name.clone()));
            return errors;
        }
        errors.extend(validate_table(table));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

/// Validates a single table declaration.
///
/// Checks the table and column names, duplicate columns, that the primary
/// key is declared, and that searchable columns exist.
pub fn validate_table(table: &TableSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(err) = validate_table_name(&table.name) {
        errors.push(err);
        return errors;
    }

    let mut seen: HashSet<String> = HashSet::new();
    for column in &table.columns {
        if let Err(err) = validate_column_name(&column.name) {
            errors.push(err);
            return errors;
        }
        if !seen.insert(column.name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateColumn {
                table: table.name.clone(),
                column: column.name.clone(),
            });
            return errors;
        }
    }

    if !seen.contains(&table.primary_key.to_ascii_lowercase()) {
        errors.push(ValidationError::MissingPrimaryKey {
            table: table.name.clone(),
            primary_key: table.primary_key.clone(),
        });
        return errors;
    }

    for column in &table.searchable {
        if !seen.contains(&column.to_ascii_lowercase()) {
            errors.push(ValidationError::UnknownSearchColumn {
                table: table.name.clone(),
                column: column.clone(),
            });
            return errors;
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use crate::{ColumnType, TableSchema};

    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("a").is_ok());
        assert!(validate_identifier("_hidden").is_ok());
        assert!(validate_identifier("Col_9").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("9lives").is_err());
        assert!(validate_identifier("with space").is_err());
        assert!(validate_identifier("quote\"d").is_err());
        assert!(validate_identifier("ünicode").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn test_column_name_rejects_rowid_aliases() {
        for name in ["rowid", "ROWID", "oid", "_rowid_"] {
            assert_eq!(
                validate_column_name(name),
                Err(ValidationError::ReservedName(name.to_string()))
            );
        }
        assert!(validate_column_name("_rs_internal").is_err());
        assert!(validate_column_name("row_id").is_ok());
    }

    #[test]
    fn test_table_name_rejects_reserved() {
        assert!(validate_table_name("_rs_tables").is_err());
        assert!(validate_table_name("sqlite_master").is_err());
        assert!(validate_table_name("contacts").is_ok());
    }

    #[test]
    fn test_validate_table_missing_primary_key() {
        let table = TableSchema::new("t", "id").with_column("name", ColumnType::Text);
        assert_eq!(
            validate_table(&table),
            vec![ValidationError::MissingPrimaryKey {
                table: "t".into(),
                primary_key: "id".into()
            }]
        );
    }

    #[test]
    fn test_validate_table_duplicate_column() {
        let table = TableSchema::new("t", "id")
            .with_column("id", ColumnType::Integer)
            .with_column("id", ColumnType::Text);
        assert_eq!(
            validate_table(&table),
            vec![ValidationError::DuplicateColumn {
                table: "t".into(),
                column: "id".into()
            }]
        );
    }

    #[test]
    fn test_validate_table_duplicate_column_differing_in_case() {
        let table = TableSchema::new("t", "id")
            .with_column("id", ColumnType::Integer)
            .with_column("Name", ColumnType::Text)
            .with_column("NAME", ColumnType::Text);
        assert_eq!(
            validate_table(&table),
            vec![ValidationError::DuplicateColumn {
                table: "t".into(),
                column: "NAME".into()
            }]
        );
    }

    #[test]
    fn test_validate_table_unknown_search_column() {
        let table = TableSchema::new("t", "id")
            .with_column("id", ColumnType::Integer)
            .searchable(["body"]);
        assert_eq!(
            validate_table(&table),
            vec![ValidationError::UnknownSearchColumn {
                table: "t".into(),
                column: "body".into()
            }]
        );
    }

    #[test]
    fn test_validate_bundle_rejects_empty_version() {
        let bundle = DefinitionBundle::new("user", " ");
        assert_eq!(
            validate_bundle(&bundle),
            vec![ValidationError::EmptyBundleVersion]
        );
    }
}
