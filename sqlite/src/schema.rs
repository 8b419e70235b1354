//! SQL generation for user tables, the store catalog and full-text indexes.
//!
//! Every store keeps three kinds of objects:
//!
//! - user tables, created from [`TableSchema`]s;
//! - the catalog `_rs_tables`, one row per table the store manages;
//! - per-table external-content FTS5 indexes `_rs_fts_<table>` kept in sync
//!   by three triggers (`_ai`, `_ad`, `_au`).
//!
//! All identifiers are validated before they get here and are double-quoted
//! in generated SQL.

use recordstore_core::{ColumnDef, RESERVED_PREFIX, TableSchema};
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Name of the store catalog table.
pub const META_TABLE: &str = "_rs_tables";

/// Default expression of a dynamic table's synthetic key: 32 hex digits.
const SYNTHETIC_KEY_DEFAULT: &str = "(lower(hex(randomblob(16))))";

/// Creates the catalog if it does not exist.
pub(crate) const META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _rs_tables (
    name TEXT PRIMARY KEY NOT NULL COLLATE NOCASE,
    kind TEXT NOT NULL,
    primary_key TEXT NOT NULL,
    search_columns TEXT NOT NULL DEFAULT '[]'
);
"#;

/// Double-quotes an identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-separated quoted column list.
pub(crate) fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name of a table's full-text index.
pub(crate) fn fts_table(table: &str) -> String {
    format!("{RESERVED_PREFIX}fts_{table}")
}

fn column_sql(schema: &TableSchema, column: &ColumnDef) -> String {
    let name = quote_ident(&column.name);
    if schema.is_dynamic() {
        if column.name.eq_ignore_ascii_case(&schema.primary_key) {
            return format!("{name} BLOB PRIMARY KEY NOT NULL DEFAULT {SYNTHETIC_KEY_DEFAULT}");
        }
        return format!("{name} BLOB");
    }

    let mut sql = format!("{name} {}", column.column_type.sql_name());
    if column.name.eq_ignore_ascii_case(&schema.primary_key) {
        sql.push_str(" PRIMARY KEY");
        // An INTEGER PRIMARY KEY aliases the rowid and is filled in by the
        // engine when omitted.
        if !schema.has_rowid_key() {
            sql.push_str(" NOT NULL");
        }
    } else if column.not_null {
        sql.push_str(" NOT NULL");
    }
    sql
}

/// `CREATE TABLE` for a schema.
pub(crate) fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|column| column_sql(schema, column))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(&schema.name),
        columns.join(", ")
    )
}

/// `ALTER TABLE … ADD COLUMN` for one column.
///
/// `NOT NULL` is dropped: SQLite cannot add a NOT NULL column without a
/// default, and existing rows have no value for it.
pub(crate) fn add_column_sql(schema: &TableSchema, column: &ColumnDef) -> String {
    let declared = if schema.is_dynamic() {
        "BLOB"
    } else {
        column.column_type.sql_name()
    };
    format!(
        "ALTER TABLE {} ADD COLUMN {} {declared}",
        quote_ident(&schema.name),
        quote_ident(&column.name)
    )
}

/// Drops a table's full-text index and its triggers.
pub(crate) fn drop_fts_sql(table: &str) -> String {
    let fts = fts_table(table);
    format!(
        "DROP TRIGGER IF EXISTS {ai};\n\
         DROP TRIGGER IF EXISTS {ad};\n\
         DROP TRIGGER IF EXISTS {au};\n\
         DROP TABLE IF EXISTS {fts_q};\n",
        ai = quote_ident(&format!("{fts}_ai")),
        ad = quote_ident(&format!("{fts}_ad")),
        au = quote_ident(&format!("{fts}_au")),
        fts_q = quote_ident(&fts),
    )
}

/// Creates an external-content FTS5 index over `columns`, its sync
/// triggers, and fills it from the existing rows.
pub(crate) fn create_fts_sql(table: &str, columns: &[String]) -> String {
    let fts = fts_table(table);
    let fts_q = quote_ident(&fts);
    let table_q = quote_ident(table);
    let cols = column_list(columns.iter().map(String::as_str));
    let new_vals = columns
        .iter()
        .map(|c| format!("new.{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let old_vals = columns
        .iter()
        .map(|c| format!("old.{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let content = table.replace('\'', "''");

    format!(
        r#"
CREATE VIRTUAL TABLE {fts_q} USING fts5({cols}, content='{content}', content_rowid='rowid');
CREATE TRIGGER {ai} AFTER INSERT ON {table_q} BEGIN
    INSERT INTO {fts_q}(rowid, {cols}) VALUES (new.rowid, {new_vals});
END;
CREATE TRIGGER {ad} AFTER DELETE ON {table_q} BEGIN
    INSERT INTO {fts_q}({fts_q}, rowid, {cols}) VALUES ('delete', old.rowid, {old_vals});
END;
CREATE TRIGGER {au} AFTER UPDATE ON {table_q} BEGIN
    INSERT INTO {fts_q}({fts_q}, rowid, {cols}) VALUES ('delete', old.rowid, {old_vals});
    INSERT INTO {fts_q}(rowid, {cols}) VALUES (new.rowid, {new_vals});
END;
INSERT INTO {fts_q}({fts_q}) VALUES ('rebuild');
"#,
        ai = quote_ident(&format!("{fts}_ai")),
        ad = quote_ident(&format!("{fts}_ad")),
        au = quote_ident(&format!("{fts}_au")),
    )
}

/// A column as the engine reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PhysicalColumn {
    pub name: String,
    pub declared_type: String,
    pub primary_key: bool,
}

/// Lists a table's columns in definition order; empty if the table does not
/// exist.
pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<PhysicalColumn>> {
    let mut stmt =
        conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map([table], |row| {
        Ok(PhysicalColumn {
            name: row.get(0)?,
            declared_type: row.get(1)?,
            primary_key: row.get::<_, i64>(2)? > 0,
        })
    })?;
    let columns = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Returns `true` if a table or virtual table named `name` exists. Names
/// compare case-insensitively, as SQLite resolves them.
pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
