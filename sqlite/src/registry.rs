//! Schema registry: the store's in-memory view of every table it manages.
//!
//! The registry is seeded when a store opens, from the partition's static
//! definitions and the persisted catalog (`_rs_tables`), and is only ever
//! touched from the store's worker thread.
//!
//! Dynamic tables grow through [`SchemaRegistry::ensure_columns`]. The DDL
//! runs inside the caller's transaction and the resulting schema is staged
//! in [`StagedSchemas`]; the registry itself changes only when the
//! transaction has committed ([`SchemaRegistry::apply`]). A rolled-back
//! write therefore leaves the registry exactly as it was.
//!
//! SQLite resolves table and column names case-insensitively, so the
//! registry does too: tables are keyed by their ASCII-lowercased name and a
//! field differing from a known column only in case maps to that column.

use std::collections::{HashMap, HashSet};

use recordstore_core::{
    ColumnDef, ColumnType, TableKind, TableSchema, ValidationError, validate_column_name,
    validate_table_name,
};
use recordstore_db::TableDefinitions;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::schema::{
    META_TABLE_SQL, PhysicalColumn, add_column_sql, create_fts_sql, create_table_sql,
    drop_fts_sql, fts_table, table_columns, table_exists,
};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogEntry {
    kind: TableKind,
    primary_key: String,
    search_columns: Vec<String>,
}

/// Registry key for a table name.
fn table_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn read_catalog_entry(conn: &Connection, table: &str) -> Result<Option<CatalogEntry>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT kind, primary_key, search_columns FROM _rs_tables \
             WHERE name = ?1 COLLATE NOCASE",
            [table],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    row.map(|(kind, primary_key, search_columns)| {
        parse_catalog_entry(table, &kind, primary_key, &search_columns)
    })
    .transpose()
}

fn parse_catalog_entry(
    table: &str,
    kind: &str,
    primary_key: String,
    search_columns: &str,
) -> Result<CatalogEntry> {
    let kind = TableKind::parse(kind).ok_or_else(|| StoreError::Metadata {
        table: table.to_string(),
        message: format!("unknown table kind '{kind}'"),
    })?;
    let search_columns: Vec<String> =
        serde_json::from_str(search_columns).map_err(|err| StoreError::Metadata {
            table: table.to_string(),
            message: format!("unreadable search columns: {err}"),
        })?;
    Ok(CatalogEntry {
        kind,
        primary_key,
        search_columns,
    })
}

fn write_catalog_entry(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let search_columns =
        serde_json::to_string(&schema.searchable).map_err(|err| StoreError::Metadata {
            table: schema.name.clone(),
            message: err.to_string(),
        })?;
    conn.execute(
        "INSERT INTO _rs_tables (name, kind, primary_key, search_columns) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(name) DO UPDATE SET kind = excluded.kind, \
         primary_key = excluded.primary_key, search_columns = excluded.search_columns",
        params![
            schema.name,
            schema.kind.as_str(),
            schema.primary_key,
            search_columns
        ],
    )?;
    Ok(())
}

/// Parses a declared column type back into a [`ColumnType`].
fn column_type_from_declared(declared: &str) -> ColumnType {
    match declared.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" => ColumnType::Integer,
        "REAL" | "FLOAT" | "DOUBLE" => ColumnType::Real,
        "BLOB" | "" => ColumnType::Blob,
        "NUMERIC" => ColumnType::Numeric,
        _ => ColumnType::Text,
    }
}

/// Brings the physical table, its full-text index and its catalog row in
/// line with `desired`, growing the table where needed.
///
/// Returns the schema the registry should hold afterwards. For dynamic
/// tables this includes physical columns `desired` did not list (an adopted
/// table keeps everything it already has); for static tables it is the
/// declaration with its search columns.
fn materialize(
    conn: &Connection,
    desired: &TableSchema,
    previous_search: Option<&[String]>,
) -> Result<TableSchema> {
    let table = desired.name.as_str();
    let physical = table_columns(conn, table)?;
    let mut result = desired.clone();

    if physical.is_empty() {
        conn.execute_batch(&create_table_sql(desired))
            .map_err(|err| StoreError::conflict(table, err))?;
        debug!(table, columns = desired.columns.len(), "Created table");
    } else {
        check_primary_key(table, &desired.primary_key, &physical)?;

        let missing: Vec<&ColumnDef> = desired
            .columns
            .iter()
            .filter(|column| !physical.iter().any(|p| p.name.eq_ignore_ascii_case(&column.name)))
            .collect();
        for column in &missing {
            conn.execute_batch(&add_column_sql(desired, column))
                .map_err(|err| StoreError::conflict(table, err))?;
            debug!(table, column = %column.name, "Added column");
        }

        if desired.is_dynamic() {
            let mut columns: Vec<ColumnDef> = physical
                .iter()
                .map(|p| ColumnDef::new(p.name.clone(), column_type_from_declared(&p.declared_type)))
                .collect();
            columns.extend(missing.into_iter().cloned());
            result.columns = columns;
        }
    }

    if result.is_dynamic() {
        result.searchable = result.dynamic_search_columns();
    }

    let index_exists = table_exists(conn, &fts_table(table))?;
    let unchanged = previous_search == Some(result.searchable.as_slice())
        && index_exists == result.is_searchable();
    if !unchanged {
        let mut sql = drop_fts_sql(table);
        if result.is_searchable() {
            sql.push_str(&create_fts_sql(table, &result.searchable));
        }
        conn.execute_batch(&sql)
            .map_err(|err| StoreError::conflict(table, err))?;
        if result.is_searchable() {
            debug!(table, columns = ?result.searchable, "Rebuilt full-text index");
        }
    }

    write_catalog_entry(conn, &result)?;
    Ok(result)
}

fn check_primary_key(table: &str, primary_key: &str, physical: &[PhysicalColumn]) -> Result<()> {
    let keys: Vec<&str> = physical
        .iter()
        .filter(|column| column.primary_key)
        .map(|column| column.name.as_str())
        .collect();
    if !matches!(keys.as_slice(), [key] if key.eq_ignore_ascii_case(primary_key)) {
        return Err(StoreError::conflict(
            table,
            format!("existing primary key {keys:?} does not match '{primary_key}'"),
        ));
    }
    Ok(())
}

/// Schemas produced by DDL inside an open transaction, waiting for commit.
#[derive(Debug, Default)]
pub(crate) struct StagedSchemas {
    tables: HashMap<String, TableSchema>,
}

impl StagedSchemas {
    pub(crate) fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// In-memory mapping from table name to schema.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
    /// Tables known to exist physically. Only positive results are cached.
    existing: HashSet<String>,
}

impl SchemaRegistry {
    /// Seeds the registry for a freshly opened connection.
    ///
    /// Creates the catalog, synchronizes every declared table (creating it,
    /// adding declared columns, rebuilding its full-text index when the
    /// searchable columns changed) and loads dynamic tables recorded by
    /// earlier runs. Runs in one transaction.
    pub(crate) fn load(conn: &mut Connection, definitions: &TableDefinitions) -> Result<Self> {
        let tx = conn.transaction()?;
        tx.execute_batch(META_TABLE_SQL)?;

        let mut registry = SchemaRegistry::default();
        for declared in definitions.tables() {
            let previous = read_catalog_entry(&tx, &declared.name)?;
            if let Some(entry) = &previous {
                if entry.kind != declared.kind {
                    return Err(StoreError::conflict(
                        &declared.name,
                        format!(
                            "declared {} but recorded as {}",
                            declared.kind.as_str(),
                            entry.kind.as_str()
                        ),
                    ));
                }
            }
            let mut desired = declared.clone();
            if desired.is_dynamic() {
                desired = dynamic_declaration(declared);
            }
            let schema = materialize(
                &tx,
                &desired,
                previous.as_ref().map(|entry| entry.search_columns.as_slice()),
            )?;
            registry.existing.insert(table_key(&schema.name));
            registry.tables.insert(table_key(&schema.name), schema);
        }

        let recorded: Vec<(String, String, String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT name, kind, primary_key, search_columns FROM _rs_tables ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        for (name, kind, primary_key, search_columns) in recorded {
            if registry.tables.contains_key(&table_key(&name)) {
                continue;
            }
            let entry = parse_catalog_entry(&name, &kind, primary_key, &search_columns)?;
            if entry.kind != TableKind::Dynamic {
                debug!(table = %name, "Skipping static table without a definition");
                continue;
            }
            let schema = registry.load_dynamic(&tx, &name, entry)?;
            registry.tables.insert(table_key(&name), schema);
        }

        tx.commit()?;
        Ok(registry)
    }

    fn load_dynamic(&mut self, conn: &Connection, name: &str, entry: CatalogEntry) -> Result<TableSchema> {
        let physical = table_columns(conn, name)?;
        let mut schema = TableSchema::dynamic(name, entry.primary_key);
        if !physical.is_empty() {
            schema.columns = physical
                .iter()
                .map(|p| ColumnDef::new(p.name.clone(), ColumnType::Blob))
                .collect();
            self.existing.insert(table_key(name));
        }
        schema.searchable = entry.search_columns;
        Ok(schema)
    }

    /// Looks up a committed schema, ignoring ASCII case in `table`.
    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(&table_key(table))
    }

    /// All committed schemas, sorted by table name.
    pub fn tables(&self) -> Vec<&TableSchema> {
        let mut tables: Vec<&TableSchema> = self.tables.values().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    /// Returns `true` if `table` exists in the database. Positive answers are
    /// memoized.
    pub(crate) fn has_table(&mut self, conn: &Connection, table: &str) -> Result<bool> {
        let key = table_key(table);
        if self.existing.contains(&key) {
            return Ok(true);
        }
        let exists = table_exists(conn, table)?;
        if exists {
            self.existing.insert(key);
        }
        Ok(exists)
    }

    /// Like [`has_table`](Self::has_table), but also counting tables created
    /// by the current transaction.
    pub(crate) fn has_table_staged(
        &mut self,
        conn: &Connection,
        staged: &StagedSchemas,
        table: &str,
    ) -> Result<bool> {
        if staged.tables.contains_key(&table_key(table)) {
            return Ok(true);
        }
        self.has_table(conn, table)
    }

    /// Schema as seen by the current transaction.
    pub(crate) fn resolve(&self, staged: &StagedSchemas, table: &str) -> Result<TableSchema> {
        let key = table_key(table);
        staged
            .tables
            .get(&key)
            .or_else(|| self.tables.get(&key))
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    /// Registers `table` as dynamic with primary key `primary_key`.
    ///
    /// Idempotent for an already dynamic table with the same key. A table
    /// that exists physically but is not registered is adopted: its columns
    /// are read back and a full-text index is built over them. Names that
    /// differ from a registered table only in case refer to that table.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotDynamic`] for a static table,
    /// [`StoreError::SchemaConflict`] for a different primary key, and
    /// [`StoreError::Validation`] for invalid names.
    pub(crate) fn declare_dynamic(
        &mut self,
        conn: &mut Connection,
        table: &str,
        primary_key: &str,
    ) -> Result<TableSchema> {
        validate_table_name(table)?;
        validate_column_name(primary_key)?;

        if let Some(schema) = self.get(table) {
            if !schema.is_dynamic() {
                return Err(StoreError::NotDynamic(schema.name.clone()));
            }
            if !schema.primary_key.eq_ignore_ascii_case(primary_key) {
                return Err(StoreError::conflict(
                    table,
                    format!(
                        "primary key is '{}', not '{primary_key}'",
                        schema.primary_key
                    ),
                ));
            }
            return Ok(schema.clone());
        }

        if let Some(entry) = read_catalog_entry(conn, table)? {
            if entry.kind == TableKind::Static {
                return Err(StoreError::NotDynamic(table.to_string()));
            }
        }

        let declared = TableSchema::dynamic(table, primary_key);
        if !self.has_table(conn, table)? {
            self.tables.insert(table_key(table), declared.clone());
            return Ok(declared);
        }

        let tx = conn.transaction()?;
        let schema = materialize(&tx, &declared, None)?;
        tx.commit()?;
        info!(table, columns = schema.columns.len(), "Adopted existing table as dynamic");
        self.tables.insert(table_key(table), schema.clone());
        Ok(schema)
    }

    /// Makes sure a dynamic table has a column for every name in `fields`,
    /// creating the table on first use.
    ///
    /// Static tables are returned unchanged. New columns are validated, added
    /// with one `ALTER TABLE` each, and the full-text index is rebuilt over
    /// all non-key columns. The new schema is staged, not applied.
    ///
    /// A field matching a known column up to case is not new. Two new fields
    /// differing only in case fail with
    /// [`ValidationError::ConflictingFields`] before any DDL runs.
    pub(crate) fn ensure_columns<'f>(
        &mut self,
        conn: &Connection,
        staged: &mut StagedSchemas,
        table: &str,
        fields: impl IntoIterator<Item = &'f str>,
    ) -> Result<TableSchema> {
        let current = self.resolve(staged, table)?;
        if !current.is_dynamic() {
            return Ok(current);
        }

        let mut missing: Vec<&str> = Vec::new();
        for field in fields {
            if current.has_column(field) {
                continue;
            }
            if let Some(first) = missing.iter().find(|m| m.eq_ignore_ascii_case(field)) {
                if *first == field {
                    continue;
                }
                return Err(ValidationError::ConflictingFields {
                    first: (*first).to_string(),
                    second: field.to_string(),
                }
                .into());
            }
            validate_column_name(field)?;
            missing.push(field);
        }

        let exists = self.has_table_staged(conn, staged, table)?;
        if missing.is_empty() && exists {
            return Ok(current);
        }

        let mut desired = current.clone();
        for field in &missing {
            desired.columns.push(ColumnDef::new(*field, ColumnType::Blob));
        }
        let previous = exists.then_some(current.searchable.as_slice());
        let schema = materialize(conn, &desired, previous)?;
        staged.tables.insert(table_key(table), schema.clone());
        Ok(schema)
    }

    /// Applies schemas staged by a committed transaction.
    pub(crate) fn apply(&mut self, staged: StagedSchemas) {
        for (name, schema) in staged.tables {
            self.existing.insert(name.clone());
            self.tables.insert(name, schema);
        }
    }
}

/// A dynamic declaration from a definition file: declared columns become
/// `BLOB` and the key column is always present.
fn dynamic_declaration(declared: &TableSchema) -> TableSchema {
    let mut schema = TableSchema::dynamic(declared.name.clone(), declared.primary_key.clone());
    for column in &declared.columns {
        if !schema.has_column(&column.name) {
            schema.columns.push(ColumnDef::new(column.name.clone(), ColumnType::Blob));
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstore_core::DYNAMIC_PRIMARY_KEY;

    fn notes() -> TableSchema {
        TableSchema::new("notes", "id")
            .with_column("id", ColumnType::Integer)
            .with_column("title", ColumnType::Text)
            .searchable(["title"])
    }

    fn open(definitions: &TableDefinitions) -> (Connection, SchemaRegistry) {
        let mut conn = Connection::open_in_memory().unwrap();
        let registry = SchemaRegistry::load(&mut conn, definitions).unwrap();
        (conn, registry)
    }

    #[test]
    fn test_load_creates_static_tables() {
        let defs = TableDefinitions::from_tables([notes()]).unwrap();
        let (conn, mut registry) = open(&defs);

        assert!(registry.has_table(&conn, "notes").unwrap());
        assert!(table_exists(&conn, "_rs_fts_notes").unwrap());
        let entry = read_catalog_entry(&conn, "notes").unwrap().unwrap();
        assert_eq!(entry.kind, TableKind::Static);
        assert_eq!(entry.search_columns, vec!["title"]);
    }

    #[test]
    fn test_load_grows_static_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        let defs = TableDefinitions::from_tables([notes()]).unwrap();
        SchemaRegistry::load(&mut conn, &defs).unwrap();

        let grown = notes()
            .with_column("body", ColumnType::Text)
            .searchable(["title", "body"]);
        let defs = TableDefinitions::from_tables([grown]).unwrap();
        let registry = SchemaRegistry::load(&mut conn, &defs).unwrap();

        let names: Vec<String> = table_columns(&conn, "notes")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["id", "title", "body"]);
        assert_eq!(registry.get("notes").unwrap().searchable, vec!["title", "body"]);
    }

    #[test]
    fn test_ensure_columns_is_staged() {
        let (mut conn, mut registry) = open(&TableDefinitions::empty());
        registry
            .declare_dynamic(&mut conn, "events", DYNAMIC_PRIMARY_KEY)
            .unwrap();
        assert!(!registry.has_table(&conn, "events").unwrap());

        let tx = conn.transaction().unwrap();
        let mut staged = StagedSchemas::default();
        let schema = registry
            .ensure_columns(&tx, &mut staged, "events", ["kind", "payload"])
            .unwrap();
        assert_eq!(schema.searchable, vec!["kind", "payload"]);
        // Not visible until applied.
        assert_eq!(registry.get("events").unwrap().columns.len(), 1);
        drop(tx);

        assert!(!registry.has_table(&conn, "events").unwrap());
        assert_eq!(registry.get("events").unwrap().columns.len(), 1);
    }

    #[test]
    fn test_ensure_columns_applies_after_commit() {
        let (mut conn, mut registry) = open(&TableDefinitions::empty());
        registry
            .declare_dynamic(&mut conn, "events", DYNAMIC_PRIMARY_KEY)
            .unwrap();

        let tx = conn.transaction().unwrap();
        let mut staged = StagedSchemas::default();
        registry
            .ensure_columns(&tx, &mut staged, "events", ["kind"])
            .unwrap();
        tx.commit().unwrap();
        registry.apply(staged);

        let schema = registry.get("events").unwrap();
        assert!(schema.has_column("kind"));

        // Known columns need no DDL.
        let mut staged = StagedSchemas::default();
        registry
            .ensure_columns(&conn, &mut staged, "events", ["kind", DYNAMIC_PRIMARY_KEY])
            .unwrap();
        assert!(staged.is_empty());
    }

    #[test]
    fn test_ensure_columns_folds_case() {
        let (mut conn, mut registry) = open(&TableDefinitions::empty());
        registry
            .declare_dynamic(&mut conn, "events", DYNAMIC_PRIMARY_KEY)
            .unwrap();
        let tx = conn.transaction().unwrap();
        let mut staged = StagedSchemas::default();
        registry
            .ensure_columns(&tx, &mut staged, "events", ["kind"])
            .unwrap();
        tx.commit().unwrap();
        registry.apply(staged);

        let mut staged = StagedSchemas::default();
        let schema = registry
            .ensure_columns(&conn, &mut staged, "EVENTS", ["Kind", "_ID"])
            .unwrap();
        assert!(staged.is_empty());
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["_id", "kind"]);

        let err = registry
            .ensure_columns(&conn, &mut staged, "events", ["TAG", "tag"])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ConflictingFields { .. })
        ));
        assert!(staged.is_empty());
        assert_eq!(table_columns(&conn, "events").unwrap().len(), 2);
    }

    #[test]
    fn test_ensure_columns_rejects_reserved_fields() {
        let (mut conn, mut registry) = open(&TableDefinitions::empty());
        registry
            .declare_dynamic(&mut conn, "events", DYNAMIC_PRIMARY_KEY)
            .unwrap();
        let mut staged = StagedSchemas::default();
        let err = registry
            .ensure_columns(&conn, &mut staged, "events", ["ROWID"])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_declare_dynamic_rules() {
        let defs = TableDefinitions::from_tables([notes()]).unwrap();
        let (mut conn, mut registry) = open(&defs);

        assert!(matches!(
            registry.declare_dynamic(&mut conn, "notes", "id"),
            Err(StoreError::NotDynamic(_))
        ));

        registry.declare_dynamic(&mut conn, "events", "_id").unwrap();
        registry.declare_dynamic(&mut conn, "events", "_id").unwrap();
        assert!(matches!(
            registry.declare_dynamic(&mut conn, "events", "key"),
            Err(StoreError::SchemaConflict { .. })
        ));
        assert!(registry.declare_dynamic(&mut conn, "_rs_tables", "_id").is_err());
    }

    #[test]
    fn test_declare_dynamic_matches_static_table_in_any_case() {
        let defs = TableDefinitions::from_tables([notes()]).unwrap();
        let (mut conn, mut registry) = open(&defs);

        assert!(matches!(
            registry.declare_dynamic(&mut conn, "Notes", "id"),
            Err(StoreError::NotDynamic(name)) if name == "notes"
        ));
        assert_eq!(registry.get("NOTES").unwrap().kind, TableKind::Static);

        registry.declare_dynamic(&mut conn, "events", "_id").unwrap();
        let again = registry.declare_dynamic(&mut conn, "Events", "_ID").unwrap();
        assert_eq!(again.name, "events");
        assert_eq!(registry.tables().len(), 2);
    }

    #[test]
    fn test_declare_dynamic_adopts_existing_table() {
        let (mut conn, mut registry) = open(&TableDefinitions::empty());
        conn.execute_batch(
            "CREATE TABLE legacy (uid TEXT PRIMARY KEY, label TEXT);
             INSERT INTO legacy VALUES ('a', 'first');",
        )
        .unwrap();

        assert!(matches!(
            registry.declare_dynamic(&mut conn, "legacy", "_id"),
            Err(StoreError::SchemaConflict { .. })
        ));
        let schema = registry.declare_dynamic(&mut conn, "legacy", "uid").unwrap();
        assert!(schema.has_column("label"));
        assert_eq!(schema.searchable, vec!["label"]);
        assert_eq!(
            read_catalog_entry(&conn, "legacy").unwrap().unwrap().kind,
            TableKind::Dynamic
        );
    }

    #[test]
    fn test_reload_keeps_dynamic_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let mut conn = Connection::open(&path).unwrap();
            let mut registry = SchemaRegistry::load(&mut conn, &TableDefinitions::empty()).unwrap();
            registry.declare_dynamic(&mut conn, "events", "_id").unwrap();
            let tx = conn.transaction().unwrap();
            let mut staged = StagedSchemas::default();
            registry
                .ensure_columns(&tx, &mut staged, "events", ["kind"])
                .unwrap();
            tx.commit().unwrap();
        }

        let mut conn = Connection::open(&path).unwrap();
        let registry = SchemaRegistry::load(&mut conn, &TableDefinitions::empty()).unwrap();
        let schema = registry.get("events").unwrap();
        assert!(schema.is_dynamic());
        assert!(schema.has_column("kind"));
        assert_eq!(schema.searchable, vec!["kind"]);
    }

    #[test]
    fn test_kind_mismatch_is_conflict() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut registry = SchemaRegistry::load(&mut conn, &TableDefinitions::empty()).unwrap();
        registry.declare_dynamic(&mut conn, "notes", "id").unwrap();
        let tx = conn.transaction().unwrap();
        let mut staged = StagedSchemas::default();
        registry.ensure_columns(&tx, &mut staged, "notes", ["title"]).unwrap();
        tx.commit().unwrap();

        let defs = TableDefinitions::from_tables([notes()]).unwrap();
        assert!(matches!(
            SchemaRegistry::load(&mut conn, &defs),
            Err(StoreError::SchemaConflict { .. })
        ));
    }
}
