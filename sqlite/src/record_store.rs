//! CRUD and search on one table of a [`Store`].
//!
//! A [`RecordStore`] is a table name plus a shared store. Every call becomes
//! one job on the store's worker; calls that write run in one transaction,
//! so a batch either applies completely or not at all, together with any
//! columns a dynamic table grew along the way.

use std::collections::HashMap;
use std::sync::Arc;

use recordstore_core::{
    Condition, HighlightMarker, Record, SqlFragment, TableSchema, ValidationError, Value,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params_from_iter};

use crate::convert::{bind, from_sql, query_records, to_sql};
use crate::error::{Result, StoreError};
use crate::registry::{SchemaRegistry, StagedSchemas};
use crate::schema::{column_list, quote_ident};
use crate::search::{self, SearchHit};
use crate::store::{Store, StoreState};

/// Handle on one table. Cheap to clone; clones share the store.
#[derive(Debug, Clone)]
pub struct RecordStore {
    store: Arc<Store>,
    table: String,
}

impl RecordStore {
    pub(crate) fn new(store: Arc<Store>, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
        }
    }

    /// Table this handle operates on.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Store this handle belongs to.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Current schema of the table, including columns added by writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`](crate::StoreError::Closed) on a closed
    /// store.
    pub fn schema(&self) -> Result<TableSchema> {
        self.store.schema(&self.table)
    }

    fn write<T: Send + 'static>(
        &self,
        op: impl FnOnce(&Connection, &mut SchemaRegistry, &mut StagedSchemas, &str) -> Result<T>
        + Send
        + 'static,
    ) -> Result<T> {
        let table = self.table.clone();
        self.store.execute(move |state| {
            state.write(&table, |tx, registry, staged| {
                op(tx, registry, staged, &table)
            })
        })
    }

    fn read<T: Send + 'static>(
        &self,
        op: impl FnOnce(&Connection, &mut SchemaRegistry, &str) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        let table = self.table.clone();
        self.store.execute(move |state| {
            let StoreState { conn, registry } = state;
            op(conn, registry, &table)
        })
    }

    /// Inserts `record`, replacing any row with the same primary key.
    ///
    /// Replace means replace: fields missing from `record` are `NULL` in the
    /// stored row afterwards, even if the old row had them. Use
    /// [`save_or_update`](Self::save_or_update) or
    /// [`update_by_id`](Self::update_by_id) to change some fields only.
    ///
    /// On a dynamic table unknown fields become new columns first. On a
    /// static table fields that are not declared columns are dropped.
    /// Returns the row's primary key, generated when `record` has none.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`](crate::StoreError::Validation) for an
    /// invalid or reserved field name, or a missing key on a table that
    /// cannot generate one.
    pub fn save(&self, record: Record) -> Result<Value> {
        self.write(move |conn, registry, staged, table| {
            insert(conn, registry, staged, table, record)
        })
    }

    /// Saves every record in one transaction and returns their keys in
    /// order. Nothing is written if any record fails.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    pub fn save_many(&self, records: impl IntoIterator<Item = Record>) -> Result<Vec<Value>> {
        let records: Vec<Record> = records.into_iter().collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }
        self.write(move |conn, registry, staged, table| {
            records
                .into_iter()
                .map(|record| insert(conn, registry, staged, table, record))
                .collect()
        })
    }

    /// Updates the supplied fields of an existing row, or saves `record` when
    /// it has no key or no row has that key. Returns the key.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    pub fn save_or_update(&self, record: Record) -> Result<Value> {
        self.write(move |conn, registry, staged, table| {
            save_or_update(conn, registry, staged, table, record)
        })
    }

    /// [`save_or_update`](Self::save_or_update) for many records in one
    /// transaction. An empty list is a no-op.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    pub fn save_or_update_list(
        &self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Vec<Value>> {
        let records: Vec<Record> = records.into_iter().collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }
        self.write(move |conn, registry, staged, table| {
            records
                .into_iter()
                .map(|record| save_or_update(conn, registry, staged, table, record))
                .collect()
        })
    }

    /// Deletes the rows matching `condition` and returns how many went.
    ///
    /// Ordering and window on the condition are honoured, so
    /// `Condition::new().asc("created").limit(10, 0)` deletes the ten oldest
    /// rows.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`](crate::StoreError::Validation) for an
    /// invalid field name or page.
    pub fn remove(&self, condition: &Condition) -> Result<usize> {
        let condition = condition.clone();
        self.write(move |conn, registry, staged, table| {
            delete(conn, registry, staged, table, &condition)
        })
    }

    /// Deletes the row with key `id`. Returns 0 or 1.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyPrimaryKey`] for a `NULL` or blank key.
    pub fn remove_by_id(&self, id: impl Into<Value>) -> Result<usize> {
        self.remove_by_id_list([id.into()])
    }

    /// Deletes every row whose key is in `ids`. An empty list is a no-op.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyPrimaryKey`] if any key is `NULL` or blank.
    pub fn remove_by_id_list<I, V>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.write(move |conn, registry, staged, table| {
            delete_by_ids(conn, registry, staged, table, ids)
        })
    }

    /// Deletes the rows identified by the keys of `records`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyPrimaryKey`] if a record carries no key.
    pub fn remove_list(&self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let records = records.to_vec();
        self.write(move |conn, registry, staged, table| {
            let schema = registry.resolve(staged, table)?;
            let mut ids = Vec::with_capacity(records.len());
            for record in records {
                let id = conform(&schema, record)?
                    .key_value(&schema.primary_key)
                    .cloned()
                    .ok_or_else(|| ValidationError::EmptyPrimaryKey(schema.primary_key.clone()))?;
                ids.push(id);
            }
            delete_by_ids(conn, registry, staged, table, ids)
        })
    }

    /// Sets `fields` on every row matching `condition`, leaving other
    /// columns alone. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`](crate::StoreError::Validation) for an
    /// invalid field name or page.
    pub fn update(&self, fields: Record, condition: &Condition) -> Result<usize> {
        let condition = condition.clone();
        self.write(move |conn, registry, staged, table| {
            update_rows(conn, registry, staged, table, fields, &condition)
        })
    }

    /// Sets `fields` on the row with key `id`. A missing row is `Ok(0)`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyPrimaryKey`] for a `NULL` or blank key.
    pub fn update_by_id(&self, fields: Record, id: impl Into<Value>) -> Result<usize> {
        let id = id.into();
        self.write(move |conn, registry, staged, table| {
            let schema = registry.resolve(staged, table)?;
            let id = check_key(&schema, id)?;
            let condition = Condition::new().and_eq(schema.primary_key.clone(), id);
            update_rows(conn, registry, staged, table, fields, &condition)
        })
    }

    /// Rows matching `condition`. Without a projection every known column is
    /// selected; `NULL` fields are left out of the records.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`](crate::StoreError::Validation) for an
    /// invalid field name or page.
    pub fn query(&self, condition: &Condition) -> Result<Vec<Record>> {
        let condition = condition.clone();
        self.read(move |conn, registry, table| select(conn, registry, table, &condition))
    }

    /// Runs caller-supplied SQL with positional parameters. Records are
    /// keyed by result column name.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`](crate::StoreError::Database) if the engine
    /// rejects the statement.
    pub fn query_by_sql(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.read(move |conn, _, _| query_records(conn, &sql, &params))
    }

    /// Every row of the table.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn query_all(&self) -> Result<Vec<Record>> {
        self.query(&Condition::new())
    }

    /// First row matching `condition`. A condition without a window gets
    /// `LIMIT 1`.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn query_one(&self, condition: &Condition) -> Result<Option<Record>> {
        let condition = if condition.is_windowed() {
            condition.clone()
        } else {
            condition.clone().limit(1, 0)
        };
        Ok(self.query(&condition)?.into_iter().next())
    }

    /// Row with key `id`, or `None`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyPrimaryKey`] for a `NULL` or blank key.
    pub fn query_by_id(&self, id: impl Into<Value>) -> Result<Option<Record>> {
        let id = id.into();
        self.read(move |conn, registry, table| {
            let schema = committed(registry, table)?;
            let id = check_key(&schema, id)?;
            let condition = Condition::new()
                .and_eq(schema.primary_key.clone(), id)
                .limit(1, 0);
            Ok(select(conn, registry, table, &condition)?.into_iter().next())
        })
    }

    /// Returns `true` if a row with key `id` exists.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyPrimaryKey`] for a `NULL` or blank key.
    pub fn exists_by_id(&self, id: impl Into<Value>) -> Result<bool> {
        let id = id.into();
        self.read(move |conn, registry, table| {
            let schema = committed(registry, table)?;
            let id = check_key(&schema, id)?;
            if !registry.has_table(conn, table)? {
                return Ok(false);
            }
            row_exists(conn, &schema, &id)
        })
    }

    /// Number of rows `query(condition)` would return.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn count(&self, condition: &Condition) -> Result<u64> {
        let condition = condition.clone();
        self.read(move |conn, registry, table| {
            committed(registry, table)?;
            if !registry.has_table(conn, table)? {
                return Ok(0);
            }
            let fragment = condition.render()?;
            let sql = format!(
                "SELECT count(*) FROM (SELECT 1 FROM {} {})",
                quote_ident(table),
                fragment.sql
            );
            let count: i64 = conn.query_row(&sql, params_from_iter(bind(&fragment.params)), |row| {
                row.get(0)
            })?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    /// Full-text search, best match first.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotSearchable`](crate::StoreError::NotSearchable) for a
    /// static table without searchable columns.
    pub fn search(&self, keyword: &str) -> Result<Vec<Record>> {
        let hits = self.search_with_snippets(keyword, &[], &HighlightMarker::default())?;
        Ok(hits.into_iter().map(|hit| hit.record).collect())
    }

    /// Full-text search that also returns `fields` with every matched term
    /// wrapped in `marker`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotSearchable`](crate::StoreError::NotSearchable) for a
    /// static table without searchable columns and
    /// [`ValidationError::UnknownSearchColumn`] for a snippet field that is
    /// not indexed.
    pub fn search_with_snippets(
        &self,
        keyword: &str,
        fields: &[&str],
        marker: &HighlightMarker,
    ) -> Result<Vec<SearchHit>> {
        let keyword = keyword.to_string();
        let fields: Vec<String> = fields.iter().map(|field| field.to_string()).collect();
        let marker = marker.clone();
        self.read(move |conn, registry, table| {
            let schema = committed(registry, table)?;
            search::check_searchable(&schema)?;
            if !schema.is_searchable() || !registry.has_table(conn, table)? {
                return Ok(Vec::new());
            }
            search::search(conn, &schema, &keyword, &fields, &marker)
        })
    }
}

fn committed(registry: &SchemaRegistry, table: &str) -> Result<TableSchema> {
    registry
        .get(table)
        .cloned()
        .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
}

fn check_key(schema: &TableSchema, id: Value) -> Result<Value> {
    if id.is_empty_key() {
        return Err(ValidationError::EmptyPrimaryKey(schema.primary_key.clone()).into());
    }
    Ok(id)
}

/// Renames each field to the spelling of the column it addresses and drops
/// fields a static table does not declare. Fields of a dynamic table that
/// match no column yet are kept as they are.
fn conform(schema: &TableSchema, record: Record) -> Result<Record> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut conformed = Record::new();
    for (field, value) in record {
        let name = match schema.column(&field) {
            Some(column) => column.name.clone(),
            None if schema.is_dynamic() => field.clone(),
            None => continue,
        };
        if let Some(first) = seen.insert(name.to_ascii_lowercase(), field.clone()) {
            return Err(ValidationError::ConflictingFields {
                first,
                second: field,
            }
            .into());
        }
        conformed.insert(name, value);
    }
    Ok(conformed)
}

fn row_exists(conn: &Connection, schema: &TableSchema, id: &Value) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
        quote_ident(&schema.name),
        quote_ident(&schema.primary_key)
    );
    let found: Option<i64> = conn
        .query_row(&sql, [to_sql(id)], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn insert(
    conn: &Connection,
    registry: &mut SchemaRegistry,
    staged: &mut StagedSchemas,
    table: &str,
    record: Record,
) -> Result<Value> {
    let schema = registry.ensure_columns(conn, staged, table, record.fields())?;
    let mut record = conform(&schema, record)?;
    if record.key_value(&schema.primary_key).is_none() {
        if !schema.is_dynamic() && !schema.has_rowid_key() {
            return Err(ValidationError::EmptyPrimaryKey(schema.primary_key.clone()).into());
        }
        record.remove(&schema.primary_key);
    }

    let table_q = quote_ident(table);
    let sql = if record.is_empty() {
        format!("INSERT OR REPLACE INTO {table_q} DEFAULT VALUES")
    } else {
        let placeholders = vec!["?"; record.len()].join(", ");
        format!(
            "INSERT OR REPLACE INTO {table_q} ({}) VALUES ({placeholders})",
            column_list(record.fields())
        )
    };
    let values: Vec<SqlValue> = record.iter().map(|(_, value)| to_sql(value)).collect();
    conn.execute(&sql, params_from_iter(values))?;

    let key = conn.query_row(
        &format!(
            "SELECT {} FROM {table_q} WHERE rowid = last_insert_rowid()",
            quote_ident(&schema.primary_key)
        ),
        [],
        |row| row.get_ref(0).map(from_sql),
    )?;
    Ok(key)
}

fn save_or_update(
    conn: &Connection,
    registry: &mut SchemaRegistry,
    staged: &mut StagedSchemas,
    table: &str,
    record: Record,
) -> Result<Value> {
    let schema = registry.resolve(staged, table)?;
    let record = conform(&schema, record)?;
    let key = record.key_value(&schema.primary_key).cloned();
    let Some(id) = key else {
        return insert(conn, registry, staged, table, record);
    };
    if !registry.has_table_staged(conn, staged, table)? || !row_exists(conn, &schema, &id)? {
        return insert(conn, registry, staged, table, record);
    }
    let condition = Condition::new().and_eq(schema.primary_key.clone(), id.clone());
    update_rows(conn, registry, staged, table, record, &condition)?;
    Ok(id)
}

/// `WHERE` clause selecting the rows a condition addresses. Ordering and
/// window go through a rowid sub-select since `UPDATE` and `DELETE` accept
/// neither here.
fn target_rows(table: &str, condition: &Condition) -> Result<SqlFragment> {
    if condition.is_windowed() || condition.is_ordered() {
        let inner = condition.render()?;
        return Ok(SqlFragment {
            sql: format!(
                "WHERE rowid IN (SELECT rowid FROM {} {})",
                quote_ident(table),
                inner.sql
            ),
            params: inner.params,
        });
    }
    let filter = condition.render_filter()?;
    if filter.is_empty() {
        return Ok(filter);
    }
    Ok(SqlFragment {
        sql: format!("WHERE {}", filter.sql),
        params: filter.params,
    })
}

fn delete(
    conn: &Connection,
    registry: &mut SchemaRegistry,
    staged: &mut StagedSchemas,
    table: &str,
    condition: &Condition,
) -> Result<usize> {
    registry.resolve(staged, table)?;
    if !registry.has_table_staged(conn, staged, table)? {
        return Ok(0);
    }
    let target = target_rows(table, condition)?;
    let sql = format!("DELETE FROM {} {}", quote_ident(table), target.sql);
    Ok(conn.execute(sql.trim_end(), params_from_iter(bind(&target.params)))?)
}

fn delete_by_ids(
    conn: &Connection,
    registry: &mut SchemaRegistry,
    staged: &mut StagedSchemas,
    table: &str,
    ids: Vec<Value>,
) -> Result<usize> {
    let schema = registry.resolve(staged, table)?;
    let mut keys = Vec::with_capacity(ids.len());
    for id in ids {
        keys.push(check_key(&schema, id)?);
    }
    let condition = Condition::new().and_in(schema.primary_key.clone(), keys);
    delete(conn, registry, staged, table, &condition)
}

fn update_rows(
    conn: &Connection,
    registry: &mut SchemaRegistry,
    staged: &mut StagedSchemas,
    table: &str,
    fields: Record,
    condition: &Condition,
) -> Result<usize> {
    registry.resolve(staged, table)?;
    if fields.is_empty() || !registry.has_table_staged(conn, staged, table)? {
        return Ok(0);
    }
    let schema = registry.ensure_columns(conn, staged, table, fields.fields())?;
    let fields = conform(&schema, fields)?;
    if fields.is_empty() {
        return Ok(0);
    }

    let target = target_rows(table, condition)?;
    let assignments = fields
        .fields()
        .map(|field| format!("{} = ?", quote_ident(field)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE {} SET {assignments} {}", quote_ident(table), target.sql);
    let mut params: Vec<SqlValue> = fields.iter().map(|(_, value)| to_sql(value)).collect();
    params.extend(bind(&target.params));
    Ok(conn.execute(sql.trim_end(), params_from_iter(params))?)
}

fn select(
    conn: &Connection,
    registry: &mut SchemaRegistry,
    table: &str,
    condition: &Condition,
) -> Result<Vec<Record>> {
    let schema = committed(registry, table)?;
    if !registry.has_table(conn, table)? {
        return Ok(Vec::new());
    }
    let columns = match condition.projection() {
        Some(_) => condition.select_list()?,
        None => column_list(schema.column_names()),
    };
    let fragment = condition.render()?;
    let sql = format!("SELECT {columns} FROM {} {}", quote_ident(table), fragment.sql);
    query_records(conn, sql.trim_end(), &fragment.params)
}
