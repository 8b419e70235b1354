//! Conversion between [`Value`]/[`Record`] and SQLite rows.
//!
//! Values cross the boundary as SQLite's own storage classes: no implicit
//! coercion happens here. Rows come back as records holding only non-NULL
//! columns.

use recordstore_core::{Record, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Row, params_from_iter};

use crate::error::Result;

/// Converts a [`Value`] into an owned engine value for binding.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

/// Converts a borrowed engine value into a [`Value`].
///
/// Text that is not valid UTF-8 is converted lossily.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Converts a parameter list for `params_from_iter`.
pub(crate) fn bind(values: &[Value]) -> Vec<SqlValue> {
    values.iter().map(to_sql).collect()
}

/// Reads the columns of `row` named in `columns` (by position) into a record,
/// skipping NULLs.
pub(crate) fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, name) in columns.iter().enumerate() {
        let value = from_sql(row.get_ref(index)?);
        if !value.is_null() {
            record.insert(name.clone(), value);
        }
    }
    Ok(record)
}

/// Runs a query and maps every row to a [`Record`] keyed by result column
/// name.
pub(crate) fn query_records(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let rows = stmt.query_map(params_from_iter(bind(params)), |row| {
        row_to_record(row, &columns)
    })?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}
