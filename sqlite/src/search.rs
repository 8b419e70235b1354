//! Full-text search over a table's FTS5 index.
//!
//! Keywords are split on whitespace and every token becomes a quoted FTS5
//! string, so user input never reaches the FTS query grammar. Tokens are
//! joined with FTS5's implicit AND. Results are ordered by `bm25` rank.

use std::collections::BTreeMap;

use recordstore_core::{HighlightMarker, Record, TableSchema, ValidationError};
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use tracing::debug;

use crate::convert::{from_sql, row_to_record};
use crate::error::{Result, StoreError};
use crate::schema::{fts_table, quote_ident};

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// The matching row as stored.
    pub record: Record,
    /// Highlighted text per requested snippet field. A field whose value is
    /// `NULL` is absent.
    pub snippets: BTreeMap<String, String>,
}

/// Builds an FTS5 match expression from free text. `None` when the keyword
/// holds no searchable token.
pub(crate) fn fts_query(keyword: &str) -> Option<String> {
    let tokens: Vec<String> = keyword
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Runs a search against `schema`, whose physical table and index are
/// known to exist.
pub(crate) fn search(
    conn: &Connection,
    schema: &TableSchema,
    keyword: &str,
    fields: &[String],
    marker: &HighlightMarker,
) -> Result<Vec<SearchHit>> {
    let Some(expression) = fts_query(keyword) else {
        return Ok(Vec::new());
    };

    let mut highlights = Vec::with_capacity(fields.len());
    for field in fields {
        let index = schema
            .searchable
            .iter()
            .position(|column| column.eq_ignore_ascii_case(field))
            .ok_or_else(|| ValidationError::UnknownSearchColumn {
                table: schema.name.clone(),
                column: field.clone(),
            })?;
        highlights.push(index);
    }

    let fts = quote_ident(&fts_table(&schema.name));
    let columns: Vec<String> = schema.column_names().map(String::from).collect();
    let mut select: Vec<String> = columns
        .iter()
        .map(|column| format!("src.{}", quote_ident(column)))
        .collect();
    let mut inner = vec![
        "rowid AS \"_rs_rowid\"".to_string(),
        "rank AS \"_rs_rank\"".to_string(),
    ];
    for (n, index) in highlights.iter().enumerate() {
        inner.push(format!("highlight({fts}, {index}, ?2, ?3) AS \"_rs_hl_{n}\""));
        select.push(format!("hits.\"_rs_hl_{n}\""));
    }

    let sql = format!(
        "SELECT {} FROM (SELECT {} FROM {fts} WHERE {fts} MATCH ?1) AS hits \
         JOIN {} AS src ON src.rowid = hits.\"_rs_rowid\" \
         ORDER BY hits.\"_rs_rank\"",
        select.join(", "),
        inner.join(", "),
        quote_ident(&schema.name),
    );

    let mut params = vec![expression];
    if !highlights.is_empty() {
        params.push(marker.open.clone());
        params.push(marker.close.clone());
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let record = row_to_record(row, &columns)?;
        let mut snippets = BTreeMap::new();
        for (n, field) in fields.iter().enumerate() {
            if let Some(text) = from_sql(row.get_ref(columns.len() + n)?).as_text() {
                snippets.insert(field.clone(), text.to_string());
            }
        }
        Ok(SearchHit { record, snippets })
    })?;
    let hits = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(table = %schema.name, hits = hits.len(), "Search finished");
    Ok(hits)
}

/// Fails with [`StoreError::NotSearchable`] for a static table without an
/// index.
pub(crate) fn check_searchable(schema: &TableSchema) -> Result<()> {
    if !schema.is_dynamic() && !schema.is_searchable() {
        return Err(StoreError::NotSearchable(schema.name.clone()));
    }
    Ok(())
}
