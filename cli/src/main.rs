use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use recordstore_core::{Condition, HighlightMarker, Record, Rgb, TableKind, Value};
use recordstore_sqlite::{RecordStore, StoreManager, USER_PARTITION};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "recordstore")]
#[command(about = "Inspect and edit partitioned SQLite record stores", version)]
struct Cli {
    /// Manager configuration (YAML).
    #[arg(long, global = true, default_value = "recordstore.yaml")]
    config: PathBuf,
    /// Partition to operate on.
    #[arg(long, global = true, default_value = USER_PARTITION)]
    partition: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the tables of the partition.
    Tables,
    /// Print records matching a filter.
    Query(QueryArgs),
    /// Save one record given as a JSON object.
    Save(SaveArgs),
    /// Delete records by key or by filter.
    Remove(RemoveArgs),
    /// Full-text search with highlighted snippets.
    Search(SearchArgs),
}

#[derive(Debug, Args)]
struct TableArgs {
    /// Table name.
    #[arg(long)]
    table: String,
    /// Open the table as dynamic, declaring it if needed.
    #[arg(long)]
    dynamic: bool,
    /// Primary key of a dynamic table (default `_id`).
    #[arg(long, requires = "dynamic")]
    key: Option<String>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[command(flatten)]
    target: TableArgs,
    /// Equality filter `field=value`; repeat to AND several.
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    filters: Vec<String>,
    /// Sort ascending by this field.
    #[arg(long, conflicts_with = "desc")]
    asc: Option<String>,
    /// Sort descending by this field.
    #[arg(long)]
    desc: Option<String>,
    /// Maximum rows to print.
    #[arg(long)]
    limit: Option<u64>,
    /// Rows to skip before printing.
    #[arg(long, default_value_t = 0, requires = "limit")]
    offset: u64,
    /// Fields to print; repeat for several.
    #[arg(long = "select", value_name = "FIELD")]
    fields: Vec<String>,
    /// Print only the number of matching rows.
    #[arg(long)]
    count: bool,
}

#[derive(Debug, Args)]
struct SaveArgs {
    #[command(flatten)]
    target: TableArgs,
    /// Record as a JSON object, e.g. '{"title": "hello"}'.
    #[arg(long)]
    record: String,
    /// Update only the given fields when the key already exists.
    #[arg(long)]
    merge: bool,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    #[command(flatten)]
    target: TableArgs,
    /// Primary key to delete; repeat for several.
    #[arg(long = "id", value_name = "KEY", conflicts_with = "filters")]
    ids: Vec<String>,
    /// Equality filter `field=value`; repeat to AND several.
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    filters: Vec<String>,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[command(flatten)]
    target: TableArgs,
    /// Search text; every word must match.
    keyword: String,
    /// Field to return highlighted; repeat for several.
    #[arg(long = "snippet", value_name = "FIELD")]
    snippets: Vec<String>,
    /// Highlight with `<font color>` tags of this hex color (e.g. ff0000).
    #[arg(long, value_name = "RRGGBB")]
    color: Option<String>,
}

#[derive(Debug, Serialize)]
struct TableSummary {
    name: String,
    kind: TableKind,
    primary_key: String,
    columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    searchable: Vec<String>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = run(cli);

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), String> {
    let manager = StoreManager::from_file(&cli.config)
        .map_err(|e| format!("Failed to load config '{}': {e}", cli.config.display()))?;
    debug!(config = %cli.config.display(), partition = %cli.partition, "Configuration loaded");

    let result = match cli.command {
        Command::Tables => run_tables(&manager, &cli.partition),
        Command::Query(args) => run_query(&manager, &cli.partition, args),
        Command::Save(args) => run_save(&manager, &cli.partition, args),
        Command::Remove(args) => run_remove(&manager, &cli.partition, args),
        Command::Search(args) => run_search(&manager, &cli.partition, args),
    };
    manager
        .close_all()
        .map_err(|e| format!("Failed to close stores: {e}"))?;
    result
}

// ---------------------------------------------------------------------------
// commands
// ---------------------------------------------------------------------------

fn run_tables(manager: &StoreManager, partition: &str) -> Result<(), String> {
    let store = manager
        .open(partition)
        .map_err(|e| format!("Failed to open partition '{partition}': {e}"))?;
    let tables = store
        .tables()
        .map_err(|e| format!("Failed to list tables: {e}"))?;
    let summaries: Vec<TableSummary> = tables
        .into_iter()
        .map(|schema| TableSummary {
            columns: schema.column_names().map(String::from).collect(),
            name: schema.name,
            kind: schema.kind,
            primary_key: schema.primary_key,
            searchable: schema.searchable,
        })
        .collect();
    print_json(&summaries)
}

fn run_query(manager: &StoreManager, partition: &str, args: QueryArgs) -> Result<(), String> {
    let handle = open_table(manager, partition, &args.target)?;
    let mut condition = filters_to_condition(&args.filters)?;
    if let Some(field) = args.asc {
        condition = condition.asc(field);
    }
    if let Some(field) = args.desc {
        condition = condition.desc(field);
    }
    if let Some(limit) = args.limit {
        condition = condition.limit(limit, args.offset);
    }
    condition = condition.selects(args.fields);

    if args.count {
        let count = handle
            .count(&condition)
            .map_err(|e| format!("Count failed: {e}"))?;
        return print_json(&count);
    }
    let records = handle
        .query(&condition)
        .map_err(|e| format!("Query failed: {e}"))?;
    print_json(&records)
}

fn run_save(manager: &StoreManager, partition: &str, args: SaveArgs) -> Result<(), String> {
    let handle = open_table(manager, partition, &args.target)?;
    let record: Record = serde_json::from_str(&args.record)
        .map_err(|e| format!("--record must be a JSON object of scalars: {e}"))?;
    let key = if args.merge {
        handle.save_or_update(record)
    } else {
        handle.save(record)
    }
    .map_err(|e| format!("Save failed: {e}"))?;
    print_json(&key)
}

fn run_remove(manager: &StoreManager, partition: &str, args: RemoveArgs) -> Result<(), String> {
    if args.ids.is_empty() && args.filters.is_empty() {
        return Err("remove needs --id or --where".to_string());
    }
    let handle = open_table(manager, partition, &args.target)?;
    let removed = if args.ids.is_empty() {
        let condition = filters_to_condition(&args.filters)?;
        handle.remove(&condition)
    } else {
        handle.remove_by_id_list(args.ids.iter().map(String::as_str).map(parse_value))
    }
    .map_err(|e| format!("Remove failed: {e}"))?;
    print_json(&removed)
}

fn run_search(manager: &StoreManager, partition: &str, args: SearchArgs) -> Result<(), String> {
    let handle = open_table(manager, partition, &args.target)?;
    let marker = match &args.color {
        Some(hex) => HighlightMarker::color(parse_color(hex)?),
        None => HighlightMarker::default(),
    };
    let fields: Vec<&str> = args.snippets.iter().map(String::as_str).collect();
    let hits = handle
        .search_with_snippets(&args.keyword, &fields, &marker)
        .map_err(|e| format!("Search failed: {e}"))?;
    print_json(&hits)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_table(
    manager: &StoreManager,
    partition: &str,
    target: &TableArgs,
) -> Result<RecordStore, String> {
    let handle = match (target.dynamic, &target.key) {
        (true, Some(key)) => {
            manager.dynamic_record_store_with_key(partition, &target.table, key)
        }
        (true, None) => manager.dynamic_record_store(partition, &target.table),
        (false, _) => manager.record_store(partition, &target.table),
    };
    handle.map_err(|e| format!("Failed to open table '{}': {e}", target.table))
}

/// Reads a command-line value as JSON when it parses as a scalar, as text
/// otherwise: `42` is an integer, `"42"` and `abc` are text.
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Null | Value::Integer(_) | Value::Real(_) | Value::Text(_))) => value,
        _ => Value::Text(raw.to_string()),
    }
}

fn filters_to_condition(filters: &[String]) -> Result<Condition, String> {
    let mut condition = Condition::new();
    for filter in filters {
        let (field, value) = filter
            .split_once('=')
            .ok_or_else(|| format!("invalid filter '{filter}', expected FIELD=VALUE"))?;
        condition = condition.and_eq(field.trim(), parse_value(value));
    }
    Ok(condition)
}

fn parse_color(hex: &str) -> Result<Rgb, String> {
    let digits = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    match (digits.len(), channel(0..2), channel(2..4), channel(4..6)) {
        (6, Some(r), Some(g), Some(b)) => Ok(Rgb(r, g, b)),
        _ => Err(format!("invalid color '{hex}', expected RRGGBB")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), Value::Integer(42));
        assert_eq!(parse_value("1.5"), Value::Real(1.5));
        assert_eq!(parse_value("\"42\""), Value::from("42"));
        assert_eq!(parse_value("open"), Value::from("open"));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("[1,2]"), Value::from("[1,2]"));
    }

    #[test]
    fn test_filters_to_condition() {
        let condition =
            filters_to_condition(&["status=open".to_string(), "priority=2".to_string()]).unwrap();
        let expected = Condition::new().and_eq("status", "open").and_eq("priority", 2);
        assert_eq!(condition, expected);
        assert!(filters_to_condition(&["broken".to_string()]).is_err());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("ff8000").unwrap(), Rgb(0xff, 0x80, 0));
        assert_eq!(parse_color("#0000ff").unwrap(), Rgb(0, 0, 0xff));
        assert!(parse_color("fff").is_err());
        assert!(parse_color("gg0000").is_err());
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "recordstore",
            "--config",
            "stores.yaml",
            "search",
            "--table",
            "notes",
            "--dynamic",
            "--snippet",
            "title",
            "alpha beta",
        ])
        .unwrap();
        assert_eq!(cli.partition, USER_PARTITION);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.keyword, "alpha beta");
                assert_eq!(args.snippets, vec!["title"]);
                assert!(args.target.dynamic);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
