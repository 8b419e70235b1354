//! Full-text search example.
//!
//! Searchable columns are indexed with FTS5. Results come back best match
//! first, optionally with the matched terms highlighted.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p recordstore-demos --example search -- "alpha"
//! ```

use recordstore_core::{ColumnType, HighlightMarker, Record, Rgb, TableSchema};
use recordstore_db::TableDefinitions;
use recordstore_sqlite::Store;

fn main() {
    let keyword = std::env::args().nth(1).unwrap_or_else(|| "alpha".to_string());

    let articles = TableSchema::new("articles", "slug")
        .with_column("slug", ColumnType::Text)
        .with_column("title", ColumnType::Text)
        .with_column("body", ColumnType::Text)
        .searchable(["title", "body"]);
    let store = Store::open_in_memory(TableDefinitions::from_tables([articles]).unwrap()).unwrap();
    let handle = store.record_store("articles").unwrap();

    handle
        .save_many([
            article("release", "Alpha release notes", "The alpha ships with search."),
            article("roadmap", "Roadmap", "Beta follows alpha, then alpha two."),
            article("faq", "FAQ", "Questions about the gamma build."),
        ])
        .unwrap();

    println!("Searching for {keyword:?}\n");
    let plain = handle
        .search_with_snippets(&keyword, &["title", "body"], &HighlightMarker::default())
        .unwrap();
    for hit in &plain {
        println!("{}", hit.record.get("slug").and_then(|v| v.as_text()).unwrap_or("?"));
        for (field, snippet) in &hit.snippets {
            println!("  {field}: {snippet}");
        }
    }
    if plain.is_empty() {
        println!("no matches");
    }

    println!("\nAs HTML:");
    let html = handle
        .search_with_snippets(&keyword, &["body"], &HighlightMarker::color(Rgb(0xd0, 0x30, 0x30)))
        .unwrap();
    for hit in html {
        println!("  {}", hit.snippets.get("body").map(String::as_str).unwrap_or(""));
    }
}

fn article(slug: &str, title: &str, body: &str) -> Record {
    Record::new()
        .with("slug", slug)
        .with("title", title)
        .with("body", body)
}
