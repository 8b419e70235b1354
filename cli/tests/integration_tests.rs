use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Writes a config with one `user` partition whose static tables live in
/// `tables/`, and returns its path.
fn write_config(dir: &TempDir) -> PathBuf {
    let tables = dir.path().join("tables");
    fs::create_dir_all(&tables).expect("failed to create tables dir");
    fs::write(
        tables.join("tasks.yaml"),
        r#"name: tasks
primary_key: id
columns:
  - name: id
    type: text
  - name: title
    type: text
  - name: status
    type: text
searchable: [title]
"#,
    )
    .expect("failed to write table definition");

    let config = format!(
        "partitions:\n  user:\n    path: {}\n    definitions: {}\n",
        dir.path().join("user.db").display(),
        tables.display()
    );
    let path = dir.path().join("recordstore.yaml");
    fs::write(&path, config).expect("failed to write config");
    path
}

fn recordstore(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_recordstore"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run recordstore")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "recordstore failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

// ---------------------------------------------------------------------------
// tables
// ---------------------------------------------------------------------------

#[test]
fn tables_lists_declared_tables() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let json = stdout_json(&recordstore(&config, &["tables"]));
    let tables = json.as_array().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0]["name"], "tasks");
    assert_eq!(tables[0]["kind"], "static");
    assert_eq!(tables[0]["columns"], serde_json::json!(["id", "title", "status"]));
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = recordstore(&dir.path().join("nope.yaml"), &["tables"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}

// ---------------------------------------------------------------------------
// save / query / remove
// ---------------------------------------------------------------------------

#[test]
fn save_query_and_remove_static_records() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    for record in [
        r#"{"id": "t1", "title": "write report", "status": "open"}"#,
        r#"{"id": "t2", "title": "ship beta", "status": "done"}"#,
    ] {
        let key = stdout_json(&recordstore(
            &config,
            &["save", "--table", "tasks", "--record", record],
        ));
        assert!(key.is_string());
    }

    let open = stdout_json(&recordstore(
        &config,
        &["query", "--table", "tasks", "--where", "status=open"],
    ));
    assert_eq!(open.as_array().unwrap().len(), 1);
    assert_eq!(open[0]["title"], "write report");

    let merged = stdout_json(&recordstore(
        &config,
        &[
            "save",
            "--table",
            "tasks",
            "--merge",
            "--record",
            r#"{"id": "t1", "status": "done"}"#,
        ],
    ));
    assert_eq!(merged, "t1");

    let count = stdout_json(&recordstore(
        &config,
        &["query", "--table", "tasks", "--where", "status=done", "--count"],
    ));
    assert_eq!(count, 2);

    let removed = stdout_json(&recordstore(
        &config,
        &["remove", "--table", "tasks", "--id", "t1", "--id", "t2"],
    ));
    assert_eq!(removed, 2);
}

#[test]
fn dynamic_tables_grow_from_the_command_line() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let key = stdout_json(&recordstore(
        &config,
        &[
            "save",
            "--table",
            "events",
            "--dynamic",
            "--record",
            r#"{"kind": "login", "attempt": 3}"#,
        ],
    ));
    assert_eq!(key.as_str().map(str::len), Some(32));

    let rows = stdout_json(&recordstore(
        &config,
        &[
            "query", "--table", "events", "--dynamic", "--where", "attempt=3", "--select", "kind",
        ],
    ));
    assert_eq!(rows, serde_json::json!([{ "kind": "login" }]));

    let tables = stdout_json(&recordstore(&config, &["tables"]));
    let events = tables
        .as_array()
        .unwrap()
        .iter()
        .find(|table| table["name"] == "events")
        .expect("events should be listed after reopening");
    assert_eq!(events["kind"], "dynamic");
}

#[test]
fn remove_without_target_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let output = recordstore(&config, &["remove", "--table", "tasks"]);
    assert!(!output.status.success());
}

#[test]
fn static_save_rejects_non_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let output = recordstore(
        &config,
        &["save", "--table", "tasks", "--record", "not json"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--record"));
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

#[test]
fn search_prints_highlighted_snippets() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    stdout_json(&recordstore(
        &config,
        &[
            "save",
            "--table",
            "tasks",
            "--record",
            r#"{"id": "t1", "title": "alpha beta"}"#,
        ],
    ));

    let hits = stdout_json(&recordstore(
        &config,
        &["search", "--table", "tasks", "--snippet", "title", "alpha"],
    ));
    assert_eq!(hits[0]["snippets"]["title"], "[alpha] beta");
    assert_eq!(hits[0]["record"]["id"], "t1");

    let colored = stdout_json(&recordstore(
        &config,
        &[
            "search", "--table", "tasks", "--snippet", "title", "--color", "ff0000", "beta",
        ],
    ));
    assert_eq!(
        colored[0]["snippets"]["title"],
        "alpha <font color=\"#ff0000\">beta</font>"
    );

    let none = stdout_json(&recordstore(
        &config,
        &["search", "--table", "tasks", "zzz-no-match"],
    ));
    assert_eq!(none, serde_json::json!([]));
}
