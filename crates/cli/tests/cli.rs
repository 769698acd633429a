use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;

fn parse_jsonl(bytes: &[u8]) -> Vec<Value> {
    let s = String::from_utf8_lossy(bytes);
    s.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).expect("valid jsonl line"))
        .collect()
}

fn entcache(db: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("entcache"));
    cmd.env_remove("ENTCACHE_CONFIG_FILE")
        .env_remove("ENTCACHE_BACKEND")
        .env_remove("ENTCACHE_INIT_MODE")
        .env_remove("RUST_LOG")
        .arg("--backend")
        .arg("sqlite")
        .arg("--db-path")
        .arg(db);
    cmd
}

#[test]
fn seed_and_list_over_sqlite() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("people.sqlite");

    entcache(&db).arg("seed").assert().success();

    let assert = entcache(&db).arg("list").assert().success();
    let people = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(people.len(), 10);
    assert_eq!(people[0]["name"], "aaa");
    assert_eq!(people[9]["age"], 19);
}

#[test]
fn watch_prints_notifications_to_stderr() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("people.sqlite");

    let assert = entcache(&db)
        .arg("--watch")
        .args(["add", "7", "bob", "40"])
        .assert()
        .success();

    let events = parse_jsonl(&assert.get_output().stderr);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["operation"], "add");
    assert_eq!(events[0]["id"], 7);
}

#[test]
fn lazy_get_reads_through() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("people.sqlite");
    entcache(&db).arg("seed").assert().success();

    let assert = entcache(&db).args(["--lazy", "get", "3"]).assert().success();
    let people = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(people[0]["name"], "ddd");

    let assert = entcache(&db).args(["--lazy", "get", "99"]).assert().success();
    assert_eq!(String::from_utf8_lossy(&assert.get_output().stdout).trim(), "null");
}

#[test]
fn remove_missing_fails() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("people.sqlite");

    let assert = entcache(&db).args(["remove", "9"]).assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("NOT_FOUND"));
}
