use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.json");
        let body = json!({
            "storage": {
                "objects_dir": dir.path().join("objects"),
                "database_path": dir.path().join("invox.db"),
            },
            "llm": { "enabled": false },
        });
        fs::write(&config, serde_json::to_string_pretty(&body).unwrap()).unwrap();
        Self { dir, config }
    }

    fn file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn invox(&self) -> Command {
        let mut cmd = Command::cargo_bin("invox").unwrap();
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    fn list_json(&self) -> Value {
        let output = self
            .invox()
            .args(["list", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn ingest_then_list() {
    let ws = Workspace::new();
    let pdf = ws.file("a.pdf", b"not really a pdf");

    ws.invox()
        .args(["ingest", path_arg(&pdf), "--id", "FV/7", "--paid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 stored"));

    let list = ws.list_json();
    let records = list.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["originalFileName"], "a.pdf");
    assert_eq!(records[0]["id"], "FV/7");
    assert_eq!(records[0]["isPaid"], true);
    assert_eq!(records[0]["isReviewed"], false);
    assert_eq!(records[0]["fileExists"], true);
}

#[test]
fn reingest_reports_duplicate() {
    let ws = Workspace::new();
    let pdf = ws.file("a.pdf", b"same bytes");
    let copy = ws.file("copy.pdf", b"same bytes");

    ws.invox().args(["ingest", path_arg(&pdf)]).assert().success();
    ws.invox()
        .args(["ingest", path_arg(&copy)])
        .assert()
        .success()
        .stdout(predicate::str::contains("already stored"));

    assert_eq!(ws.list_json().as_array().unwrap().len(), 1);
}

#[test]
fn rejects_non_pdf() {
    let ws = Workspace::new();
    let txt = ws.file("notes.txt", b"hello");

    ws.invox()
        .args(["ingest", path_arg(&txt)])
        .assert()
        .failure();

    assert!(ws.list_json().as_array().unwrap().is_empty());
}

#[test]
fn update_and_show() {
    let ws = Workspace::new();
    let pdf = ws.file("a.pdf", b"invoice body");
    ws.invox().args(["ingest", path_arg(&pdf)]).assert().success();

    let hash = ws.list_json()[0]["contentHash"].as_str().unwrap().to_string();

    ws.invox()
        .args(["update", &hash, "--amount", "12.50", "--reviewed", "true"])
        .assert()
        .success();

    let output = ws.invox().args(["show", &hash]).output().unwrap();
    assert!(output.status.success());
    let record: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["amount"], json!(12.5));
    assert_eq!(record["isReviewed"], true);
    assert_eq!(record["isPaid"], false);
}

#[test]
fn show_unknown_hash_fails() {
    let ws = Workspace::new();
    let unknown = "0".repeat(64);

    ws.invox().args(["show", &unknown]).assert().failure();
    ws.invox()
        .args(["exists", &unknown])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fileExists\": false"));
}

#[test]
fn sync_flags_deleted_file() {
    let ws = Workspace::new();
    let pdf = ws.file("a.pdf", b"to be deleted");
    ws.invox().args(["ingest", path_arg(&pdf)]).assert().success();

    let hash = ws.list_json()[0]["contentHash"].as_str().unwrap().to_string();
    fs::remove_file(ws.dir.path().join("objects").join(format!("{}.pdf", hash))).unwrap();

    ws.invox()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 missing"));
    assert_eq!(ws.list_json()[0]["fileExists"], false);
}

#[test]
fn config_path_uses_flag() {
    let ws = Workspace::new();

    ws.invox()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"))
        .stdout(predicate::str::contains("exists"));

    ws.invox()
        .args(["config", "get", "llm.enabled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("false"));
}
