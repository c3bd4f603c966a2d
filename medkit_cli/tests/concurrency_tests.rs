//! Concurrency tests for the medkit binary.
//!
//! These tests verify that multiple processes can safely:
//! - Append documents to the same collection (file locking)
//! - Take doses from the same medicine without overselling stock
//! - Race on a unique category name

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medkit"));
    cmd.env("MEDKIT_CONFIG", dir.join("config.toml"))
        .env("MEDKIT_USERNAME", "admin")
        .env("MEDKIT_PASSWORD", "medkit123")
        .arg("--data-dir")
        .arg(dir.join("data"))
        .timeout(Duration::from_secs(20));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn json(dir: &Path, args: &[&str]) -> Value {
    let output = cli(dir)
        .arg("--json")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid JSON output")
}

fn add_medicine(dir: &Path, name: &str, quantity: u32) -> String {
    let quantity = quantity.to_string();
    json(
        dir,
        &[
            "add",
            "--name",
            name,
            "--category",
            "Pain Relief",
            "--dosage",
            "1 tablet",
            "--quantity",
            quantity.as_str(),
        ],
    )["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_concurrent_adds() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();
    json(&dir, &["category", "add", "Pain Relief"]);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dir = dir.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 3));
                add_medicine(&dir, &format!("Medicine {}", i), 5);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let listed = json(&dir, &["list"]);
    assert_eq!(listed.as_array().unwrap().len(), 8);

    // Every line on disk is still valid JSON
    let content = std::fs::read_to_string(dir.join("data/medicines.jsonl")).unwrap();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        assert!(
            serde_json::from_str::<Value>(line).is_ok(),
            "medicines.jsonl contains invalid JSON line: {}",
            line
        );
    }
}

#[test]
fn test_concurrent_doses_never_oversell() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();
    json(&dir, &["category", "add", "Pain Relief"]);
    let id = add_medicine(&dir, "Aspirin", 4);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dir = dir.clone();
            let id = id.clone();
            thread::spawn(move || cli(&dir).args(["take", &id]).output().unwrap().status.success())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 4);

    let shown = json(&dir, &["show", &id]);
    assert_eq!(shown["medicine"]["quantity"], 0);
    assert_eq!(shown["medicine"]["usageCount"], 4);
    assert_eq!(shown["status"], "out");

    let history = json(&dir, &["history", "--medicine", &id]);
    assert_eq!(history.as_array().unwrap().len(), 4);
}

#[test]
fn test_concurrent_duplicate_category() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();
    // Create the collections up front so every racer only inserts
    json(&dir, &["category", "list"]);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let dir = dir.clone();
            thread::spawn(move || {
                cli(&dir)
                    .args(["category", "add", "Allergy"])
                    .output()
                    .unwrap()
                    .status
                    .success()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    let categories = json(&dir, &["category", "list"]);
    assert_eq!(categories.as_array().unwrap().len(), 1);
}
