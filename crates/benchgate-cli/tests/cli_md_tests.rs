//! Integration tests for `benchgate md` and `benchgate github-annotations`.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Returns the path to the test fixtures directory
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn benchgate() -> Command {
    Command::cargo_bin("benchgate").expect("failed to find benchgate binary")
}

#[test]
fn test_md_renders_table_to_stdout() {
    benchgate()
        .arg("md")
        .arg("--compare")
        .arg(fixtures_dir().join("compare_fail.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("❌ benchgate: fail"))
        .stdout(predicate::str::contains("| candidate | metric |"))
        .stdout(predicate::str::contains("| `./fast` | `perft` (higher) | 1000 | 2000 | +100.00% | <0.0001 | ✅ accepted |"))
        .stdout(predicate::str::contains("⏳ pending"))
        .stdout(predicate::str::contains("❌ rejected"))
        .stdout(predicate::str::contains("./slow perft: rejected at round 5"));
}

#[test]
fn test_md_writes_file() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let out = temp_dir.path().join("comment.md");

    benchgate()
        .arg("md")
        .arg("--compare")
        .arg(fixtures_dir().join("compare_fail.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let md = fs::read_to_string(&out).expect("read markdown");
    assert!(md.contains("**Gate:** `movegen`"));
}

#[test]
fn test_md_missing_receipt_fails() {
    benchgate()
        .arg("md")
        .arg("--compare")
        .arg(fixtures_dir().join("does-not-exist.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.json"));
}

#[test]
fn test_github_annotations_flags_rejected_and_pending() {
    benchgate()
        .arg("github-annotations")
        .arg("--compare")
        .arg(fixtures_dir().join("compare_fail.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "::warning::benchgate ./same perft: inconclusive after 10 rounds",
        ))
        .stdout(predicate::str::contains(
            "::error::benchgate ./slow perft: rejected at round 5",
        ))
        .stdout(predicate::str::contains("./fast").not());
}
