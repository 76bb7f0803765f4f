//! Integration tests for `benchgate compare`.
//!
//! Candidates are tiny shell scripts that print fixed metric lines.

#![cfg(unix)]
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;

/// Write an executable `sh` script printing `lines`, one per line.
fn candidate(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut body = String::from("#!/bin/sh\n");
    for line in lines {
        body.push_str(&format!("echo '{line}'\n"));
    }
    fs::write(&path, body).expect("write script");
    let mut perms = fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

fn benchgate() -> Command {
    Command::cargo_bin("benchgate").expect("failed to find benchgate binary")
}

fn read_receipt(path: &Path) -> serde_json::Value {
    let bytes = fs::read(path).expect("read receipt");
    serde_json::from_slice(&bytes).expect("parse receipt")
}

#[test]
fn test_compare_faster_candidate_is_accepted() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["1000"]);
    let fast = candidate(temp_dir.path(), "fast", &["2000"]);
    let out = temp_dir.path().join("compare.json");

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidate")
        .arg(&fast)
        .args(["--metric", "perft", "--seed", "1", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("perft accepted"));

    let receipt = read_receipt(&out);
    assert_eq!(receipt["schema"], "benchgate.compare.v1");
    assert_eq!(receipt["rounds"], 5);
    assert_eq!(receipt["verdict"]["status"], "pass");
    let pair = &receipt["candidates"][fast.display().to_string()]["metrics"]["perft"];
    assert_eq!(pair["status"], "accepted");
    assert_eq!(pair["decided_at_round"], 5);
}

#[test]
fn test_compare_rejection_exits_two() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["1000"]);
    let slow = candidate(temp_dir.path(), "slow", &["10"]);
    let out = temp_dir.path().join("compare.json");

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidate")
        .arg(&slow)
        .args(["--metric", "perft", "--out"])
        .arg(&out)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("perft rejected"));

    assert_eq!(read_receipt(&out)["verdict"]["status"], "fail");
}

#[test]
fn test_compare_pending_respects_fail_on_pending() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["7"]);
    let same = candidate(temp_dir.path(), "same", &["7"]);
    let out = temp_dir.path().join("compare.json");

    let run = |fail_on_pending: bool| {
        let mut cmd = benchgate();
        cmd.arg("compare")
            .arg("--baseline")
            .arg(&base)
            .arg("--candidate")
            .arg(&same)
            .args(["--metric", "perft", "--max-rounds", "6", "--out"])
            .arg(&out);
        if fail_on_pending {
            cmd.arg("--fail-on-pending");
        }
        cmd.assert()
    };

    run(false)
        .success()
        .stdout(predicate::str::contains("perft pending"));
    let receipt = read_receipt(&out);
    assert_eq!(receipt["rounds"], 6);
    assert_eq!(receipt["verdict"]["status"], "inconclusive");

    run(true).code(3);
}

#[test]
fn test_compare_lower_metric_and_glob() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base.sh", &["100", "40"]);
    candidate(temp_dir.path(), "quick.sh", &["100", "20"]);
    let pattern = temp_dir.path().join("*.sh");
    let out = temp_dir.path().join("compare.json");

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidates-glob")
        .arg(&pattern)
        .args(["--metric", "score", "--metric", "latency_ms:lower", "--max-rounds", "5"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let receipt = read_receipt(&out);
    let candidates = receipt["candidates"].as_object().expect("candidates map");
    assert_eq!(candidates.len(), 1, "baseline must not be its own candidate");
    let quick = candidates.values().next().expect("one candidate");
    assert_eq!(quick["metrics"]["latency_ms"]["status"], "accepted");
    assert_eq!(quick["metrics"]["latency_ms"]["history"]["summary"]["mean"], 20.0);
    assert_eq!(quick["metrics"]["score"]["status"], "pending");
}

#[test]
fn test_compare_malformed_output_fails_without_receipt() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["1000"]);
    let bad = candidate(temp_dir.path(), "bad", &["not-a-number"]);
    let out = temp_dir.path().join("compare.json");

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidate")
        .arg(&bad)
        .args(["--metric", "perft", "--out"])
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("expected an integer"));

    assert!(!out.exists());
}

#[test]
fn test_compare_missing_executable_is_a_config_error() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["1000"]);
    let out = temp_dir.path().join("compare.json");

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidate")
        .arg(temp_dir.path().join("missing"))
        .args(["--metric", "perft", "--out"])
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing"));

    assert!(!out.exists());
}

#[test]
fn test_compare_rejects_min_rounds_below_floor() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["1"]);
    let other = candidate(temp_dir.path(), "other", &["2"]);

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidate")
        .arg(&other)
        .args(["--metric", "perft", "--min-rounds", "3"])
        .current_dir(temp_dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("min_rounds"));
}

#[test]
fn test_compare_timeout_aborts() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let base = candidate(temp_dir.path(), "base", &["1"]);
    let hang = temp_dir.path().join("hang");
    // No exec: the sleeping grandchild inherits stdout.
    fs::write(&hang, "#!/bin/sh\nsleep 10\necho 1\n").expect("write script");
    fs::set_permissions(&hang, fs::Permissions::from_mode(0o755)).expect("chmod");

    benchgate()
        .arg("compare")
        .arg("--baseline")
        .arg(&base)
        .arg("--candidate")
        .arg(&hang)
        .args(["--metric", "perft", "--timeout", "200ms"])
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(5))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timed out"));
}
