//! Tests for the `diskmap` binary

use std::path::Path;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn write_input(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("input.txt");
    std::fs::write(&path, contents).unwrap();
    path
}

fn diskmap(path: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_diskmap"))
        .arg(path)
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_cli_prints_both_checksums() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "2333133121414131402\n");

    let output = diskmap(&path, &[]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("fragmenting checksum: 1928"));
    assert!(stdout.contains("whole-extent checksum: 2858"));
}

#[test]
fn test_cli_single_policy_with_layout() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "12345");

    let output = diskmap(&path, &["--policy", "fragmenting", "--show"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("0..111....22222"));
    assert!(stdout.contains("022111222......"));
    assert!(!stdout.contains("whole-extent"));
}

#[test]
fn test_cli_json_output() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "2333133121414131402");

    let output = diskmap(&path, &["--json", "--verify-steps"]);
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["files"], 10);
    assert_eq!(doc["total_blocks"], 42);
    assert_eq!(doc["passes"][0]["checksum"], 1928);
    assert_eq!(doc["passes"][0]["report"]["stopped_early_at"], 6);
    assert_eq!(doc["passes"][1]["report"]["policy"], "whole-extent");
    assert_eq!(doc["passes"][1]["checksum"], 2858);
}

#[test]
fn test_cli_expected_values() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "2333133121414131402");

    let ok = diskmap(
        &path,
        &["--expect-fragmenting", "1928", "--expect-whole-extent", "2858"],
    );
    assert!(ok.status.success());

    let mismatch = diskmap(&path, &["--expect-whole-extent", "2857"]);
    assert!(!mismatch.status.success());
    let stderr = String::from_utf8(mismatch.stderr).unwrap();
    assert!(stderr.contains("checksum mismatch"));
}

#[test]
fn test_cli_rejects_malformed_input() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "1234");

    let output = diskmap(&path, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("even number of digits"));
}

#[test]
fn test_cli_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = diskmap(&dir.path().join("nope.txt"), &[]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_reads_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_diskmap"))
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"2333133121414131402\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("fragmenting checksum: 1928"));
    assert!(stdout.contains("whole-extent checksum: 2858"));
}

#[test]
fn test_cli_policy_names() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "2333133121414131402");

    let output = diskmap(&path, &["--policy", "Whole-Extent"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("whole-extent checksum: 2858"));
    assert!(!stdout.contains("fragmenting"));

    let rejected = diskmap(&path, &["--policy", "defrag"]);
    assert!(!rejected.status.success());
    let stderr = String::from_utf8(rejected.stderr).unwrap();
    assert!(stderr.contains("Invalid policy 'defrag'"));
}
