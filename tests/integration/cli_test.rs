//! End-to-end tests of the ktrace binary against a sample session
//!
//! Every test runs with its own HOME so the default log directory
//! (~/.kali-logs) and config (~/.config/ktrace) are scratch copies.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use crate::helpers::temp_home;

fn ktrace(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ktrace").unwrap();
    cmd.env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("KTRACE_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("bookmark"));
}

#[test]
fn list_shows_sessions() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("box1.ktr"))
        .stdout(predicate::str::contains("in 1 sessions"));
}

#[test]
fn list_with_no_sessions() {
    let home = tempfile::TempDir::new().unwrap();
    ktrace(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("No sessions found"));
}

#[test]
fn search_defaults_to_case_insensitive() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["search", "box1", "error"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Error: Permission denied"))
        .stdout(predicate::str::contains("[segment 3]"))
        .stdout(predicate::str::ends_with("1 matching event(s)\n"));

    ktrace(home.path())
        .args(["search", "box1", "error", "--case-sensitive"])
        .assert()
        .success()
        .stdout("0 matching event(s)\n");
}

#[test]
fn search_json_lines() {
    let (home, _) = temp_home();
    let output = ktrace(home.path())
        .args(["search", "latest", "nmap", "--json", "--raw"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let hits: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let seqs: Vec<u64> = hits.iter().map(|h| h["seq"].as_u64().unwrap()).collect();
    assert_eq!(seqs, vec![1, 2, 5]);
    assert!(hits.iter().all(|h| h.get("segment").is_none()));
}

#[test]
fn invalid_regex_is_reported() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["search", "box1", "(", "--regex"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid search pattern"));
}

#[test]
fn unknown_log_is_reported() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["stats", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Log not found: nope"));
}

#[test]
fn stats_json() {
    let (home, _) = temp_home();
    let output = ktrace(home.path()).args(["stats", "box1", "--json"]).output().unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["duration_ns"], 9_500_000_000u64);
    assert_eq!(summary["counts"]["input_events"], 3);
    assert_eq!(summary["segments"], 4);
    assert_eq!(summary["top_commands"][0]["key"], "nmap");
    assert_eq!(summary["ips"][0], "10.10.10.5");
}

#[test]
fn freq_and_ips() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["freq", "box1", "-n", "1"])
        .assert()
        .success()
        .stdout("     2  nmap\n");
    ktrace(home.path())
        .args(["ips", "box1"])
        .assert()
        .success()
        .stdout("10.10.10.5\n");
}

#[test]
fn clean_view_of_sample_session() {
    let (home, _) = temp_home();
    let output = ktrace(home.path()).args(["clean", "box1"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout.trim_end(), @r"
    [2024-05-17 10:00:00] Welcome to box
    [2024-05-17 10:00:01] $ nmap -sV 10.10.10.5
    [2024-05-17 10:00:01] Starting Nmap
    [2024-05-17 10:00:01] 22/tcp open ssh
    [2024-05-17 10:00:01] Host 10.10.10.5 is up
    [2024-05-17 10:00:05] $ cat /etc/hostname
    [2024-05-17 10:00:05] kali
    [2024-05-17 10:00:09] $ Error: Permission denied
    [2024-05-17 10:00:09] $
    ");
}

#[test]
fn show_prints_header_and_events() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["show", "box1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Session: /bin/bash started 2024-05-17 10:00:00"))
        .stdout(predicate::str::contains("     3      +5.000s IN  cat /etc/hostname"))
        .stdout(predicate::str::ends_with("Closed cleanly, 7 events\n"));
}

#[test]
fn bookmark_lifecycle() {
    let (home, log) = temp_home();
    ktrace(home.path())
        .args(["bookmark", "add", "box1", "4", "hostname found"])
        .assert()
        .success()
        .stdout("Bookmarked event 4\n");
    assert!(log.with_file_name("box1.ktr.bookmarks.json").exists());

    ktrace(home.path())
        .args(["bookmark", "add", "box1", "99", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no event with sequence number 99"));

    ktrace(home.path())
        .args(["bookmark", "list", "box1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hostname found"));

    let output = ktrace(home.path())
        .args(["export", "box1", "--bookmarked"])
        .output()
        .unwrap();
    let text = String::from_utf8(output.stdout).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains(r#""note":"hostname found""#));

    ktrace(home.path())
        .args(["bookmark", "remove", "box1", "4"])
        .assert()
        .success();
    ktrace(home.path())
        .args(["bookmark", "remove", "box1", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No bookmark on event 4"));
}

#[test]
fn export_then_import_restores_the_events() {
    let (home, log) = temp_home();
    let export = home.path().join("box1.jsonl");
    let restored = home.path().join("restored.ktr");

    ktrace(home.path())
        .args(["export", "box1", "-o"])
        .arg(&export)
        .assert()
        .success()
        .stderr(predicate::str::contains("Exported 7 event(s)"));
    ktrace(home.path())
        .arg("import")
        .arg(&export)
        .arg(&restored)
        .assert()
        .success();

    let original = ktrace::LogParser::new(&log).parse().unwrap();
    let copy = ktrace::LogParser::new(&restored).parse().unwrap();
    assert_eq!(copy.events, original.events);
}

#[test]
fn verify_reports_clean_and_corrupt_logs() {
    let (home, log) = temp_home();
    ktrace(home.path())
        .args(["verify", "box1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 records, closed cleanly"))
        .stdout(predicate::str::ends_with("OK\n"));

    let contents = std::fs::read_to_string(&log).unwrap();
    std::fs::write(&log, contents.replacen("\n1\t", "\nX\t", 1)).unwrap();
    ktrace(home.path())
        .args(["verify", "box1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Corrupt: corrupt log at line 3"));
}

#[test]
fn config_commands() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with(".config/ktrace/config.toml\n"));
    ktrace(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[capture]"))
        .stdout(predicate::str::contains("idle_gap_ms = 50"));
}

#[test]
fn invalid_config_is_reported() {
    let (home, _) = temp_home();
    let dir = home.path().join(".config").join("ktrace");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[analysis]\ntop_n = 0\n").unwrap();
    ktrace(home.path())
        .args(["stats", "box1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("top_n"));
}

#[test]
fn completions_for_bash() {
    let (home, _) = temp_home();
    ktrace(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ktrace"));
}
