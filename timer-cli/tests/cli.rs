//! End-to-end tests for the bgtimer binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bgtimer() -> Command {
    let mut cmd = Command::cargo_bin("bgtimer").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn code_prints_session_code() {
    bgtimer()
        .arg("code")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Session code: [A-Z0-9]{6}").unwrap())
        .stdout(predicate::str::contains("Device ID:"));
}

#[test]
fn offline_play_runs_locally() {
    bgtimer()
        .args(["play", "--offline"])
        .write_stdin("add Dave\nstatus\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("added participant 3"))
        .stdout(predicate::str::contains("Dave"))
        .stdout(predicate::str::contains("offline"));
}

#[test]
fn hosted_play_shares_code() {
    bgtimer()
        .arg("play")
        .write_stdin("share\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("(host, connected"))
        .stdout(predicate::str::contains("Share this ID"));
}

#[test]
fn joining_unknown_session_falls_back_to_local() {
    bgtimer()
        .args(["play", "--join", " abc123 "])
        .write_stdin("share\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session: ABC123 (participant, error"))
        .stdout(predicate::str::contains("Running in local mode"));
}

#[test]
fn bad_input_is_reported_not_fatal() {
    bgtimer()
        .args(["play", "--offline"])
        .write_stdin("dance\nstart 9\nremove 1\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown command: dance"))
        .stdout(predicate::str::contains("ignored: no such participant"))
        .stdout(predicate::str::contains("ignored: cannot remove"));
}

#[test]
fn demo_shows_both_views() {
    bgtimer()
        .args(["demo", "--seconds", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Host view"))
        .stdout(predicate::str::contains("Participant view"))
        .stdout(predicate::str::contains("Title:   Demo game").count(2));
}

#[test]
fn missing_config_fails() {
    bgtimer()
        .args(["--config", "/nonexistent/bgtimer.toml", "code"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn config_sets_countdown_mode() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[timer]\nmode = \"countdown\"\ninitial_seconds = 600").unwrap();

    bgtimer()
        .arg("--config")
        .arg(file.path())
        .args(["play", "--offline"])
        .write_stdin("quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("countdown (not started)"))
        .stdout(predicate::str::contains("10:00"));
}
