use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const STUCK_CONFIG: &str = r#"
[timeouts]
idle_ms = 50
idle_poll_ms = 5
"#;

#[rstest]
fn idle_timeout_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, STUCK_CONFIG).unwrap();

    let mut cmd = Command::cargo_bin("plotter").unwrap();
    cmd.env("PLOTTER_TEST_SIM_STUCK", "1");
    cmd.arg("--config").arg(&cfg).arg("move").arg("0.5").arg("0.5");
    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("idle wait timed out"));
}

#[rstest]
fn idle_timeout_json_details() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, STUCK_CONFIG).unwrap();

    let out = Command::cargo_bin("plotter")
        .unwrap()
        .env("PLOTTER_TEST_SIM_STUCK", "1")
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["goto", "1", "1"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(v["reason"], "IdleTimeout");
    assert_eq!(v["details"]["idle_ms"], 50);
    assert!(v["details"]["waited_ms"].as_u64().unwrap() >= 50);
}
