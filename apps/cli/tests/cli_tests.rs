//! CLI 集成测试

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("brakeguard-cli").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_init_check_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    cli()
        .args(["config", "init"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    // 第二次写入需要 --force
    cli().args(["config", "init"]).arg(&path).assert().failure();

    cli()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("stopping_distance"));

    cli()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[link]"))
        .stdout(predicate::str::contains("heartbeat_timeout_ms = 1500"));
}

#[test]
fn test_config_check_rejects_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[link]\nheartbeat_timeout_ms = 5000\n").unwrap();

    cli()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("heartbeat_timeout_ms"));
}

#[test]
fn test_simulate_json_summary() {
    let dir = TempDir::new().unwrap();
    let trace = dir.path().join("trace.jsonl");

    let output = cli()
        .args([
            "simulate",
            "--scenario",
            "approach",
            "--duration-s",
            "3",
            "--mode",
            "corner",
            "--json",
            "--output",
        ])
        .arg(&trace)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["scenario"], "approach");
    assert_eq!(summary["ticks"], 150);
    assert!(summary["first_brake_ms"].is_u64());

    let lines = std::fs::read_to_string(&trace).unwrap().lines().count();
    assert_eq!(lines, 150);
}

#[test]
fn test_simulate_heartbeat_loss() {
    let output = cli()
        .args([
            "simulate",
            "--scenario",
            "cruise",
            "--mode",
            "normal",
            "--duration-s",
            "5",
            "--heartbeat-loss-s",
            "2",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["first_brake_ms"], 3020);
}

#[test]
fn test_simulate_rejects_unknown_scenario() {
    cli()
        .args(["simulate", "--scenario", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scenario"));
}

#[test]
fn test_stats_json() {
    let output = cli()
        .args(["stats", "--trials", "50", "--seed", "1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["trials"], 50);
}

#[test]
fn test_stats_rejects_zero_trials() {
    cli().args(["stats", "--trials", "0"]).assert().failure();
}

#[test]
fn test_run_corner_boot_without_wheel_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corner.toml");
    std::fs::write(&path, "[control]\nboot_mode = \"corner\"\n").unwrap();

    // 在打开任何串口之前拒绝启动
    cli()
        .args([
            "run",
            "--sensor",
            "/dev/brakeguard-missing-sensor",
            "--host",
            "/dev/brakeguard-missing-host",
            "--config",
        ])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--wheel"))
        .stderr(predicate::str::contains("missing-sensor").not());
}

#[test]
fn test_run_with_wheel_opens_wheel_port() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corner.toml");
    std::fs::write(&path, "[control]\nboot_mode = \"corner\"\n").unwrap();

    // 指定 --wheel 后通过检查，失败来自串口打开
    cli()
        .args([
            "run",
            "--sensor",
            "/dev/brakeguard-missing-sensor",
            "--host",
            "/dev/brakeguard-missing-host",
            "--wheel",
            "/dev/brakeguard-missing-wheel",
            "--config",
        ])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing-sensor"));
}
