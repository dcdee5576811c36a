//! 闭环仿真集成测试

use brakeguard_control::Authority;
use brakeguard_protocol::{BrakeDirective, ControlMode};
use brakeguard_tools::{Scenario, SimulationConfig, load_trace, run_simulation, save_trace};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_approach_in_corner_mode_brakes_early() {
    let config = SimulationConfig {
        scenario: Scenario::Approach,
        duration: Duration::from_secs(5),
        ..Default::default()
    };
    let result = run_simulation(&config).unwrap();
    let summary = &result.summary;

    assert_eq!(summary.ticks, 250);
    let first_brake = summary.first_brake_ms.expect("approach should brake");
    assert!(first_brake < 1000, "first brake at {} ms", first_brake);
    assert!(summary.brake_events >= 1);
    assert!(summary.metrics.latch_engagements >= 1);
    assert!(summary.final_speed_mps < summary.initial_speed_mps);

    // 心跳正常时全程由分级器控制
    for record in result.records.iter().skip(1) {
        assert_eq!(record.authority, Authority::Classifier);
    }
}

#[test]
fn test_normal_mode_without_host_command_never_brakes() {
    let config = SimulationConfig {
        scenario: Scenario::Approach,
        duration: Duration::from_secs(3),
        mode: ControlMode::Normal,
        ..Default::default()
    };
    let result = run_simulation(&config).unwrap();

    assert_eq!(result.summary.first_brake_ms, None);
    assert_eq!(result.summary.brake_events, 0);
    assert_eq!(result.summary.final_speed_mps, 2.0);
    assert!(
        result
            .records
            .iter()
            .all(|r| r.directive == BrakeDirective::Safe && r.state.is_none())
    );
}

#[test]
fn test_heartbeat_loss_forces_brake() {
    let config = SimulationConfig {
        scenario: Scenario::Cruise,
        duration: Duration::from_secs(10),
        mode: ControlMode::Normal,
        heartbeat_loss_at: Some(Duration::from_millis(2000)),
        ..Default::default()
    };
    let result = run_simulation(&config).unwrap();
    let summary = &result.summary;

    // 最后一次心跳在 1500ms，超时 1500ms
    assert_eq!(summary.first_brake_ms, Some(3020));
    assert_eq!(summary.brake_events, 5);
    assert_eq!(summary.metrics.failsafe_triggers, 5);
    assert!(
        result
            .records
            .iter()
            .filter(|r| r.t_ms >= 3020)
            .all(|r| r.authority == Authority::Failsafe)
    );
    assert_eq!(summary.final_speed_mps, 0.0);
}

#[test]
fn test_unarmed_heartbeat_never_fails_safe() {
    let config = SimulationConfig {
        scenario: Scenario::Cruise,
        duration: Duration::from_secs(5),
        mode: ControlMode::Normal,
        heartbeat_interval: None,
        ..Default::default()
    };
    let result = run_simulation(&config).unwrap();
    assert_eq!(result.summary.metrics.failsafe_triggers, 0);
    assert_eq!(result.summary.first_brake_ms, None);
}

#[test]
fn test_dropout_is_reproducible_and_survives_garbage() {
    let config = SimulationConfig {
        scenario: Scenario::Dropout,
        duration: Duration::from_secs(4),
        seed: 11,
        ..Default::default()
    };
    let a = run_simulation(&config).unwrap();
    let b = run_simulation(&config).unwrap();

    assert_eq!(a.records, b.records);
    assert!(a.summary.metrics.frames_invalid > 0);
    assert!(a.summary.metrics.frames_decoded > 0);
    // 缺帧不会让距离消失
    assert!(a.records.iter().skip(5).all(|r| r.distance_m.is_some()));
}

#[test]
fn test_trace_roundtrip_through_file() {
    let config = SimulationConfig {
        duration: Duration::from_secs(1),
        ..Default::default()
    };
    let result = run_simulation(&config).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.jsonl");
    save_trace(&result.records, &path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), result.records.len());
    assert!(content.lines().next().unwrap().contains("\"READY\""));

    let loaded = load_trace(&path).unwrap();
    assert_eq!(loaded.len(), result.records.len());
    for (a, b) in loaded.iter().zip(&result.records) {
        assert_eq!(a.t_ms, b.t_ms);
        assert_eq!(a.directive, b.directive);
        assert_eq!(a.authority, b.authority);
        assert_eq!(a.events, b.events);
        assert_eq!(a.ttc_s.is_some(), b.ttc_s.is_some());
    }
}

#[test]
fn test_load_trace_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jsonl");
    std::fs::write(&path, "{\"t_ms\": 0}\nnot json\n").unwrap();
    assert!(load_trace(&path).is_err());
    assert!(load_trace(dir.path().join("missing.jsonl")).is_err());
}
