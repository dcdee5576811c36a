//! # 闭环仿真
//!
//! 用真实的 [`Controller`] 跑一个虚拟时钟上的闭环：
//!
//! - 场景曲线 → 测距传感器字节流（经 `MockTransport`）
//! - 车辆模型按执行器位置减速，行驶距离换算成轮速边沿写入 `EdgeCounter`
//! - 上位机侧按需发送 `MODE` 与周期性 `HB`，可在指定时刻停止心跳
//!
//! 每个控制周期记录一条 [`TraceRecord`]，可保存为 JSON lines。

use crate::scenario::{FeedEvent, Scenario, SensorFeed};
use anyhow::{Context, Result};
use brakeguard_control::{
    Authority, ControlError, Controller, ControllerConfig, RiskState, TickReport,
};
use brakeguard_driver::{ActuatorPositions, EdgeCounter, MetricsSnapshot, NullServo};
use brakeguard_io::MockTransport;
use brakeguard_protocol::{BrakeDirective, ControlMode, DeviceMessage};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 执行器处于制动位时的车辆减速度（m/s²）
pub const BRAKE_DECEL_MPS2: f64 = 3.0;

/// 仿真使用的每圈磁铁数（提高轮速分辨率）
const SIM_MAGNETS_PER_REVOLUTION: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub scenario: Scenario,
    pub duration: Duration,
    pub initial_speed_mps: f64,
    pub seed: u64,
    /// 仿真开始时通过 `MODE` 命令设置的模式
    pub mode: ControlMode,
    /// 心跳间隔，`None` 表示从不发送（故障安全不布防）
    pub heartbeat_interval: Option<Duration>,
    /// 从该时刻起停止发送心跳
    pub heartbeat_loss_at: Option<Duration>,
    /// 传感器出帧间隔
    pub sensor_interval: Duration,
    pub controller: ControllerConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let mut controller = ControllerConfig::default();
        controller.speed.magnets_per_revolution = SIM_MAGNETS_PER_REVOLUTION;
        Self {
            scenario: Scenario::Approach,
            duration: Duration::from_secs(10),
            initial_speed_mps: 2.0,
            seed: 0,
            mode: ControlMode::Corner,
            heartbeat_interval: Some(Duration::from_millis(500)),
            heartbeat_loss_at: None,
            sensor_interval: Duration::from_millis(10),
            controller,
        }
    }
}

/// 单个控制周期的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub t_ms: u64,
    pub distance_m: Option<f64>,
    /// 控制器估计的速度
    pub speed_mps: f64,
    /// 车辆模型的真实速度
    pub vehicle_speed_mps: f64,
    /// 无穷大（无碰撞风险）记为 `None`
    pub ttc_s: Option<f64>,
    /// 仅 CORNER 模式下有值
    pub state: Option<RiskState>,
    pub authority: Authority,
    pub directive: BrakeDirective,
    pub position_deg: f64,
    /// 本周期发出的非遥测消息
    pub events: Vec<String>,
}

impl TraceRecord {
    fn from_report(t_ms: u64, vehicle_speed_mps: f64, report: &TickReport) -> Self {
        let ttc = report.ttc_s();
        Self {
            t_ms,
            distance_m: report.distance_m,
            speed_mps: report.speed_mps,
            vehicle_speed_mps,
            ttc_s: ttc.is_finite().then_some(ttc),
            state: report.assessment.map(|a| a.state),
            authority: report.authority,
            directive: report.directive,
            position_deg: report.position_deg,
            events: report
                .messages
                .iter()
                .filter(|m| {
                    !matches!(m, DeviceMessage::Speed { .. } | DeviceMessage::Distance { .. })
                })
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub scenario: Scenario,
    pub ticks: usize,
    pub duration_ms: u64,
    pub brake_events: usize,
    /// 第一次给出 `Brake` 指令的时刻
    pub first_brake_ms: Option<u64>,
    /// 车辆停止的时刻
    pub stopped_at_ms: Option<u64>,
    pub min_distance_m: Option<f64>,
    pub initial_speed_mps: f64,
    pub final_speed_mps: f64,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub records: Vec<TraceRecord>,
    pub summary: SimulationSummary,
}

/// 车辆纵向模型
#[derive(Debug, Clone)]
struct Vehicle {
    speed_mps: f64,
    meters_per_edge: f64,
    pending_m: f64,
}

impl Vehicle {
    fn new(speed_mps: f64, config: &ControllerConfig) -> Self {
        Self {
            speed_mps: speed_mps.max(0.0),
            meters_per_edge: config.speed.wheel_circumference_m
                / config.speed.magnets_per_revolution as f64,
            pending_m: 0.0,
        }
    }

    /// 前进 `dt`，把经过的磁铁写成边沿
    fn step(&mut self, dt: Duration, brake_fraction: f64, edges: &EdgeCounter) {
        let dt = dt.as_secs_f64();
        self.speed_mps = (self.speed_mps - BRAKE_DECEL_MPS2 * brake_fraction * dt).max(0.0);
        self.pending_m += self.speed_mps * dt;
        while self.pending_m >= self.meters_per_edge {
            edges.record_edge();
            self.pending_m -= self.meters_per_edge;
        }
    }
}

/// 执行器位置 → 制动比例（Safe 位为 0，Brake 位为 1）
fn brake_fraction(position_deg: f64, positions: &ActuatorPositions) -> f64 {
    let span = positions.brake_deg - positions.safe_deg;
    if span.abs() < f64::EPSILON {
        return 0.0;
    }
    ((position_deg - positions.safe_deg) / span).clamp(0.0, 1.0)
}

/// 运行一次仿真
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult, ControlError> {
    let (sensor, sensor_peer) = MockTransport::pair();
    let (host, host_peer) = MockTransport::pair();
    let edges = Arc::new(EdgeCounter::new());
    let start = Instant::now();

    let mut controller = Controller::new(
        config.controller.clone(),
        sensor,
        host,
        NullServo,
        Arc::clone(&edges),
        start,
    )?;

    let period = config.controller.period();
    let positions = config.controller.actuator.positions();
    let ticks = (config.duration.as_nanos() / period.as_nanos()) as usize;
    let mut feed = SensorFeed::new(config.scenario, config.seed);
    let mut vehicle = Vehicle::new(config.initial_speed_mps, &config.controller);

    info!(
        "Simulating '{}' for {:?} at {:.2} m/s ({} ticks, mode {})",
        config.scenario, config.duration, config.initial_speed_mps, ticks, config.mode
    );

    host_peer.send_line(&format!("MODE {}", config.mode));

    let mut records = Vec::with_capacity(ticks);
    let mut next_frame = Duration::ZERO;
    let mut next_heartbeat = Duration::ZERO;
    let mut garbled = 0usize;
    let mut missing = 0usize;

    for k in 0..ticks {
        let t = period * k as u32;

        while next_frame <= t {
            match feed.next_frame(next_frame.as_secs_f64()) {
                FeedEvent::Missing => missing += 1,
                event @ FeedEvent::Garbled(_) => {
                    garbled += 1;
                    sensor_peer.send_bytes(event.bytes());
                },
                event => sensor_peer.send_bytes(event.bytes()),
            }
            next_frame += config.sensor_interval;
        }

        if let Some(interval) = config.heartbeat_interval
            && next_heartbeat <= t
            && config.heartbeat_loss_at.is_none_or(|loss| t < loss)
        {
            host_peer.send_line("HB");
            next_heartbeat += interval;
        }

        let report = controller.tick(start + t);
        vehicle.step(period, brake_fraction(report.position_deg, &positions), &edges);

        records.push(TraceRecord::from_report(
            t.as_millis() as u64,
            vehicle.speed_mps,
            &report,
        ));

        // 丢弃设备输出，避免通道无限增长
        host_peer.take_output();
    }

    debug!("Sensor feed: {} garbled, {} missing frames", garbled, missing);

    let summary = summarize(config, &records, controller.metrics().snapshot());
    info!(
        "Simulation done: first brake {:?} ms, stopped at {:?} ms, {} brake events",
        summary.first_brake_ms, summary.stopped_at_ms, summary.brake_events
    );

    Ok(SimulationResult { records, summary })
}

fn summarize(
    config: &SimulationConfig,
    records: &[TraceRecord],
    metrics: MetricsSnapshot,
) -> SimulationSummary {
    let brake_events = records
        .iter()
        .flat_map(|r| r.events.iter())
        .filter(|e| e.as_str() == "EVENT BRAKE")
        .count();

    let min_distance_m = records
        .iter()
        .filter_map(|r| r.distance_m)
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))));

    SimulationSummary {
        scenario: config.scenario,
        ticks: records.len(),
        duration_ms: config.duration.as_millis() as u64,
        brake_events,
        first_brake_ms: records
            .iter()
            .find(|r| r.directive == BrakeDirective::Brake)
            .map(|r| r.t_ms),
        stopped_at_ms: if config.initial_speed_mps > 0.0 {
            records
                .iter()
                .find(|r| r.vehicle_speed_mps == 0.0)
                .map(|r| r.t_ms)
        } else {
            None
        },
        min_distance_m,
        initial_speed_mps: config.initial_speed_mps,
        final_speed_mps: records
            .last()
            .map_or(config.initial_speed_mps, |r| r.vehicle_speed_mps),
        metrics,
    }
}

/// 以 JSON lines 写出轨迹
pub fn write_trace<W: Write>(records: &[TraceRecord], writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for record in records {
        serde_json::to_writer(&mut writer, record).context("序列化轨迹记录失败")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_trace<P: AsRef<Path>>(records: &[TraceRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("无法创建轨迹文件: {}", path.display()))?;
    write_trace(records, file)
}

/// 读取 JSON lines 轨迹（空行忽略）
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceRecord>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("无法打开轨迹文件: {}", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("第 {} 行不是有效的轨迹记录", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brake_fraction() {
        let positions = ActuatorPositions::default();
        assert_eq!(brake_fraction(90.0, &positions), 0.0);
        assert_eq!(brake_fraction(120.0, &positions), 0.5);
        assert_eq!(brake_fraction(150.0, &positions), 1.0);
        assert_eq!(brake_fraction(10.0, &positions), 0.0);

        let flat = ActuatorPositions {
            safe_deg: 90.0,
            slow_deg: 90.0,
            brake_deg: 90.0,
        };
        assert_eq!(brake_fraction(150.0, &flat), 0.0);
    }

    #[test]
    fn test_vehicle_emits_edges_for_distance_travelled() {
        let config = SimulationConfig::default().controller;
        let edges = EdgeCounter::new();
        let mut vehicle = Vehicle::new(2.0, &config);

        // 1 秒行驶 2m，每个边沿 0.0425m
        for _ in 0..50 {
            vehicle.step(Duration::from_millis(20), 0.0, &edges);
        }
        assert_eq!(edges.total(), 47);
        assert_eq!(vehicle.speed_mps, 2.0);

        // 全力制动 1 秒后停车
        for _ in 0..50 {
            vehicle.step(Duration::from_millis(20), 1.0, &edges);
        }
        assert_eq!(vehicle.speed_mps, 0.0);
    }

    #[test]
    fn test_trace_record_omits_telemetry() {
        let report = TickReport {
            distance_m: Some(2.0),
            speed_mps: 0.0,
            assessment: None,
            authority: Authority::Host,
            directive: BrakeDirective::Safe,
            position_deg: 90.0,
            messages: vec![
                DeviceMessage::Ready,
                DeviceMessage::speed_from_mps(0.0),
                DeviceMessage::Distance { mm: 2000 },
                DeviceMessage::EventBrake,
            ],
        };
        let record = TraceRecord::from_report(40, 0.0, &report);
        assert_eq!(record.events, vec!["READY", "EVENT BRAKE"]);
        assert_eq!(record.ttc_s, None);
    }
}
