//! 单周期控制逻辑
//!
//! [`Controller`] 持有全部运行状态（无全局变量），每次 [`Controller::tick`]
//! 同步、非阻塞地完成一个控制周期：
//!
//! 1. 读取上位机链路，逐行应用命令（心跳在此生效）
//! 2. 读取传感器字节流并解码，最新的有效帧胜出
//! 3. 轮询速度估计器
//! 4. 心跳检查
//! 5. CORNER 模式下风险分级（叠加限速）
//! 6. 控制权仲裁
//! 7. 执行器斜坡逼近并输出舵机位置
//! 8. 周期性遥测
//! 9. 发布只读快照（`ArcSwap`，观察者无锁读取）

use crate::risk::{Assessment, LatchEvent, RiskClassifier, RiskState, time_to_collision};
use crate::supervisor::{Authority, Supervisor};
use crate::{ControlError, ControllerConfig};
use arc_swap::ArcSwap;
use brakeguard_driver::{
    Actuator, DriverMetrics, EdgeCounter, LineReader, RangeDecoder, ServoOutput, SpeedEstimator,
};
use brakeguard_io::{ByteTransport, IoError};
use brakeguard_protocol::{BrakeDirective, ControlMode, DeviceMessage, DistanceSample};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 单次读取的缓冲大小
const READ_CHUNK: usize = 64;

/// 每周期每条链路最多读取次数
const MAX_READS_PER_TICK: usize = 8;

/// 控制器状态快照（供监控线程读取）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub tick: u64,
    pub mode: ControlMode,
    pub authority: Authority,
    pub directive: BrakeDirective,
    /// 仅 CORNER 模式下有值
    pub risk: Option<RiskState>,
    pub latched: bool,
    pub failsafe_active: bool,
    pub heartbeat_armed: bool,
    pub speed_cap_kmh: u32,
    pub distance_m: Option<f64>,
    pub speed_mps: f64,
    pub position_deg: f64,
    pub target_deg: f64,
}

/// 单周期结果
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// 最近一次有效距离（注入值优先）
    pub distance_m: Option<f64>,
    pub speed_mps: f64,
    pub assessment: Option<Assessment>,
    pub authority: Authority,
    pub directive: BrakeDirective,
    pub position_deg: f64,
    /// 本周期发往上位机的消息（按发送顺序）
    pub messages: Vec<DeviceMessage>,
}

impl TickReport {
    /// 碰撞时间；没有距离时为 +∞
    pub fn ttc_s(&self) -> f64 {
        match (self.assessment, self.distance_m) {
            (Some(a), _) => a.ttc_s,
            (None, Some(d)) => time_to_collision(d, self.speed_mps),
            (None, None) => f64::INFINITY,
        }
    }

    pub fn brake_events(&self) -> usize {
        self.messages.iter().filter(|m| m.is_event()).count()
    }
}

/// 链路健康状态，用于只在状态变化时输出 warn
#[derive(Debug, Clone, Copy)]
struct LinkHealth {
    name: &'static str,
    up: bool,
}

impl LinkHealth {
    fn new(name: &'static str) -> Self {
        Self { name, up: true }
    }

    fn report_error(&mut self, err: &IoError, metrics: &DriverMetrics) {
        DriverMetrics::inc(&metrics.transport_errors);
        if self.up {
            warn!("{} link error: {}", self.name, err);
            self.up = false;
        } else {
            trace!("{} link still failing: {}", self.name, err);
        }
    }

    fn report_ok(&mut self) {
        if !self.up {
            debug!("{} link recovered", self.name);
            self.up = true;
        }
    }
}

pub struct Controller<S, H, O> {
    config: ControllerConfig,
    sensor: S,
    host: H,
    servo: O,
    decoder: RangeDecoder,
    lines: LineReader,
    speed: SpeedEstimator,
    classifier: RiskClassifier,
    supervisor: Supervisor,
    actuator: Actuator,
    metrics: Arc<DriverMetrics>,
    snapshot: Arc<ArcSwap<ControllerSnapshot>>,
    sensor_health: LinkHealth,
    host_health: LinkHealth,
    servo_ok: bool,
    ready_sent: bool,
    next_telemetry: Instant,
    telemetry_interval: Duration,
    ticks: u64,
}

impl<S, H, O> Controller<S, H, O>
where
    S: ByteTransport,
    H: ByteTransport,
    O: ServoOutput,
{
    /// 创建控制器
    ///
    /// 配置会先被校验；`edges` 由轮速中断（或仿真线程）并发累加。
    pub fn new(
        config: ControllerConfig,
        sensor: S,
        host: H,
        servo: O,
        edges: Arc<EdgeCounter>,
        now: Instant,
    ) -> Result<Self, ControlError> {
        config.validate()?;

        let speed = SpeedEstimator::new(edges, config.speed.to_params(), now)?;
        let actuator = Actuator::new(config.actuator.positions(), config.actuator.max_step_deg)?;
        let classifier = config.risk.build_classifier();
        let supervisor = Supervisor::from_config(&config);

        let snapshot = ControllerSnapshot {
            tick: 0,
            mode: supervisor.mode(),
            authority: Authority::Host,
            directive: BrakeDirective::Safe,
            risk: None,
            latched: false,
            failsafe_active: false,
            heartbeat_armed: false,
            speed_cap_kmh: 0,
            distance_m: None,
            speed_mps: 0.0,
            position_deg: actuator.current(),
            target_deg: actuator.target(),
        };

        debug!(
            "Controller ready: mode={} model={} period={:?}",
            supervisor.mode(),
            classifier.model_name(),
            config.period()
        );

        Ok(Self {
            decoder: RangeDecoder::new(config.sensor.checksum, config.sensor.buffer_capacity),
            lines: LineReader::new(config.link.max_line_len),
            telemetry_interval: config.telemetry_interval(),
            next_telemetry: now + config.telemetry_interval(),
            config,
            sensor,
            host,
            servo,
            speed,
            classifier,
            supervisor,
            actuator,
            metrics: Arc::new(DriverMetrics::new()),
            snapshot: Arc::new(ArcSwap::from_pointee(snapshot)),
            sensor_health: LinkHealth::new("Sensor"),
            host_health: LinkHealth::new("Host"),
            servo_ok: true,
            ready_sent: false,
            ticks: 0,
        })
    }

    /// 执行一个控制周期
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.ticks += 1;
        DriverMetrics::inc(&self.metrics.ticks);

        let mut messages = Vec::new();
        if !self.ready_sent {
            messages.push(DeviceMessage::Ready);
            self.ready_sent = true;
        }

        // 1. 上位机命令
        self.poll_host(now, &mut messages);

        // 2. 传感器
        if let Some(sample) = self.poll_sensor() {
            self.classifier.observe_distance(sample);
        }
        if let Some(injected) = self.supervisor.injected_distance() {
            self.classifier.observe_distance(injected);
        }

        // 3. 速度
        let measured = self.speed.poll(now).meters_per_second;
        let speed_mps = self.supervisor.injected_speed_mps().unwrap_or(measured);

        // 4. 心跳
        if self.supervisor.check_heartbeat(now) {
            DriverMetrics::inc(&self.metrics.failsafe_triggers);
            messages.push(DeviceMessage::EventBrake);
        }

        // 5. 自主分级
        let assessment = match self.supervisor.mode() {
            ControlMode::Corner => Some(self.classifier.update(speed_mps)),
            ControlMode::Normal => None,
        };
        if let Some(a) = &assessment
            && a.event == Some(LatchEvent::Engaged)
        {
            DriverMetrics::inc(&self.metrics.latch_engagements);
            messages.push(DeviceMessage::EventBrake);
        }
        let autonomous = assessment.map(|a| {
            let directive = a.directive();
            match self.supervisor.speed_cap_directive(speed_mps) {
                Some(capped) => directive.max(capped),
                None => directive,
            }
        });

        // 6. 仲裁
        let (authority, directive) = self.supervisor.arbitrate(autonomous);

        // 7. 执行器
        self.actuator.command(directive);
        let position_deg = self.actuator.tick();
        self.write_servo(position_deg);

        // 8. 遥测
        let distance_m = self.classifier.last_distance_m();
        if now >= self.next_telemetry {
            messages.push(DeviceMessage::speed_from_mps(speed_mps));
            if let Some(d) = distance_m {
                messages.push(DeviceMessage::distance_from_m(d));
            }
            self.next_telemetry = now + self.telemetry_interval;
        }

        self.send_messages(&messages);

        // 9. 快照
        self.snapshot.store(Arc::new(ControllerSnapshot {
            tick: self.ticks,
            mode: self.supervisor.mode(),
            authority,
            directive,
            risk: assessment.map(|a| a.state),
            latched: self.classifier.is_latched(),
            failsafe_active: self.supervisor.failsafe_active(),
            heartbeat_armed: self.supervisor.heartbeat_armed(),
            speed_cap_kmh: self.supervisor.speed_cap_kmh(),
            distance_m,
            speed_mps,
            position_deg,
            target_deg: self.actuator.target(),
        }));

        trace!(
            "tick {}: {} {} d={:?} v={:.2} pos={:.1}",
            self.ticks, authority, directive, distance_m, speed_mps, position_deg
        );

        TickReport {
            distance_m,
            speed_mps,
            assessment,
            authority,
            directive,
            position_deg,
            messages,
        }
    }

    fn poll_host(&mut self, now: Instant, messages: &mut Vec<DeviceMessage>) {
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_TICK {
            match self.host.read_available(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.host_health.report_ok();
                    let overlong = self.lines.push(&buf[..n]);
                    DriverMetrics::add(&self.metrics.lines_overlong, overlong as u64);
                },
                Err(e) => {
                    self.host_health.report_error(&e, &self.metrics);
                    break;
                },
            }
        }

        while let Some(line) = self.lines.next_line() {
            match self.supervisor.handle_line(&line, now) {
                Ok(applied) => {
                    DriverMetrics::inc(&self.metrics.lines_accepted);
                    if applied.reset_classifier {
                        self.classifier.reset();
                    }
                    messages.push(applied.ack);
                },
                Err(e) => {
                    DriverMetrics::inc(&self.metrics.lines_rejected);
                    warn!("Dropping host line {:?}: {}", line, e);
                },
            }
        }
    }

    /// 读取并解码传感器数据，返回本周期最新的有效采样
    fn poll_sensor(&mut self) -> Option<DistanceSample> {
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_TICK {
            match self.sensor.read_available(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.sensor_health.report_ok();
                    let dropped = self.decoder.extend(&buf[..n]);
                    DriverMetrics::add(&self.metrics.sensor_bytes_dropped, dropped as u64);
                },
                Err(e) => {
                    self.sensor_health.report_error(&e, &self.metrics);
                    break;
                },
            }
        }

        // 重同步尝试每次只消耗 1 字节，次数受缓冲容量约束；有效帧数受配置约束
        let mut latest = None;
        let mut decoded = 0;
        while decoded < self.config.control.max_decodes_per_tick {
            let Some(sample) = self.decoder.decode() else {
                break;
            };
            if sample.valid {
                DriverMetrics::inc(&self.metrics.frames_decoded);
                latest = Some(sample);
                decoded += 1;
            } else {
                DriverMetrics::inc(&self.metrics.frames_invalid);
            }
        }
        latest
    }

    fn write_servo(&mut self, degrees: f64) {
        match self.servo.write_position(degrees) {
            Ok(()) => self.servo_ok = true,
            Err(e) => {
                DriverMetrics::inc(&self.metrics.transport_errors);
                if self.servo_ok {
                    warn!("Servo write failed: {}", e);
                }
                self.servo_ok = false;
            },
        }
    }

    fn send_messages(&mut self, messages: &[DeviceMessage]) {
        for message in messages {
            let line = message.to_string();
            match self.host.write_line(&line) {
                Ok(()) => self.host_health.report_ok(),
                Err(e) => {
                    self.host_health.report_error(&e, &self.metrics);
                    break;
                },
            }
        }
    }

    pub fn metrics(&self) -> Arc<DriverMetrics> {
        Arc::clone(&self.metrics)
    }

    /// 快照句柄（可跨线程共享）
    pub fn snapshot_handle(&self) -> Arc<ArcSwap<ControllerSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    pub fn snapshot(&self) -> Arc<ControllerSnapshot> {
        self.snapshot.load_full()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn edges(&self) -> &Arc<EdgeCounter> {
        self.speed.counter()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
