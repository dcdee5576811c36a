//! 上位机监管
//!
//! # 核心功能
//!
//! - 解析并应用上位机命令，生成应答
//! - 维护控制权模式（NORMAL：上位机直接下发指令；CORNER：设备自主分级）
//! - 心跳监测：首个 `HB` 之后才布防，超时即进入故障安全（强制制动），
//!   每个超时周期重复一次 `EVENT BRAKE`，直到收到新的 `HB`
//! - 控制权仲裁：任意时刻执行器目标只来自一个权威
//!
//! # 仲裁优先级
//!
//! 1. 故障安全（无视模式）
//! 2. NORMAL：最近一次 `CMD`
//! 3. CORNER：风险分级器（叠加 `SPD_CAP` 限速）
//!
//! 调试注入（`DBG_DIST` / `DBG_SPEED`）只在配置开启时接受，
//! 注入值覆盖传感器读数，直到下一条 `MODE` 命令撤销。

use crate::ControllerConfig;
use brakeguard_driver::HeartbeatMonitor;
use brakeguard_protocol::{
    BrakeDirective, ControlMode, DeviceMessage, DistanceSample, HostCommand, ProtocolError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 当前执行器目标的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    Host,
    Classifier,
    Failsafe,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Authority::Host => "host",
            Authority::Classifier => "classifier",
            Authority::Failsafe => "failsafe",
        };
        f.write_str(s)
    }
}

/// 一条命令的应用结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub ack: DeviceMessage,
    /// 需要清零滞回计数器和制动锁存
    pub reset_classifier: bool,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    mode: ControlMode,
    speed_cap_kmh: u32,
    host_directive: BrakeDirective,
    heartbeat: HeartbeatMonitor,
    failsafe_active: bool,
    debug_injection: bool,
    speed_cap_tolerance_kmh: f64,
    injected_distance: Option<DistanceSample>,
    injected_speed_mps: Option<f64>,
}

impl Supervisor {
    pub fn new(
        boot_mode: ControlMode,
        heartbeat_timeout: Duration,
        debug_injection: bool,
        speed_cap_tolerance_kmh: f64,
    ) -> Self {
        Self {
            mode: boot_mode,
            speed_cap_kmh: 0,
            host_directive: BrakeDirective::Safe,
            heartbeat: HeartbeatMonitor::new(heartbeat_timeout),
            failsafe_active: false,
            debug_injection,
            speed_cap_tolerance_kmh,
            injected_distance: None,
            injected_speed_mps: None,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.control.boot_mode,
            config.heartbeat_timeout(),
            config.link.debug_injection,
            config.link.speed_cap_tolerance_kmh,
        )
    }

    /// 解析并应用一行命令
    ///
    /// 未知命令、参数无效、或未开启注入时的调试命令都返回错误，调用方丢弃该行且不应答。
    pub fn handle_line(&mut self, line: &str, now: Instant) -> Result<Applied, ProtocolError> {
        let command = HostCommand::parse(line)?;
        if command.is_debug() && !self.debug_injection {
            return Err(ProtocolError::UnknownCommand(command.keyword().to_string()));
        }
        Ok(self.apply(command, now))
    }

    /// 应用一条已解析的命令
    pub fn apply(&mut self, command: HostCommand, now: Instant) -> Applied {
        let mut reset_classifier = false;

        match command {
            HostCommand::Mode(mode) => {
                if mode != self.mode {
                    info!("Control mode {} -> {}", self.mode, mode);
                }
                self.mode = mode;
                self.clear_injection();
                reset_classifier = true;
            },
            HostCommand::Cmd(directive) => {
                debug!("Host directive: {}", directive);
                self.host_directive = directive;
            },
            HostCommand::SpeedCap(kmh) => {
                debug!("Speed cap: {} km/h", kmh);
                self.speed_cap_kmh = kmh;
            },
            HostCommand::Heartbeat => {
                if !self.heartbeat.is_armed() {
                    info!("First heartbeat received, fail-safe armed");
                }
                if self.failsafe_active {
                    info!("Heartbeat restored, leaving fail-safe");
                    self.failsafe_active = false;
                }
                self.heartbeat.register(now);
            },
            HostCommand::DebugDistance(mm) => {
                self.injected_distance = Some(DistanceSample::from_millimeters(mm));
            },
            HostCommand::DebugSpeed(kmh) => {
                self.injected_speed_mps = Some(kmh / 3.6);
            },
        }

        Applied {
            ack: DeviceMessage::Ack(command),
            reset_classifier,
        }
    }

    /// 检查心跳，返回本周期是否触发故障安全
    pub fn check_heartbeat(&mut self, now: Instant) -> bool {
        if self.heartbeat.check(now) {
            warn!(
                "Host heartbeat lost (> {:?}), forcing brake",
                self.heartbeat.timeout()
            );
            self.failsafe_active = true;
            return true;
        }
        false
    }

    /// 限速判定：CORNER 模式下超过限速 + 容差时至少 `Slow`
    pub fn speed_cap_directive(&self, speed_mps: f64) -> Option<BrakeDirective> {
        if self.mode != ControlMode::Corner || self.speed_cap_kmh == 0 {
            return None;
        }
        let speed_kmh = speed_mps * 3.6;
        (speed_kmh > self.speed_cap_kmh as f64 + self.speed_cap_tolerance_kmh)
            .then_some(BrakeDirective::Slow)
    }

    /// 仲裁执行器指令
    ///
    /// `autonomous` 是 CORNER 模式下分级器（含限速）给出的指令。
    pub fn arbitrate(&self, autonomous: Option<BrakeDirective>) -> (Authority, BrakeDirective) {
        if self.failsafe_active {
            return (Authority::Failsafe, BrakeDirective::Brake);
        }
        match self.mode {
            ControlMode::Normal => (Authority::Host, self.host_directive),
            ControlMode::Corner => (
                Authority::Classifier,
                autonomous.unwrap_or(BrakeDirective::Safe),
            ),
        }
    }

    /// 撤销调试注入，恢复使用传感器读数
    pub fn clear_injection(&mut self) {
        if self.injected_distance.is_some() || self.injected_speed_mps.is_some() {
            debug!("Debug injection cleared");
        }
        self.injected_distance = None;
        self.injected_speed_mps = None;
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn speed_cap_kmh(&self) -> u32 {
        self.speed_cap_kmh
    }

    pub fn host_directive(&self) -> BrakeDirective {
        self.host_directive
    }

    pub fn heartbeat_armed(&self) -> bool {
        self.heartbeat.is_armed()
    }

    pub fn failsafe_active(&self) -> bool {
        self.failsafe_active
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.heartbeat.last_heartbeat()
    }

    pub fn injected_distance(&self) -> Option<DistanceSample> {
        self.injected_distance
    }

    pub fn injected_speed_mps(&self) -> Option<f64> {
        self.injected_speed_mps
    }
}
