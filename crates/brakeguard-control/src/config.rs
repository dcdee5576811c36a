//! 控制器配置
//!
//! 所有段都有默认值，TOML 文件只需要写出要覆盖的字段：
//!
//! ```toml
//! [control]
//! period_ms = 20
//! boot_mode = "corner"
//!
//! [speed]
//! magnets_per_revolution = 4
//! wheel_circumference_m = 0.68
//!
//! [risk]
//! model = "fixed"
//!
//! [link]
//! heartbeat_timeout_ms = 1000
//! ```

use crate::ControlError;
use crate::risk::{
    DEFAULT_MIN_SPEED_MPS, DEFAULT_RELEASE_CONFIRM, FixedThresholds, RiskClassifier, RiskModel,
    RiskModelKind, StoppingDistance,
};
use brakeguard_driver::{ActuatorPositions, SpeedParams};
use brakeguard_protocol::{ChecksumPolicy, ControlMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 控制周期允许范围（毫秒）
pub const PERIOD_RANGE_MS: std::ops::RangeInclusive<u64> = 5..=100;

/// 心跳超时允许范围（毫秒）
pub const HEARTBEAT_RANGE_MS: std::ops::RangeInclusive<u64> = 800..=1500;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub control: ControlSection,
    pub sensor: SensorSection,
    pub speed: SpeedSection,
    pub risk: RiskSection,
    pub actuator: ActuatorSection,
    pub link: LinkSection,
}

/// 控制循环
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSection {
    pub period_ms: u64,
    /// 上电时的控制权模式
    pub boot_mode: ControlMode,
    /// 每周期最多解码的传感器帧数
    pub max_decodes_per_tick: usize,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            period_ms: 20,
            boot_mode: ControlMode::Normal,
            max_decodes_per_tick: 4,
        }
    }
}

/// 测距传感器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    pub checksum: ChecksumPolicy,
    pub buffer_capacity: usize,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            checksum: ChecksumPolicy::Ignore,
            buffer_capacity: 64,
        }
    }
}

/// 轮速
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedSection {
    pub magnets_per_revolution: u32,
    pub wheel_circumference_m: f64,
    pub window_ms: u64,
    /// 指数平滑系数，1.0 表示不平滑
    pub smoothing: f64,
}

impl Default for SpeedSection {
    fn default() -> Self {
        let params = SpeedParams::default();
        Self {
            magnets_per_revolution: params.magnets_per_revolution,
            wheel_circumference_m: params.wheel_circumference_m,
            window_ms: params.window.as_millis() as u64,
            smoothing: params.smoothing,
        }
    }
}

impl SpeedSection {
    pub fn to_params(&self) -> SpeedParams {
        SpeedParams {
            magnets_per_revolution: self.magnets_per_revolution,
            wheel_circumference_m: self.wheel_circumference_m,
            window: Duration::from_millis(self.window_ms),
            smoothing: self.smoothing,
        }
    }
}

/// 风险分级
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    /// 自主模式使用的阈值模型
    pub model: RiskModelKind,
    pub min_speed_mps: f64,
    pub release_confirm: u8,
    pub fixed: FixedThresholds,
    pub stopping_distance: StoppingDistance,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            model: RiskModelKind::default(),
            min_speed_mps: DEFAULT_MIN_SPEED_MPS,
            release_confirm: DEFAULT_RELEASE_CONFIRM,
            fixed: FixedThresholds::default(),
            stopping_distance: StoppingDistance::default(),
        }
    }
}

impl RiskSection {
    pub fn build_classifier(&self) -> RiskClassifier {
        let model: Box<dyn RiskModel> = match self.model {
            RiskModelKind::Fixed => Box::new(self.fixed.clone()),
            RiskModelKind::StoppingDistance => Box::new(self.stopping_distance.clone()),
        };
        RiskClassifier::new(model, self.min_speed_mps, self.release_confirm)
    }
}

/// 执行器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorSection {
    pub safe_deg: f64,
    pub slow_deg: f64,
    pub brake_deg: f64,
    pub max_step_deg: f64,
}

impl Default for ActuatorSection {
    fn default() -> Self {
        let positions = ActuatorPositions::default();
        Self {
            safe_deg: positions.safe_deg,
            slow_deg: positions.slow_deg,
            brake_deg: positions.brake_deg,
            max_step_deg: brakeguard_driver::actuator::DEFAULT_MAX_STEP_DEG,
        }
    }
}

impl ActuatorSection {
    pub fn positions(&self) -> ActuatorPositions {
        ActuatorPositions {
            safe_deg: self.safe_deg,
            slow_deg: self.slow_deg,
            brake_deg: self.brake_deg,
        }
    }
}

/// 上位机链路
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSection {
    pub heartbeat_timeout_ms: u64,
    pub telemetry_interval_ms: u64,
    pub max_line_len: usize,
    /// 是否接受 DBG_DIST / DBG_SPEED 注入
    pub debug_injection: bool,
    /// 限速判定容差（km/h）
    pub speed_cap_tolerance_kmh: f64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 1500,
            telemetry_interval_ms: 1000,
            max_line_len: 64,
            debug_injection: false,
            speed_cap_tolerance_kmh: 0.5,
        }
    }
}

impl ControllerConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ControlError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ControlError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ControlError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.control.period_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.link.heartbeat_timeout_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.link.telemetry_interval_ms)
    }

    /// 校验所有配置项
    pub fn validate(&self) -> Result<(), ControlError> {
        if !PERIOD_RANGE_MS.contains(&self.control.period_ms) {
            return Err(ControlError::invalid(
                "control.period_ms",
                format!("must be within 5..=100, got {}", self.control.period_ms),
            ));
        }
        if self.control.max_decodes_per_tick == 0 {
            return Err(ControlError::invalid(
                "control.max_decodes_per_tick",
                "must be > 0",
            ));
        }

        self.speed
            .to_params()
            .validate()
            .map_err(|e| ControlError::invalid("speed", e.to_string()))?;

        let risk = &self.risk;
        if !(risk.min_speed_mps.is_finite() && risk.min_speed_mps >= 0.0) {
            return Err(ControlError::invalid(
                "risk.min_speed_mps",
                format!("must be >= 0, got {}", risk.min_speed_mps),
            ));
        }
        if risk.release_confirm == 0 {
            return Err(ControlError::invalid("risk.release_confirm", "must be > 0"));
        }
        let fixed = &risk.fixed;
        if !(fixed.danger_ttc_s > 0.0 && fixed.warning_ttc_s >= fixed.danger_ttc_s) {
            return Err(ControlError::invalid(
                "risk.fixed",
                format!(
                    "need 0 < danger_ttc_s <= warning_ttc_s, got {} / {}",
                    fixed.danger_ttc_s, fixed.warning_ttc_s
                ),
            ));
        }
        if fixed.danger_confirm == 0 {
            return Err(ControlError::invalid(
                "risk.fixed.danger_confirm",
                "must be > 0",
            ));
        }
        let stopping = &risk.stopping_distance;
        if !(stopping.slope_s >= 0.0 && stopping.offset_m >= 0.0 && stopping.release_margin_m >= 0.0)
        {
            return Err(ControlError::invalid(
                "risk.stopping_distance",
                "slope_s, offset_m and release_margin_m must be >= 0",
            ));
        }
        if stopping.danger_confirm == 0 {
            return Err(ControlError::invalid(
                "risk.stopping_distance.danger_confirm",
                "must be > 0",
            ));
        }

        brakeguard_driver::Actuator::new(self.actuator.positions(), self.actuator.max_step_deg)
            .map_err(|e| ControlError::invalid("actuator", e.to_string()))?;

        if !HEARTBEAT_RANGE_MS.contains(&self.link.heartbeat_timeout_ms) {
            return Err(ControlError::invalid(
                "link.heartbeat_timeout_ms",
                format!(
                    "must be within 800..=1500, got {}",
                    self.link.heartbeat_timeout_ms
                ),
            ));
        }
        if self.link.telemetry_interval_ms == 0 {
            return Err(ControlError::invalid(
                "link.telemetry_interval_ms",
                "must be > 0",
            ));
        }
        if self.link.max_line_len < 8 {
            return Err(ControlError::invalid(
                "link.max_line_len",
                format!("must be >= 8, got {}", self.link.max_line_len),
            ));
        }
        if !(self.link.speed_cap_tolerance_kmh.is_finite() && self.link.speed_cap_tolerance_kmh >= 0.0)
        {
            return Err(ControlError::invalid(
                "link.speed_cap_tolerance_kmh",
                "must be >= 0",
            ));
        }

        Ok(())
    }
}
