//! 执行器（制动舵机）位置规划
//!
//! # 核心功能
//!
//! - 离散指令 → 目标位置（`Safe` / `Slow` / `Brake` 对应可配置角度）
//! - 每个控制周期最多移动 `max_step`，不会越过目标，也不会反向移动
//! - 大幅跳变会引起舵机瞬时大电流和机械冲击，因此只允许斜坡逼近
//!
//! 物理 PWM 输出通过 [`ServoOutput`] 抽象，本模块不依赖硬件。

use crate::DriverError;
use brakeguard_protocol::BrakeDirective;

/// 舵机角度范围
pub const MIN_POSITION_DEG: f64 = 0.0;
pub const MAX_POSITION_DEG: f64 = 180.0;

/// 舵机脉宽范围（微秒）
const MIN_PULSE_US: f64 = 500.0;
const MAX_PULSE_US: f64 = 2500.0;

/// 默认每周期最大步长（度）
pub const DEFAULT_MAX_STEP_DEG: f64 = 3.0;

/// 角度 → PWM 脉宽（0..180° → 500..2500µs）
pub fn pulse_width_us(degrees: f64) -> u32 {
    let clamped = degrees.clamp(MIN_POSITION_DEG, MAX_POSITION_DEG);
    let span = MAX_PULSE_US - MIN_PULSE_US;
    (MIN_PULSE_US + clamped / MAX_POSITION_DEG * span).round() as u32
}

/// 各指令对应的舵机角度
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorPositions {
    pub safe_deg: f64,
    pub slow_deg: f64,
    pub brake_deg: f64,
}

impl Default for ActuatorPositions {
    fn default() -> Self {
        Self {
            safe_deg: 90.0,
            slow_deg: 120.0,
            brake_deg: 150.0,
        }
    }
}

impl ActuatorPositions {
    pub fn position(&self, directive: BrakeDirective) -> f64 {
        match directive {
            BrakeDirective::Safe => self.safe_deg,
            BrakeDirective::Slow => self.slow_deg,
            BrakeDirective::Brake => self.brake_deg,
        }
    }
}

/// PWM 输出边界
pub trait ServoOutput {
    fn write_position(&mut self, degrees: f64) -> Result<(), DriverError>;
}

/// 空输出（无硬件时使用）
#[derive(Debug, Default, Clone, Copy)]
pub struct NullServo;

impl ServoOutput for NullServo {
    fn write_position(&mut self, _degrees: f64) -> Result<(), DriverError> {
        Ok(())
    }
}

impl<T: ServoOutput + ?Sized> ServoOutput for Box<T> {
    fn write_position(&mut self, degrees: f64) -> Result<(), DriverError> {
        (**self).write_position(degrees)
    }
}

#[derive(Debug, Clone)]
pub struct Actuator {
    current: f64,
    target: f64,
    max_step: f64,
    positions: ActuatorPositions,
}

impl Actuator {
    /// 创建执行器，初始位置为 `Safe` 角度
    pub fn new(positions: ActuatorPositions, max_step: f64) -> Result<Self, DriverError> {
        if !(max_step.is_finite() && max_step > 0.0) {
            return Err(DriverError::InvalidParameter {
                name: "max_step",
                reason: format!("must be > 0, got {}", max_step),
            });
        }
        for (name, value) in [
            ("safe_deg", positions.safe_deg),
            ("slow_deg", positions.slow_deg),
            ("brake_deg", positions.brake_deg),
        ] {
            if !(MIN_POSITION_DEG..=MAX_POSITION_DEG).contains(&value) {
                return Err(DriverError::InvalidParameter {
                    name,
                    reason: format!("must be within 0..=180, got {}", value),
                });
            }
        }

        Ok(Self {
            current: positions.safe_deg,
            target: positions.safe_deg,
            max_step,
            positions,
        })
    }

    /// 按离散指令设置目标
    pub fn command(&mut self, directive: BrakeDirective) {
        self.target = self.positions.position(directive);
    }

    /// 直接设置目标位置（钳位到舵机范围）
    pub fn set_target(&mut self, degrees: f64) {
        self.target = degrees.clamp(MIN_POSITION_DEG, MAX_POSITION_DEG);
    }

    /// 向目标移动一步，返回新的当前位置
    pub fn tick(&mut self) -> f64 {
        let remaining = self.target - self.current;
        if remaining.abs() <= self.max_step {
            self.current = self.target;
        } else {
            self.current += self.max_step.copysign(remaining);
        }
        self.current
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn at_target(&self) -> bool {
        self.current == self.target
    }

    pub fn positions(&self) -> &ActuatorPositions {
        &self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actuator() -> Actuator {
        Actuator::new(ActuatorPositions::default(), 3.0).unwrap()
    }

    #[test]
    fn test_reaches_target_in_exactly_20_ticks() {
        let mut act = actuator();
        assert_eq!(act.current(), 90.0);
        act.command(BrakeDirective::Brake);
        assert_eq!(act.target(), 150.0);

        let mut ticks = 0;
        let mut last = act.current();
        while !act.at_target() {
            let pos = act.tick();
            ticks += 1;
            assert!(pos >= last, "moved in the wrong direction");
            assert!(pos <= 150.0, "overshoot: {}", pos);
            last = pos;
        }
        assert_eq!(ticks, 20);
        assert_eq!(act.current(), 150.0);
    }

    #[test]
    fn test_partial_final_step_snaps() {
        let mut act = actuator();
        act.set_target(97.0);
        assert_eq!(act.tick(), 93.0);
        assert_eq!(act.tick(), 96.0);
        assert_eq!(act.tick(), 97.0);
        assert_eq!(act.tick(), 97.0);
    }

    #[test]
    fn test_ramp_down() {
        let mut act = actuator();
        act.command(BrakeDirective::Slow);
        for _ in 0..10 {
            act.tick();
        }
        assert_eq!(act.current(), 120.0);

        act.command(BrakeDirective::Safe);
        assert_eq!(act.tick(), 117.0);
    }

    #[test]
    fn test_target_clamped() {
        let mut act = actuator();
        act.set_target(400.0);
        assert_eq!(act.target(), 180.0);
        act.set_target(-5.0);
        assert_eq!(act.target(), 0.0);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(Actuator::new(ActuatorPositions::default(), 0.0).is_err());
        assert!(Actuator::new(ActuatorPositions::default(), f64::NAN).is_err());
        let positions = ActuatorPositions {
            brake_deg: 200.0,
            ..Default::default()
        };
        assert!(Actuator::new(positions, 3.0).is_err());
    }

    #[test]
    fn test_pulse_width_mapping() {
        assert_eq!(pulse_width_us(0.0), 500);
        assert_eq!(pulse_width_us(90.0), 1500);
        assert_eq!(pulse_width_us(180.0), 2500);
        assert_eq!(pulse_width_us(250.0), 2500);
        // 150° = 500 + 150/180*2000 ≈ 2167
        assert_eq!(pulse_width_us(150.0), 2167);
    }
}
