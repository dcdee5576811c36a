//! 风险分级状态机
//!
//! # 每个控制周期的求值顺序
//!
//! 1. `TTC = distance / speed`（speed ≤ 0 时为 +∞，表示运动学上无碰撞风险）
//! 2. speed 低于近零下限：强制 SAFE，清零两个滞回计数器（不触碰制动锁存）
//! 3. 交给 [`RiskModel`] 更新计数器并给出瞬时分级
//! 4. 根据分级和 `safe_count` 维护制动锁存
//!
//! # 制动锁存
//!
//! 首次出现 DECELERATE 时接合；只有 `safe_count` 连续达到 `release_confirm`
//! 才释放。锁存期间瞬时分级在 WARNING / SAFE 之间抖动不会让执行器离开制动位。
//!
//! 速度下限分支会清零 `safe_count`，因此减速到下限以下时锁存保持；
//! 停车后只有车辆重新起步并确认 SAFE，或上位机发送 `MODE` 才会释放。

mod fixed;
mod stopping;

pub use fixed::FixedThresholds;
pub use stopping::StoppingDistance;

use brakeguard_protocol::{BrakeDirective, DistanceSample};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// 近零速度下限默认值（m/s）
pub const DEFAULT_MIN_SPEED_MPS: f64 = 0.5;

/// 锁存释放所需的连续 SAFE 周期数默认值
pub const DEFAULT_RELEASE_CONFIRM: u8 = 2;

/// 风险分级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskState {
    #[default]
    Safe,
    Warning,
    Decelerate,
}

impl RiskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskState::Safe => "SAFE",
            RiskState::Warning => "WARNING",
            RiskState::Decelerate => "DECELERATE",
        }
    }
}

impl fmt::Display for RiskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 滞回计数器（饱和计数，不会溢出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HysteresisCounters {
    pub danger_count: u8,
    pub safe_count: u8,
}

impl HysteresisCounters {
    pub fn bump_danger(&mut self) {
        self.danger_count = self.danger_count.saturating_add(1);
    }

    pub fn bump_safe(&mut self) {
        self.safe_count = self.safe_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 计算碰撞时间（秒）
///
/// 速度非正（或非数值）时返回 `f64::INFINITY`，从不除零。
pub fn time_to_collision(distance_m: f64, speed_mps: f64) -> f64 {
    if speed_mps > 0.0 {
        distance_m / speed_mps
    } else {
        f64::INFINITY
    }
}

/// 单周期分级输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInput {
    pub distance_m: f64,
    pub speed_mps: f64,
    pub ttc_s: f64,
}

/// 可插拔的阈值模型
///
/// 实现者负责更新 `danger_count` / `safe_count` 并返回瞬时分级。
/// 速度下限与制动锁存由 [`RiskClassifier`] 统一处理。
pub trait RiskModel: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    fn classify(&self, input: &RiskInput, counters: &mut HysteresisCounters) -> RiskState;
}

/// 模型选择（配置用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskModelKind {
    /// 固定 TTC 阈值 + 硬距离下限
    Fixed,
    /// 随速度缩放的停车距离模型
    #[default]
    StoppingDistance,
}

/// 锁存事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatchEvent {
    Engaged,
    Released,
}

/// 单周期分级结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub state: RiskState,
    pub ttc_s: f64,
    pub distance_m: f64,
    pub speed_mps: f64,
    pub counters: HysteresisCounters,
    pub latched: bool,
    pub event: Option<LatchEvent>,
}

impl Assessment {
    /// 自主模式下的制动指令
    ///
    /// 锁存期间始终为 `Brake`；否则 WARNING 对应 `Slow`。
    pub fn directive(&self) -> BrakeDirective {
        if self.latched {
            return BrakeDirective::Brake;
        }
        match self.state {
            RiskState::Safe => BrakeDirective::Safe,
            RiskState::Warning => BrakeDirective::Slow,
            RiskState::Decelerate => BrakeDirective::Brake,
        }
    }
}

/// 风险分级器
#[derive(Debug)]
pub struct RiskClassifier {
    model: Box<dyn RiskModel>,
    min_speed_mps: f64,
    release_confirm: u8,
    counters: HysteresisCounters,
    latched: bool,
    last_distance_m: Option<f64>,
}

impl RiskClassifier {
    pub fn new(model: Box<dyn RiskModel>, min_speed_mps: f64, release_confirm: u8) -> Self {
        Self {
            model,
            min_speed_mps,
            release_confirm: release_confirm.max(1),
            counters: HysteresisCounters::default(),
            latched: false,
            last_distance_m: None,
        }
    }

    /// 固定阈值模型，默认参数
    pub fn fixed() -> Self {
        Self::new(
            Box::new(FixedThresholds::default()),
            DEFAULT_MIN_SPEED_MPS,
            DEFAULT_RELEASE_CONFIRM,
        )
    }

    /// 记录一次距离采样；无效采样被忽略（视为没有新信息）
    ///
    /// 返回是否被采纳。
    pub fn observe_distance(&mut self, sample: DistanceSample) -> bool {
        match sample.distance_m() {
            Some(meters) if meters.is_finite() && meters >= 0.0 => {
                self.last_distance_m = Some(meters);
                true
            },
            _ => false,
        }
    }

    /// 用最近一次有效距离求值（尚无有效距离时按 +∞ 处理）
    pub fn update(&mut self, speed_mps: f64) -> Assessment {
        let distance_m = self.last_distance_m.unwrap_or(f64::INFINITY);
        self.evaluate(distance_m, speed_mps)
    }

    /// 对给定的距离和速度求值一个周期
    pub fn evaluate(&mut self, distance_m: f64, speed_mps: f64) -> Assessment {
        let ttc_s = time_to_collision(distance_m, speed_mps);
        let mut event = None;

        // NaN 速度同样走近零分支
        let state = if !(speed_mps >= self.min_speed_mps) {
            self.counters.reset();
            RiskState::Safe
        } else {
            let input = RiskInput {
                distance_m,
                speed_mps,
                ttc_s,
            };
            let state = self.model.classify(&input, &mut self.counters);

            if state == RiskState::Decelerate && !self.latched {
                self.latched = true;
                event = Some(LatchEvent::Engaged);
            } else if self.latched && self.counters.safe_count >= self.release_confirm {
                self.latched = false;
                event = Some(LatchEvent::Released);
            }
            state
        };

        match event {
            Some(LatchEvent::Engaged) => info!(
                "Brake latch engaged: d={:.2}m v={:.2}m/s ttc={:.2}s ({})",
                distance_m,
                speed_mps,
                ttc_s,
                self.model.name()
            ),
            Some(LatchEvent::Released) => info!("Brake latch released, easing off"),
            None => debug!(
                "Risk {}: d={:.2}m v={:.2}m/s ttc={:.2}s {:?}",
                state, distance_m, speed_mps, ttc_s, self.counters
            ),
        }

        Assessment {
            state,
            ttc_s,
            distance_m,
            speed_mps,
            counters: self.counters,
            latched: self.latched,
            event,
        }
    }

    /// 清零计数器并释放锁存（模式切换时调用），保留最近距离
    pub fn reset(&mut self) {
        self.counters.reset();
        self.latched = false;
    }

    pub fn counters(&self) -> HysteresisCounters {
        self.counters
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn last_distance_m(&self) -> Option<f64> {
        self.last_distance_m
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttc_sentinel() {
        assert_eq!(time_to_collision(5.0, 0.0), f64::INFINITY);
        assert_eq!(time_to_collision(5.0, -2.0), f64::INFINITY);
        assert_eq!(time_to_collision(5.0, f64::NAN), f64::INFINITY);
        assert!((time_to_collision(5.0, 2.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_hard_floor_fires_on_first_tick() {
        let mut classifier = RiskClassifier::fixed();

        // d=1.0 v=2.0 -> TTC 0.5s
        let tick1 = classifier.evaluate(1.0, 2.0);
        assert_eq!(tick1.state, RiskState::Decelerate);
        assert_eq!(tick1.counters.danger_count, 1);
        assert_eq!(tick1.event, Some(LatchEvent::Engaged));

        let tick2 = classifier.evaluate(1.0, 2.0);
        assert_eq!(tick2.state, RiskState::Decelerate);
        assert_eq!(tick2.counters.danger_count, 2);
        assert_eq!(tick2.event, None);
        assert!(tick2.latched);
    }

    #[test]
    fn test_ttc_debounce_without_hard_floor() {
        let mut classifier = RiskClassifier::fixed();

        // d=2.0 (> 1.5) v=2.0 -> TTC 1.0s：第一帧只是 WARNING，第二帧确认
        assert_eq!(classifier.evaluate(2.0, 2.0).state, RiskState::Warning);
        assert_eq!(classifier.evaluate(2.0, 2.0).state, RiskState::Decelerate);
    }

    #[test]
    fn test_far_object_is_safe() {
        let mut classifier = RiskClassifier::fixed();
        let a = classifier.evaluate(10.0, 1.0);
        assert_eq!(a.state, RiskState::Safe);
        assert_eq!(a.counters.danger_count, 0);
        assert_eq!(a.directive(), BrakeDirective::Safe);
    }

    #[test]
    fn test_speed_floor_resets_counters_but_holds_latch() {
        let mut classifier = RiskClassifier::fixed();
        classifier.evaluate(1.0, 2.0);
        classifier.evaluate(1.0, 2.0);
        assert!(classifier.is_latched());

        let a = classifier.evaluate(0.1, 0.3);
        assert_eq!(a.state, RiskState::Safe);
        assert_eq!(a.counters, HysteresisCounters::default());
        assert_eq!(a.event, None);
        assert!(a.latched);
        assert_eq!(a.directive(), BrakeDirective::Brake);
    }

    #[test]
    fn test_slowing_down_near_obstacle_keeps_brake() {
        let mut classifier =
            RiskClassifier::new(Box::new(StoppingDistance::default()), 0.5, 2);
        classifier.evaluate(1.0, 2.0);
        assert_eq!(classifier.evaluate(1.0, 2.0).directive(), BrakeDirective::Brake);

        // 减速到下限以下、障碍物仍在 1m：锁存不因计数器清零而释放
        for _ in 0..10 {
            let slow = classifier.evaluate(1.0, 0.4);
            assert_eq!(slow.state, RiskState::Safe);
            assert_eq!(slow.counters.safe_count, 0);
            assert_eq!(slow.directive(), BrakeDirective::Brake);
        }
        assert!(classifier.is_latched());

        // 重新起步且远离障碍物：连续确认后才释放
        let far = 20.0;
        assert_eq!(classifier.evaluate(far, 1.0).event, None);
        let released = classifier.evaluate(far, 1.0);
        assert_eq!(released.event, Some(LatchEvent::Released));
        assert_eq!(released.directive(), BrakeDirective::Safe);
    }

    #[test]
    fn test_latch_holds_through_flicker() {
        let mut classifier = RiskClassifier::fixed();
        assert_eq!(classifier.evaluate(1.0, 2.0).directive(), BrakeDirective::Brake);

        // DECELERATE -> WARNING -> DECELERATE -> SAFE（单帧）
        let warning = classifier.evaluate(3.0, 2.0);
        assert_eq!(warning.state, RiskState::Warning);
        assert_eq!(warning.directive(), BrakeDirective::Brake);

        assert_eq!(classifier.evaluate(1.2, 2.0).directive(), BrakeDirective::Brake);

        let one_safe = classifier.evaluate(8.0, 2.0);
        assert_eq!(one_safe.state, RiskState::Safe);
        assert_eq!(one_safe.directive(), BrakeDirective::Brake);

        // 第二个连续 SAFE 才释放
        let released = classifier.evaluate(8.0, 2.0);
        assert_eq!(released.event, Some(LatchEvent::Released));
        assert_eq!(released.directive(), BrakeDirective::Safe);
    }

    #[test]
    fn test_invalid_samples_are_ignored() {
        let mut classifier = RiskClassifier::fixed();
        assert!(!classifier.observe_distance(DistanceSample::invalid()));
        assert_eq!(classifier.last_distance_m(), None);

        // 无有效距离：按无穷远处理
        assert_eq!(classifier.update(3.0).state, RiskState::Safe);

        assert!(classifier.observe_distance(DistanceSample::from_meters(1.0)));
        assert!(!classifier.observe_distance(DistanceSample::invalid()));
        assert_eq!(classifier.last_distance_m(), Some(1.0));
        assert_eq!(classifier.update(3.0).state, RiskState::Decelerate);
    }

    #[test]
    fn test_reset_clears_latch_keeps_distance() {
        let mut classifier = RiskClassifier::fixed();
        classifier.observe_distance(DistanceSample::from_meters(1.0));
        classifier.update(2.0);
        assert!(classifier.is_latched());

        classifier.reset();
        assert!(!classifier.is_latched());
        assert_eq!(classifier.counters(), HysteresisCounters::default());
        assert_eq!(classifier.last_distance_m(), Some(1.0));
    }

    #[test]
    fn test_counters_saturate() {
        let mut counters = HysteresisCounters {
            danger_count: u8::MAX,
            safe_count: u8::MAX,
        };
        counters.bump_danger();
        counters.bump_safe();
        assert_eq!(counters.danger_count, u8::MAX);
        assert_eq!(counters.safe_count, u8::MAX);
    }
}
