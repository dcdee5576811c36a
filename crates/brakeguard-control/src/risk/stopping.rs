//! 停车距离模型（随速度线性缩放）
//!
//! ```text
//! stop_distance    = slope_s × speed + offset_m
//! release_distance = stop_distance + release_margin_m
//! ```
//!
//! 默认参数对应 350mm/(km/h) + 1500mm，释放余量 800mm。
//! 两个距离之间的区间保持计数器不变，形成空间滞回。

use super::{HysteresisCounters, RiskInput, RiskModel, RiskState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoppingDistance {
    /// 每 m/s 增加的停车距离（秒）
    pub slope_s: f64,
    /// 零速时的停车距离（米）
    pub offset_m: f64,
    /// 释放距离相对停车距离的余量（米）
    pub release_margin_m: f64,
    pub danger_confirm: u8,
}

impl Default for StoppingDistance {
    fn default() -> Self {
        Self {
            // 0.35 m per km/h
            slope_s: 0.35 * 3.6,
            offset_m: 1.5,
            release_margin_m: 0.8,
            danger_confirm: 2,
        }
    }
}

impl StoppingDistance {
    pub fn stop_distance_m(&self, speed_mps: f64) -> f64 {
        self.slope_s * speed_mps.max(0.0) + self.offset_m
    }

    pub fn release_distance_m(&self, speed_mps: f64) -> f64 {
        self.stop_distance_m(speed_mps) + self.release_margin_m
    }
}

impl RiskModel for StoppingDistance {
    fn name(&self) -> &'static str {
        "stopping_distance"
    }

    fn classify(&self, input: &RiskInput, counters: &mut HysteresisCounters) -> RiskState {
        let stop = self.stop_distance_m(input.speed_mps);
        let release = stop + self.release_margin_m;

        if input.distance_m <= stop {
            counters.bump_danger();
            counters.safe_count = 0;
        } else if input.distance_m > release {
            counters.bump_safe();
            counters.danger_count = 0;
        }

        if counters.danger_count >= self.danger_confirm {
            RiskState::Decelerate
        } else if input.distance_m <= release {
            RiskState::Warning
        } else {
            RiskState::Safe
        }
    }
}
