//! 固定阈值模型
//!
//! - TTC < `danger_ttc_s`：`danger_count` 加一，否则清零
//! - DECELERATE：`danger_count ≥ danger_confirm` 或距离 < `hard_min_distance_m`
//!   （硬距离下限绕过去抖，近距离本身就是无条件危险）
//! - WARNING：TTC < `warning_ttc_s`
//! - 其余为 SAFE；SAFE 周期累加 `safe_count`，其他分级将其清零

use super::{HysteresisCounters, RiskInput, RiskModel, RiskState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedThresholds {
    pub danger_ttc_s: f64,
    pub warning_ttc_s: f64,
    pub hard_min_distance_m: f64,
    pub danger_confirm: u8,
}

impl Default for FixedThresholds {
    fn default() -> Self {
        Self {
            danger_ttc_s: 1.2,
            warning_ttc_s: 2.0,
            hard_min_distance_m: 1.5,
            danger_confirm: 2,
        }
    }
}

impl RiskModel for FixedThresholds {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn classify(&self, input: &RiskInput, counters: &mut HysteresisCounters) -> RiskState {
        if input.ttc_s < self.danger_ttc_s {
            counters.bump_danger();
        } else {
            counters.danger_count = 0;
        }

        let state = if counters.danger_count >= self.danger_confirm
            || input.distance_m < self.hard_min_distance_m
        {
            RiskState::Decelerate
        } else if input.ttc_s < self.warning_ttc_s {
            RiskState::Warning
        } else {
            RiskState::Safe
        };

        if state == RiskState::Safe {
            counters.bump_safe();
        } else {
            counters.safe_count = 0;
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::time_to_collision;

    fn input(distance_m: f64, speed_mps: f64) -> RiskInput {
        RiskInput {
            distance_m,
            speed_mps,
            ttc_s: time_to_collision(distance_m, speed_mps),
        }
    }

    #[test]
    fn test_band_boundaries() {
        let model = FixedThresholds::default();
        let mut counters = HysteresisCounters::default();

        // TTC 恰好 2.0s：不是 WARNING
        assert_eq!(model.classify(&input(4.0, 2.0), &mut counters), RiskState::Safe);
        // TTC 1.9s
        assert_eq!(
            model.classify(&input(3.8, 2.0), &mut counters),
            RiskState::Warning
        );
        assert_eq!(counters.danger_count, 0);
        assert_eq!(counters.safe_count, 0);
        // TTC 恰好 1.2s：不计入危险
        model.classify(&input(2.4, 2.0), &mut counters);
        assert_eq!(counters.danger_count, 0);
    }

    #[test]
    fn test_hard_floor_independent_of_ttc() {
        let model = FixedThresholds::default();
        let mut counters = HysteresisCounters::default();

        // 距离 1.4m，速度很低（TTC 很大）仍然 DECELERATE
        assert_eq!(
            model.classify(&input(1.4, 0.6), &mut counters),
            RiskState::Decelerate
        );
        assert_eq!(counters.danger_count, 0);
    }

    #[test]
    fn test_danger_resets_on_clear_frame() {
        let model = FixedThresholds::default();
        let mut counters = HysteresisCounters::default();

        model.classify(&input(2.0, 2.0), &mut counters);
        assert_eq!(counters.danger_count, 1);
        model.classify(&input(9.0, 2.0), &mut counters);
        assert_eq!(counters.danger_count, 0);
        assert_eq!(
            model.classify(&input(2.0, 2.0), &mut counters),
            RiskState::Warning
        );
    }

    #[test]
    fn test_custom_confirmation() {
        let model = FixedThresholds {
            danger_confirm: 3,
            ..Default::default()
        };
        let mut counters = HysteresisCounters::default();
        let states: Vec<_> = (0..3)
            .map(|_| model.classify(&input(2.0, 2.0), &mut counters))
            .collect();
        assert_eq!(
            states,
            vec![RiskState::Warning, RiskState::Warning, RiskState::Decelerate]
        );
    }
}
