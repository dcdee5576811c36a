//! # 制动统计
//!
//! 蒙特卡洛评估：随机抽取初速度和障碍物距离，让车辆匀速逼近障碍物，
//! 用真实的 [`RiskClassifier`](brakeguard_control::RiskClassifier) 逐周期分级，记录锁存接合时的剩余距离。
//!
//! - 制动距离 `v² / (2·a)`，`a = 3.0 m/s²`
//! - 速度均匀分布于 `[0, 5.56]` m/s（20 km/h），距离均匀分布于 `[0, 10]` m
//! - 成功：制动距离不超过接合时的剩余距离；或速度低于下限，无需制动
//!
//! 需要启用 `statistics` feature：
//! ```toml
//! brakeguard-tools = { workspace = true, features = ["statistics"] }
//! ```

use crate::simulation::BRAKE_DECEL_MPS2;
use brakeguard_control::config::RiskSection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::time::Duration;

/// 最大初速度（m/s）
pub const MAX_SPEED_MPS: f64 = 5.56;

/// 最大初始距离（m）
pub const MAX_DISTANCE_M: f64 = 10.0;

/// 制动距离
pub fn braking_distance_m(speed_mps: f64) -> f64 {
    let v = speed_mps.max(0.0);
    v * v / (2.0 * BRAKE_DECEL_MPS2)
}

/// 单次试验结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrakingTrial {
    pub speed_mps: f64,
    pub initial_distance_m: f64,
    /// 锁存接合时的剩余距离；`None` 表示未接合
    pub engage_distance_m: Option<f64>,
    pub braking_distance_m: f64,
    /// 速度低于下限，无需制动
    pub brake_needed: bool,
    pub success: bool,
}

impl BrakingTrial {
    /// 接合距离减去制动距离（未接合时为 `None`）
    pub fn margin_m(&self) -> Option<f64> {
        self.engage_distance_m.map(|d| d - self.braking_distance_m)
    }
}

/// 对一组 (速度, 距离) 逐周期逼近，直到锁存或撞上
pub fn run_trial(
    risk: &RiskSection,
    period: Duration,
    speed_mps: f64,
    distance_m: f64,
) -> BrakingTrial {
    let braking = braking_distance_m(speed_mps);
    let brake_needed = speed_mps >= risk.min_speed_mps;

    let mut engage_distance_m = None;
    if brake_needed {
        let mut classifier = risk.build_classifier();
        let step = speed_mps * period.as_secs_f64();
        let mut remaining = distance_m;
        while remaining > 0.0 {
            if classifier.evaluate(remaining, speed_mps).latched {
                engage_distance_m = Some(remaining);
                break;
            }
            remaining -= step;
        }
    }

    let success = match engage_distance_m {
        Some(d) => braking <= d,
        None => !brake_needed,
    };

    BrakingTrial {
        speed_mps,
        initial_distance_m: distance_m,
        engage_distance_m,
        braking_distance_m: braking,
        brake_needed,
        success,
    }
}

/// 汇总统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrakingStatistics {
    pub trials: usize,
    pub brakes_needed: usize,
    pub engaged: usize,
    pub successes: usize,
    /// 成功率（%）
    pub success_rate: f64,
    /// 接合试验的平均余量（m）
    pub mean_margin_m: f64,
    pub std_dev_margin_m: f64,
    pub min_margin_m: f64,
}

impl BrakingStatistics {
    pub fn calculate(results: &[BrakingTrial]) -> Self {
        let margins: Vec<f64> = results.iter().filter_map(BrakingTrial::margin_m).collect();
        let successes = results.iter().filter(|t| t.success).count();

        let (mean, std_dev) = match margins.len() {
            0 => (0.0, 0.0),
            1 => (margins[0], 0.0),
            _ => (
                Statistics::mean(margins.iter()),
                Statistics::std_dev(margins.iter()),
            ),
        };

        Self {
            trials: results.len(),
            brakes_needed: results.iter().filter(|t| t.brake_needed).count(),
            engaged: margins.len(),
            successes,
            success_rate: if results.is_empty() {
                0.0
            } else {
                successes as f64 / results.len() as f64 * 100.0
            },
            mean_margin_m: mean,
            std_dev_margin_m: std_dev,
            min_margin_m: margins.iter().copied().reduce(f64::min).unwrap_or(0.0),
        }
    }
}

/// 随机抽样 `trials` 次
pub fn run_trials(
    risk: &RiskSection,
    period: Duration,
    trials: usize,
    seed: u64,
) -> (Vec<BrakingTrial>, BrakingStatistics) {
    let mut rng = StdRng::seed_from_u64(seed);
    let results: Vec<_> = (0..trials)
        .map(|_| {
            let speed = rng.gen_range(0.0..=MAX_SPEED_MPS);
            let distance = rng.gen_range(0.0..=MAX_DISTANCE_M);
            run_trial(risk, period, speed, distance)
        })
        .collect();
    let stats = BrakingStatistics::calculate(&results);
    (results, stats)
}
