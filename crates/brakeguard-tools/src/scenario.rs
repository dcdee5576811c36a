//! # 仿真场景
//!
//! 障碍物距离曲线（毫米，`t` 为秒）：
//!
//! | 场景 | 距离 |
//! |---|---|
//! | `cruise` | `2000 + 200·sin(t/5)` |
//! | `approach` | 前 3 秒 `2000 − 600t`，之后 `300 + 100·sin(2t)` |
//! | `dropout` | `1000 + 500·sin(t)`，20% 的帧缺失或损坏 |
//!
//! 随机部分使用固定种子的 `StdRng`，同一种子产生完全相同的字节流。

use brakeguard_protocol::{RangeFrame, SYNC_BYTE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 损坏或缺失帧的比例（仅 `dropout`）
pub const DROPOUT_RATE: f64 = 0.2;

/// 仿真帧的信号强度
const SIM_STRENGTH: u16 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Cruise,
    Approach,
    Dropout,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Cruise, Scenario::Approach, Scenario::Dropout];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Cruise => "cruise",
            Scenario::Approach => "approach",
            Scenario::Dropout => "dropout",
        }
    }

    /// `t` 秒时的障碍物距离（毫米，不小于 0）
    pub fn distance_mm(&self, t: f64) -> f64 {
        let mm = match self {
            Scenario::Cruise => 2000.0 + 200.0 * (t / 5.0).sin(),
            Scenario::Approach if t < 3.0 => 2000.0 - 600.0 * t,
            Scenario::Approach => 300.0 + 100.0 * (2.0 * t).sin(),
            Scenario::Dropout => 1000.0 + 500.0 * t.sin(),
        };
        mm.max(0.0)
    }

    fn lossy(&self) -> bool {
        matches!(self, Scenario::Dropout)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scenario '{}' (cruise, approach, dropout)", s))
    }
}

/// 单帧的生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Frame([u8; 9]),
    Garbled([u8; 9]),
    Missing,
}

impl FeedEvent {
    pub fn bytes(&self) -> &[u8] {
        match self {
            FeedEvent::Frame(bytes) | FeedEvent::Garbled(bytes) => bytes,
            FeedEvent::Missing => &[],
        }
    }
}

/// 按场景生成测距传感器字节流
#[derive(Debug)]
pub struct SensorFeed {
    scenario: Scenario,
    rng: StdRng,
}

impl SensorFeed {
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// 生成 `t` 秒时的一帧
    pub fn next_frame(&mut self, t: f64) -> FeedEvent {
        let distance_cm = (self.scenario.distance_mm(t) / 10.0)
            .round()
            .min(u16::MAX as f64) as u16;
        let mut frame = RangeFrame::encode(distance_cm, SIM_STRENGTH);

        if !self.scenario.lossy() || !self.rng.gen_bool(DROPOUT_RATE) {
            return FeedEvent::Frame(frame);
        }

        if self.rng.gen_bool(0.5) {
            return FeedEvent::Missing;
        }

        // 破坏同步头并打乱一个载荷字节
        frame[0] = self.rng.gen_range(0..SYNC_BYTE);
        let index = self.rng.gen_range(2..frame.len());
        frame[index] = self.rng.r#gen();
        FeedEvent::Garbled(frame)
    }
}
