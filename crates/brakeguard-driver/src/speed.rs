//! 速度估计器
//!
//! 每个固定窗口（默认 200ms）清空一次边沿计数器：
//!
//! ```text
//! revolutions = edges / magnets_per_revolution
//! speed       = revolutions / elapsed_s × wheel_circumference_m
//! ```
//!
//! 窗口内经过时间为零时不做除法，直接返回上一次的采样。

use crate::DriverError;
use crate::edge::EdgeCounter;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 速度估计参数
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedParams {
    /// 每圈磁铁数
    pub magnets_per_revolution: u32,
    /// 车轮周长（米）
    pub wheel_circumference_m: f64,
    /// 采样窗口
    pub window: Duration,
    /// 指数平滑系数（1.0 表示不平滑）
    pub smoothing: f64,
}

impl Default for SpeedParams {
    fn default() -> Self {
        Self {
            magnets_per_revolution: 1,
            wheel_circumference_m: 0.68,
            window: Duration::from_millis(200),
            smoothing: 1.0,
        }
    }
}

impl SpeedParams {
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.magnets_per_revolution == 0 {
            return Err(DriverError::InvalidParameter {
                name: "magnets_per_revolution",
                reason: "must be > 0".to_string(),
            });
        }
        if !(self.wheel_circumference_m.is_finite() && self.wheel_circumference_m > 0.0) {
            return Err(DriverError::InvalidParameter {
                name: "wheel_circumference_m",
                reason: format!("must be > 0, got {}", self.wheel_circumference_m),
            });
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(DriverError::InvalidParameter {
                name: "smoothing",
                reason: format!("must be in (0, 1], got {}", self.smoothing),
            });
        }
        Ok(())
    }
}

/// 速度采样
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedSample {
    pub meters_per_second: f64,
    /// 产生该采样的窗口实际长度
    pub window_ms: u32,
}

impl SpeedSample {
    pub fn kmh(&self) -> f64 {
        self.meters_per_second * 3.6
    }
}

pub struct SpeedEstimator {
    counter: Arc<EdgeCounter>,
    params: SpeedParams,
    window_start: Instant,
    last: SpeedSample,
}

impl SpeedEstimator {
    pub fn new(
        counter: Arc<EdgeCounter>,
        params: SpeedParams,
        now: Instant,
    ) -> Result<Self, DriverError> {
        params.validate()?;
        Ok(Self {
            counter,
            params,
            window_start: now,
            last: SpeedSample::default(),
        })
    }

    /// 轮询估计器
    ///
    /// 窗口未到期时返回上一次采样；到期时清空计数器并重新计算。
    pub fn poll(&mut self, now: Instant) -> SpeedSample {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed.is_zero() || elapsed < self.params.window {
            return self.last;
        }

        let edges = self.counter.drain();
        let revolutions = edges as f64 / self.params.magnets_per_revolution as f64;
        let raw = revolutions / elapsed.as_secs_f64() * self.params.wheel_circumference_m;

        let alpha = self.params.smoothing;
        let speed = alpha * raw + (1.0 - alpha) * self.last.meters_per_second;

        self.last = SpeedSample {
            meters_per_second: speed,
            window_ms: elapsed.as_millis().min(u32::MAX as u128) as u32,
        };
        self.window_start = now;
        self.last
    }

    pub fn last(&self) -> SpeedSample {
        self.last
    }

    pub fn counter(&self) -> &Arc<EdgeCounter> {
        &self.counter
    }

    pub fn params(&self) -> &SpeedParams {
        &self.params
    }
}
