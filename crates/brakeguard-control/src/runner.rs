//! 固定周期调度
//!
//! 绝对时间锚点 + `spin_sleep`：每周期先把锚点推进一个周期，执行控制逻辑，
//! 再睡眠到锚点（自动扣除控制逻辑耗时）。发生超时（overrun）时不做补偿性的连续执行，
//! 而是把锚点重置到当前时间，避免突发。

use crate::ControlError;
use crate::ControllerConfig;
use crate::controller::Controller;
use brakeguard_driver::{DriverMetrics, ServoOutput};
use brakeguard_io::ByteTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 调度参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub period: Duration,
    /// 最多执行的周期数（`None` 表示直到收到停止信号）
    pub max_iterations: Option<usize>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            max_iterations: None,
        }
    }
}

impl LoopConfig {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            period: config.period(),
            max_iterations: None,
        }
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
}

/// 调度结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSummary {
    pub iterations: usize,
    pub overruns: usize,
    pub elapsed: Duration,
}

/// 以固定周期运行控制器，直到达到 `max_iterations` 或 `shutdown` 被置位
pub fn run<S, H, O>(
    controller: &mut Controller<S, H, O>,
    loop_config: &LoopConfig,
    shutdown: &AtomicBool,
) -> Result<LoopSummary, ControlError>
where
    S: ByteTransport,
    H: ByteTransport,
    O: ServoOutput,
{
    if loop_config.period.is_zero() {
        return Err(ControlError::invalid("period", "must be > 0"));
    }

    #[cfg(feature = "realtime")]
    raise_priority();

    let period = loop_config.period;
    let metrics = controller.metrics();
    let start = Instant::now();
    let mut next_tick = start;
    let mut summary = LoopSummary::default();

    info!("Control loop started: period={:?}", period);

    while !shutdown.load(Ordering::Relaxed) {
        if let Some(max) = loop_config.max_iterations
            && summary.iterations >= max
        {
            break;
        }

        // 1. 推进锚点（绝对时间）
        next_tick += period;

        // 2. 控制逻辑
        controller.tick(Instant::now());
        summary.iterations += 1;

        // 3. 睡眠到锚点
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            summary.overruns += 1;
            DriverMetrics::inc(&metrics.overruns);
            warn!(
                "Control loop overrun: tick finished {:?} past its deadline (period {:?})",
                now.duration_since(next_tick),
                period
            );
            // 重置锚点，不连续补跑
            next_tick = now;
        }
    }

    summary.elapsed = start.elapsed();
    info!(
        "Control loop stopped after {} ticks ({} overruns) in {:?}",
        summary.iterations, summary.overruns, summary.elapsed
    );
    Ok(summary)
}

#[cfg(feature = "realtime")]
fn raise_priority() {
    use thread_priority::{ThreadPriority, set_current_thread_priority};

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(()) => info!("Control thread priority raised"),
        Err(e) => warn!("Failed to raise control thread priority: {:?}", e),
    }
}
