//! 控制器运行指标
//!
//! 零开销的原子计数器，用于监控传感器链路、上位机链路和控制循环的健康状态。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制器实时指标
///
/// # 使用示例
///
/// ```rust
/// use brakeguard_driver::DriverMetrics;
/// use std::sync::Arc;
/// use std::sync::atomic::Ordering;
///
/// let metrics = Arc::new(DriverMetrics::default());
///
/// // 在控制线程中更新指标
/// metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
///
/// // 在监控线程中读取快照
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.frames_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 控制周期总数
    pub ticks: AtomicU64,

    /// 超出周期预算的次数
    pub overruns: AtomicU64,

    /// 成功解码的传感器帧数
    pub frames_decoded: AtomicU64,

    /// 解码失败的次数（每次丢弃 1 字节）
    pub frames_invalid: AtomicU64,

    /// 解码缓冲溢出丢弃的字节数
    pub sensor_bytes_dropped: AtomicU64,

    /// 已应用的上位机命令行数
    pub lines_accepted: AtomicU64,

    /// 被拒绝的上位机命令行数（未知命令或参数无效）
    pub lines_rejected: AtomicU64,

    /// 超长被丢弃的行数
    pub lines_overlong: AtomicU64,

    /// 心跳超时触发故障安全的次数
    pub failsafe_triggers: AtomicU64,

    /// 制动锁存接合次数
    pub latch_engagements: AtomicU64,

    /// 传输层读写错误次数
    pub transport_errors: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_invalid: self.frames_invalid.load(Ordering::Relaxed),
            sensor_bytes_dropped: self.sensor_bytes_dropped.load(Ordering::Relaxed),
            lines_accepted: self.lines_accepted.load(Ordering::Relaxed),
            lines_rejected: self.lines_rejected.load(Ordering::Relaxed),
            lines_overlong: self.lines_overlong.load(Ordering::Relaxed),
            failsafe_triggers: self.failsafe_triggers.load(Ordering::Relaxed),
            latch_engagements: self.latch_engagements.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.overruns,
            &self.frames_decoded,
            &self.frames_invalid,
            &self.sensor_bytes_dropped,
            &self.lines_accepted,
            &self.lines_rejected,
            &self.lines_overlong,
            &self.failsafe_triggers,
            &self.latch_engagements,
            &self.transport_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub overruns: u64,
    pub frames_decoded: u64,
    pub frames_invalid: u64,
    pub sensor_bytes_dropped: u64,
    pub lines_accepted: u64,
    pub lines_rejected: u64,
    pub lines_overlong: u64,
    pub failsafe_triggers: u64,
    pub latch_engagements: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// 传感器帧有效率（%），没有任何解码尝试时返回 100
    pub fn frame_validity_percent(&self) -> f64 {
        let attempts = self.frames_decoded + self.frames_invalid;
        if attempts == 0 {
            return 100.0;
        }
        self.frames_decoded as f64 / attempts as f64 * 100.0
    }
}
