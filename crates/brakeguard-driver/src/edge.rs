//! 轮速边沿计数器
//!
//! 霍尔传感器中断（或任何边沿产生者）调用 [`EdgeCounter::record_edge`]，
//! 速度估计器周期性调用 [`EdgeCounter::drain`] 读取并清零。
//!
//! 这是系统中唯一被并发修改的状态：
//! - 生产者只做 `fetch_add`
//! - 消费者只做 `swap(0)`，读取与清零是同一个原子操作，不会丢失边沿

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EdgeCounter {
    /// 当前窗口内的边沿数
    pending: AtomicU32,
    /// 累计边沿数（仅用于诊断）
    total: AtomicU64,
}

impl EdgeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个边沿（中断上下文调用）
    #[inline]
    pub fn record_edge(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// 一次记录多个边沿（轮速采集板批量上报时使用）
    #[inline]
    pub fn record_edges(&self, n: u32) {
        if n == 0 {
            return;
        }
        self.pending.fetch_add(n, Ordering::Relaxed);
        self.total.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// 读取并清零当前窗口计数
    #[inline]
    pub fn drain(&self) -> u32 {
        self.pending.swap(0, Ordering::AcqRel)
    }

    /// 未被读取的边沿数（不清零）
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
