//! 测距传感器流式解码器
//!
//! 解码策略：
//! - 缓冲不足一帧：不消费任何字节，返回 `None`
//! - 缓冲头部不是两个同步字节（或严格模式下校验失败）：丢弃恰好 1 字节，
//!   返回 `valid = false` 的采样，下次调用继续尝试
//! - 否则消费整帧，返回厘米换算为米的采样
//!
//! 缓冲区有容量上限，溢出时丢弃最旧的字节。

use brakeguard_protocol::{ChecksumPolicy, DistanceSample, FRAME_LEN, RangeFrame};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// 默认缓冲容量（约 7 帧）
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

pub struct RangeDecoder {
    buffer: VecDeque<u8>,
    capacity: usize,
    policy: ChecksumPolicy,
}

impl RangeDecoder {
    /// 创建解码器（容量至少为一帧）
    pub fn new(policy: ChecksumPolicy, capacity: usize) -> Self {
        let capacity = capacity.max(FRAME_LEN);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// 追加传输层读到的字节，返回因溢出丢弃的字节数
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let mut dropped = 0;
        for &byte in bytes {
            if self.buffer.len() == self.capacity {
                self.buffer.pop_front();
                dropped += 1;
            }
            self.buffer.push_back(byte);
        }
        if dropped > 0 {
            debug!("Range decoder buffer full, dropped {} oldest bytes", dropped);
        }
        dropped
    }

    /// 尝试解码一帧
    pub fn decode(&mut self) -> Option<DistanceSample> {
        if self.buffer.len() < FRAME_LEN {
            return None;
        }

        let mut frame = [0u8; FRAME_LEN];
        for (slot, byte) in frame.iter_mut().zip(self.buffer.iter()) {
            *slot = *byte;
        }

        match RangeFrame::parse(&frame, self.policy) {
            Ok(parsed) => {
                self.buffer.drain(..FRAME_LEN);
                trace!("Range frame: {} cm", parsed.distance_cm);
                Some(parsed.to_sample())
            },
            Err(e) => {
                self.buffer.pop_front();
                trace!("Range resync: {}", e);
                Some(DistanceSample::invalid())
            },
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn policy(&self) -> ChecksumPolicy {
        self.policy
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for RangeDecoder {
    fn default() -> Self {
        Self::new(ChecksumPolicy::Ignore, DEFAULT_BUFFER_CAPACITY)
    }
}
