//! 上位机行缓冲
//!
//! - `\r` 与 `\n` 都视为行结束，空行忽略
//! - 未结束的行跨周期保留，长度上限为 `max_len`
//! - 超长行整行丢弃（直到下一个行结束符）

use std::collections::VecDeque;
use tracing::warn;

/// 默认最大行长度
pub const DEFAULT_MAX_LINE_LEN: usize = 64;

pub struct LineReader {
    partial: Vec<u8>,
    ready: VecDeque<String>,
    max_len: usize,
    discarding: bool,
}

impl LineReader {
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            partial: Vec::with_capacity(max_len),
            ready: VecDeque::new(),
            max_len,
            discarding: false,
        }
    }

    /// 追加字节，返回本次丢弃的超长行数
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let mut overlong = 0;

        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if self.discarding {
                    self.discarding = false;
                } else if !self.partial.is_empty() {
                    let line = String::from_utf8_lossy(&self.partial).into_owned();
                    self.ready.push_back(line);
                }
                self.partial.clear();
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.partial.len() >= self.max_len {
                warn!(
                    "Host line exceeds {} bytes, discarding until next terminator",
                    self.max_len
                );
                self.partial.clear();
                self.discarding = true;
                overlong += 1;
                continue;
            }

            self.partial.push(byte);
        }

        overlong
    }

    /// 取出下一条完整行
    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// 当前未结束行的长度
    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}
