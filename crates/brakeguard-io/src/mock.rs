//! 内存传输（测试与仿真）
//!
//! [`MockTransport::pair()`] 返回设备侧传输与对端句柄：
//! 对端写入的字节成为设备侧的输入，设备侧写出的字节由对端读取。

use crate::{ByteTransport, IoError};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::cell::RefCell;

/// 设备侧内存传输
pub struct MockTransport {
    inbound: Receiver<Vec<u8>>,
    outbound: Sender<Vec<u8>>,
    pending: Vec<u8>,
}

/// 对端句柄（模拟传感器或上位机）
pub struct MockPeer {
    inbound: Sender<Vec<u8>>,
    outbound: Receiver<Vec<u8>>,
    partial_line: RefCell<Vec<u8>>,
}

impl MockTransport {
    pub fn pair() -> (MockTransport, MockPeer) {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();

        let device = MockTransport {
            inbound: in_rx,
            outbound: out_tx,
            pending: Vec::new(),
        };
        let peer = MockPeer {
            inbound: in_tx,
            outbound: out_rx,
            partial_line: RefCell::new(Vec::new()),
        };
        (device, peer)
    }
}

impl ByteTransport for MockTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        loop {
            match self.inbound.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.pending.is_empty() {
                        return Err(IoError::Disconnected);
                    }
                    break;
                },
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.outbound
            .send(bytes.to_vec())
            .map_err(|_| IoError::Disconnected)
    }
}

impl MockPeer {
    /// 向设备侧发送原始字节（设备已释放时静默丢弃）
    pub fn send_bytes(&self, bytes: &[u8]) {
        let _ = self.inbound.send(bytes.to_vec());
    }

    /// 发送一行（追加 `\n`）
    pub fn send_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.send_bytes(&bytes);
    }

    /// 取出设备侧写出的全部字节
    pub fn take_output(&self) -> Vec<u8> {
        self.outbound.try_iter().flatten().collect()
    }

    /// 取出设备侧写出的完整行，未结束的行保留到下次调用
    pub fn take_lines(&self) -> Vec<String> {
        let mut partial = self.partial_line.borrow_mut();
        partial.extend(self.take_output());

        let mut lines = Vec::new();
        while let Some(pos) = partial.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let raw: Vec<u8> = partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }
}
