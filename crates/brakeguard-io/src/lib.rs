//! # brakeguard IO Layer
//!
//! 字节传输抽象层。控制循环只通过 [`ByteTransport`] 访问物理链路，
//! 测距传感器和上位机链路都是字节流。
//!
//! ## 后端
//!
//! - [`MockTransport`]：基于 crossbeam channel 的内存传输（测试、仿真）
//! - `SerialTransport`：串口后端（需要 `serial` feature）
//!
//! ## 非阻塞约定
//!
//! `read_available()` 必须立即返回：没有数据时返回 `Ok(0)`，
//! 绝不阻塞等待。控制循环依赖这一点保证固定周期。

use thiserror::Error;

pub mod mock;

#[cfg(feature = "serial")]
pub mod serial;

pub use mock::{MockPeer, MockTransport};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Transport disconnected")]
    Disconnected,
}

/// 字节传输 trait
pub trait ByteTransport {
    /// 读取当前可用的字节，返回读取数量；无数据时返回 `Ok(0)`
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// 写出全部字节
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError>;

    /// 写出一行（自动追加 `\n`）
    fn write_line(&mut self, line: &str) -> Result<(), IoError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write_all(&bytes)
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        (**self).write_all(bytes)
    }

    fn write_line(&mut self, line: &str) -> Result<(), IoError> {
        (**self).write_line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = IoError::Disconnected;
        assert_eq!(format!("{}", err), "Transport disconnected");

        let err: IoError = std::io::Error::other("boom").into();
        let msg = format!("{}", err);
        assert!(msg.contains("IO Error") && msg.contains("boom"));
    }

    #[test]
    fn test_boxed_transport_forwards() {
        let (device, peer) = MockTransport::pair();
        let mut boxed: Box<dyn ByteTransport> = Box::new(device);

        boxed.write_line("READY").unwrap();
        assert_eq!(peer.take_lines(), vec!["READY".to_string()]);

        peer.send_bytes(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(boxed.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
