//! 串口传输后端
//!
//! 基于 `serialport`。读取前先查询 `bytes_to_read()`，
//! 保证 `read_available()` 不会阻塞控制循环。

use crate::{ByteTransport, IoError};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::debug;

/// 写超时（读取路径不依赖超时）
const WRITE_TIMEOUT: Duration = Duration::from_millis(10);

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// 打开串口
    ///
    /// # 参数
    ///
    /// - `path`: 设备路径（如 `/dev/ttyUSB0`）
    /// - `baud_rate`: 波特率（测距传感器通常为 115200）
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, IoError> {
        let port = serialport::new(path, baud_rate)
            .timeout(WRITE_TIMEOUT)
            .open()?;
        debug!("Opened serial port {} at {} baud", path, baud_rate);

        Ok(Self {
            port,
            name: path.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteTransport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 || buf.is_empty() {
            return Ok(0);
        }

        let n = available.min(buf.len());
        match self.port.read(&mut buf[..n]) {
            Ok(read) => Ok(read),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(0)
            },
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.port.write_all(bytes)?;
        Ok(())
    }
}
