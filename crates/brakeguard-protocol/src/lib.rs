//! # brakeguard Protocol
//!
//! 制动控制器的线路协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `sensor`: 测距传感器帧（0x59 0x59 同步头，厘米级小端距离）
//! - `command`: 上位机 → 设备 的行命令解析
//! - `message`: 设备 → 上位机 的应答、遥测与事件行
//! - `wheel`: 轮速采集板的边沿计数报告行
//!
//! ## 字节序
//!
//! 传感器帧使用小端字节序（低字节在前）。
//! 上位机协议是 ASCII 行协议，每行一个命令。

pub mod command;
pub mod message;
pub mod sensor;
pub mod wheel;

pub use command::*;
pub use message::*;
pub use sensor::*;
pub use wheel::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Sync bytes not found: got {found:02X?}")]
    BadSync { found: [u8; 2] },

    #[error("Checksum mismatch: computed 0x{computed:02X}, frame carries 0x{carried:02X}")]
    ChecksumMismatch { computed: u8, carried: u8 },

    #[error("Empty command line")]
    EmptyLine,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument for {command}")]
    MissingArgument { command: &'static str },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidLength {
            expected: 9,
            actual: 4,
        };
        assert_eq!(format!("{}", err), "Invalid frame length: expected 9, got 4");

        let err = ProtocolError::BadSync { found: [0x12, 0x59] };
        assert!(format!("{}", err).contains("12"));

        let err = ProtocolError::ChecksumMismatch {
            computed: 0xAB,
            carried: 0x01,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("0xAB") && msg.contains("0x01"));

        let err = ProtocolError::UnknownCommand("FOO".to_string());
        assert_eq!(format!("{}", err), "Unknown command: FOO");

        let err = ProtocolError::InvalidValue {
            field: "SPD_CAP",
            value: "fast".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid value for SPD_CAP: fast");
    }
}
