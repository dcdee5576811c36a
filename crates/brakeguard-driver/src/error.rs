//! 驱动层错误类型定义

use brakeguard_io::IoError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Io(#[from] IoError),

    /// 舵机输出失败
    #[error("Servo output failed: {0}")]
    Servo(String),

    /// 参数无效
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
