//! 控制层错误类型定义
//!
//! 运行期的输入异常（坏帧、未知命令、传输错误）都不会以错误形式返回，
//! 而是记录日志和指标后降级处理。这里只包含配置和初始化阶段的错误。

use brakeguard_driver::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    /// 配置项取值无效
    #[error("Invalid config {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// 配置文件读取失败
    #[error("Failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 配置序列化失败
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// 驱动层初始化失败
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl ControlError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ControlError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
