//! 轮速脉冲报告行
//!
//! 轮速采集板（霍尔传感器 + 单片机）每隔固定时间上报一次自上次报告以来的边沿数：
//!
//! ```text
//! EDGES <n>
//! ```
//!
//! 关键字区分大小写，`n` 为十进制无符号整数。

use crate::ProtocolError;

pub const WHEEL_KEYWORD: &str = "EDGES";

/// 一条轮速报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelReport {
    pub edges: u32,
}

impl WheelReport {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::EmptyLine)?;
        if keyword != WHEEL_KEYWORD {
            return Err(ProtocolError::UnknownCommand(keyword.to_string()));
        }

        let raw = tokens.next().ok_or(ProtocolError::MissingArgument {
            command: WHEEL_KEYWORD,
        })?;
        if let Some(extra) = tokens.next() {
            return Err(ProtocolError::InvalidValue {
                field: "arguments",
                value: extra.to_string(),
            });
        }

        let edges = raw.parse::<u32>().map_err(|_| ProtocolError::InvalidValue {
            field: WHEEL_KEYWORD,
            value: raw.to_string(),
        })?;
        Ok(Self { edges })
    }
}
