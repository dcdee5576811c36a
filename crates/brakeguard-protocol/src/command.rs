//! 上位机行命令
//!
//! 每行一个命令，关键字与参数之间以空白分隔：
//!
//! | 命令 | 参数 |
//! |---|---|
//! | `MODE` | `NORMAL` / `CORNER` |
//! | `CMD` | `SAFE` / `SLOW` / `BRAKE` |
//! | `SPD_CAP` | 整数 km/h |
//! | `HB` | 无 |
//! | `DBG_DIST` | 整数 mm（调试注入） |
//! | `DBG_SPEED` | 浮点 km/h（调试注入） |

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 控制权模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ControlMode {
    /// 上位机直接下发制动指令
    #[default]
    Normal,
    /// 设备自主进行风险分级
    Corner,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Normal => "NORMAL",
            ControlMode::Corner => "CORNER",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(ControlMode::Normal),
            "CORNER" => Ok(ControlMode::Corner),
            other => Err(ProtocolError::InvalidValue {
                field: "MODE",
                value: other.to_string(),
            }),
        }
    }
}

/// 离散制动指令
///
/// 按制动强度排序：`Safe < Slow < Brake`，仲裁时取较强者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum BrakeDirective {
    #[default]
    Safe,
    Slow,
    Brake,
}

impl BrakeDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrakeDirective::Safe => "SAFE",
            BrakeDirective::Slow => "SLOW",
            BrakeDirective::Brake => "BRAKE",
        }
    }
}

impl fmt::Display for BrakeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrakeDirective {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAFE" => Ok(BrakeDirective::Safe),
            "SLOW" => Ok(BrakeDirective::Slow),
            "BRAKE" => Ok(BrakeDirective::Brake),
            other => Err(ProtocolError::InvalidValue {
                field: "CMD",
                value: other.to_string(),
            }),
        }
    }
}

/// 上位机命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCommand {
    Mode(ControlMode),
    Cmd(BrakeDirective),
    /// 自主模式限速（km/h），0 表示不限速
    SpeedCap(u32),
    Heartbeat,
    /// 调试注入距离（mm）
    DebugDistance(u32),
    /// 调试注入速度（km/h）
    DebugSpeed(f64),
}

impl HostCommand {
    /// 解析一行命令
    ///
    /// 首尾空白会被忽略；多余参数视为无效。
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::EmptyLine)?;
        let arg = tokens.next();

        if let Some(extra) = tokens.next() {
            return Err(ProtocolError::InvalidValue {
                field: "arguments",
                value: extra.to_string(),
            });
        }

        let command = match keyword {
            "HB" => {
                if let Some(arg) = arg {
                    return Err(ProtocolError::InvalidValue {
                        field: "HB",
                        value: arg.to_string(),
                    });
                }
                HostCommand::Heartbeat
            },
            "MODE" => HostCommand::Mode(require(arg, "MODE")?.parse()?),
            "CMD" => HostCommand::Cmd(require(arg, "CMD")?.parse()?),
            "SPD_CAP" => HostCommand::SpeedCap(parse_u32(require(arg, "SPD_CAP")?, "SPD_CAP")?),
            "DBG_DIST" => {
                HostCommand::DebugDistance(parse_u32(require(arg, "DBG_DIST")?, "DBG_DIST")?)
            },
            "DBG_SPEED" => {
                let raw = require(arg, "DBG_SPEED")?;
                let kmh = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| ProtocolError::InvalidValue {
                        field: "DBG_SPEED",
                        value: raw.to_string(),
                    })?;
                HostCommand::DebugSpeed(kmh)
            },
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };

        Ok(command)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            HostCommand::Mode(_) => "MODE",
            HostCommand::Cmd(_) => "CMD",
            HostCommand::SpeedCap(_) => "SPD_CAP",
            HostCommand::Heartbeat => "HB",
            HostCommand::DebugDistance(_) => "DBG_DIST",
            HostCommand::DebugSpeed(_) => "DBG_SPEED",
        }
    }

    /// 是否为调试注入命令
    pub fn is_debug(&self) -> bool {
        matches!(
            self,
            HostCommand::DebugDistance(_) | HostCommand::DebugSpeed(_)
        )
    }
}

fn require<'a>(arg: Option<&'a str>, command: &'static str) -> Result<&'a str, ProtocolError> {
    arg.ok_or(ProtocolError::MissingArgument { command })
}

fn parse_u32(raw: &str, field: &'static str) -> Result<u32, ProtocolError> {
    raw.parse::<u32>().map_err(|_| ProtocolError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}

/// 线路文本形式（不含换行）
impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCommand::Mode(mode) => write!(f, "MODE {}", mode),
            HostCommand::Cmd(directive) => write!(f, "CMD {}", directive),
            HostCommand::SpeedCap(kmh) => write!(f, "SPD_CAP {}", kmh),
            HostCommand::Heartbeat => f.write_str("HB"),
            HostCommand::DebugDistance(mm) => write!(f, "DBG_DIST {}", mm),
            HostCommand::DebugSpeed(kmh) => write!(f, "DBG_SPEED {:.1}", kmh),
        }
    }
}

impl FromStr for HostCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostCommand::parse(s)
    }
}
