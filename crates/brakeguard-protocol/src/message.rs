//! 设备 → 上位机 消息
//!
//! - `READY`：启动完成
//! - `ACK <命令回显>`：命令已应用
//! - `SPEED <km/h>`：速度遥测（保留 1 位小数）
//! - `DIST <mm>`：距离遥测
//! - `EVENT BRAKE`：故障安全或制动锁存触发

use crate::{HostCommand, ProtocolError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceMessage {
    Ready,
    Ack(HostCommand),
    Speed { kmh: f64 },
    Distance { mm: u32 },
    EventBrake,
}

impl DeviceMessage {
    /// 从米/秒构造速度遥测
    pub fn speed_from_mps(mps: f64) -> Self {
        DeviceMessage::Speed { kmh: mps * 3.6 }
    }

    /// 从米构造距离遥测（负值与非有限值钳位为 0 / u32::MAX）
    pub fn distance_from_m(meters: f64) -> Self {
        let mm = if meters.is_nan() || meters <= 0.0 {
            0
        } else if meters.is_infinite() || meters * 1000.0 >= u32::MAX as f64 {
            u32::MAX
        } else {
            (meters * 1000.0).round() as u32
        };
        DeviceMessage::Distance { mm }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, DeviceMessage::EventBrake)
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMessage::Ready => f.write_str("READY"),
            DeviceMessage::Ack(command) => write!(f, "ACK {}", command),
            DeviceMessage::Speed { kmh } => write!(f, "SPEED {:.1}", kmh),
            DeviceMessage::Distance { mm } => write!(f, "DIST {}", mm),
            DeviceMessage::EventBrake => f.write_str("EVENT BRAKE"),
        }
    }
}

impl FromStr for DeviceMessage {
    type Err = ProtocolError;

    /// 上位机侧解析（仿真与测试使用）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() {
            return Err(ProtocolError::EmptyLine);
        }

        if line == "READY" {
            return Ok(DeviceMessage::Ready);
        }
        if line == "EVENT BRAKE" {
            return Ok(DeviceMessage::EventBrake);
        }
        if let Some(rest) = line.strip_prefix("ACK ") {
            return Ok(DeviceMessage::Ack(HostCommand::parse(rest)?));
        }
        if let Some(rest) = line.strip_prefix("SPEED ") {
            let kmh = rest.trim().parse().map_err(|_| ProtocolError::InvalidValue {
                field: "SPEED",
                value: rest.to_string(),
            })?;
            return Ok(DeviceMessage::Speed { kmh });
        }
        if let Some(rest) = line.strip_prefix("DIST ") {
            let mm = rest.trim().parse().map_err(|_| ProtocolError::InvalidValue {
                field: "DIST",
                value: rest.to_string(),
            })?;
            return Ok(DeviceMessage::Distance { mm });
        }

        Err(ProtocolError::UnknownCommand(line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrakeDirective, ControlMode};

    #[test]
    fn test_ack_lines() {
        let ack = DeviceMessage::Ack(HostCommand::Mode(ControlMode::Corner));
        assert_eq!(ack.to_string(), "ACK MODE CORNER");

        let ack = DeviceMessage::Ack(HostCommand::Cmd(BrakeDirective::Brake));
        assert_eq!(ack.to_string(), "ACK CMD BRAKE");

        let ack = DeviceMessage::Ack(HostCommand::SpeedCap(12));
        assert_eq!(ack.to_string(), "ACK SPD_CAP 12");

        assert_eq!(DeviceMessage::Ack(HostCommand::Heartbeat).to_string(), "ACK HB");
        assert_eq!(
            DeviceMessage::Ack(HostCommand::DebugSpeed(3.24)).to_string(),
            "ACK DBG_SPEED 3.2"
        );
    }

    #[test]
    fn test_telemetry_format() {
        // 2.5 m/s = 9.0 km/h
        assert_eq!(DeviceMessage::speed_from_mps(2.5).to_string(), "SPEED 9.0");
        assert_eq!(DeviceMessage::distance_from_m(1.234).to_string(), "DIST 1234");
        assert_eq!(DeviceMessage::EventBrake.to_string(), "EVENT BRAKE");
        assert_eq!(DeviceMessage::Ready.to_string(), "READY");
    }

    #[test]
    fn test_distance_clamping() {
        assert_eq!(
            DeviceMessage::distance_from_m(f64::INFINITY),
            DeviceMessage::Distance { mm: u32::MAX }
        );
        assert_eq!(
            DeviceMessage::distance_from_m(-1.0),
            DeviceMessage::Distance { mm: 0 }
        );
    }

    #[test]
    fn test_parse_device_lines() {
        assert_eq!(
            "EVENT BRAKE".parse::<DeviceMessage>(),
            Ok(DeviceMessage::EventBrake)
        );
        assert_eq!(
            "ACK HB\r".parse::<DeviceMessage>(),
            Ok(DeviceMessage::Ack(HostCommand::Heartbeat))
        );
        assert_eq!(
            "DIST 800".parse::<DeviceMessage>(),
            Ok(DeviceMessage::Distance { mm: 800 })
        );
        assert!("WHAT".parse::<DeviceMessage>().is_err());
    }
}
