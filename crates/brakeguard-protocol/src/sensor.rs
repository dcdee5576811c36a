//! 测距传感器帧定义
//!
//! 帧格式（固定 9 字节）：
//!
//! ```text
//! [0]    [1]    [2]     [3]     [4]     [5]     [6]    [7]    [8]
//! 0x59   0x59   DIST_L  DIST_H  STR_L   STR_H   TMP_L  TMP_H  CHECKSUM
//! ```
//!
//! - 距离单位为厘米，小端 u16
//! - 校验和为前 8 字节累加和的低 8 位
//! - 默认不校验校验和（见 [`ChecksumPolicy`]）

use crate::ProtocolError;

/// 同步字节（帧头重复两次）
pub const SYNC_BYTE: u8 = 0x59;

/// 完整帧长度
pub const FRAME_LEN: usize = 9;

/// 校验和处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ChecksumPolicy {
    /// 尽力而为：尾部字节只消费，不校验
    #[default]
    Ignore,
    /// 严格：校验和不匹配视为损坏帧
    Verify,
}

/// 计算帧校验和（前 8 字节累加和的低 8 位）
///
/// 输入不足 8 字节时按实际长度累加。
pub fn frame_checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .take(FRAME_LEN - 1)
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 单个距离采样
///
/// `valid = false` 表示解码失败（帧头错位或校验失败），此时 `meters` 无意义。
/// "没有新采样"由解码器返回 `None` 表达，与 `valid = true, meters = 0.0` 的
/// 真实零距离读数互不混淆。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceSample {
    pub meters: f64,
    pub valid: bool,
}

impl DistanceSample {
    pub fn from_meters(meters: f64) -> Self {
        Self {
            meters,
            valid: true,
        }
    }

    pub fn from_millimeters(mm: u32) -> Self {
        Self::from_meters(mm as f64 / 1000.0)
    }

    pub fn invalid() -> Self {
        Self {
            meters: 0.0,
            valid: false,
        }
    }

    /// 有效时返回距离（米）
    pub fn distance_m(&self) -> Option<f64> {
        self.valid.then_some(self.meters)
    }
}

/// 解析后的传感器帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeFrame {
    /// 距离（厘米）
    pub distance_cm: u16,
    /// 信号强度
    pub strength: u16,
    /// 温度原始值
    pub temperature_raw: u16,
    /// 帧携带的校验和
    pub checksum: u8,
}

impl RangeFrame {
    /// 解析一个完整帧
    ///
    /// # 参数
    ///
    /// - `bytes`: 恰好 [`FRAME_LEN`] 字节
    /// - `policy`: 校验和处理策略
    pub fn parse(bytes: &[u8], policy: ChecksumPolicy) -> Result<Self, ProtocolError> {
        if bytes.len() != FRAME_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }

        if bytes[0] != SYNC_BYTE || bytes[1] != SYNC_BYTE {
            return Err(ProtocolError::BadSync {
                found: [bytes[0], bytes[1]],
            });
        }

        let carried = bytes[8];
        if policy == ChecksumPolicy::Verify {
            let computed = frame_checksum(bytes);
            if computed != carried {
                return Err(ProtocolError::ChecksumMismatch { computed, carried });
            }
        }

        Ok(Self {
            distance_cm: u16::from_le_bytes([bytes[2], bytes[3]]),
            strength: u16::from_le_bytes([bytes[4], bytes[5]]),
            temperature_raw: u16::from_le_bytes([bytes[6], bytes[7]]),
            checksum: carried,
        })
    }

    /// 构建帧字节（仿真和测试使用）
    pub fn encode(distance_cm: u16, strength: u16) -> [u8; FRAME_LEN] {
        let d = distance_cm.to_le_bytes();
        let s = strength.to_le_bytes();
        let mut frame = [SYNC_BYTE, SYNC_BYTE, d[0], d[1], s[0], s[1], 0, 0, 0];
        frame[8] = frame_checksum(&frame);
        frame
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_cm as f64 / 100.0
    }

    pub fn to_sample(&self) -> DistanceSample {
        DistanceSample::from_meters(self.distance_m())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_frame() {
        // 距离 0x00C8 = 200cm
        let bytes = [0x59, 0x59, 0xC8, 0x00, 0x10, 0x02, 0x00, 0x00, 0x00];
        let frame = RangeFrame::parse(&bytes, ChecksumPolicy::Ignore).unwrap();
        assert_eq!(frame.distance_cm, 200);
        assert_eq!(frame.strength, 0x0210);
        assert!((frame.distance_m() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_bad_sync() {
        let bytes = [0x59, 0x58, 0xC8, 0x00, 0, 0, 0, 0, 0];
        let err = RangeFrame::parse(&bytes, ChecksumPolicy::Ignore).unwrap_err();
        assert_eq!(err, ProtocolError::BadSync { found: [0x59, 0x58] });
    }

    #[test]
    fn test_parse_wrong_length() {
        let err = RangeFrame::parse(&[0x59, 0x59, 0x01], ChecksumPolicy::Ignore).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidLength {
                expected: 9,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_checksum_policy() {
        let mut bytes = RangeFrame::encode(150, 300);
        assert!(RangeFrame::parse(&bytes, ChecksumPolicy::Verify).is_ok());

        // 破坏校验和：尽力模式仍然接受，严格模式拒绝
        bytes[8] = bytes[8].wrapping_add(1);
        assert!(RangeFrame::parse(&bytes, ChecksumPolicy::Ignore).is_ok());
        assert!(matches!(
            RangeFrame::parse(&bytes, ChecksumPolicy::Verify),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_wraps() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        // 8 * 0xFF = 0x7F8 -> 低 8 位 0xF8
        assert_eq!(frame_checksum(&bytes), 0xF8);
    }

    #[test]
    fn test_zero_distance_is_valid_sample() {
        let bytes = RangeFrame::encode(0, 0);
        let sample = RangeFrame::parse(&bytes, ChecksumPolicy::Verify)
            .unwrap()
            .to_sample();
        assert!(sample.valid);
        assert_eq!(sample.distance_m(), Some(0.0));
        assert_eq!(DistanceSample::invalid().distance_m(), None);
    }
}
