//! 驱动层模块
//!
//! 本模块提供制动控制器的底层组件：
//! - 测距传感器字节流解码（带重同步）
//! - 轮速边沿计数与速度估计（原子计数器，中断安全）
//! - 轮速采集板串口读取线程
//! - 上位机行缓冲与心跳监测
//! - 限速率的执行器位置规划
//! - 原子性能指标
//!
//! 所有组件都是同步、非阻塞的，由控制循环在每个周期内轮询。

pub mod actuator;
pub mod edge;
mod error;
pub mod heartbeat;
pub mod line;
pub mod metrics;
pub mod range;
pub mod speed;
pub mod wheel;

pub use actuator::{Actuator, ActuatorPositions, NullServo, ServoOutput, pulse_width_us};
pub use edge::EdgeCounter;
pub use error::DriverError;
pub use heartbeat::HeartbeatMonitor;
pub use line::LineReader;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use range::RangeDecoder;
pub use speed::{SpeedEstimator, SpeedParams, SpeedSample};
pub use wheel::{WheelReader, WheelStats};
