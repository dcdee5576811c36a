//! # brakeguard Control
//!
//! 闭环安全控制器：
//!
//! - [`risk`]：TTC 风险分级、去抖滞回与制动锁存
//! - [`supervisor`]：上位机命令、心跳故障安全与控制权仲裁
//! - [`controller`]：单周期控制逻辑（传感器 → 分级 → 执行器 → 遥测）
//! - [`runner`]：固定周期调度（`spin_sleep`）
//! - [`config`]：TOML 配置
//!
//! # 示例
//!
//! ```rust,no_run
//! use brakeguard_control::{Controller, ControllerConfig, LoopConfig, run};
//! use brakeguard_driver::{EdgeCounter, NullServo};
//! use brakeguard_io::MockTransport;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), brakeguard_control::ControlError> {
//! let config = ControllerConfig::default();
//! let (sensor, _sensor_peer) = MockTransport::pair();
//! let (host, _host_peer) = MockTransport::pair();
//! let edges = Arc::new(EdgeCounter::new());
//!
//! let mut controller =
//!     Controller::new(config.clone(), sensor, host, NullServo, edges, Instant::now())?;
//! let shutdown = AtomicBool::new(false);
//! run(&mut controller, &LoopConfig::from_config(&config), &shutdown)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
mod error;
pub mod risk;
pub mod runner;
pub mod supervisor;

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerSnapshot, TickReport};
pub use error::ControlError;
pub use risk::{
    Assessment, FixedThresholds, HysteresisCounters, LatchEvent, RiskClassifier, RiskModel,
    RiskState, StoppingDistance, time_to_collision,
};
pub use runner::{LoopConfig, LoopSummary, run};
pub use supervisor::{Authority, Supervisor};
