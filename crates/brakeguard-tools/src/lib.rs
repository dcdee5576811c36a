//! # brakeguard Tools - 仿真与离线分析
//!
//! ## 包含模块
//!
//! - `scenario` - 障碍物距离曲线与传感器字节流生成
//! - `simulation` - 基于真实控制器的闭环仿真与轨迹记录（JSON lines）
//! - `statistics` - 制动距离蒙特卡洛统计（可选）
//!
//! ## Feature Flags
//!
//! - `default` - 无默认 features
//! - `full` - 启用所有功能（包含 statistics）
//! - `statistics` - 启用统计模块
//!
//! ## 使用示例
//!
//! ```toml
//! # apps/cli/Cargo.toml - 需要统计
//! [dependencies]
//! brakeguard-tools = { workspace = true, features = ["full"] }
//! ```

pub mod scenario;
pub mod simulation;

#[cfg(feature = "statistics")]
pub mod statistics;

pub use scenario::{FeedEvent, Scenario, SensorFeed};
pub use simulation::{
    SimulationConfig, SimulationResult, SimulationSummary, TraceRecord, load_trace, run_simulation,
    save_trace, write_trace,
};
