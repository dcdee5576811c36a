//! 命令模块

pub mod config;
pub mod run;
pub mod simulate;
pub mod stats;

pub use config::{ConfigCommand, load_config};
pub use run::RunCommand;
pub use simulate::SimulateCommand;
pub use stats::StatsCommand;
