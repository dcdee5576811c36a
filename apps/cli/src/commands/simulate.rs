//! 仿真命令

use super::config::load_config;
use anyhow::{Result, bail};
use brakeguard_protocol::ControlMode;
use brakeguard_tools::{Scenario, SimulationConfig, SimulationSummary, run_simulation, save_trace};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// 启动后切换到的控制权模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Normal,
    Corner,
}

impl From<ModeArg> for ControlMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => ControlMode::Normal,
            ModeArg::Corner => ControlMode::Corner,
        }
    }
}

/// 仿真参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 场景（cruise, approach, dropout）
    #[arg(short, long, default_value = "approach")]
    pub scenario: Scenario,

    /// 仿真时长（秒）
    #[arg(short, long, default_value_t = 10.0)]
    pub duration_s: f64,

    /// 初速度（m/s）
    #[arg(long, default_value_t = 2.0)]
    pub speed_mps: f64,

    /// 随机种子
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// 控制权模式
    #[arg(short, long, value_enum, default_value_t = ModeArg::Corner)]
    pub mode: ModeArg,

    /// 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 轨迹输出（JSON lines）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 不发送心跳
    #[arg(long, conflicts_with = "heartbeat_loss_s")]
    pub no_heartbeat: bool,

    /// 在该时刻（秒）停止发送心跳
    #[arg(long)]
    pub heartbeat_loss_s: Option<f64>,

    /// 以 JSON 输出摘要
    #[arg(long)]
    pub json: bool,
}

impl SimulateCommand {
    fn to_config(&self) -> Result<SimulationConfig> {
        if !(self.duration_s.is_finite() && self.duration_s > 0.0) {
            bail!("仿真时长必须大于 0: {}", self.duration_s);
        }
        if !(self.speed_mps.is_finite() && self.speed_mps >= 0.0) {
            bail!("初速度不能为负: {}", self.speed_mps);
        }
        let heartbeat_loss_at = match self.heartbeat_loss_s {
            Some(s) if !(s.is_finite() && s >= 0.0) => bail!("心跳中断时刻不能为负: {}", s),
            Some(s) => Some(Duration::from_secs_f64(s)),
            None => None,
        };

        let defaults = SimulationConfig::default();
        Ok(SimulationConfig {
            scenario: self.scenario,
            duration: Duration::from_secs_f64(self.duration_s),
            initial_speed_mps: self.speed_mps,
            seed: self.seed,
            mode: self.mode.into(),
            heartbeat_interval: if self.no_heartbeat {
                None
            } else {
                defaults.heartbeat_interval
            },
            heartbeat_loss_at,
            controller: match &self.config {
                Some(path) => load_config(Some(path))?,
                None => defaults.controller.clone(),
            },
            ..defaults
        })
    }

    pub fn execute(self) -> Result<()> {
        let config = self.to_config()?;
        let result = run_simulation(&config)?;

        if let Some(path) = &self.output {
            save_trace(&result.records, path)?;
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result.summary)?);
        } else {
            print_summary(&result.summary);
            if let Some(path) = &self.output {
                println!("  轨迹: {}", path.display());
            }
        }
        Ok(())
    }
}

fn print_summary(summary: &SimulationSummary) {
    let ms = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |t| format!("{} ms", t));

    println!("📊 仿真结果: {}", summary.scenario);
    println!("  周期数: {}", summary.ticks);
    println!("  首次制动: {}", ms(summary.first_brake_ms));
    println!("  停车时刻: {}", ms(summary.stopped_at_ms));
    println!("  制动事件: {}", summary.brake_events);
    if let Some(d) = summary.min_distance_m {
        println!("  最近距离: {:.2} m", d);
    }
    println!(
        "  速度: {:.2} → {:.2} m/s",
        summary.initial_speed_mps, summary.final_speed_mps
    );
    println!(
        "  帧有效率: {:.1}%",
        summary.metrics.frame_validity_percent()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> SimulateCommand {
        SimulateCommand {
            scenario: Scenario::Cruise,
            duration_s: 2.5,
            speed_mps: 1.0,
            seed: 3,
            mode: ModeArg::Normal,
            config: None,
            output: None,
            no_heartbeat: false,
            heartbeat_loss_s: Some(1.0),
            json: false,
        }
    }

    #[test]
    fn test_to_config() {
        let config = command().to_config().unwrap();
        assert_eq!(config.duration, Duration::from_millis(2500));
        assert_eq!(config.mode, ControlMode::Normal);
        assert_eq!(config.heartbeat_loss_at, Some(Duration::from_secs(1)));
        assert!(config.heartbeat_interval.is_some());
        assert_eq!(config.seed, 3);
    }

    #[test]
    fn test_no_heartbeat() {
        let mut cmd = command();
        cmd.no_heartbeat = true;
        cmd.heartbeat_loss_s = None;
        assert_eq!(cmd.to_config().unwrap().heartbeat_interval, None);
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let mut cmd = command();
        cmd.duration_s = 0.0;
        assert!(cmd.to_config().is_err());

        let mut cmd = command();
        cmd.speed_mps = -1.0;
        assert!(cmd.to_config().is_err());
    }
}
