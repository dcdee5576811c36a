//! 制动统计命令

use super::config::load_config;
use anyhow::{Result, bail};
use brakeguard_tools::statistics::run_trials;
use clap::Args;
use std::path::PathBuf;

/// 统计参数
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// 试验次数
    #[arg(short, long, default_value_t = 1000)]
    pub trials: usize,

    /// 随机种子
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// 配置文件（使用其中的风险分级与控制周期）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(self) -> Result<()> {
        if self.trials == 0 {
            bail!("试验次数必须大于 0");
        }
        let config = load_config(self.config.as_deref())?;
        let (_, stats) = run_trials(&config.risk, config.period(), self.trials, self.seed);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("📊 制动统计（{} 次试验）", stats.trials);
        println!("  需要制动: {}", stats.brakes_needed);
        println!("  锁存接合: {}", stats.engaged);
        println!("  成功率: {:.1}%", stats.success_rate);
        println!(
            "  余量: 平均 {:.2} m, 标准差 {:.2} m, 最小 {:.2} m",
            stats.mean_margin_m, stats.std_dev_margin_m, stats.min_margin_m
        );
        Ok(())
    }
}
