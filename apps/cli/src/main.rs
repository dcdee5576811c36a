//! # brakeguard CLI
//!
//! 防碰撞制动控制器的命令行工具。
//!
//! ```bash
//! # 连接真实硬件：测距传感器 + 上位机串口
//! brakeguard-cli run --sensor /dev/ttyUSB0 --host /dev/ttyACM0 --wheel /dev/ttyUSB1
//!
//! # 闭环仿真（无硬件）
//! brakeguard-cli simulate --scenario approach --mode corner --output trace.jsonl
//!
//! # 蒙特卡洛制动统计
//! brakeguard-cli stats --trials 1000
//!
//! # 配置管理
//! brakeguard-cli config init ~/.config/brakeguard/config.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, RunCommand, SimulateCommand, StatsCommand};

/// brakeguard CLI - 防碰撞制动控制器
#[derive(Parser, Debug)]
#[command(name = "brakeguard-cli")]
#[command(about = "Command-line interface for the brakeguard brake controller", long_about = None)]
#[command(version)]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 连接串口运行控制循环
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 闭环仿真
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 蒙特卡洛制动统计
    Stats {
        #[command(flatten)]
        args: StatsCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志（RUST_LOG 优先）
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("brakeguard_cli={}", level).parse()?)
                .add_directive(format!("brakeguard_control={}", level).parse()?)
                .add_directive(format!("brakeguard_driver={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Run { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
        Commands::Stats { args } => args.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "brakeguard-cli",
            "run",
            "--sensor",
            "/dev/ttyUSB0",
            "--host",
            "/dev/ttyACM0",
            "--wheel",
            "/dev/ttyUSB1",
            "--iterations",
            "5",
        ])
        .unwrap();

        let Commands::Run { args } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.sensor, "/dev/ttyUSB0");
        assert_eq!(args.host, "/dev/ttyACM0");
        assert_eq!(args.wheel.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(args.baud, 115_200);
        assert_eq!(args.iterations, Some(5));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_run_requires_sensor_and_host() {
        let result = Cli::try_parse_from(["brakeguard-cli", "run", "--sensor", "/dev/ttyUSB0"]);
        assert!(result.is_err());
    }
}
