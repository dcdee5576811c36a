//! 运行命令
//!
//! 打开测距传感器与上位机两个串口，按配置周期运行控制循环，Ctrl-C 停止。
//! 轮速来自 `--wheel` 指定的采集板串口（`EDGES <n>` 行）。

use super::config::load_config;
use anyhow::{Context, Result, bail};
use brakeguard_control::{Controller, ControllerConfig, LoopConfig, run};
use brakeguard_driver::{DriverError, EdgeCounter, ServoOutput, WheelReader, pulse_width_us};
use brakeguard_io::SerialTransport;
use brakeguard_protocol::ControlMode;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 轮速串口轮询间隔
const WHEEL_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// 运行参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 测距传感器串口
    #[arg(long)]
    pub sensor: String,

    /// 上位机串口
    #[arg(long)]
    pub host: String,

    /// 轮速采集板串口
    #[arg(long)]
    pub wheel: Option<String>,

    /// 波特率
    #[arg(short, long, default_value_t = 115_200)]
    pub baud: u32,

    /// 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 最多运行的周期数（默认直到 Ctrl-C）
    #[arg(long)]
    pub iterations: Option<usize>,
}

/// 只记录 PWM 脉宽的舵机输出
///
/// 宿主机上没有 PWM 外设，位置变化时输出日志。
#[derive(Debug, Default)]
struct TracingServo {
    last_pulse_us: Option<u32>,
}

impl ServoOutput for TracingServo {
    fn write_position(&mut self, degrees: f64) -> Result<(), DriverError> {
        let pulse = pulse_width_us(degrees);
        if self.last_pulse_us != Some(pulse) {
            debug!("Servo -> {:.1}° ({} us)", degrees, pulse);
            self.last_pulse_us = Some(pulse);
        }
        Ok(())
    }
}

/// CORNER 启动需要速度来源：轮速串口或 DBG_SPEED 注入
fn check_speed_source(config: &ControllerConfig, wheel: Option<&str>) -> Result<()> {
    if config.control.boot_mode == ControlMode::Corner
        && wheel.is_none()
        && !config.link.debug_injection
    {
        bail!(
            "boot_mode = corner 需要速度来源：请指定 --wheel <port> 或启用 link.debug_injection"
        );
    }
    Ok(())
}

impl RunCommand {
    pub fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        check_speed_source(&config, self.wheel.as_deref())?;

        let sensor = SerialTransport::open(&self.sensor, self.baud)
            .with_context(|| format!("打开传感器串口失败: {}", self.sensor))?;
        let host = SerialTransport::open(&self.host, self.baud)
            .with_context(|| format!("打开上位机串口失败: {}", self.host))?;

        let edges = Arc::new(EdgeCounter::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let wheel_reader = match &self.wheel {
            Some(port) => {
                let transport = SerialTransport::open(port, self.baud)
                    .with_context(|| format!("打开轮速串口失败: {}", port))?;
                let handle = WheelReader::new(transport, Arc::clone(&edges))
                    .spawn(Arc::clone(&shutdown), WHEEL_POLL_INTERVAL)
                    .context("启动轮速读取线程失败")?;
                Some(handle)
            },
            None => {
                warn!("No wheel-speed input; speed stays 0 unless injected");
                None
            },
        };

        let mut loop_config = LoopConfig::from_config(&config);
        if let Some(n) = self.iterations {
            loop_config = loop_config.with_max_iterations(n);
        }

        let mut controller = Controller::new(
            config,
            sensor,
            host,
            TracingServo::default(),
            edges,
            Instant::now(),
        )?;

        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            s.store(true, Ordering::SeqCst);
            eprintln!("\n⚠️ 收到停止信号，正在退出...");
        })
        .context("注册 Ctrl-C 处理失败")?;

        println!("🚗 控制循环启动");
        println!("  传感器: {} @ {}", self.sensor, self.baud);
        println!("  上位机: {} @ {}", self.host, self.baud);
        if let Some(port) = &self.wheel {
            println!("  轮速: {} @ {}", port, self.baud);
        }
        println!("  周期: {:?}", loop_config.period);

        let result = run(&mut controller, &loop_config, &shutdown);
        shutdown.store(true, Ordering::SeqCst);
        let wheel_stats = match wheel_reader {
            Some(handle) => match handle.join() {
                Ok(stats) => Some(stats),
                Err(_) => {
                    warn!("Wheel reader thread panicked");
                    None
                },
            },
            None => None,
        };
        let summary = result?;
        let metrics = controller.metrics().snapshot();

        println!();
        println!("✅ 控制循环结束");
        println!("  周期数: {}", summary.iterations);
        println!("  超时: {}", summary.overruns);
        println!("  运行时间: {:.1} s", summary.elapsed.as_secs_f64());
        println!("  帧有效率: {:.1}%", metrics.frame_validity_percent());
        println!("  故障安全触发: {}", metrics.failsafe_triggers);
        println!("  锁存接合: {}", metrics.latch_engagements);
        if let Some(stats) = wheel_stats {
            info!(
                "Wheel reader: {} reports, {} edges, {} rejected",
                stats.reports, stats.edges, stats.rejected
            );
            println!("  轮速边沿: {} (报告 {})", stats.edges, stats.reports);
        }

        Ok(())
    }
}
