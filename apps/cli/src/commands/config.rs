//! 配置管理命令
//!
//! 默认配置文件位于 `<config_dir>/brakeguard/config.toml`，不存在时使用内置默认值。

use anyhow::{Context, Result, anyhow};
use brakeguard_control::ControllerConfig;
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("无法确定配置目录"))?;
    path.push("brakeguard");
    path.push("config.toml");
    Ok(path)
}

/// 加载控制器配置
///
/// 显式路径必须存在；未指定时尝试默认路径，再退回内置默认值。
pub fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    if let Some(path) = path {
        return ControllerConfig::load_from_file(path)
            .with_context(|| format!("加载配置文件失败: {}", path.display()));
    }

    let default_path = default_config_path()?;
    if default_path.exists() {
        tracing::debug!("Using config {}", default_path.display());
        return ControllerConfig::load_from_file(&default_path)
            .with_context(|| format!("加载配置文件失败: {}", default_path.display()));
    }

    Ok(ControllerConfig::default())
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置（TOML）
    Show {
        /// 配置文件（默认使用配置目录中的文件）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 校验配置文件
    Check {
        /// 配置文件路径
        file: PathBuf,
    },

    /// 写出默认配置
    Init {
        /// 目标路径
        file: PathBuf,

        /// 覆盖已有文件
        #[arg(short, long)]
        force: bool,
    },

    /// 打印默认配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { config } => Self::show_(config.as_deref()),
            ConfigCommand::Check { file } => Self::check_(&file),
            ConfigCommand::Init { file, force } => Self::init_(&file, force),
            ConfigCommand::Path => {
                println!("{}", default_config_path()?.display());
                Ok(())
            },
        }
    }

    fn show_(path: Option<&Path>) -> Result<()> {
        let config = load_config(path)?;
        print!("{}", config.to_toml_string()?);
        Ok(())
    }

    fn check_(file: &Path) -> Result<()> {
        let config = load_config(Some(file))?;
        println!("✅ 配置有效: {}", file.display());
        println!("  周期: {} ms", config.control.period_ms);
        println!("  上电模式: {}", config.control.boot_mode);
        println!("  风险模型: {}", config.risk.build_classifier().model_name());
        println!("  心跳超时: {} ms", config.link.heartbeat_timeout_ms);
        println!(
            "  调试注入: {}",
            if config.link.debug_injection { "启用" } else { "禁用" }
        );
        Ok(())
    }

    fn init_(file: &Path, force: bool) -> Result<()> {
        if file.exists() && !force {
            return Err(anyhow!(
                "文件已存在: {}（使用 --force 覆盖）",
                file.display()
            ));
        }
        if let Some(parent) = file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }

        ControllerConfig::default()
            .save_to_file(file)
            .with_context(|| format!("写入配置文件失败: {}", file.display()))?;
        println!("✅ 已写入默认配置: {}", file.display());
        Ok(())
    }
}
