//! 配置检查命令

use anyhow::{Context, Result};
use clap::Args;
use osc_control::{InterpolatorConfig, OscConfig};
use std::path::PathBuf;
use tracing::info;

/// 配置检查命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 打印补全默认值后的完整配置
    #[arg(long)]
    pub print: bool,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let config = OscConfig::load_from_file(&self.config)
            .with_context(|| format!("加载配置失败: {}", self.config.display()))?;
        info!(path = %self.config.display(), "Config is valid");

        println!("{}", summary(&config));

        if self.print {
            println!();
            println!("{}", config.to_toml_string().context("序列化配置失败")?);
        }
        Ok(())
    }
}

/// 配置摘要
pub fn summary(config: &OscConfig) -> String {
    let controller = &config.controller;
    let kp = controller.kp();
    let kd = controller.kd();

    let mut lines = vec![
        "✅ 配置有效".to_string(),
        format!("  控制频率:   {} Hz", controller.control_freq),
        format!(
            "  kp:         [{:.1}, {:.1}, {:.1} | {:.1}, {:.1}, {:.1}]",
            kp[0], kp[1], kp[2], kp[3], kp[4], kp[5]
        ),
        format!(
            "  kd:         [{:.2}, {:.2}, {:.2} | {:.2}, {:.2}, {:.2}]",
            kd[0], kd[1], kd[2], kd[3], kd[4], kd[5]
        ),
        format!(
            "  模式:       {}",
            if controller.uncouple_pos_ori { "解耦" } else { "耦合" }
        ),
        format!(
            "  姿态:       {} 关节, 增益 {}",
            config.posture.posture.len(),
            config.posture.posture_gain
        ),
        format!("  位置插值:   {}", describe(config.interpolator_pos.as_ref())),
        format!("  姿态插值:   {}", describe(config.interpolator_ori.as_ref())),
    ];
    if controller.position_limits.is_some() {
        lines.push("  位置限位:   已启用".to_string());
    }
    if controller.orientation_limits.is_some() {
        lines.push("  姿态限位:   已启用".to_string());
    }

    lines.join("\n")
}

fn describe(interpolator: Option<&InterpolatorConfig>) -> String {
    match interpolator {
        None => "无".to_string(),
        Some(InterpolatorConfig::Linear {
            policy_freq,
            ramp_ratio,
        }) => format!("linear (policy_freq = {}, ramp_ratio = {})", policy_freq, ramp_ratio),
        Some(InterpolatorConfig::Cubic { duration }) => format!("cubic (duration = {} s)", duration),
    }
}
