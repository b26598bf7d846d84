//! 闭环仿真命令
//!
//! 在线性化的 7 自由度机械臂上运行姿态控制器，并打印最终误差。

use anyhow::{Context, Result};
use clap::Args;
use nalgebra::Vector6;
use osc_control::{
    EePostureController, LinearizedArm, OscConfig, TorqueController, run_closed_loop,
};
use osc_kernel::orientation_error;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// 仿真命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 配置文件路径（TOML），缺省时使用默认配置
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 仿真步数
    #[arg(short, long, default_value_t = 2000)]
    pub steps: usize,

    /// 末端增量动作 dx,dy,dz,ax,ay,az（归一化输入）
    #[arg(short, long, default_value = "0.05,0,0,0,0,0", allow_hyphen_values = true)]
    pub delta: String,

    /// 覆盖配置中的姿态增益
    #[arg(long)]
    pub posture_gain: Option<f64>,
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let mut config = match &self.config {
            Some(path) => OscConfig::load_from_file(path)
                .with_context(|| format!("加载配置失败: {}", path.display()))?,
            None => OscConfig::default(),
        };
        if let Some(gain) = self.posture_gain {
            config.posture.posture_gain = gain;
        }
        let delta = parse_delta(&self.delta)?;

        let dt = 1.0 / config.controller.control_freq;
        let mut arm = LinearizedArm::demo(dt).context("创建仿真机械臂失败")?;
        if config.posture.posture.len() != arm.num_joints() {
            anyhow::bail!(
                "姿态长度 {} 与仿真机械臂关节数 {} 不一致",
                config.posture.posture.len(),
                arm.num_joints()
            );
        }

        let mut ctrl = EePostureController::from_config(arm.shared_state(), &config)
            .context("创建控制器失败")?;
        ctrl.prewarm();
        ctrl.set_goal(&delta, None, None).context("设置目标失败")?;
        let goal = ctrl.goal().context("目标未设置")?.clone();

        info!(steps = self.steps, dt, "Starting closed-loop simulation");
        let start = Instant::now();
        let samples = run_closed_loop(&mut arm, &mut ctrl, self.steps).context("仿真失败")?;
        let elapsed = start.elapsed();

        let state = arm.robot_state();
        let position_error = (state.ee_pos - goal.position).norm();
        let ori_error = orientation_error(&goal.orientation, &state.ee_ori).norm();
        let posture_error = (ctrl.posture().posture() - arm.joint_pos()).norm();

        println!("✅ 仿真完成: {} 步, 耗时 {:.2?}", samples.len(), elapsed);
        println!("  末端位置:     {:?}", state.ee_pos.as_slice());
        println!("  目标位置:     {:?}", goal.position.as_slice());
        println!("  位置误差:     {:.3e} m", position_error);
        println!("  姿态误差:     {:.3e} rad", ori_error);
        println!("  关节姿态偏差: {:.3e} rad", posture_error);
        if let Some(last) = samples.last() {
            println!("  最终力矩范数: {:.4} N·m", last.torques.norm());
        }
        Ok(())
    }
}

/// 解析 6 维增量动作（逗号分隔）
pub fn parse_delta(s: &str) -> Result<Vector6<f64>> {
    let values: Vec<f64> = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().with_context(|| format!("无效数值: {}", part.trim())))
        .collect::<Result<Vec<_>>>()?;

    if values.len() != 6 {
        anyhow::bail!("增量动作需要 6 个值，实际为 {}", values.len());
    }
    Ok(Vector6::from_column_slice(&values))
}
