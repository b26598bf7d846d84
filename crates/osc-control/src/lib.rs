//! # OSC Control - 末端阻抗与零空间姿态控制器
//!
//! 在 [`osc_kernel`] 的数学核心之上编排每个控制周期：
//! 读取状态、解析参考轨迹、计算任务力旋量、映射为关节力矩、叠加零空间姿态项。
//!
//! ## 包含模块
//!
//! - `config` - 控制器 / 姿态 / 插值器配置（serde + TOML）
//! - `state` - 机器人状态快照与无锁共享
//! - `interpolator` - 线性与三次样条插值器
//! - `goal` - 目标状态与目标更新
//! - `controller` - `TorqueController` trait
//! - `impedance` - 末端阻抗控制器（任务空间 PD）
//! - `posture` - 零空间姿态增强控制器
//! - `sim` - 线性化仿真机械臂（`sim` feature）
//!
//! ## 控制循环
//!
//! ```text
//! 调度器: publish(state) → run_controller() → 下发力矩 → 等待下一个 tick
//! ```
//!
//! 同一控制器实例的 `run_controller()` 必须串行调用。

pub mod config;
pub mod controller;
pub mod error;
pub mod goal;
pub mod impedance;
pub mod interpolator;
pub mod posture;
pub mod state;

#[cfg(feature = "sim")]
pub mod sim;

// 重新导出常用类型
pub use config::{ControllerConfig, Gains, InterpolatorConfig, OscConfig, PostureConfig};
pub use controller::TorqueController;
pub use error::{ConfigError, ControlError, Result};
pub use goal::GoalState;
pub use impedance::{EeImpedanceController, task_wrench};
pub use interpolator::{
    CubicInterpolator, InterpolationOrder, Interpolator, LinearInterpolator, TrajectoryPoint,
};
pub use posture::{EePostureController, PostureTarget};
pub use state::{RobotState, SharedState, StateProvider};

#[cfg(feature = "sim")]
pub use sim::{LinearizedArm, SimSample, run_closed_loop};
