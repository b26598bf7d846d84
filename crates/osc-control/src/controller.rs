//! TorqueController trait - 力矩控制器通用接口
//!
//! # 设计理念
//!
//! - **Tick 模式**: 外部调度器按固定频率先发布状态、再调用 `run_controller()`
//! - **单线程**: 同一控制器实例不允许并发调用 `run_controller()`
//! - **无部分结果**: 一个周期要么返回完整力矩，要么返回错误
//!
//! # 示例
//!
//! ```rust
//! use nalgebra::Vector6;
//! use osc_control::{ControlError, TorqueController};
//!
//! fn step<C: TorqueController>(controller: &mut C) -> Result<usize, ControlError> {
//!     controller.set_goal(&Vector6::zeros(), None, None)?;
//!     let torques = controller.run_controller()?;
//!     Ok(torques.len())
//! }
//! ```

use nalgebra::{DVector, Matrix3, Vector3, Vector6};

use crate::error::Result;

/// 力矩控制器通用接口
///
/// # 生命周期
///
/// - **设置目标**: `set_goal()`，至少调用一次
/// - **运行**: 每个控制周期调用 `run_controller()`
/// - **重置**: `reset()` 清除目标与缓存力矩，之后需重新设置目标
///
/// # 线程安全
///
/// `TorqueController` 本身不要求 `Sync`。调度器负责串行化对同一实例的调用。
pub trait TorqueController {
    /// 更新目标
    ///
    /// # 参数
    ///
    /// - `delta`: 6 维动作 `[dx, dy, dz, ax, ay, az]`（经动作缩放后叠加到当前位姿）
    /// - `set_pos`: 绝对位置目标（给出时忽略 `delta` 的平移部分）
    /// - `set_ori`: 绝对姿态目标（给出时忽略 `delta` 的旋转部分）
    fn set_goal(
        &mut self,
        delta: &Vector6<f64>,
        set_pos: Option<Vector3<f64>>,
        set_ori: Option<Matrix3<f64>>,
    ) -> Result<()>;

    /// 运行一个控制周期，返回关节力矩
    ///
    /// # 错误
    ///
    /// - [`ControlError::GoalNotSet`](crate::ControlError::GoalNotSet): 从未设置目标
    /// - [`ControlError::StateUnavailable`](crate::ControlError::StateUnavailable): 状态提供者无数据
    fn run_controller(&mut self) -> Result<DVector<f64>>;

    /// 清除目标与缓存力矩
    fn reset(&mut self);
}
