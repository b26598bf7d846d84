//! 机器人状态与状态提供者
//!
//! 质量矩阵、雅可比等动力学量由外部模型（仿真器 / 运动学库）计算，
//! 控制器每个周期只读取一次快照。
//!
//! # 同步模型
//!
//! [`SharedState`] 基于 `ArcSwapOption`：调度线程每个 tick 发布一份新快照，
//! 控制器无锁读取。一个周期内控制器只持有同一份 `Arc<RobotState>`，
//! 因此看到的所有量都来自同一时刻。

use arc_swap::ArcSwapOption;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::fmt;
use std::sync::Arc;

use crate::error::{ControlError, Result};
use osc_kernel::{ROTATION_TOLERANCE, SUBTASK_DIM, TASK_DIM, is_rotation_matrix};

/// 一个时刻的机器人动力学 / 运动学状态
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    /// 质量矩阵 M（n × n，对称正定）
    pub mass_matrix: DMatrix<f64>,

    /// 全位姿雅可比（6 × n）
    pub j_full: DMatrix<f64>,

    /// 平移雅可比（3 × n）
    pub j_pos: DMatrix<f64>,

    /// 旋转雅可比（3 × n）
    pub j_ori: DMatrix<f64>,

    /// 关节位置（n）
    pub joint_pos: DVector<f64>,

    /// 关节速度（n）
    pub joint_vel: DVector<f64>,

    /// 末端位置（世界坐标系）
    pub ee_pos: Vector3<f64>,

    /// 末端姿态（旋转矩阵）
    pub ee_ori: Matrix3<f64>,

    /// 末端线速度
    pub ee_pos_vel: Vector3<f64>,

    /// 末端角速度
    pub ee_ori_vel: Vector3<f64>,

    /// 重力 / 科氏力补偿力矩（n）
    pub torque_compensation: DVector<f64>,
}

impl RobotState {
    /// 关节数
    pub fn num_joints(&self) -> usize {
        self.joint_pos.len()
    }

    /// 检查维度与数值有效性
    ///
    /// # 错误
    ///
    /// - [`ControlError::ShapeMismatch`]: 任一量的维度与关节数不一致
    /// - [`ControlError::NonFiniteState`]: 任一量含 NaN / Inf
    /// - [`ControlError::InvalidRotation`]: `ee_ori` 不是正交且行列式为 +1 的矩阵
    pub fn validate(&self) -> Result<()> {
        let n = self.num_joints();
        if n == 0 {
            return Err(ControlError::shape_mismatch("joint_pos", "at least 1", 0));
        }

        let matrices = [
            ("mass_matrix", &self.mass_matrix, n),
            ("j_full", &self.j_full, TASK_DIM),
            ("j_pos", &self.j_pos, SUBTASK_DIM),
            ("j_ori", &self.j_ori, SUBTASK_DIM),
        ];
        for (what, matrix, rows) in matrices {
            if matrix.shape() != (rows, n) {
                return Err(ControlError::matrix_shape(what, (rows, n), matrix.shape()));
            }
        }

        let vectors = [
            ("joint_vel", &self.joint_vel),
            ("torque_compensation", &self.torque_compensation),
        ];
        for (what, vector) in vectors {
            if vector.len() != n {
                return Err(ControlError::shape_mismatch(what, n, vector.len()));
            }
        }

        let finite = [
            ("mass_matrix", self.mass_matrix.iter().all(|v| v.is_finite())),
            ("j_full", self.j_full.iter().all(|v| v.is_finite())),
            ("j_pos", self.j_pos.iter().all(|v| v.is_finite())),
            ("j_ori", self.j_ori.iter().all(|v| v.is_finite())),
            ("joint_pos", self.joint_pos.iter().all(|v| v.is_finite())),
            ("joint_vel", self.joint_vel.iter().all(|v| v.is_finite())),
            ("ee_pos", self.ee_pos.iter().all(|v| v.is_finite())),
            ("ee_ori", self.ee_ori.iter().all(|v| v.is_finite())),
            ("ee_pos_vel", self.ee_pos_vel.iter().all(|v| v.is_finite())),
            ("ee_ori_vel", self.ee_ori_vel.iter().all(|v| v.is_finite())),
            (
                "torque_compensation",
                self.torque_compensation.iter().all(|v| v.is_finite()),
            ),
        ];
        if let Some((field, _)) = finite.iter().find(|(_, ok)| !*ok) {
            return Err(ControlError::NonFiniteState { field: *field });
        }

        if !is_rotation_matrix(&self.ee_ori, ROTATION_TOLERANCE) {
            return Err(ControlError::InvalidRotation { field: "ee_ori" });
        }

        Ok(())
    }
}

/// 状态提供者
///
/// 返回 `None` 表示当前没有可用状态（例如仿真尚未启动），
/// 控制器会以 [`ControlError::StateUnavailable`] 中止周期，而不是输出零力矩。
pub trait StateProvider {
    /// 当前时刻的状态快照
    fn robot_state(&self) -> Option<Arc<RobotState>>;
}

impl<P: StateProvider + ?Sized> StateProvider for Arc<P> {
    fn robot_state(&self) -> Option<Arc<RobotState>> {
        (**self).robot_state()
    }
}

impl<P: StateProvider + ?Sized> StateProvider for &P {
    fn robot_state(&self) -> Option<Arc<RobotState>> {
        (**self).robot_state()
    }
}

/// 可跨线程共享的状态单元
///
/// # 性能
///
/// - 无锁读取（`ArcSwapOption::load_full`）
/// - 发布新快照只交换指针，不复制矩阵
#[derive(Default)]
pub struct SharedState {
    cell: ArcSwapOption<RobotState>,
}

impl SharedState {
    /// 创建空状态单元
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并发布初始状态
    pub fn with_state(state: RobotState) -> Self {
        Self {
            cell: ArcSwapOption::from_pointee(state),
        }
    }

    /// 发布新快照
    pub fn publish(&self, state: RobotState) {
        self.cell.store(Some(Arc::new(state)));
    }

    /// 清空状态（之后的控制周期将返回 `StateUnavailable`）
    pub fn clear(&self) {
        self.cell.store(None);
    }

    /// 是否有可用状态
    pub fn is_available(&self) -> bool {
        self.cell.load().is_some()
    }
}

impl StateProvider for SharedState {
    fn robot_state(&self) -> Option<Arc<RobotState>> {
        self.cell.load_full()
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("available", &self.is_available())
            .finish()
    }
}
