//! 集成测试公共夹具
//!
//! 提供固定的满秩 6×7 雅可比、状态构造器和静态插值器。

#![allow(dead_code)]

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use osc_control::{InterpolationOrder, Interpolator, RobotState, TrajectoryPoint};

/// 关节数
pub const NUM_JOINTS: usize = 7;

/// 固定的满秩 6×7 雅可比
///
/// 行 (0, 2, 4) 只在列 (0, 1, 3, 5) 上有值，行 (1, 3, 5) 只在列 (0, 2, 4, 6) 上有值，
/// 按块三角结构可以直接验证满秩。
pub fn fixed_jacobian() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        6,
        NUM_JOINTS,
        &[
            0.10, 0.45, 0.00, -0.30, 0.00, 0.12, 0.00, //
            0.55, 0.00, 0.40, 0.00, 0.10, 0.00, 0.05, //
            0.00, -0.50, 0.00, 0.35, 0.00, 0.20, 0.00, //
            0.00, 0.00, -0.40, 0.00, 0.70, 0.00, 0.30, //
            0.00, 1.00, 0.00, -1.00, 0.00, 1.00, 0.00, //
            1.00, 0.00, 0.90, 0.00, 0.30, 0.00, -0.60,
        ],
    )
}

/// 平移 / 旋转完全解耦的雅可比：平移只用关节 0..3，旋转只用关节 3..6
pub fn block_diagonal_jacobian() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        6,
        NUM_JOINTS,
        &[
            0.8, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0, //
            0.1, 0.9, 0.3, 0.0, 0.0, 0.0, 0.0, //
            0.0, -0.2, 0.7, 0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.4, 0.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, 1.1, -0.3, 0.0, //
            0.0, 0.0, 0.0, 0.2, 0.0, 0.9, 0.0,
        ],
    )
}

/// 固定的补偿力矩
pub fn compensation() -> DVector<f64> {
    DVector::from_column_slice(&[0.5, -1.2, 0.3, 2.0, -0.1, 0.7, 0.05])
}

/// 状态构造器
///
/// 默认：`M = I`，固定雅可比，关节静止于零位，末端姿态为单位阵。
#[derive(Debug, Clone)]
pub struct StateBuilder {
    state: RobotState,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self::with_jacobian(fixed_jacobian())
    }

    pub fn with_jacobian(j_full: DMatrix<f64>) -> Self {
        Self {
            state: RobotState {
                mass_matrix: DMatrix::identity(NUM_JOINTS, NUM_JOINTS),
                j_pos: j_full.rows(0, 3).into_owned(),
                j_ori: j_full.rows(3, 3).into_owned(),
                j_full,
                joint_pos: DVector::zeros(NUM_JOINTS),
                joint_vel: DVector::zeros(NUM_JOINTS),
                ee_pos: Vector3::new(0.4, 0.0, 0.5),
                ee_ori: Matrix3::identity(),
                ee_pos_vel: Vector3::zeros(),
                ee_ori_vel: Vector3::zeros(),
                torque_compensation: compensation(),
            },
        }
    }

    pub fn mass_matrix(mut self, mass_matrix: DMatrix<f64>) -> Self {
        self.state.mass_matrix = mass_matrix;
        self
    }

    pub fn joint_pos(mut self, joint_pos: DVector<f64>) -> Self {
        self.state.joint_pos = joint_pos;
        self
    }

    pub fn joint_vel(mut self, joint_vel: DVector<f64>) -> Self {
        self.state.joint_vel = joint_vel;
        self
    }

    pub fn ee_velocity(mut self, linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        self.state.ee_pos_vel = linear;
        self.state.ee_ori_vel = angular;
        self
    }

    pub fn ee_orientation(mut self, ee_ori: Matrix3<f64>) -> Self {
        self.state.ee_ori = ee_ori;
        self
    }

    pub fn build(self) -> RobotState {
        self.state
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 对称正定但非对角的质量矩阵
pub fn coupled_mass_matrix() -> DMatrix<f64> {
    DMatrix::from_fn(NUM_JOINTS, NUM_JOINTS, |r, c| {
        if r == c { 1.5 + 0.1 * r as f64 } else { 0.08 }
    })
}

/// 静态插值器：总是返回目标本身，速度 / 加速度为 0
#[derive(Debug, Default)]
pub struct HoldInterpolator {
    goal: Option<Vector3<f64>>,
    pub queries: usize,
}

impl Interpolator for HoldInterpolator {
    fn order(&self) -> InterpolationOrder {
        InterpolationOrder::Acceleration
    }

    fn set_goal(&mut self, goal: Vector3<f64>) {
        self.goal = Some(goal);
    }

    fn interpolated_goal(&mut self, current: &Vector3<f64>) -> TrajectoryPoint {
        self.queries += 1;
        TrajectoryPoint::hold(self.goal.unwrap_or(*current))
    }
}
