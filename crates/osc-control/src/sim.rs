//! 线性化仿真机械臂
//!
//! 常数质量矩阵、常数雅可比、常数偏置力矩，末端位姿在参考位形附近一阶展开：
//!
//! ```text
//! M · q̈ = τ - τ_bias
//! x     = x_ref + J_pos · (q - q_ref)
//! R     = exp(J_ori · (q - q_ref)) · R_ref
//! ```
//!
//! 采用半隐式欧拉积分。每步之后把新状态发布到 [`SharedState`]，
//! 控制器照常通过 [`StateProvider`](crate::StateProvider) 读取。

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::sync::Arc;
use tracing::debug;

use crate::config::DEFAULT_POSTURE;
use crate::controller::TorqueController;
use crate::error::{ControlError, Result};
use crate::state::{RobotState, SharedState};
use osc_kernel::{KernelError, SUBTASK_DIM, TASK_DIM, axis_angle_to_rotation};

/// 线性化机械臂
#[derive(Debug)]
pub struct LinearizedArm {
    mass_matrix: DMatrix<f64>,
    mass_inv: DMatrix<f64>,
    jacobian: DMatrix<f64>,
    torque_bias: DVector<f64>,
    q_ref: DVector<f64>,
    ee_pos_ref: Vector3<f64>,
    ee_ori_ref: Matrix3<f64>,
    q: DVector<f64>,
    qd: DVector<f64>,
    dt: f64,
    shared: Arc<SharedState>,
}

impl LinearizedArm {
    /// 创建仿真机械臂，初始关节位置即参考位形 `q_ref`
    ///
    /// # 参数
    ///
    /// - `mass_matrix`: 常数质量矩阵（n × n，对称正定）
    /// - `jacobian`: 常数全位姿雅可比（6 × n），前 3 行平移、后 3 行旋转
    /// - `torque_bias`: 重力 / 科氏力偏置（n），控制器需要补偿它
    /// - `q_ref`: 参考位形
    /// - `ee_pos_ref` / `ee_ori_ref`: 参考位形下的末端位姿
    /// - `dt`: 积分步长（秒）
    pub fn new(
        mass_matrix: DMatrix<f64>,
        jacobian: DMatrix<f64>,
        torque_bias: DVector<f64>,
        q_ref: DVector<f64>,
        ee_pos_ref: Vector3<f64>,
        ee_ori_ref: Matrix3<f64>,
        dt: f64,
    ) -> Result<Self> {
        let n = q_ref.len();
        if mass_matrix.shape() != (n, n) {
            return Err(ControlError::matrix_shape("mass_matrix", (n, n), mass_matrix.shape()));
        }
        if jacobian.shape() != (TASK_DIM, n) {
            return Err(ControlError::matrix_shape("jacobian", (TASK_DIM, n), jacobian.shape()));
        }
        if torque_bias.len() != n {
            return Err(ControlError::shape_mismatch("torque_bias", n, torque_bias.len()));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ControlError::invalid_config(
                "dt",
                format!("must be positive, got {}", dt),
            ));
        }

        let mass_inv = mass_matrix
            .clone()
            .cholesky()
            .map(|chol| chol.inverse())
            .ok_or(KernelError::MassMatrixNotInvertible { dim: n })?;

        let arm = Self {
            mass_matrix,
            mass_inv,
            jacobian,
            torque_bias,
            q: q_ref.clone(),
            qd: DVector::zeros(n),
            q_ref,
            ee_pos_ref,
            ee_ori_ref,
            dt,
            shared: Arc::new(SharedState::new()),
        };
        arm.publish();
        Ok(arm)
    }

    /// 7 自由度示例机械臂
    ///
    /// 质量矩阵对角占优，雅可比前 6 列为单位上三角（满秩），第 7 列是冗余关节；
    /// 初始位形为默认期望姿态，末端姿态为单位阵。
    pub fn demo(dt: f64) -> Result<Self> {
        let n = DEFAULT_POSTURE.len();

        let mass_matrix =
            DMatrix::from_fn(n, n, |r, c| if r == c { 1.0 + 0.2 * r as f64 } else { 0.05 });
        let jacobian = DMatrix::from_fn(TASK_DIM, n, |r, c| match c {
            c if c == r => 1.0,
            c if c == r + 1 && c < TASK_DIM => 0.2,
            c if c >= TASK_DIM => 0.1 * (r + 1) as f64,
            _ => 0.0,
        });
        let torque_bias = DVector::from_fn(n, |i, _| 2.0 - 0.3 * i as f64);

        Self::new(
            mass_matrix,
            jacobian,
            torque_bias,
            DVector::from_column_slice(&DEFAULT_POSTURE),
            Vector3::new(0.5, 0.0, 0.4),
            Matrix3::identity(),
            dt,
        )
    }

    /// 关节数
    pub fn num_joints(&self) -> usize {
        self.q.len()
    }

    /// 积分步长
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// 关节位置
    pub fn joint_pos(&self) -> &DVector<f64> {
        &self.q
    }

    /// 关节速度
    pub fn joint_vel(&self) -> &DVector<f64> {
        &self.qd
    }

    /// 参考位形
    pub fn reference_joint_pos(&self) -> &DVector<f64> {
        &self.q_ref
    }

    /// 质量矩阵
    pub fn mass_matrix(&self) -> &DMatrix<f64> {
        &self.mass_matrix
    }

    /// 全位姿雅可比
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    /// 控制器读取状态的共享单元
    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    /// 当前状态
    pub fn robot_state(&self) -> RobotState {
        let dq = &self.q - &self.q_ref;
        let j_pos = self.jacobian.rows(0, SUBTASK_DIM).into_owned();
        let j_ori = self.jacobian.rows(SUBTASK_DIM, SUBTASK_DIM).into_owned();

        let ee_pos = self.ee_pos_ref + to_vector3(&(&j_pos * &dq));
        let ee_ori = axis_angle_to_rotation(&to_vector3(&(&j_ori * &dq))) * self.ee_ori_ref;
        let ee_pos_vel = to_vector3(&(&j_pos * &self.qd));
        let ee_ori_vel = to_vector3(&(&j_ori * &self.qd));

        RobotState {
            mass_matrix: self.mass_matrix.clone(),
            j_full: self.jacobian.clone(),
            j_pos,
            j_ori,
            joint_pos: self.q.clone(),
            joint_vel: self.qd.clone(),
            ee_pos,
            ee_ori,
            ee_pos_vel,
            ee_ori_vel,
            torque_compensation: self.torque_bias.clone(),
        }
    }

    /// 施加力矩并前进一步
    pub fn step(&mut self, torques: &DVector<f64>) -> Result<()> {
        if torques.len() != self.num_joints() {
            return Err(ControlError::shape_mismatch("torques", self.num_joints(), torques.len()));
        }

        let qdd = &self.mass_inv * (torques - &self.torque_bias);
        self.qd += qdd * self.dt;
        self.q += &self.qd * self.dt;

        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.shared.publish(self.robot_state());
    }
}

fn to_vector3(v: &DVector<f64>) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// 闭环仿真的单步记录
#[derive(Debug, Clone, PartialEq)]
pub struct SimSample {
    /// 步序号
    pub step: usize,
    /// 施加的关节力矩
    pub torques: DVector<f64>,
    /// 施加力矩后的关节位置
    pub joint_pos: DVector<f64>,
    /// 施加力矩后的末端位置
    pub ee_pos: Vector3<f64>,
    /// 施加力矩后的末端姿态
    pub ee_ori: Matrix3<f64>,
}

/// 运行闭环仿真
///
/// 控制器必须读取 `arm.shared_state()`，且已经设置过目标。
///
/// # 错误
///
/// 任一周期失败时立即返回该错误。
pub fn run_closed_loop<C: TorqueController>(
    arm: &mut LinearizedArm,
    controller: &mut C,
    steps: usize,
) -> Result<Vec<SimSample>> {
    let mut samples = Vec::with_capacity(steps);

    for step in 0..steps {
        let torques = controller.run_controller()?;
        arm.step(&torques)?;

        let state = arm.robot_state();
        samples.push(SimSample {
            step,
            torques,
            joint_pos: state.joint_pos,
            ee_pos: state.ee_pos,
            ee_ori: state.ee_ori,
        });
    }

    debug!(steps, "Closed-loop simulation finished");
    Ok(samples)
}
