//! 零空间姿态力矩
//!
//! 关节空间 PD，把关节位置拉向期望姿态（posture），再经零空间投影，
//! 使其对末端任务不产生任何影响。
//!
//! # 算法
//!
//! ```text
//! kv  = 2 · sqrt(kp)                        （临界阻尼）
//! τ_p = M · (kp · (q_d - q) - kv · q̇)
//! τ_n = Nᵀ · τ_p
//! ```
//!
//! 乘以 `M` 后每个关节的闭环动力学为 `q̈ = kp · e - kv · q̇`，即临界阻尼二阶系统。

use nalgebra::{DMatrix, DVector};

use crate::error::{KernelError, Result};

/// 默认姿态增益
pub const DEFAULT_POSTURE_GAIN: f64 = 10.0;

/// 计算零空间姿态力矩
///
/// # 参数
///
/// - `mass_matrix`: 质量矩阵 `M`（n × n）
/// - `nullspace_matrix`: 零空间投影 `N`（n × n），来自 [`opspace_matrices`](crate::opspace_matrices)
/// - `initial_joint`: 期望姿态 `q_d`（长度 n）
/// - `joint_pos`: 当前关节位置（长度 n）
/// - `joint_vel`: 当前关节速度（长度 n）
/// - `posture_gain`: 比例增益 `kp ≥ 0`，为 0 时直接返回零向量
///
/// # 错误
///
/// 任一输入维度与 `joint_pos` 不一致时返回 [`KernelError::ShapeMismatch`]，
/// 不做截断或补零。增益为负或非有限值时返回 [`KernelError::InvalidParameter`]。
pub fn nullspace_torques(
    mass_matrix: &DMatrix<f64>,
    nullspace_matrix: &DMatrix<f64>,
    initial_joint: &DVector<f64>,
    joint_pos: &DVector<f64>,
    joint_vel: &DVector<f64>,
    posture_gain: f64,
) -> Result<DVector<f64>> {
    let n = joint_pos.len();

    if initial_joint.len() != n {
        return Err(KernelError::vector_len("initial_joint", n, initial_joint.len()));
    }
    if joint_vel.len() != n {
        return Err(KernelError::vector_len("joint_vel", n, joint_vel.len()));
    }
    if mass_matrix.shape() != (n, n) {
        return Err(KernelError::matrix_shape("mass_matrix", (n, n), mass_matrix.shape()));
    }
    if nullspace_matrix.shape() != (n, n) {
        return Err(KernelError::matrix_shape(
            "nullspace_matrix",
            (n, n),
            nullspace_matrix.shape(),
        ));
    }
    if !posture_gain.is_finite() || posture_gain < 0.0 {
        return Err(KernelError::InvalidParameter {
            param: "posture_gain",
            value: posture_gain,
        });
    }

    if posture_gain == 0.0 {
        return Ok(DVector::zeros(n));
    }

    let posture_damping = 2.0 * posture_gain.sqrt();
    let pose_accel = (initial_joint - joint_pos) * posture_gain - joint_vel * posture_damping;
    let pose_torques = mass_matrix * pose_accel;

    Ok(nullspace_matrix.transpose() * pose_torques)
}
