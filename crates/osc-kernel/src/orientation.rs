//! 姿态误差与姿态限位
//!
//! 姿态误差在旋转群上计算（不是欧拉角相减）：
//!
//! ```text
//! R_err = R_desired · R_currentᵀ
//! e     = log(R_err)  （轴角向量，世界坐标系）
//! ```
//!
//! 经四元数求轴角，四元数双覆盖问题由 `UnitQuaternion::scaled_axis()` 统一处理：
//! 总是取转角 ∈ [0, π] 的较短旋转。

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// 计算从 `current` 转到 `desired` 的最小旋转误差（轴角向量）
///
/// # 性质
///
/// - `orientation_error(R, R) == 0`
/// - `orientation_error(A, B) == -orientation_error(B, A)`（转角严格小于 π 时）
/// - 对小误差与 `0.5 · Σ rcᵢ × rdᵢ` 一阶一致
///
/// # 示例
///
/// ```rust
/// use nalgebra::{Rotation3, Vector3};
/// use osc_kernel::orientation_error;
///
/// let current = Rotation3::identity().into_inner();
/// let desired = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3).into_inner();
///
/// let error = orientation_error(&desired, &current);
/// assert!((error - Vector3::new(0.0, 0.0, 0.3)).norm() < 1e-12);
/// ```
pub fn orientation_error(desired: &Matrix3<f64>, current: &Matrix3<f64>) -> Vector3<f64> {
    let relative = Rotation3::from_matrix_unchecked(desired * current.transpose());
    UnitQuaternion::from_rotation_matrix(&relative).scaled_axis()
}

/// 轴角向量转旋转矩阵
pub fn axis_angle_to_rotation(axis_angle: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_scaled_axis(*axis_angle).into_inner()
}

/// 旋转矩阵校验的默认容差
pub const ROTATION_TOLERANCE: f64 = 1e-6;

/// 是否为合法旋转矩阵（正交且行列式为 +1）
///
/// `‖R·Rᵀ − I‖_max ≤ tolerance` 且 `|det(R) − 1| ≤ tolerance`。
/// 含 NaN / Inf 的矩阵一律返回 `false`。
pub fn is_rotation_matrix(matrix: &Matrix3<f64>, tolerance: f64) -> bool {
    if matrix.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let orthogonality = (matrix * matrix.transpose() - Matrix3::identity()).amax();
    orthogonality <= tolerance && (matrix.determinant() - 1.0).abs() <= tolerance
}

/// 按 roll / pitch / yaw 限位裁剪旋转
///
/// `limits = [min, max]`，每个分量独立。当 `min > max` 时该轴的合法区间
/// 跨越 ±π（如 `[3.0, -3.0]` 表示 |θ| ≥ 3.0），区间外的值吸附到角距离更近的边界。
///
/// 返回 `(旋转, 是否被裁剪)`；未裁剪时原样返回输入矩阵。
pub fn clip_orientation(rotation: &Matrix3<f64>, limits: &[[f64; 3]; 2]) -> (Matrix3<f64>, bool) {
    let (roll, pitch, yaw) = Rotation3::from_matrix_unchecked(*rotation).euler_angles();
    let mut euler = [roll, pitch, yaw];

    let mut clipped = false;
    for (axis, angle) in euler.iter_mut().enumerate() {
        let (value, was_clipped) = clip_angle(*angle, limits[0][axis], limits[1][axis]);
        *angle = value;
        clipped |= was_clipped;
    }

    if !clipped {
        return (*rotation, false);
    }

    let limited = Rotation3::from_euler_angles(euler[0], euler[1], euler[2]).into_inner();
    (limited, true)
}

fn clip_angle(angle: f64, min: f64, max: f64) -> (f64, bool) {
    if min <= max {
        if angle < min {
            (min, true)
        } else if angle > max {
            (max, true)
        } else {
            (angle, false)
        }
    } else {
        // 合法区间为 [min, π] ∪ [-π, max]
        if angle >= min || angle <= max {
            return (angle, false);
        }
        let to_min = min - angle;
        let to_max = angle - max;
        if to_min <= to_max {
            (min, true)
        } else {
            (max, true)
        }
    }
}
