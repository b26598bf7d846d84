//! 操作空间矩阵
//!
//! 由关节空间质量矩阵 `M` 和任务雅可比 `J` 计算任务空间等效惯量
//! 与动力学一致的零空间投影矩阵。
//!
//! # 算法
//!
//! ```text
//! Λ = (J · M⁻¹ · Jᵀ)⁻¹            （全位姿 / 平移 / 旋转各一份）
//! J̄ = M⁻¹ · Jᵀ · Λ_full           （动力学一致的广义逆）
//! N = I - J̄ · J_full               （n × n）
//! ```
//!
//! `N` 满足 `J_full · N = 0`。零空间力矩按 `Nᵀ · τ` 投影，
//! 投影后的力矩在任务空间产生的加速度 `J · M⁻¹ · Nᵀ · τ` 恒为零。
//!
//! # 奇异处理
//!
//! `J · M⁻¹ · Jᵀ` 在运动学奇异位形附近接近奇异。这里使用截断 SVD 伪逆：
//! 相对最大奇异值小于 `rcond` 的方向被置零（该方向等效刚度降为零），
//! 函数不会因此失败。被截断的方向数记录在 [`OpspaceMatrices::clipped_directions`]。

use nalgebra::DMatrix;
use tracing::debug;

use crate::error::{KernelError, Result};
use crate::{SUBTASK_DIM, TASK_DIM};

/// 默认的相对奇异值截断阈值
pub const DEFAULT_RCOND: f64 = 1e-8;

/// 一个控制周期的操作空间矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct OpspaceMatrices {
    /// 全位姿任务惯量 Λ_full（6 × 6）
    pub lambda_full: DMatrix<f64>,

    /// 平移任务惯量 Λ_pos（3 × 3）
    pub lambda_pos: DMatrix<f64>,

    /// 旋转任务惯量 Λ_ori（3 × 3）
    pub lambda_ori: DMatrix<f64>,

    /// 零空间投影 N（n × n），满足 `J_full · N = 0`
    pub nullspace: DMatrix<f64>,

    /// 三次求逆中被截断的奇异方向总数（诊断用）
    pub clipped_directions: usize,
}

impl OpspaceMatrices {
    /// 关节数
    pub fn num_joints(&self) -> usize {
        self.nullspace.nrows()
    }

    /// 是否有奇异方向被截断
    pub fn is_degenerate(&self) -> bool {
        self.clipped_directions > 0
    }

    /// 拆成 `(Λ_full, Λ_pos, Λ_ori, N)`
    pub fn into_parts(self) -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        (self.lambda_full, self.lambda_pos, self.lambda_ori, self.nullspace)
    }
}

/// 计算操作空间矩阵（使用 [`DEFAULT_RCOND`]）
///
/// # 参数
///
/// - `mass_matrix`: 关节空间质量矩阵 `M`（n × n，对称正定）
/// - `j_full`: 全位姿雅可比（6 × n）
/// - `j_pos`: 平移雅可比（3 × n）
/// - `j_ori`: 旋转雅可比（3 × n）
///
/// # 错误
///
/// - [`KernelError::ShapeMismatch`]: 维度不一致
/// - [`KernelError::NonFinite`]: 输入含 NaN / Inf
/// - [`KernelError::MassMatrixNotInvertible`]: `M` 不可逆
///
/// 任务空间惯量奇异**不是**错误。
pub fn opspace_matrices(
    mass_matrix: &DMatrix<f64>,
    j_full: &DMatrix<f64>,
    j_pos: &DMatrix<f64>,
    j_ori: &DMatrix<f64>,
) -> Result<OpspaceMatrices> {
    opspace_matrices_with_rcond(mass_matrix, j_full, j_pos, j_ori, DEFAULT_RCOND)
}

/// 计算操作空间矩阵，指定相对奇异值截断阈值 `rcond`
pub fn opspace_matrices_with_rcond(
    mass_matrix: &DMatrix<f64>,
    j_full: &DMatrix<f64>,
    j_pos: &DMatrix<f64>,
    j_ori: &DMatrix<f64>,
    rcond: f64,
) -> Result<OpspaceMatrices> {
    let n = check_mass_matrix(mass_matrix)?;
    check_jacobian("J_full", j_full, TASK_DIM, n)?;
    check_jacobian("J_pos", j_pos, SUBTASK_DIM, n)?;
    check_jacobian("J_ori", j_ori, SUBTASK_DIM, n)?;

    let mass_inv = invert_mass_matrix(mass_matrix)?;

    let (lambda_full, clipped_full) = task_inertia(j_full, &mass_inv, rcond)?;
    let (lambda_pos, clipped_pos) = task_inertia(j_pos, &mass_inv, rcond)?;
    let (lambda_ori, clipped_ori) = task_inertia(j_ori, &mass_inv, rcond)?;

    // N = I - M⁻¹ Jᵀ Λ J
    let j_bar = &mass_inv * j_full.transpose() * &lambda_full;
    let nullspace = DMatrix::identity(n, n) - j_bar * j_full;

    let clipped_directions = clipped_full + clipped_pos + clipped_ori;
    if clipped_directions > 0 {
        debug!(
            clipped_full,
            clipped_pos, clipped_ori, "Near-singular task-space inertia, using truncated inverse"
        );
    }

    Ok(OpspaceMatrices {
        lambda_full,
        lambda_pos,
        lambda_ori,
        nullspace,
        clipped_directions,
    })
}

/// 截断 SVD 伪逆
///
/// 小于 `rcond · σ_max` 的奇异值视为零。返回 `(逆矩阵, 被截断的方向数)`。
pub fn regularized_inverse(matrix: DMatrix<f64>, rcond: f64) -> Result<(DMatrix<f64>, usize)> {
    if !rcond.is_finite() || rcond < 0.0 {
        return Err(KernelError::InvalidParameter {
            param: "rcond",
            value: rcond,
        });
    }

    let svd = matrix.svd(true, true);
    let eps = rcond * svd.singular_values.amax();
    let clipped = svd.singular_values.iter().filter(|&&s| s <= eps).count();
    let inverse = svd.pseudo_inverse(eps).map_err(KernelError::PseudoInverse)?;

    Ok((inverse, clipped))
}

/// Λ = (J M⁻¹ Jᵀ)⁻¹
fn task_inertia(
    jacobian: &DMatrix<f64>,
    mass_inv: &DMatrix<f64>,
    rcond: f64,
) -> Result<(DMatrix<f64>, usize)> {
    let lambda_inv = jacobian * mass_inv * jacobian.transpose();
    regularized_inverse(lambda_inv, rcond)
}

fn invert_mass_matrix(mass_matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    // 正常情况下 M 对称正定，走 Cholesky；否则退回 LU
    if let Some(cholesky) = mass_matrix.clone().cholesky() {
        return Ok(cholesky.inverse());
    }

    mass_matrix
        .clone()
        .try_inverse()
        .ok_or(KernelError::MassMatrixNotInvertible {
            dim: mass_matrix.nrows(),
        })
}

fn check_mass_matrix(mass_matrix: &DMatrix<f64>) -> Result<usize> {
    let (rows, cols) = mass_matrix.shape();
    if rows == 0 || rows != cols {
        return Err(KernelError::matrix_shape(
            "mass_matrix",
            (rows.max(cols), rows.max(cols)),
            (rows, cols),
        ));
    }
    if mass_matrix.iter().any(|v| !v.is_finite()) {
        return Err(KernelError::NonFinite {
            what: "mass_matrix",
        });
    }
    Ok(rows)
}

fn check_jacobian(
    what: &'static str,
    jacobian: &DMatrix<f64>,
    task_dim: usize,
    num_joints: usize,
) -> Result<()> {
    if jacobian.shape() != (task_dim, num_joints) {
        return Err(KernelError::matrix_shape(
            what,
            (task_dim, num_joints),
            jacobian.shape(),
        ));
    }
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Err(KernelError::NonFinite { what });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 满秩 6×7 雅可比（前 6 列对角占优）
    fn test_jacobian() -> DMatrix<f64> {
        DMatrix::from_fn(6, 7, |r, c| {
            if r == c {
                1.0
            } else {
                0.1 * ((r * 7 + c) as f64).sin()
            }
        })
    }

    fn test_mass_matrix() -> DMatrix<f64> {
        DMatrix::from_fn(7, 7, |r, c| {
            if r == c {
                1.0 + 0.2 * r as f64
            } else if r.abs_diff(c) == 1 {
                0.1
            } else {
                0.0
            }
        })
    }

    fn split(j_full: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        (j_full.rows(0, 3).into_owned(), j_full.rows(3, 3).into_owned())
    }

    #[test]
    fn test_identity_system() {
        let mass = DMatrix::identity(7, 7);
        let j_full = DMatrix::from_fn(6, 7, |r, c| if r == c { 1.0 } else { 0.0 });
        let (j_pos, j_ori) = split(&j_full);

        let m = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap();

        assert_relative_eq!(m.lambda_full, DMatrix::identity(6, 6), epsilon = 1e-12);
        assert_relative_eq!(m.lambda_pos, DMatrix::identity(3, 3), epsilon = 1e-12);
        assert_relative_eq!(m.lambda_ori, DMatrix::identity(3, 3), epsilon = 1e-12);

        // 只有第 7 个关节在零空间内
        let mut expected = DMatrix::zeros(7, 7);
        expected[(6, 6)] = 1.0;
        assert_relative_eq!(m.nullspace, expected, epsilon = 1e-12);
        assert_eq!(m.clipped_directions, 0);
        assert_eq!(m.num_joints(), 7);

        let (lambda_full, lambda_pos, lambda_ori, nullspace) = m.clone().into_parts();
        assert_eq!(lambda_full, m.lambda_full);
        assert_eq!(lambda_pos, m.lambda_pos);
        assert_eq!(lambda_ori, m.lambda_ori);
        assert_eq!(nullspace, m.nullspace);
    }

    #[test]
    fn test_jacobian_times_nullspace_is_zero() {
        let mass = test_mass_matrix();
        let j_full = test_jacobian();
        let (j_pos, j_ori) = split(&j_full);

        let m = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap();

        let product = &j_full * &m.nullspace;
        assert!(product.amax() < 1e-10, "J·N = {}", product);
    }

    #[test]
    fn test_nullspace_torque_has_no_task_acceleration() {
        let mass = test_mass_matrix();
        let j_full = test_jacobian();
        let (j_pos, j_ori) = split(&j_full);
        let m = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap();

        let tau = nalgebra::DVector::from_fn(7, |i, _| (i as f64) - 3.0);
        let mass_inv = mass.clone().try_inverse().unwrap();
        let task_accel = &j_full * mass_inv * m.nullspace.transpose() * tau;

        assert!(task_accel.amax() < 1e-10);
    }

    #[test]
    fn test_lambda_inverts_task_space_mobility() {
        let mass = test_mass_matrix();
        let j_full = test_jacobian();
        let (j_pos, j_ori) = split(&j_full);
        let m = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap();

        let mass_inv = mass.try_inverse().unwrap();
        let mobility = &j_full * &mass_inv * j_full.transpose();
        assert_relative_eq!(mobility * &m.lambda_full, DMatrix::identity(6, 6), epsilon = 1e-9);

        let mobility_pos = &j_pos * &mass_inv * j_pos.transpose();
        assert_relative_eq!(mobility_pos * &m.lambda_pos, DMatrix::identity(3, 3), epsilon = 1e-9);
    }

    #[test]
    fn test_singular_jacobian_degrades_gracefully() {
        let mass = DMatrix::identity(7, 7);
        // 第 6 行与第 5 行相同：秩 5
        let mut j_full = test_jacobian();
        let row = j_full.row(4).into_owned();
        j_full.set_row(5, &row);
        let (j_pos, j_ori) = split(&j_full);

        let m = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap();

        assert!(m.is_degenerate());
        assert!(m.lambda_full.iter().all(|v| v.is_finite()));
        assert!(m.nullspace.iter().all(|v| v.is_finite()));
        assert!((&j_full * &m.nullspace).amax() < 1e-9);
    }

    #[test]
    fn test_zero_jacobian_gives_identity_nullspace() {
        let mass = test_mass_matrix();
        let j_full = DMatrix::zeros(6, 7);
        let (j_pos, j_ori) = split(&j_full);

        let m = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap();

        assert_eq!(m.lambda_full, DMatrix::zeros(6, 6));
        assert_relative_eq!(m.nullspace, DMatrix::identity(7, 7), epsilon = 1e-15);
    }

    #[test]
    fn test_shape_mismatch() {
        let mass = DMatrix::identity(7, 7);
        let j_full = DMatrix::zeros(6, 6);
        let j_pos = DMatrix::zeros(3, 7);
        let j_ori = DMatrix::zeros(3, 7);

        let err = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap_err();
        assert_eq!(err, KernelError::matrix_shape("J_full", (6, 7), (6, 6)));

        let j_full = DMatrix::zeros(6, 7);
        let j_pos = DMatrix::zeros(2, 7);
        let err = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap_err();
        assert!(err.is_shape_mismatch());

        let mass = DMatrix::identity(7, 6);
        let err = opspace_matrices(&mass, &j_full, &j_ori, &j_ori).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_non_invertible_mass_matrix() {
        let mass = DMatrix::zeros(7, 7);
        let j_full = test_jacobian();
        let (j_pos, j_ori) = split(&j_full);

        let err = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap_err();
        assert_eq!(err, KernelError::MassMatrixNotInvertible { dim: 7 });
    }

    #[test]
    fn test_non_finite_input() {
        let mut mass = DMatrix::identity(7, 7);
        mass[(2, 2)] = f64::NAN;
        let j_full = test_jacobian();
        let (j_pos, j_ori) = split(&j_full);

        let err = opspace_matrices(&mass, &j_full, &j_pos, &j_ori).unwrap_err();
        assert_eq!(err, KernelError::NonFinite { what: "mass_matrix" });
    }

    #[test]
    fn test_regularized_inverse_rejects_negative_rcond() {
        let err = regularized_inverse(DMatrix::identity(3, 3), -1.0).unwrap_err();
        assert!(matches!(err, KernelError::InvalidParameter { param: "rcond", .. }));
    }

    #[test]
    fn test_regularized_inverse_counts_clipped_directions() {
        let matrix = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![2.0, 1e-12, 4.0]));
        let (inverse, clipped) = regularized_inverse(matrix, 1e-8).unwrap();

        assert_eq!(clipped, 1);
        assert_relative_eq!(inverse[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(inverse[(1, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(inverse[(2, 2)], 0.25, epsilon = 1e-12);
    }
}
