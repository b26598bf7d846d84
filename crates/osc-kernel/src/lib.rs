//! # OSC Kernel - 操作空间控制数学核心
//!
//! 纯函数、无状态，每个控制周期调用一次。
//!
//! ## 包含模块
//!
//! - `opspace` - 任务空间等效惯量 Λ 与动力学一致的零空间投影 N
//! - `nullspace` - 零空间姿态（posture）PD 力矩
//! - `orientation` - 基于旋转群的最小姿态误差、姿态限位
//!
//! ## 使用示例
//!
//! ```rust
//! use nalgebra::{DMatrix, DVector};
//! use osc_kernel::{nullspace_torques, opspace_matrices};
//!
//! let mass = DMatrix::<f64>::identity(7, 7);
//! let j_full = DMatrix::<f64>::from_fn(6, 7, |r, c| if r == c { 1.0 } else { 0.0 });
//! let j_pos = j_full.rows(0, 3).into_owned();
//! let j_ori = j_full.rows(3, 3).into_owned();
//!
//! let matrices = opspace_matrices(&mass, &j_full, &j_pos, &j_ori)?;
//!
//! let q = DVector::zeros(7);
//! let posture = DVector::from_element(7, 0.1);
//! let tau = nullspace_torques(&mass, &matrices.nullspace, &posture, &q, &q, 10.0)?;
//! assert_eq!(tau.len(), 7);
//! # Ok::<(), osc_kernel::KernelError>(())
//! ```

pub mod error;
pub mod nullspace;
pub mod opspace;
pub mod orientation;

// 重新导出常用类型
pub use error::{KernelError, Result};
pub use nullspace::{DEFAULT_POSTURE_GAIN, nullspace_torques};
pub use opspace::{
    DEFAULT_RCOND, OpspaceMatrices, opspace_matrices, opspace_matrices_with_rcond,
    regularized_inverse,
};
pub use orientation::{
    ROTATION_TOLERANCE, axis_angle_to_rotation, clip_orientation, is_rotation_matrix,
    orientation_error,
};

/// 完整位姿任务维度（3 平移 + 3 旋转）
pub const TASK_DIM: usize = 6;

/// 平移 / 旋转子任务维度
pub const SUBTASK_DIM: usize = 3;
