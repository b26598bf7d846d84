//! 核心错误类型
//!
//! 数值退化（近奇异的任务空间惯量）不属于错误，由正则化逆在内部吸收。
//! 这里只保留输入契约被破坏时的致命错误。

use thiserror::Error;

/// 数学核心错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// 矩阵 / 向量维度不一致
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// 出错的输入
        what: &'static str,
        /// 期望的维度
        expected: String,
        /// 实际维度
        actual: String,
    },

    /// 质量矩阵不可逆
    #[error("Mass matrix ({dim}x{dim}) is not invertible")]
    MassMatrixNotInvertible {
        /// 关节数
        dim: usize,
    },

    /// 输入中包含 NaN / Inf
    #[error("Non-finite value in {what}")]
    NonFinite {
        /// 出错的输入
        what: &'static str,
    },

    /// 增益或容差参数无效
    #[error("Invalid parameter '{param}': {value}")]
    InvalidParameter {
        /// 参数名
        param: &'static str,
        /// 实际值
        value: f64,
    },

    /// SVD 伪逆失败
    #[error("Pseudo-inverse failed: {0}")]
    PseudoInverse(&'static str),
}

impl KernelError {
    /// 是否为维度错误
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    /// 创建矩阵维度错误
    pub(crate) fn matrix_shape(
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }

    /// 创建向量长度错误
    pub(crate) fn vector_len(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, KernelError>;
