//! 错误类型体系
//!
//! 控制周期要么产出完整的力矩向量，要么返回错误，不存在部分结果。
//!
//! # 分类
//!
//! - **前置条件违例**: 从未设置目标、状态提供者无数据
//! - **维度错误**: 姿态目标、增益、雅可比维度不一致
//! - **配置错误**: 参数非法、配置文件无法解析
//!
//! 近奇异的任务空间惯量不在此列，由数学核心内部的正则化逆吸收。

use osc_kernel::KernelError;
use std::path::PathBuf;
use thiserror::Error;

/// 控制器错误类型
#[derive(Debug, Error)]
pub enum ControlError {
    // ==================== Precondition Violations ====================
    /// 尚未设置过目标就调用了 `run_controller`
    #[error("run_controller called before any goal was set")]
    GoalNotSet,

    /// 状态提供者没有可用的机器人状态
    #[error("Robot state is not available from the state provider")]
    StateUnavailable,

    // ==================== Shape Errors ====================
    /// 维度不一致
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// 出错的量
        what: &'static str,
        /// 期望维度
        expected: String,
        /// 实际维度
        actual: String,
    },

    /// 机器人状态中含 NaN / Inf
    #[error("Non-finite value in robot state field '{field}'")]
    NonFiniteState {
        /// 字段名
        field: &'static str,
    },

    /// 机器人状态中的姿态不是合法旋转矩阵
    #[error("Robot state field '{field}' is not a proper rotation matrix")]
    InvalidRotation {
        /// 字段名
        field: &'static str,
    },

    // ==================== Configuration Errors ====================
    /// 参数无效
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidConfig {
        /// 参数名
        param: &'static str,
        /// 原因
        reason: String,
    },

    // ==================== Kernel ====================
    /// 数学核心错误
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl ControlError {
    /// 是否为前置条件违例
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::GoalNotSet | Self::StateUnavailable)
    }

    /// 是否为维度错误（包括数学核心报告的维度错误）
    pub fn is_shape_mismatch(&self) -> bool {
        match self {
            Self::ShapeMismatch { .. } => true,
            Self::Kernel(err) => err.is_shape_mismatch(),
            _ => false,
        }
    }

    /// 是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// 是否为运行期致命错误（中止当前控制周期，不产出力矩）
    ///
    /// 配置错误只会在构造或 `set_goal` 阶段出现，不算在内。
    pub fn is_fatal(&self) -> bool {
        !self.is_config_error()
    }

    /// 创建维度错误
    pub fn shape_mismatch(
        what: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// 创建矩阵维度错误
    pub(crate) fn matrix_shape(
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Self::shape_mismatch(
            what,
            format!("{}x{}", expected.0, expected.1),
            format!("{}x{}", actual.0, actual.1),
        )
    }

    /// 创建参数错误
    pub fn invalid_config(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            param,
            reason: reason.into(),
        }
    }
}

/// 配置文件错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取文件失败
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// 文件路径
        path: PathBuf,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 配置内容不合法
    #[error("Invalid config: {0}")]
    Invalid(#[from] ControlError),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ControlError::GoalNotSet.is_precondition_violation());
        assert!(ControlError::StateUnavailable.is_precondition_violation());
        assert!(!ControlError::GoalNotSet.is_shape_mismatch());
        assert!(ControlError::GoalNotSet.is_fatal());

        let err = ControlError::shape_mismatch("posture", 7, 6);
        assert!(err.is_shape_mismatch());
        assert!(!err.is_precondition_violation());
        assert_eq!(err.to_string(), "Shape mismatch for posture: expected 7, got 6");

        let err = ControlError::invalid_config("damping", "must be finite");
        assert!(err.is_config_error());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Invalid parameter 'damping': must be finite");

        let err = ControlError::InvalidRotation { field: "ee_ori" };
        assert!(err.is_fatal());
        assert!(!err.is_precondition_violation());
    }

    #[test]
    fn test_kernel_shape_errors_are_shape_mismatch() {
        let kernel = KernelError::ShapeMismatch {
            what: "J_full",
            expected: "6x7".to_string(),
            actual: "6x6".to_string(),
        };
        let err: ControlError = kernel.into();
        assert!(err.is_shape_mismatch());

        let err: ControlError = KernelError::MassMatrixNotInvertible { dim: 7 }.into();
        assert!(!err.is_shape_mismatch());
    }
}
