//! 控制器配置
//!
//! 所有配置项都支持 serde，可以从 TOML 文件加载：
//!
//! ```toml
//! [controller]
//! kp = 150.0
//! damping = 1.0
//! control_freq = 500.0
//! uncouple_pos_ori = true
//! position_limits = [[-0.8, -0.8, 0.0], [0.8, 0.8, 1.2]]
//!
//! [posture]
//! posture = [0.0, -1.18, 0.0, 2.18, 0.0, 0.57, 3.3161]
//! posture_gain = 10.0
//!
//! [interpolator_pos]
//! type = "linear"
//! policy_freq = 20.0
//! ramp_ratio = 0.2
//! ```

use nalgebra::{DVector, Vector6};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ControlError, Result};
use crate::interpolator::{CubicInterpolator, Interpolator, LinearInterpolator};
use osc_kernel::DEFAULT_RCOND;

/// 默认比例增益
pub const DEFAULT_KP: f64 = 50.0;

/// 默认控制频率（Hz）
pub const DEFAULT_CONTROL_FREQ: f64 = 20.0;

/// 默认期望姿态（7 关节）
pub const DEFAULT_POSTURE: [f64; 7] = [0.0, -1.18, 0.0, 2.18, 0.0, 0.57, 3.3161];

/// 比例增益：统一标量或 6 轴分别指定
///
/// 前 3 个分量作用于平移，后 3 个作用于旋转。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gains {
    /// 6 个轴使用相同增益
    Uniform(f64),
    /// 每个轴单独指定 `[x, y, z, rx, ry, rz]`
    PerAxis([f64; 6]),
}

impl Gains {
    /// 展开为 6 维向量
    pub fn to_vector(&self) -> Vector6<f64> {
        match self {
            Self::Uniform(k) => Vector6::repeat(*k),
            Self::PerAxis(k) => Vector6::from_column_slice(k),
        }
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::Uniform(DEFAULT_KP)
    }
}

/// 末端阻抗控制器配置
///
/// 构造后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 比例增益
    pub kp: Gains,

    /// 阻尼比（`kd = 2 · sqrt(kp) · damping`）
    pub damping: f64,

    /// 动作输入上限
    pub input_max: f64,

    /// 动作输入下限
    pub input_min: f64,

    /// 动作输出上限
    pub output_max: f64,

    /// 动作输出下限
    pub output_min: f64,

    /// 控制频率（Hz）
    pub control_freq: f64,

    /// 位置目标限位 `[min, max]`（米）
    pub position_limits: Option<[[f64; 3]; 2]>,

    /// 姿态目标限位 `[min, max]`（roll / pitch / yaw，弧度）
    ///
    /// 某轴 `min > max` 时合法区间跨越 ±π。
    pub orientation_limits: Option<[[f64; 3]; 2]>,

    /// 平移与旋转是否解耦控制
    pub uncouple_pos_ori: bool,

    /// 正则化求逆的相对奇异值截断阈值
    pub rcond: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: Gains::default(),
            damping: 1.0,
            input_max: 1.0,
            input_min: -1.0,
            output_max: 1.0,
            output_min: -1.0,
            control_freq: DEFAULT_CONTROL_FREQ,
            position_limits: None,
            orientation_limits: None,
            uncouple_pos_ori: true,
            rcond: DEFAULT_RCOND,
        }
    }
}

impl ControllerConfig {
    /// 设置比例增益（Builder 模式）
    pub fn with_kp(mut self, kp: Gains) -> Self {
        self.kp = kp;
        self
    }

    /// 设置阻尼比
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// 设置控制频率
    pub fn with_control_freq(mut self, control_freq: f64) -> Self {
        self.control_freq = control_freq;
        self
    }

    /// 选择解耦 / 耦合模式
    pub fn with_uncoupled(mut self, uncouple_pos_ori: bool) -> Self {
        self.uncouple_pos_ori = uncouple_pos_ori;
        self
    }

    /// 设置位置限位
    pub fn with_position_limits(mut self, limits: [[f64; 3]; 2]) -> Self {
        self.position_limits = Some(limits);
        self
    }

    /// 设置姿态限位
    pub fn with_orientation_limits(mut self, limits: [[f64; 3]; 2]) -> Self {
        self.orientation_limits = Some(limits);
        self
    }

    /// 比例增益向量
    pub fn kp(&self) -> Vector6<f64> {
        self.kp.to_vector()
    }

    /// 微分增益向量（临界阻尼乘以阻尼比）
    pub fn kd(&self) -> Vector6<f64> {
        self.kp().map(|k| 2.0 * k.sqrt() * self.damping)
    }

    /// 把策略输出的动作缩放到控制器的输出范围
    ///
    /// 先逐分量裁剪到 `[input_min, input_max]`，再线性映射到
    /// `[output_min, output_max]`。默认参数下是 `[-1, 1]` 上的恒等映射。
    pub fn scale_action(&self, action: &Vector6<f64>) -> Vector6<f64> {
        let scale = (self.output_max - self.output_min).abs() / (self.input_max - self.input_min).abs();
        let input_mid = (self.input_max + self.input_min) / 2.0;
        let output_mid = (self.output_max + self.output_min) / 2.0;

        action.map(|a| {
            let clipped = a.clamp(self.input_min, self.input_max);
            (clipped - input_mid) * scale + output_mid
        })
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        let kp = self.kp();
        if kp.iter().any(|k| !k.is_finite() || *k < 0.0) {
            return Err(ControlError::invalid_config(
                "kp",
                "gains must be finite and non-negative",
            ));
        }
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(ControlError::invalid_config(
                "damping",
                format!("must be finite and non-negative, got {}", self.damping),
            ));
        }

        let bounds = [self.input_max, self.input_min, self.output_max, self.output_min];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(ControlError::invalid_config(
                "input/output range",
                "bounds must be finite",
            ));
        }
        if self.input_min >= self.input_max {
            return Err(ControlError::invalid_config(
                "input_min",
                format!(
                    "must be less than input_max ({} >= {})",
                    self.input_min, self.input_max
                ),
            ));
        }

        if !self.control_freq.is_finite() || self.control_freq <= 0.0 {
            return Err(ControlError::invalid_config(
                "control_freq",
                format!("must be positive, got {}", self.control_freq),
            ));
        }

        if let Some([min, max]) = &self.position_limits {
            for axis in 0..3 {
                if !min[axis].is_finite() || !max[axis].is_finite() || min[axis] > max[axis] {
                    return Err(ControlError::invalid_config(
                        "position_limits",
                        format!("axis {} has invalid range [{}, {}]", axis, min[axis], max[axis]),
                    ));
                }
            }
        }

        if let Some(limits) = &self.orientation_limits
            && limits.iter().flatten().any(|v| !v.is_finite())
        {
            return Err(ControlError::invalid_config(
                "orientation_limits",
                "limits must be finite",
            ));
        }

        if !self.rcond.is_finite() || self.rcond < 0.0 {
            return Err(ControlError::invalid_config(
                "rcond",
                format!("must be finite and non-negative, got {}", self.rcond),
            ));
        }

        Ok(())
    }
}

/// 零空间姿态配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// 期望关节姿态（长度必须等于关节数）
    pub posture: Vec<f64>,

    /// 姿态增益（0 表示关闭姿态调节）
    pub posture_gain: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            posture: DEFAULT_POSTURE.to_vec(),
            posture_gain: 0.0,
        }
    }
}

impl PostureConfig {
    /// 期望姿态向量
    pub fn posture_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.posture)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.posture.is_empty() {
            return Err(ControlError::invalid_config("posture", "must not be empty"));
        }
        if self.posture.iter().any(|q| !q.is_finite()) {
            return Err(ControlError::invalid_config(
                "posture",
                "joint positions must be finite",
            ));
        }
        if !self.posture_gain.is_finite() || self.posture_gain < 0.0 {
            return Err(ControlError::invalid_config(
                "posture_gain",
                format!("must be finite and non-negative, got {}", self.posture_gain),
            ));
        }
        Ok(())
    }
}

/// 插值器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterpolatorConfig {
    /// 线性插值（位置阶）
    Linear {
        /// 策略（上层）频率（Hz）
        #[serde(default = "default_policy_freq")]
        policy_freq: f64,
        /// 在一个策略周期内完成插值的比例
        #[serde(default = "default_ramp_ratio")]
        ramp_ratio: f64,
    },
    /// 三次样条插值（加速度阶）
    Cubic {
        /// 插值时长（秒）
        #[serde(default = "default_cubic_duration")]
        duration: f64,
    },
}

fn default_policy_freq() -> f64 {
    20.0
}

fn default_ramp_ratio() -> f64 {
    0.2
}

fn default_cubic_duration() -> f64 {
    1.0
}

impl InterpolatorConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Linear {
                policy_freq,
                ramp_ratio,
            } => {
                if !policy_freq.is_finite() || *policy_freq <= 0.0 {
                    return Err(ControlError::invalid_config(
                        "policy_freq",
                        format!("must be positive, got {}", policy_freq),
                    ));
                }
                if !ramp_ratio.is_finite() || *ramp_ratio <= 0.0 {
                    return Err(ControlError::invalid_config(
                        "ramp_ratio",
                        format!("must be positive, got {}", ramp_ratio),
                    ));
                }
            },
            Self::Cubic { duration } => {
                if !duration.is_finite() || *duration <= 0.0 {
                    return Err(ControlError::invalid_config(
                        "duration",
                        format!("must be positive, got {}", duration),
                    ));
                }
            },
        }
        Ok(())
    }

    /// 按控制频率构造插值器
    pub fn build(&self, control_freq: f64) -> Result<Box<dyn Interpolator>> {
        self.validate()?;
        if !control_freq.is_finite() || control_freq <= 0.0 {
            return Err(ControlError::invalid_config(
                "control_freq",
                format!("must be positive, got {}", control_freq),
            ));
        }

        Ok(match *self {
            Self::Linear {
                policy_freq,
                ramp_ratio,
            } => Box::new(LinearInterpolator::new(control_freq, policy_freq, ramp_ratio)),
            Self::Cubic { duration } => Box::new(CubicInterpolator::new(duration, control_freq)),
        })
    }
}

/// 完整配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// 末端阻抗控制器
    pub controller: ControllerConfig,

    /// 零空间姿态
    pub posture: PostureConfig,

    /// 位置插值器（可选）
    pub interpolator_pos: Option<InterpolatorConfig>,

    /// 姿态插值器（可选）
    pub interpolator_ori: Option<InterpolatorConfig>,
}

impl OscConfig {
    /// 从 TOML 字符串解析并验证
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并验证
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证所有子配置
    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        self.posture.validate()?;
        if let Some(interp) = &self.interpolator_pos {
            interp.validate()?;
        }
        if let Some(interp) = &self.interpolator_ori {
            interp.validate()?;
        }
        Ok(())
    }
}
