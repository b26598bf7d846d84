//! 零空间姿态增强的末端控制器
//!
//! 在 [`EeImpedanceController`] 的任务力矩之上叠加零空间姿态力矩：
//!
//! ```text
//! τ = J_fullᵀ · wrench + τ_comp + Nᵀ · M · (kp · (q_d - q) - kv · q̇)
//! ```
//!
//! 姿态项经 `Nᵀ` 投影，对末端任务不产生加速度。
//!
//! # 示例
//!
//! ```rust
//! use nalgebra::{DMatrix, DVector, Matrix3, Vector3, Vector6};
//! use osc_control::{
//!     ControllerConfig, EePostureController, PostureTarget, RobotState, SharedState,
//!     TorqueController,
//! };
//!
//! let j_full = DMatrix::from_fn(6, 7, |r, c| if r == c { 1.0 } else { 0.0 });
//! let state = RobotState {
//!     mass_matrix: DMatrix::identity(7, 7),
//!     j_pos: j_full.rows(0, 3).into_owned(),
//!     j_ori: j_full.rows(3, 3).into_owned(),
//!     j_full,
//!     joint_pos: DVector::zeros(7),
//!     joint_vel: DVector::zeros(7),
//!     ee_pos: Vector3::new(0.4, 0.0, 0.3),
//!     ee_ori: Matrix3::identity(),
//!     ee_pos_vel: Vector3::zeros(),
//!     ee_ori_vel: Vector3::zeros(),
//!     torque_compensation: DVector::zeros(7),
//! };
//! let shared = SharedState::with_state(state);
//!
//! let posture = PostureTarget::new(DVector::from_element(7, 0.1), 10.0)?;
//! let mut controller = EePostureController::new(&shared, ControllerConfig::default(), posture)?;
//! controller.prewarm();
//!
//! controller.set_goal(&Vector6::zeros(), None, None)?;
//! let torques = controller.run_controller()?;
//! assert_eq!(torques.len(), 7);
//! # Ok::<(), osc_control::ControlError>(())
//! ```

use nalgebra::{DMatrix, DVector, Matrix3, Vector3, Vector6};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::{ControllerConfig, OscConfig};
use crate::controller::TorqueController;
use crate::error::{ControlError, Result};
use crate::goal::GoalState;
use crate::impedance::EeImpedanceController;
use crate::interpolator::Interpolator;
use crate::state::StateProvider;
use osc_kernel::{
    DEFAULT_POSTURE_GAIN, SUBTASK_DIM, TASK_DIM, nullspace_torques, opspace_matrices,
};

/// 零空间姿态目标
#[derive(Debug, Clone, PartialEq)]
pub struct PostureTarget {
    posture: DVector<f64>,
    posture_gain: f64,
}

impl PostureTarget {
    /// 创建姿态目标
    ///
    /// # 错误
    ///
    /// 姿态为空、含非有限值，或增益为负 / 非有限值时返回 [`ControlError::InvalidConfig`]。
    pub fn new(posture: DVector<f64>, posture_gain: f64) -> Result<Self> {
        if posture.is_empty() {
            return Err(ControlError::invalid_config("posture", "must not be empty"));
        }
        if posture.iter().any(|q| !q.is_finite()) {
            return Err(ControlError::invalid_config(
                "posture",
                "joint positions must be finite",
            ));
        }
        if !posture_gain.is_finite() || posture_gain < 0.0 {
            return Err(ControlError::invalid_config(
                "posture_gain",
                format!("must be finite and non-negative, got {}", posture_gain),
            ));
        }

        Ok(Self {
            posture,
            posture_gain,
        })
    }

    /// 使用默认增益 [`DEFAULT_POSTURE_GAIN`] 创建姿态目标
    ///
    /// # 错误
    ///
    /// 同 [`PostureTarget::new`]。
    pub fn with_default_gain(posture: DVector<f64>) -> Result<Self> {
        Self::new(posture, DEFAULT_POSTURE_GAIN)
    }

    /// 期望关节姿态
    pub fn posture(&self) -> &DVector<f64> {
        &self.posture
    }

    /// 姿态增益
    pub fn posture_gain(&self) -> f64 {
        self.posture_gain
    }

    /// 关节数
    pub fn num_joints(&self) -> usize {
        self.posture.len()
    }
}

/// 零空间姿态增强的末端控制器
#[derive(Debug)]
pub struct EePostureController<P> {
    base: EeImpedanceController<P>,
    posture: PostureTarget,
}

impl<P: StateProvider> EePostureController<P> {
    /// 创建控制器
    pub fn new(provider: P, config: ControllerConfig, posture: PostureTarget) -> Result<Self> {
        Ok(Self {
            base: EeImpedanceController::new(provider, config)?,
            posture,
        })
    }

    /// 从完整配置创建控制器（包括插值器）
    pub fn from_config(provider: P, config: &OscConfig) -> Result<Self> {
        config.validate()?;

        let posture = PostureTarget::new(
            config.posture.posture_vector(),
            config.posture.posture_gain,
        )?;
        let control_freq = config.controller.control_freq;

        let mut base = EeImpedanceController::new(provider, config.controller.clone())?;
        if let Some(interp) = &config.interpolator_pos {
            base = base.with_interpolator_pos(interp.build(control_freq)?);
        }
        if let Some(interp) = &config.interpolator_ori {
            base = base.with_interpolator_ori(interp.build(control_freq)?);
        }

        Ok(Self { base, posture })
    }

    /// 挂载位置插值器（Builder 模式）
    pub fn with_interpolator_pos(mut self, interpolator: Box<dyn Interpolator>) -> Self {
        self.base = self.base.with_interpolator_pos(interpolator);
        self
    }

    /// 挂载姿态插值器（Builder 模式）
    pub fn with_interpolator_ori(mut self, interpolator: Box<dyn Interpolator>) -> Self {
        self.base = self.base.with_interpolator_ori(interpolator);
        self
    }

    /// 预热数学核心
    ///
    /// 用单位质量矩阵和零雅可比跑一遍完整的核心计算，
    /// 让首个真实控制周期不再承担数值库的一次性初始化开销。
    /// 对控制结果没有任何影响，非实时场景可以省略。
    pub fn prewarm(&self) {
        let n = self.posture.num_joints();
        let start = Instant::now();

        let mass = DMatrix::identity(n, n);
        let j_full = DMatrix::zeros(TASK_DIM, n);
        let j_part = DMatrix::zeros(SUBTASK_DIM, n);
        let zeros = DVector::zeros(n);

        let result = opspace_matrices(&mass, &j_full, &j_part, &j_part).and_then(|matrices| {
            nullspace_torques(
                &mass,
                &matrices.nullspace,
                self.posture.posture(),
                &zeros,
                &zeros,
                self.posture.posture_gain(),
            )
        });

        match result {
            Ok(_) => debug!(
                joints = n,
                elapsed_us = start.elapsed().as_micros() as u64,
                "Kernel prewarm complete"
            ),
            Err(e) => warn!("Kernel prewarm failed: {}", e),
        }
    }

    /// 基础末端控制器
    pub fn base(&self) -> &EeImpedanceController<P> {
        &self.base
    }

    /// 姿态目标
    pub fn posture(&self) -> &PostureTarget {
        &self.posture
    }

    /// 控制器配置
    pub fn config(&self) -> &ControllerConfig {
        self.base.config()
    }

    /// 比例增益
    pub fn kp(&self) -> &Vector6<f64> {
        self.base.kp()
    }

    /// 微分增益
    pub fn kd(&self) -> &Vector6<f64> {
        self.base.kd()
    }

    /// 当前目标
    pub fn goal(&self) -> Option<&GoalState> {
        self.base.goal()
    }

    /// 上一个成功周期的力矩
    pub fn torques(&self) -> Option<&DVector<f64>> {
        self.base.torques()
    }
}

impl<P: StateProvider> TorqueController for EePostureController<P> {
    fn set_goal(
        &mut self,
        delta: &Vector6<f64>,
        set_pos: Option<Vector3<f64>>,
        set_ori: Option<Matrix3<f64>>,
    ) -> Result<()> {
        self.base.set_goal(delta, set_pos, set_ori)
    }

    fn run_controller(&mut self) -> Result<DVector<f64>> {
        let inputs = self.base.prepare_cycle()?;

        let n = inputs.state.num_joints();
        if self.posture.num_joints() != n {
            return Err(ControlError::shape_mismatch(
                "posture",
                n,
                self.posture.num_joints(),
            ));
        }

        let posture_torques = nullspace_torques(
            &inputs.state.mass_matrix,
            &inputs.matrices.nullspace,
            self.posture.posture(),
            &inputs.state.joint_pos,
            &inputs.state.joint_vel,
            self.posture.posture_gain(),
        )?;

        let output = self.base.task_torques(&inputs);
        drop(inputs);

        Ok(self.base.commit(
            output.torques + posture_torques,
            output.ori_interpolate_started,
        ))
    }

    fn reset(&mut self) {
        self.base.reset();
    }
}
