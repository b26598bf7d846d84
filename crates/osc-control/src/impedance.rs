//! 末端阻抗控制器（任务空间 PD）
//!
//! 每个周期：
//!
//! 1. 解析位置参考（插值器或静态目标）
//! 2. 解析姿态参考（插值器工作在相对姿态空间，或直接求姿态误差）
//! 3. `F = kp · e_pos + kd · ė_pos + a_d`
//! 4. `T = kp · e_ori + kd · ė_ori + α_d`
//! 5. 计算操作空间矩阵
//! 6. 解耦：`[Λ_pos · F; Λ_ori · T]`，耦合：`Λ_full · [F; T]`
//! 7. `τ = J_fullᵀ · wrench + τ_comp`
//!
//! 所有可能失败的步骤（状态校验、操作空间矩阵）都在修改任何内部状态之前完成。

use nalgebra::{DVector, Matrix3, Vector3, Vector6};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::ControllerConfig;
use crate::controller::TorqueController;
use crate::error::{ControlError, Result};
use crate::goal::{GoalState, goal_orientation, goal_position, split_delta};
use crate::interpolator::{InterpolationOrder, Interpolator, TrajectoryPoint};
use crate::state::{RobotState, StateProvider};
use osc_kernel::{
    OpspaceMatrices, ROTATION_TOLERANCE, axis_angle_to_rotation, is_rotation_matrix,
    opspace_matrices_with_rcond, orientation_error,
};

/// 一个周期的只读输入（目标快照、状态快照、操作空间矩阵）
#[derive(Debug, Clone)]
pub(crate) struct CycleInputs {
    pub goal: Arc<GoalState>,
    pub state: Arc<RobotState>,
    pub matrices: OpspaceMatrices,
}

/// 任务部分的输出
#[derive(Debug, Clone)]
pub(crate) struct TaskOutput {
    /// `J_fullᵀ · wrench + τ_comp`
    pub torques: DVector<f64>,
    /// 本周期是否使用了姿态插值器
    pub ori_interpolate_started: bool,
}

/// 末端阻抗控制器
#[derive(Debug)]
pub struct EeImpedanceController<P> {
    provider: P,
    config: ControllerConfig,
    kp: Vector6<f64>,
    kd: Vector6<f64>,
    interpolator_pos: Option<Box<dyn Interpolator>>,
    interpolator_ori: Option<Box<dyn Interpolator>>,
    goal: Option<Arc<GoalState>>,
    torques: Option<DVector<f64>>,
}

impl<P: StateProvider> EeImpedanceController<P> {
    /// 创建控制器
    ///
    /// # 错误
    ///
    /// 配置非法时返回 [`ControlError::InvalidConfig`]。
    pub fn new(provider: P, config: ControllerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            provider,
            kp: config.kp(),
            kd: config.kd(),
            config,
            interpolator_pos: None,
            interpolator_ori: None,
            goal: None,
            torques: None,
        })
    }

    /// 挂载位置插值器（Builder 模式）
    ///
    /// 会清除已有目标，需要重新 `set_goal`。
    pub fn with_interpolator_pos(mut self, interpolator: Box<dyn Interpolator>) -> Self {
        self.interpolator_pos = Some(interpolator);
        self.goal = None;
        self
    }

    /// 挂载姿态插值器（Builder 模式）
    ///
    /// 会清除已有目标，需要重新 `set_goal`。
    pub fn with_interpolator_ori(mut self, interpolator: Box<dyn Interpolator>) -> Self {
        self.interpolator_ori = Some(interpolator);
        self.goal = None;
        self
    }

    /// 控制器配置
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 比例增益
    pub fn kp(&self) -> &Vector6<f64> {
        &self.kp
    }

    /// 微分增益
    pub fn kd(&self) -> &Vector6<f64> {
        &self.kd
    }

    /// 当前目标（从未设置或已重置时为 `None`）
    pub fn goal(&self) -> Option<&GoalState> {
        self.goal.as_deref()
    }

    /// 上一个成功周期的力矩
    pub fn torques(&self) -> Option<&DVector<f64>> {
        self.torques.as_ref()
    }

    /// 状态提供者
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// 读取并校验当前状态
    pub fn current_state(&self) -> Result<Arc<RobotState>> {
        let state = self.provider.robot_state().ok_or(ControlError::StateUnavailable)?;
        state.validate()?;
        Ok(state)
    }

    /// 周期的可失败部分：目标、状态、操作空间矩阵
    pub(crate) fn prepare_cycle(&self) -> Result<CycleInputs> {
        let goal = self.goal.clone().ok_or(ControlError::GoalNotSet)?;
        let state = self.current_state()?;

        let matrices = opspace_matrices_with_rcond(
            &state.mass_matrix,
            &state.j_full,
            &state.j_pos,
            &state.j_ori,
            self.config.rcond,
        )?;

        Ok(CycleInputs {
            goal,
            state,
            matrices,
        })
    }

    /// 周期的任务部分（第 1 到 7 步），只推进插值器进度
    pub(crate) fn task_torques(&mut self, inputs: &CycleInputs) -> TaskOutput {
        let CycleInputs {
            goal,
            state,
            matrices,
        } = inputs;

        let pos_ref = match &mut self.interpolator_pos {
            Some(interp) => order_limited(interp.as_mut(), &state.ee_pos),
            None => TrajectoryPoint::hold(goal.position),
        };

        let (ori_error, ori_vel_ref, ori_acc_ref, ori_interpolate_started) =
            match &mut self.interpolator_ori {
                Some(interp) => {
                    let ori_ref = goal.ori_ref.unwrap_or(goal.orientation);
                    let relative_ori = orientation_error(&state.ee_ori, &ori_ref);
                    let point = order_limited(interp.as_mut(), &relative_ori);
                    // 插值值是相对 ori_ref 的目标，还原成绝对姿态后在旋转群上求误差
                    let target = axis_angle_to_rotation(&point.value) * ori_ref;
                    (
                        orientation_error(&target, &state.ee_ori),
                        point.velocity,
                        point.acceleration,
                        true,
                    )
                },
                None => (
                    orientation_error(&goal.orientation, &state.ee_ori),
                    Vector3::zeros(),
                    Vector3::zeros(),
                    goal.ori_interpolate_started,
                ),
            };

        let kp_pos = self.kp.fixed_rows::<3>(0);
        let kd_pos = self.kd.fixed_rows::<3>(0);
        let kp_ori = self.kp.fixed_rows::<3>(3);
        let kd_ori = self.kd.fixed_rows::<3>(3);

        let pos_error = pos_ref.value - state.ee_pos;
        let vel_pos_error = pos_ref.velocity - state.ee_pos_vel;
        let desired_force =
            kp_pos.component_mul(&pos_error) + kd_pos.component_mul(&vel_pos_error) + pos_ref.acceleration;

        let vel_ori_error = ori_vel_ref - state.ee_ori_vel;
        let desired_torque =
            kp_ori.component_mul(&ori_error) + kd_ori.component_mul(&vel_ori_error) + ori_acc_ref;

        let wrench = task_wrench(
            matrices,
            &desired_force,
            &desired_torque,
            self.config.uncouple_pos_ori,
        );
        let torques = state.j_full.transpose() * wrench + &state.torque_compensation;

        TaskOutput {
            torques,
            ori_interpolate_started,
        }
    }

    /// 提交周期结果：更新插值标记（写时复制）并缓存力矩
    pub(crate) fn commit(&mut self, torques: DVector<f64>, ori_interpolate_started: bool) -> DVector<f64> {
        if let Some(goal) = &mut self.goal
            && goal.ori_interpolate_started != ori_interpolate_started
        {
            Arc::make_mut(goal).ori_interpolate_started = ori_interpolate_started;
        }

        trace!(torque_norm = torques.norm(), "Control cycle complete");
        self.torques = Some(torques.clone());
        torques
    }
}

impl<P: StateProvider> TorqueController for EeImpedanceController<P> {
    fn set_goal(
        &mut self,
        delta: &Vector6<f64>,
        set_pos: Option<Vector3<f64>>,
        set_ori: Option<Matrix3<f64>>,
    ) -> Result<()> {
        let finite = delta.iter().all(|v| v.is_finite())
            && set_pos.is_none_or(|p| p.iter().all(|v| v.is_finite()))
            && set_ori.is_none_or(|r| r.iter().all(|v| v.is_finite()));
        if !finite {
            return Err(ControlError::invalid_config("goal", "delta and absolute targets must be finite"));
        }
        if let Some(rotation) = &set_ori
            && !is_rotation_matrix(rotation, ROTATION_TOLERANCE)
        {
            return Err(ControlError::invalid_config(
                "goal",
                "absolute orientation must be a proper rotation matrix",
            ));
        }

        let state = self.current_state()?;

        let scaled = self.config.scale_action(delta);
        let (delta_pos, delta_ori) = split_delta(&scaled);
        let position = goal_position(&self.config, &delta_pos, &state.ee_pos, set_pos);
        let orientation = goal_orientation(&self.config, &delta_ori, &state.ee_ori, set_ori);

        let mut goal = GoalState::new(position, orientation);

        if let Some(interp) = &mut self.interpolator_pos {
            interp.set_goal(position);
        }
        if let Some(interp) = &mut self.interpolator_ori {
            goal.ori_ref = Some(state.ee_ori);
            interp.set_goal(orientation_error(&orientation, &state.ee_ori));
        }

        debug!(
            position = ?position.as_slice(),
            interpolated_pos = self.interpolator_pos.is_some(),
            interpolated_ori = self.interpolator_ori.is_some(),
            "Goal updated"
        );
        self.goal = Some(Arc::new(goal));
        Ok(())
    }

    fn run_controller(&mut self) -> Result<DVector<f64>> {
        let inputs = self.prepare_cycle()?;
        let output = self.task_torques(&inputs);
        drop(inputs);
        Ok(self.commit(output.torques, output.ori_interpolate_started))
    }

    fn reset(&mut self) {
        self.goal = None;
        self.torques = None;
    }
}

/// 按插值器阶数取参考点：位置阶插值器只使用参考值
fn order_limited(interp: &mut dyn Interpolator, current: &Vector3<f64>) -> TrajectoryPoint {
    let point = interp.interpolated_goal(current);
    match interp.order() {
        InterpolationOrder::Acceleration => point,
        InterpolationOrder::Position => TrajectoryPoint::hold(point.value),
    }
}

/// 把期望力 / 力矩经任务空间惯量映射为 6 维力旋量
///
/// - 解耦：`[Λ_pos · F; Λ_ori · T]`
/// - 耦合：`Λ_full · [F; T]`
pub fn task_wrench(
    matrices: &OpspaceMatrices,
    desired_force: &Vector3<f64>,
    desired_torque: &Vector3<f64>,
    uncoupled: bool,
) -> DVector<f64> {
    let force = DVector::from_column_slice(desired_force.as_slice());
    let torque = DVector::from_column_slice(desired_torque.as_slice());

    if uncoupled {
        let linear = &matrices.lambda_pos * force;
        let angular = &matrices.lambda_ori * torque;
        DVector::from_iterator(6, linear.iter().chain(angular.iter()).copied())
    } else {
        let stacked = DVector::from_iterator(6, force.iter().chain(torque.iter()).copied());
        &matrices.lambda_full * stacked
    }
}
