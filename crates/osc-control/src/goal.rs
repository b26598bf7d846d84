//! 目标状态与目标更新
//!
//! `GoalState` 只由 `set_goal` 整体替换（写时复制），控制周期内只读，
//! 插值进度标记在周期成功结束时随新快照一起提交。

use nalgebra::{Matrix3, Vector3, Vector6};
use tracing::warn;

use crate::config::ControllerConfig;
use osc_kernel::{axis_angle_to_rotation, clip_orientation};

/// 末端目标
#[derive(Debug, Clone, PartialEq)]
pub struct GoalState {
    /// 期望末端位置
    pub position: Vector3<f64>,

    /// 期望末端姿态
    pub orientation: Matrix3<f64>,

    /// 姿态插值的参考姿态（挂了姿态插值器时，为设置目标那一刻的末端姿态）
    pub ori_ref: Option<Matrix3<f64>>,

    /// 姿态插值是否已开始
    pub ori_interpolate_started: bool,
}

impl GoalState {
    /// 不带插值参考的目标
    pub fn new(position: Vector3<f64>, orientation: Matrix3<f64>) -> Self {
        Self {
            position,
            orientation,
            ori_ref: None,
            ori_interpolate_started: false,
        }
    }
}

/// 计算新的位置目标
///
/// `set_pos` 给出时作为绝对目标，否则在当前位置上叠加 `delta`。
/// 配置了位置限位时逐分量裁剪。
pub fn goal_position(
    config: &ControllerConfig,
    delta: &Vector3<f64>,
    current: &Vector3<f64>,
    set_pos: Option<Vector3<f64>>,
) -> Vector3<f64> {
    let goal = set_pos.unwrap_or(current + delta);

    let Some([min, max]) = config.position_limits else {
        return goal;
    };

    let clipped = Vector3::from_fn(|i, _| goal[i].clamp(min[i], max[i]));
    if clipped != goal {
        warn!(
            goal = ?goal.as_slice(),
            clipped = ?clipped.as_slice(),
            "Position goal clipped to limits"
        );
    }
    clipped
}

/// 计算新的姿态目标
///
/// `set_ori` 给出时作为绝对目标，否则把轴角增量 `delta` 左乘到当前姿态上。
/// 配置了姿态限位时按 roll / pitch / yaw 裁剪。
pub fn goal_orientation(
    config: &ControllerConfig,
    delta: &Vector3<f64>,
    current: &Matrix3<f64>,
    set_ori: Option<Matrix3<f64>>,
) -> Matrix3<f64> {
    let goal = set_ori.unwrap_or_else(|| axis_angle_to_rotation(delta) * current);

    let Some(limits) = &config.orientation_limits else {
        return goal;
    };

    let (limited, clipped) = clip_orientation(&goal, limits);
    if clipped {
        warn!("Orientation goal clipped to roll/pitch/yaw limits");
    }
    limited
}

/// 把 6 维动作拆成平移 / 旋转两部分
pub(crate) fn split_delta(delta: &Vector6<f64>) -> (Vector3<f64>, Vector3<f64>) {
    (
        delta.fixed_rows::<3>(0).into_owned(),
        delta.fixed_rows::<3>(3).into_owned(),
    )
}
