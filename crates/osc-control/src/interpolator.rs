//! 轨迹插值器
//!
//! 把一次性的目标变成逐周期平滑变化的参考量。每个任务轴（平移 / 旋转）
//! 最多挂一个插值器；不挂时控制器直接跟踪目标。
//!
//! # 阶数
//!
//! - [`InterpolationOrder::Position`]: 只给出参考值，速度 / 加速度视为 0
//! - [`InterpolationOrder::Acceleration`]: 同时给出参考值、速度、加速度（前馈）
//!
//! # 姿态轴
//!
//! 姿态插值器工作在"相对姿态"空间：目标与当前值都是相对某个参考姿态的
//! 轴角向量，由控制器负责换算。

use nalgebra::Vector3;
use std::fmt;

/// 插值器输出阶数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationOrder {
    /// 仅参考值
    Position,
    /// 参考值 + 速度 + 加速度
    Acceleration,
}

/// 一个周期的参考点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    /// 参考值
    pub value: Vector3<f64>,
    /// 参考速度
    pub velocity: Vector3<f64>,
    /// 参考加速度
    pub acceleration: Vector3<f64>,
}

impl TrajectoryPoint {
    /// 静止参考点（速度、加速度为 0）
    pub fn hold(value: Vector3<f64>) -> Self {
        Self {
            value,
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }
    }
}

/// 插值器接口
///
/// # 生命周期
///
/// - `set_goal()`: 每次控制器收到新目标时调用一次，重新开始插值
/// - `interpolated_goal()`: 每个控制周期调用一次，推进内部进度
pub trait Interpolator: fmt::Debug + Send {
    /// 输出阶数
    fn order(&self) -> InterpolationOrder;

    /// 设置新目标
    fn set_goal(&mut self, goal: Vector3<f64>);

    /// 推进一个周期并返回参考点
    ///
    /// `current` 是该轴当前的实际值。尚未设置目标时返回 `current` 本身。
    fn interpolated_goal(&mut self, current: &Vector3<f64>) -> TrajectoryPoint;
}

/// 线性插值器
///
/// 从设置目标后第一次查询时的 `current` 出发，用
/// `ceil(ramp_ratio · control_freq / policy_freq)` 个等长步走到目标，之后保持目标。
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    total_steps: usize,
    step: usize,
    start: Option<Vector3<f64>>,
    goal: Option<Vector3<f64>>,
}

impl LinearInterpolator {
    /// 创建线性插值器
    ///
    /// # 参数
    ///
    /// - `control_freq`: 控制频率（Hz）
    /// - `policy_freq`: 上层策略给出新目标的频率（Hz）
    /// - `ramp_ratio`: 在一个策略周期中用于插值的比例
    pub fn new(control_freq: f64, policy_freq: f64, ramp_ratio: f64) -> Self {
        let steps = (ramp_ratio * control_freq / policy_freq).ceil();
        let total_steps = if steps.is_finite() && steps >= 1.0 {
            steps as usize
        } else {
            1
        };

        Self {
            total_steps,
            step: 0,
            start: None,
            goal: None,
        }
    }

    /// 插值总步数
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

impl Interpolator for LinearInterpolator {
    fn order(&self) -> InterpolationOrder {
        InterpolationOrder::Position
    }

    fn set_goal(&mut self, goal: Vector3<f64>) {
        self.goal = Some(goal);
        self.start = None;
        self.step = 0;
    }

    fn interpolated_goal(&mut self, current: &Vector3<f64>) -> TrajectoryPoint {
        let Some(goal) = self.goal else {
            return TrajectoryPoint::hold(*current);
        };
        let start = *self.start.get_or_insert(*current);

        self.step = (self.step + 1).min(self.total_steps);
        let fraction = self.step as f64 / self.total_steps as f64;

        TrajectoryPoint::hold(start + (goal - start) * fraction)
    }
}

/// 三次样条系数
///
/// 表示 `p(t) = a0 + a1*t + a2*t² + a3*t³`，`t` 为归一化时间
#[derive(Debug, Clone, Copy)]
struct CubicCoeffs {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl CubicCoeffs {
    /// 起止速度为 0 的三次样条
    ///
    /// 边界条件 `p(0) = p0`, `p(1) = p1`, `v(0) = v(1) = 0`
    fn rest_to_rest(p0: f64, p1: f64) -> Self {
        Self {
            a0: p0,
            a1: 0.0,
            a2: 3.0 * (p1 - p0),
            a3: -2.0 * (p1 - p0),
        }
    }

    fn position(&self, t: f64) -> f64 {
        self.a0 + self.a1 * t + self.a2 * t * t + self.a3 * t * t * t
    }

    /// 对归一化时间的一阶导数
    fn velocity(&self, t: f64) -> f64 {
        self.a1 + 2.0 * self.a2 * t + 3.0 * self.a3 * t * t
    }

    /// 对归一化时间的二阶导数
    fn acceleration(&self, t: f64) -> f64 {
        2.0 * self.a2 + 6.0 * self.a3 * t
    }
}

/// 三次样条插值器
///
/// 在 `duration` 秒内以零起止速度从起点走到目标，每次查询前进 `1 / control_freq` 秒，
/// 输出参考值、速度、加速度。走完后保持目标（速度、加速度为 0）。
#[derive(Debug, Clone)]
pub struct CubicInterpolator {
    duration: f64,
    dt: f64,
    elapsed: f64,
    goal: Option<Vector3<f64>>,
    coeffs: Option<[CubicCoeffs; 3]>,
}

impl CubicInterpolator {
    /// 创建三次样条插值器
    ///
    /// 参数由 [`InterpolatorConfig::build`](crate::config::InterpolatorConfig::build) 校验。
    pub fn new(duration: f64, control_freq: f64) -> Self {
        Self {
            duration,
            dt: 1.0 / control_freq,
            elapsed: 0.0,
            goal: None,
            coeffs: None,
        }
    }

    /// 当前进度（0.0 到 1.0）
    pub fn progress(&self) -> f64 {
        (self.elapsed / self.duration).min(1.0)
    }
}

impl Interpolator for CubicInterpolator {
    fn order(&self) -> InterpolationOrder {
        InterpolationOrder::Acceleration
    }

    fn set_goal(&mut self, goal: Vector3<f64>) {
        self.goal = Some(goal);
        self.coeffs = None;
        self.elapsed = 0.0;
    }

    fn interpolated_goal(&mut self, current: &Vector3<f64>) -> TrajectoryPoint {
        let Some(goal) = self.goal else {
            return TrajectoryPoint::hold(*current);
        };
        if self.elapsed >= self.duration {
            return TrajectoryPoint::hold(goal);
        }

        let coeffs = *self.coeffs.get_or_insert_with(|| {
            [0, 1, 2].map(|axis| CubicCoeffs::rest_to_rest(current[axis], goal[axis]))
        });

        let t = self.elapsed / self.duration;
        let d = self.duration;
        let point = TrajectoryPoint {
            value: Vector3::from_fn(|axis, _| coeffs[axis].position(t)),
            velocity: Vector3::from_fn(|axis, _| coeffs[axis].velocity(t) / d),
            acceleration: Vector3::from_fn(|axis, _| coeffs[axis].acceleration(t) / (d * d)),
        };

        self.elapsed += self.dt;
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cubic_coeffs_boundary_conditions() {
        let coeffs = CubicCoeffs::rest_to_rest(0.0, 1.0);

        assert!((coeffs.position(0.0) - 0.0).abs() < 1e-10);
        assert!((coeffs.position(1.0) - 1.0).abs() < 1e-10);
        assert!((coeffs.velocity(0.0) - 0.0).abs() < 1e-10);
        assert!((coeffs.velocity(1.0) - 0.0).abs() < 1e-10);

        // a(t) = 6 - 12t
        assert!((coeffs.acceleration(0.0) - 6.0).abs() < 1e-10);
        assert!((coeffs.acceleration(0.5) - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_linear_total_steps() {
        assert_eq!(LinearInterpolator::new(500.0, 20.0, 0.2).total_steps(), 5);
        assert_eq!(LinearInterpolator::new(500.0, 20.0, 1.0).total_steps(), 25);
        // 至少一步
        assert_eq!(LinearInterpolator::new(20.0, 20.0, 0.01).total_steps(), 1);
    }

    #[test]
    fn test_linear_without_goal_holds_current() {
        let mut interp = LinearInterpolator::new(500.0, 20.0, 0.2);
        let current = Vector3::new(0.1, 0.2, 0.3);
        assert_eq!(interp.interpolated_goal(&current), TrajectoryPoint::hold(current));
    }

    #[test]
    fn test_linear_ramps_then_holds() {
        let mut interp = LinearInterpolator::new(40.0, 20.0, 2.0); // 4 步
        assert_eq!(interp.order(), InterpolationOrder::Position);
        interp.set_goal(Vector3::new(4.0, 0.0, -4.0));

        let start = Vector3::zeros();
        let values: Vec<_> = (0..6)
            .map(|_| interp.interpolated_goal(&start).value)
            .collect();

        assert_relative_eq!(values[0], Vector3::new(1.0, 0.0, -1.0), epsilon = 1e-12);
        assert_relative_eq!(values[1], Vector3::new(2.0, 0.0, -2.0), epsilon = 1e-12);
        assert_relative_eq!(values[3], Vector3::new(4.0, 0.0, -4.0), epsilon = 1e-12);
        assert_eq!(values[4], values[3]);
        assert_eq!(values[5], values[3]);
    }

    #[test]
    fn test_linear_start_is_first_queried_value() {
        let mut interp = LinearInterpolator::new(40.0, 20.0, 2.0);
        interp.set_goal(Vector3::new(2.0, 2.0, 2.0));

        let first = interp.interpolated_goal(&Vector3::zeros());
        // 后续 current 的变化不影响已记录的起点
        let second = interp.interpolated_goal(&Vector3::new(10.0, 10.0, 10.0));

        assert_relative_eq!(first.value, Vector3::repeat(0.5), epsilon = 1e-12);
        assert_relative_eq!(second.value, Vector3::repeat(1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_cubic_profile() {
        // 1 秒，10 Hz
        let mut interp = CubicInterpolator::new(1.0, 10.0);
        assert_eq!(interp.order(), InterpolationOrder::Acceleration);
        interp.set_goal(Vector3::new(1.0, -2.0, 0.0));

        let start = Vector3::zeros();
        let first = interp.interpolated_goal(&start);
        assert_relative_eq!(first.value, start, epsilon = 1e-12);
        assert_relative_eq!(first.velocity, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(first.acceleration, Vector3::new(6.0, -12.0, 0.0), epsilon = 1e-12);

        let mut last = first;
        for _ in 0..4 {
            last = interp.interpolated_goal(&start);
        }
        // t = 0.4: p = 3t² - 2t³ = 0.352
        assert_relative_eq!(last.value[0], 0.352, epsilon = 1e-9);
        assert!(last.velocity[0] > 0.0);
        assert!(last.velocity[1] < 0.0);
    }

    #[test]
    fn test_cubic_holds_goal_when_done() {
        let mut interp = CubicInterpolator::new(0.5, 10.0);
        let goal = Vector3::new(0.3, 0.2, 0.1);
        interp.set_goal(goal);

        for _ in 0..10 {
            interp.interpolated_goal(&Vector3::zeros());
        }
        assert_eq!(interp.progress(), 1.0);
        assert_eq!(interp.interpolated_goal(&Vector3::zeros()), TrajectoryPoint::hold(goal));
    }

    #[test]
    fn test_cubic_new_goal_restarts() {
        let mut interp = CubicInterpolator::new(1.0, 10.0);
        interp.set_goal(Vector3::new(1.0, 0.0, 0.0));
        for _ in 0..3 {
            interp.interpolated_goal(&Vector3::zeros());
        }

        interp.set_goal(Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(interp.progress(), 0.0);
        let current = Vector3::new(0.2, 0.0, 0.0);
        let point = interp.interpolated_goal(&current);
        assert_relative_eq!(point.value, current, epsilon = 1e-12);
    }
}
