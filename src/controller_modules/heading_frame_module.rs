use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, Vector3};
use crate::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use crate::robot_modules::robot_state_module::RobotCycleState;

/// The `HeadingFrame` is the yaw-aligned reference frame that every task error and task
/// Jacobian is expressed in.  It is rebuilt from scratch each cycle from the base
/// orientation; nothing in here persists across cycles.
///
/// The heading angle is extracted from the base orientation matrix as
/// `psi = atan2(R00, -R10)`, and the frame rotation is the transposed yaw-only rotation
/// `Rz(psi)^T` (a world -> body-yaw change of basis).  Expressing all tasks here makes the
/// whole controller invariant to where the robot happens to be pointing.
#[derive(Clone, Debug)]
pub struct HeadingFrame {
    psi: f64,
    rotation: Matrix3<f64>,
    rotation_derivative: Matrix3<f64>,
    base_origin: Vector3<f64>,
    base_origin_velocity: Vector3<f64>,
    base_pitch_angle: f64
}
impl HeadingFrame {
    pub fn new(state: &RobotCycleState, dq_filtered: &DVector<f64>, layout: &GeneralizedCoordinateLayout) -> Self {
        let r = &state.base_rotation;
        let psi = f64::atan2(r[(0, 0)], -r[(1, 0)]);
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), psi).matrix().transpose();

        // Zero yaw-rate approximation.  The dpsi term is wired through so a nonzero
        // estimate can be dropped in without touching the task builder.
        let dpsi = 0.0;
        let rotation_derivative = Matrix3::new(
            -psi.sin() * dpsi, psi.cos() * dpsi, 0.0,
            -psi.cos() * dpsi, -psi.sin() * dpsi, 0.0,
            0.0, 0.0, 0.0
        );

        let translation = layout.base_translation_coordinates();
        let base_origin = Vector3::new(state.q[translation.start], state.q[translation.start + 1], state.q[translation.start + 2]);
        let dq_translation = Vector3::new(dq_filtered[translation.start], dq_filtered[translation.start + 1], dq_filtered[translation.start + 2]);
        let base_origin_velocity = state.base_rotation * dq_translation;

        let base_pitch_angle = f64::atan2(r[(0, 1)] * psi.cos() + r[(1, 1)] * psi.sin(), r[(2, 1)]);

        Self {
            psi,
            rotation,
            rotation_derivative,
            base_origin,
            base_origin_velocity,
            base_pitch_angle
        }
    }
    pub fn psi(&self) -> f64 {
        self.psi
    }
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }
    pub fn rotation_derivative(&self) -> &Matrix3<f64> {
        &self.rotation_derivative
    }
    pub fn base_origin(&self) -> &Vector3<f64> {
        &self.base_origin
    }
    pub fn base_origin_velocity(&self) -> &Vector3<f64> {
        &self.base_origin_velocity
    }
    /// Lean angle of the base about the wheel axle, used by the rolling-constraint
    /// coefficients.
    pub fn base_pitch_angle(&self) -> f64 {
        self.base_pitch_angle
    }
    /// Expresses a world-frame point relative to the base origin in the heading frame.
    pub fn point_to_heading(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * (point - self.base_origin)
    }
    /// Expresses a world-frame linear velocity relative to the base origin velocity in the
    /// heading frame.
    pub fn velocity_to_heading(&self, velocity: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * (velocity - self.base_origin_velocity)
    }
    /// Rotates a 3 x n world-frame linear Jacobian into the heading frame.
    pub fn jacobian_to_heading(&self, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(3, jacobian.ncols());
        for c in 0..jacobian.ncols() {
            for r in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 { sum += self.rotation[(r, k)] * jacobian[(k, c)]; }
                out[(r, c)] = sum;
            }
        }
        return out;
    }
    /// Time derivative of a rotated Jacobian: `dRot0 * J + Rot0 * dJ`.
    pub fn jacobian_derivative_to_heading(&self, jacobian: &DMatrix<f64>, jacobian_derivative: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(3, jacobian.ncols());
        for c in 0..jacobian.ncols() {
            for r in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += self.rotation_derivative[(r, k)] * jacobian[(k, c)] + self.rotation[(r, k)] * jacobian_derivative[(k, c)];
                }
                out[(r, c)] = sum;
            }
        }
        return out;
    }
}
