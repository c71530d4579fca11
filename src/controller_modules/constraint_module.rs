use nalgebra::{DMatrix, DVector};
use serde::{Serialize, Deserialize};
use crate::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use crate::robot_modules::robot_state_module::RobotCycleState;
use crate::utils::utils_errors::WholeBodyError;

/// Geometric constants of the two-wheel differential base.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WheelGeometry {
    pub wheel_radius: f64,
    pub wheel_separation: f64
}
impl Default for WheelGeometry {
    fn default() -> Self {
        Self {
            wheel_radius: 0.265,
            wheel_separation: 0.68
        }
    }
}

/// The five velocity-level kinematic constraints of the two-wheel differential base,
/// expressed as a constraint Jacobian `J_c` (5 x n) over the generalized velocities:
///
/// 0. no vertical base velocity,
/// 1. base yaw rate locked to the differential wheel spin,
/// 2. no lateral base velocity,
/// 3. no out-of-plane translational velocity,
/// 4. rolling without slipping: wheel-spin sum locked to base forward speed.
///
/// The coefficients depend only on the wheel geometry and the current base pitch angle.
/// These constraints are nonholonomic: they restrict velocities without reducing to any
/// position-level constraint.
#[derive(Clone, Debug)]
pub struct RollingConstraints {
    jacobian: DMatrix<f64>,
    num_constraints: usize
}
impl RollingConstraints {
    pub fn new(layout: &GeneralizedCoordinateLayout, geometry: &WheelGeometry, base_pitch_angle: f64) -> Self {
        let n = layout.num_coordinates();
        let num_constraints = layout.num_rolling_constraints();
        let mut jacobian = DMatrix::zeros(num_constraints, n);

        let r = geometry.wheel_radius;
        let l = geometry.wheel_separation;
        let (sin_pitch, cos_pitch) = base_pitch_angle.sin_cos();

        let pitch = layout.base_pitch_coordinate();
        let rot = layout.base_rotation_coordinates();
        let trans = layout.base_translation_coordinates();
        let left_wheel = layout.left_wheel_coordinate();
        let right_wheel = layout.right_wheel_coordinate();

        // 0. dZ0 = 0
        jacobian[(0, trans.start + 1)] = cos_pitch;
        jacobian[(0, trans.start + 2)] = sin_pitch;
        // 1. da3 + R/L * (dthL - dthR) = 0
        jacobian[(1, rot.start + 1)] = cos_pitch;
        jacobian[(1, rot.start + 2)] = sin_pitch;
        jacobian[(1, left_wheel)] = r / l;
        jacobian[(1, right_wheel)] = -r / l;
        // 2. da1*cos(psi) + da2*sin(psi) = 0
        jacobian[(2, rot.start + 1)] = sin_pitch;
        jacobian[(2, rot.start + 2)] = -cos_pitch;
        // 3. dX0*sin(psi) - dY0*cos(psi) = 0
        jacobian[(3, trans.start)] = 1.0;
        // 4. dX0*cos(psi) + dY0*sin(psi) - R/2 * (dthL + dthR - 2*dpitch) = 0
        jacobian[(4, pitch)] = r;
        jacobian[(4, trans.start + 1)] = sin_pitch;
        jacobian[(4, trans.start + 2)] = -cos_pitch;
        jacobian[(4, left_wheel)] = -r / 2.0;
        jacobian[(4, right_wheel)] = -r / 2.0;

        Self { jacobian, num_constraints }
    }
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }
    pub fn num_constraints(&self) -> usize {
        self.num_constraints
    }
    /// A degenerate configuration makes the constraint Jacobian lose rank and the
    /// multiplier solve unstable; checked each cycle before the solve.
    pub fn check_rank(&self, tolerance: f64) -> Result<(), WholeBodyError> {
        let rank = self.jacobian.clone().rank(tolerance);
        if rank < self.num_constraints {
            return Err(WholeBodyError::new_degenerate_constraint_error(rank, self.num_constraints, file!(), line!()));
        }
        Ok(())
    }
}

/// The single equality constraint handed to the optimizer: the six unconstrained
/// floating-base rows of the equations of motion, with the rolling-constraint reaction
/// forces acting on the base through the transposed base columns of `J_c`:
///
/// `M_base * ddq - J_c_base^T * lambda = -h_base`
///
/// expressed as `A * x = b` over the stacked variable `x = (ddq, lambda)`.
#[derive(Clone, Debug)]
pub struct EqualityConstraint {
    a: DMatrix<f64>,
    b: DVector<f64>
}
impl EqualityConstraint {
    pub fn new(state: &RobotCycleState, layout: &GeneralizedCoordinateLayout, rolling_constraints: &RollingConstraints) -> Self {
        let n = layout.num_coordinates();
        let n_vars = layout.num_problem_variables();
        let num_base = layout.num_base_coordinates();
        let num_constraints = rolling_constraints.num_constraints();
        let base = layout.base_coordinates();

        let mut a = DMatrix::zeros(num_base, n_vars);
        a.slice_mut((0, 0), (num_base, n)).copy_from(&state.mass_matrix.slice((base.start, 0), (num_base, n)));

        let j_c_base = rolling_constraints.jacobian().slice((0, base.start), (num_constraints, num_base)).transpose();
        a.slice_mut((0, n), (num_base, num_constraints)).copy_from(&(-j_c_base));

        let mut b = DVector::zeros(num_base);
        for i in 0..num_base { b[i] = -state.bias_forces[base.start + i]; }

        Self { a, b }
    }
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }
    pub fn num_rows(&self) -> usize {
        self.a.nrows()
    }
    /// Norm of `A * x - b`, used to classify a solved cycle as converged or degraded.
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        (&self.a * x - &self.b).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller_modules::heading_frame_module::HeadingFrame;

    fn reference_constraints(base_pitch_angle: f64) -> (GeneralizedCoordinateLayout, RollingConstraints) {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let constraints = RollingConstraints::new(&layout, &WheelGeometry::default(), base_pitch_angle);
        (layout, constraints)
    }

    #[test]
    fn test_constraint_jacobian_structure() {
        let (_, constraints) = reference_constraints(0.0);
        let j = constraints.jacobian();
        assert_eq!(j.nrows(), 5);
        assert_eq!(j.ncols(), 25);

        // At zero pitch: cos = 1, sin = 0.
        assert_eq!(j[(0, 4)], 1.0);
        assert_eq!(j[(0, 5)], 0.0);
        assert_eq!(j[(1, 1)], 1.0);
        assert!((j[(1, 6)] - 0.265 / 0.68).abs() < 1e-12);
        assert!((j[(1, 7)] + 0.265 / 0.68).abs() < 1e-12);
        assert_eq!(j[(3, 3)], 1.0);
        assert_eq!(j[(4, 0)], 0.265);
        assert!((j[(4, 6)] + 0.265 / 2.0).abs() < 1e-12);

        // Nothing outside the base and wheel columns.
        for r in 0..5 {
            for c in 8..25 {
                assert_eq!(j[(r, c)], 0.0);
            }
        }
    }

    #[test]
    fn test_full_rank_across_pitch_angles() {
        for pitch in [-1.2, -0.5, 0.0, 0.5, 1.2, std::f64::consts::FRAC_PI_2] {
            let (_, constraints) = reference_constraints(pitch);
            assert!(constraints.check_rank(1e-9).is_ok(), "rank deficient at pitch {}", pitch);
        }
    }

    #[test]
    fn test_equality_block_assembly() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let mut state = RobotCycleState::new_synthetic_rest_state(&layout);
        for i in 0..25 { state.bias_forces[i] = i as f64; }
        let dq = state.dq.clone();
        let frame = HeadingFrame::new(&state, &dq, &layout);
        let constraints = RollingConstraints::new(&layout, &WheelGeometry::default(), frame.base_pitch_angle());
        let eq = EqualityConstraint::new(&state, &layout, &constraints);

        assert_eq!(eq.a().nrows(), 6);
        assert_eq!(eq.a().ncols(), 30);

        // Mass-matrix block: identity rows for the synthetic state.
        for r in 0..6 {
            for c in 0..25 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_eq!(eq.a()[(r, c)], expected);
            }
        }
        // Multiplier block: -J_c_base^T.
        for r in 0..6 {
            for k in 0..5 {
                assert_eq!(eq.a()[(r, 25 + k)], -constraints.jacobian()[(k, r)]);
            }
        }
        // Right-hand side: -h_base.
        for r in 0..6 {
            assert_eq!(eq.b()[r], -(r as f64));
        }
    }

    #[test]
    fn test_residual_norm_at_feasible_point() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let state = RobotCycleState::new_synthetic_rest_state(&layout);
        let dq = state.dq.clone();
        let frame = HeadingFrame::new(&state, &dq, &layout);
        let constraints = RollingConstraints::new(&layout, &WheelGeometry::default(), frame.base_pitch_angle());
        let eq = EqualityConstraint::new(&state, &layout, &constraints);

        // Zero bias forces and x = 0: trivially feasible.
        assert!(eq.residual_norm(&DVector::zeros(30)) < 1e-15);
    }
}
