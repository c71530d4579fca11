use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Serialize, Deserialize};
use crate::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use crate::utils::utils_errors::WholeBodyError;
use crate::utils::utils_sampling::SimpleSamplers;

/// Position-level kinematics of one designated frame (an end effector or the whole-body
/// center of mass): world-frame position and linear velocity, plus the 3 x n linear
/// Jacobian and its time derivative over the full generalized-coordinate vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameKinematics {
    pub position: Vector3<f64>,
    pub linear_velocity: Vector3<f64>,
    pub linear_jacobian: DMatrix<f64>,
    pub linear_jacobian_derivative: DMatrix<f64>
}
impl FrameKinematics {
    pub fn new_zeros(num_coordinates: usize) -> Self {
        Self {
            position: Vector3::zeros(),
            linear_velocity: Vector3::zeros(),
            linear_jacobian: DMatrix::zeros(3, num_coordinates),
            linear_jacobian_derivative: DMatrix::zeros(3, num_coordinates)
        }
    }
    fn validate(&self, name: &str, num_coordinates: usize) -> Result<(), WholeBodyError> {
        if self.linear_jacobian.nrows() != 3 || self.linear_jacobian.ncols() != num_coordinates {
            return Err(WholeBodyError::new_dimension_mismatch_error(&format!("{} linear jacobian columns", name), num_coordinates, self.linear_jacobian.ncols(), file!(), line!()));
        }
        if self.linear_jacobian_derivative.nrows() != 3 || self.linear_jacobian_derivative.ncols() != num_coordinates {
            return Err(WholeBodyError::new_dimension_mismatch_error(&format!("{} linear jacobian derivative columns", name), num_coordinates, self.linear_jacobian_derivative.ncols(), file!(), line!()));
        }
        let all_finite = self.position.iter().all(|v| v.is_finite())
            && self.linear_velocity.iter().all(|v| v.is_finite())
            && self.linear_jacobian.iter().all(|v| v.is_finite())
            && self.linear_jacobian_derivative.iter().all(|v| v.is_finite());
        if !all_finite {
            return Err(WholeBodyError::new_non_finite_value_error(name, file!(), line!()));
        }
        Ok(())
    }
}

/// Inertial summary of one wheel body, used to remove the wheel contributions from the
/// whole-body center of mass before the balance task acts on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WheelInertial {
    pub mass: f64,
    pub com_position: Vector3<f64>,
    pub com_linear_velocity: Vector3<f64>
}
impl WheelInertial {
    pub fn new_zeros() -> Self {
        Self {
            mass: 0.0,
            com_position: Vector3::zeros(),
            com_linear_velocity: Vector3::zeros()
        }
    }
}

/// The `RobotCycleState` is the full kinematic and dynamic snapshot that the external
/// dynamics provider supplies at the start of every control cycle.  It is read-only to the
/// controller; nothing in here is re-read or mutated mid-cycle.
///
/// All quantities are expressed in the world frame over the generalized-coordinate layout
/// shared with the controller: positions `q`, raw measured velocities `dq`, the base
/// orientation matrix, the mass matrix `M(q)`, the bias forces `h(q, dq)` (Coriolis +
/// gravity), and per-frame kinematics for the two end effectors and the whole-body center
/// of mass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotCycleState {
    pub q: DVector<f64>,
    pub dq: DVector<f64>,
    pub base_rotation: Matrix3<f64>,
    pub mass_matrix: DMatrix<f64>,
    pub bias_forces: DVector<f64>,
    pub total_mass: f64,
    pub left_end_effector: FrameKinematics,
    pub right_end_effector: FrameKinematics,
    pub center_of_mass: FrameKinematics,
    pub left_wheel: WheelInertial,
    pub right_wheel: WheelInertial
}
impl RobotCycleState {
    /// Checks dimensions against the given layout and rejects non-finite values.  Run once
    /// per cycle before anything downstream consumes the state.
    pub fn validate(&self, layout: &GeneralizedCoordinateLayout) -> Result<(), WholeBodyError> {
        let n = layout.num_coordinates();
        if self.q.len() != n {
            return Err(WholeBodyError::new_dimension_mismatch_error("q", n, self.q.len(), file!(), line!()));
        }
        if self.dq.len() != n {
            return Err(WholeBodyError::new_dimension_mismatch_error("dq", n, self.dq.len(), file!(), line!()));
        }
        if self.mass_matrix.nrows() != n || self.mass_matrix.ncols() != n {
            return Err(WholeBodyError::new_dimension_mismatch_error("mass matrix", n, self.mass_matrix.nrows(), file!(), line!()));
        }
        if self.bias_forces.len() != n {
            return Err(WholeBodyError::new_dimension_mismatch_error("bias forces", n, self.bias_forces.len(), file!(), line!()));
        }

        let all_finite = self.q.iter().all(|v| v.is_finite())
            && self.dq.iter().all(|v| v.is_finite())
            && self.base_rotation.iter().all(|v| v.is_finite())
            && self.mass_matrix.iter().all(|v| v.is_finite())
            && self.bias_forces.iter().all(|v| v.is_finite())
            && self.total_mass.is_finite();
        if !all_finite {
            return Err(WholeBodyError::new_non_finite_value_error("robot cycle state", file!(), line!()));
        }

        self.left_end_effector.validate("left end effector", n)?;
        self.right_end_effector.validate("right end effector", n)?;
        self.center_of_mass.validate("center of mass", n)?;

        Ok(())
    }
    /// Mass of everything except the two wheels.
    pub fn body_mass(&self) -> f64 {
        self.total_mass - self.left_wheel.mass - self.right_wheel.mass
    }
    /// Whole-body center of mass with the wheel contributions removed.  The wheels are
    /// handled by the rolling constraint, so the balance task acts on this point instead
    /// of the raw center of mass.
    pub fn body_com_position(&self) -> Vector3<f64> {
        let p = self.total_mass * self.center_of_mass.position
            - self.left_wheel.mass * self.left_wheel.com_position
            - self.right_wheel.mass * self.right_wheel.com_position;
        return p / self.body_mass();
    }
    pub fn body_com_linear_velocity(&self) -> Vector3<f64> {
        let v = self.total_mass * self.center_of_mass.linear_velocity
            - self.left_wheel.mass * self.left_wheel.com_linear_velocity
            - self.right_wheel.mass * self.right_wheel.com_linear_velocity;
        return v / self.body_mass();
    }
    /// Ratio that rescales the full center-of-mass Jacobian onto the wheel-excluded body
    /// center of mass.
    pub fn body_com_mass_ratio(&self) -> f64 {
        self.total_mass / self.body_mass()
    }

    /// A simplified, physically plausible rest state over the given layout: identity base
    /// orientation, zero velocities, identity mass matrix, zero bias forces, end effectors
    /// held out in front of the base, and the body center of mass directly above the base
    /// origin.  Useful as a starting point for demos and tests that do not have a dynamics
    /// provider attached.
    pub fn new_synthetic_rest_state(layout: &GeneralizedCoordinateLayout) -> Self {
        let n = layout.num_coordinates();

        let mut left_end_effector = FrameKinematics::new_zeros(n);
        left_end_effector.position = Vector3::new(0.3, 0.1, 0.9);
        for (i, c) in layout.left_arm_coordinates().take(3).enumerate() {
            left_end_effector.linear_jacobian[(i, c)] = 1.0;
        }

        let mut right_end_effector = FrameKinematics::new_zeros(n);
        right_end_effector.position = Vector3::new(0.3, -0.1, 0.9);
        for (i, c) in layout.right_arm_coordinates().take(3).enumerate() {
            right_end_effector.linear_jacobian[(i, c)] = 1.0;
        }

        let mut center_of_mass = FrameKinematics::new_zeros(n);
        center_of_mass.position = Vector3::new(0.0, 0.0, 0.5);
        center_of_mass.linear_jacobian[(0, layout.base_pitch_coordinate())] = 1.0;
        center_of_mass.linear_jacobian[(2, layout.torso_coordinate())] = 1.0;

        Self {
            q: DVector::zeros(n),
            dq: DVector::zeros(n),
            base_rotation: Matrix3::identity(),
            mass_matrix: DMatrix::identity(n, n),
            bias_forces: DVector::zeros(n),
            total_mass: 60.0,
            left_end_effector,
            right_end_effector,
            center_of_mass,
            left_wheel: WheelInertial::new_zeros(),
            right_wheel: WheelInertial::new_zeros()
        }
    }
    /// The synthetic rest state with uniform noise of the given magnitude added to the
    /// actuated joint positions and velocities.
    pub fn new_synthetic_perturbed_state(layout: &GeneralizedCoordinateLayout, magnitude: f64) -> Self {
        let mut out_state = Self::new_synthetic_rest_state(layout);

        let actuated = layout.actuated_coordinates();
        let q_noise = SimpleSamplers::uniform_samples_symmetric(actuated.len(), magnitude);
        let dq_noise = SimpleSamplers::uniform_samples_symmetric(actuated.len(), magnitude);
        for (i, c) in actuated.enumerate() {
            out_state.q[c] += q_noise[i];
            out_state.dq[c] += dq_noise[i];
        }

        return out_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_rest_state_validates() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let state = RobotCycleState::new_synthetic_rest_state(&layout);
        assert!(state.validate(&layout).is_ok());
    }

    #[test]
    fn test_wrong_dimension_is_rejected() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let mut state = RobotCycleState::new_synthetic_rest_state(&layout);
        state.q = DVector::zeros(24);
        assert!(state.validate(&layout).is_err());
    }

    #[test]
    fn test_non_finite_state_is_rejected() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let mut state = RobotCycleState::new_synthetic_rest_state(&layout);
        state.mass_matrix[(0, 0)] = f64::NAN;
        assert!(state.validate(&layout).is_err());
    }

    #[test]
    fn test_body_com_excludes_wheels() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let mut state = RobotCycleState::new_synthetic_rest_state(&layout);
        state.total_mass = 10.0;
        state.center_of_mass.position = Vector3::new(0.0, 0.0, 1.0);
        state.left_wheel = WheelInertial { mass: 2.0, com_position: Vector3::new(0.0, 0.34, 0.25), com_linear_velocity: Vector3::zeros() };
        state.right_wheel = WheelInertial { mass: 2.0, com_position: Vector3::new(0.0, -0.34, 0.25), com_linear_velocity: Vector3::zeros() };

        let body_com = state.body_com_position();
        // (10*1.0 - 2*0.25 - 2*0.25) / 6
        assert!((body_com[2] - 1.5).abs() < 1e-12);
        assert!(body_com[1].abs() < 1e-12);
        assert!((state.body_com_mass_ratio() - 10.0 / 6.0).abs() < 1e-12);
    }
}
