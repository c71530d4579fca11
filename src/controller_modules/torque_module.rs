use nalgebra::{DMatrix, DVector};
use crate::controller_modules::constraint_module::RollingConstraints;
use crate::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use crate::robot_modules::robot_state_module::RobotCycleState;
use crate::utils::utils_errors::WholeBodyError;

/// Joint torques recovered from an acceleration/multiplier solution via the actuated rows
/// of the dynamics, `tau = M_act * ddq + h_act - J_c_act^T * lambda`.  The passive base
/// coordinates carry no command; torques are indexed by actuated coordinate.
#[derive(Clone, Debug)]
pub struct ActuatorCommand {
    first_actuated_coordinate: usize,
    torques: DVector<f64>
}
impl ActuatorCommand {
    pub fn new(state: &RobotCycleState, layout: &GeneralizedCoordinateLayout, rolling_constraints: &RollingConstraints, x: &DVector<f64>) -> Result<Self, WholeBodyError> {
        if x.len() != layout.num_problem_variables() {
            return Err(WholeBodyError::new_dimension_mismatch_error("solution vector", layout.num_problem_variables(), x.len(), file!(), line!()));
        }

        let actuated = layout.actuated_coordinates();
        let num_actuated = layout.num_actuated_coordinates();
        let num_coordinates = layout.num_coordinates();
        let num_constraints = layout.num_rolling_constraints();

        let ddq = x.rows(0, num_coordinates).into_owned();
        let lambda = x.rows(layout.multiplier_variables().start, num_constraints).into_owned();

        let m_act: DMatrix<f64> = state.mass_matrix.slice((actuated.start, 0), (num_actuated, num_coordinates)).into_owned();
        let h_act: DVector<f64> = state.bias_forces.rows(actuated.start, num_actuated).into_owned();
        let j_c_act_t: DMatrix<f64> = rolling_constraints.jacobian().slice((0, actuated.start), (num_constraints, num_actuated)).transpose();

        let torques = m_act * ddq + h_act - j_c_act_t * lambda;
        if torques.iter().any(|v| !v.is_finite()) {
            return Err(WholeBodyError::new_non_finite_value_error("actuator torques", file!(), line!()));
        }

        return Ok(Self { first_actuated_coordinate: actuated.start, torques });
    }
    pub fn new_zeros(layout: &GeneralizedCoordinateLayout) -> Self {
        Self {
            first_actuated_coordinate: layout.actuated_coordinates().start,
            torques: DVector::zeros(layout.num_actuated_coordinates())
        }
    }
    pub fn torques(&self) -> &DVector<f64> {
        &self.torques
    }
    /// Torque for a generalized coordinate index.  Returns `None` for passive coordinates.
    pub fn torque_for_coordinate(&self, coordinate: usize) -> Option<f64> {
        if coordinate < self.first_actuated_coordinate { return None; }
        let idx = coordinate - self.first_actuated_coordinate;
        if idx >= self.torques.len() { return None; }
        return Some(self.torques[idx]);
    }
    pub fn max_abs_torque(&self) -> f64 {
        self.torques.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }
}
