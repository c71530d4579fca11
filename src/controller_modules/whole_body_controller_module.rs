use std::time::Duration;
use nalgebra::{DVector, Vector3};
use serde::{Serialize, Deserialize};
use crate::controller_modules::constraint_module::{EqualityConstraint, RollingConstraints, WheelGeometry};
use crate::controller_modules::heading_frame_module::HeadingFrame;
use crate::controller_modules::task_module::{TaskBuilder, TaskGains, TaskWeights};
use crate::controller_modules::telemetry_module::{ControlCycleTelemetry, CycleOutcome};
use crate::controller_modules::torque_module::ActuatorCommand;
use crate::controller_modules::velocity_filter_module::VelocityFilter;
use crate::nonlinear_optimization::{EqualityConstrainedSolver, EqualityConstrainedSolverType, OptimizerParameters, QuadraticObjective};
use crate::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use crate::robot_modules::robot_state_module::RobotCycleState;
use crate::utils::utils_errors::WholeBodyError;

/// All tunable parameters of the controller in one serializable bundle.
///
/// `solve_deadline_fraction` caps each solve at that fraction of the control period;
/// set it to `None` to let the optimizer run to its tolerances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WholeBodyControllerConfig {
    pub control_rate_hz: f64,
    pub velocity_filter_window: usize,
    pub wheel_geometry: WheelGeometry,
    pub gains: TaskGains,
    pub weights: TaskWeights,
    pub epsilon_tolerance: f64,
    pub delta_tolerance: f64,
    pub solve_deadline_fraction: Option<f64>,
    pub max_inner_iterations: Option<usize>,
    pub rank_tolerance: f64,
    pub equality_residual_tolerance: f64
}
impl Default for WholeBodyControllerConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: 100.0,
            velocity_filter_window: 25,
            wheel_geometry: WheelGeometry::default(),
            gains: TaskGains::default(),
            weights: TaskWeights::default(),
            epsilon_tolerance: 1e-5,
            delta_tolerance: 1e-3,
            solve_deadline_fraction: Some(0.9),
            max_inner_iterations: None,
            rank_tolerance: 1e-9,
            equality_residual_tolerance: 1e-2
        }
    }
}
impl WholeBodyControllerConfig {
    pub fn new_from_json_string(json_str: &str) -> Result<Self, WholeBodyError> {
        return match serde_json::from_str(json_str) {
            Ok(config) => { Ok(config) }
            Err(e) => { Err(WholeBodyError::new_generic_error_str(&format!("could not parse controller config: {}", e), file!(), line!())) }
        }
    }
    pub fn to_json_string(&self) -> Result<String, WholeBodyError> {
        return match serde_json::to_string_pretty(self) {
            Ok(s) => { Ok(s) }
            Err(e) => { Err(WholeBodyError::new_generic_error_str(&format!("could not serialize controller config: {}", e), file!(), line!())) }
        }
    }
    pub fn control_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.control_rate_hz)
    }
}

/// Output of one control cycle.  The command is always usable: on a failed cycle it is the
/// previous cycle's command, and the telemetry says so.
#[derive(Clone, Debug)]
pub struct ControlCycleOutput {
    pub command: ActuatorCommand,
    pub telemetry: ControlCycleTelemetry
}

/// The whole-body torque controller session.  One instance per robot; `update` is called
/// once per control cycle with the freshly computed dynamics quantities and returns joint
/// torques for the actuated coordinates.
///
/// The session owns everything that persists between cycles: the velocity filter, the
/// optimizer warm start, the posture and center-of-mass height references (captured from
/// the state given to `new`), and the last successfully issued command.
#[derive(Clone, Debug)]
pub struct WholeBodyController {
    config: WholeBodyControllerConfig,
    layout: GeneralizedCoordinateLayout,
    solver: EqualityConstrainedSolver,
    optimizer_parameters: OptimizerParameters,
    velocity_filter: VelocityFilter,
    warm_start: DVector<f64>,
    previous_command: ActuatorCommand,
    q_reference: DVector<f64>,
    com_height_reference: f64,
    step: usize
}
impl WholeBodyController {
    pub fn new(config: WholeBodyControllerConfig, layout: GeneralizedCoordinateLayout, initial_state: &RobotCycleState) -> Result<Self, WholeBodyError> {
        initial_state.validate(&layout)?;

        let mut optimizer_parameters = OptimizerParameters::new_empty();
        optimizer_parameters.set_epsilon_tolerance(config.epsilon_tolerance);
        optimizer_parameters.set_delta_tolerance(config.delta_tolerance);
        if let Some(fraction) = config.solve_deadline_fraction {
            optimizer_parameters.set_max_time(Duration::from_secs_f64(fraction / config.control_rate_hz));
        }
        if let Some(max_inner_iterations) = config.max_inner_iterations {
            optimizer_parameters.set_max_inner_iterations(max_inner_iterations);
        }

        let solver = EqualityConstrainedSolver::new(layout.num_problem_variables(), EqualityConstrainedSolverType::OpEn);
        let velocity_filter = VelocityFilter::new(config.velocity_filter_window, layout.num_coordinates());
        let warm_start = DVector::zeros(layout.num_problem_variables());
        let previous_command = ActuatorCommand::new_zeros(&layout);
        let q_reference = initial_state.q.clone();
        // The heading frame only rotates about the world vertical, so the height reference
        // can be read off the world-frame center of mass directly.
        let com_height_reference = initial_state.body_com_position()[2];

        return Ok(Self {
            config,
            layout,
            solver,
            optimizer_parameters,
            velocity_filter,
            warm_start,
            previous_command,
            q_reference,
            com_height_reference,
            step: 0
        });
    }
    /// Runs one control cycle.  `target_position` is the set point tracked by both end
    /// effectors, expressed in the heading frame (yaw-aligned, relative to the base
    /// origin) so that the commanded behavior does not depend on where the robot is
    /// standing or pointing.
    ///
    /// Recoverable faults (non-finite state values, a rank-deficient constraint set, a
    /// solver failure, a non-finite solution) re-issue the previous command and flag the
    /// telemetry; only structural misuse such as wrongly sized inputs returns an error.
    pub fn update(&mut self, state: &RobotCycleState, target_position: &Vector3<f64>) -> Result<ControlCycleOutput, WholeBodyError> {
        let start = instant::Instant::now();
        let mut output = self.run_cycle(state, target_position)?;
        output.telemetry.cycle_time = start.elapsed();
        return Ok(output);
    }
    fn run_cycle(&mut self, state: &RobotCycleState, target_position: &Vector3<f64>) -> Result<ControlCycleOutput, WholeBodyError> {
        self.step += 1;

        if let Err(e) = state.validate(&self.layout) {
            return match e {
                WholeBodyError::NonFiniteValueError(_) => { Ok(self.hold_previous_command()) }
                _ => { Err(e) }
            }
        }

        self.velocity_filter.add_sample(&state.dq);
        let dq_filtered = self.velocity_filter.average().clone();

        let frame = HeadingFrame::new(state, &dq_filtered, &self.layout);
        let rolling_constraints = RollingConstraints::new(&self.layout, &self.config.wheel_geometry, frame.base_pitch_angle());
        if rolling_constraints.check_rank(self.config.rank_tolerance).is_err() {
            return Ok(self.hold_previous_command());
        }
        let equality_constraint = EqualityConstraint::new(state, &self.layout, &rolling_constraints);

        let task_builder = TaskBuilder::new(&self.layout, &self.config.gains, &self.config.weights, state, &frame, &dq_filtered);
        let task_stack = task_builder.build_stack(target_position, &self.q_reference, self.com_height_reference);
        let (p, b) = task_stack.stacked();
        let objective = QuadraticObjective::new(p, b);

        let result = match self.solver.solve(&objective, equality_constraint.a(), equality_constraint.b(), &self.warm_start, &self.optimizer_parameters) {
            Ok(result) => { result }
            Err(_) => { return Ok(self.hold_previous_command()); }
        };

        let x = result.x_min();
        if x.iter().any(|v| !v.is_finite()) {
            return Ok(self.hold_previous_command());
        }

        let command = match ActuatorCommand::new(state, &self.layout, &rolling_constraints, x) {
            Ok(command) => { command }
            Err(_) => { return Ok(self.hold_previous_command()); }
        };

        let equality_residual_norm = equality_constraint.residual_norm(x);
        let outcome = if equality_residual_norm > self.config.equality_residual_tolerance {
            CycleOutcome::Degraded
        } else if result.converged() {
            CycleOutcome::Converged
        } else {
            CycleOutcome::BestEffort
        };

        let mut telemetry = ControlCycleTelemetry {
            step: self.step,
            outcome,
            cost: result.cost(),
            equality_residual_norm,
            task_squared_residuals: vec![],
            num_inner_iterations: result.num_inner_iterations(),
            num_outer_iterations: result.num_outer_iterations(),
            solve_time: result.solve_time(),
            cycle_time: Duration::from_secs(0),
            max_abs_torque: command.max_abs_torque()
        };
        telemetry.record_task_residuals(&task_stack, x);

        self.warm_start = x.clone();
        self.previous_command = command.clone();

        return Ok(ControlCycleOutput { command, telemetry });
    }
    fn hold_previous_command(&self) -> ControlCycleOutput {
        let mut telemetry = ControlCycleTelemetry::new_held(self.step);
        telemetry.max_abs_torque = self.previous_command.max_abs_torque();
        ControlCycleOutput {
            command: self.previous_command.clone(),
            telemetry
        }
    }
    /// Clears all per-session state.  The posture and height references are kept.
    pub fn reset(&mut self) {
        self.velocity_filter.reset();
        self.warm_start = DVector::zeros(self.layout.num_problem_variables());
        self.previous_command = ActuatorCommand::new_zeros(&self.layout);
        self.step = 0;
    }
    pub fn set_posture_reference(&mut self, q_reference: DVector<f64>) -> Result<(), WholeBodyError> {
        if q_reference.len() != self.layout.num_coordinates() {
            return Err(WholeBodyError::new_dimension_mismatch_error("posture reference", self.layout.num_coordinates(), q_reference.len(), file!(), line!()));
        }
        self.q_reference = q_reference;
        return Ok(());
    }
    pub fn config(&self) -> &WholeBodyControllerConfig {
        &self.config
    }
    pub fn layout(&self) -> &GeneralizedCoordinateLayout {
        &self.layout
    }
    pub fn q_reference(&self) -> &DVector<f64> {
        &self.q_reference
    }
    pub fn com_height_reference(&self) -> f64 {
        self.com_height_reference
    }
    pub fn step(&self) -> usize {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_json_round_trip() {
        let config = WholeBodyControllerConfig::default();
        let json_str = config.to_json_string().expect("serialize failed");
        let config2 = WholeBodyControllerConfig::new_from_json_string(&json_str).expect("parse failed");
        assert_eq!(config.control_rate_hz, config2.control_rate_hz);
        assert_eq!(config.velocity_filter_window, config2.velocity_filter_window);
        assert_eq!(config.weights.limb_right, config2.weights.limb_right);
        assert_eq!(config.solve_deadline_fraction, config2.solve_deadline_fraction);
    }

    #[test]
    fn test_new_captures_references_from_initial_state() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let state = RobotCycleState::new_synthetic_rest_state(&layout);
        let controller = WholeBodyController::new(WholeBodyControllerConfig::default(), layout.clone(), &state).expect("construction failed");
        assert_eq!(controller.q_reference(), &state.q);
        assert!((controller.com_height_reference() - state.body_com_position()[2]).abs() < 1e-12);
        assert_eq!(controller.step(), 0);
    }

    #[test]
    fn test_non_finite_state_holds_previous_command() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let state = RobotCycleState::new_synthetic_rest_state(&layout);
        let mut controller = WholeBodyController::new(WholeBodyControllerConfig::default(), layout.clone(), &state).expect("construction failed");

        let mut bad_state = state.clone();
        bad_state.dq[3] = f64::NAN;
        let output = controller.update(&bad_state, &Vector3::new(0.3, 0.0, 0.9)).expect("update errored");
        assert_eq!(output.telemetry.outcome, CycleOutcome::HeldPreviousCommand);
        assert!(output.command.max_abs_torque() < 1e-12);
    }

    #[test]
    fn test_wrongly_sized_state_is_an_error() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        let state = RobotCycleState::new_synthetic_rest_state(&layout);
        let mut controller = WholeBodyController::new(WholeBodyControllerConfig::default(), layout.clone(), &state).expect("construction failed");

        let mut bad_state = state.clone();
        bad_state.q = DVector::zeros(3);
        assert!(controller.update(&bad_state, &Vector3::new(0.3, 0.0, 0.9)).is_err());
    }
}
