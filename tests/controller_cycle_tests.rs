use nalgebra::{DVector, Rotation3, Vector3};
use wholebody::controller_modules::task_module::TaskKind;
use wholebody::controller_modules::telemetry_module::CycleOutcome;
use wholebody::controller_modules::whole_body_controller_module::{WholeBodyController, WholeBodyControllerConfig};
use wholebody::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use wholebody::robot_modules::robot_state_module::RobotCycleState;

fn untimed_config() -> WholeBodyControllerConfig {
    let mut config = WholeBodyControllerConfig::default();
    config.solve_deadline_fraction = None;
    return config;
}

#[test]
fn test_all_zero_weights_give_minimum_norm_solution() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let state = RobotCycleState::new_synthetic_rest_state(&layout);

    let mut config = untimed_config();
    config.weights.limb_right = 0.0;
    config.weights.limb_left = 0.0;
    config.weights.balance_fore_aft = 0.0;
    config.weights.balance_vertical = 0.0;

    let mut controller = WholeBodyController::new(config, layout.clone(), &state).expect("construction failed");
    let output = controller.update(&state, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");

    // With every task weight at zero, and the rest state already feasible, the warm-started
    // solve should stay at the origin and command essentially no torque.
    assert_eq!(output.telemetry.outcome, CycleOutcome::Converged);
    assert!(output.command.max_abs_torque() < 1e-3);
    assert!(output.telemetry.equality_residual_norm < 1e-3);
}

#[test]
fn test_target_at_current_hand_position_gives_near_zero_torque() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let mut state = RobotCycleState::new_synthetic_rest_state(&layout);
    // Put both hands at the same point so one target can satisfy both trackers exactly.
    let meeting_point = Vector3::new(0.3, 0.0, 0.9);
    state.left_end_effector.position = meeting_point;
    state.right_end_effector.position = meeting_point;

    let mut controller = WholeBodyController::new(untimed_config(), layout.clone(), &state).expect("construction failed");

    // Heading-frame image of the meeting point: the rest state is at the origin with
    // identity base rotation, whose extracted heading angle is pi/2.
    let target = Vector3::new(meeting_point[1], -meeting_point[0], meeting_point[2]);
    let output = controller.update(&state, &target).expect("update errored");

    // Every task error is zero and zero acceleration is feasible, so the first cycle
    // should command essentially nothing.
    assert_eq!(output.telemetry.outcome, CycleOutcome::Converged);
    assert!(output.command.max_abs_torque() < 1e-3);
}

#[test]
fn test_balanced_rest_state_keeps_wheel_torques_negligible() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let state = RobotCycleState::new_synthetic_rest_state(&layout);

    let mut config = untimed_config();
    config.weights.limb_right = 0.0;
    config.weights.limb_left = 0.0;

    let mut controller = WholeBodyController::new(config, layout.clone(), &state).expect("construction failed");
    let output = controller.update(&state, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");

    // The center of mass sits exactly at its captured reference, so the balance task asks
    // for nothing and the wheels stay quiet.
    assert_ne!(output.telemetry.outcome, CycleOutcome::HeldPreviousCommand);
    let left = output.command.torque_for_coordinate(layout.left_wheel_coordinate()).unwrap();
    let right = output.command.torque_for_coordinate(layout.right_wheel_coordinate()).unwrap();
    assert!(left.abs() < 1e-2);
    assert!(right.abs() < 1e-2);
}

/// Rest state re-oriented so the heading frame coincides with the world frame, with the
/// body center of mass shifted forward by `displacement`.
fn leaning_state(layout: &GeneralizedCoordinateLayout, displacement: f64) -> RobotCycleState {
    let mut state = RobotCycleState::new_synthetic_rest_state(layout);
    state.base_rotation = *Rotation3::from_axis_angle(&Vector3::z_axis(), -std::f64::consts::FRAC_PI_2).matrix();
    state.center_of_mass.position[0] += displacement;
    return state;
}

/// Config for the lean scenarios: no deadline, and a small generic regularization weight
/// so the acceleration directions no task cares about are pinned instead of left flat.
fn lean_config() -> WholeBodyControllerConfig {
    let mut config = untimed_config();
    config.weights.generic_regulation = 1e-3;
    return config;
}

#[test]
fn test_forward_lean_drives_both_wheels_backward() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let upright = leaning_state(&layout, 0.0);
    let leaning = leaning_state(&layout, 0.05);

    let mut controller = WholeBodyController::new(lean_config(), layout.clone(), &upright).expect("construction failed");
    let output = controller.update(&leaning, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");

    // A forward center-of-mass offset demands a braking acceleration, which the rolling
    // constraint converts into a common-mode wheel torque.
    assert_ne!(output.telemetry.outcome, CycleOutcome::HeldPreviousCommand);
    let left = output.command.torque_for_coordinate(layout.left_wheel_coordinate()).unwrap();
    let right = output.command.torque_for_coordinate(layout.right_wheel_coordinate()).unwrap();
    assert!(left < -1.0, "left wheel torque was {}", left);
    assert!(right < -1.0, "right wheel torque was {}", right);
    assert!((left - right).abs() < 1.0);
}

#[test]
fn test_backward_lean_flips_the_wheel_torque_sign() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let upright = leaning_state(&layout, 0.0);
    let leaning = leaning_state(&layout, -0.05);

    let mut controller = WholeBodyController::new(lean_config(), layout.clone(), &upright).expect("construction failed");
    let output = controller.update(&leaning, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");

    let left = output.command.torque_for_coordinate(layout.left_wheel_coordinate()).unwrap();
    let right = output.command.torque_for_coordinate(layout.right_wheel_coordinate()).unwrap();
    assert!(left > 1.0, "left wheel torque was {}", left);
    assert!(right > 1.0, "right wheel torque was {}", right);
}

#[test]
fn test_update_is_deterministic_across_fresh_sessions() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let initial = RobotCycleState::new_synthetic_rest_state(&layout);
    let perturbed = RobotCycleState::new_synthetic_perturbed_state(&layout, 0.05);
    let target = Vector3::new(0.0, -0.3, 0.9);

    let mut a = WholeBodyController::new(untimed_config(), layout.clone(), &initial).expect("construction failed");
    let mut b = WholeBodyController::new(untimed_config(), layout.clone(), &initial).expect("construction failed");

    let out_a = a.update(&perturbed, &target).expect("update errored");
    let out_b = b.update(&perturbed.clone(), &target).expect("update errored");

    let diff: DVector<f64> = out_a.command.torques() - out_b.command.torques();
    assert!(diff.norm() < 1e-12);
    assert_eq!(out_a.telemetry.outcome, out_b.telemetry.outcome);
}

#[test]
fn test_equality_residual_stays_within_tolerance() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let initial = RobotCycleState::new_synthetic_rest_state(&layout);
    let perturbed = RobotCycleState::new_synthetic_perturbed_state(&layout, 0.05);

    let config = untimed_config();
    let residual_tolerance = config.equality_residual_tolerance;
    let mut controller = WholeBodyController::new(config, layout.clone(), &initial).expect("construction failed");

    let output = controller.update(&perturbed, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");
    assert_ne!(output.telemetry.outcome, CycleOutcome::HeldPreviousCommand);
    assert_ne!(output.telemetry.outcome, CycleOutcome::Degraded);
    assert!(output.telemetry.equality_residual_norm <= residual_tolerance);
}

#[test]
fn test_telemetry_reports_every_task_in_stack_order() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let state = RobotCycleState::new_synthetic_rest_state(&layout);

    let mut controller = WholeBodyController::new(untimed_config(), layout.clone(), &state).expect("construction failed");
    let output = controller.update(&state, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");

    let kinds: Vec<TaskKind> = output.telemetry.task_squared_residuals.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, TaskKind::stack_order());
    assert!(output.telemetry.task_squared_residual(TaskKind::Balance).is_some());
}

#[test]
fn test_reset_clears_the_session() {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let state = RobotCycleState::new_synthetic_rest_state(&layout);

    let mut controller = WholeBodyController::new(untimed_config(), layout.clone(), &state).expect("construction failed");
    controller.update(&state, &Vector3::new(0.0, -0.3, 0.9)).expect("update errored");
    assert_eq!(controller.step(), 1);

    controller.reset();
    assert_eq!(controller.step(), 0);
    assert_eq!(controller.q_reference(), &state.q);
}
