use nalgebra::Vector3;
use wholebody::controller_modules::whole_body_controller_module::{WholeBodyController, WholeBodyControllerConfig};
use wholebody::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use wholebody::robot_modules::robot_state_module::RobotCycleState;
use wholebody::utils::utils_console::{wholebody_print, PrintColor, PrintMode};
use wholebody::utils::utils_errors::WholeBodyError;
use wholebody::utils::utils_sampling::SimpleSamplers;

/// Runs the controller in a closed loop over a synthetic robot state with sensor-like
/// noise on the velocities, printing per-cycle telemetry.
fn main() -> Result<(), WholeBodyError> {
    let layout = GeneralizedCoordinateLayout::new_reference_layout();
    let config = WholeBodyControllerConfig::default();

    let initial_state = RobotCycleState::new_synthetic_rest_state(&layout);
    let mut controller = WholeBodyController::new(config, layout.clone(), &initial_state)?;

    let config_json = controller.config().to_json_string()?;
    wholebody_print("controller configuration:", PrintMode::Println, PrintColor::Blue, true);
    wholebody_print(&config_json, PrintMode::Println, PrintColor::None, false);

    // Heading-frame set point a little above and between the resting hand positions.
    let target_position = Vector3::new(0.0, -0.3, 0.95);
    let mut state = initial_state.clone();

    for _ in 0..50 {
        let noise = SimpleSamplers::normal_samples(&vec![(0.0, 0.005); layout.num_coordinates()]);
        for (i, v) in noise.iter().enumerate() { state.dq[i] = *v; }

        let output = controller.update(&state, &target_position)?;
        output.telemetry.print_summary();
        if controller.step() % 10 == 0 {
            output.telemetry.print_task_residuals();
        }
    }

    Ok(())
}
