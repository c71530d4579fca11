pub mod constraint_module;
pub mod heading_frame_module;
pub mod task_module;
pub mod telemetry_module;
pub mod torque_module;
pub mod velocity_filter_module;
pub mod whole_body_controller_module;
