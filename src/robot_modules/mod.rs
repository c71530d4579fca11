pub mod coordinate_layout_module;
pub mod robot_state_module;
