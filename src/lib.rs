//! Whole-body torque control for a wheeled, floating-base humanoid.
//!
//! Each control cycle takes the robot's current dynamics quantities (mass matrix, bias
//! forces, task Jacobians), builds a weighted stack of operational-space tracking tasks in
//! a heading-aligned frame, solves a small equality-constrained least-squares problem over
//! generalized accelerations and rolling-constraint multipliers, and back-substitutes the
//! solution into the actuated rows of the dynamics to produce joint torques.
//!
//! The main entry point is
//! [`WholeBodyController`](controller_modules::whole_body_controller_module::WholeBodyController);
//! see the `wholebody_demo` binary for a full closed loop over a synthetic robot state.

pub mod controller_modules;
pub mod nonlinear_optimization;
pub mod robot_modules;
pub mod utils;
