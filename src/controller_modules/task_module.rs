use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Serialize, Deserialize};
use crate::controller_modules::heading_frame_module::HeadingFrame;
use crate::robot_modules::coordinate_layout_module::GeneralizedCoordinateLayout;
use crate::robot_modules::robot_state_module::{FrameKinematics, RobotCycleState};

/// Identifies one control objective in the weighted least-squares stack.  The stack order
/// is fixed; it only affects which rows of the stacked objective belong to which task,
/// since every block is an independent residual.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    LimbRight,
    LimbLeft,
    Balance,
    Posture,
    SpeedRegulation,
    GenericRegulation
}
impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::LimbRight => { "limb_right" }
            TaskKind::LimbLeft => { "limb_left" }
            TaskKind::Balance => { "balance" }
            TaskKind::Posture => { "posture" }
            TaskKind::SpeedRegulation => { "speed_regulation" }
            TaskKind::GenericRegulation => { "generic_regulation" }
        }
    }
    /// All tasks in their fixed stacking order.
    pub fn stack_order() -> Vec<TaskKind> {
        vec![TaskKind::LimbRight, TaskKind::LimbLeft, TaskKind::Balance, TaskKind::Posture, TaskKind::SpeedRegulation, TaskKind::GenericRegulation]
    }
}

/// Proportional-derivative gains for the task-space reference accelerations
/// `ddx_ref = -Kp * (x - x_ref) - Kv * dx`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskGains {
    pub limb_kp: f64,
    pub limb_kv: f64,
    pub balance_kp: f64,
    pub balance_kv: f64,
    pub posture_kp: f64,
    pub posture_kv: f64,
    pub speed_regulation_kv: f64
}
impl Default for TaskGains {
    fn default() -> Self {
        Self {
            limb_kp: 750.0,
            limb_kv: 250.0,
            balance_kp: 750.0,
            balance_kv: 250.0,
            posture_kp: 10.0,
            posture_kv: 0.0,
            speed_regulation_kv: 0.01
        }
    }
}

/// Diagonal task weights.  The limb weights are kept low so that balance dominates when
/// the two objectives conflict.  Joint-space tasks are weighted per joint group.  A zero
/// weight keeps the task's rows in the stack as zeros; tasks are never omitted, since that
/// would change the fixed block layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskWeights {
    pub limb_right: f64,
    pub limb_left: f64,
    pub balance_fore_aft: f64,
    pub balance_vertical: f64,
    pub posture_base_pitch: f64,
    pub posture_waist_torso: f64,
    pub posture_upper_body: f64,
    pub speed_regulation_base_pitch: f64,
    pub speed_regulation_waist_torso: f64,
    pub speed_regulation_upper_body: f64,
    pub generic_regulation: f64
}
impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            limb_right: 0.01,
            limb_left: 0.01,
            balance_fore_aft: 1.0,
            balance_vertical: 1.0,
            posture_base_pitch: 0.0,
            posture_waist_torso: 0.0,
            posture_upper_body: 0.0,
            speed_regulation_base_pitch: 0.0,
            speed_regulation_waist_torso: 0.0,
            speed_regulation_upper_body: 0.0,
            generic_regulation: 0.0
        }
    }
}

/// One weighted least-squares block of the stacked objective: `P` is
/// (task_dim x n_vars) with zeros in the constraint-multiplier columns, and the block
/// contributes the residual `P * x - b`.
#[derive(Clone, Debug)]
pub struct TaskBlock {
    kind: TaskKind,
    p: DMatrix<f64>,
    b: DVector<f64>
}
impl TaskBlock {
    fn new(kind: TaskKind, p: DMatrix<f64>, b: DVector<f64>) -> Self {
        assert_eq!(p.nrows(), b.len());
        Self { kind, p, b }
    }
    pub fn kind(&self) -> TaskKind {
        self.kind
    }
    pub fn p(&self) -> &DMatrix<f64> {
        &self.p
    }
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }
    pub fn num_rows(&self) -> usize {
        self.p.nrows()
    }
    /// Squared residual of this block at the given solution, used for telemetry.
    pub fn squared_residual(&self, x: &DVector<f64>) -> f64 {
        (&self.p * x - &self.b).norm_squared()
    }
}

/// All task blocks of one control cycle in their fixed stacking order.
#[derive(Clone, Debug)]
pub struct TaskStack {
    blocks: Vec<TaskBlock>,
    num_problem_variables: usize
}
impl TaskStack {
    pub fn blocks(&self) -> &Vec<TaskBlock> {
        &self.blocks
    }
    pub fn num_problem_variables(&self) -> usize {
        self.num_problem_variables
    }
    pub fn total_rows(&self) -> usize {
        self.blocks.iter().map(|b| b.num_rows()).sum()
    }
    /// Stacks all blocks into one `P` matrix and `b` vector for the solver.
    pub fn stacked(&self) -> (DMatrix<f64>, DVector<f64>) {
        let total_rows = self.total_rows();
        let mut p = DMatrix::zeros(total_rows, self.num_problem_variables);
        let mut b = DVector::zeros(total_rows);

        let mut row = 0;
        for block in &self.blocks {
            p.slice_mut((row, 0), (block.num_rows(), self.num_problem_variables)).copy_from(block.p());
            b.rows_mut(row, block.num_rows()).copy_from(block.b());
            row += block.num_rows();
        }

        return (p, b);
    }
}

/// Builds the full task stack for one cycle.  Borrows the cycle state, the heading frame,
/// and the filtered velocities; owns nothing and persists nothing.
pub struct TaskBuilder<'a> {
    layout: &'a GeneralizedCoordinateLayout,
    gains: &'a TaskGains,
    weights: &'a TaskWeights,
    state: &'a RobotCycleState,
    frame: &'a HeadingFrame,
    dq_filtered: &'a DVector<f64>
}
impl<'a> TaskBuilder<'a> {
    pub fn new(layout: &'a GeneralizedCoordinateLayout,
               gains: &'a TaskGains,
               weights: &'a TaskWeights,
               state: &'a RobotCycleState,
               frame: &'a HeadingFrame,
               dq_filtered: &'a DVector<f64>) -> Self {
        Self { layout, gains, weights, state, frame, dq_filtered }
    }
    /// Builds all six task blocks in their fixed stacking order.  The same target position
    /// is applied to both limbs.
    pub fn build_stack(&self, target_position: &Vector3<f64>, q_reference: &DVector<f64>, com_height_reference: f64) -> TaskStack {
        let blocks = vec![
            self.limb_tracking_task(TaskKind::LimbRight, &self.state.right_end_effector, self.weights.limb_right, target_position),
            self.limb_tracking_task(TaskKind::LimbLeft, &self.state.left_end_effector, self.weights.limb_left, target_position),
            self.balance_task(com_height_reference),
            self.posture_task(q_reference),
            self.speed_regulation_task(),
            self.generic_regulation_task()
        ];

        TaskStack {
            blocks,
            num_problem_variables: self.layout.num_problem_variables()
        }
    }
    fn limb_tracking_task(&self, kind: TaskKind, frame_kinematics: &FrameKinematics, weight: f64, target_position: &Vector3<f64>) -> TaskBlock {
        let n = self.layout.num_coordinates();
        let n_vars = self.layout.num_problem_variables();

        let x = self.frame.point_to_heading(&frame_kinematics.position);
        let dx = self.frame.velocity_to_heading(&frame_kinematics.linear_velocity);
        let ddx_ref = -self.gains.limb_kp * (x - target_position) - self.gains.limb_kv * dx;

        let j = self.frame.jacobian_to_heading(&frame_kinematics.linear_jacobian);
        let dj = self.frame.jacobian_derivative_to_heading(&frame_kinematics.linear_jacobian, &frame_kinematics.linear_jacobian_derivative);

        let mut p = DMatrix::zeros(3, n_vars);
        p.slice_mut((0, 0), (3, n)).copy_from(&(weight * &j));

        let dj_dq = &dj * self.dq_filtered;
        let mut b = DVector::zeros(3);
        for i in 0..3 { b[i] = weight * (ddx_ref[i] - dj_dq[i]); }

        TaskBlock::new(kind, p, b)
    }
    /// Balance acts on the wheel-excluded body center of mass; the wheels themselves are
    /// governed by the rolling constraint.  Only the fore-aft and vertical axes are
    /// controlled; the lateral row stays in the stack as zeros.
    fn balance_task(&self, com_height_reference: f64) -> TaskBlock {
        let n = self.layout.num_coordinates();
        let n_vars = self.layout.num_problem_variables();

        let x = self.frame.point_to_heading(&self.state.body_com_position());
        let dx = self.frame.velocity_to_heading(&self.state.body_com_linear_velocity());

        let ddx_fore_aft = -self.gains.balance_kp * x[0] - self.gains.balance_kv * dx[0];
        let ddx_vertical = -self.gains.balance_kp * (x[2] - com_height_reference) - self.gains.balance_kv * dx[2];
        let ddx_ref = Vector3::new(ddx_fore_aft, 0.0, ddx_vertical);

        // The wheel columns are removed along with the wheel masses; all base columns
        // except the pitch axis are removed as well, since the base cannot accelerate the
        // center of mass through them without violating the rolling constraint.
        let mut j_body = self.state.center_of_mass.linear_jacobian.clone();
        let mut dj_body = self.state.center_of_mass.linear_jacobian_derivative.clone();
        let pitch = self.layout.base_pitch_coordinate();
        for c in self.layout.base_coordinates().chain(self.layout.wheel_coordinates()) {
            if c == pitch { continue; }
            for r in 0..3 {
                j_body[(r, c)] = 0.0;
                dj_body[(r, c)] = 0.0;
            }
        }

        let mass_ratio = self.state.body_com_mass_ratio();
        let j = mass_ratio * self.frame.jacobian_to_heading(&j_body);
        let dj = mass_ratio * self.frame.jacobian_derivative_to_heading(&j_body, &dj_body);

        let row_weights = [self.weights.balance_fore_aft, 0.0, self.weights.balance_vertical];

        let mut p = DMatrix::zeros(3, n_vars);
        for r in 0..3 {
            for c in 0..n { p[(r, c)] = row_weights[r] * j[(r, c)]; }
        }

        let dj_dq = &dj * self.dq_filtered;
        let mut b = DVector::zeros(3);
        for r in 0..3 { b[r] = row_weights[r] * (ddx_ref[r] - dj_dq[r]); }

        TaskBlock::new(TaskKind::Balance, p, b)
    }
    /// Position-only PD toward the configuration recorded at controller construction.
    fn posture_task(&self, q_reference: &DVector<f64>) -> TaskBlock {
        let w = self.joint_group_weights(self.weights.posture_base_pitch, self.weights.posture_waist_torso, self.weights.posture_upper_body);
        let b_unweighted = -self.gains.posture_kp * (&self.state.q - q_reference) - self.gains.posture_kv * self.dq_filtered;
        return self.joint_space_task(TaskKind::Posture, &w, &b_unweighted);
    }
    /// Derivative-only penalty toward zero joint velocity.
    fn speed_regulation_task(&self) -> TaskBlock {
        let w = self.joint_group_weights(self.weights.speed_regulation_base_pitch, self.weights.speed_regulation_waist_torso, self.weights.speed_regulation_upper_body);
        let b_unweighted = -self.gains.speed_regulation_kv * self.dq_filtered;
        return self.joint_space_task(TaskKind::SpeedRegulation, &w, &b_unweighted);
    }
    /// Identity-weighted fallback over the full acceleration vector, typically disabled.
    fn generic_regulation_task(&self) -> TaskBlock {
        let n = self.layout.num_coordinates();
        let mut w = DVector::zeros(self.layout.num_problem_variables());
        for c in 0..n { w[c] = self.weights.generic_regulation; }

        let n_vars = self.layout.num_problem_variables();
        let mut p = DMatrix::zeros(n_vars, n_vars);
        for i in 0..n_vars { p[(i, i)] = w[i]; }

        TaskBlock::new(TaskKind::GenericRegulation, p, DVector::zeros(n_vars))
    }
    /// A joint-space task over the full variable vector: `P = diag(w)`, `b = diag(w) *
    /// b_unweighted` with zeros in the multiplier rows.
    fn joint_space_task(&self, kind: TaskKind, w: &DVector<f64>, b_unweighted: &DVector<f64>) -> TaskBlock {
        let n = self.layout.num_coordinates();
        let n_vars = self.layout.num_problem_variables();

        let mut p = DMatrix::zeros(n_vars, n_vars);
        for i in 0..n_vars { p[(i, i)] = w[i]; }

        let mut b = DVector::zeros(n_vars);
        for i in 0..n { b[i] = w[i] * b_unweighted[i]; }

        TaskBlock::new(kind, p, b)
    }
    /// Diagonal weights over the problem variables for one joint-space task: one weight for
    /// the base pitch axis, one for waist + torso, one for the upper body.  Wheels, the
    /// remaining base coordinates, and the multiplier columns are always zero.
    fn joint_group_weights(&self, base_pitch_weight: f64, waist_torso_weight: f64, upper_body_weight: f64) -> DVector<f64> {
        let mut w = DVector::zeros(self.layout.num_problem_variables());
        w[self.layout.base_pitch_coordinate()] = base_pitch_weight;
        w[self.layout.waist_coordinate()] = waist_torso_weight;
        w[self.layout.torso_coordinate()] = waist_torso_weight;
        for c in self.layout.upper_body_coordinates() { w[c] = upper_body_weight; }
        return w;
    }
}
