use std::time::Duration;
use nalgebra::DVector;
use crate::controller_modules::task_module::{TaskKind, TaskStack};
use crate::utils::utils_console::{wholebody_print, PrintColor, PrintMode};

/// How a control cycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The optimizer reached its tolerances.
    Converged,
    /// The optimizer hit an iteration or deadline limit; the best iterate was used anyway.
    BestEffort,
    /// The solved accelerations violate the equality constraint beyond tolerance.
    Degraded,
    /// The cycle could not produce a usable solution; the previous command was re-issued.
    HeldPreviousCommand
}

/// Per-cycle diagnostics, recorded after the torque extraction so the residuals refer to
/// the solution that was actually commanded.
#[derive(Clone, Debug)]
pub struct ControlCycleTelemetry {
    pub step: usize,
    pub outcome: CycleOutcome,
    pub cost: f64,
    pub equality_residual_norm: f64,
    pub task_squared_residuals: Vec<(TaskKind, f64)>,
    pub num_inner_iterations: usize,
    pub num_outer_iterations: usize,
    pub solve_time: Duration,
    pub cycle_time: Duration,
    pub max_abs_torque: f64
}
impl ControlCycleTelemetry {
    pub fn new_held(step: usize) -> Self {
        Self {
            step,
            outcome: CycleOutcome::HeldPreviousCommand,
            cost: f64::NAN,
            equality_residual_norm: f64::NAN,
            task_squared_residuals: vec![],
            num_inner_iterations: 0,
            num_outer_iterations: 0,
            solve_time: Duration::from_secs(0),
            cycle_time: Duration::from_secs(0),
            max_abs_torque: 0.0
        }
    }
    pub fn record_task_residuals(&mut self, stack: &TaskStack, x: &DVector<f64>) {
        self.task_squared_residuals = stack.blocks().iter().map(|block| (block.kind(), block.squared_residual(x))).collect();
    }
    pub fn task_squared_residual(&self, kind: TaskKind) -> Option<f64> {
        for (k, r) in &self.task_squared_residuals {
            if *k == kind { return Some(*r); }
        }
        return None;
    }
    /// One-line console summary, colored by outcome.
    pub fn print_summary(&self) {
        let color = match self.outcome {
            CycleOutcome::Converged => PrintColor::Green,
            CycleOutcome::BestEffort => PrintColor::Yellow,
            CycleOutcome::Degraded => PrintColor::Magenta,
            CycleOutcome::HeldPreviousCommand => PrintColor::Red
        };
        let s = format!("step {} | {:?} | cost {:.6} | eq residual {:.2e} | {} inner / {} outer iters | solve {:?} | cycle {:?} | max |tau| {:.3}",
                        self.step, self.outcome, self.cost, self.equality_residual_norm,
                        self.num_inner_iterations, self.num_outer_iterations, self.solve_time, self.cycle_time, self.max_abs_torque);
        wholebody_print(&s, PrintMode::Println, color, false);
    }
    pub fn print_task_residuals(&self) {
        for (kind, residual) in &self.task_squared_residuals {
            let s = format!("    {}: squared residual {:.6e}", kind.name(), residual);
            wholebody_print(&s, PrintMode::Println, PrintColor::Cyan, false);
        }
    }
}
