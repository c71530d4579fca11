use std::time::Duration;
use nalgebra::{DMatrix, DVector};
use optimization_engine::{constraints, SolverError};
use optimization_engine::alm::{AlmCache, AlmFactory, AlmOptimizer, AlmProblem, NO_JACOBIAN_MAPPING, NO_MAPPING};
use optimization_engine::core::ExitStatus;
use optimization_engine::panoc::PANOCCache;
use crate::utils::utils_errors::WholeBodyError;
#[cfg(feature = "nlopt_optimization")]
use nlopt::*;

/// The stacked task objective `0.5 * ||P * x - b||^2` with its analytic gradient
/// `P^T * (P * x - b)`.
#[derive(Clone, Debug)]
pub struct QuadraticObjective {
    p: DMatrix<f64>,
    b: DVector<f64>
}
impl QuadraticObjective {
    pub fn new(p: DMatrix<f64>, b: DVector<f64>) -> Self {
        assert_eq!(p.nrows(), b.len());
        Self { p, b }
    }
    pub fn num_variables(&self) -> usize {
        self.p.ncols()
    }
    pub fn cost(&self, x: &[f64]) -> f64 {
        let x = DVector::from_column_slice(x);
        return 0.5 * (&self.p * &x - &self.b).norm_squared();
    }
    pub fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let x = DVector::from_column_slice(x);
        let g = self.p.transpose() * (&self.p * &x - &self.b);
        for (i, v) in g.iter().enumerate() { grad[i] = *v; }
    }
}

/// Solves `min_x 0.5 * ||P * x - b||^2  s.t.  A * x = b_eq` with a gradient-based local
/// constrained optimizer, warm-started from the caller-supplied initial iterate.
#[derive(Clone, Debug)]
pub enum EqualityConstrainedSolver {
    OpEn(OpEnEqualityConstrainedSolver),
    #[cfg(feature = "nlopt_optimization")]
    Nlopt(NLoptEqualityConstrainedSolver)
}
impl EqualityConstrainedSolver {
    pub fn new(problem_size: usize, t: EqualityConstrainedSolverType) -> Self {
        return match t {
            EqualityConstrainedSolverType::OpEn => { Self::OpEn(OpEnEqualityConstrainedSolver::new(problem_size)) }
            #[cfg(feature = "nlopt_optimization")]
            EqualityConstrainedSolverType::NloptSLSQP => { Self::Nlopt(NLoptEqualityConstrainedSolver::new(problem_size)) }
        }
    }
    pub fn solve(&self, objective: &QuadraticObjective, constraint_a: &DMatrix<f64>, constraint_b: &DVector<f64>, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, WholeBodyError> {
        return match self {
            EqualityConstrainedSolver::OpEn(s) => { s.solve(objective, constraint_a, constraint_b, init_condition, parameters) }
            #[cfg(feature = "nlopt_optimization")]
            EqualityConstrainedSolver::Nlopt(s) => { s.solve(objective, constraint_a, constraint_b, init_condition, parameters) }
        }
    }
}

#[derive(Clone, Debug)]
pub enum EqualityConstrainedSolverType {
    OpEn,
    #[cfg(feature = "nlopt_optimization")]
    NloptSLSQP
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// ALM/PANOC backend.  The equality constraint enters as the mapping `F1(x) = A*x - b_eq`
/// into the zero set, with the constant constraint Jacobian supplied analytically.
#[derive(Clone, Debug)]
pub struct OpEnEqualityConstrainedSolver {
    problem_size: usize
}
impl OpEnEqualityConstrainedSolver {
    pub fn new(problem_size: usize) -> Self {
        Self { problem_size }
    }
    pub fn solve(&self, objective: &QuadraticObjective, constraint_a: &DMatrix<f64>, constraint_b: &DVector<f64>, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, WholeBodyError> {
        assert_eq!(objective.num_variables(), self.problem_size);
        assert_eq!(constraint_a.ncols(), self.problem_size);
        assert_eq!(init_condition.len(), self.problem_size);

        let n1 = constraint_a.nrows();
        let panoc_cache = PANOCCache::new(self.problem_size, parameters.epsilon_tolerance, 3);
        let mut alm_cache = AlmCache::new(panoc_cache, n1, 0);

        let f = |u: &[f64], cost: &mut f64| -> Result<(), SolverError> {
            *cost = objective.cost(u);
            Ok(())
        };
        let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            objective.gradient(u, grad);
            Ok(())
        };
        let f1 = |u: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
            for i in 0..n1 {
                let mut sum = -constraint_b[i];
                for (j, uj) in u.iter().enumerate() { sum += constraint_a[(i, j)] * uj; }
                res[i] = sum;
            }
            Ok(())
        };
        let jf1_trans_product = |_u: &[f64], d: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
            for (j, rj) in res.iter_mut().enumerate() {
                let mut sum = 0.0;
                for i in 0..n1 { sum += constraint_a[(i, j)] * d[i]; }
                *rj = sum;
            }
            Ok(())
        };

        let bounds = constraints::NoConstraints::new();
        let set_y = constraints::Ball2::new(None, 1e12);

        let factory = AlmFactory::new(
            f,
            df,
            Some(f1),
            Some(jf1_trans_product),
            NO_MAPPING,
            NO_JACOBIAN_MAPPING,
            Some(constraints::Zero::new()),
            0,
        );

        let alm_problem = AlmProblem::new(
            bounds,
            Some(constraints::Zero::new()),
            Some(set_y),
            |u: &[f64], xi: &[f64], cost: &mut f64| -> Result<(), SolverError> {
                factory.psi(u, xi, cost)
            },
            |u: &[f64], xi: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
                factory.d_psi(u, xi, grad)
            },
            Some(f1),
            NO_MAPPING,
            n1,
            0
        );

        let mut alm_optimizer = AlmOptimizer::new(&mut alm_cache, alm_problem)
            .with_delta_tolerance(parameters.delta_tolerance)
            .with_epsilon_tolerance(parameters.epsilon_tolerance);
        if let Some(a) = &parameters.max_time { alm_optimizer = alm_optimizer.with_max_duration(a.clone()); }
        if let Some(a) = &parameters.max_inner_iterations { alm_optimizer = alm_optimizer.with_max_inner_iterations(a.clone()); }
        if let Some(a) = &parameters.max_outer_iterations { alm_optimizer = alm_optimizer.with_max_outer_iterations(a.clone()); }

        let mut u = init_condition.as_slice().to_vec();
        let solver_result = alm_optimizer.solve(&mut u);

        return match solver_result {
            Ok(r) => {
                let open_result = OpEnResult {
                    x_min: DVector::from_vec(u),
                    exit_status: r.exit_status(),
                    num_outer_iterations: r.num_outer_iterations(),
                    num_inner_iterations: r.num_inner_iterations(),
                    solve_time: r.solve_time(),
                    cost: r.cost()
                };
                Ok(OptimizerResult::OpEn(open_result))
            }
            Err(e) => {
                Err(WholeBodyError::new_solver_error_str(&format!("{:?}", e), file!(), line!()))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// SLSQP backend via nlopt, with the equality block registered row by row.
#[cfg(feature = "nlopt_optimization")]
#[derive(Clone, Debug)]
pub struct NLoptEqualityConstrainedSolver {
    problem_size: usize
}
#[cfg(feature = "nlopt_optimization")]
impl NLoptEqualityConstrainedSolver {
    pub fn new(problem_size: usize) -> Self {
        Self { problem_size }
    }
    pub fn solve(&self, objective: &QuadraticObjective, constraint_a: &DMatrix<f64>, constraint_b: &DVector<f64>, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, WholeBodyError> {
        let start = instant::Instant::now();

        let obj_f = |x: &[f64], gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
            if let Some(gradient) = gradient {
                objective.gradient(x, gradient);
            }
            return objective.cost(x);
        };
        let mut nlopt = Nlopt::new(Algorithm::Slsqp, self.problem_size, obj_f, Target::Minimize, ());

        for i in 0..constraint_a.nrows() {
            let row: Vec<f64> = (0..constraint_a.ncols()).map(|j| constraint_a[(i, j)]).collect();
            let rhs = constraint_b[i];
            let eq_con = move |x: &[f64], gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                if let Some(gradient) = gradient {
                    for (j, g) in gradient.iter_mut().enumerate() { *g = row[j]; }
                }
                let mut val = -rhs;
                for (j, xj) in x.iter().enumerate() { val += row[j] * xj; }
                return val;
            };
            nlopt.add_equality_constraint(eq_con, (), parameters.delta_tolerance).map_err(|e| WholeBodyError::new_solver_error_str(&format!("{:?}", e), file!(), line!()))?;
        }

        if let Some(a) = &parameters.max_time { nlopt.set_maxtime(a.as_secs_f64()).map_err(|e| WholeBodyError::new_solver_error_str(&format!("{:?}", e), file!(), line!()))?; }
        if let Some(a) = &parameters.max_inner_iterations { nlopt.set_maxeval(*a as u32).map_err(|e| WholeBodyError::new_solver_error_str(&format!("{:?}", e), file!(), line!()))?; }
        nlopt.set_xtol_rel(parameters.delta_tolerance).map_err(|e| WholeBodyError::new_solver_error_str(&format!("{:?}", e), file!(), line!()))?;

        let mut x = init_condition.as_slice().to_vec();
        let res = nlopt.optimize(&mut x);
        return match res {
            Ok(r) => {
                let output = NloptResult {
                    x_min: DVector::from_vec(x),
                    solve_time: start.elapsed(),
                    cost: r.1
                };
                Ok(OptimizerResult::Nlopt(output))
            }
            Err(e) => {
                Err(WholeBodyError::new_solver_error_str(&format!("{:?}", e), file!(), line!()))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug)]
pub enum OptimizerResult {
    OpEn(OpEnResult),
    #[cfg(feature = "nlopt_optimization")]
    Nlopt(NloptResult)
}
impl OptimizerResult {
    pub fn x_min(&self) -> &DVector<f64> {
        return match self {
            OptimizerResult::OpEn(r) => { r.x_min() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(r) => { r.x_min() }
        }
    }
    pub fn cost(&self) -> f64 {
        return match self {
            OptimizerResult::OpEn(r) => { r.cost() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(r) => { r.cost() }
        }
    }
    pub fn solve_time(&self) -> Duration {
        return match self {
            OptimizerResult::OpEn(r) => { r.solve_time() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(r) => { r.solve_time() }
        }
    }
    /// Whether the backend reached its tolerances.  A `false` here is not an error; the
    /// best-effort iterate is still used.
    pub fn converged(&self) -> bool {
        return match self {
            OptimizerResult::OpEn(r) => { r.exit_status() == ExitStatus::Converged }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(_) => { true }
        }
    }
    pub fn num_inner_iterations(&self) -> usize {
        return match self {
            OptimizerResult::OpEn(r) => { r.num_inner_iterations() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(_) => { 0 }
        }
    }
    pub fn num_outer_iterations(&self) -> usize {
        return match self {
            OptimizerResult::OpEn(r) => { r.num_outer_iterations() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(_) => { 0 }
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpEnResult {
    x_min: DVector<f64>,
    exit_status: ExitStatus,
    num_outer_iterations: usize,
    num_inner_iterations: usize,
    solve_time: Duration,
    cost: f64
}
impl OpEnResult {
    pub fn x_min(&self) -> &DVector<f64> {
        &self.x_min
    }
    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }
    pub fn num_outer_iterations(&self) -> usize {
        self.num_outer_iterations
    }
    pub fn num_inner_iterations(&self) -> usize {
        self.num_inner_iterations
    }
    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

#[cfg(feature = "nlopt_optimization")]
#[derive(Clone, Debug)]
pub struct NloptResult {
    x_min: DVector<f64>,
    solve_time: Duration,
    cost: f64
}
#[cfg(feature = "nlopt_optimization")]
impl NloptResult {
    pub fn x_min(&self) -> &DVector<f64> {
        &self.x_min
    }
    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

#[derive(Clone, Debug)]
pub struct OptimizerParameters {
    max_time: Option<Duration>,
    max_inner_iterations: Option<usize>,
    max_outer_iterations: Option<usize>,
    epsilon_tolerance: f64,
    delta_tolerance: f64
}
impl OptimizerParameters {
    pub fn new_empty() -> Self {
        Self::default()
    }
    pub fn set_max_time(&mut self, max_time: Duration) {
        self.max_time = Some(max_time);
    }
    pub fn clear_max_time(&mut self) {
        self.max_time = None;
    }
    pub fn set_max_inner_iterations(&mut self, max_inner_iterations: usize) {
        self.max_inner_iterations = Some(max_inner_iterations);
    }
    pub fn set_max_outer_iterations(&mut self, max_outer_iterations: usize) {
        self.max_outer_iterations = Some(max_outer_iterations)
    }
    pub fn set_epsilon_tolerance(&mut self, epsilon_tolerance: f64) {
        self.epsilon_tolerance = epsilon_tolerance;
    }
    pub fn set_delta_tolerance(&mut self, delta_tolerance: f64) {
        self.delta_tolerance = delta_tolerance;
    }
    pub fn max_time(&self) -> &Option<Duration> {
        &self.max_time
    }
    pub fn delta_tolerance(&self) -> f64 {
        self.delta_tolerance
    }
    pub fn epsilon_tolerance(&self) -> f64 {
        self.epsilon_tolerance
    }
}
impl Default for OptimizerParameters {
    fn default() -> Self {
        Self {
            max_time: None,
            max_inner_iterations: None,
            max_outer_iterations: None,
            epsilon_tolerance: 1e-5,
            delta_tolerance: 1e-3
        }
    }
}
