/// A common error type returned by functions throughout the crate.
#[derive(Clone, Debug)]
pub enum WholeBodyError {
    GenericError(String),
    DimensionMismatchError(String),
    NonFiniteValueError(String),
    DegenerateConstraintError(String),
    SolverError(String)
}
impl WholeBodyError {
    pub fn new_generic_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} -- File: {}, Line: {}", s.to_string(), file, line);
        return Self::GenericError(s);
    }
    pub fn new_dimension_mismatch_error(name: &str, expected: usize, given: usize, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} has wrong dimension.  Expected {:?}, given {:?} -- File: {}, Line: {}", name, expected, given, file, line);
        return Self::DimensionMismatchError(s);
    }
    pub fn new_non_finite_value_error(name: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} contains a non-finite value -- File: {}, Line: {}", name, file, line);
        return Self::NonFiniteValueError(s);
    }
    pub fn new_degenerate_constraint_error(rank: usize, expected_rank: usize, file: &str, line: u32) -> Self {
        let s = format!("ERROR: constraint jacobian is rank deficient (rank {:?}, expected {:?}) -- File: {}, Line: {}", rank, expected_rank, file, line);
        return Self::DegenerateConstraintError(s);
    }
    pub fn new_solver_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: solver failure: {} -- File: {}, Line: {}", s.to_string(), file, line);
        return Self::SolverError(s);
    }
}
