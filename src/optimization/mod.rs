//! Nonlinear programming layer
//!
//! Problems are described through [`NlpProblem`]: an objective and a vector of
//! constraint functions, both written once over a generic scalar so that the
//! solver can evaluate them on dual numbers for exact derivatives. Solvers
//! implement [`NlpSolver`].
//!
//! # Components
//!
//! - `autodiff`: gradients, Jacobians and Hessians through `num_dual`
//! - `qp`: convex QP subproblems handed to Clarabel
//! - `sqp`: sequential quadratic programming driver

pub mod autodiff;
pub mod qp;
pub mod sqp;

use num_dual::DualNum;
use thiserror::Error;

use crate::common::error::MpcError;

pub use sqp::{SqpConfig, SqpSolver};

/// Bounds at or beyond this magnitude are treated as infinite
pub const INFINITE_BOUND: f64 = 1.0e19;

/// Whether `bound` constrains anything
pub fn is_finite_bound(bound: f64) -> bool {
    bound.is_finite() && bound.abs() < INFINITE_BOUND
}

/// Smooth nonlinear program `min f(x)  s.t.  g_l <= g(x) <= g_u,  x_l <= x <= x_u`
pub trait NlpProblem {
    /// Length of the decision vector
    fn num_variables(&self) -> usize;

    /// Number of constraint functions
    fn num_constraints(&self) -> usize;

    /// Objective value
    fn objective<D: DualNum<f64> + Copy>(&self, vars: &[D]) -> D;

    /// Constraint function values, written into `out` (length `num_constraints`)
    fn constraints<D: DualNum<f64> + Copy>(&self, vars: &[D], out: &mut [D]);

    /// Structural nonzeros of the constraint Jacobian, if known
    fn jacobian_sparsity(&self) -> Option<SparsityPattern> {
        None
    }

    /// Structural nonzeros of the objective Hessian, if known
    fn hessian_sparsity(&self) -> Option<SparsityPattern> {
        None
    }
}

/// Trait for nonlinear programming solvers
pub trait NlpSolver {
    fn solve<P: NlpProblem>(
        &self,
        problem: &P,
        bounds: &NlpBounds,
        initial: &[f64],
    ) -> Result<NlpSolution, FailedSolve>;
}

/// Set of `(row, col)` positions that may be nonzero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPattern {
    nrows: usize,
    ncols: usize,
    entries: Vec<(usize, usize)>,
}

impl SparsityPattern {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self { nrows, ncols, entries: Vec::new() }
    }

    /// Mark `(row, col)` as a structural nonzero. Duplicates are merged by
    /// [`SparsityPattern::finish`].
    pub fn insert(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.nrows && col < self.ncols);
        self.entries.push((row, col));
    }

    /// Sort entries row-major and drop duplicates
    pub fn finish(mut self) -> Self {
        self.entries.sort_unstable();
        self.entries.dedup();
        self
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn entries(&self) -> &[(usize, usize)] {
        &self.entries
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

/// Variable and constraint bounds of a [`NlpProblem`]
#[derive(Debug, Clone, PartialEq)]
pub struct NlpBounds {
    pub var_lower: Vec<f64>,
    pub var_upper: Vec<f64>,
    pub con_lower: Vec<f64>,
    pub con_upper: Vec<f64>,
}

impl NlpBounds {
    /// Check lengths against the problem dimensions and that `lower <= upper`
    pub fn check(&self, num_variables: usize, num_constraints: usize) -> Result<(), String> {
        if self.var_lower.len() != num_variables || self.var_upper.len() != num_variables {
            return Err(format!(
                "variable bounds have lengths {}/{}, expected {}",
                self.var_lower.len(),
                self.var_upper.len(),
                num_variables
            ));
        }
        if self.con_lower.len() != num_constraints || self.con_upper.len() != num_constraints {
            return Err(format!(
                "constraint bounds have lengths {}/{}, expected {}",
                self.con_lower.len(),
                self.con_upper.len(),
                num_constraints
            ));
        }

        let var_pairs = self.var_lower.iter().zip(&self.var_upper);
        let con_pairs = self.con_lower.iter().zip(&self.con_upper);
        for (i, (lo, hi)) in var_pairs.chain(con_pairs).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(format!("bound pair {} is inconsistent: [{}, {}]", i, lo, hi));
            }
        }

        Ok(())
    }

    /// Sum of constraint bound violations (l1 norm)
    pub fn constraint_violation(&self, values: &[f64]) -> f64 {
        values
            .iter()
            .zip(self.con_lower.iter().zip(&self.con_upper))
            .map(|(&c, (&lo, &hi))| {
                let below = if is_finite_bound(lo) { (lo - c).max(0.0) } else { 0.0 };
                let above = if is_finite_bound(hi) { (c - hi).max(0.0) } else { 0.0 };
                below + above
            })
            .sum()
    }
}

/// Locally optimal point returned by a solver
#[derive(Debug, Clone, PartialEq)]
pub struct NlpSolution {
    /// Decision vector
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub objective: f64,
    /// Constraint violation at `x` (l1 norm)
    pub constraint_violation: f64,
    /// Number of major iterations taken
    pub iterations: usize,
}

/// Why a solve did not reach an optimal point
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveFailure {
    #[error("iteration limit reached")]
    MaxIterations,

    #[error("time limit reached")]
    TimeLimit,

    #[error("QP subproblem failed: {0}")]
    QpFailure(String),

    #[error("line search could not reduce the merit function")]
    LineSearch,

    #[error("objective or constraints evaluated to a non-finite value")]
    NonFiniteEvaluation,

    #[error("invalid problem: {0}")]
    InvalidProblem(String),
}

/// Failure outcome together with the last iterate's statistics
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSolve {
    pub status: SolveFailure,
    /// Objective at the last evaluated iterate, NaN if none was evaluated
    pub objective: f64,
    pub iterations: usize,
}

impl FailedSolve {
    pub fn new(status: SolveFailure, objective: f64, iterations: usize) -> Self {
        Self { status, objective, iterations }
    }
}

impl From<FailedSolve> for MpcError {
    fn from(failed: FailedSolve) -> Self {
        MpcError::SolveFailed {
            status: failed.status,
            objective: failed.objective,
            iterations: failed.iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> NlpBounds {
        NlpBounds {
            var_lower: vec![-1.0, -INFINITE_BOUND],
            var_upper: vec![1.0, INFINITE_BOUND],
            con_lower: vec![0.0, -INFINITE_BOUND],
            con_upper: vec![0.0, 2.0],
        }
    }

    #[test]
    fn test_finite_bound() {
        assert!(is_finite_bound(0.436332));
        assert!(!is_finite_bound(INFINITE_BOUND));
        assert!(!is_finite_bound(-INFINITE_BOUND));
        assert!(!is_finite_bound(f64::INFINITY));
    }

    #[test]
    fn test_bounds_check() {
        assert!(bounds().check(2, 2).is_ok());
        assert!(bounds().check(3, 2).is_err());

        let mut crossed = bounds();
        crossed.var_lower[0] = 2.0;
        assert!(crossed.check(2, 2).is_err());
    }

    #[test]
    fn test_constraint_violation() {
        let b = bounds();
        assert!((b.constraint_violation(&[0.0, 1.0])).abs() < 1e-12);
        assert!((b.constraint_violation(&[-0.5, 3.0]) - 1.5).abs() < 1e-12);
        // the infinite lower bound never counts
        assert!((b.constraint_violation(&[0.0, -1e30])).abs() < 1e-12);
    }

    #[test]
    fn test_sparsity_finish_dedups() {
        let mut p = SparsityPattern::new(2, 3);
        p.insert(1, 2);
        p.insert(0, 1);
        p.insert(1, 2);
        let p = p.finish();
        assert_eq!(p.entries(), &[(0, 1), (1, 2)]);
        assert_eq!(p.nnz(), 2);
    }
}
