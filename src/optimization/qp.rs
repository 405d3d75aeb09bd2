//! Convex quadratic programs solved with Clarabel
//!
//! ```text
//! min  0.5 x'Px + q'x
//! s.t. A_eq x  = b_eq
//!      A_in x <= b_in
//! ```
//!
//! Rows of `constraints` hold the equalities first, then the inequalities,
//! which maps directly onto Clarabel's `Ax + s = b` with a zero cone followed
//! by a nonnegative cone.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};

use super::SolveFailure;

/// Dense QP in the form above
#[derive(Debug, Clone)]
pub struct QpProblem {
    /// Symmetric positive semidefinite cost matrix `P`
    pub hessian: DMatrix<f64>,
    /// Linear cost `q`
    pub gradient: DVector<f64>,
    /// Stacked `[A_eq; A_in]`
    pub constraints: DMatrix<f64>,
    /// Stacked `[b_eq; b_in]`
    pub rhs: DVector<f64>,
    /// Number of leading equality rows
    pub num_equalities: usize,
}

/// Solver settings for one QP solve
#[derive(Debug, Clone, Copy)]
pub struct QpSettings {
    pub max_iterations: u32,
    /// Wall-clock budget [s]
    pub time_limit: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            time_limit: f64::INFINITY,
        }
    }
}

/// Primal/dual solution of a [`QpProblem`]
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub x: DVector<f64>,
    /// One multiplier per constraint row, same order as `constraints`
    pub duals: DVector<f64>,
}

/// Solve `qp`, accepting Clarabel's solved and almost-solved outcomes
pub fn solve(qp: &QpProblem, settings: &QpSettings) -> Result<QpSolution, SolveFailure> {
    let num_rows = qp.constraints.nrows();
    if qp.num_equalities > num_rows || qp.rhs.len() != num_rows {
        return Err(SolveFailure::InvalidProblem(format!(
            "QP has {} constraint rows, {} right-hand sides and {} equalities",
            num_rows,
            qp.rhs.len(),
            qp.num_equalities
        )));
    }

    let p_csc = dmatrix_to_csc_upper_tri(&qp.hessian);
    let a_csc = dmatrix_to_csc(&qp.constraints);

    let num_inequalities = num_rows - qp.num_equalities;
    let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
    if qp.num_equalities > 0 {
        cones.push(ZeroConeT(qp.num_equalities));
    }
    if num_inequalities > 0 {
        cones.push(NonnegativeConeT(num_inequalities));
    }

    let settings = DefaultSettingsBuilder::default()
        .max_iter(settings.max_iterations)
        .time_limit(settings.time_limit)
        .verbose(false)
        .build()
        .map_err(|e| SolveFailure::QpFailure(format!("invalid settings: {}", e)))?;

    let q: Vec<f64> = qp.gradient.iter().copied().collect();
    let b: Vec<f64> = qp.rhs.iter().copied().collect();

    let mut solver = DefaultSolver::new(&p_csc, &q, &a_csc, &b, &cones, settings)
        .map_err(|e| SolveFailure::QpFailure(format!("setup: {:?}", e)))?;
    solver.solve();

    let sol = &solver.solution;
    match sol.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(QpSolution {
            x: DVector::from_column_slice(&sol.x),
            duals: DVector::from_column_slice(&sol.z),
        }),
        SolverStatus::MaxTime => Err(SolveFailure::TimeLimit),
        status => Err(SolveFailure::QpFailure(format!("{:?}", status))),
    }
}

/// Convert a nalgebra `DMatrix<f64>` to a Clarabel `CscMatrix<f64>` (full matrix).
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Convert a symmetric nalgebra `DMatrix<f64>` to upper-triangular `CscMatrix<f64>`.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csc_upper_tri_drops_lower() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let csc = dmatrix_to_csc_upper_tri(&m);
        assert_eq!(csc.colptr, vec![0, 1, 3]);
        assert_eq!(csc.rowval, vec![0, 0, 1]);
        assert_eq!(csc.nzval, vec![4.0, 1.0, 3.0]);
    }

    #[test]
    fn test_equality_constrained_qp() {
        // min x^2 + y^2  s.t.  x + y = 1
        let qp = QpProblem {
            hessian: DMatrix::from_diagonal_element(2, 2, 2.0),
            gradient: DVector::zeros(2),
            constraints: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            rhs: DVector::from_vec(vec![1.0]),
            num_equalities: 1,
        };
        let sol = solve(&qp, &QpSettings::default()).unwrap();
        assert!((sol.x[0] - 0.5).abs() < 1e-6);
        assert!((sol.x[1] - 0.5).abs() < 1e-6);
        // stationarity: 2x + z = 0 at x = 0.5
        assert!((sol.duals[0] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_bound_active_qp() {
        // min (x - 2)^2  s.t.  x <= 1
        let qp = QpProblem {
            hessian: DMatrix::from_diagonal_element(1, 1, 2.0),
            gradient: DVector::from_vec(vec![-4.0]),
            constraints: DMatrix::from_row_slice(1, 1, &[1.0]),
            rhs: DVector::from_vec(vec![1.0]),
            num_equalities: 0,
        };
        let sol = solve(&qp, &QpSettings::default()).unwrap();
        assert!((sol.x[0] - 1.0).abs() < 1e-6);
        // stationarity: 2x - 4 + z = 0 at x = 1
        assert!((sol.duals[0] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_infeasible_qp() {
        // x <= -1 and -x <= -1 (x >= 1)
        let qp = QpProblem {
            hessian: DMatrix::from_diagonal_element(1, 1, 1.0),
            gradient: DVector::zeros(1),
            constraints: DMatrix::from_row_slice(2, 1, &[1.0, -1.0]),
            rhs: DVector::from_vec(vec![-1.0, -1.0]),
            num_equalities: 0,
        };
        assert!(matches!(
            solve(&qp, &QpSettings::default()),
            Err(SolveFailure::QpFailure(_))
        ));
    }
}
