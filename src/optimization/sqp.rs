//! Sequential quadratic programming
//!
//! Each major iteration linearises the constraints around the current
//! iterate and solves
//!
//! ```text
//! min  0.5 d'Hd + grad_f'd
//! s.t. g_l <= g(x) + J d <= g_u
//!      x_l <= x + d      <= x_u
//! ```
//!
//! where `H` is the objective Hessian taken at the initial point plus a small
//! diagonal shift. The step is accepted by backtracking on the l1 merit
//! function `f + rho * |violation|_1`, with `rho` kept above the largest QP
//! constraint multiplier.

use std::time::Instant;

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::autodiff::{
    constraint_jacobian_colored, constraint_jacobian_dense, constraint_values,
    objective_gradient, objective_hessian_dense, objective_hessian_sparse, ColumnColoring,
};
use super::qp::{self, QpProblem, QpSettings};
use super::{
    is_finite_bound, FailedSolve, NlpBounds, NlpProblem, NlpSolution, NlpSolver, SolveFailure,
    SparsityPattern,
};
use crate::common::error::{MpcError, MpcResult};

/// Sufficient decrease factor of the Armijo test
const ARMIJO: f64 = 1e-4;
/// Backtracking stops below this step fraction
const MIN_STEP_FRACTION: f64 = 1e-10;
/// Relative slack on the merit test, absorbs rounding once steps are tiny
const MERIT_SLACK: f64 = 1e-12;
/// Penalty parameter is kept this factor above the multiplier norm
const PENALTY_MARGIN: f64 = 1.1;

/// SQP solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqpConfig {
    /// Maximum number of major iterations
    pub max_iterations: usize,
    /// Wall-clock budget for one solve [s]
    pub time_limit: f64,
    /// Allowed l1 constraint violation at convergence
    pub constraint_tolerance: f64,
    /// Converged once the accepted step is below `step_tolerance * (1 + |x|_inf)`
    pub step_tolerance: f64,
    /// Diagonal shift added to the objective Hessian
    pub hessian_regularization: f64,
    /// Iteration limit of each QP subproblem
    pub qp_max_iterations: u32,
    /// Compress Jacobian evaluation with the problem's sparsity pattern
    pub sparse_jacobian: bool,
    /// Evaluate only the Hessian entries in the problem's sparsity pattern
    pub sparse_hessian: bool,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            time_limit: 0.5,
            constraint_tolerance: 1e-6,
            step_tolerance: 1e-6,
            hessian_regularization: 1e-8,
            qp_max_iterations: 200,
            sparse_jacobian: true,
            sparse_hessian: true,
        }
    }
}

impl SqpConfig {
    pub fn validate(&self) -> MpcResult<()> {
        if self.max_iterations == 0 {
            return Err(MpcError::InvalidConfig(
                "solver iteration limit must be positive".to_string(),
            ));
        }
        if self.qp_max_iterations == 0 {
            return Err(MpcError::InvalidConfig(
                "QP iteration limit must be positive".to_string(),
            ));
        }
        let positive = [
            ("time_limit", self.time_limit),
            ("constraint_tolerance", self.constraint_tolerance),
            ("step_tolerance", self.step_tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(MpcError::InvalidConfig(format!(
                    "solver {} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.hessian_regularization >= 0.0) || !self.hessian_regularization.is_finite() {
            return Err(MpcError::InvalidConfig(format!(
                "Hessian regularization must be finite and non-negative, got {}",
                self.hessian_regularization
            )));
        }
        Ok(())
    }
}

/// Source of one row of the QP constraint matrix
#[derive(Debug, Clone, Copy)]
enum RowSource {
    /// Row `i` of the constraint Jacobian
    Constraint(usize),
    /// Unit row on variable `j`
    Variable(usize),
}

#[derive(Debug, Clone, Copy)]
struct QpRow {
    source: RowSource,
    sign: f64,
    rhs: f64,
}

/// SQP solver
pub struct SqpSolver {
    config: SqpConfig,
}

impl SqpSolver {
    pub fn new(config: SqpConfig) -> Self {
        Self { config }
    }

    /// Linearised subproblem around `x`
    fn subproblem(
        &self,
        hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        x: &DVector<f64>,
        values: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        bounds: &NlpBounds,
    ) -> (QpProblem, Vec<QpRow>) {
        let mut equalities = Vec::new();
        let mut inequalities = Vec::new();

        for (i, (&lo, &hi)) in bounds.con_lower.iter().zip(&bounds.con_upper).enumerate() {
            let source = RowSource::Constraint(i);
            if is_finite_bound(lo) && lo == hi {
                equalities.push(QpRow { source, sign: 1.0, rhs: lo - values[i] });
                continue;
            }
            if is_finite_bound(hi) {
                inequalities.push(QpRow { source, sign: 1.0, rhs: hi - values[i] });
            }
            if is_finite_bound(lo) {
                inequalities.push(QpRow { source, sign: -1.0, rhs: values[i] - lo });
            }
        }

        for (j, (&lo, &hi)) in bounds.var_lower.iter().zip(&bounds.var_upper).enumerate() {
            let source = RowSource::Variable(j);
            if is_finite_bound(hi) {
                inequalities.push(QpRow { source, sign: 1.0, rhs: hi - x[j] });
            }
            if is_finite_bound(lo) {
                inequalities.push(QpRow { source, sign: -1.0, rhs: x[j] - lo });
            }
        }

        let num_equalities = equalities.len();
        let rows: Vec<QpRow> = equalities.into_iter().chain(inequalities).collect();

        let n = x.len();
        let mut constraints = DMatrix::zeros(rows.len(), n);
        for (r, row) in rows.iter().enumerate() {
            match row.source {
                RowSource::Constraint(i) => {
                    constraints.row_mut(r).copy_from(&(jacobian.row(i) * row.sign));
                }
                RowSource::Variable(j) => constraints[(r, j)] = row.sign,
            }
        }
        let rhs = DVector::from_iterator(rows.len(), rows.iter().map(|row| row.rhs));

        let qp = QpProblem {
            hessian: hessian.clone(),
            gradient: gradient.clone(),
            constraints,
            rhs,
            num_equalities,
        };
        (qp, rows)
    }

    fn project(x: &mut DVector<f64>, bounds: &NlpBounds) {
        for (j, v) in x.iter_mut().enumerate() {
            *v = v.max(bounds.var_lower[j]).min(bounds.var_upper[j]);
        }
    }
}

impl NlpSolver for SqpSolver {
    fn solve<P: NlpProblem>(
        &self,
        problem: &P,
        bounds: &NlpBounds,
        initial: &[f64],
    ) -> Result<NlpSolution, FailedSolve> {
        let start = Instant::now();
        let n = problem.num_variables();
        let m = problem.num_constraints();
        let invalid =
            |msg: String| FailedSolve::new(SolveFailure::InvalidProblem(msg), f64::NAN, 0);

        bounds.check(n, m).map_err(invalid)?;
        if initial.len() != n {
            return Err(invalid(format!(
                "initial point has length {}, expected {}",
                initial.len(),
                n
            )));
        }
        if initial.iter().any(|v| !v.is_finite()) {
            return Err(invalid("initial point is not finite".to_string()));
        }

        let mut x = DVector::from_column_slice(initial);
        Self::project(&mut x, bounds);

        let jacobian_structure: Option<(SparsityPattern, ColumnColoring)> =
            if self.config.sparse_jacobian {
                problem.jacobian_sparsity().map(|pattern| {
                    let coloring = ColumnColoring::greedy(&pattern);
                    debug!(
                        "Jacobian {}x{} with {} nonzeros compressed to {} colors",
                        m,
                        n,
                        pattern.nnz(),
                        coloring.num_colors()
                    );
                    (pattern, coloring)
                })
            } else {
                None
            };

        let mut hessian = match (self.config.sparse_hessian, problem.hessian_sparsity()) {
            (true, Some(pattern)) => objective_hessian_sparse(problem, &x, &pattern),
            _ => objective_hessian_dense(problem, &x),
        };
        if hessian.iter().any(|h| !h.is_finite()) {
            return Err(FailedSolve::new(SolveFailure::NonFiniteEvaluation, f64::NAN, 0));
        }
        for i in 0..n {
            hessian[(i, i)] += self.config.hessian_regularization;
        }

        let mut penalty = 1.0_f64;
        let mut objective = f64::NAN;

        for iteration in 0..self.config.max_iterations {
            let fail = |status: SolveFailure, objective: f64| {
                FailedSolve::new(status, objective, iteration)
            };

            let remaining = self.config.time_limit - start.elapsed().as_secs_f64();
            if remaining <= 0.0 {
                return Err(fail(SolveFailure::TimeLimit, objective));
            }

            let (f, gradient) = objective_gradient(problem, &x);
            let (values, jacobian) = match &jacobian_structure {
                Some((pattern, coloring)) => {
                    constraint_jacobian_colored(problem, &x, pattern, coloring)
                }
                None => constraint_jacobian_dense(problem, &x),
            };
            if !f.is_finite()
                || gradient.iter().any(|g| !g.is_finite())
                || values.iter().any(|c| !c.is_finite())
                || jacobian.iter().any(|j| !j.is_finite())
            {
                return Err(fail(SolveFailure::NonFiniteEvaluation, f));
            }
            let violation = bounds.constraint_violation(values.as_slice());

            let (qp, rows) = self.subproblem(&hessian, &gradient, &x, &values, &jacobian, bounds);
            let settings = QpSettings {
                max_iterations: self.config.qp_max_iterations,
                time_limit: remaining,
            };
            let step = qp::solve(&qp, &settings).map_err(|status| fail(status, f))?;
            let direction = step.x;

            let x_scale = 1.0 + x.amax();
            if violation <= self.config.constraint_tolerance
                && direction.amax() <= self.config.step_tolerance * x_scale
            {
                debug!("SQP converged at iteration {}: objective {:.6e}", iteration, f);
                return Ok(NlpSolution {
                    x: x.iter().copied().collect(),
                    objective: f,
                    constraint_violation: violation,
                    iterations: iteration + 1,
                });
            }

            let multiplier_norm = rows
                .iter()
                .zip(step.duals.iter())
                .filter(|(row, _)| matches!(row.source, RowSource::Constraint(_)))
                .fold(0.0_f64, |acc, (_, z)| acc.max(z.abs()));
            penalty = penalty.max(PENALTY_MARGIN * multiplier_norm);

            let merit = f + penalty * violation;
            let slope = gradient.dot(&direction) - penalty * violation;

            let mut alpha = 1.0;
            let (x_next, f_next, violation_next) = loop {
                let mut trial = &x + &direction * alpha;
                Self::project(&mut trial, bounds);

                let f_trial: f64 = problem.objective(trial.as_slice());
                let violation_trial =
                    bounds.constraint_violation(constraint_values(problem, &trial).as_slice());
                let merit_trial = f_trial + penalty * violation_trial;

                let target =
                    merit + ARMIJO * alpha * slope.min(0.0) + MERIT_SLACK * (1.0 + merit.abs());
                if merit_trial.is_finite() && merit_trial <= target {
                    break (trial, f_trial, violation_trial);
                }

                alpha *= 0.5;
                if alpha < MIN_STEP_FRACTION {
                    warn!(
                        "SQP line search failed at iteration {}: merit {:.6e}, slope {:.3e}",
                        iteration, merit, slope
                    );
                    return Err(fail(SolveFailure::LineSearch, f));
                }
            };

            let step_norm = alpha * direction.amax();
            debug!(
                "SQP iteration {}: objective {:.6e}, violation {:.3e}, step {:.3e}, alpha {:.3}",
                iteration, f_next, violation_next, step_norm, alpha
            );
            debug!("SQP penalty parameter {:.3e}", penalty);

            x = x_next;
            objective = f_next;

            if violation_next <= self.config.constraint_tolerance
                && step_norm <= self.config.step_tolerance * (1.0 + x.amax())
            {
                return Ok(NlpSolution {
                    x: x.iter().copied().collect(),
                    objective,
                    constraint_violation: violation_next,
                    iterations: iteration + 1,
                });
            }
        }

        Err(FailedSolve::new(
            SolveFailure::MaxIterations,
            objective,
            self.config.max_iterations,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::INFINITE_BOUND;
    use num_dual::DualNum;

    /// min (x0 - 1)^2 + (x1 - 2)^2  s.t.  x0^2 + x1^2 = 1,  x1 <= 0.8
    struct Circle;

    impl NlpProblem for Circle {
        fn num_variables(&self) -> usize {
            2
        }

        fn num_constraints(&self) -> usize {
            1
        }

        fn objective<D: DualNum<f64> + Copy>(&self, v: &[D]) -> D {
            let a = v[0] - 1.0;
            let b = v[1] - 2.0;
            a * a + b * b
        }

        fn constraints<D: DualNum<f64> + Copy>(&self, v: &[D], out: &mut [D]) {
            out[0] = v[0] * v[0] + v[1] * v[1];
        }
    }

    fn circle_bounds(upper_x1: f64) -> NlpBounds {
        NlpBounds {
            var_lower: vec![-INFINITE_BOUND, -INFINITE_BOUND],
            var_upper: vec![INFINITE_BOUND, upper_x1],
            con_lower: vec![1.0],
            con_upper: vec![1.0],
        }
    }

    fn test_config() -> SqpConfig {
        SqpConfig {
            time_limit: 10.0,
            ..SqpConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SqpConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_time_limit() {
        let config = SqpConfig {
            time_limit: 0.0,
            ..SqpConfig::default()
        };
        assert!(matches!(config.validate(), Err(MpcError::InvalidConfig(_))));
    }

    #[test]
    fn test_equality_constrained() {
        let solver = SqpSolver::new(test_config());
        let sol = solver
            .solve(&Circle, &circle_bounds(INFINITE_BOUND), &[1.0, 1.0])
            .unwrap();

        // closest point of the unit circle to (1, 2)
        let norm = 5.0_f64.sqrt();
        assert!((sol.x[0] - 1.0 / norm).abs() < 1e-5, "x0 = {}", sol.x[0]);
        assert!((sol.x[1] - 2.0 / norm).abs() < 1e-5, "x1 = {}", sol.x[1]);
        assert!(sol.constraint_violation < 1e-6);
    }

    #[test]
    fn test_active_variable_bound() {
        let solver = SqpSolver::new(test_config());
        let sol = solver.solve(&Circle, &circle_bounds(0.8), &[1.0, 0.0]).unwrap();

        assert!(sol.x[1] <= 0.8);
        assert!((sol.x[1] - 0.8).abs() < 1e-5, "x1 = {}", sol.x[1]);
        assert!((sol.x[0] - 0.6).abs() < 1e-5, "x0 = {}", sol.x[0]);
    }

    /// Same objective on the parabola x1 = 0.1 * x0^2
    struct Parabola;

    impl NlpProblem for Parabola {
        fn num_variables(&self) -> usize {
            2
        }

        fn num_constraints(&self) -> usize {
            1
        }

        fn objective<D: DualNum<f64> + Copy>(&self, v: &[D]) -> D {
            Circle.objective(v)
        }

        fn constraints<D: DualNum<f64> + Copy>(&self, v: &[D], out: &mut [D]) {
            out[0] = v[1] - v[0] * v[0] * 0.1;
        }
    }

    #[test]
    fn test_curved_constraint_from_origin() {
        let solver = SqpSolver::new(test_config());
        let bounds = NlpBounds {
            var_lower: vec![-INFINITE_BOUND; 2],
            var_upper: vec![INFINITE_BOUND; 2],
            con_lower: vec![0.0],
            con_upper: vec![0.0],
        };
        let sol = solver.solve(&Parabola, &bounds, &[0.0, 0.0]).unwrap();

        assert!((sol.x[0] - 1.543976).abs() < 1e-4, "x0 = {}", sol.x[0]);
        assert!((sol.x[1] - 0.1 * sol.x[0] * sol.x[0]).abs() < 1e-6);
    }

    #[test]
    fn test_bad_initial_length() {
        let solver = SqpSolver::new(test_config());
        let err = solver
            .solve(&Circle, &circle_bounds(0.8), &[1.0])
            .unwrap_err();
        assert!(matches!(err.status, SolveFailure::InvalidProblem(_)));
    }

    #[test]
    fn test_time_limit() {
        let solver = SqpSolver::new(SqpConfig {
            time_limit: 1e-9,
            ..SqpConfig::default()
        });
        let err = solver
            .solve(&Circle, &circle_bounds(INFINITE_BOUND), &[1.0, 1.0])
            .unwrap_err();
        assert_eq!(err.status, SolveFailure::TimeLimit);
        assert_eq!(err.iterations, 0);
        assert!(err.objective.is_nan());
    }

    #[test]
    fn test_iteration_limit() {
        let solver = SqpSolver::new(SqpConfig {
            max_iterations: 1,
            ..test_config()
        });
        let err = solver
            .solve(&Circle, &circle_bounds(INFINITE_BOUND), &[3.0, -2.0])
            .unwrap_err();
        assert_eq!(err.status, SolveFailure::MaxIterations);
        assert!(err.objective.is_finite());
    }
}
