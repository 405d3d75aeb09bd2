//! Forward-mode derivatives of an [`NlpProblem`]
//!
//! First derivatives use `Dual64` (one seeded direction per pass), second
//! derivatives of the objective use `HyperDual64` (one pass per Hessian
//! entry). Jacobians can be compressed with a column colouring of a known
//! sparsity pattern so that structurally independent columns share a pass.

use nalgebra::{DMatrix, DVector};
use num_dual::{Dual64, HyperDual64};

use super::{NlpProblem, SparsityPattern};

/// Objective value and gradient at `x`
pub fn objective_gradient<P: NlpProblem>(problem: &P, x: &DVector<f64>) -> (f64, DVector<f64>) {
    let n = x.len();
    if n == 0 {
        return (problem.objective(x.as_slice()), DVector::zeros(0));
    }

    let mut vars: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
    let mut gradient = DVector::zeros(n);
    let mut value = 0.0;

    for i in 0..n {
        vars[i].eps = 1.0;
        let f = problem.objective(&vars);
        vars[i].eps = 0.0;

        gradient[i] = f.eps;
        value = f.re;
    }

    (value, gradient)
}

/// Constraint values at `x`
pub fn constraint_values<P: NlpProblem>(problem: &P, x: &DVector<f64>) -> DVector<f64> {
    let mut out = vec![0.0; problem.num_constraints()];
    problem.constraints(x.as_slice(), &mut out);
    DVector::from_vec(out)
}

/// Constraint values and Jacobian at `x`, one pass per variable
pub fn constraint_jacobian_dense<P: NlpProblem>(
    problem: &P,
    x: &DVector<f64>,
) -> (DVector<f64>, DMatrix<f64>) {
    let n = x.len();
    let m = problem.num_constraints();

    let mut vars: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
    let mut out = vec![Dual64::from(0.0); m];
    let mut jacobian = DMatrix::zeros(m, n);

    for j in 0..n {
        vars[j].eps = 1.0;
        problem.constraints(&vars, &mut out);
        vars[j].eps = 0.0;

        for (i, g) in out.iter().enumerate() {
            jacobian[(i, j)] = g.eps;
        }
    }

    (constraint_values(problem, x), jacobian)
}

/// Grouping of Jacobian columns whose structural nonzeros never share a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnColoring {
    color_of: Vec<usize>,
    groups: Vec<Vec<usize>>,
}

impl ColumnColoring {
    /// Greedy distance-1 colouring of the column intersection graph
    pub fn greedy(pattern: &SparsityPattern) -> Self {
        let ncols = pattern.ncols();
        let mut rows_of_col: Vec<Vec<usize>> = vec![Vec::new(); ncols];
        let mut cols_of_row: Vec<Vec<usize>> = vec![Vec::new(); pattern.nrows()];
        for &(r, c) in pattern.entries() {
            rows_of_col[c].push(r);
            cols_of_row[r].push(c);
        }

        let mut color_of = vec![usize::MAX; ncols];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        // forbidden[k] == col means colour k is taken by a neighbour of col
        let mut forbidden: Vec<usize> = Vec::new();

        for col in 0..ncols {
            for &r in &rows_of_col[col] {
                for &other in &cols_of_row[r] {
                    let k = color_of[other];
                    if k != usize::MAX {
                        forbidden[k] = col;
                    }
                }
            }

            let color = (0..groups.len())
                .find(|&k| forbidden[k] != col)
                .unwrap_or(groups.len());
            if color == groups.len() {
                groups.push(Vec::new());
                forbidden.push(usize::MAX);
            }

            color_of[col] = color;
            groups[color].push(col);
        }

        Self { color_of, groups }
    }

    pub fn num_colors(&self) -> usize {
        self.groups.len()
    }

    pub fn color_of(&self, col: usize) -> usize {
        self.color_of[col]
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }
}

/// Constraint values and Jacobian at `x`, one pass per colour.
///
/// `pattern` must cover every structural nonzero of the Jacobian; entries
/// outside it are left at zero.
pub fn constraint_jacobian_colored<P: NlpProblem>(
    problem: &P,
    x: &DVector<f64>,
    pattern: &SparsityPattern,
    coloring: &ColumnColoring,
) -> (DVector<f64>, DMatrix<f64>) {
    let n = x.len();
    let m = problem.num_constraints();

    let mut entries_by_color: Vec<Vec<(usize, usize)>> = vec![Vec::new(); coloring.num_colors()];
    for &(r, c) in pattern.entries() {
        entries_by_color[coloring.color_of(c)].push((r, c));
    }

    let mut vars: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
    let mut out = vec![Dual64::from(0.0); m];
    let mut jacobian = DMatrix::zeros(m, n);

    for (group, entries) in coloring.groups().iter().zip(&entries_by_color) {
        for &c in group {
            vars[c].eps = 1.0;
        }
        problem.constraints(&vars, &mut out);
        for &c in group {
            vars[c].eps = 0.0;
        }

        for &(r, c) in entries {
            jacobian[(r, c)] = out[r].eps;
        }
    }

    (constraint_values(problem, x), jacobian)
}

fn hessian_entry<P: NlpProblem>(problem: &P, vars: &mut [HyperDual64], i: usize, j: usize) -> f64 {
    vars[i].eps1 = 1.0;
    vars[j].eps2 = 1.0;
    let f = problem.objective(&*vars);
    vars[i].eps1 = 0.0;
    vars[j].eps2 = 0.0;
    f.eps1eps2
}

/// Objective Hessian at `x`, every entry of the upper triangle evaluated
pub fn objective_hessian_dense<P: NlpProblem>(problem: &P, x: &DVector<f64>) -> DMatrix<f64> {
    let n = x.len();
    let mut vars: Vec<HyperDual64> = x.iter().map(|&v| HyperDual64::from(v)).collect();
    let mut hessian = DMatrix::zeros(n, n);

    for i in 0..n {
        for j in i..n {
            let h = hessian_entry(problem, &mut vars, i, j);
            hessian[(i, j)] = h;
            hessian[(j, i)] = h;
        }
    }

    hessian
}

/// Objective Hessian at `x`, only the entries in `pattern` evaluated.
///
/// Either triangle (or both) of the pattern may be given.
pub fn objective_hessian_sparse<P: NlpProblem>(
    problem: &P,
    x: &DVector<f64>,
    pattern: &SparsityPattern,
) -> DMatrix<f64> {
    let n = x.len();
    let mut vars: Vec<HyperDual64> = x.iter().map(|&v| HyperDual64::from(v)).collect();
    let mut hessian = DMatrix::zeros(n, n);

    for &(r, c) in pattern.entries() {
        let (i, j) = (r.min(c), r.max(c));
        if i != r && pattern.entries().binary_search(&(i, j)).is_ok() {
            // mirrored entry already evaluated from the upper triangle
            continue;
        }
        let h = hessian_entry(problem, &mut vars, i, j);
        hessian[(i, j)] = h;
        hessian[(j, i)] = h;
    }

    hessian
}
