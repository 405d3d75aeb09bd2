//! MPC objective
//!
//! ```text
//! J = sum_t   w_cte cte_t^2 + w_epsi epsi_t^2 + w_v (v_t - v_ref)^2       t in [0, N)
//!   + sum_t   w_delta delta_t^2 + w_a a_t^2                              t in [0, N-1)
//!   + sum_t   w_ddelta (delta_t+1 - delta_t)^2 + w_da (a_t+1 - a_t)^2   t in [0, N-2)
//! ```

use itertools::Itertools;
use num_dual::DualNum;

use super::config::CostWeights;
use super::layout::VariableLayout;
use crate::optimization::SparsityPattern;

/// Weighted tracking, effort and smoothness cost over the horizon
#[derive(Debug, Clone)]
pub struct CostFunction {
    layout: VariableLayout,
    weights: CostWeights,
    reference_speed: f64,
}

impl CostFunction {
    pub fn new(layout: VariableLayout, weights: CostWeights, reference_speed: f64) -> Self {
        Self { layout, weights, reference_speed }
    }

    /// Objective value of a decision vector
    pub fn evaluate<D: DualNum<f64> + Copy>(&self, vars: &[D]) -> D {
        let l = &self.layout;
        let w = &self.weights;
        let mut cost = D::from(0.0);

        for t in 0..l.steps() {
            let speed_error = vars[l.v(t)] - self.reference_speed;
            cost = cost
                + square(vars[l.cte(t)]) * w.cte
                + square(vars[l.epsi(t)]) * w.epsi
                + square(speed_error) * w.speed;
        }

        for t in 0..l.actuator_steps() {
            cost = cost
                + square(vars[l.delta(t)]) * w.steering
                + square(vars[l.a(t)]) * w.acceleration;
        }

        for (&d0, &d1) in vars[l.deltas()].iter().tuple_windows() {
            cost = cost + square(d1 - d0) * w.steering_rate;
        }
        for (&a0, &a1) in vars[l.accelerations()].iter().tuple_windows() {
            cost = cost + square(a1 - a0) * w.acceleration_rate;
        }

        cost
    }

    /// Upper-triangle Hessian pattern
    pub fn hessian_sparsity(&self) -> SparsityPattern {
        let l = &self.layout;
        let n = l.num_variables();
        let mut pattern = SparsityPattern::new(n, n);

        for t in 0..l.steps() {
            for i in [l.cte(t), l.epsi(t), l.v(t)] {
                pattern.insert(i, i);
            }
        }
        for range in [l.deltas(), l.accelerations()] {
            for i in range.clone() {
                pattern.insert(i, i);
            }
            for (i, j) in range.tuple_windows() {
                pattern.insert(i, j);
            }
        }

        pattern.finish()
    }
}

fn square<D: DualNum<f64> + Copy>(x: D) -> D {
    x * x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_tracking::mpc::config::MpcConfig;

    fn cost_function(steps: usize) -> (VariableLayout, CostFunction) {
        let config = MpcConfig::default();
        let layout = VariableLayout::new(steps);
        let cost = CostFunction::new(layout, config.weights, config.reference_speed);
        (layout, cost)
    }

    #[test]
    fn test_zero_at_reference() {
        let (layout, cost) = cost_function(5);
        let mut vars = vec![0.0; layout.num_variables()];
        for t in 0..5 {
            vars[layout.v(t)] = 120.0;
        }
        assert!(cost.evaluate(&vars).abs() < 1e-12);
    }

    #[test]
    fn test_individual_terms() {
        let (layout, cost) = cost_function(4);
        let mut vars = vec![0.0; layout.num_variables()];
        for t in 0..4 {
            vars[layout.v(t)] = 120.0;
        }

        vars[layout.cte(2)] = 0.5;
        // 2000 * 0.25
        assert!((cost.evaluate(&vars) - 500.0).abs() < 1e-9);

        vars[layout.cte(2)] = 0.0;
        vars[layout.delta(1)] = 0.1;
        // magnitude 10 * 0.01, rate 100 * 0.01 on both neighbours
        assert!((cost.evaluate(&vars) - (0.1 + 2.0)).abs() < 1e-9);

        vars[layout.delta(1)] = 0.0;
        vars[layout.a(0)] = 1.0;
        // magnitude 10, rate 10 against a(1)
        assert!((cost.evaluate(&vars) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_term() {
        let (layout, cost) = cost_function(3);
        let vars = vec![0.0; layout.num_variables()];
        assert!((cost.evaluate(&vars) - 3.0 * 120.0 * 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_hessian_pattern_covers_dense_hessian() {
        use crate::optimization::autodiff::objective_hessian_dense;
        use crate::optimization::{NlpProblem, SparsityPattern};
        use nalgebra::DVector;

        struct CostOnly(CostFunction, usize);

        impl NlpProblem for CostOnly {
            fn num_variables(&self) -> usize {
                self.1
            }
            fn num_constraints(&self) -> usize {
                0
            }
            fn objective<D: DualNum<f64> + Copy>(&self, vars: &[D]) -> D {
                self.0.evaluate(vars)
            }
            fn constraints<D: DualNum<f64> + Copy>(&self, _vars: &[D], _out: &mut [D]) {}
            fn hessian_sparsity(&self) -> Option<SparsityPattern> {
                Some(self.0.hessian_sparsity())
            }
        }

        let (layout, cost) = cost_function(6);
        let n = layout.num_variables();
        let pattern = cost.hessian_sparsity();
        let problem = CostOnly(cost, n);
        let hessian = objective_hessian_dense(&problem, &DVector::zeros(n));

        for i in 0..n {
            for j in i..n {
                if hessian[(i, j)] != 0.0 {
                    assert!(
                        pattern.entries().binary_search(&(i, j)).is_ok(),
                        "({}, {}) missing from pattern",
                        i,
                        j
                    );
                }
            }
        }
        // the steering rate term couples neighbours
        assert!((hessian[(layout.delta(0), layout.delta(1))] + 200.0).abs() < 1e-9);
    }
}
