//! Dynamics constraints and bounds
//!
//! Row `layout.<state>(0)` holds the raw decision value and is pinned to the
//! current measurement through equal lower and upper bounds. Rows at
//! `t >= 1` hold `decision(t) - model(decision(t - 1), actuators(t - 1))`
//! and are pinned to zero.

use num_dual::DualNum;

use super::config::ActuatorBounds;
use super::layout::VariableLayout;
use crate::common::{MotionModel, PathModel, VehicleState};
use crate::optimization::{NlpBounds, SparsityPattern, INFINITE_BOUND};

/// Builds the equality constraints tying consecutive timesteps together
#[derive(Debug, Clone, Copy)]
pub struct ConstraintAssembler {
    layout: VariableLayout,
    dt: f64,
}

impl ConstraintAssembler {
    pub fn new(layout: VariableLayout, dt: f64) -> Self {
        Self { layout, dt }
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    /// Constraint values for `vars`, written into `out`
    pub fn evaluate<D, M>(&self, model: &M, path: &PathModel, vars: &[D], out: &mut [D])
    where
        D: DualNum<f64> + Copy,
        M: MotionModel,
    {
        let l = &self.layout;

        for start in l.state_starts() {
            out[start] = vars[start];
        }

        for t in 1..l.steps() {
            let previous = l.state_at(vars, t - 1);
            let control = l.actuators_at(vars, t - 1);
            let predicted = model.propagate(&previous, &control, path, self.dt);
            let actual = l.state_at(vars, t);

            out[l.x(t)] = actual.x - predicted.x;
            out[l.y(t)] = actual.y - predicted.y;
            out[l.psi(t)] = actual.psi - predicted.psi;
            out[l.v(t)] = actual.v - predicted.v;
            out[l.cte(t)] = actual.cte - predicted.cte;
            out[l.epsi(t)] = actual.epsi - predicted.epsi;
        }
    }

    /// Variable and constraint bounds anchored at `state`
    pub fn bounds(&self, state: &VehicleState, limits: &ActuatorBounds) -> NlpBounds {
        let l = &self.layout;
        let n = l.num_variables();
        let m = l.num_constraints();

        let mut var_lower = vec![-INFINITE_BOUND; n];
        let mut var_upper = vec![INFINITE_BOUND; n];
        for i in l.deltas() {
            var_lower[i] = -limits.max_steering;
            var_upper[i] = limits.max_steering;
        }
        for i in l.accelerations() {
            var_lower[i] = -limits.max_acceleration;
            var_upper[i] = limits.max_acceleration;
        }

        let mut con_lower = vec![0.0; m];
        let mut con_upper = vec![0.0; m];
        for (start, value) in l.state_starts().into_iter().zip(state.to_array()) {
            con_lower[start] = value;
            con_upper[start] = value;
        }

        NlpBounds { var_lower, var_upper, con_lower, con_upper }
    }

    /// Jacobian pattern: each dynamics row touches its own state at `t`, every
    /// state at `t - 1` and both actuators at `t - 1`
    pub fn jacobian_sparsity(&self) -> SparsityPattern {
        let l = &self.layout;
        let mut pattern = SparsityPattern::new(l.num_constraints(), l.num_variables());

        for start in l.state_starts() {
            pattern.insert(start, start);
            for t in 1..l.steps() {
                let row = start + t;
                pattern.insert(row, row);
                for previous in l.state_starts() {
                    pattern.insert(row, previous + t - 1);
                }
                pattern.insert(row, l.delta(t - 1));
                pattern.insert(row, l.a(t - 1));
            }
        }

        pattern.finish()
    }
}
