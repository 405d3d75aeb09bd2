//! Decision-vector layout
//!
//! The optimizer sees one flat vector: six state blocks of length `N`
//! (x, y, psi, v, cte, epsi) followed by two actuator blocks of length `N - 1`
//! (steering, acceleration). Constraint rows reuse the state offsets, so row
//! `layout.cte(t)` is the cte dynamics at timestep `t`.

use std::ops::Range;

use crate::common::{Actuators, VehicleState};

/// Offsets of every block in the decision vector for a horizon of `N` steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    steps: usize,
}

impl VariableLayout {
    pub const NUM_STATES: usize = 6;
    pub const NUM_ACTUATORS: usize = 2;

    pub fn new(steps: usize) -> Self {
        Self { steps }
    }

    /// Horizon length `N`
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Number of actuator timesteps, `N - 1`
    pub fn actuator_steps(&self) -> usize {
        self.steps.saturating_sub(1)
    }

    pub fn num_variables(&self) -> usize {
        Self::NUM_STATES * self.steps + Self::NUM_ACTUATORS * self.actuator_steps()
    }

    pub fn num_constraints(&self) -> usize {
        Self::NUM_STATES * self.steps
    }

    pub fn x_start(&self) -> usize {
        0
    }

    pub fn y_start(&self) -> usize {
        self.steps
    }

    pub fn psi_start(&self) -> usize {
        2 * self.steps
    }

    pub fn v_start(&self) -> usize {
        3 * self.steps
    }

    pub fn cte_start(&self) -> usize {
        4 * self.steps
    }

    pub fn epsi_start(&self) -> usize {
        5 * self.steps
    }

    pub fn delta_start(&self) -> usize {
        6 * self.steps
    }

    pub fn a_start(&self) -> usize {
        self.delta_start() + self.actuator_steps()
    }

    /// State block offsets in `VehicleState` field order
    pub fn state_starts(&self) -> [usize; 6] {
        [
            self.x_start(),
            self.y_start(),
            self.psi_start(),
            self.v_start(),
            self.cte_start(),
            self.epsi_start(),
        ]
    }

    pub fn x(&self, t: usize) -> usize {
        self.x_start() + t
    }

    pub fn y(&self, t: usize) -> usize {
        self.y_start() + t
    }

    pub fn psi(&self, t: usize) -> usize {
        self.psi_start() + t
    }

    pub fn v(&self, t: usize) -> usize {
        self.v_start() + t
    }

    pub fn cte(&self, t: usize) -> usize {
        self.cte_start() + t
    }

    pub fn epsi(&self, t: usize) -> usize {
        self.epsi_start() + t
    }

    pub fn delta(&self, t: usize) -> usize {
        self.delta_start() + t
    }

    pub fn a(&self, t: usize) -> usize {
        self.a_start() + t
    }

    /// All state variables
    pub fn states(&self) -> Range<usize> {
        0..self.delta_start()
    }

    pub fn deltas(&self) -> Range<usize> {
        self.delta_start()..self.a_start()
    }

    pub fn accelerations(&self) -> Range<usize> {
        self.a_start()..self.num_variables()
    }

    /// Read the state at timestep `t`
    pub fn state_at<D: Copy>(&self, vars: &[D], t: usize) -> VehicleState<D> {
        VehicleState {
            x: vars[self.x(t)],
            y: vars[self.y(t)],
            psi: vars[self.psi(t)],
            v: vars[self.v(t)],
            cte: vars[self.cte(t)],
            epsi: vars[self.epsi(t)],
        }
    }

    /// Read the actuators applied over `[t, t + 1)`
    pub fn actuators_at<D: Copy>(&self, vars: &[D], t: usize) -> Actuators<D> {
        Actuators {
            steering: vars[self.delta(t)],
            acceleration: vars[self.a(t)],
        }
    }
}
