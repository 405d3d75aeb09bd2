//! Common traits defining interfaces for the MPC core

use num_dual::DualNum;

use crate::common::types::*;

/// Trait for vehicle motion models used as prediction models.
///
/// The model is generic over the scalar type so optimizers can push dual
/// numbers through it to obtain exact derivatives.
pub trait MotionModel {
    /// Propagate state forward by one timestep of `dt` seconds, holding the
    /// actuators constant. Tracking errors are measured against `path`.
    fn propagate<D: DualNum<f64> + Copy>(
        &self,
        state: &VehicleState<D>,
        control: &Actuators<D>,
        path: &PathModel,
        dt: f64,
    ) -> VehicleState<D>;
}

/// Trait for controllers (PID, LQR, MPC, etc.)
pub trait Controller {
    /// State type
    type State;
    /// Reference/target type
    type Reference;
    /// Output control type
    type Output;

    /// Compute control output
    fn compute(&mut self, state: &Self::State, reference: &Self::Reference) -> Self::Output;

    /// Reset controller state
    fn reset(&mut self);
}
