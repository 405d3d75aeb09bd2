//! Kinematic bicycle model with tracking-error dynamics
//!
//! Discrete update over one timestep `dt` with actuators held constant:
//!
//! ```text
//! x1    = x0 + v0 * cos(psi0) * dt
//! y1    = y0 + v0 * sin(psi0) * dt
//! psi1  = psi0 - v0 * delta0 / Lf * dt
//! v1    = v0 + a0 * dt
//! cte1  = (f(x0) - y0) + v0 * sin(epsi0) * dt
//! epsi1 = (psi0 - psi_des(x0)) - v0 * delta0 / Lf * dt
//! ```
//!
//! A positive steering command turns the vehicle clockwise (decreasing psi).

use num_dual::DualNum;

use crate::common::{Actuators, MotionModel, PathModel, VehicleState};

/// Kinematic bicycle model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicModel {
    lf: f64,
}

impl KinematicModel {
    pub fn new(lf: f64) -> Self {
        Self { lf }
    }

    /// Distance from the front axle to the centre of gravity [m]
    pub fn lf(&self) -> f64 {
        self.lf
    }

    /// Plain numeric prediction, e.g. for simulating the vehicle
    pub fn predict(
        &self,
        state: &VehicleState,
        control: &Actuators,
        path: &PathModel,
        dt: f64,
    ) -> VehicleState {
        self.propagate(state, control, path, dt)
    }
}

impl MotionModel for KinematicModel {
    fn propagate<D: DualNum<f64> + Copy>(
        &self,
        state: &VehicleState<D>,
        control: &Actuators<D>,
        path: &PathModel,
        dt: f64,
    ) -> VehicleState<D> {
        let f0 = path.eval(state.x);
        let psi_des0 = path.heading(state.x);
        let turn = state.v * control.steering * (dt / self.lf);

        VehicleState {
            x: state.x + state.v * state.psi.cos() * dt,
            y: state.y + state.v * state.psi.sin() * dt,
            psi: state.psi - turn,
            v: state.v + control.acceleration * dt,
            cte: (f0 - state.y) + state.v * state.epsi.sin() * dt,
            epsi: (state.psi - psi_des0) - turn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_dual::Dual64;

    const DT: f64 = 0.1;

    #[test]
    fn test_on_path_stays_on_path() {
        let model = KinematicModel::new(2.67);
        let path = PathModel::straight();
        let mut state = VehicleState::new(0.0, 0.0, 0.0, 15.0, 0.0, 0.0);

        for _ in 0..20 {
            state = model.predict(&state, &Actuators::zero(), &path, DT);
            assert!(state.cte.abs() < 1e-12);
            assert!(state.epsi.abs() < 1e-12);
            assert!((state.v - 15.0).abs() < 1e-12);
            assert!(state.y.abs() < 1e-12);
        }
        assert!((state.x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_step() {
        let model = KinematicModel::new(2.0);
        let path = PathModel::new(&[1.0, 0.5, 0.0, 0.0]).unwrap();
        let state = VehicleState::new(2.0, 1.0, 0.3, 10.0, 0.2, 0.1);
        let control = Actuators::new(0.1, 0.5);

        let next = model.predict(&state, &control, &path, DT);
        let turn = 10.0 * 0.1 / 2.0 * DT;
        assert!((next.x - (2.0 + 10.0 * 0.3_f64.cos() * DT)).abs() < 1e-12);
        assert!((next.y - (1.0 + 10.0 * 0.3_f64.sin() * DT)).abs() < 1e-12);
        assert!((next.psi - (0.3 - turn)).abs() < 1e-12);
        assert!((next.v - 10.05).abs() < 1e-12);
        // f(2) = 2, so the lateral offset is 1
        assert!((next.cte - (1.0 + 10.0 * 0.1_f64.sin() * DT)).abs() < 1e-12);
        assert!((next.epsi - (0.3 - 0.5_f64.atan() - turn)).abs() < 1e-12);
    }

    #[test]
    fn test_positive_steering_turns_clockwise() {
        let model = KinematicModel::new(2.67);
        let state = VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0);
        let next = model.predict(&state, &Actuators::new(0.2, 0.0), &PathModel::straight(), DT);
        assert!(next.psi < 0.0);
        assert!(next.epsi < 0.0);
    }

    #[test]
    fn test_dual_matches_numeric() {
        let model = KinematicModel::new(2.67);
        let path = PathModel::new(&[0.1, 0.2, -0.01, 0.001]).unwrap();
        let state = VehicleState::new(1.0, 0.4, 0.1, 12.0, -0.2, 0.05);
        let control = Actuators::new(-0.05, 0.3);
        let numeric = model.predict(&state, &control, &path, DT);

        // derivative of every output with respect to speed
        let d = |v: f64| Dual64::from(v);
        let mut v = d(state.v);
        v.eps = 1.0;
        let dual_state = VehicleState::new(
            d(state.x),
            d(state.y),
            d(state.psi),
            v,
            d(state.cte),
            d(state.epsi),
        );
        let dual_control = Actuators::new(d(control.steering), d(control.acceleration));
        let dual = model.propagate(&dual_state, &dual_control, &path, DT);

        assert!((dual.x.re - numeric.x).abs() < 1e-12);
        assert!((dual.cte.re - numeric.cte).abs() < 1e-12);
        assert!((dual.x.eps - 0.1_f64.cos() * DT).abs() < 1e-12);
        assert!((dual.v.eps - 1.0).abs() < 1e-12);
        assert!((dual.psi.eps - (0.05 * DT / 2.67)).abs() < 1e-12);
    }
}
