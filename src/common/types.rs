//! Common types used throughout vehicle_mpc

use num_dual::DualNum;

use crate::common::error::{MpcError, MpcResult};

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Path represented as a sequence of 2D points
#[derive(Debug, Clone, PartialEq)]
pub struct Path2D {
    pub points: Vec<Point2D>,
}

impl Path2D {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { points: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

impl Default for Path2D {
    fn default() -> Self {
        Self::new()
    }
}

/// Vehicle state seen by the controller.
///
/// Generic over the scalar so the prediction model can be evaluated on dual
/// numbers as well as on plain `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState<D = f64> {
    /// Position x [m]
    pub x: D,
    /// Position y [m]
    pub y: D,
    /// Heading [rad]
    pub psi: D,
    /// Speed [m/s]
    pub v: D,
    /// Cross-track error [m]
    pub cte: D,
    /// Heading error [rad]
    pub epsi: D,
}

impl<D> VehicleState<D> {
    pub fn new(x: D, y: D, psi: D, v: D, cte: D, epsi: D) -> Self {
        Self { x, y, psi, v, cte, epsi }
    }
}

impl VehicleState<f64> {
    /// Components in decision-vector block order
    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }
}

/// Actuator command held constant over one timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuators<D = f64> {
    /// Steering angle [rad]
    pub steering: D,
    /// Longitudinal acceleration [m/s^2]
    pub acceleration: D,
}

impl<D> Actuators<D> {
    pub fn new(steering: D, acceleration: D) -> Self {
        Self { steering, acceleration }
    }
}

impl Actuators<f64> {
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Cubic reference path `y = c0 + c1*x + c2*x^2 + c3*x^3`, lowest order first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathModel {
    coeffs: [f64; 4],
}

impl PathModel {
    pub const NUM_COEFFS: usize = 4;

    /// Build a path from exactly four finite coefficients
    pub fn new(coeffs: &[f64]) -> MpcResult<Self> {
        if coeffs.len() != Self::NUM_COEFFS {
            return Err(MpcError::InvalidPathModel(format!(
                "expected {} coefficients, got {}",
                Self::NUM_COEFFS,
                coeffs.len()
            )));
        }
        if let Some(c) = coeffs.iter().find(|c| !c.is_finite()) {
            return Err(MpcError::InvalidPathModel(format!(
                "coefficient {} is not finite",
                c
            )));
        }

        let mut stored = [0.0; 4];
        stored.copy_from_slice(coeffs);
        Ok(Self { coeffs: stored })
    }

    /// The line `y = 0`
    pub fn straight() -> Self {
        Self { coeffs: [0.0; 4] }
    }

    pub fn coeffs(&self) -> &[f64; 4] {
        &self.coeffs
    }

    /// Path ordinate at `x`
    pub fn eval<D: DualNum<f64> + Copy>(&self, x: D) -> D {
        let [c0, c1, c2, c3] = self.coeffs;
        ((x * c3 + c2) * x + c1) * x + c0
    }

    /// Desired heading at `x`, the angle of the path tangent
    pub fn heading<D: DualNum<f64> + Copy>(&self, x: D) -> D {
        let [_, c1, c2, c3] = self.coeffs;
        ((x * (3.0 * c3) + 2.0 * c2) * x + c1).atan()
    }
}

impl Default for PathModel {
    fn default() -> Self {
        Self::straight()
    }
}
