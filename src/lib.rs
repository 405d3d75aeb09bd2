//! vehicle_mpc - Model predictive path tracking for ground vehicles
//!
//! This crate provides a kinematic bicycle model, a tracking cost, the
//! dynamics and actuator constraints of the horizon problem, and a sparse SQP
//! solver used to compute steering and acceleration commands every cycle.

// Core modules
pub mod common;
pub mod utils;

// Numerical optimization
pub mod optimization;

// Controllers
pub mod path_tracking;

// Re-export common types for convenience
pub use common::{Actuators, Path2D, PathModel, Point2D, VehicleState};
pub use common::{Controller, MotionModel};
pub use common::{MpcError, MpcResult};
pub use path_tracking::mpc::{MpcConfig, MpcController, MpcSolution};
