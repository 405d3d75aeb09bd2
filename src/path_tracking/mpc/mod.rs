//! Model Predictive Control for path tracking
//!
//! Tracks a cubic reference path with a kinematic bicycle model. Every
//! control cycle the controller optimizes states and actuators over a short
//! horizon subject to the model dynamics and actuator limits, then returns
//! the first command of the plan.
//!
//! # Components
//!
//! - `layout`: decision-vector offsets shared by cost and constraints
//! - `kinematic_model`: discrete bicycle model with tracking errors
//! - `cost`: weighted tracking, effort and smoothness terms
//! - `constraints`: dynamics residuals and bounds
//! - `controller`: solve driver and result extraction
//!
//! # Example
//!
//! ```no_run
//! use vehicle_mpc::common::{PathModel, VehicleState};
//! use vehicle_mpc::path_tracking::mpc::MpcController;
//!
//! let controller = MpcController::with_defaults();
//! let path = PathModel::new(&[0.0, 0.1, 0.0, 0.0])?;
//! let state = VehicleState::new(0.0, -0.5, 0.0, 20.0, 0.5, -0.1);
//!
//! let solution = controller.solve(&state, &path)?;
//! println!("steer {:.3} rad, accel {:.3}", solution.steering, solution.acceleration);
//! # Ok::<(), vehicle_mpc::common::MpcError>(())
//! ```

pub mod config;
pub mod constraints;
pub mod controller;
pub mod cost;
pub mod kinematic_model;
pub mod layout;
pub mod problem;

// Re-exports
pub use config::{ActuatorBounds, CostWeights, HorizonConfig, MpcConfig, VehicleConfig};
pub use constraints::ConstraintAssembler;
pub use controller::{MpcController, MpcSolution};
pub use cost::CostFunction;
pub use kinematic_model::KinematicModel;
pub use layout::VariableLayout;
pub use problem::MpcProblem;
