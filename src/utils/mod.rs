//! Utility modules for vehicle_mpc

pub mod params;
pub mod visualization;

pub use params::{load, LoadError};
pub use visualization::{Visualizer, PathStyle, PointStyle, colors};
