// Path Tracking algorithms module

pub mod mpc;

pub use mpc::{MpcConfig, MpcController, MpcSolution};
