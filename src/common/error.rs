//! Error types for vehicle_mpc

use thiserror::Error;

use crate::optimization::SolveFailure;
use crate::utils::params::LoadError;

/// Main error type for the MPC core
#[derive(Debug, Error)]
pub enum MpcError {
    /// Configuration rejected before any problem was built
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reference path polynomial is malformed
    #[error("Invalid path model: {0}")]
    InvalidPathModel(String),

    /// Vehicle state handed to the controller is unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The nonlinear solver did not reach an optimal point
    #[error("Solve failed after {iterations} iterations ({status}), objective {objective}")]
    SolveFailed {
        status: SolveFailure,
        objective: f64,
        iterations: usize,
    },

    /// Configuration file could not be read
    #[error("Cannot load configuration: {0}")]
    ConfigLoad(#[from] LoadError),
}

/// Result type alias for MPC operations
pub type MpcResult<T> = Result<T, MpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MpcError::InvalidConfig("horizon must have at least 2 steps".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid configuration: horizon must have at least 2 steps"
        );
    }

    #[test]
    fn test_solve_failed_display() {
        let err = MpcError::SolveFailed {
            status: SolveFailure::MaxIterations,
            objective: 12.5,
            iterations: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("after 3 iterations"));
        assert!(msg.contains("12.5"));
    }

    #[test]
    fn test_error_from_load() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MpcError = LoadError::FileLoadError(io_err).into();
        assert!(matches!(err, MpcError::ConfigLoad(_)));
    }
}
