//! MPC configuration
//!
//! All tuning lives here: horizon, vehicle geometry, cost weights, actuator
//! limits and solver budget. Every struct deserialises with defaults for
//! missing fields, so a TOML file only needs the values it changes:
//!
//! ```toml
//! reference_speed = 40.0
//!
//! [horizon]
//! steps = 12
//!
//! [solver]
//! time_limit = 0.2
//! ```

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::common::error::{MpcError, MpcResult};
use crate::optimization::SqpConfig;
use crate::utils::params;

/// Horizons longer than this are accepted but logged
const LONG_HORIZON_S: f64 = 3.0;

/// Prediction horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    /// Number of timesteps `N`
    pub steps: usize,
    /// Timestep duration [s]
    pub dt: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self { steps: 10, dt: 0.1 }
    }
}

impl HorizonConfig {
    /// Horizon length [s]
    pub fn duration(&self) -> f64 {
        self.steps as f64 * self.dt
    }
}

/// Vehicle geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Distance from the front axle to the centre of gravity [m]
    pub lf: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self { lf: 2.67 }
    }
}

/// Weights of the cost terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Cross-track error
    pub cte: f64,
    /// Heading error
    pub epsi: f64,
    /// Deviation from the reference speed
    pub speed: f64,
    /// Steering magnitude
    pub steering: f64,
    /// Acceleration magnitude
    pub acceleration: f64,
    /// Change of steering between timesteps
    pub steering_rate: f64,
    /// Change of acceleration between timesteps
    pub acceleration_rate: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cte: 2000.0,
            epsi: 2000.0,
            speed: 1.0,
            steering: 10.0,
            acceleration: 10.0,
            steering_rate: 100.0,
            acceleration_rate: 10.0,
        }
    }
}

impl CostWeights {
    fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("cte", self.cte),
            ("epsi", self.epsi),
            ("speed", self.speed),
            ("steering", self.steering),
            ("acceleration", self.acceleration),
            ("steering_rate", self.steering_rate),
            ("acceleration_rate", self.acceleration_rate),
        ]
    }
}

/// Symmetric actuator limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorBounds {
    /// Steering magnitude limit [rad], 25 degrees by default
    pub max_steering: f64,
    /// Acceleration magnitude limit [m/s^2]
    pub max_acceleration: f64,
}

impl Default for ActuatorBounds {
    fn default() -> Self {
        Self {
            max_steering: 0.436332,
            max_acceleration: 1.0,
        }
    }
}

/// Complete MPC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcConfig {
    pub horizon: HorizonConfig,
    pub vehicle: VehicleConfig,
    /// Target speed [m/s]
    pub reference_speed: f64,
    pub weights: CostWeights,
    pub bounds: ActuatorBounds,
    pub solver: SqpConfig,
}

impl Default for MpcConfig {
    fn default() -> Self {
        Self {
            horizon: HorizonConfig::default(),
            vehicle: VehicleConfig::default(),
            reference_speed: 120.0,
            weights: CostWeights::default(),
            bounds: ActuatorBounds::default(),
            solver: SqpConfig::default(),
        }
    }
}

impl MpcConfig {
    /// Load a configuration from a TOML file and validate it
    pub fn load<F: AsRef<Path>>(path: F) -> MpcResult<Self> {
        let config: MpcConfig = params::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> MpcResult<Self> {
        let config: MpcConfig = params::from_toml_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_horizon(mut self, steps: usize, dt: f64) -> Self {
        self.horizon = HorizonConfig { steps, dt };
        self
    }

    pub fn with_reference_speed(mut self, reference_speed: f64) -> Self {
        self.reference_speed = reference_speed;
        self
    }

    pub fn with_weights(mut self, weights: CostWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_time_limit(mut self, time_limit: f64) -> Self {
        self.solver.time_limit = time_limit;
        self
    }

    /// Reject configurations the controller cannot solve
    pub fn validate(&self) -> MpcResult<()> {
        if self.horizon.steps < 2 {
            return Err(MpcError::InvalidConfig(format!(
                "horizon needs at least 2 steps, got {}",
                self.horizon.steps
            )));
        }
        if !(self.horizon.dt > 0.0) || !self.horizon.dt.is_finite() {
            return Err(MpcError::InvalidConfig(format!(
                "timestep must be positive, got {}",
                self.horizon.dt
            )));
        }
        if !(self.vehicle.lf > 0.0) || !self.vehicle.lf.is_finite() {
            return Err(MpcError::InvalidConfig(format!(
                "lf must be positive, got {}",
                self.vehicle.lf
            )));
        }
        if !self.reference_speed.is_finite() {
            return Err(MpcError::InvalidConfig(format!(
                "reference speed must be finite, got {}",
                self.reference_speed
            )));
        }
        for (name, weight) in self.weights.named() {
            if !(weight >= 0.0) || !weight.is_finite() {
                return Err(MpcError::InvalidConfig(format!(
                    "weight {} must be finite and non-negative, got {}",
                    name, weight
                )));
            }
        }
        for (name, limit) in [
            ("max_steering", self.bounds.max_steering),
            ("max_acceleration", self.bounds.max_acceleration),
        ] {
            if !(limit > 0.0) || !limit.is_finite() {
                return Err(MpcError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, limit
                )));
            }
        }
        self.solver.validate()?;

        if self.horizon.duration() > LONG_HORIZON_S {
            warn!(
                "Horizon of {:.2} s ({} steps) is long for a kinematic model",
                self.horizon.duration(),
                self.horizon.steps
            );
        }

        Ok(())
    }
}
