//! Receding-horizon MPC controller
//!
//! Each call to [`MpcController::solve`] builds the problem for the current
//! state and reference path, solves it from an all-zero initial guess and
//! returns the first actuator command together with the predicted
//! trajectory. Nothing is carried over between calls.

use log::{debug, info, warn};

use super::config::MpcConfig;
use super::constraints::ConstraintAssembler;
use super::cost::CostFunction;
use super::kinematic_model::KinematicModel;
use super::layout::VariableLayout;
use super::problem::MpcProblem;
use crate::common::{
    Actuators, Controller, MpcError, MpcResult, PathModel, Path2D, Point2D, VehicleState,
};
use crate::optimization::{NlpSolution, NlpSolver, SqpSolver};

/// Result of one control cycle
#[derive(Debug, Clone, PartialEq)]
pub struct MpcSolution {
    /// Steering command to apply now [rad]
    pub steering: f64,
    /// Acceleration command to apply now [m/s^2]
    pub acceleration: f64,
    /// Predicted positions for every timestep of the horizon
    pub trajectory: Path2D,
    /// Predicted full states for every timestep of the horizon
    pub states: Vec<VehicleState>,
    /// Planned actuators for timesteps `0..N-1`
    pub plan: Vec<Actuators>,
    /// Achieved objective value
    pub cost: f64,
    /// Solver iterations used
    pub iterations: usize,
}

impl MpcSolution {
    fn from_nlp(layout: &VariableLayout, solution: NlpSolution) -> Self {
        let x = &solution.x;
        let states: Vec<VehicleState> = (0..layout.steps())
            .map(|t| layout.state_at(x, t))
            .collect();
        let plan: Vec<Actuators> = (0..layout.actuator_steps())
            .map(|t| layout.actuators_at(x, t))
            .collect();

        let mut trajectory = Path2D::with_capacity(states.len());
        for state in &states {
            trajectory.push(Point2D::new(state.x, state.y));
        }

        Self {
            steering: x[layout.delta(0)],
            acceleration: x[layout.a(0)],
            trajectory,
            states,
            plan,
            cost: solution.objective,
            iterations: solution.iterations,
        }
    }

    /// First actuator command
    pub fn actuators(&self) -> Actuators {
        Actuators::new(self.steering, self.acceleration)
    }

    /// Flat output `[steering, acceleration, x0, y0, x1, y1, ...]`
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(2 + 2 * self.trajectory.len());
        out.push(self.steering);
        out.push(self.acceleration);
        for p in &self.trajectory.points {
            out.push(p.x);
            out.push(p.y);
        }
        out
    }
}

/// Model predictive path-tracking controller
pub struct MpcController<S: NlpSolver = SqpSolver> {
    config: MpcConfig,
    layout: VariableLayout,
    model: KinematicModel,
    cost: CostFunction,
    constraints: ConstraintAssembler,
    solver: S,
}

impl MpcController<SqpSolver> {
    /// Create a controller using the SQP solver configured in `config`
    pub fn new(config: MpcConfig) -> MpcResult<Self> {
        let solver = SqpSolver::new(config.solver.clone());
        Self::with_solver(config, solver)
    }

    pub fn with_defaults() -> Self {
        let config = MpcConfig::default();
        let solver = SqpSolver::new(config.solver.clone());
        Self::assemble(config, solver)
    }

    /// Create a controller from a TOML configuration file
    pub fn from_file<F: AsRef<std::path::Path>>(path: F) -> MpcResult<Self> {
        Self::new(MpcConfig::load(path)?)
    }
}

impl<S: NlpSolver> MpcController<S> {
    /// Create a controller with a custom solver
    pub fn with_solver(config: MpcConfig, solver: S) -> MpcResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, solver))
    }

    fn assemble(config: MpcConfig, solver: S) -> Self {
        let layout = VariableLayout::new(config.horizon.steps);
        let model = KinematicModel::new(config.vehicle.lf);
        let cost = CostFunction::new(layout, config.weights.clone(), config.reference_speed);
        let constraints = ConstraintAssembler::new(layout, config.horizon.dt);

        Self { config, layout, model, cost, constraints, solver }
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn model(&self) -> &KinematicModel {
        &self.model
    }

    /// Solve one control cycle
    pub fn solve(&self, state: &VehicleState, path: &PathModel) -> MpcResult<MpcSolution> {
        if !state.is_finite() {
            return Err(MpcError::InvalidInput(format!(
                "vehicle state has non-finite components: {:?}",
                state
            )));
        }

        let problem = MpcProblem::new(&self.cost, &self.constraints, &self.model, path);
        let bounds = self.constraints.bounds(state, &self.config.bounds);
        let initial = vec![0.0; self.layout.num_variables()];

        match self.solver.solve(&problem, &bounds, &initial) {
            Ok(solution) => {
                info!("Cost {:.4}", solution.objective);
                debug!(
                    "MPC solved in {} iterations, constraint violation {:.3e}",
                    solution.iterations, solution.constraint_violation
                );
                Ok(MpcSolution::from_nlp(&self.layout, solution))
            }
            Err(failed) => {
                warn!(
                    "MPC solve failed after {} iterations: {} (objective {:.4})",
                    failed.iterations, failed.status, failed.objective
                );
                Err(failed.into())
            }
        }
    }
}

impl<S: NlpSolver> Controller for MpcController<S> {
    type State = VehicleState;
    type Reference = PathModel;
    type Output = MpcResult<MpcSolution>;

    fn compute(&mut self, state: &VehicleState, reference: &PathModel) -> MpcResult<MpcSolution> {
        self.solve(state, reference)
    }

    fn reset(&mut self) {}
}
