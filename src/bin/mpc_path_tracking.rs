// Path tracking simulation with model predictive control.
//
// A vehicle follows a cubic reference path. Every cycle the MPC plans over a
// short horizon and the first command is applied to the simulated vehicle
// with some actuation noise.
//
// Usage: mpc_path_tracking [config.toml]
//
// Set RUST_LOG=debug for per-iteration solver output.

use std::error::Error;

use log::{error, info};
use rand_distr::{Distribution, Normal};

use vehicle_mpc::common::{Actuators, PathModel, Path2D, Point2D, VehicleState};
use vehicle_mpc::path_tracking::mpc::{MpcConfig, MpcController};
use vehicle_mpc::utils::visualization::{colors, PathStyle, PointStyle, Visualizer};

// Simulation parameters
const SIM_STEPS: usize = 150;
const DT: f64 = 0.1; // plant timestep [s]
const TARGET_SPEED: f64 = 20.0; // [m/s], used when no config file is given

// Actuation noise (standard deviation)
const STEER_NOISE: f64 = 0.01; // [rad]
const ACCEL_NOISE: f64 = 0.05; // [m/ss]

const REFERENCE_COEFFS: [f64; 4] = [2.0, 0.02, 4.0e-4, -1.0e-6];

const SHOW_ANIMATION: bool = false;
const PLOT_PATH: &str = "./img/path_tracking/mpc_path_tracking.svg";

/// Recompute the tracking errors of `state` against the path
fn with_tracking_errors(mut state: VehicleState, path: &PathModel) -> VehicleState {
    state.cte = path.eval(state.x) - state.y;
    state.epsi = state.psi - path.heading(state.x);
    state
}

fn reference_path(path: &PathModel, x_max: f64) -> Path2D {
    let mut reference = Path2D::new();
    let n = 200;
    for i in 0..=n {
        let x = x_max * i as f64 / n as f64;
        reference.push(Point2D::new(x, path.eval(x)));
    }
    reference
}

fn plot(
    vis: &mut Visualizer,
    reference: &Path2D,
    driven: &Path2D,
    prediction: Option<&Path2D>,
    state: &VehicleState,
) {
    vis.clear();
    vis.plot_path(reference, &PathStyle::new(colors::REFERENCE, "Reference").with_line_width(1.0));
    vis.plot_path(driven, &PathStyle::new(colors::DRIVEN, "Driven"));
    if let Some(prediction) = prediction {
        vis.plot_path(prediction, &PathStyle::new(colors::PREDICTION, "MPC prediction"));
    }
    if let Some(start) = driven.points.first() {
        vis.plot_point(
            *start,
            &PointStyle::new(colors::START, "Start").with_symbol('S').with_size(1.5),
        );
    }
    vis.plot_vehicle(state, 2.0);
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            MpcConfig::load(path)?
        }
        None => MpcConfig::default().with_reference_speed(TARGET_SPEED),
    };
    let controller = MpcController::new(config)?;
    let model = *controller.model();

    let path = PathModel::new(&REFERENCE_COEFFS)?;
    let steer_noise = Normal::new(0.0, STEER_NOISE)?;
    let accel_noise = Normal::new(0.0, ACCEL_NOISE)?;
    let mut rng = rand::thread_rng();

    let mut state = with_tracking_errors(VehicleState::new(0.0, 0.0, 0.0, 5.0, 0.0, 0.0), &path);
    let mut command = Actuators::zero();
    let mut driven = Path2D::with_capacity(SIM_STEPS + 1);
    driven.push(state.position());
    let mut prediction: Option<Path2D> = None;
    let mut failures = 0;
    let mut vis = Visualizer::new();

    info!("MPC path tracking simulation start");

    for step in 0..SIM_STEPS {
        match controller.solve(&state, &path) {
            Ok(solution) => {
                command = solution.actuators();
                prediction = Some(solution.trajectory);
            }
            Err(e) => {
                // keep applying the previous command
                failures += 1;
                error!("Step {}: {}", step, e);
            }
        }

        let applied = Actuators::new(
            command.steering + steer_noise.sample(&mut rng),
            command.acceleration + accel_noise.sample(&mut rng),
        );
        state = with_tracking_errors(model.predict(&state, &applied, &path, DT), &path);
        driven.push(state.position());

        if step % 10 == 0 {
            info!(
                "t = {:5.1} s  x = {:7.2}  v = {:5.2}  cte = {:6.3}  epsi = {:6.3}  steer = {:6.3}",
                (step + 1) as f64 * DT,
                state.x,
                state.v,
                state.cte,
                state.epsi,
                command.steering
            );
        }

        if SHOW_ANIMATION && step % 5 == 0 {
            let reference = reference_path(&path, state.x + 30.0);
            plot(&mut vis, &reference, &driven, prediction.as_ref(), &state);
            if let Err(e) = vis.show() {
                error!("Failed to show plot: {}", e);
            }
        }
    }

    info!(
        "Simulation completed: x = {:.2}, v = {:.2}, cte = {:.3}, {} failed solves",
        state.x, state.v, state.cte, failures
    );

    let reference = reference_path(&path, state.x + 10.0);
    vis.set_title("MPC path tracking");
    plot(&mut vis, &reference, &driven, prediction.as_ref(), &state);
    std::fs::create_dir_all("./img/path_tracking")?;
    match vis.save_svg(PLOT_PATH) {
        Ok(()) => info!("Plot saved to {}", PLOT_PATH),
        Err(e) => error!("Failed to save plot: {}", e),
    }

    Ok(())
}
