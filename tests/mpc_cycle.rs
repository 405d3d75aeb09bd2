use approx::assert_relative_eq;

use vehicle_mpc::common::{Actuators, MpcError, PathModel, VehicleState};
use vehicle_mpc::path_tracking::mpc::{MpcConfig, MpcController};

fn controller() -> MpcController {
    MpcController::new(MpcConfig::default().with_time_limit(10.0))
        .expect("default configuration should be valid")
}

#[test]
fn straight_road_accelerates_without_steering() {
    let state = VehicleState::new(0.0, 0.0, 0.0, 50.0, 0.0, 0.0);
    let path = PathModel::new(&[0.0, 0.0, 0.0, 0.0]).expect("valid coefficients");

    let out = controller().solve(&state, &path).expect("solve should succeed").to_vec();

    assert_eq!(out.len(), 22);
    assert_relative_eq!(out[0], 0.0, epsilon = 1e-4);
    assert_relative_eq!(out[1], 1.0, epsilon = 1e-4);
    // first predicted point is the measured position
    assert_relative_eq!(out[2], 0.0, epsilon = 1e-6);
    assert_relative_eq!(out[3], 0.0, epsilon = 1e-6);
    // second one is 50 m/s * 0.1 s further
    assert_relative_eq!(out[4], 5.0, epsilon = 1e-5);
}

#[test]
fn closed_loop_reduces_cross_track_error() {
    let ctrl = controller();
    let model = *ctrl.model();
    let path = PathModel::straight();
    let mut state = VehicleState::new(0.0, -1.0, 0.0, 10.0, 1.0, 0.0);

    for _ in 0..30 {
        let solution = ctrl.solve(&state, &path).expect("solve should succeed");
        state = model.predict(&state, &solution.actuators(), &path, 0.1);
        // tracking errors against a straight line at y = 0
        state.cte = -state.y;
        state.epsi = state.psi;
    }

    assert!(state.cte.abs() < 0.2, "cte = {}", state.cte);
    assert!(state.v > 10.0);
}

#[test]
fn invalid_inputs_are_rejected_before_solving() {
    assert!(matches!(
        PathModel::new(&[0.0, 1.0]),
        Err(MpcError::InvalidPathModel(_))
    ));
    assert!(matches!(
        MpcController::new(MpcConfig::default().with_horizon(1, 0.1)),
        Err(MpcError::InvalidConfig(_))
    ));

    let state = VehicleState::new(0.0, 0.0, f64::INFINITY, 10.0, 0.0, 0.0);
    assert!(matches!(
        controller().solve(&state, &PathModel::straight()),
        Err(MpcError::InvalidInput(_))
    ));
}

#[test]
fn applied_command_matches_first_plan_step() {
    let state = VehicleState::new(0.0, 0.5, 0.05, 15.0, -0.5, 0.05);
    let solution = controller()
        .solve(&state, &PathModel::straight())
        .expect("solve should succeed");

    let first: Actuators = solution.plan[0];
    assert_eq!(first, solution.actuators());
    assert_eq!(solution.plan.len(), 9);
    assert_eq!(solution.states.len(), 10);
}
