//! End-to-end design scenarios on the cart plant
//!
//! Plant: x1' = x2, x2' = -0.01 x2 + 0.1 u, y = x1.

use approx::assert_relative_eq;
use lti_design::simulation::{
    injection_index, reference_with_disturbance, simulate, SimulationOptions, TimeGrid,
};
use lti_design::synthesis::{design_integral_action, design_state_feedback, ClosedLoopSpec};
use lti_design::{StateSpaceModel, Tolerances};
use ndarray::arr2;

const INTEGRAL_GAIN: f64 = 200000.0;
const DISTURBANCE: f64 = 0.1;

fn cart_plant() -> StateSpaceModel {
    StateSpaceModel::strictly_proper(
        arr2(&[[0.0, 1.0], [0.0, -0.01]]),
        arr2(&[[0.0], [0.1]]),
        arr2(&[[1.0, 0.0]]),
    )
    .unwrap()
}

fn spec(natural_frequency: f64) -> ClosedLoopSpec {
    ClosedLoopSpec::SecondOrder {
        damping: 0.7,
        natural_frequency,
    }
}

#[test]
fn test_state_feedback_step_response() {
    let tol = Tolerances::default();
    let design = design_state_feedback(&cart_plant(), &spec(18.0), &tol).unwrap();
    assert!(design.is_clean());
    let design = design.value;

    assert_relative_eq!(design.feedback.matrix()[(0, 0)], 3240.0, max_relative = 1e-10);
    assert_relative_eq!(design.feedback.matrix()[(0, 1)], 251.9, max_relative = 1e-10);
    assert_relative_eq!(design.feedforward.scalar().unwrap(), 3240.0, max_relative = 1e-9);
    assert!(design.closed_loop.is_stable().unwrap());

    let grid = TimeGrid::new(0.0, 1.0, 1e-3).unwrap();
    let u = reference_with_disturbance(grid.len(), 1.0, 0.0, 0.5).unwrap();
    let traj = simulate(&design.tracking, &u, grid.times(), &SimulationOptions::default())
        .unwrap();

    let info = traj.step_info(0, 0.05).unwrap();
    // zeta = 0.7: ~4.6 % overshoot, 10-90 % rise ~0.119 s, 5 % settling ~0.16 s
    assert!(info.overshoot_percent < 5.0, "overshoot {}", info.overshoot_percent);
    assert!(info.overshoot_percent > 4.0);
    assert!(info.rise_time.unwrap() < 0.15, "rise {:?}", info.rise_time);
    assert!(info.settling_time < 0.2, "settling {}", info.settling_time);
    assert_relative_eq!(traj.final_output()[0], 1.0, max_relative = 1e-4);
}

#[test]
fn test_integral_action_rejects_step_disturbance() {
    let tol = Tolerances::default();
    let grid = TimeGrid::new(0.0, 2.0, 1e-3).unwrap();
    let len = grid.len();
    assert_eq!(len, 2001);
    let inject = injection_index(len, 0.5).unwrap();
    let u = reference_with_disturbance(len, 1.0, DISTURBANCE, 0.5).unwrap();

    // Proportional design keeps an offset of dcGain * d
    let plain = design_state_feedback(&cart_plant(), &spec(40.0), &tol)
        .unwrap()
        .value;
    let plain_traj =
        simulate(&plain.tracking, &u, grid.times(), &SimulationOptions::default()).unwrap();
    let offset = plain_traj.final_output()[0] - 1.0;
    // Disturbance DC gain 0.1 / 1600 for wn = 40
    assert_relative_eq!(offset, DISTURBANCE * 0.1 / 1600.0, max_relative = 1e-3);

    // Integral design returns to the reference
    let integral = design_integral_action(&cart_plant(), &spec(40.0), INTEGRAL_GAIN, &tol)
        .unwrap()
        .value;
    assert!(integral.augmented.model().is_stable().unwrap());
    assert_relative_eq!(
        integral.feedback.matrix()[(0, 0)],
        16000.0,
        max_relative = 1e-10
    );
    assert_relative_eq!(
        integral.feedback.matrix()[(0, 1)],
        559.9,
        max_relative = 1e-10
    );

    let aug_traj = simulate(
        integral.augmented.model(),
        &u,
        grid.times(),
        &SimulationOptions::default(),
    )
    .unwrap();
    let y = aug_traj.output(0).unwrap();
    assert!((y[inject - 1] - 1.0).abs() < 1e-5);
    // The disturbance knocks the output off the reference
    let excursion = y
        .iter()
        .skip(inject)
        .map(|v| (v - 1.0).abs())
        .fold(0.0, f64::max);
    assert!(excursion > 1e-7);
    assert!((aug_traj.final_output()[0] - 1.0).abs() < 1e-7);
    assert!((aug_traj.final_output()[0] - 1.0).abs() < offset.abs() / 100.0);

    assert_relative_eq!(
        integral.reference_dc_gain(&tol).unwrap().value,
        1.0,
        max_relative = 1e-9
    );
}

#[test]
fn test_non_augmented_offset_for_wn_18() {
    let tol = Tolerances::default();
    let design = design_state_feedback(&cart_plant(), &spec(18.0), &tol)
        .unwrap()
        .value;
    let grid = TimeGrid::new(0.0, 2.0, 1e-3).unwrap();
    let u = reference_with_disturbance(grid.len(), 1.0, DISTURBANCE, 0.5).unwrap();
    let traj = simulate(&design.tracking, &u, grid.times(), &SimulationOptions::default())
        .unwrap();
    let offset = traj.final_output()[0] - 1.0;
    assert_relative_eq!(offset, DISTURBANCE * 0.1 / 324.0, max_relative = 1e-3);
}

#[test]
fn test_design_is_repeatable() {
    let tol = Tolerances::default();
    let first = design_integral_action(&cart_plant(), &spec(40.0), INTEGRAL_GAIN, &tol).unwrap();
    let second = design_integral_action(&cart_plant(), &spec(40.0), INTEGRAL_GAIN, &tol).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_tolerances_from_file() {
    let path = std::env::temp_dir().join(format!("lti-design-tol-{}.toml", std::process::id()));
    std::fs::write(&path, "placement_rtol = 1e-8\nrank_rtol = 1e-12\n").unwrap();
    let tol = Tolerances::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(tol.placement_rtol, 1e-8);
    let design = design_state_feedback(&cart_plant(), &spec(18.0), &tol).unwrap();
    assert!(design.is_clean());
}
