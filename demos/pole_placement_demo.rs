//! Demonstration of Ackermann pole placement with reference feedforward
//!
//! Designs a state-feedback loop for a lightly damped cart and prints the
//! gains, closed-loop poles and step-response metrics.

use lti_design::simulation::{reference_with_disturbance, simulate, SimulationOptions, TimeGrid};
use lti_design::synthesis::{design_state_feedback, ClosedLoopSpec};
use lti_design::{StateSpaceModel, Tolerances};
use ndarray::arr2;

fn main() {
    env_logger::init();

    println!("=== Pole Placement Demonstration ===\n");

    // x1' = x2, x2' = -0.01 x2 + 0.1 u, y = x1
    let plant = match StateSpaceModel::strictly_proper(
        arr2(&[[0.0, 1.0], [0.0, -0.01]]),
        arr2(&[[0.0], [0.1]]),
        arr2(&[[1.0, 0.0]]),
    ) {
        Ok(p) => p,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };

    println!("Plant:");
    println!("A = \n{}", plant.a());
    println!("B = \n{}", plant.b());

    let tol = Tolerances::default();
    let spec = ClosedLoopSpec::SecondOrder {
        damping: 0.7,
        natural_frequency: 18.0,
    };

    let design = match design_state_feedback(&plant, &spec, &tol) {
        Ok(d) => d,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    for w in &design.warnings {
        println!("warning: {}", w);
    }
    let design = design.value;

    println!("\n=== Controller Design Results ===");
    println!("Desired poles:");
    for p in &design.poles {
        println!("  λ = {:.4} + {:.4}i", p.re, p.im);
    }
    println!("K = {}", design.feedback.matrix());
    println!("N̄ = {}", design.feedforward.matrix());

    if let Ok(poles) = design.closed_loop.poles() {
        println!("\nActual closed-loop poles:");
        for p in poles.iter() {
            println!("  λ = {:.4} + {:.4}i", p.re, p.im);
        }
    }

    let grid = match TimeGrid::new(0.0, 1.0, 1e-3) {
        Ok(g) => g,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    let response = reference_with_disturbance(grid.len(), 1.0, 0.0, 0.5)
        .and_then(|u| simulate(&design.tracking, &u, grid.times(), &SimulationOptions::default()));

    match response.and_then(|traj| traj.step_info(0, 0.05)) {
        Ok(info) => {
            println!("\n=== Unit Step Response ===");
            if let Some(rise) = info.rise_time {
                println!("  Rise time (10-90 %): {:.4} s", rise);
            }
            println!("  Overshoot:           {:.2} %", info.overshoot_percent);
            println!("  Settling time (5 %): {:.4} s", info.settling_time);
            println!("  Steady state:        {:.6}", info.steady_state);
        }
        Err(e) => println!("Error: {}", e),
    }
}
