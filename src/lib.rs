//! lti-design: state-feedback design for linear time-invariant systems
//!
//! Given a plant `x' = Ax + Bu, y = Cx + Du`, this crate checks
//! controllability, places closed-loop poles with Ackermann's formula,
//! computes reference feedforward from the closed-loop DC gain, augments the
//! loop with integral action and simulates the result under zero-order hold.
//!
//! # Organization
//!
//! - `model`: the [`StateSpaceModel`] value type
//! - `analysis`: controllability, observability, DC gain, poles
//! - `synthesis`: pole placement, feedforward, integrator augmentation and
//!   end-to-end design pipelines
//! - `simulation`: time grids, piecewise-constant signals, ZOH
//!   discretization, trajectories and step metrics
//! - `polynomial`, `linalg`: characteristic polynomials, matrix exponential,
//!   numerical rank
//! - `config`, `diagnostics`, `error`: tolerances, warnings, errors
//!
//! # Example
//!
//! ```
//! use lti_design::config::Tolerances;
//! use lti_design::model::StateSpaceModel;
//! use lti_design::synthesis::{design_state_feedback, ClosedLoopSpec};
//! use ndarray::arr2;
//!
//! let plant = StateSpaceModel::strictly_proper(
//!     arr2(&[[0.0, 1.0], [0.0, -0.01]]),
//!     arr2(&[[0.0], [0.1]]),
//!     arr2(&[[1.0, 0.0]]),
//! )
//! .unwrap();
//! let spec = ClosedLoopSpec::SecondOrder { damping: 0.7, natural_frequency: 18.0 };
//! let design = design_state_feedback(&plant, &spec, &Tolerances::default()).unwrap();
//! assert!(design.is_clean());
//! assert!((design.value.feedback.matrix()[(0, 0)] - 3240.0).abs() < 1e-6);
//! ```

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod linalg;
pub mod model;
pub mod polynomial;
pub mod simulation;
pub mod synthesis;

pub use config::Tolerances;
pub use diagnostics::{Checked, Warning};
pub use error::{ControlError, ControlResult};
pub use model::StateSpaceModel;
