//! Error types for design and simulation routines
//!
//! Structural failures (shape mismatches, uncontrollable plants, singular
//! DC gains, malformed grids) abort the requested operation with a
//! [`ControlError`]. Conditioning concerns are not errors; they travel with
//! the result as [`Warning`](crate::diagnostics::Warning)s.

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Root error type for all routines in this crate.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Incompatible matrix or signal shapes.
    #[error("dimension error: {0}")]
    Dimension(String),

    /// Pole placement requested on a plant whose controllability matrix is rank deficient.
    #[error("uncontrollable system: controllability matrix has rank {rank}, state order is {order}")]
    UncontrollableSystem { rank: usize, order: usize },

    /// A matrix that must be inverted is singular (DC gain, feedforward, ZOH inverse formula).
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// Desired poles are not closed under complex conjugation.
    #[error("complex gain: {0}")]
    ComplexGain(String),

    /// Simulation time grid is not strictly increasing with a uniform step.
    #[error("unsupported grid: {0}")]
    UnsupportedGrid(String),

    /// Out-of-range scalar parameter (damping ratio, frequency, step, fraction, tolerance).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tolerance configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// LAPACK-backed routine failed.
    #[error("linear algebra error: {0}")]
    Linalg(#[from] LinalgError),
}

pub type ControlResult<T> = Result<T, ControlError>;
