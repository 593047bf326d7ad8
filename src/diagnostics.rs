//! Non-fatal numerical diagnostics
//!
//! Every design routine returns its artifact wrapped in [`Checked`], which
//! carries the conditioning warnings raised while computing it. A caller
//! running automated sweeps can reject a design with `!checked.is_clean()`
//! without parsing error strings.

use std::fmt;

/// Conditioning concern attached to an otherwise successful result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A matrix passed the rank test but its smallest singular value is
    /// within `threshold` (relative to the largest) of zero.
    NearSingular {
        context: &'static str,
        smallest_singular_value: f64,
        relative: f64,
        threshold: f64,
    },
    /// A computed quantity deviates from its exact counterpart by more than
    /// the configured tolerance (imaginary gain residue, misplaced poles).
    NumericalTolerance {
        context: &'static str,
        residue: f64,
        tolerance: f64,
    },
    /// The plant has a direct feedthrough term while the design assumes a
    /// strictly proper plant.
    NonZeroFeedthrough { max_abs: f64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NearSingular {
                context,
                smallest_singular_value,
                relative,
                threshold,
            } => write!(
                f,
                "{} is near singular: sigma_min = {:e} (relative {:e} <= {:e})",
                context, smallest_singular_value, relative, threshold
            ),
            Warning::NumericalTolerance {
                context,
                residue,
                tolerance,
            } => write!(
                f,
                "{}: residue {:e} exceeds tolerance {:e}",
                context, residue, tolerance
            ),
            Warning::NonZeroFeedthrough { max_abs } => write!(
                f,
                "plant has nonzero feedthrough D (max |d_ij| = {:e}); design assumes D = 0",
                max_abs
            ),
        }
    }
}

/// A computed value together with the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Checked<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// True when no warning was raised.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Checked<U> {
        Checked {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Warning>) {
        (self.value, self.warnings)
    }
}
