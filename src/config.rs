//! Numerical tolerances shared by the analysis, synthesis and simulation routines

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Thresholds used for rank decisions and conditioning diagnostics.
///
/// All thresholds are relative: singular values are compared against the
/// largest singular value of the same matrix, pole errors against the pole
/// magnitude. Missing keys in a TOML file fall back to [`Default`].
///
/// ```
/// use lti_design::config::Tolerances;
///
/// let tol = Tolerances::from_toml_str("placement_rtol = 1e-8").unwrap();
/// assert_eq!(tol.placement_rtol, 1e-8);
/// assert_eq!(tol.grid_rtol, Tolerances::default().grid_rtol);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Relative rank threshold. `None` uses `max(rows, cols) * eps * sigma_max`.
    pub rank_rtol: Option<f64>,

    /// A full-rank matrix whose `sigma_min / sigma_max` is at or below this
    /// raises a `NearSingular` warning.
    /// Default: 1e-10.
    pub near_singular_rtol: f64,

    /// `sigma_min / sigma_max` at or below which a matrix is treated as
    /// singular when it must be inverted (DC gain, ZOH inverse formula).
    /// Default: 1e-13.
    pub singular_rtol: f64,

    /// Relative distance within which two poles count as a conjugate pair,
    /// and below which an imaginary part counts as zero.
    /// Default: 1e-9.
    pub conjugate_rtol: f64,

    /// Largest tolerated `|Im K| / |Re K|` before a `NumericalTolerance`
    /// warning is attached to a gain.
    /// Default: 1e-9.
    pub gain_residue_rtol: f64,

    /// Relative error allowed between the requested poles and eig(A - BK).
    /// A pole requested m times is held to this bound on the mean of its
    /// m eigenvalues and to its m-th root on each one.
    /// Default: 1e-6.
    pub placement_rtol: f64,

    /// Relative deviation allowed between consecutive grid steps.
    /// Default: 1e-9.
    pub grid_rtol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            rank_rtol: None,
            near_singular_rtol: 1e-10,
            singular_rtol: 1e-13,
            conjugate_rtol: 1e-9,
            gain_residue_rtol: 1e-9,
            placement_rtol: 1e-6,
            grid_rtol: 1e-9,
        }
    }
}

impl Tolerances {
    /// Parse tolerances from a TOML document and validate them.
    pub fn from_toml_str(s: &str) -> ControlResult<Self> {
        let tol: Tolerances = toml::from_str(s).map_err(|e| ControlError::Config(e.to_string()))?;
        tol.validate()?;
        Ok(tol)
    }

    /// Read and parse a TOML tolerance file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ControlResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> ControlResult<()> {
        if let Some(r) = self.rank_rtol {
            if !(r > 0.0 && r < 1.0) {
                return Err(ControlError::Config(format!(
                    "rank_rtol must be in (0, 1), got {}",
                    r
                )));
            }
        }

        let positive = [
            ("near_singular_rtol", self.near_singular_rtol),
            ("singular_rtol", self.singular_rtol),
            ("conjugate_rtol", self.conjugate_rtol),
            ("gain_residue_rtol", self.gain_residue_rtol),
            ("placement_rtol", self.placement_rtol),
            ("grid_rtol", self.grid_rtol),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ControlError::Config(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }

        if self.singular_rtol > self.near_singular_rtol {
            return Err(ControlError::Config(format!(
                "singular_rtol ({}) must not exceed near_singular_rtol ({})",
                self.singular_rtol, self.near_singular_rtol
            )));
        }

        Ok(())
    }
}
