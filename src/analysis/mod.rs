//! Analysis Routines
//!
//! Structural and steady-state properties of a [`StateSpaceModel`]:
//! controllability (and, by duality, observability), DC gain and pole
//! locations.
//!
//! Rank decisions use singular value thresholding on the controllability
//! matrix rather than determinants, and report near-singular cases as
//! warnings instead of collapsing them into a boolean.

use ndarray::{s, Array1, Array2};
use ndarray_linalg::EigVals;
use num_complex::Complex64;

use crate::config::Tolerances;
use crate::diagnostics::{Checked, Warning};
use crate::error::{ControlError, ControlResult};
use crate::linalg::{inverse_checked, numerical_rank, singular_values, RankReport};
use crate::model::StateSpaceModel;

/// Outcome of a tolerant rank test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankVerdict {
    /// Full rank and well separated from singularity.
    Full,
    /// Full rank, but `sigma_min / sigma_max` is within the near-singular tolerance.
    NearSingular,
    /// Rank deficient.
    Deficient,
}

/// Controllability analysis of a pair (A, B).
#[derive(Clone, Debug, PartialEq)]
pub struct ControllabilityReport {
    /// State dimension n.
    pub order: usize,
    /// Numerical rank of `[B, AB, ..., A^(n-1) B]`.
    pub rank: usize,
    pub verdict: RankVerdict,
    /// Singular values of the controllability matrix, threshold and rank.
    pub svd: RankReport,
}

impl ControllabilityReport {
    /// Classify a controllability (or observability) matrix of a system of order `order`.
    pub fn from_matrix(matrix: &Array2<f64>, order: usize, tol: &Tolerances) -> ControlResult<Self> {
        let svd = numerical_rank(matrix, tol.rank_rtol)?;
        let rank = svd.rank.min(order);
        let verdict = if rank < order {
            RankVerdict::Deficient
        } else if svd
            .retained_ratio()
            .is_some_and(|r| r <= tol.near_singular_rtol)
        {
            RankVerdict::NearSingular
        } else {
            RankVerdict::Full
        };

        Ok(Self {
            order,
            rank,
            verdict,
            svd,
        })
    }

    /// Number of uncontrollable modes, n - rank.
    pub fn uncontrollable_count(&self) -> usize {
        self.order.saturating_sub(self.rank)
    }

    /// The `NearSingular` warning for this report, if its verdict calls for one.
    pub fn warning(&self, context: &'static str, tol: &Tolerances) -> Option<Warning> {
        if self.verdict != RankVerdict::NearSingular {
            return None;
        }
        let smin = self.svd.smallest_retained().unwrap_or(0.0);
        Some(Warning::NearSingular {
            context,
            smallest_singular_value: smin,
            relative: self.svd.retained_ratio().unwrap_or(0.0),
            threshold: tol.near_singular_rtol,
        })
    }
}

/// Build the controllability matrix `[B, AB, A^2 B, ..., A^(n-1) B]`.
///
/// # Arguments
///
/// * `a` - N×N state matrix
/// * `b` - N×M input matrix
///
/// # Returns
///
/// The N×(N·M) controllability matrix, or `Dimension` if A is not square
/// or B does not have N rows.
///
/// # Examples
///
/// ```
/// use lti_design::analysis::controllability_matrix;
/// use ndarray::arr2;
///
/// let a = arr2(&[[0.0, 1.0], [0.0, -0.01]]);
/// let b = arr2(&[[0.0], [0.1]]);
/// let ctrb = controllability_matrix(&a, &b).unwrap();
/// assert_eq!(ctrb[(0, 1)], 0.1);
/// ```
pub fn controllability_matrix(a: &Array2<f64>, b: &Array2<f64>) -> ControlResult<Array2<f64>> {
    let n = a.nrows();
    let m = b.ncols();

    if a.ncols() != n {
        return Err(ControlError::Dimension(format!(
            "A must be square, got {}×{}",
            n,
            a.ncols()
        )));
    }
    if b.nrows() != n {
        return Err(ControlError::Dimension(format!(
            "B must have {} rows, got {}",
            n,
            b.nrows()
        )));
    }

    let mut ctrb = Array2::zeros((n, n * m));
    if n == 0 {
        return Ok(ctrb);
    }

    // Block k holds A^k B
    let mut block = b.clone();
    ctrb.slice_mut(s![.., 0..m]).assign(&block);
    for k in 1..n {
        block = a.dot(&block);
        ctrb.slice_mut(s![.., k * m..(k + 1) * m]).assign(&block);
    }

    Ok(ctrb)
}

impl StateSpaceModel {
    /// Controllability matrix `[B, AB, ..., A^(n-1) B]` (n × nm).
    pub fn controllability_matrix(&self) -> ControlResult<Array2<f64>> {
        controllability_matrix(self.a(), self.b())
    }

    /// Full controllability analysis (rank, singular values, verdict).
    pub fn controllability(&self, tol: &Tolerances) -> ControlResult<ControllabilityReport> {
        let ctrb = self.controllability_matrix()?;
        ControllabilityReport::from_matrix(&ctrb, self.order(), tol)
    }

    /// True iff the controllability matrix has numerical rank n.
    ///
    /// A controllability matrix that is full rank but close to singular
    /// yields `true` with a `NearSingular` warning attached.
    ///
    /// # Examples
    ///
    /// ```
    /// use lti_design::config::Tolerances;
    /// use lti_design::model::StateSpaceModel;
    /// use ndarray::arr2;
    ///
    /// let plant = StateSpaceModel::strictly_proper(
    ///     arr2(&[[-1.0, 0.0], [0.0, -2.0]]),
    ///     arr2(&[[1.0], [0.0]]),
    ///     arr2(&[[1.0, 1.0]]),
    /// )
    /// .unwrap();
    /// // The second mode is not reachable from the input
    /// let checked = plant.is_controllable(&Tolerances::default()).unwrap();
    /// assert!(!checked.value);
    /// ```
    pub fn is_controllable(&self, tol: &Tolerances) -> ControlResult<Checked<bool>> {
        let report = self.controllability(tol)?;
        let mut checked = Checked::new(report.verdict != RankVerdict::Deficient);
        if let Some(w) = report.warning("controllability matrix", tol) {
            checked.push(w);
        }
        Ok(checked)
    }

    /// Observability matrix `[C; CA; ...; C A^(n-1)]` (np × n).
    pub fn observability_matrix(&self) -> ControlResult<Array2<f64>> {
        let at = self.a().t().to_owned();
        let ct = self.c().t().to_owned();
        Ok(controllability_matrix(&at, &ct)?.reversed_axes())
    }

    /// True iff the observability matrix has numerical rank n.
    pub fn is_observable(&self, tol: &Tolerances) -> ControlResult<Checked<bool>> {
        let obsv = self.observability_matrix()?;
        let report = ControllabilityReport::from_matrix(&obsv, self.order(), tol)?;
        let mut checked = Checked::new(report.verdict != RankVerdict::Deficient);
        if let Some(w) = report.warning("observability matrix", tol) {
            checked.push(w);
        }
        Ok(checked)
    }

    /// Steady-state gain `C (-A)^-1 B + D` (p × m).
    ///
    /// Fails with `SingularMatrix` when A is singular, e.g. when the system
    /// has an integrator pole at the origin and no finite DC gain. An A that
    /// is invertible but poorly conditioned yields a `NearSingular` warning.
    pub fn dc_gain(&self, tol: &Tolerances) -> ControlResult<Checked<Array2<f64>>> {
        let neg_a = self.a().mapv(|v| -v);
        let inv = inverse_checked(&neg_a, tol.singular_rtol, "state matrix A")?;
        let gain = self.c().dot(&inv).dot(self.b()) + self.d();

        let mut checked = Checked::new(gain);
        let s = singular_values(&neg_a)?;
        let smax = s[0];
        let smin = s[s.len() - 1];
        if smin / smax <= tol.near_singular_rtol {
            checked.push(Warning::NearSingular {
                context: "state matrix A",
                smallest_singular_value: smin,
                relative: smin / smax,
                threshold: tol.near_singular_rtol,
            });
        }
        Ok(checked)
    }

    /// Eigenvalues of A.
    pub fn poles(&self) -> ControlResult<Array1<Complex64>> {
        Ok(self.a().eigvals()?)
    }

    /// True when every pole has a strictly negative real part.
    pub fn is_stable(&self) -> ControlResult<bool> {
        Ok(self.poles()?.iter().all(|p| p.re < 0.0))
    }
}
