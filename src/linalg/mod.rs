//! Dense Matrix Routines
//!
//! Low-level helpers used by the analysis, synthesis and simulation
//! routines: SVD-based numerical rank, conditioned inversion and the
//! matrix exponential. Factorizations come from LAPACK through
//! `ndarray-linalg`.

use ndarray::{Array1, Array2};
use ndarray_linalg::{Inverse, SVD};

use crate::error::{ControlError, ControlResult};

/// Singular-value summary of a matrix used for rank decisions.
#[derive(Clone, Debug, PartialEq)]
pub struct RankReport {
    /// Numerical rank: singular values strictly above `threshold`.
    pub rank: usize,
    /// Singular values in non-increasing order.
    pub singular_values: Array1<f64>,
    /// Absolute threshold used for the rank decision.
    pub threshold: f64,
}

impl RankReport {
    /// Largest singular value (0 for an empty matrix).
    pub fn sigma_max(&self) -> f64 {
        self.singular_values.iter().copied().fold(0.0, f64::max)
    }

    /// Smallest singular value that counted towards the rank, if any.
    pub fn smallest_retained(&self) -> Option<f64> {
        if self.rank == 0 {
            None
        } else {
            Some(self.singular_values[self.rank - 1])
        }
    }

    /// `sigma_min / sigma_max` over the retained singular values.
    pub fn retained_ratio(&self) -> Option<f64> {
        let smax = self.sigma_max();
        self.smallest_retained()
            .filter(|_| smax > 0.0)
            .map(|smin| smin / smax)
    }
}

/// Singular values of `a` in non-increasing order.
pub fn singular_values(a: &Array2<f64>) -> ControlResult<Array1<f64>> {
    if a.is_empty() {
        return Ok(Array1::zeros(0));
    }
    let (_, s, _) = a.svd(false, false)?;
    Ok(s)
}

/// Numerical rank of `a` by singular value thresholding.
///
/// With `rtol = None` the threshold is `max(rows, cols) * eps * sigma_max`,
/// otherwise `rtol * sigma_max`.
///
/// # Examples
///
/// ```
/// use lti_design::linalg::numerical_rank;
/// use ndarray::arr2;
///
/// let a = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
/// let report = numerical_rank(&a, None).unwrap();
/// assert_eq!(report.rank, 1);
/// ```
pub fn numerical_rank(a: &Array2<f64>, rtol: Option<f64>) -> ControlResult<RankReport> {
    let singular_values = singular_values(a)?;
    let smax = singular_values.iter().copied().fold(0.0, f64::max);
    let dim = a.nrows().max(a.ncols()) as f64;
    let threshold = match rtol {
        Some(r) => r * smax,
        None => dim * f64::EPSILON * smax,
    };
    let rank = singular_values.iter().filter(|&&s| s > threshold).count();

    Ok(RankReport {
        rank,
        singular_values,
        threshold,
    })
}

/// Invert a square matrix after checking its conditioning.
///
/// Fails with `SingularMatrix` when the matrix is zero or
/// `sigma_min / sigma_max <= singular_rtol`. `what` names the matrix in the
/// error message.
pub fn inverse_checked(
    a: &Array2<f64>,
    singular_rtol: f64,
    what: &str,
) -> ControlResult<Array2<f64>> {
    if a.nrows() != a.ncols() {
        return Err(ControlError::Dimension(format!(
            "{} must be square to be inverted, got {}×{}",
            what,
            a.nrows(),
            a.ncols()
        )));
    }

    let s = singular_values(a)?;
    let smax = s.iter().copied().fold(0.0, f64::max);
    let smin = s.iter().copied().fold(f64::INFINITY, f64::min);
    if !(smax > 0.0) || smin / smax <= singular_rtol {
        return Err(ControlError::SingularMatrix(format!(
            "{} is singular (sigma_min = {:e}, sigma_max = {:e})",
            what, smin, smax
        )));
    }

    Ok(a.inv()?)
}

/// Induced 1-norm (maximum absolute column sum).
pub fn one_norm(a: &Array2<f64>) -> f64 {
    a.columns()
        .into_iter()
        .map(|col| col.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Largest absolute entry (0 for an empty matrix).
pub fn max_abs(a: &Array2<f64>) -> f64 {
    a.iter().map(|x| x.abs()).fold(0.0, f64::max)
}

// Padé numerator coefficients b_0..b_m for the diagonal [m/m] approximant of exp.
const PADE_3: [f64; 4] = [120.0, 60.0, 12.0, 1.0];
const PADE_5: [f64; 6] = [30240.0, 15120.0, 3360.0, 420.0, 30.0, 1.0];
const PADE_7: [f64; 8] = [
    17297280.0, 8648640.0, 1995840.0, 277200.0, 25200.0, 1512.0, 56.0, 1.0,
];
const PADE_9: [f64; 10] = [
    17643225600.0,
    8821612800.0,
    2075673600.0,
    302702400.0,
    30270240.0,
    2162160.0,
    110880.0,
    3960.0,
    90.0,
    1.0,
];
const PADE_13: [f64; 14] = [
    64764752532480000.0,
    32382376266240000.0,
    7771770303897600.0,
    1187353796428800.0,
    129060195264000.0,
    10559470521600.0,
    670442572800.0,
    33522128640.0,
    1323241920.0,
    40840800.0,
    960960.0,
    16380.0,
    182.0,
    1.0,
];

// Largest 1-norm for which each approximant meets double precision (Higham 2005).
const THETA_3: f64 = 1.495585217958292e-2;
const THETA_5: f64 = 2.539398330063230e-1;
const THETA_7: f64 = 9.504178996162932e-1;
const THETA_9: f64 = 2.097847961257068e0;
const THETA_13: f64 = 5.371920351148152e0;

/// Matrix exponential by scaling and squaring with Padé approximation.
///
/// Chooses the lowest Padé degree (3, 5, 7, 9 or 13) whose accuracy bound
/// covers `||A||_1`; above `THETA_13` the matrix is scaled by `2^-s`, the
/// degree-13 approximant is evaluated, and the result squared `s` times.
///
/// # Examples
///
/// ```
/// use lti_design::linalg::expm;
/// use ndarray::arr2;
///
/// // Nilpotent: exp([[0, t], [0, 0]]) = [[1, t], [0, 1]]
/// let e = expm(&arr2(&[[0.0, 0.5], [0.0, 0.0]])).unwrap();
/// assert!((e[(0, 1)] - 0.5).abs() < 1e-15);
/// assert!((e[(0, 0)] - 1.0).abs() < 1e-15);
/// ```
///
/// # References
///
/// N. J. Higham, "The scaling and squaring method for the matrix exponential
/// revisited", SIAM J. Matrix Anal. Appl. 26(4), 2005.
pub fn expm(a: &Array2<f64>) -> ControlResult<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(ControlError::Dimension(format!(
            "matrix exponential needs a square matrix, got {}×{}",
            n,
            a.ncols()
        )));
    }
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if a.iter().any(|x| !x.is_finite()) {
        return Err(ControlError::InvalidParameter(
            "matrix exponential of a matrix with non-finite entries".to_string(),
        ));
    }

    let norm = one_norm(a);
    if norm <= THETA_3 {
        return pade_approximant(a, &PADE_3);
    }
    if norm <= THETA_5 {
        return pade_approximant(a, &PADE_5);
    }
    if norm <= THETA_7 {
        return pade_approximant(a, &PADE_7);
    }
    if norm <= THETA_9 {
        return pade_approximant(a, &PADE_9);
    }

    let s = (norm / THETA_13).log2().ceil().max(0.0) as i32;
    let scaled = a / 2f64.powi(s);
    let mut result = pade_approximant(&scaled, &PADE_13)?;
    for _ in 0..s {
        result = result.dot(&result);
    }
    Ok(result)
}

/// Evaluate the diagonal Padé approximant r(A) = q(A)^-1 p(A).
///
/// With even/odd splitting p(A) = V + U, q(A) = V - U where
/// U = A * sum b_{2k+1} A^{2k} and V = sum b_{2k} A^{2k}.
fn pade_approximant(a: &Array2<f64>, b: &[f64]) -> ControlResult<Array2<f64>> {
    let n = a.nrows();
    let a2 = a.dot(a);

    let mut u_inner = Array2::<f64>::zeros((n, n));
    let mut v = Array2::<f64>::zeros((n, n));
    let mut power = Array2::<f64>::eye(n);

    for k in 0..(b.len() + 1) / 2 {
        v.scaled_add(b[2 * k], &power);
        if 2 * k + 1 < b.len() {
            u_inner.scaled_add(b[2 * k + 1], &power);
        }
        if 2 * k + 2 < b.len() {
            power = power.dot(&a2);
        }
    }

    let u = a.dot(&u_inner);
    let p = &v + &u;
    let q = &v - &u;

    Ok(q.inv()?.dot(&p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_rank_full() {
        let a = arr2(&[[1.0, 0.0], [0.0, 2.0]]);
        let report = numerical_rank(&a, None).unwrap();
        assert_eq!(report.rank, 2);
        assert_abs_diff_eq!(report.sigma_max(), 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(report.retained_ratio().unwrap(), 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_rank_zero_matrix() {
        let a = Array2::<f64>::zeros((3, 2));
        let report = numerical_rank(&a, None).unwrap();
        assert_eq!(report.rank, 0);
        assert_eq!(report.smallest_retained(), None);
        assert_eq!(report.retained_ratio(), None);
    }

    #[test]
    fn test_rank_relative_tolerance() {
        let a = arr2(&[[1.0, 0.0], [0.0, 1e-8]]);
        assert_eq!(numerical_rank(&a, None).unwrap().rank, 2);
        assert_eq!(numerical_rank(&a, Some(1e-6)).unwrap().rank, 1);
    }

    #[test]
    fn test_rank_rectangular() {
        let a = arr2(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]]);
        assert_eq!(numerical_rank(&a, None).unwrap().rank, 1);
    }

    #[test]
    fn test_inverse_checked() {
        let a = arr2(&[[2.0, 0.0], [0.0, 4.0]]);
        let inv = inverse_checked(&a, 1e-13, "A").unwrap();
        assert_abs_diff_eq!(inv[(0, 0)], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(inv[(1, 1)], 0.25, epsilon = 1e-15);
    }

    #[test]
    fn test_inverse_checked_singular() {
        let a = arr2(&[[0.0, 1.0], [0.0, -0.01]]);
        let err = inverse_checked(&a, 1e-13, "A").unwrap_err();
        assert!(matches!(err, ControlError::SingularMatrix(_)));
        assert!(err.to_string().contains("A is singular"));
    }

    #[test]
    fn test_inverse_checked_zero() {
        let a = Array2::<f64>::zeros((1, 1));
        assert!(matches!(
            inverse_checked(&a, 1e-13, "gain"),
            Err(ControlError::SingularMatrix(_))
        ));
    }

    #[test]
    fn test_inverse_checked_not_square() {
        let a = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            inverse_checked(&a, 1e-13, "gain"),
            Err(ControlError::Dimension(_))
        ));
    }

    #[test]
    fn test_one_norm_and_max_abs() {
        let a = arr2(&[[1.0, -4.0], [-2.0, 3.0]]);
        assert_eq!(one_norm(&a), 7.0);
        assert_eq!(max_abs(&a), 4.0);
    }

    #[test]
    fn test_expm_zero_is_identity() {
        let e = expm(&Array2::zeros((3, 3))).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(e[(i, j)], expected, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_expm_diagonal_all_degrees() {
        // Norms chosen to hit every Padé branch including scaling and squaring
        for &d in &[0.01, 0.2, 0.9, 2.0, 5.0, 40.0] {
            let a = arr2(&[[-d, 0.0], [0.0, 0.5 * d]]);
            let e = expm(&a).unwrap();
            assert_abs_diff_eq!(e[(0, 0)], (-d).exp(), epsilon = 1e-14);
            assert_abs_diff_eq!(e[(1, 1)] / (0.5 * d).exp(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(e[(0, 1)], 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_expm_rotation() {
        // exp([[0, w], [-w, 0]]) = [[cos w, sin w], [-sin w, cos w]]
        let w = 3.0;
        let e = expm(&arr2(&[[0.0, w], [-w, 0.0]])).unwrap();
        assert_abs_diff_eq!(e[(0, 0)], w.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(e[(0, 1)], w.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(e[(1, 0)], -w.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(e[(1, 1)], w.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_expm_jordan_block() {
        // exp([[l, 1], [0, l]]) = e^l [[1, 1], [0, 1]]
        let l = -1.5;
        let e = expm(&arr2(&[[l, 1.0], [0.0, l]])).unwrap();
        assert_abs_diff_eq!(e[(0, 0)], l.exp(), epsilon = 1e-14);
        assert_abs_diff_eq!(e[(0, 1)], l.exp(), epsilon = 1e-14);
        assert_abs_diff_eq!(e[(1, 0)], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_expm_rejects_non_square() {
        assert!(matches!(
            expm(&Array2::zeros((2, 3))),
            Err(ControlError::Dimension(_))
        ));
    }

    #[test]
    fn test_expm_rejects_nan() {
        let a = arr2(&[[f64::NAN, 0.0], [0.0, 1.0]]);
        assert!(matches!(expm(&a), Err(ControlError::InvalidParameter(_))));
    }
}
