//! Polynomial Routines
//!
//! Characteristic polynomials built from pole sets, the conjugate-closure
//! check that guarantees real coefficients, and matrix polynomial
//! evaluation by Horner's scheme.
//!
//! Coefficients are stored in **increasing** powers of s:
//! ```text
//! P(s) = c[0] + c[1]*s + ... + c[n]*s^n
//! ```

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{ControlError, ControlResult};

/// Monic characteristic polynomial of a pole set.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacteristicPolynomial {
    /// Real coefficients in increasing powers; `coeffs[n] == 1.0`.
    pub coeffs: Vec<f64>,
    /// Imaginary parts left over by complex arithmetic, same layout as
    /// `coeffs`. Zero up to rounding for a conjugate-closed pole set.
    pub imag_residue: Vec<f64>,
}

impl CharacteristicPolynomial {
    /// Degree of the polynomial (number of poles).
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Largest `|imag|` relative to the largest `|real|` coefficient.
    pub fn relative_residue(&self) -> f64 {
        let re = self.coeffs.iter().map(|c| c.abs()).fold(0.0, f64::max);
        let im = self.imag_residue.iter().map(|c| c.abs()).fold(0.0, f64::max);
        if re > 0.0 {
            im / re
        } else {
            im
        }
    }
}

/// Check that non-real poles occur in conjugate pairs.
///
/// Two poles pair up when `|p_j - conj(p_i)| <= rtol * max(|p_i|, 1)`;
/// a pole whose imaginary part is within the same bound counts as real.
pub fn check_conjugate_closure(poles: &[Complex64], rtol: f64) -> ControlResult<()> {
    if let Some(p) = poles.iter().find(|p| !(p.re.is_finite() && p.im.is_finite())) {
        return Err(ControlError::InvalidParameter(format!(
            "pole {} is not finite",
            p
        )));
    }

    let mut paired = vec![false; poles.len()];
    for i in 0..poles.len() {
        if paired[i] {
            continue;
        }
        let p = poles[i];
        let tol = rtol * p.norm().max(1.0);
        paired[i] = true;

        if p.im.abs() <= tol {
            continue;
        }

        let partner =
            (i + 1..poles.len()).find(|&j| !paired[j] && (poles[j] - p.conj()).norm() <= tol);
        match partner {
            Some(j) => paired[j] = true,
            None => {
                return Err(ControlError::ComplexGain(format!(
                    "pole {} has no conjugate partner; a real gain cannot place it",
                    p
                )))
            }
        }
    }

    Ok(())
}

/// Compute the monic polynomial with the given roots, in complex arithmetic.
///
/// Returns coefficients in increasing powers of s.
pub fn poly_from_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(0.0, 0.0); roots.len() + 1];
    coeffs[0] = Complex64::new(1.0, 0.0);

    // Multiply by (s - r) one root at a time
    for (k, &r) in roots.iter().enumerate() {
        for i in (1..=k + 1).rev() {
            coeffs[i] = coeffs[i - 1] - r * coeffs[i];
        }
        coeffs[0] = -r * coeffs[0];
    }

    coeffs
}

/// Desired characteristic polynomial alpha(s) = prod (s - p_i).
///
/// Fails with `ComplexGain` if the poles are not closed under conjugation.
/// The real parts form `coeffs`; what is left in the imaginary parts is
/// kept in `imag_residue` so callers can judge how far rounding moved the
/// coefficients off the real axis.
///
/// # Examples
///
/// ```
/// use lti_design::polynomial::characteristic_polynomial;
/// use num_complex::Complex64;
///
/// let poles = [Complex64::new(-1.0, 2.0), Complex64::new(-1.0, -2.0)];
/// let alpha = characteristic_polynomial(&poles, 1e-9).unwrap();
/// // (s + 1)^2 + 4 = s^2 + 2s + 5
/// assert_eq!(alpha.coeffs, vec![5.0, 2.0, 1.0]);
/// ```
pub fn characteristic_polynomial(
    poles: &[Complex64],
    conjugate_rtol: f64,
) -> ControlResult<CharacteristicPolynomial> {
    check_conjugate_closure(poles, conjugate_rtol)?;

    let complex = poly_from_roots(poles);
    Ok(CharacteristicPolynomial {
        coeffs: complex.iter().map(|c| c.re).collect(),
        imag_residue: complex.iter().map(|c| c.im).collect(),
    })
}

/// Roots of s^2 + 2*zeta*wn*s + wn^2.
///
/// Underdamped (`zeta < 1`) gives `-zeta*wn ± j*wn*sqrt(1 - zeta^2)`,
/// critically damped a double real root, overdamped two distinct real roots.
pub fn second_order_poles(damping: f64, natural_frequency: f64) -> ControlResult<[Complex64; 2]> {
    if !(damping.is_finite() && damping > 0.0) {
        return Err(ControlError::InvalidParameter(format!(
            "damping ratio must be finite and > 0, got {}",
            damping
        )));
    }
    if !(natural_frequency.is_finite() && natural_frequency > 0.0) {
        return Err(ControlError::InvalidParameter(format!(
            "natural frequency must be finite and > 0, got {}",
            natural_frequency
        )));
    }

    let sigma = -damping * natural_frequency;
    let poles = if damping < 1.0 {
        let wd = natural_frequency * (1.0 - damping * damping).sqrt();
        [Complex64::new(sigma, wd), Complex64::new(sigma, -wd)]
    } else {
        let spread = natural_frequency * (damping * damping - 1.0).sqrt();
        [
            Complex64::new(sigma + spread, 0.0),
            Complex64::new(sigma - spread, 0.0),
        ]
    };

    Ok(poles)
}

/// Evaluate the matrix polynomial P(A) = c[n]*A^n + ... + c[1]*A + c[0]*I.
///
/// Uses Horner's scheme, so only `n` matrix products are formed. An empty
/// coefficient list gives the zero matrix.
///
/// # Examples
///
/// ```
/// use lti_design::polynomial::evaluate_matrix_polynomial;
/// use ndarray::arr2;
///
/// let a = arr2(&[[0.0, 1.0], [0.0, 0.0]]);
/// // A^2 + 3A + 2I with A nilpotent
/// let p = evaluate_matrix_polynomial(&a, &[2.0, 3.0, 1.0]);
/// assert_eq!(p, arr2(&[[2.0, 3.0], [0.0, 2.0]]));
/// ```
pub fn evaluate_matrix_polynomial(a: &Array2<f64>, coeffs: &[f64]) -> Array2<f64> {
    let n = a.nrows();
    let mut result = Array2::<f64>::zeros((n, n));

    // result := A*result + c[k]*I for k = degree..0
    for (k, &c) in coeffs.iter().enumerate().rev() {
        if k + 1 < coeffs.len() {
            result = a.dot(&result);
        }
        for i in 0..n {
            result[(i, i)] += c;
        }
    }

    result
}
