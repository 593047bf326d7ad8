//! Synthesis Routines
//!
//! State-feedback design for single-input plants:
//!
//! - [`place`] computes K with eig(A - BK) at the requested poles
//!   (Ackermann's formula)
//! - [`feedforward_gain`] scales the reference so the closed loop tracks it
//!   at steady state
//! - [`augment_with_integrator`] folds an integral-of-error state into the
//!   loop for disturbance rejection
//! - [`design_state_feedback`] and [`design_integral_action`] run the whole
//!   pipeline from a closed-loop specification to simulation-ready models
//!
//! Every artifact is returned inside [`Checked`] together with the
//! conditioning warnings raised while computing it.

use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use ndarray_linalg::{EigVals, Solve};
use num_complex::Complex64;

use crate::analysis::{controllability_matrix, ControllabilityReport, RankVerdict};
use crate::config::Tolerances;
use crate::diagnostics::{Checked, Warning};
use crate::error::{ControlError, ControlResult};
use crate::linalg::inverse_checked;
use crate::model::StateSpaceModel;
use crate::polynomial::{characteristic_polynomial, evaluate_matrix_polynomial, second_order_poles};

/// State-feedback gain K for the control law u = -K x (m × n).
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackGain {
    gain: Array2<f64>,
}

impl FeedbackGain {
    pub fn from_matrix(gain: Array2<f64>) -> Self {
        Self { gain }
    }

    /// Single-input gain from its row.
    pub fn from_row(row: Array1<f64>) -> Self {
        Self {
            gain: row.insert_axis(Axis(0)),
        }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.gain
    }

    /// Row `i` of K, the gain applied to input channel `i`.
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.gain.row(i)
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.gain
    }
}

/// Reference pre-scaling N̄ for u = -K x + N̄ r (m × p).
#[derive(Clone, Debug, PartialEq)]
pub struct FeedforwardGain {
    gain: Array2<f64>,
}

impl FeedforwardGain {
    pub fn from_matrix(gain: Array2<f64>) -> Self {
        Self { gain }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.gain
    }

    /// The gain as a scalar for single-input single-output loops.
    pub fn scalar(&self) -> Option<f64> {
        if self.gain.dim() == (1, 1) {
            Some(self.gain[(0, 0)])
        } else {
            None
        }
    }
}

/// Desired closed-loop dynamics.
#[derive(Clone, Debug, PartialEq)]
pub enum ClosedLoopSpec {
    /// Explicit pole locations, closed under conjugation.
    Poles(Vec<Complex64>),
    /// The two roots of s^2 + 2 zeta wn s + wn^2.
    SecondOrder { damping: f64, natural_frequency: f64 },
}

impl ClosedLoopSpec {
    /// Pole set described by this specification.
    pub fn poles(&self) -> ControlResult<Vec<Complex64>> {
        match self {
            ClosedLoopSpec::Poles(p) => Ok(p.clone()),
            ClosedLoopSpec::SecondOrder {
                damping,
                natural_frequency,
            } => Ok(second_order_poles(*damping, *natural_frequency)?.to_vec()),
        }
    }
}

/// Place the closed-loop poles of a single-input plant.
///
/// Computes K such that eig(A - BK) equals `poles` using Ackermann's formula
/// `K = e_n^T C^-1 alpha(A)`, where C is the controllability matrix and
/// alpha the characteristic polynomial of the requested poles.
///
/// # Arguments
///
/// * `model` - Plant with a single input (m = 1)
/// * `poles` - n desired poles, closed under complex conjugation
/// * `tol` - Rank, conjugation and verification tolerances
///
/// # Errors
///
/// * `Dimension` - more than one input, or `poles.len() != n`
/// * `UncontrollableSystem` - controllability matrix rank below n
/// * `ComplexGain` - a complex pole lacks its conjugate
///
/// # Warnings
///
/// * `NearSingular` - the controllability matrix is poorly conditioned
/// * `NumericalTolerance` - the discarded imaginary part of K, or the
///   mismatch between eig(A - BK) and `poles`, exceeds its tolerance.
///   Repeated poles are compared by cluster mean and m-th power spread,
///   since their computed eigenvalues split by about `eps^(1/m)`.
/// * `NonZeroFeedthrough` - D is nonzero
///
/// # Examples
///
/// ```
/// use lti_design::config::Tolerances;
/// use lti_design::model::StateSpaceModel;
/// use lti_design::synthesis::place;
/// use ndarray::arr2;
/// use num_complex::Complex64;
///
/// let plant = StateSpaceModel::strictly_proper(
///     arr2(&[[0.0, 1.0], [0.0, 0.0]]),
///     arr2(&[[0.0], [1.0]]),
///     arr2(&[[1.0, 0.0]]),
/// )
/// .unwrap();
/// let poles = [Complex64::new(-1.0, 0.0), Complex64::new(-2.0, 0.0)];
/// let k = place(&plant, &poles, &Tolerances::default()).unwrap();
/// // s^2 + 3s + 2
/// assert!((k.value.matrix()[(0, 0)] - 2.0).abs() < 1e-12);
/// assert!((k.value.matrix()[(0, 1)] - 3.0).abs() < 1e-12);
/// ```
pub fn place(
    model: &StateSpaceModel,
    poles: &[Complex64],
    tol: &Tolerances,
) -> ControlResult<Checked<FeedbackGain>> {
    if model.inputs() != 1 {
        return Err(ControlError::Dimension(format!(
            "pole placement needs a single-input plant, got {} inputs; use place_through_input to design through one channel",
            model.inputs()
        )));
    }

    let b = model.b().column(0).to_owned();
    let mut checked = ackermann(model.a(), &b, poles, tol)?.map(FeedbackGain::from_row);
    if let Some(w) = model.feedthrough_warning() {
        checked.push(w);
    }
    Ok(checked)
}

/// Place poles by feeding back through input `channel` only.
///
/// The single-input design on column `channel` of B is embedded as row
/// `channel` of an m × n gain; the other rows are zero.
pub fn place_through_input(
    model: &StateSpaceModel,
    channel: usize,
    poles: &[Complex64],
    tol: &Tolerances,
) -> ControlResult<Checked<FeedbackGain>> {
    let m = model.inputs();
    if channel >= m {
        return Err(ControlError::Dimension(format!(
            "input channel {} out of range for {} inputs",
            channel, m
        )));
    }

    let b = model.b().column(channel).to_owned();
    let (row, mut warnings) = ackermann(model.a(), &b, poles, tol)?.into_parts();

    let mut gain = Array2::zeros((m, model.order()));
    gain.row_mut(channel).assign(&row);
    if let Some(w) = model.feedthrough_warning() {
        warnings.push(w);
    }
    Ok(Checked::with_warnings(FeedbackGain::from_matrix(gain), warnings))
}

/// Ackermann's formula for the pair (A, b) with b a single column.
fn ackermann(
    a: &Array2<f64>,
    b: &Array1<f64>,
    poles: &[Complex64],
    tol: &Tolerances,
) -> ControlResult<Checked<Array1<f64>>> {
    let n = a.nrows();
    if poles.len() != n {
        return Err(ControlError::Dimension(format!(
            "expected one pole per state ({}), got {}",
            n,
            poles.len()
        )));
    }

    let b_mat = b.clone().insert_axis(Axis(1));
    let ctrb = controllability_matrix(a, &b_mat)?;
    let report = ControllabilityReport::from_matrix(&ctrb, n, tol)?;
    if report.verdict == RankVerdict::Deficient {
        return Err(ControlError::UncontrollableSystem {
            rank: report.rank,
            order: n,
        });
    }

    let mut warnings = Vec::new();
    if let Some(w) = report.warning("controllability matrix", tol) {
        warnings.push(w);
    }

    let alpha = characteristic_polynomial(poles, tol.conjugate_rtol)?;
    log::debug!(
        "ackermann: n = {}, alpha = {:?}, sigma = {:?}",
        n,
        alpha.coeffs,
        report.svd.singular_values
    );

    // K = y^T alpha(A) with C^T y = e_n
    let mut e_n = Array1::zeros(n);
    e_n[n - 1] = 1.0;
    let y = ctrb.t().to_owned().solve_into(e_n)?;

    let alpha_a = evaluate_matrix_polynomial(a, &alpha.coeffs);
    let k = alpha_a.t().dot(&y);

    // Imaginary part the residue would have contributed to K
    let residue_a = evaluate_matrix_polynomial(a, &alpha.imag_residue);
    let k_im = residue_a.t().dot(&y);
    let k_scale = k.iter().map(|v| v.abs()).fold(0.0, f64::max);
    let im_scale = k_im.iter().map(|v| v.abs()).fold(0.0, f64::max);
    let relative_im = if k_scale > 0.0 {
        im_scale / k_scale
    } else {
        im_scale
    };
    if relative_im > tol.gain_residue_rtol {
        warnings.push(Warning::NumericalTolerance {
            context: "imaginary part of feedback gain",
            residue: relative_im,
            tolerance: tol.gain_residue_rtol,
        });
    }

    let a_cl = a - &b_mat.dot(&k.view().insert_axis(Axis(0)));
    let achieved = a_cl.eigvals()?;
    let mismatch = placement_error(
        achieved.as_slice().unwrap_or(&[]),
        poles,
        tol.conjugate_rtol,
    );
    log::trace!("ackermann: K = {}, pole mismatch = {:e}", k, mismatch);
    if mismatch > tol.placement_rtol {
        warnings.push(Warning::NumericalTolerance {
            context: "closed-loop poles",
            residue: mismatch,
            tolerance: tol.placement_rtol,
        });
    }

    Ok(Checked::with_warnings(k, warnings))
}

/// Worst relative deviation of `achieved` from `requested`, measured
/// against `placement_rtol`.
///
/// Requested poles equal within `cluster_rtol` form a cluster of
/// multiplicity m, matched to the m nearest unused eigenvalues. A computed
/// eigenvalue of multiplicity m is only accurate to about `eps^(1/m)`,
/// while the cluster mean stays accurate to `eps`. The deviation of a
/// cluster is therefore `max(|mean - p|, max |lambda - p|^m)`, relative to
/// `max(|p|, 1)`. For simple poles this is `|lambda - p| / max(|p|, 1)`.
fn placement_error(achieved: &[Complex64], requested: &[Complex64], cluster_rtol: f64) -> f64 {
    if achieved.len() != requested.len() {
        return f64::INFINITY;
    }

    let mut clustered = vec![false; requested.len()];
    let mut used = vec![false; achieved.len()];
    let mut worst = 0.0_f64;

    for i in 0..requested.len() {
        if clustered[i] {
            continue;
        }
        let p = requested[i];
        let scale = p.norm().max(1.0);
        let mut multiplicity = 0;
        for j in i..requested.len() {
            if !clustered[j] && (requested[j] - p).norm() <= cluster_rtol * scale {
                clustered[j] = true;
                multiplicity += 1;
            }
        }

        let mut candidates: Vec<(usize, f64)> = achieved
            .iter()
            .enumerate()
            .filter(|&(j, _)| !used[j])
            .map(|(j, lambda)| (j, (lambda - p).norm()))
            .collect();
        if candidates.len() < multiplicity {
            return f64::INFINITY;
        }
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut sum = Complex64::new(0.0, 0.0);
        let mut spread = 0.0_f64;
        for &(j, dist) in &candidates[..multiplicity] {
            used[j] = true;
            sum += achieved[j];
            spread = spread.max(dist / scale);
        }
        let mean_err = (sum / multiplicity as f64 - p).norm() / scale;
        worst = worst.max(mean_err).max(spread.powi(multiplicity as i32));
    }
    worst
}

/// Feedforward gain N̄ = (C (-(A - BK))^-1 B + D)^-1 of a closed loop.
///
/// `closed_loop` is the model from the new input v of u = -Kx + v, as
/// returned by [`StateSpaceModel::closed_loop`]. The DC gain must be square.
///
/// # Errors
///
/// * `SingularMatrix` - the closed-loop A is singular or the DC gain is zero
/// * `Dimension` - outputs and inputs differ in number
pub fn feedforward_gain(
    closed_loop: &StateSpaceModel,
    tol: &Tolerances,
) -> ControlResult<Checked<FeedforwardGain>> {
    let (dc, warnings) = closed_loop.dc_gain(tol)?.into_parts();
    if dc.nrows() != dc.ncols() {
        return Err(ControlError::Dimension(format!(
            "feedforward needs as many outputs as inputs, DC gain is {}×{}",
            dc.nrows(),
            dc.ncols()
        )));
    }

    let nbar = inverse_checked(&dc, tol.singular_rtol, "closed-loop DC gain")?;
    log::debug!("feedforward: dc gain = {}, nbar = {}", dc, nbar);
    Ok(Checked::with_warnings(
        FeedforwardGain::from_matrix(nbar),
        warnings,
    ))
}

/// Closed loop with u = -K x + d + N̄ r and inputs ordered `[d, r]`.
///
/// The disturbance enters at the plant input, the same channel layout as
/// [`AugmentedModel`], so both designs run through the same scenarios.
pub fn tracking_model(
    plant: &StateSpaceModel,
    feedback: &FeedbackGain,
    feedforward: &FeedforwardGain,
) -> ControlResult<StateSpaceModel> {
    let nbar = feedforward.matrix();
    if nbar.nrows() != plant.inputs() {
        return Err(ControlError::Dimension(format!(
            "feedforward gain must have {} rows, got {}",
            plant.inputs(),
            nbar.nrows()
        )));
    }

    let closed = plant.closed_loop(feedback)?;
    let m = plant.inputs();
    let r = nbar.ncols();
    let n = plant.order();
    let p = plant.outputs();

    let mut b = Array2::zeros((n, m + r));
    b.slice_mut(s![.., ..m]).assign(plant.b());
    b.slice_mut(s![.., m..]).assign(&plant.b().dot(nbar));

    let mut d = Array2::zeros((p, m + r));
    d.slice_mut(s![.., ..m]).assign(plant.d());
    d.slice_mut(s![.., m..]).assign(&plant.d().dot(nbar));

    closed.with_inputs(b, d)
}

/// Plant with state feedback and an integral-of-error state folded in.
///
/// States are `[x; w]` with `w' = y - r`, inputs are `[d, r]`, and the
/// output is the plant output y.
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentedModel {
    model: StateSpaceModel,
    feedback: FeedbackGain,
    integral_gain: f64,
}

impl AugmentedModel {
    /// The (n+1)-state closed-loop model.
    pub fn model(&self) -> &StateSpaceModel {
        &self.model
    }

    pub fn feedback(&self) -> &FeedbackGain {
        &self.feedback
    }

    /// The integral gain k_i.
    pub fn integral_gain(&self) -> f64 {
        self.integral_gain
    }

    /// Index of the disturbance input.
    pub const DISTURBANCE: usize = 0;
    /// Index of the reference input.
    pub const REFERENCE: usize = 1;
}

/// Augment a SISO plant with an integrator on the tracking error.
///
/// With u = -K x - k_i w + d and w' = y - r:
/// ```text
/// A_aug = [[A - BK, -B k_i], [C - DK, -D k_i]]
/// B_aug = [[B, 0], [D, -1]]
/// C_aug = [C - DK, -D k_i]
/// D_aug = [D, 0]
/// ```
/// For a strictly proper plant this reduces to `[[A - BK, -B k_i], [C, 0]]`.
/// `k_i` is a tuning parameter and is not derived here.
///
/// # Errors
///
/// * `Dimension` - plant is not SISO or K is not 1 × n
/// * `InvalidParameter` - `k_i` is not finite
pub fn augment_with_integrator(
    plant: &StateSpaceModel,
    feedback: &FeedbackGain,
    integral_gain: f64,
) -> ControlResult<Checked<AugmentedModel>> {
    if plant.inputs() != 1 || plant.outputs() != 1 {
        return Err(ControlError::Dimension(format!(
            "integral augmentation needs a SISO plant, got {} inputs and {} outputs",
            plant.inputs(),
            plant.outputs()
        )));
    }
    if !integral_gain.is_finite() {
        return Err(ControlError::InvalidParameter(format!(
            "integral gain must be finite, got {}",
            integral_gain
        )));
    }

    let closed = plant.closed_loop(feedback)?;
    let n = plant.order();
    let ki = integral_gain;

    let mut a = Array2::zeros((n + 1, n + 1));
    a.slice_mut(s![..n, ..n]).assign(closed.a());
    a.slice_mut(s![..n, n..]).assign(&plant.b().mapv(|v| -v * ki));
    a.slice_mut(s![n.., ..n]).assign(closed.c());
    a.slice_mut(s![n.., n..]).assign(&plant.d().mapv(|v| -v * ki));

    let mut b = Array2::zeros((n + 1, 2));
    b.slice_mut(s![..n, 0..1]).assign(plant.b());
    b.slice_mut(s![n.., 0..1]).assign(plant.d());
    b[(n, 1)] = -1.0;

    let c = a.slice(s![n.., ..]).to_owned();

    let mut d = Array2::zeros((1, 2));
    d.slice_mut(s![.., 0..1]).assign(plant.d());

    let model = StateSpaceModel::new(a, b, c, d)?;
    log::debug!("augmented model with k_i = {}: A = {}", ki, model.a());

    let mut checked = Checked::new(AugmentedModel {
        model,
        feedback: feedback.clone(),
        integral_gain,
    });
    if let Some(w) = plant.feedthrough_warning() {
        checked.push(w);
    }
    Ok(checked)
}

/// Every artifact of a state-feedback design with reference feedforward.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingDesign {
    pub spec: ClosedLoopSpec,
    pub poles: Vec<Complex64>,
    pub feedback: FeedbackGain,
    pub feedforward: FeedforwardGain,
    /// A - BK driven by v in u = -Kx + v.
    pub closed_loop: StateSpaceModel,
    /// Closed loop with inputs `[d, r]`, see [`tracking_model`].
    pub tracking: StateSpaceModel,
}

/// Pole placement followed by feedforward design.
pub fn design_state_feedback(
    plant: &StateSpaceModel,
    spec: &ClosedLoopSpec,
    tol: &Tolerances,
) -> ControlResult<Checked<TrackingDesign>> {
    let poles = spec.poles()?;
    let (feedback, mut warnings) = place(plant, &poles, tol)?.into_parts();
    let closed_loop = plant.closed_loop(&feedback)?;
    let (feedforward, ff_warnings) = feedforward_gain(&closed_loop, tol)?.into_parts();
    warnings.extend(ff_warnings);
    let tracking = tracking_model(plant, &feedback, &feedforward)?;

    Ok(Checked::with_warnings(
        TrackingDesign {
            spec: spec.clone(),
            poles,
            feedback,
            feedforward,
            closed_loop,
            tracking,
        },
        warnings,
    ))
}

/// Every artifact of a state-feedback design with integral action.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegralDesign {
    pub spec: ClosedLoopSpec,
    pub poles: Vec<Complex64>,
    pub feedback: FeedbackGain,
    pub integral_gain: f64,
    pub augmented: AugmentedModel,
}

impl IntegralDesign {
    /// Steady-state gain from the reference to the output (1 when the
    /// augmented loop is stable).
    pub fn reference_dc_gain(&self, tol: &Tolerances) -> ControlResult<Checked<f64>> {
        Ok(self
            .augmented
            .model()
            .dc_gain(tol)?
            .map(|g| g[(0, AugmentedModel::REFERENCE)]))
    }

    /// Steady-state gain from the input disturbance to the output (0 when
    /// the augmented loop is stable).
    pub fn disturbance_dc_gain(&self, tol: &Tolerances) -> ControlResult<Checked<f64>> {
        Ok(self
            .augmented
            .model()
            .dc_gain(tol)?
            .map(|g| g[(0, AugmentedModel::DISTURBANCE)]))
    }
}

/// Pole placement followed by integrator augmentation with gain `integral_gain`.
pub fn design_integral_action(
    plant: &StateSpaceModel,
    spec: &ClosedLoopSpec,
    integral_gain: f64,
    tol: &Tolerances,
) -> ControlResult<Checked<IntegralDesign>> {
    let poles = spec.poles()?;
    let (feedback, mut warnings) = place(plant, &poles, tol)?.into_parts();
    let (augmented, aug_warnings) =
        augment_with_integrator(plant, &feedback, integral_gain)?.into_parts();
    // The feedthrough warning is already attached by `place`
    warnings.extend(
        aug_warnings
            .into_iter()
            .filter(|w| !matches!(w, Warning::NonZeroFeedthrough { .. })),
    );

    Ok(Checked::with_warnings(
        IntegralDesign {
            spec: spec.clone(),
            poles,
            feedback,
            integral_gain,
            augmented,
        },
        warnings,
    ))
}
