//! Linear Simulation
//!
//! Zero-order-hold discretization and time-domain propagation of a
//! [`StateSpaceModel`] under piecewise-constant inputs.
//!
//! ```text
//! x[k+1] = Ad x[k] + Bd u[k]
//! y[k]   = C x[k] + D u[k]
//! ```
//!
//! The default discretization takes the exponential of the block matrix
//! `[[A, B], [0, 0]] h`, which stays exact when A is singular (integrator
//! states). Simulation is a pure function: identical arguments produce
//! bit-identical trajectories.

use ndarray::{s, Array1, Array2, ArrayView1};
use ndarray_linalg::EigVals;

use crate::config::Tolerances;
use crate::error::{ControlError, ControlResult};
use crate::linalg::{expm, inverse_checked};
use crate::model::StateSpaceModel;

/// Strictly increasing, uniformly spaced sample times.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
    step: f64,
}

impl TimeGrid {
    /// Grid `start, start + step, ...` up to and including `stop`.
    ///
    /// When `(stop - start) / step` is within rounding of an integer, `stop`
    /// itself is the last sample; otherwise the grid ends at the last
    /// sample before `stop`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lti_design::simulation::TimeGrid;
    ///
    /// let grid = TimeGrid::new(0.0, 2.0, 1e-3).unwrap();
    /// assert_eq!(grid.len(), 2001);
    /// ```
    pub fn new(start: f64, stop: f64, step: f64) -> ControlResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ControlError::InvalidParameter(format!(
                "time step must be finite and > 0, got {}",
                step
            )));
        }
        if !(start.is_finite() && stop.is_finite()) || stop <= start {
            return Err(ControlError::UnsupportedGrid(format!(
                "time span [{}, {}] must be finite and increasing",
                start, stop
            )));
        }

        let span = (stop - start) / step;
        let nearest = span.round();
        let intervals = if (span - nearest).abs() <= 1e-9 * span.max(1.0) {
            nearest
        } else {
            span.floor()
        };
        if intervals < 1.0 {
            return Err(ControlError::UnsupportedGrid(format!(
                "step {} leaves fewer than two samples in [{}, {}]",
                step, start, stop
            )));
        }

        let len = intervals as usize + 1;
        let times = (0..len).map(|k| start + k as f64 * step).collect();
        Ok(Self { times, step })
    }

    /// Validate caller-supplied sample times.
    ///
    /// Requires at least two finite, strictly increasing samples whose
    /// consecutive differences deviate from the mean step by at most
    /// `rtol` (relative), plus a few ulps of the sample times themselves.
    /// Without that allowance a fine grid far from zero, as produced by
    /// [`TimeGrid::new`], fails on rounding alone.
    pub fn from_samples(times: &[f64], rtol: f64) -> ControlResult<Self> {
        if times.len() < 2 {
            return Err(ControlError::UnsupportedGrid(format!(
                "at least two samples are required, got {}",
                times.len()
            )));
        }
        if let Some(t) = times.iter().find(|t| !t.is_finite()) {
            return Err(ControlError::UnsupportedGrid(format!(
                "sample time {} is not finite",
                t
            )));
        }

        let first = times[0];
        let last = times[times.len() - 1];
        let step = (last - first) / (times.len() - 1) as f64;

        for (k, w) in times.windows(2).enumerate() {
            let dt = w[1] - w[0];
            if dt <= 0.0 {
                return Err(ControlError::UnsupportedGrid(format!(
                    "times must be strictly increasing (t[{}] = {}, t[{}] = {})",
                    k,
                    w[0],
                    k + 1,
                    w[1]
                )));
            }
            let rounding = 4.0 * f64::EPSILON * w[0].abs().max(w[1].abs());
            if (dt - step).abs() > rtol * step + rounding {
                return Err(ControlError::UnsupportedGrid(format!(
                    "non-uniform step {} at index {} (expected {})",
                    dt, k, step
                )));
            }
        }

        Ok(Self {
            times: times.to_vec(),
            step,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// ZOH discretization method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZohMethod {
    /// `exp([[A, B], [0, 0]] h) = [[Ad, Bd], [0, I]]`; valid for any A.
    #[default]
    AugmentedExponential,
    /// `Ad = exp(A h)`, `Bd = A^-1 (Ad - I) B`; fails when A is singular.
    InverseFormula,
}

/// Sampled-data model obtained by ZOH discretization.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscreteModel {
    ad: Array2<f64>,
    bd: Array2<f64>,
    c: Array2<f64>,
    d: Array2<f64>,
    step: f64,
}

impl DiscreteModel {
    pub fn ad(&self) -> &Array2<f64> {
        &self.ad
    }

    pub fn bd(&self) -> &Array2<f64> {
        &self.bd
    }

    pub fn c(&self) -> &Array2<f64> {
        &self.c
    }

    pub fn d(&self) -> &Array2<f64> {
        &self.d
    }

    /// Sampling period h.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// True when every eigenvalue of Ad lies strictly inside the unit circle.
    pub fn is_stable(&self) -> ControlResult<bool> {
        Ok(self.ad.eigvals()?.iter().all(|z| z.norm() < 1.0))
    }

    /// Propagate from `x0` under `inputs` (one row per sample).
    ///
    /// Returns the state and output sequences, one row per sample; row k
    /// holds x[k] and y[k].
    pub fn propagate(
        &self,
        inputs: &Array2<f64>,
        x0: &Array1<f64>,
    ) -> ControlResult<(Array2<f64>, Array2<f64>)> {
        let n = self.ad.nrows();
        let m = self.bd.ncols();
        let p = self.c.nrows();

        if inputs.ncols() != m {
            return Err(ControlError::Dimension(format!(
                "inputs must have {} columns (one per input channel), got {}",
                m,
                inputs.ncols()
            )));
        }
        if x0.len() != n {
            return Err(ControlError::Dimension(format!(
                "initial state must have length {}, got {}",
                n,
                x0.len()
            )));
        }

        let len = inputs.nrows();
        let mut states = Array2::zeros((len, n));
        let mut outputs = Array2::zeros((len, p));
        let mut x = x0.clone();

        for (k, u) in inputs.rows().into_iter().enumerate() {
            let y = self.c.dot(&x) + self.d.dot(&u);
            states.row_mut(k).assign(&x);
            outputs.row_mut(k).assign(&y);
            x = self.ad.dot(&x) + self.bd.dot(&u);
        }

        Ok((states, outputs))
    }
}

/// ZOH-discretize `model` with sampling period `step`.
///
/// # Errors
///
/// * `InvalidParameter` - `step` is not finite and positive
/// * `SingularMatrix` - `ZohMethod::InverseFormula` on a singular A
pub fn discretize(
    model: &StateSpaceModel,
    step: f64,
    method: ZohMethod,
    tol: &Tolerances,
) -> ControlResult<DiscreteModel> {
    if !(step.is_finite() && step > 0.0) {
        return Err(ControlError::InvalidParameter(format!(
            "sampling period must be finite and > 0, got {}",
            step
        )));
    }

    let n = model.order();
    let m = model.inputs();

    let (ad, bd) = match method {
        ZohMethod::AugmentedExponential => {
            let mut block = Array2::zeros((n + m, n + m));
            block.slice_mut(s![..n, ..n]).assign(&(model.a() * step));
            block.slice_mut(s![..n, n..]).assign(&(model.b() * step));
            let e = expm(&block)?;
            (
                e.slice(s![..n, ..n]).to_owned(),
                e.slice(s![..n, n..]).to_owned(),
            )
        }
        ZohMethod::InverseFormula => {
            let ad = expm(&(model.a() * step))?;
            let a_inv = inverse_checked(model.a(), tol.singular_rtol, "state matrix A")?;
            let bd = a_inv.dot(&(&ad - &Array2::<f64>::eye(n))).dot(model.b());
            (ad, bd)
        }
    };
    log::debug!("discretize: h = {}, method = {:?}, Ad = {}", step, method, ad);

    Ok(DiscreteModel {
        ad,
        bd,
        c: model.c().clone(),
        d: model.d().clone(),
        step,
    })
}

/// Options for [`simulate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationOptions {
    pub method: ZohMethod,
    /// x0; zero when `None`.
    pub initial_state: Option<Array1<f64>>,
    pub tolerances: Tolerances,
}

impl SimulationOptions {
    pub fn with_initial_state(mut self, x0: Array1<f64>) -> Self {
        self.initial_state = Some(x0);
        self
    }

    pub fn with_method(mut self, method: ZohMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }
}

/// Simulate `model` on the uniform grid `times`.
///
/// `inputs` has one row per sample and one column per input channel; each
/// row is held constant over the following step.
///
/// # Errors
///
/// * `UnsupportedGrid` - fewer than two samples, non-increasing or
///   non-uniform `times`
/// * `Dimension` - `inputs` or the initial state do not match the model
/// * `SingularMatrix` - inverse-formula discretization of a singular A
///
/// # Examples
///
/// ```
/// use lti_design::model::StateSpaceModel;
/// use lti_design::simulation::{simulate, SimulationOptions, TimeGrid};
/// use ndarray::{arr2, Array2};
///
/// // Pure integrator driven by a unit input
/// let sys = StateSpaceModel::strictly_proper(arr2(&[[0.0]]), arr2(&[[1.0]]), arr2(&[[1.0]]))
///     .unwrap();
/// let grid = TimeGrid::new(0.0, 1.0, 0.25).unwrap();
/// let u = Array2::ones((grid.len(), 1));
/// let traj = simulate(&sys, &u, grid.times(), &SimulationOptions::default()).unwrap();
/// assert!((traj.final_output()[0] - 1.0).abs() < 1e-12);
/// ```
pub fn simulate(
    model: &StateSpaceModel,
    inputs: &Array2<f64>,
    times: &[f64],
    options: &SimulationOptions,
) -> ControlResult<Trajectory> {
    let grid = TimeGrid::from_samples(times, options.tolerances.grid_rtol)?;
    if inputs.nrows() != grid.len() {
        return Err(ControlError::Dimension(format!(
            "inputs must have one row per sample ({}), got {}",
            grid.len(),
            inputs.nrows()
        )));
    }

    let x0 = match &options.initial_state {
        Some(x0) => x0.clone(),
        None => Array1::zeros(model.order()),
    };

    let discrete = discretize(model, grid.step(), options.method, &options.tolerances)?;
    let (states, outputs) = discrete.propagate(inputs, &x0)?;
    log::trace!(
        "simulate: {} samples, final output {}",
        grid.len(),
        outputs.row(grid.len() - 1)
    );

    Ok(Trajectory {
        time: grid.times,
        states,
        outputs,
    })
}

/// Piecewise-constant signal indexed by sample.
///
/// ```
/// use lti_design::simulation::Signal;
///
/// let d = Signal::constant(0.0).then(2, 0.1);
/// assert_eq!(d.sample(4).to_vec(), vec![0.0, 0.0, 0.1, 0.1]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    initial: f64,
    switches: Vec<(usize, f64)>,
}

impl Signal {
    pub fn constant(value: f64) -> Self {
        Self {
            initial: value,
            switches: Vec::new(),
        }
    }

    /// Zero until sample `index`, `value` from then on.
    pub fn step_at(index: usize, value: f64) -> Self {
        Self::constant(0.0).then(index, value)
    }

    /// Switch to `value` at sample `index`.
    pub fn then(mut self, index: usize, value: f64) -> Self {
        self.switches.push((index, value));
        self.switches.sort_by_key(|&(i, _)| i);
        self
    }

    /// Value at sample `k`.
    pub fn value_at(&self, k: usize) -> f64 {
        self.switches
            .iter()
            .take_while(|&&(i, _)| i <= k)
            .last()
            .map_or(self.initial, |&(_, v)| v)
    }

    /// The first `len` samples.
    pub fn sample(&self, len: usize) -> Array1<f64> {
        Array1::from_shape_fn(len, |k| self.value_at(k))
    }
}

/// Stack signals as input columns (len × channels).
pub fn input_matrix(channels: &[Signal], len: usize) -> Array2<f64> {
    let mut u = Array2::zeros((len, channels.len()));
    for (j, sig) in channels.iter().enumerate() {
        u.column_mut(j).assign(&sig.sample(len));
    }
    u
}

/// Sample index at `fraction` of a horizon of `len` samples.
pub fn injection_index(len: usize, fraction: f64) -> ControlResult<usize> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(ControlError::InvalidParameter(format!(
            "injection fraction must be in [0, 1], got {}",
            fraction
        )));
    }
    Ok(((len as f64 * fraction).floor() as usize).min(len))
}

/// Inputs `[d, r]` with a constant reference and a step disturbance injected
/// at `fraction` of the horizon.
pub fn reference_with_disturbance(
    len: usize,
    reference: f64,
    disturbance: f64,
    fraction: f64,
) -> ControlResult<Array2<f64>> {
    let index = injection_index(len, fraction)?;
    Ok(input_matrix(
        &[
            Signal::step_at(index, disturbance),
            Signal::constant(reference),
        ],
        len,
    ))
}

/// One sample of a [`Trajectory`].
#[derive(Clone, Debug, PartialEq)]
pub struct Sample<'a> {
    pub time: f64,
    pub state: ArrayView1<'a, f64>,
    pub output: ArrayView1<'a, f64>,
}

/// Time, state and output sequences of one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    time: Vec<f64>,
    states: Array2<f64>,
    outputs: Array2<f64>,
}

impl Trajectory {
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// States, one row per sample.
    pub fn states(&self) -> &Array2<f64> {
        &self.states
    }

    /// Outputs, one row per sample.
    pub fn outputs(&self) -> &Array2<f64> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample<'_>> + '_ {
        self.time.iter().enumerate().map(move |(k, &t)| Sample {
            time: t,
            state: self.states.row(k),
            output: self.outputs.row(k),
        })
    }

    /// Output channel `channel` over time.
    pub fn output(&self, channel: usize) -> ControlResult<ArrayView1<'_, f64>> {
        if channel >= self.outputs.ncols() {
            return Err(ControlError::Dimension(format!(
                "output channel {} out of range for {} outputs",
                channel,
                self.outputs.ncols()
            )));
        }
        Ok(self.outputs.column(channel))
    }

    /// `(time, output)` pairs of one channel.
    pub fn time_output_pairs(&self, channel: usize) -> ControlResult<Vec<(f64, f64)>> {
        let y = self.output(channel)?;
        Ok(self.time.iter().copied().zip(y.iter().copied()).collect())
    }

    /// Output vector at the last sample.
    pub fn final_output(&self) -> ArrayView1<'_, f64> {
        self.outputs.row(self.outputs.nrows().saturating_sub(1))
    }

    /// Step-response metrics of output `channel`, see [`StepInfo::from_response`].
    pub fn step_info(&self, channel: usize, settling_band: f64) -> ControlResult<StepInfo> {
        let y = self.output(channel)?.to_vec();
        StepInfo::from_response(&self.time, &y, settling_band)
    }
}

/// Step-response metrics.
///
/// Times are measured from the first sample. The response is assumed to
/// have settled by the last sample, whose value is taken as steady state.
#[derive(Clone, Debug, PartialEq)]
pub struct StepInfo {
    /// 10 % to 90 % rise time; `None` for a flat response.
    pub rise_time: Option<f64>,
    /// Extreme value in the direction of the step.
    pub peak: f64,
    pub peak_time: f64,
    /// Peak excursion beyond steady state, percent of the step size.
    pub overshoot_percent: f64,
    /// Time after which the response stays within `band * |step|` of
    /// steady state.
    pub settling_time: f64,
    pub steady_state: f64,
}

impl StepInfo {
    pub fn from_response(time: &[f64], y: &[f64], settling_band: f64) -> ControlResult<Self> {
        if time.len() != y.len() || y.len() < 2 {
            return Err(ControlError::Dimension(format!(
                "step metrics need matching time and output samples (at least two), got {} and {}",
                time.len(),
                y.len()
            )));
        }
        if !(settling_band.is_finite() && settling_band > 0.0) {
            return Err(ControlError::InvalidParameter(format!(
                "settling band must be finite and > 0, got {}",
                settling_band
            )));
        }

        let t0 = time[0];
        let y0 = y[0];
        let last = y.len() - 1;
        let steady_state = y[last];
        let delta = steady_state - y0;

        if delta == 0.0 {
            return Ok(Self {
                rise_time: None,
                peak: y0,
                peak_time: 0.0,
                overshoot_percent: 0.0,
                settling_time: 0.0,
                steady_state,
            });
        }

        let sign = delta.signum();
        let crossing = |level: f64| -> Option<f64> {
            let k = y.iter().position(|&v| (v - level) * sign >= 0.0)?;
            if k == 0 {
                return Some(0.0);
            }
            let frac = (level - y[k - 1]) / (y[k] - y[k - 1]);
            Some(time[k - 1] + frac * (time[k] - time[k - 1]) - t0)
        };
        let rise_time = match (crossing(y0 + 0.1 * delta), crossing(y0 + 0.9 * delta)) {
            (Some(t10), Some(t90)) => Some(t90 - t10),
            _ => None,
        };

        let (peak_index, peak) = y
            .iter()
            .copied()
            .enumerate()
            .fold((0, y0), |(bi, bv), (i, v)| {
                if (v - bv) * sign > 0.0 {
                    (i, v)
                } else {
                    (bi, bv)
                }
            });
        let overshoot_percent = ((peak - steady_state) / delta * 100.0).max(0.0);

        let band = settling_band * delta.abs();
        let settling_time = match y.iter().rposition(|&v| (v - steady_state).abs() > band) {
            Some(k) => time[(k + 1).min(last)] - t0,
            None => 0.0,
        };

        Ok(Self {
            rise_time,
            peak,
            peak_time: time[peak_index] - t0,
            overshoot_percent,
            settling_time,
            steady_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{arr1, arr2};

    fn first_order(a: f64, b: f64) -> StateSpaceModel {
        StateSpaceModel::strictly_proper(arr2(&[[-a]]), arr2(&[[b]]), arr2(&[[1.0]])).unwrap()
    }

    #[test]
    fn test_grid_length() {
        let grid = TimeGrid::new(0.0, 2.0, 1e-3).unwrap();
        assert_eq!(grid.len(), 2001);
        assert_relative_eq!(grid.times()[2000], 2.0, max_relative = 1e-14);

        // 1.0 / 0.3 is not an integer: stop is not reached
        let grid = TimeGrid::new(0.0, 1.0, 0.3).unwrap();
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_grid_rejects_bad_parameters() {
        assert!(matches!(
            TimeGrid::new(0.0, 1.0, 0.0),
            Err(ControlError::InvalidParameter(_))
        ));
        assert!(matches!(
            TimeGrid::new(1.0, 0.0, 0.1),
            Err(ControlError::UnsupportedGrid(_))
        ));
        assert!(matches!(
            TimeGrid::new(0.0, 0.1, 1.0),
            Err(ControlError::UnsupportedGrid(_))
        ));
    }

    #[test]
    fn test_from_samples_validation() {
        let ok = TimeGrid::from_samples(&[0.0, 0.5, 1.0, 1.5], 1e-9).unwrap();
        assert_eq!(ok.step(), 0.5);

        let err = TimeGrid::from_samples(&[0.0, 0.5, 1.2], 1e-9).unwrap_err();
        assert!(err.to_string().contains("non-uniform"));

        let err = TimeGrid::from_samples(&[0.0, 0.0, 0.0], 1e-9).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));

        assert!(matches!(
            TimeGrid::from_samples(&[0.0], 1e-9),
            Err(ControlError::UnsupportedGrid(_))
        ));
        assert!(matches!(
            TimeGrid::from_samples(&[0.0, f64::NAN], 1e-9),
            Err(ControlError::UnsupportedGrid(_))
        ));
    }

    #[test]
    fn test_from_samples_accepts_fine_grid_far_from_zero() {
        let grid = TimeGrid::new(1000.0, 1000.01, 1e-6).unwrap();
        assert_eq!(grid.len(), 10001);
        let checked = TimeGrid::from_samples(grid.times(), 1e-9).unwrap();
        assert_relative_eq!(checked.step(), 1e-6, max_relative = 1e-6);

        // Rounding allowance does not hide a real gap at the same offset
        let err = TimeGrid::from_samples(&[1000.0, 1000.000001, 1000.0000025], 1e-9)
            .unwrap_err();
        assert!(err.to_string().contains("non-uniform"));
    }

    #[test]
    fn test_discretize_first_order_exact() {
        let (a, b, h): (f64, f64, f64) = (2.0, 3.0, 0.1);
        let tol = Tolerances::default();
        let expected_ad = (-a * h).exp();
        let expected_bd = b * (1.0 - expected_ad) / a;

        for method in [ZohMethod::AugmentedExponential, ZohMethod::InverseFormula] {
            let dm = discretize(&first_order(a, b), h, method, &tol).unwrap();
            assert_relative_eq!(dm.ad()[(0, 0)], expected_ad, max_relative = 1e-13);
            assert_relative_eq!(dm.bd()[(0, 0)], expected_bd, max_relative = 1e-12);
            assert_eq!(dm.step(), h);
        }
    }

    #[test]
    fn test_discretize_double_integrator() {
        let sys = StateSpaceModel::strictly_proper(
            arr2(&[[0.0, 1.0], [0.0, 0.0]]),
            arr2(&[[0.0], [1.0]]),
            arr2(&[[1.0, 0.0]]),
        )
        .unwrap();
        let h = 0.01;
        let tol = Tolerances::default();
        let dm = discretize(&sys, h, ZohMethod::default(), &tol).unwrap();
        assert_abs_diff_eq!(dm.ad()[(0, 1)], h, epsilon = 1e-15);
        assert_abs_diff_eq!(dm.ad()[(1, 1)], 1.0, epsilon = 1e-15);
        assert_relative_eq!(dm.bd()[(0, 0)], h * h / 2.0, max_relative = 1e-12);
        assert_relative_eq!(dm.bd()[(1, 0)], h, max_relative = 1e-12);

        let err = discretize(&sys, h, ZohMethod::InverseFormula, &tol).unwrap_err();
        assert!(matches!(err, ControlError::SingularMatrix(_)));
    }

    #[test]
    fn test_discretize_rejects_bad_step() {
        let tol = Tolerances::default();
        for h in [0.0, -1.0, f64::INFINITY] {
            assert!(matches!(
                discretize(&first_order(1.0, 1.0), h, ZohMethod::default(), &tol),
                Err(ControlError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_simulate_first_order_step() {
        let sys = first_order(1.0, 1.0);
        let grid = TimeGrid::new(0.0, 5.0, 0.01).unwrap();
        let u = Array2::ones((grid.len(), 1));
        let traj = simulate(&sys, &u, grid.times(), &SimulationOptions::default()).unwrap();

        assert_eq!(traj.len(), grid.len());
        for s in traj.samples() {
            assert_abs_diff_eq!(s.output[0], 1.0 - (-s.time).exp(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_simulate_initial_state() {
        let sys = first_order(2.0, 1.0);
        let grid = TimeGrid::new(0.0, 1.0, 0.1).unwrap();
        let u = Array2::zeros((grid.len(), 1));
        let options = SimulationOptions::default().with_initial_state(arr1(&[3.0]));
        let traj = simulate(&sys, &u, grid.times(), &options).unwrap();
        assert_eq!(traj.outputs()[(0, 0)], 3.0);
        assert_relative_eq!(traj.final_output()[0], 3.0 * (-2.0f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_simulate_dimension_errors() {
        let sys = first_order(1.0, 1.0);
        let times = [0.0, 0.1, 0.2];
        let opts = SimulationOptions::default();

        let too_short = Array2::zeros((2, 1));
        assert!(matches!(
            simulate(&sys, &too_short, &times, &opts),
            Err(ControlError::Dimension(_))
        ));

        let too_wide = Array2::zeros((3, 2));
        assert!(matches!(
            simulate(&sys, &too_wide, &times, &opts),
            Err(ControlError::Dimension(_))
        ));

        let bad_x0 = SimulationOptions::default().with_initial_state(arr1(&[1.0, 2.0]));
        assert!(matches!(
            simulate(&sys, &Array2::zeros((3, 1)), &times, &bad_x0),
            Err(ControlError::Dimension(_))
        ));

        assert!(matches!(
            simulate(&sys, &Array2::zeros((3, 1)), &[0.0, 0.1, 0.3], &opts),
            Err(ControlError::UnsupportedGrid(_))
        ));
    }

    #[test]
    fn test_signal_switching() {
        let s = Signal::constant(1.0).then(5, 2.0).then(2, -1.0);
        assert_eq!(s.value_at(0), 1.0);
        assert_eq!(s.value_at(2), -1.0);
        assert_eq!(s.value_at(4), -1.0);
        assert_eq!(s.value_at(5), 2.0);
        assert_eq!(s.value_at(100), 2.0);
    }

    #[test]
    fn test_reference_with_disturbance_layout() {
        let u = reference_with_disturbance(10, 1.0, 0.1, 0.5).unwrap();
        assert_eq!(u.dim(), (10, 2));
        assert_eq!(u[(4, 0)], 0.0);
        assert_eq!(u[(5, 0)], 0.1);
        assert!(u.column(1).iter().all(|&r| r == 1.0));

        assert_eq!(injection_index(2001, 0.5).unwrap(), 1000);
        assert_eq!(injection_index(10, 1.0).unwrap(), 10);
        assert!(injection_index(10, 1.5).is_err());
    }

    #[test]
    fn test_time_output_pairs() {
        let sys = first_order(1.0, 1.0);
        let times = [0.0, 0.5, 1.0];
        let u = Array2::ones((3, 1));
        let traj = simulate(&sys, &u, &times, &SimulationOptions::default()).unwrap();
        let pairs = traj.time_output_pairs(0).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], (0.0, 0.0));
        assert_eq!(pairs[2].0, 1.0);
        assert!(traj.output(1).is_err());
    }

    #[test]
    fn test_step_info_first_order() {
        let t: Vec<f64> = (0..=10_000).map(|k| k as f64 * 1e-3).collect();
        let y: Vec<f64> = t.iter().map(|&t| 1.0 - (-t).exp()).collect();
        let info = StepInfo::from_response(&t, &y, 0.02).unwrap();

        assert_relative_eq!(info.rise_time.unwrap(), 9f64.ln(), max_relative = 1e-3);
        assert_eq!(info.overshoot_percent, 0.0);
        assert_relative_eq!(info.settling_time, 50f64.ln(), max_relative = 1e-2);
        assert_relative_eq!(info.steady_state, 1.0, max_relative = 1e-4);
    }

    #[test]
    fn test_step_info_overshoot() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 0.8, 1.2, 0.95, 1.0];
        let info = StepInfo::from_response(&t, &y, 0.1).unwrap();
        assert_relative_eq!(info.overshoot_percent, 20.0, max_relative = 1e-12);
        assert_eq!(info.peak_time, 2.0);
        assert_eq!(info.settling_time, 3.0);
        // 0.1 at t = 0.125, 0.9 at t = 1.25
        assert_relative_eq!(info.rise_time.unwrap(), 1.125, max_relative = 1e-12);
    }

    #[test]
    fn test_step_info_flat() {
        let info = StepInfo::from_response(&[0.0, 1.0], &[2.0, 2.0], 0.05).unwrap();
        assert!(info.rise_time.is_none());
        assert_eq!(info.settling_time, 0.0);
    }
}
