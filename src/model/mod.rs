//! State-Space Models
//!
//! [`StateSpaceModel`] holds the four matrices of
//! ```text
//! x' = A x + B u
//! y  = C x + D u
//! ```
//! Shapes are validated once on construction; afterwards the model is an
//! immutable value. Closed-loop and augmented models are built as new
//! instances, never by mutating the source plant.

use ndarray::{s, Array2};

use crate::diagnostics::Warning;
use crate::error::{ControlError, ControlResult};
use crate::linalg::max_abs;
use crate::synthesis::FeedbackGain;

/// Continuous-time LTI system in state-space form.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSpaceModel {
    a: Array2<f64>,
    b: Array2<f64>,
    c: Array2<f64>,
    d: Array2<f64>,
}

impl StateSpaceModel {
    /// Build a model from (A, B, C, D).
    ///
    /// # Errors
    ///
    /// * `Dimension` - A not square, order 0, no inputs or outputs, or
    ///   B, C, D shapes inconsistent with A
    /// * `InvalidParameter` - any entry is NaN or infinite
    ///
    /// # Examples
    ///
    /// ```
    /// use lti_design::model::StateSpaceModel;
    /// use ndarray::arr2;
    ///
    /// let plant = StateSpaceModel::new(
    ///     arr2(&[[0.0, 1.0], [0.0, -0.01]]),
    ///     arr2(&[[0.0], [0.1]]),
    ///     arr2(&[[1.0, 0.0]]),
    ///     arr2(&[[0.0]]),
    /// )
    /// .unwrap();
    /// assert_eq!(plant.order(), 2);
    /// assert!(plant.is_strictly_proper());
    /// ```
    pub fn new(
        a: Array2<f64>,
        b: Array2<f64>,
        c: Array2<f64>,
        d: Array2<f64>,
    ) -> ControlResult<Self> {
        let n = a.nrows();
        let m = b.ncols();
        let p = c.nrows();

        if a.ncols() != n {
            return Err(ControlError::Dimension(format!(
                "A must be square, got {}×{}",
                n,
                a.ncols()
            )));
        }
        if n == 0 {
            return Err(ControlError::Dimension(
                "state order must be at least 1".to_string(),
            ));
        }
        if b.nrows() != n {
            return Err(ControlError::Dimension(format!(
                "B rows ({}) must match A dimension ({})",
                b.nrows(),
                n
            )));
        }
        if m == 0 {
            return Err(ControlError::Dimension(
                "B must have at least one input column".to_string(),
            ));
        }
        if c.ncols() != n {
            return Err(ControlError::Dimension(format!(
                "C columns ({}) must match A dimension ({})",
                c.ncols(),
                n
            )));
        }
        if p == 0 {
            return Err(ControlError::Dimension(
                "C must have at least one output row".to_string(),
            ));
        }
        if d.nrows() != p {
            return Err(ControlError::Dimension(format!(
                "D rows ({}) must match C rows ({})",
                d.nrows(),
                p
            )));
        }
        if d.ncols() != m {
            return Err(ControlError::Dimension(format!(
                "D columns ({}) must match B columns ({})",
                d.ncols(),
                m
            )));
        }

        for (name, mat) in [("A", &a), ("B", &b), ("C", &c), ("D", &d)] {
            if mat.iter().any(|v| !v.is_finite()) {
                return Err(ControlError::InvalidParameter(format!(
                    "{} contains non-finite entries",
                    name
                )));
            }
        }

        Ok(Self { a, b, c, d })
    }

    /// Build a strictly proper model (D = 0).
    pub fn strictly_proper(a: Array2<f64>, b: Array2<f64>, c: Array2<f64>) -> ControlResult<Self> {
        let d = Array2::zeros((c.nrows(), b.ncols()));
        Self::new(a, b, c, d)
    }

    pub fn a(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn b(&self) -> &Array2<f64> {
        &self.b
    }

    pub fn c(&self) -> &Array2<f64> {
        &self.c
    }

    pub fn d(&self) -> &Array2<f64> {
        &self.d
    }

    /// State dimension n.
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// Number of inputs m.
    pub fn inputs(&self) -> usize {
        self.b.ncols()
    }

    /// Number of outputs p.
    pub fn outputs(&self) -> usize {
        self.c.nrows()
    }

    /// True when D is identically zero.
    pub fn is_strictly_proper(&self) -> bool {
        self.d.iter().all(|&v| v == 0.0)
    }

    /// Warning to attach to designs that assume D = 0, if D is nonzero.
    pub fn feedthrough_warning(&self) -> Option<Warning> {
        if self.is_strictly_proper() {
            None
        } else {
            Some(Warning::NonZeroFeedthrough {
                max_abs: max_abs(&self.d),
            })
        }
    }

    /// Close the loop with u = -K x + v.
    ///
    /// Returns the model from the new input v:
    /// ```text
    /// x' = (A - B K) x + B v
    /// y  = (C - D K) x + D v
    /// ```
    pub fn closed_loop(&self, gain: &FeedbackGain) -> ControlResult<StateSpaceModel> {
        let k = gain.matrix();
        if k.nrows() != self.inputs() || k.ncols() != self.order() {
            return Err(ControlError::Dimension(format!(
                "feedback gain must be {}×{}, got {}×{}",
                self.inputs(),
                self.order(),
                k.nrows(),
                k.ncols()
            )));
        }

        let a_cl = &self.a - &self.b.dot(k);
        let c_cl = &self.c - &self.d.dot(k);
        StateSpaceModel::new(a_cl, self.b.clone(), c_cl, self.d.clone())
    }

    /// Replace the input matrices, keeping A and C.
    ///
    /// Used to restructure the inputs of a derived model (for example
    /// `[disturbance, reference]` channels); `b` and `d` must have the same
    /// number of columns.
    pub fn with_inputs(&self, b: Array2<f64>, d: Array2<f64>) -> ControlResult<StateSpaceModel> {
        StateSpaceModel::new(self.a.clone(), b, self.c.clone(), d)
    }

    /// Submodel driven by the input columns `range`.
    pub fn select_inputs(&self, range: std::ops::Range<usize>) -> ControlResult<StateSpaceModel> {
        if range.start >= range.end || range.end > self.inputs() {
            return Err(ControlError::Dimension(format!(
                "input range {:?} out of bounds for {} inputs",
                range,
                self.inputs()
            )));
        }
        let b = self.b.slice(s![.., range.clone()]).to_owned();
        let d = self.d.slice(s![.., range]).to_owned();
        self.with_inputs(b, d)
    }
}
