//! Anderson acceleration of a fixed-point iteration `u ← g(u)`
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::trace;
use nalgebra::{DMatrixView, DVector, DVectorView, RealField};
use std::fmt;

use crate::history::History;
use crate::normal_eq::NormalEquations;
use crate::params::{AndersonParams, ParamsError};

/// [Anderson acceleration](https://en.wikipedia.org/wiki/Anderson_acceleration)
/// for fixed-point iterations.
///
/// The caller owns the iteration loop: evaluate the map at
/// [`current`](AndersonAcceleration::current), pass the evaluation to
/// [`compute`](AndersonAcceleration::compute), and evaluate the map at the
/// returned vector next. The accelerator keeps a window of the last `m`
/// increments and mixes them into each new evaluation so that the residual
/// `g(u) - u` is minimized in the least-squares sense over that window.
///
/// The scalar type is a parameter, so `f32` and `f64` accelerators can live in
/// the same program.
///
/// # Example
///
/// Solve `u = A u + b` for a contractive `A`.
///
/// ```
/// use anderson::AndersonAcceleration;
/// use nalgebra::{DMatrix, DVector};
///
/// let a = DMatrix::from_row_slice(2, 2, &[0.5, 0.2, 0.1, 0.4]);
/// let b = DVector::from_column_slice(&[1.0, 2.0]);
/// let g = |u: &DVector<f64>| &a * u + &b;
///
/// let mut aa = AndersonAcceleration::new(2, DVector::zeros(2)).unwrap();
///
/// for _ in 0..3 {
///     let gu = g(aa.current());
///     aa.compute(&gu);
/// }
///
/// // With a window at least as large as the dimension, a linear map is
/// // solved after dim + 1 steps.
/// let fixed_point = DVector::from_column_slice(&[25.0 / 7.0, 27.5 / 7.0]);
/// assert!((aa.current() - fixed_point).norm() < 1E-10);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AndersonAcceleration<T: RealField + Copy> {
    params: AndersonParams<T>,
    history: History<T>,
    normal_eq: NormalEquations<T>,
    /// Most recent accepted iterate
    current_u: DVector<T>,
    /// Residual of the most recent evaluation
    current_f: DVector<T>,
    /// Number of `compute` calls since initialization
    iter: usize,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum AndersonError {
    /// The accelerator parameters are invalid
    InvalidParams(ParamsError),
    /// The initial iterate has no entries
    EmptyIterate,
    /// The initial iterate length differs from the requested dimension
    DimensionMismatch { expected: usize, got: usize },
}

impl std::error::Error for AndersonError {}

impl fmt::Display for AndersonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParams(err) => write!(f, "invalid parameters: {err}"),
            Self::EmptyIterate => {
                write!(f, "the initial iterate must have at least one entry")
            }
            Self::DimensionMismatch { expected, got } => write!(
                f,
                "expected an iterate of dimension {expected}, got {got}"
            ),
        }
    }
}

impl From<ParamsError> for AndersonError {
    fn from(err: ParamsError) -> Self {
        AndersonError::InvalidParams(err)
    }
}

impl<T: RealField + Copy> AndersonAcceleration<T> {
    /// Create an accelerator keeping `window_size` history columns, starting
    /// from `u0`. The dimension of every later vector is `u0.len()`.
    ///
    /// # Example
    ///
    /// ```
    /// use anderson::{AndersonAcceleration, AndersonError, ParamsError};
    /// use nalgebra::DVector;
    ///
    /// assert!(AndersonAcceleration::new(3, DVector::<f64>::zeros(4)).is_ok());
    ///
    /// let no_window = AndersonAcceleration::new(0, DVector::<f64>::zeros(4));
    /// assert_eq!(
    ///     no_window.unwrap_err(),
    ///     AndersonError::InvalidParams(ParamsError::WindowSizeTooSmall)
    /// );
    /// ```
    pub fn new(
        window_size: usize,
        u0: DVector<T>,
    ) -> Result<Self, AndersonError> {
        let params = AndersonParams::default().with_window_size(window_size);
        Self::with_params(params, u0)
    }

    /// Create an accelerator from a full parameter block
    pub fn with_params(
        params: AndersonParams<T>,
        u0: DVector<T>,
    ) -> Result<Self, AndersonError> {
        params.validate()?;
        if u0.is_empty() {
            return Err(AndersonError::EmptyIterate);
        }
        Ok(Self::new_unchecked(params, u0))
    }

    /// Create an accelerator from a raw buffer holding a `dim`-dimensional
    /// initial iterate. The buffer is copied.
    pub fn from_slice(
        window_size: usize,
        dim: usize,
        u0: &[T],
    ) -> Result<Self, AndersonError> {
        if u0.len() != dim {
            return Err(AndersonError::DimensionMismatch {
                expected: dim,
                got: u0.len(),
            });
        }
        Self::new(window_size, DVector::from_column_slice(u0))
    }

    /// Creates an accelerator without validating the parameters or the
    /// initial iterate.
    #[must_use]
    pub fn new_unchecked(params: AndersonParams<T>, u0: DVector<T>) -> Self {
        let dim = u0.len();
        let m = params.window_size;
        AndersonAcceleration {
            params,
            history: History::new(dim, m),
            normal_eq: NormalEquations::new(m),
            current_f: DVector::zeros(dim),
            current_u: u0,
            iter: 0,
        }
    }

    /// Discard all state and start over with a new window size and initial
    /// iterate, keeping the remaining parameters.
    ///
    /// On error the accelerator is left untouched.
    pub fn init(
        &mut self,
        window_size: usize,
        u0: DVector<T>,
    ) -> Result<(), AndersonError> {
        let params = self.params.with_window_size(window_size);
        *self = Self::with_params(params, u0)?;
        Ok(())
    }

    /// Overwrite the current iterate, e.g. after an outer solver rejects an
    /// accelerated step. History and the iteration count are kept, so the
    /// next [`compute`](AndersonAcceleration::compute) measures its residual
    /// against `u` while mixing with the accumulated history.
    ///
    /// # Panics
    ///
    /// Panics if `u` does not have the accelerator's dimension.
    pub fn replace(&mut self, u: &DVector<T>) {
        self.replace_slice(u.as_slice());
    }

    /// Slice version of [`replace`](AndersonAcceleration::replace)
    pub fn replace_slice(&mut self, u: &[T]) {
        assert_eq!(
            u.len(),
            self.dim(),
            "replacement iterate has the wrong dimension"
        );
        self.current_u.copy_from_slice(u);
    }

    /// Take the map evaluated at [`current`](AndersonAcceleration::current)
    /// and return the next iterate to evaluate the map at.
    ///
    /// The returned vector is owned by the accelerator and is overwritten by
    /// the next call to `compute` or `replace`.
    ///
    /// # Panics
    ///
    /// Panics if `g` does not have the accelerator's dimension.
    pub fn compute(&mut self, g: &DVector<T>) -> &DVector<T> {
        self.compute_slice(g.as_slice())
    }

    /// Slice version of [`compute`](AndersonAcceleration::compute)
    pub fn compute_slice(&mut self, g: &[T]) -> &DVector<T> {
        assert_eq!(
            g.len(),
            self.dim(),
            "map evaluation has the wrong dimension"
        );
        let g = DVectorView::from_slice(g, g.len());

        self.current_f.copy_from(&g);
        self.current_f -= &self.current_u;

        if self.iter == 0 {
            // Cold start: nothing to mix with, take the plain step
            self.history.seed(&self.current_f, &g);
            self.current_u.copy_from(&g);
        } else {
            self.accelerate(&g);
        }

        self.iter += 1;
        &self.current_u
    }

    fn accelerate(&mut self, g: &DVectorView<'_, T>) {
        let eps = self.params.scale_eps;
        let slot = self.history.col_idx();
        self.history.finalize(&self.current_f, g, eps);

        let m_k = self.history.capacity().min(self.iter);
        trace!(
            "anderson: iter = {}, m_k = {}, slot = {}",
            self.iter,
            m_k,
            slot
        );

        if m_k == 1 {
            self.normal_eq.solve_single(
                &self.history.d_f_col(slot),
                &self.current_f,
                eps,
            );
        } else {
            let d_f = self.history.d_f_active(m_k);
            self.normal_eq.update(&d_f, slot);
            self.normal_eq
                .solve(&d_f, &self.current_f, self.params.rank_cutoff(m_k));
        }

        mix(
            &mut self.current_u,
            g,
            &self.history.d_g_active(m_k),
            &self.normal_eq.theta(m_k),
            &self.history.scales_active(m_k),
        );

        // The new slot holds the increment starting at the iterate just
        // produced, completed by the next call
        self.history.advance();
        self.history.seed(&self.current_f, g);
    }

    /// The most recent iterate: the initial iterate, the last value returned
    /// by `compute`, or the last replacement.
    #[inline]
    pub fn current(&self) -> &DVector<T> {
        &self.current_u
    }

    /// Residual `g - u` of the most recent `compute` call. Zero before the
    /// first call.
    #[inline]
    pub fn residual(&self) -> &DVector<T> {
        &self.current_f
    }

    /// Number of `compute` calls since initialization
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iter
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.params.window_size
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.current_u.len()
    }

    #[inline]
    pub fn params(&self) -> &AndersonParams<T> {
        &self.params
    }

    /// Number of history columns mixed in the most recent `compute` call
    ///
    /// # Example
    ///
    /// ```
    /// use anderson::AndersonAcceleration;
    /// use nalgebra::DVector;
    ///
    /// let mut aa = AndersonAcceleration::new(2, DVector::from_element(3, 1.0)).unwrap();
    /// let g = DVector::from_element(3, 0.5);
    /// assert_eq!(aa.active_columns(), 0);
    ///
    /// aa.compute(&g);
    /// assert_eq!(aa.active_columns(), 0);
    /// aa.compute(&g);
    /// assert_eq!(aa.active_columns(), 1);
    /// aa.compute(&g);
    /// aa.compute(&g);
    /// assert_eq!(aa.active_columns(), 2);
    /// ```
    #[inline]
    pub fn active_columns(&self) -> usize {
        self.history.capacity().min(self.iter.saturating_sub(1))
    }

    /// Mixing coefficients from the most recent `compute` call, one per
    /// active history column, in units of the normalized residual increments
    #[inline]
    pub fn coefficients(&self) -> DVectorView<'_, T> {
        self.normal_eq.theta(self.active_columns())
    }
}

/// `u = g - ΔG (θ ./ scales)`
fn mix<T: RealField + Copy>(
    u: &mut DVector<T>,
    g: &DVectorView<'_, T>,
    d_g: &DMatrixView<'_, T>,
    theta: &DVectorView<'_, T>,
    scales: &DVectorView<'_, T>,
) {
    let weights = theta.component_div(scales);
    u.copy_from(g);
    u.gemv(-T::one(), d_g, &weights, T::one());
}
