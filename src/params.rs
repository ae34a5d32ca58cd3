//! Configuration for the accelerator
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::RealField;
use std::fmt;

use crate::consts::{DEFAULT_WINDOW_SIZE, SCALE_EPS};

/// Parameters for [`AndersonAcceleration`](crate::AndersonAcceleration)
///
/// # Example
///
/// ```
/// use anderson::AndersonParams;
///
/// let params = AndersonParams::<f64>::default()
///     .with_window_size(3)
///     .with_rank_tol(1E-10);
///
/// assert_eq!(params.window_size, 3);
/// assert_eq!(params.rank_tol, Some(1E-10));
/// assert!(params.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct AndersonParams<T> {
    /// Maximum number of history columns retained, `m`
    pub window_size: usize,
    /// Lower clamp on the residual increment norm used for column scaling
    pub scale_eps: T,
    /// Singular-value cutoff for the normal-equation solve, relative to the
    /// largest singular value. `None` uses machine epsilon times the number
    /// of active columns.
    pub rank_tol: Option<T>,
}

impl<T: RealField + Copy> Default for AndersonParams<T> {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            scale_eps: nalgebra::convert(SCALE_EPS),
            rank_tol: None,
        }
    }
}

impl<T: RealField + Copy> AndersonParams<T> {
    pub fn with_window_size(self, window_size: usize) -> Self {
        Self {
            window_size,
            ..self
        }
    }

    pub fn with_scale_eps(self, scale_eps: T) -> Self {
        Self { scale_eps, ..self }
    }

    pub fn with_rank_tol(self, rank_tol: T) -> Self {
        Self {
            rank_tol: Some(rank_tol),
            ..self
        }
    }

    /// Check that the parameters describe a usable accelerator
    ///
    /// # Example
    ///
    /// ```
    /// use anderson::{AndersonParams, ParamsError};
    ///
    /// let params = AndersonParams::<f64>::default().with_window_size(0);
    /// assert_eq!(params.validate(), Err(ParamsError::WindowSizeTooSmall));
    ///
    /// let params = AndersonParams::<f64>::default().with_scale_eps(-1.0);
    /// assert_eq!(params.validate(), Err(ParamsError::ScaleEpsNotPositive));
    /// ```
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.window_size == 0 {
            Err(ParamsError::WindowSizeTooSmall)
        } else if !(self.scale_eps > T::zero()) || !self.scale_eps.is_finite()
        {
            Err(ParamsError::ScaleEpsNotPositive)
        } else if self
            .rank_tol
            .is_some_and(|tol| !(tol >= T::zero()) || !tol.is_finite())
        {
            Err(ParamsError::RankTolNegative)
        } else {
            Ok(())
        }
    }

    /// Relative singular-value cutoff for a system with `m_k` active columns
    pub(crate) fn rank_cutoff(&self, m_k: usize) -> T {
        self.rank_tol.unwrap_or_else(|| {
            T::default_epsilon() * nalgebra::convert::<f64, T>(m_k as f64)
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ParamsError {
    /// The window size must be at least one
    WindowSizeTooSmall,
    /// The scale clamp is zero, negative, infinite, or NaN
    ScaleEpsNotPositive,
    /// The rank tolerance is negative, infinite, or NaN
    RankTolNegative,
}

impl std::error::Error for ParamsError {}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowSizeTooSmall => {
                write!(f, "window size must be greater than zero")
            }
            Self::ScaleEpsNotPositive => {
                write!(f, "scale_eps must be positive and finite")
            }
            Self::RankTolNegative => {
                write!(f, "rank_tol must be non-negative and finite")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-20;

    #[test]
    fn default_params_are_valid() {
        let params = AndersonParams::<f64>::default();
        assert_eq!(params.window_size, DEFAULT_WINDOW_SIZE);
        assert::close(params.scale_eps, SCALE_EPS, TOL);
        assert!(params.rank_tol.is_none());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn default_f32_params_are_valid() {
        let params = AndersonParams::<f32>::default();
        assert!(params.scale_eps > 0.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn nan_scale_eps_is_rejected() {
        let params = AndersonParams::<f64>::default().with_scale_eps(f64::NAN);
        assert_eq!(params.validate(), Err(ParamsError::ScaleEpsNotPositive));
    }

    #[test]
    fn negative_rank_tol_is_rejected() {
        let params = AndersonParams::<f64>::default().with_rank_tol(-1E-3);
        assert_eq!(params.validate(), Err(ParamsError::RankTolNegative));
    }

    #[test]
    fn zero_rank_tol_is_accepted() {
        let params = AndersonParams::<f64>::default().with_rank_tol(0.0);
        assert!(params.validate().is_ok());
        assert::close(params.rank_cutoff(4), 0.0, TOL);
    }

    #[test]
    fn default_rank_cutoff_grows_with_active_columns() {
        let params = AndersonParams::<f64>::default();
        assert::close(params.rank_cutoff(1), f64::EPSILON, TOL);
        assert::close(params.rank_cutoff(3), 3.0 * f64::EPSILON, TOL);
    }

    #[cfg(feature = "serde1")]
    #[test]
    fn params_serde_roundtrip() {
        let params = AndersonParams::<f64>::default().with_window_size(7);
        let json = serde_json::to_string(&params).unwrap();
        let back: AndersonParams<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
