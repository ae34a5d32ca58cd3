//! Anderson acceleration for fixed-point iterations
//!
//! Plain fixed-point iteration, `u ← g(u)`, converges slowly or not at all
//! for many maps. Anderson acceleration keeps a short window of past
//! increments of `g(u)` and of the residual `g(u) - u`, solves a small
//! least-squares problem for the combination of them that best cancels the
//! current residual, and extrapolates the next iterate from it. No
//! derivatives of `g` are needed.
//!
//! The accelerator does not own the iteration: the caller evaluates `g` and
//! decides when to stop.
//!
//! # Example
//!
//! ```
//! use anderson::prelude::*;
//! use nalgebra::DVector;
//!
//! // g(u) = cos(u), element-wise, has a fixed point at u ≈ 0.739085
//! let g = |u: &DVector<f64>| u.map(f64::cos);
//!
//! let mut aa = AndersonAcceleration::new(3, DVector::from_element(4, 1.0))
//!     .unwrap();
//!
//! let mut n_iters = 0;
//! while (g(aa.current()) - aa.current()).norm() > 1E-10 {
//!     let gu = g(aa.current());
//!     aa.compute(&gu);
//!     n_iters += 1;
//! }
//!
//! assert!(n_iters < 20);
//! assert!((aa.current()[0] - 0.739_085_133_215_160_6).abs() < 1E-9);
//! ```
//!
//! # Precision
//!
//! The accelerator is generic over any [`nalgebra::RealField`] scalar, so the
//! precision is picked per instance with `AndersonAcceleration<f32>` or
//! `AndersonAcceleration<f64>`.
//!
//! # Logging
//!
//! Per-step bookkeeping is reported at `trace` level and degenerate history
//! (a rank-deficient window or an uninformative lone column) at `debug`
//! level through the [`log`](https://docs.rs/log) facade.

pub mod consts;
pub mod history;
pub mod normal_eq;
pub mod prelude;

mod accel;
mod params;

pub use accel::{AndersonAcceleration, AndersonError};
pub use params::{AndersonParams, ParamsError};
