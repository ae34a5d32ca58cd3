//! Numerical constants

/// Lower clamp on the norm used to rescale a freshly finalized residual
/// increment, and the threshold below which a lone history column is treated
/// as carrying no information.
pub const SCALE_EPS: f64 = 1E-14;

/// Window size used by [`AndersonParams::default`](crate::AndersonParams).
pub const DEFAULT_WINDOW_SIZE: usize = 5;
