//! Normal equations for the Anderson mixing coefficients
//!
//! Given the active normalized residual increments `ΔF` (d × m_k) and the
//! current residual `F`, the mixing coefficients solve
//!
//! ```text
//! min_θ ‖F - ΔF θ‖²   ⇔   (ΔFᵀ ΔF) θ = ΔFᵀ F
//! ```
//!
//! The Gram matrix `ΔFᵀ ΔF` is kept across calls; only the row and column of
//! the increment finalized in a step change, so only those are recomputed.
use log::debug;
use nalgebra::{DMatrix, DMatrixView, DVector, DVectorView, RealField};

/// Gram matrix and mixing coefficients over the history window
#[derive(Clone, Debug, PartialEq)]
pub struct NormalEquations<T: RealField + Copy> {
    /// m × m, only the leading m_k × m_k block is meaningful
    gram: DMatrix<T>,
    /// Coefficients from the most recent solve, leading m_k entries valid
    theta: DVector<T>,
}

impl<T: RealField + Copy> NormalEquations<T> {
    pub fn new(capacity: usize) -> Self {
        NormalEquations {
            gram: DMatrix::zeros(capacity, capacity),
            theta: DVector::zeros(capacity),
        }
    }

    /// Closed-form coefficient for a lone history column
    ///
    /// `θ = (ΔF · F) / ‖ΔF‖²`, or zero when `‖ΔF‖ <= eps` so that a column
    /// carrying no information leaves the evaluation unmixed.
    pub fn solve_single(
        &mut self,
        d_f: &DVectorView<'_, T>,
        f: &DVector<T>,
        eps: T,
    ) -> T {
        let sqr_norm = d_f.norm_squared();
        self.gram[(0, 0)] = sqr_norm;

        let norm = sqr_norm.sqrt();
        let theta = if norm > eps {
            // Dividing both factors keeps the products in range
            (d_f / norm).dot(&(f / norm))
        } else {
            debug!("anderson: single history column has norm {norm}, not mixing");
            T::zero()
        };
        self.theta[0] = theta;
        theta
    }

    /// Refresh row and column `slot` of the Gram matrix from the active
    /// increments. Every other entry is carried over from previous calls.
    pub fn update(&mut self, d_f: &DMatrixView<'_, T>, slot: usize) {
        debug_assert!(slot < d_f.ncols());
        let inner_prods = d_f.tr_mul(&d_f.column(slot));
        for (j, &ip) in inner_prods.iter().enumerate() {
            self.gram[(slot, j)] = ip;
            self.gram[(j, slot)] = ip;
        }
    }

    /// Solve the m_k × m_k normal equations for the mixing coefficients.
    ///
    /// The solve goes through a singular value decomposition and discards
    /// singular values at or below `rel_tol` times the largest one, giving
    /// the minimum-norm least-squares solution when the history columns are
    /// nearly dependent.
    pub fn solve(
        &mut self,
        d_f: &DMatrixView<'_, T>,
        f: &DVector<T>,
        rel_tol: T,
    ) -> DVectorView<'_, T> {
        let m_k = d_f.ncols();
        let rhs = d_f.tr_mul(f);
        let svd = self
            .gram
            .view((0, 0), (m_k, m_k))
            .clone_owned()
            .svd(true, true);

        let sv_max = svd
            .singular_values
            .iter()
            .fold(T::zero(), |acc, &sv| acc.max(sv));
        let cutoff = sv_max * rel_tol;

        let rank = svd
            .singular_values
            .iter()
            .filter(|&&sv| sv > cutoff)
            .count();
        if rank < m_k {
            debug!("anderson: normal equations rank {rank} of {m_k}");
        }

        let mut theta = self.theta.rows_mut(0, m_k);
        match svd.solve(&rhs, cutoff) {
            Ok(sol) => theta.copy_from(&sol),
            Err(err) => {
                debug!("anderson: normal equation solve failed ({err}), not mixing");
                theta.fill(T::zero());
            }
        }
        self.theta.rows(0, m_k)
    }

    /// Leading `m_k` coefficients of the most recent solve
    #[inline]
    pub fn theta(&self, m_k: usize) -> DVectorView<'_, T> {
        self.theta.rows(0, m_k)
    }

    /// Leading `m_k × m_k` block of the Gram matrix
    #[inline]
    pub fn gram(&self, m_k: usize) -> DMatrixView<'_, T> {
        self.gram.view((0, 0), (m_k, m_k))
    }

    /// Recompute the whole Gram block from scratch
    pub fn recompute_full(d_f: &DMatrixView<'_, T>) -> DMatrix<T> {
        d_f.tr_mul(d_f)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_from(&mut self, first: usize, value: T) {
        let m = self.theta.len();
        for i in 0..m {
            for j in 0..m {
                if i >= first || j >= first {
                    self.gram[(i, j)] = value;
                }
            }
        }
        if first < m {
            self.theta.rows_mut(first, m - first).fill(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TOL: f64 = 1E-12;

    fn unit_columns(cols: &[&[f64]]) -> DMatrix<f64> {
        let nrows = cols[0].len();
        let mut mat = DMatrix::from_fn(nrows, cols.len(), |i, j| cols[j][i]);
        for mut col in mat.column_iter_mut() {
            let norm = col.norm();
            col /= norm;
        }
        mat
    }

    #[test]
    fn update_matches_full_recompute() {
        let d_f = unit_columns(&[
            &[1.0, 0.0, 2.0],
            &[0.5, 1.0, -1.0],
            &[3.0, -2.0, 0.25],
        ]);
        let mut neq = NormalEquations::<f64>::new(3);
        for m_k in 1..=3 {
            let view = d_f.columns(0, m_k);
            neq.update(&view, m_k - 1);
        }
        let full = NormalEquations::recompute_full(&d_f.columns(0, 3));
        assert_relative_eq!(neq.gram(3).clone_owned(), full, epsilon = TOL);
    }

    #[test]
    fn update_only_touches_slot_row_and_column() {
        let d_f = unit_columns(&[&[1.0, 0.0], &[1.0, 1.0]]);
        let mut neq = NormalEquations::<f64>::new(2);
        neq.gram[(0, 0)] = 42.0;
        neq.update(&d_f.columns(0, 2), 1);

        assert::close(neq.gram[(0, 0)], 42.0, TOL);
        assert::close(neq.gram[(1, 1)], 1.0, TOL);
        assert::close(neq.gram[(0, 1)], 0.5_f64.sqrt(), TOL);
        assert::close(neq.gram[(1, 0)], 0.5_f64.sqrt(), TOL);
    }

    #[test]
    fn solve_recovers_exact_combination() {
        let d_f = unit_columns(&[&[1.0, 0.0, 0.0], &[1.0, 1.0, 0.0]]);
        let f = 2.0 * d_f.column(0) - 3.0 * d_f.column(1);
        let mut neq = NormalEquations::<f64>::new(4);
        let view = d_f.columns(0, 2);
        neq.update(&view, 0);
        neq.update(&view, 1);

        let theta = neq.solve(&view, &f, 1E-14).clone_owned();
        assert::close(theta[0], 2.0, 1E-10);
        assert::close(theta[1], -3.0, 1E-10);
    }

    #[test]
    fn solve_handles_duplicate_columns() {
        // Two identical columns make the Gram matrix singular
        let d_f = unit_columns(&[&[1.0, 2.0], &[1.0, 2.0]]);
        let f = DVector::from_column_slice(&[2.0, 4.0]);
        let mut neq = NormalEquations::<f64>::new(2);
        let view = d_f.columns(0, 2);
        neq.update(&view, 0);
        neq.update(&view, 1);

        let theta = neq.solve(&view, &f, 1E-14).clone_owned();
        assert!(theta.iter().all(|t| t.is_finite()));
        // Minimum-norm solution splits the weight evenly
        assert::close(theta[0], theta[1], 1E-10);
        let fitted = &view * &theta;
        assert_relative_eq!(fitted, f, epsilon = 1E-10);
    }

    #[test]
    fn solve_of_zero_history_gives_zero_theta() {
        let d_f = DMatrix::<f64>::zeros(3, 2);
        let f = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
        let mut neq = NormalEquations::<f64>::new(2);
        let view = d_f.columns(0, 2);
        neq.update(&view, 0);
        neq.update(&view, 1);

        let theta = neq.solve(&view, &f, 1E-14).clone_owned();
        assert!(theta.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn single_column_agrees_with_general_solve() {
        let d_f = unit_columns(&[&[3.0, -1.0, 2.0]]);
        let f = DVector::from_column_slice(&[0.5, 1.5, -2.0]);

        let mut single = NormalEquations::<f64>::new(1);
        let theta_single = single.solve_single(&d_f.column(0), &f, 1E-14);

        let mut general = NormalEquations::<f64>::new(1);
        let view = d_f.columns(0, 1);
        general.update(&view, 0);
        let theta_general = general.solve(&view, &f, 1E-14)[0];

        assert::close(theta_single, theta_general, TOL);
        assert::close(single.gram[(0, 0)], general.gram[(0, 0)], TOL);
    }

    #[test]
    fn single_column_guard_returns_zero() {
        let d_f = DMatrix::<f64>::from_element(2, 1, 1E-20);
        let f = DVector::from_column_slice(&[1.0, 1.0]);
        let mut neq = NormalEquations::<f64>::new(1);
        let theta = neq.solve_single(&d_f.column(0), &f, 1E-14);
        assert_eq!(theta, 0.0);
        assert_eq!(neq.theta(1)[0], 0.0);
    }
}
