//! Fixed-capacity ring of iterate and residual increments
use nalgebra::{DMatrix, DMatrixView, DVector, DVectorView, RealField};

/// Circular history of the last `m` increments of the map evaluation, `ΔG`,
/// and of the residual, `ΔF`.
///
/// All storage is allocated once. Slots `0..m_k` are active, where `m_k` is
/// the number of finalized increments capped at the capacity; anything past
/// that is stale and must not be read. Finalized `ΔF` columns are stored
/// divided by their own norm, which is kept in `scales`.
#[derive(Clone, Debug, PartialEq)]
pub struct History<T: RealField + Copy> {
    /// Map-evaluation increments, d × m
    d_g: DMatrix<T>,
    /// Normalized residual increments, d × m
    d_f: DMatrix<T>,
    /// Norm each `d_f` column was divided by when it was finalized
    scales: DVector<T>,
    /// Slot holding the increment that is currently being built
    col_idx: usize,
}

impl<T: RealField + Copy> History<T> {
    /// Allocate an empty history for `dim`-dimensional iterates holding at
    /// most `capacity` increments.
    pub fn new(dim: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be greater than zero");
        History {
            d_g: DMatrix::zeros(dim, capacity),
            d_f: DMatrix::zeros(dim, capacity),
            scales: DVector::zeros(capacity),
            col_idx: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.scales.len()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.d_f.nrows()
    }

    /// The slot that the next call to `finalize` completes
    #[inline]
    pub fn col_idx(&self) -> usize {
        self.col_idx
    }

    /// Open the current slot with `-f` and `-g` so that adding the next
    /// residual and evaluation turns it into a true increment.
    pub fn seed(&mut self, f: &DVector<T>, g: &DVectorView<'_, T>) {
        let mut df = self.d_f.column_mut(self.col_idx);
        df.copy_from(f);
        df.neg_mut();

        let mut dg = self.d_g.column_mut(self.col_idx);
        dg.copy_from(g);
        dg.neg_mut();
    }

    /// Complete the current slot with this step's residual `f` and evaluation
    /// `g`, then normalize its residual increment.
    ///
    /// Returns the scale, `max(eps, ‖ΔF‖)`, the column was divided by.
    pub fn finalize(
        &mut self,
        f: &DVector<T>,
        g: &DVectorView<'_, T>,
        eps: T,
    ) -> T {
        let mut dg = self.d_g.column_mut(self.col_idx);
        dg += g;

        let mut df = self.d_f.column_mut(self.col_idx);
        df += f;
        let scale = eps.max(df.norm());
        df /= scale;

        self.scales[self.col_idx] = scale;
        scale
    }

    /// Move to the next slot, wrapping at the capacity
    #[inline]
    pub fn advance(&mut self) {
        self.col_idx = (self.col_idx + 1) % self.capacity();
    }

    /// Normalized residual increment stored in slot `ix`
    #[inline]
    pub fn d_f_col(&self, ix: usize) -> DVectorView<'_, T> {
        self.d_f.column(ix)
    }

    /// The leading `m_k` normalized residual increments
    #[inline]
    pub fn d_f_active(&self, m_k: usize) -> DMatrixView<'_, T> {
        self.d_f.columns(0, m_k)
    }

    /// The leading `m_k` map-evaluation increments
    #[inline]
    pub fn d_g_active(&self, m_k: usize) -> DMatrixView<'_, T> {
        self.d_g.columns(0, m_k)
    }

    /// Scales of the leading `m_k` residual increments
    #[inline]
    pub fn scales_active(&self, m_k: usize) -> DVectorView<'_, T> {
        self.scales.rows(0, m_k)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_from(&mut self, first: usize, value: T) {
        let m = self.capacity();
        if first < m {
            self.d_f.columns_mut(first, m - first).fill(value);
            self.d_g.columns_mut(first, m - first).fill(value);
            self.scales.rows_mut(first, m - first).fill(value);
        }
    }
}
