use log::debug;

use num_traits::{Float, One, Zero};

use dmat_core::{Dimension, DmatCoreError, Matrix, Result};

use super::pivot::{forward_eliminate, row_scale};

/// LU decomposition with scaled partial pivoting, `P A = L U`.
///
/// `L` (unit diagonal) and `U` share one matrix of the input's backend, both
/// addressed through the permutation. A decomposition only exists for a
/// non-singular input; singularity is reported as an error at construction.
#[derive(Debug)]
pub struct LuDecomposition<M: Matrix> {
    lu: M,
    permutation: Vec<usize>,
    exchange_count: usize,
    scale: Vec<M::Value>,
}

impl<M: Matrix> LuDecomposition<M> {
    /// Decomposes `a`, treating only exact zeros as unusable pivots.
    pub fn decompose(a: &M) -> Result<Self> {
        Self::decompose_with_tolerance(a, M::Value::zero())
    }

    /// Decomposes `a`; pivots with magnitude at or below `tolerance` make it
    /// singular.
    pub fn decompose_with_tolerance(a: &M, tolerance: M::Value) -> Result<Self> {
        let dims = a.dims();
        if !dims.is_square() {
            return Err(DmatCoreError::NotSquare(dims));
        }
        let scale = row_scale(a)?;
        let elimination = forward_eliminate(a.try_clone()?, &scale, tolerance)?;

        let n = dims.rows;
        if n > 0 {
            let last = elimination
                .matrix
                .get_or_zero(elimination.permutation[n - 1], n - 1);
            if last.abs() <= tolerance {
                debug!("Zero final pivot in {} matrix", dims);
                return Err(DmatCoreError::SingularMatrix { step: n - 1 });
            }
        }

        Ok(Self {
            lu: elimination.matrix,
            permutation: elimination.permutation,
            exchange_count: elimination.exchange_count,
            scale,
        })
    }

    /// Order of the decomposed matrix.
    pub fn size(&self) -> usize {
        self.permutation.len()
    }

    /// The packed `L\U` matrix, rows in original order.
    pub fn lu(&self) -> &M {
        &self.lu
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_count
    }

    pub fn scale(&self) -> &[M::Value] {
        &self.scale
    }

    /// `U[i][j]`, zero below the diagonal.
    pub fn upper(&self, i: usize, j: usize) -> M::Value {
        if j < i {
            M::Value::zero()
        } else {
            self.lu.get_or_zero(self.permutation[i], j)
        }
    }

    /// `L[i][j]`, one on the diagonal and zero above it.
    pub fn lower(&self, i: usize, j: usize) -> M::Value {
        match j.cmp(&i) {
            std::cmp::Ordering::Less => self.lu.get_or_zero(self.permutation[i], j),
            std::cmp::Ordering::Equal => M::Value::one(),
            std::cmp::Ordering::Greater => M::Value::zero(),
        }
    }

    /// Materializes `L` in the backend of the input.
    pub fn lower_matrix(&self) -> Result<M> {
        self.materialize(|i, j| self.lower(i, j))
    }

    /// Materializes `U` in the backend of the input.
    pub fn upper_matrix(&self) -> Result<M> {
        self.materialize(|i, j| self.upper(i, j))
    }

    /// The permutation as a matrix `P` with `P A = L U`.
    pub fn permutation_matrix(&self) -> Result<M> {
        self.materialize(|i, j| {
            if self.permutation[i] == j {
                M::Value::one()
            } else {
                M::Value::zero()
            }
        })
    }

    fn materialize(&self, cell: impl Fn(usize, usize) -> M::Value) -> Result<M> {
        let n = self.size();
        let mut out = self.lu.allocate(Dimension::new(n, n))?;
        for i in 0..n {
            let row: Vec<_> = (0..n).map(|j| cell(i, j)).collect();
            out.set_row(i, &row)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmat_core::{HeapMatrix, MatrixOps};

    #[test]
    fn test_reconstructs_permuted_input() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[2.0, 1.0, 1.0], [4.0, -6.0, 0.0], [-2.0, 7.0, 2.0]])?;
        let lu = LuDecomposition::decompose(&a)?;
        let pa = lu.permutation_matrix()?.multiply(&a)?;
        let l_u = lu.lower_matrix()?.multiply(&lu.upper_matrix()?)?;
        assert!(pa.approx_eq(&l_u, 1e-12));
        Ok(())
    }

    #[test]
    fn test_rejects_non_square() {
        let a: HeapMatrix = HeapMatrix::zeros(3, 2);
        assert!(matches!(
            LuDecomposition::decompose(&a),
            Err(DmatCoreError::NotSquare(_))
        ));
    }

    #[test]
    fn test_zero_final_pivot_is_singular() -> Result<()> {
        // Elimination succeeds on column 0 but leaves a zero in the last pivot.
        let a = HeapMatrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]])?;
        assert!(matches!(
            LuDecomposition::decompose(&a),
            Err(DmatCoreError::SingularMatrix { step: 1 })
        ));
        Ok(())
    }

    #[test]
    fn test_tolerance_rejects_tiny_pivots() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[1.0, 0.0], [0.0, 1e-14]])?;
        assert!(LuDecomposition::decompose(&a).is_ok());
        assert!(LuDecomposition::decompose_with_tolerance(&a, 1e-12).is_err());
        Ok(())
    }

    #[test]
    fn test_scale_is_kept() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[2.0, -8.0], [0.5, 0.25]])?;
        let lu = LuDecomposition::decompose(&a)?;
        assert_eq!(lu.scale(), &[0.125, 2.0]);
        assert_eq!(lu.size(), 2);
        Ok(())
    }
}
