use num_traits::{Float, One, Zero};

use dmat_core::{Dimension, Matrix, Result};

use super::lu::LuDecomposition;

impl<M: Matrix> LuDecomposition<M> {
    /// `(-1)^exchanges` times the product of the pivots.
    pub fn determinant(&self) -> M::Value {
        let product = (0..self.size()).fold(M::Value::one(), |acc, i| acc * self.upper(i, i));
        if self.exchange_count() % 2 == 0 {
            product
        } else {
            -product
        }
    }

    /// Sum of the pivots.
    pub fn trace(&self) -> M::Value {
        (0..self.size()).fold(M::Value::zero(), |acc, i| acc + self.upper(i, i))
    }
}

/// Determinant of `a` as a `1x1` matrix of `a`'s backend.
pub fn determinant<M: Matrix>(a: &M) -> Result<M> {
    let value = LuDecomposition::decompose(a)?.determinant();
    let mut out = a.allocate(Dimension::new(1, 1))?;
    out.set(0, 0, value)?;
    Ok(out)
}

/// Sum of the pivots of `a`'s decomposition.
pub fn trace<M: Matrix>(a: &M) -> Result<M::Value> {
    Ok(LuDecomposition::decompose(a)?.trace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmat_core::{DmatCoreError, HeapMatrix};

    #[test]
    fn test_identity_determinant() -> Result<()> {
        for n in 1..6 {
            let lu = LuDecomposition::decompose(&HeapMatrix::<f64>::identity(n))?;
            assert_eq!(lu.determinant(), 1.0);
            assert_eq!(lu.exchange_count(), 0);
            assert_eq!(lu.trace(), n as f64);
        }
        Ok(())
    }

    #[test]
    fn test_determinant_is_one_by_one_matrix() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[1.0, 1.0, 2.0], [-1.0, 0.0, 2.0], [0.0, 1.0, 2.0]])?;
        let det = determinant(&a)?;
        assert_eq!(det.dims(), Dimension::new(1, 1));
        assert!((det.get_or_zero(0, 0) + 2.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_sign_follows_exchange_parity() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[0.0, 1.0], [1.0, 0.0]])?;
        let lu = LuDecomposition::decompose(&a)?;
        assert_eq!(lu.exchange_count(), 1);
        assert_eq!(lu.determinant(), -1.0);
        Ok(())
    }

    #[test]
    fn test_singular_has_no_determinant() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]])?;
        assert!(matches!(
            determinant(&a),
            Err(DmatCoreError::SingularMatrix { .. })
        ));
        Ok(())
    }
}
