use log::debug;

use num_traits::{Float, One, Zero};

use dmat_core::{Matrix, MatrixOps, Result};

use super::lu_solver::LuSolver;

impl<M: Matrix> LuSolver<M> {
    /// Solves against every identity column, one decomposition for all of them.
    pub fn inverse(&self) -> Result<M> {
        let lu = self.decomposition().lu();
        let n = self.decomposition().size();
        let mut inverse = lu.allocate(lu.dims())?;
        let mut e = vec![M::Value::zero(); n];
        for j in 0..n {
            e[j] = M::Value::one();
            let column = self.solve(&e)?;
            inverse.set_column(j, &column)?;
            e[j] = M::Value::zero();
        }
        debug!("Inverted {}x{} matrix", n, n);
        Ok(inverse)
    }
}

/// Inverse of `a` in `a`'s backend.
pub fn inverse<M: Matrix>(a: &M) -> Result<M> {
    LuSolver::new(a)?.inverse()
}

/// `||A|| * ||A^-1||` using the Frobenius norm.
pub fn condition_number<M: Matrix>(a: &M) -> Result<M::Value> {
    let inv = inverse(a)?;
    Ok(a.euclidean_norm()? * inv.euclidean_norm()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmat_core::{DmatCoreError, HeapMatrix};

    #[test]
    fn test_inverse_times_matrix_is_identity() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[4.0, 7.0, 2.0], [3.0, 6.0, 1.0], [2.0, 5.0, 3.0]])?;
        let inv = inverse(&a)?;
        assert!(inv.multiply(&a)?.approx_eq(&HeapMatrix::identity(3), 1e-9));
        assert!(a.multiply(&inv)?.approx_eq(&HeapMatrix::identity(3), 1e-9));
        Ok(())
    }

    #[test]
    fn test_known_two_by_two_inverse() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[4.0, 7.0], [2.0, 6.0]])?;
        let expected = HeapMatrix::from_rows(&[[0.6, -0.7], [-0.2, 0.4]])?;
        assert!(inverse(&a)?.approx_eq(&expected, 1e-12));
        Ok(())
    }

    #[test]
    fn test_condition_number_of_identity() -> Result<()> {
        let c = condition_number(&HeapMatrix::<f64>::identity(4))?;
        assert!((c - 4.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_singular_has_no_inverse() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [1.0, 0.0, 1.0]])?;
        assert!(matches!(inverse(&a), Err(DmatCoreError::SingularMatrix { .. })));
        assert!(condition_number(&a).is_err());
        Ok(())
    }
}
