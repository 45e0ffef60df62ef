use log::debug;

use num_traits::{Float, Zero};

use dmat_core::{Dimension, DmatCoreError, Matrix, MatrixOps, Result};

use super::lu::LuDecomposition;

/// Solves `A x = b` by forward then back substitution against one cached
/// decomposition, so any number of right-hand sides cost one elimination.
#[derive(Debug)]
pub struct LuSolver<M: Matrix> {
    decomposition: LuDecomposition<M>,
    tolerance: M::Value,
}

impl<M: Matrix> LuSolver<M> {
    pub fn new(a: &M) -> Result<Self> {
        Self::with_tolerance(a, M::Value::zero())
    }

    /// Pivots with magnitude at or below `tolerance` count as zero.
    pub fn with_tolerance(a: &M, tolerance: M::Value) -> Result<Self> {
        Ok(Self {
            decomposition: LuDecomposition::decompose_with_tolerance(a, tolerance)?,
            tolerance,
        })
    }

    pub fn from_decomposition(decomposition: LuDecomposition<M>) -> Self {
        Self {
            decomposition,
            tolerance: M::Value::zero(),
        }
    }

    pub fn decomposition(&self) -> &LuDecomposition<M> {
        &self.decomposition
    }

    pub fn into_decomposition(self) -> LuDecomposition<M> {
        self.decomposition
    }

    /// Solves for one right-hand side.
    pub fn solve(&self, b: &[M::Value]) -> Result<Vec<M::Value>> {
        let n = self.decomposition.size();
        if b.len() != n {
            return Err(DmatCoreError::InvalidDimensions(format!(
                "Matrix A rows ({}) must match RHS vector b length ({})",
                n,
                b.len()
            )));
        }
        let y = self.forward_substitute(b)?;
        self.back_substitute(&y)
    }

    /// `y[i] = b[p[i]] - sum_{c<i} L[i][c] * y[c]`
    fn forward_substitute(&self, b: &[M::Value]) -> Result<Vec<M::Value>> {
        let lu = self.decomposition.lu();
        let permutation = self.decomposition.permutation();
        let mut y = Vec::with_capacity(b.len());
        for (i, &p) in permutation.iter().enumerate() {
            let row = lu.row(p)?;
            let sum = (0..i).fold(M::Value::zero(), |acc, c| acc + row[c] * y[c]);
            y.push(b[p] - sum);
        }
        Ok(y)
    }

    /// `x[i] = (y[i] - sum_{c>i} U[i][c] * x[c]) / U[i][i]`
    fn back_substitute(&self, y: &[M::Value]) -> Result<Vec<M::Value>> {
        let lu = self.decomposition.lu();
        let permutation = self.decomposition.permutation();
        let n = y.len();
        let mut x = vec![M::Value::zero(); n];
        for i in (0..n).rev() {
            let row = lu.row(permutation[i])?;
            let pivot = row[i];
            if pivot.abs() <= self.tolerance {
                debug!("Zero pivot at position {} during back substitution", i);
                return Err(DmatCoreError::SingularMatrix { step: i });
            }
            let sum = (i + 1..n).fold(M::Value::zero(), |acc, c| acc + row[c] * x[c]);
            x[i] = (y[i] - sum) / pivot;
        }
        Ok(x)
    }
}

/// Solves `A x = b` with a fresh decomposition.
pub fn solve<M: Matrix>(a: &M, b: &[M::Value]) -> Result<Vec<M::Value>> {
    LuSolver::new(a)?.solve(b)
}

/// Solves an augmented `n x (n + 1)` system `[A | b]`.
pub fn solve_augmented<M: Matrix>(augmented: &M) -> Result<Vec<M::Value>> {
    let (a, b) = split_augmented(augmented)?;
    solve(&a, &b)
}

/// Splits `[A | b]` into `A` (same backend) and `b`.
pub fn split_augmented<M: Matrix>(augmented: &M) -> Result<(M, Vec<M::Value>)> {
    let dims = augmented.dims();
    if dims.cols != dims.rows + 1 {
        return Err(DmatCoreError::InvalidDimensions(format!(
            "Augmented system must be n x (n + 1), found {}",
            dims
        )));
    }
    let n = dims.rows;
    let mut a = augmented.allocate(Dimension::new(n, n))?;
    let mut b = Vec::with_capacity(n);
    for r in 0..n {
        let row = augmented.row(r)?;
        a.set_row(r, &row[..n])?;
        b.push(row[n]);
    }
    Ok((a, b))
}

/// `||A x - b||_2`
pub fn residual_norm<M: Matrix + ?Sized>(
    a: &M,
    x: &[M::Value],
    b: &[M::Value],
) -> Result<M::Value> {
    let ax = a.multiply_vector(x)?;
    if ax.len() != b.len() {
        return Err(DmatCoreError::InvalidDimensions(format!(
            "Residual of {} rows against {} right-hand side entries",
            ax.len(),
            b.len()
        )));
    }
    Ok(ax
        .into_iter()
        .zip(b)
        .fold(M::Value::zero(), |acc, (l, r)| acc + (l - *r) * (l - *r))
        .sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmat_core::HeapMatrix;

    fn system() -> HeapMatrix {
        HeapMatrix::from_rows(&[[1.0, 1.0, 2.0], [-1.0, 0.0, 2.0], [0.0, 1.0, 2.0]]).unwrap()
    }

    #[test]
    fn test_known_system() -> Result<()> {
        let x = solve(&system(), &[-1.0, -3.0, -2.0])?;
        for (got, want) in x.iter().zip([1.0, 0.0, -1.0]) {
            assert!((got - want).abs() < 1e-9, "{} vs {}", got, want);
        }
        Ok(())
    }

    #[test]
    fn test_solver_reuses_decomposition() -> Result<()> {
        let solver = LuSolver::new(&system())?;
        let x1 = solver.solve(&[-1.0, -3.0, -2.0])?;
        let x2 = solver.solve(&[4.0, 1.0, 3.0])?;
        assert!(residual_norm(&system(), &x1, &[-1.0, -3.0, -2.0])? < 1e-9);
        assert!(residual_norm(&system(), &x2, &[4.0, 1.0, 3.0])? < 1e-9);
        Ok(())
    }

    #[test]
    fn test_augmented_system() -> Result<()> {
        let ab = HeapMatrix::from_rows(&[
            [1.0, 1.0, 2.0, -1.0],
            [-1.0, 0.0, 2.0, -3.0],
            [0.0, 1.0, 2.0, -2.0],
        ])?;
        let x = solve_augmented(&ab)?;
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!(x[1].abs() < 1e-9);
        assert!((x[2] + 1.0).abs() < 1e-9);
        assert!(solve_augmented(&system()).is_err());
        Ok(())
    }

    #[test]
    fn test_rhs_length_checked() -> Result<()> {
        let solver = LuSolver::new(&system())?;
        assert!(matches!(
            solver.solve(&[1.0, 2.0]),
            Err(DmatCoreError::InvalidDimensions(_))
        ));
        Ok(())
    }
}
