use log::info;
use num_traits::{Float, FromPrimitive};

use dmat_core::{DmatCoreError, Matrix};

pub struct SolveResult<V: Float, M> {
    pub x: Vec<V>,   // Solution vector
    pub metadata: M, // Metadata about the solve process
}

// --- Algorithm Trait Definition ---
/// Trait representing a specific linear system solving algorithm.
/// Generic over the Matrix backend (heap or disk) it runs against.
pub trait SolveAlgorithm<M: Matrix> {
    type Metadata: std::fmt::Debug;

    /// Solves the linear system Ax = b for x.
    ///
    /// # Arguments
    ///
    /// * `a` - The coefficient matrix A.
    /// * `b` - The right-hand side vector b.
    ///
    /// # Returns
    ///
    /// A `Result` containing the solution vector x or a `DmatCoreError`.
    fn solve(
        &self,
        a: &M,
        b: &[M::Value],
    ) -> Result<SolveResult<M::Value, Self::Metadata>, DmatCoreError>;

    // Helper for input validation, can be called by implementations.
    fn validate_inputs(&self, a: &M, b: &[M::Value]) -> Result<(), DmatCoreError> {
        let dims = a.dims();
        if !a.is_square() {
            return Err(DmatCoreError::NotSquare(dims));
        }
        if dims.rows != b.len() {
            return Err(DmatCoreError::InvalidDimensions(format!(
                "Matrix A rows ({}) must match RHS vector b length ({})",
                dims.rows,
                b.len()
            )));
        }
        Ok(())
    }
}

// --- Algorithm Implementations ---

pub mod determinant; // Determinant and trace from the pivots
pub mod inverse; // Inverse and condition number
pub mod lu; // LU decomposition
pub mod lu_solver; // Forward/back substitution
pub mod pivot; // Scaled partial-pivot elimination

use lu_solver::{residual_norm, LuSolver};

// --- Algorithm Struct Definitions ---

/// Direct solve through scaled partial-pivot LU decomposition.
#[derive(Debug, Clone)]
pub struct LuSolve {
    /// Pivots with magnitude at or below this count as zero.
    pub zero_pivot_tolerance: f64,
}

impl Default for LuSolve {
    fn default() -> Self {
        Self {
            zero_pivot_tolerance: 0.0, // Only exact zeros are singular
        }
    }
}

impl LuSolve {
    /// Creates a new instance of the LU solver with default parameters.
    pub fn new() -> Self {
        Self::default()
    }
    /// Creates a new instance of the LU solver with the given pivot tolerance.
    pub fn with_params(zero_pivot_tolerance: f64) -> Self {
        Self {
            zero_pivot_tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LuSolveMetadata<V> {
    /// Row exchanges performed during elimination.
    pub exchange_count: usize,
    /// `||A x - b||_2` for the returned solution.
    pub residual_norm: V,
}

impl<M: Matrix> SolveAlgorithm<M> for LuSolve {
    type Metadata = LuSolveMetadata<M::Value>;

    fn solve(
        &self,
        a: &M,
        b: &[M::Value],
    ) -> Result<SolveResult<M::Value, Self::Metadata>, DmatCoreError> {
        self.validate_inputs(a, b)?;
        let tolerance = M::Value::from_f64(self.zero_pivot_tolerance).ok_or_else(|| {
            DmatCoreError::Internal(format!(
                "Pivot tolerance {} is not representable",
                self.zero_pivot_tolerance
            ))
        })?;

        let solver = LuSolver::with_tolerance(a, tolerance)?;
        let x = solver.solve(b)?;
        let residual_norm = residual_norm(a, &x, b)?;
        let exchange_count = solver.decomposition().exchange_count();
        info!(
            "LU solve of {} system: {} exchanges, residual {}",
            a.dims(),
            exchange_count,
            residual_norm
        );

        Ok(SolveResult {
            x,
            metadata: LuSolveMetadata {
                exchange_count,
                residual_norm,
            },
        })
    }
}
