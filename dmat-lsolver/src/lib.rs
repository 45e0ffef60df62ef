//! `dmat-lsolver`: Direct linear algebra over `dmat-core` matrices.
//!
//! This library factors square systems with scaled partial-pivot LU
//! decomposition and builds determinants, linear solves, inverses and
//! condition numbers on top of it. Every routine runs unchanged on heap and
//! disk-backed matrices.

// Core modules
pub mod algorithms;

// Re-export from dmat_core
pub use dmat_core::{
    AnyMatrix, Backend, Dimension, DiskMatrix, DmatCoreError, HeapMatrix, Matrix, MatrixFactory,
    MatrixOps, Result,
};

pub use algorithms::determinant::{determinant, trace};
pub use algorithms::inverse::{condition_number, inverse};
pub use algorithms::lu::LuDecomposition;
pub use algorithms::lu_solver::{residual_norm, solve, solve_augmented, LuSolver};
pub use algorithms::{LuSolve, LuSolveMetadata, SolveAlgorithm, SolveResult};
