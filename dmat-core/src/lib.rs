//! # Matrix Core Library
//!
//! Provides the matrix contract, its heap and memory-mapped disk backends,
//! the backend-independent algebra built on top of them, and a concurrent
//! multiplier for large products.

// Declare modules
pub mod backend;
pub mod dimension;
pub mod disk_matrix;
pub mod error;
pub mod heap_matrix;
pub mod io;
pub mod multiplier;
pub mod ops;
pub mod traits;

// Re-export public types
pub use backend::{AnyMatrix, Backend, MatrixFactory};
pub use dimension::Dimension;
pub use disk_matrix::DiskMatrix;
pub use error::{DmatCoreError, Result};
pub use heap_matrix::HeapMatrix;
pub use io::{read_csv, read_csv_file, write_csv, write_csv_file};
pub use multiplier::{ConcurrentMultiplier, Multiplier, MultiplierConfig, NaiveMultiplier};
pub use ops::{Axis, MatrixOps};
pub use traits::{Element, ElementOp, Matrix};
