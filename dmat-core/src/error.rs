use thiserror::Error;

use crate::dimension::Dimension;

pub type Result<T> = core::result::Result<T, DmatCoreError>;

#[derive(Error, Debug)]
pub enum DmatCoreError {
    #[error("Invalid matrix dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        expected: Dimension,
        found: Dimension,
    },

    #[error("Index ({row}, {col}) is out of bounds for a {dims} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        dims: Dimension,
    },

    #[error("Matrix must be square (dims: {0})")]
    NotSquare(Dimension),

    #[error("Matrix is singular (no usable pivot at elimination step {step})")]
    SingularMatrix { step: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Worker pool error: {0}")]
    ThreadPool(String),

    #[error("Matrix storage has been closed")]
    Closed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DmatCoreError {
    /// Shorthand for the most common precondition failure.
    pub(crate) fn mismatch(expected: Dimension, found: Dimension) -> Self {
        Self::DimensionMismatch { expected, found }
    }
}
