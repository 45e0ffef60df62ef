use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, Zero};
use std::fmt::{Debug, Display};
use std::str::FromStr;

use crate::dimension::Dimension;
use crate::error::{DmatCoreError, Result};

/// Cell type of every matrix in the crate.
///
/// `Pod` lets the disk backend move raw cell bytes, `Display + FromStr` serve
/// the CSV reader and writer.
pub trait Element:
    Float + FromPrimitive + Pod + Default + Debug + Display + FromStr + Send + Sync + 'static
{
}

impl Element for f64 {}
impl Element for f32 {}

/// The storage contract every backend implements.
///
/// Backends only supply the primitives below. Everything else (elementwise
/// algebra, statistics, structural ops) is written once in
/// [`MatrixOps`](crate::ops::MatrixOps) against this trait, so an algorithm
/// runs unchanged whether its cells live on the heap or in a mapped file.
pub trait Matrix: Debug + Send + Sync {
    /// The underlying numeric type of the matrix elements (e.g., f64, f32).
    type Value: Element;

    /// Returns the dimensions of the matrix.
    fn dims(&self) -> Dimension;

    /// Reads one cell.
    ///
    /// Returns `None` when `(row, col)` is out of range or the cell holds no
    /// value (an unfilled heap cell, or a disk read that failed and was logged).
    fn get(&self, row: usize, col: usize) -> Option<Self::Value>;

    /// Writes one cell.
    ///
    /// # Errors
    /// `IndexOutOfBounds` when `(row, col)` lies outside [`Matrix::dims`].
    fn set(&mut self, row: usize, col: usize, value: Self::Value) -> Result<()>;

    /// Changes the shape, keeping the overlapping top-left region.
    fn resize(&mut self, dims: Dimension) -> Result<()>;

    /// Allocates a zero-filled matrix of the same backend with the given shape.
    fn allocate(&self, dims: Dimension) -> Result<Self>
    where
        Self: Sized;

    /// Deep copy into fresh storage of the same backend.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;

    /// Returns the number of rows.
    fn rows(&self) -> usize {
        self.dims().rows
    }

    /// Returns the number of columns.
    fn cols(&self) -> usize {
        self.dims().cols
    }

    /// Checks if the matrix is square.
    fn is_square(&self) -> bool {
        self.dims().is_square()
    }

    /// Number of cells.
    fn len(&self) -> usize {
        self.dims().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a cell, treating absent values as zero.
    fn get_or_zero(&self, row: usize, col: usize) -> Self::Value {
        self.get(row, col).unwrap_or_else(Self::Value::zero)
    }

    /// Copies out row `row`.
    fn row(&self, row: usize) -> Result<Vec<Self::Value>> {
        let dims = self.dims();
        if row >= dims.rows {
            return Err(DmatCoreError::IndexOutOfBounds { row, col: 0, dims });
        }
        Ok((0..dims.cols).map(|c| self.get_or_zero(row, c)).collect())
    }

    /// Copies out column `col`.
    fn column(&self, col: usize) -> Result<Vec<Self::Value>> {
        let dims = self.dims();
        if col >= dims.cols {
            return Err(DmatCoreError::IndexOutOfBounds { row: 0, col, dims });
        }
        Ok((0..dims.rows).map(|r| self.get_or_zero(r, col)).collect())
    }

    /// Overwrites row `row`. `values` must hold exactly `cols` entries.
    fn set_row(&mut self, row: usize, values: &[Self::Value]) -> Result<()> {
        let dims = self.dims();
        if row >= dims.rows {
            return Err(DmatCoreError::IndexOutOfBounds { row, col: 0, dims });
        }
        if values.len() != dims.cols {
            return Err(DmatCoreError::InvalidDimensions(format!(
                "Row has {} values, matrix has {} columns",
                values.len(),
                dims.cols
            )));
        }
        for (c, v) in values.iter().enumerate() {
            self.set(row, c, *v)?;
        }
        Ok(())
    }

    /// Overwrites column `col`. `values` must hold exactly `rows` entries.
    fn set_column(&mut self, col: usize, values: &[Self::Value]) -> Result<()> {
        let dims = self.dims();
        if col >= dims.cols {
            return Err(DmatCoreError::IndexOutOfBounds { row: 0, col, dims });
        }
        if values.len() != dims.rows {
            return Err(DmatCoreError::InvalidDimensions(format!(
                "Column has {} values, matrix has {} rows",
                values.len(),
                dims.rows
            )));
        }
        for (r, v) in values.iter().enumerate() {
            self.set(r, col, *v)?;
        }
        Ok(())
    }

    /// Row-major copy of every cell, absent cells as zero.
    fn to_vec(&self) -> Result<Vec<Self::Value>> {
        let mut out = Vec::with_capacity(self.len());
        for r in 0..self.rows() {
            out.extend(self.row(r)?);
        }
        Ok(out)
    }

    fn to_rows(&self) -> Result<Vec<Vec<Self::Value>>> {
        (0..self.rows()).map(|r| self.row(r)).collect()
    }
}

/// A caller-supplied elementwise transform, consumed by
/// [`MatrixOps::operate`](crate::ops::MatrixOps::operate).
pub trait ElementOp<T> {
    fn apply(&self, value: T) -> T;
}

impl<T, F> ElementOp<T> for F
where
    F: Fn(T) -> T,
{
    fn apply(&self, value: T) -> T {
        self(value)
    }
}
