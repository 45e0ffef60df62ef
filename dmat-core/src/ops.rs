//! Backend-independent algebra written purely against [`Matrix`].
//!
//! Every operation comes in two forms: `foo_into(.., dest)` writes into a
//! caller-supplied matrix of any backend, `foo(..)` allocates its result from
//! the receiver's backend. Shapes are checked before the first cell of the
//! destination is written, so a failed call leaves `dest` untouched.

use num_traits::{Float, Zero};

use crate::dimension::Dimension;
use crate::error::{DmatCoreError, Result};
use crate::multiplier::{self, MultiplierConfig};
use crate::traits::{Element, ElementOp, Matrix};

/// Direction of a per-row or per-column reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

#[derive(Debug, Clone, Copy)]
enum Normalisation<T> {
    ZScore,
    Mean,
    /// Rescale against the matrix-wide bounds; zero cells are kept.
    MinMax { lo: T, hi: T },
}

impl<T: Element> Normalisation<T> {
    fn apply(self, column: &[T]) -> Result<Vec<T>> {
        if column.is_empty() {
            return Ok(Vec::new());
        }
        let out: Vec<T> = match self {
            Normalisation::Mean => {
                let mean = column_mean(column)?;
                column.iter().map(|v| *v - mean).collect()
            }
            Normalisation::ZScore => {
                let n = from_count::<T>(column.len())?;
                let mean = column_mean(column)?;
                let var = column
                    .iter()
                    .fold(T::zero(), |acc, v| acc + (*v - mean) * (*v - mean))
                    / n;
                let sd = var.sqrt();
                column
                    .iter()
                    .map(|v| if sd.is_zero() { T::zero() } else { (*v - mean) / sd })
                    .collect()
            }
            Normalisation::MinMax { lo, hi } => {
                let spread = hi - lo;
                column
                    .iter()
                    .map(|v| {
                        if v.is_zero() || spread.is_zero() {
                            *v
                        } else {
                            (*v - lo) / spread
                        }
                    })
                    .collect()
            }
        };
        Ok(out)
    }
}

/// Algebra shared by every backend. Implemented for all [`Matrix`] types.
pub trait MatrixOps: Matrix {
    // --- Elementwise binary operations -------------------------------------

    fn sum_into<O, D>(&self, other: &O, dest: &mut D) -> Result<()>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_into(self, other, dest, |a, b| a + b)
    }

    fn sum<O>(&self, other: &O) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_alloc(self, other, |a, b| a + b)
    }

    fn subtract_into<O, D>(&self, other: &O, dest: &mut D) -> Result<()>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_into(self, other, dest, |a, b| a - b)
    }

    fn subtract<O>(&self, other: &O) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_alloc(self, other, |a, b| a - b)
    }

    fn pointwise_multiply_into<O, D>(&self, other: &O, dest: &mut D) -> Result<()>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_into(self, other, dest, |a, b| a * b)
    }

    fn pointwise_multiply<O>(&self, other: &O) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_alloc(self, other, |a, b| a * b)
    }

    /// Plain IEEE division, cell by cell.
    fn pointwise_divide_into<O, D>(&self, other: &O, dest: &mut D) -> Result<()>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_into(self, other, dest, |a, b| a / b)
    }

    fn pointwise_divide<O>(&self, other: &O) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        zip_alloc(self, other, |a, b| a / b)
    }

    // --- Scalar operations --------------------------------------------------

    fn sum_scalar_into<D>(&self, m: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| v + m)
    }

    fn sum_scalar(&self, m: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| v + m)
    }

    fn subtract_scalar_into<D>(&self, m: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| v - m)
    }

    fn subtract_scalar(&self, m: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| v - m)
    }

    /// `m - a_ij` for every cell.
    fn subtract_from_into<D>(&self, m: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| m - v)
    }

    fn subtract_from(&self, m: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| m - v)
    }

    fn multiply_scalar_into<D>(&self, m: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| v * m)
    }

    fn multiply_scalar(&self, m: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| v * m)
    }

    /// `a_ij / m`. A cell is left as is when either it or `m` is zero.
    fn divide_into<D>(&self, m: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| guarded_divide(v, m))
    }

    fn divide(&self, m: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| guarded_divide(v, m))
    }

    /// `m / a_ij` for every cell.
    fn divisor_of_into<D>(&self, m: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| m / v)
    }

    fn divisor_of(&self, m: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| m / v)
    }

    // --- Elementwise unary operations ---------------------------------------

    fn exp_into<D>(&self, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, Float::exp)
    }

    fn exp(&self) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, Float::exp)
    }

    fn sin_into<D>(&self, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, Float::sin)
    }

    fn sin(&self) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, Float::sin)
    }

    fn cos_into<D>(&self, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, Float::cos)
    }

    fn cos(&self) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, Float::cos)
    }

    fn tanh_into<D>(&self, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, Float::tanh)
    }

    fn tanh(&self) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, Float::tanh)
    }

    fn power_into<D>(&self, p: Self::Value, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, move |v| v.powf(p))
    }

    fn power(&self, p: Self::Value) -> Result<Self>
    where
        Self: Sized,
    {
        map_alloc(self, move |v| v.powf(p))
    }

    /// Applies a caller-supplied transform to every cell.
    fn operate_into<Op, D>(&self, op: &Op, dest: &mut D) -> Result<()>
    where
        Op: ElementOp<Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        map_into(self, dest, |v| op.apply(v))
    }

    fn operate<Op>(&self, op: &Op) -> Result<Self>
    where
        Self: Sized,
        Op: ElementOp<Self::Value> + ?Sized,
    {
        map_alloc(self, |v| op.apply(v))
    }

    /// Applies `op` to the receiver's own cells, row by row.
    fn operate_in_place<Op>(&mut self, op: &Op) -> Result<()>
    where
        Op: ElementOp<Self::Value> + ?Sized,
    {
        for r in 0..self.rows() {
            let row: Vec<_> = self.row(r)?.into_iter().map(|v| op.apply(v)).collect();
            self.set_row(r, &row)?;
        }
        Ok(())
    }

    // --- Reductions ---------------------------------------------------------

    /// Smallest cell, `None` for an empty matrix.
    fn min(&self) -> Result<Option<Self::Value>> {
        let cells = self.to_vec()?;
        Ok((!cells.is_empty()).then(|| cells.into_iter().fold(Self::Value::infinity(), Float::min)))
    }

    /// Largest cell, `None` for an empty matrix.
    fn max(&self) -> Result<Option<Self::Value>> {
        let cells = self.to_vec()?;
        Ok((!cells.is_empty())
            .then(|| cells.into_iter().fold(Self::Value::neg_infinity(), Float::max)))
    }

    /// Square root of the sum of squared cells.
    fn euclidean_norm(&self) -> Result<Self::Value> {
        let mut acc = Self::Value::zero();
        for r in 0..self.rows() {
            acc = self.row(r)?.into_iter().fold(acc, |acc, v| acc + v * v);
        }
        Ok(acc.sqrt())
    }

    fn sum_row(&self, row: usize) -> Result<Self::Value> {
        Ok(self.row(row)?.into_iter().fold(Self::Value::zero(), |a, v| a + v))
    }

    fn sum_column(&self, col: usize) -> Result<Self::Value> {
        Ok(self.column(col)?.into_iter().fold(Self::Value::zero(), |a, v| a + v))
    }

    /// Mean of each row.
    fn rows_means(&self) -> Result<Vec<Self::Value>> {
        let n = from_count::<Self::Value>(nonempty(self.dims())?.cols)?;
        (0..self.rows()).map(|r| Ok(self.sum_row(r)? / n)).collect()
    }

    /// Mean of each column.
    fn column_means(&self) -> Result<Vec<Self::Value>> {
        let n = from_count::<Self::Value>(nonempty(self.dims())?.rows)?;
        (0..self.cols()).map(|c| Ok(self.sum_column(c)? / n)).collect()
    }

    fn diagonal(&self) -> Result<Vec<Self::Value>> {
        if !self.is_square() {
            return Err(DmatCoreError::NotSquare(self.dims()));
        }
        Ok((0..self.rows()).map(|i| self.get_or_zero(i, i)).collect())
    }

    // --- Normalisation ------------------------------------------------------

    /// Per-column z-score (population standard deviation). A column with no
    /// spread becomes all zeros. `exclude` is copied through untouched.
    fn normalise_into<D>(&self, exclude: Option<usize>, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        normalise_columns(self, dest, exclude, Normalisation::ZScore)
    }

    fn normalise(&self) -> Result<Self>
    where
        Self: Sized,
    {
        normalise_alloc(self, None, Normalisation::ZScore)
    }

    fn normalise_excluding(&self, col: usize) -> Result<Self>
    where
        Self: Sized,
    {
        normalise_alloc(self, Some(col), Normalisation::ZScore)
    }

    /// Centers every column on its mean. A single-row matrix is copied
    /// through unchanged.
    fn mean_normalise_into<D>(&self, exclude: Option<usize>, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        normalise_columns(self, dest, exclude, Normalisation::Mean)
    }

    fn mean_normalise(&self) -> Result<Self>
    where
        Self: Sized,
    {
        normalise_alloc(self, None, Normalisation::Mean)
    }

    fn mean_normalise_excluding(&self, col: usize) -> Result<Self>
    where
        Self: Sized,
    {
        normalise_alloc(self, Some(col), Normalisation::Mean)
    }

    /// Rescales onto `[0, 1]` using the smallest and largest cell of the
    /// whole matrix (the excluded column aside). Zero cells stay zero and a
    /// matrix with no spread is copied unchanged.
    fn min_max_normalise_into<D>(&self, exclude: Option<usize>, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        normalise_columns(self, dest, exclude, min_max_bounds(self, exclude)?)
    }

    fn min_max_normalise(&self) -> Result<Self>
    where
        Self: Sized,
    {
        normalise_alloc(self, None, min_max_bounds(self, None)?)
    }

    fn min_max_normalise_excluding(&self, col: usize) -> Result<Self>
    where
        Self: Sized,
    {
        normalise_alloc(self, Some(col), min_max_bounds(self, Some(col))?)
    }

    // --- Structural operations ----------------------------------------------

    fn transpose_into<D>(&self, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        expect_dims(self.dims().transposed(), dest.dims())?;
        for r in 0..self.rows() {
            dest.set_column(r, &self.row(r)?)?;
        }
        Ok(())
    }

    fn transpose(&self) -> Result<Self>
    where
        Self: Sized,
    {
        let mut dest = self.allocate(self.dims().transposed())?;
        self.transpose_into(&mut dest)?;
        Ok(dest)
    }

    /// Refills a `rows x cols` destination from the receiver's cells in
    /// row-major order. Fails if the new shape holds more cells than the
    /// receiver; surplus source cells are dropped.
    fn reshape_into<D>(&self, rows: usize, cols: usize, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        let target = check_reshape(self.dims(), rows, cols)?;
        expect_dims(target, dest.dims())?;
        if cols == 0 {
            return Ok(());
        }
        let cells = self.to_vec()?;
        for (r, chunk) in cells.chunks(cols).take(rows).enumerate() {
            dest.set_row(r, chunk)?;
        }
        Ok(())
    }

    fn reshape(&self, rows: usize, cols: usize) -> Result<Self>
    where
        Self: Sized,
    {
        let target = check_reshape(self.dims(), rows, cols)?;
        let mut dest = self.allocate(target)?;
        self.reshape_into(rows, cols, &mut dest)?;
        Ok(dest)
    }

    /// Tiles the receiver `x` times vertically and `y` times horizontally.
    fn repmat_into<D>(&self, x: usize, y: usize, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        let dims = self.dims();
        expect_dims(Dimension::new(dims.rows * x, dims.cols * y), dest.dims())?;
        for r in 0..dims.rows {
            let row = self.row(r)?;
            let tiled: Vec<_> = row.iter().copied().cycle().take(dims.cols * y).collect();
            for i in 0..x {
                dest.set_row(i * dims.rows + r, &tiled)?;
            }
        }
        Ok(())
    }

    fn repmat(&self, x: usize, y: usize) -> Result<Self>
    where
        Self: Sized,
    {
        let dims = self.dims();
        let mut dest = self.allocate(Dimension::new(dims.rows * x, dims.cols * y))?;
        self.repmat_into(x, y, &mut dest)?;
        Ok(dest)
    }

    /// Writes the receiver's rows into `dest` in a random order (Fisher-Yates).
    fn shuffle_into<D>(&self, rng: &mut fastrand::Rng, dest: &mut D) -> Result<()>
    where
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        expect_dims(self.dims(), dest.dims())?;
        let mut order: Vec<usize> = (0..self.rows()).collect();
        rng.shuffle(&mut order);
        for (r, src) in order.into_iter().enumerate() {
            dest.set_row(r, &self.row(src)?)?;
        }
        Ok(())
    }

    fn shuffle_with(&self, rng: &mut fastrand::Rng) -> Result<Self>
    where
        Self: Sized,
    {
        let mut dest = self.allocate(self.dims())?;
        self.shuffle_into(rng, &mut dest)?;
        Ok(dest)
    }

    /// Row-permuted copy using a freshly seeded generator.
    fn shuffle(&self) -> Result<Self>
    where
        Self: Sized,
    {
        self.shuffle_with(&mut fastrand::Rng::new())
    }

    /// Removes row `row`, shifting the rows below it up.
    fn remove_row(&mut self, row: usize) -> Result<()> {
        let dims = self.dims();
        if row >= dims.rows {
            return Err(DmatCoreError::IndexOutOfBounds { row, col: 0, dims });
        }
        for r in row..dims.rows - 1 {
            let next = self.row(r + 1)?;
            self.set_row(r, &next)?;
        }
        self.resize(Dimension::new(dims.rows - 1, dims.cols))
    }

    /// Removes column `col`, shifting the columns to its right left.
    fn remove_column(&mut self, col: usize) -> Result<()> {
        let dims = self.dims();
        if col >= dims.cols {
            return Err(DmatCoreError::IndexOutOfBounds { row: 0, col, dims });
        }
        for c in col..dims.cols - 1 {
            let next = self.column(c + 1)?;
            self.set_column(c, &next)?;
        }
        self.resize(Dimension::new(dims.rows, dims.cols - 1))
    }

    // --- Products -----------------------------------------------------------

    /// `dest += self * other`; large results run on the concurrent multiplier.
    fn multiply_into<O, D>(&self, other: &O, dest: &mut D, config: &MultiplierConfig) -> Result<()>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        multiplier::multiply_into(self, other, dest, config)
    }

    /// Matrix product with the given multiplier settings. A `1x1` operand on
    /// either side acts as a scalar.
    fn multiply_with<O>(&self, other: &O, config: &MultiplierConfig) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        let scalar = Dimension::new(1, 1);
        if self.dims() == scalar {
            let s = self.get_or_zero(0, 0);
            let mut dest = self.allocate(other.dims())?;
            map_into(other, &mut dest, move |v| v * s)?;
            return Ok(dest);
        }
        if other.dims() == scalar {
            return self.multiply_scalar(other.get_or_zero(0, 0));
        }
        if self.cols() != other.rows() {
            return Err(DmatCoreError::mismatch(
                Dimension::new(self.cols(), other.cols()),
                other.dims(),
            ));
        }
        let mut dest = self.allocate(Dimension::new(self.rows(), other.cols()))?;
        self.multiply_into(other, &mut dest, config)?;
        Ok(dest)
    }

    fn multiply<O>(&self, other: &O) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        self.multiply_with(other, &MultiplierConfig::default())
    }

    fn multiply_vector(&self, x: &[Self::Value]) -> Result<Vec<Self::Value>> {
        if x.len() != self.cols() {
            return Err(DmatCoreError::mismatch(
                Dimension::new(self.cols(), 1),
                Dimension::new(x.len(), 1),
            ));
        }
        (0..self.rows())
            .map(|r| {
                Ok(self
                    .row(r)?
                    .into_iter()
                    .zip(x)
                    .fold(Self::Value::zero(), |acc, (a, b)| acc + a * *b))
            })
            .collect()
    }

    /// Dot product of the receiver's row `row` with `other`'s column `col`.
    fn ddot<O>(&self, row: usize, other: &O, col: usize) -> Result<Self::Value>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        if self.cols() != other.rows() {
            return Err(DmatCoreError::mismatch(
                Dimension::new(self.cols(), other.cols()),
                other.dims(),
            ));
        }
        let lhs = self.row(row)?;
        let rhs = other.column(col)?;
        Ok(lhs
            .into_iter()
            .zip(rhs)
            .fold(Self::Value::zero(), |acc, (a, b)| acc + a * b))
    }

    /// `A * A^T`.
    fn covariance(&self) -> Result<Self>
    where
        Self: Sized,
    {
        let t = self.transpose()?;
        self.multiply(&t)
    }

    /// `A * B`.
    fn covariance_with<O>(&self, other: &O) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        self.multiply(other)
    }

    // --- Search and comparison ----------------------------------------------

    fn row_contains(&self, row: usize, value: Self::Value) -> Result<bool> {
        Ok(self.row(row)?.contains(&value))
    }

    fn column_contains(&self, col: usize, value: Self::Value) -> Result<bool> {
        Ok(self.column(col)?.contains(&value))
    }

    /// Indices of the rows whose cell in column `col` equals `value`.
    fn find_rows(&self, col: usize, value: Self::Value) -> Result<Vec<usize>> {
        Ok(positions(&self.column(col)?, value))
    }

    /// Indices of the columns whose cell in row `row` equals `value`.
    fn find_columns(&self, row: usize, value: Self::Value) -> Result<Vec<usize>> {
        Ok(positions(&self.row(row)?, value))
    }

    /// Same shape and every cell within `tol`.
    fn approx_eq<O>(&self, other: &O, tol: Self::Value) -> bool
    where
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        if self.dims() != other.dims() {
            return false;
        }
        match (self.to_vec(), other.to_vec()) {
            (Ok(a), Ok(b)) => a.iter().zip(&b).all(|(x, y)| (*x - *y).abs() <= tol),
            _ => false,
        }
    }

    /// Euclidean distance between matching rows (`Axis::Rows`, an `rows x 1`
    /// result) or matching columns (`Axis::Columns`, `cols x 1`).
    fn euclidean_distance_into<O, D>(&self, other: &O, axis: Axis, dest: &mut D) -> Result<()>
    where
        O: Matrix<Value = Self::Value> + ?Sized,
        D: Matrix<Value = Self::Value> + ?Sized,
    {
        let dims = self.dims();
        expect_dims(dims, other.dims())?;
        let count = match axis {
            Axis::Rows => dims.rows,
            Axis::Columns => dims.cols,
        };
        expect_dims(Dimension::new(count, 1), dest.dims())?;
        for i in 0..count {
            let (a, b) = match axis {
                Axis::Rows => (self.row(i)?, other.row(i)?),
                Axis::Columns => (self.column(i)?, other.column(i)?),
            };
            let d = a
                .into_iter()
                .zip(b)
                .fold(Self::Value::zero(), |acc, (x, y)| acc + (x - y) * (x - y))
                .sqrt();
            dest.set(i, 0, d)?;
        }
        Ok(())
    }

    fn euclidean_distance<O>(&self, other: &O, axis: Axis) -> Result<Self>
    where
        Self: Sized,
        O: Matrix<Value = Self::Value> + ?Sized,
    {
        expect_dims(self.dims(), other.dims())?;
        let count = match axis {
            Axis::Rows => self.rows(),
            Axis::Columns => self.cols(),
        };
        let mut dest = self.allocate(Dimension::new(count, 1))?;
        self.euclidean_distance_into(other, axis, &mut dest)?;
        Ok(dest)
    }
}

impl<M: Matrix + ?Sized> MatrixOps for M {}

fn expect_dims(expected: Dimension, found: Dimension) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(DmatCoreError::mismatch(expected, found))
    }
}

fn nonempty(dims: Dimension) -> Result<Dimension> {
    if dims.is_empty() {
        return Err(DmatCoreError::InvalidDimensions(format!(
            "Cannot average an empty {} matrix",
            dims
        )));
    }
    Ok(dims)
}

fn check_reshape(dims: Dimension, rows: usize, cols: usize) -> Result<Dimension> {
    let target = Dimension::new(rows, cols);
    if target.len() > dims.len() {
        return Err(DmatCoreError::InvalidDimensions(format!(
            "Cannot reshape {} cells into {}x{}",
            dims.len(),
            rows,
            cols
        )));
    }
    Ok(target)
}

fn from_count<T: Element>(n: usize) -> Result<T> {
    T::from_usize(n).ok_or_else(|| DmatCoreError::Internal(format!("{} is not representable", n)))
}

fn guarded_divide<T: Element>(v: T, m: T) -> T {
    if v.is_zero() || m.is_zero() { v } else { v / m }
}

fn positions<T: Element>(values: &[T], value: T) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == value)
        .map(|(i, _)| i)
        .collect()
}

fn map_into<S, D, F>(src: &S, dest: &mut D, f: F) -> Result<()>
where
    S: Matrix + ?Sized,
    D: Matrix<Value = S::Value> + ?Sized,
    F: Fn(S::Value) -> S::Value,
{
    expect_dims(src.dims(), dest.dims())?;
    for r in 0..src.rows() {
        let row: Vec<_> = src.row(r)?.into_iter().map(&f).collect();
        dest.set_row(r, &row)?;
    }
    Ok(())
}

fn map_alloc<S, F>(src: &S, f: F) -> Result<S>
where
    S: Matrix,
    F: Fn(S::Value) -> S::Value,
{
    let mut dest = src.allocate(src.dims())?;
    map_into(src, &mut dest, f)?;
    Ok(dest)
}

fn zip_into<S, O, D, F>(a: &S, b: &O, dest: &mut D, f: F) -> Result<()>
where
    S: Matrix + ?Sized,
    O: Matrix<Value = S::Value> + ?Sized,
    D: Matrix<Value = S::Value> + ?Sized,
    F: Fn(S::Value, S::Value) -> S::Value,
{
    expect_dims(a.dims(), b.dims())?;
    expect_dims(a.dims(), dest.dims())?;
    for r in 0..a.rows() {
        let row: Vec<_> = a
            .row(r)?
            .into_iter()
            .zip(b.row(r)?)
            .map(|(x, y)| f(x, y))
            .collect();
        dest.set_row(r, &row)?;
    }
    Ok(())
}

fn zip_alloc<S, O, F>(a: &S, b: &O, f: F) -> Result<S>
where
    S: Matrix,
    O: Matrix<Value = S::Value> + ?Sized,
    F: Fn(S::Value, S::Value) -> S::Value,
{
    expect_dims(a.dims(), b.dims())?;
    let mut dest = a.allocate(a.dims())?;
    zip_into(a, b, &mut dest, f)?;
    Ok(dest)
}

fn normalise_columns<S, D>(
    src: &S,
    dest: &mut D,
    exclude: Option<usize>,
    kind: Normalisation<S::Value>,
) -> Result<()>
where
    S: Matrix + ?Sized,
    D: Matrix<Value = S::Value> + ?Sized,
{
    expect_dims(src.dims(), dest.dims())?;
    let passthrough = matches!(kind, Normalisation::Mean) && src.rows() == 1;
    for c in 0..src.cols() {
        let column = src.column(c)?;
        if passthrough || exclude == Some(c) {
            dest.set_column(c, &column)?;
        } else {
            dest.set_column(c, &kind.apply(&column)?)?;
        }
    }
    Ok(())
}

fn normalise_alloc<S: Matrix>(
    src: &S,
    exclude: Option<usize>,
    kind: Normalisation<S::Value>,
) -> Result<S> {
    let mut dest = src.allocate(src.dims())?;
    normalise_columns(src, &mut dest, exclude, kind)?;
    Ok(dest)
}

fn min_max_bounds<S: Matrix + ?Sized>(
    src: &S,
    exclude: Option<usize>,
) -> Result<Normalisation<S::Value>> {
    let (mut lo, mut hi) = (S::Value::infinity(), S::Value::neg_infinity());
    for c in (0..src.cols()).filter(|c| exclude != Some(*c)) {
        for v in src.column(c)? {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    Ok(Normalisation::MinMax { lo, hi })
}

fn column_mean<T: Element>(column: &[T]) -> Result<T> {
    let n = from_count::<T>(column.len())?;
    Ok(column.iter().fold(T::zero(), |acc, v| acc + *v) / n)
}
