use crate::dimension::Dimension;
use crate::error::{DmatCoreError, Result};
use crate::traits::{Element, Matrix};

/// A matrix stored in row-major order on the heap.
///
/// Cells are optional so a matrix can be filled incrementally with
/// [`HeapMatrix::push`]; a cell that was never written reads back as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapMatrix<T: Element = f64> {
    dims: Dimension,
    cells: Vec<Option<T>>, // cells[row * cols + col]
}

impl<T: Element> HeapMatrix<T> {
    /// Creates a matrix whose cells are all unfilled.
    pub fn new(rows: usize, cols: usize) -> Self {
        let dims = Dimension::new(rows, cols);
        Self {
            dims,
            cells: vec![None; dims.len()],
        }
    }

    /// Creates a new matrix filled with `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        let dims = Dimension::new(rows, cols);
        Self {
            dims,
            cells: vec![Some(value); dims.len()],
        }
    }

    /// Creates a new matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::zero())
    }

    pub fn ones(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::one())
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.cells[i * n + i] = Some(T::one());
        }
        m
    }

    /// Creates a matrix from row-major data.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(DmatCoreError::InvalidDimensions(format!(
                "Data length ({}) does not match dimensions ({}x{})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self {
            dims: Dimension::new(rows, cols),
            cells: data.into_iter().map(Some).collect(),
        })
    }

    /// Creates a matrix from a slice of equally long rows.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(DmatCoreError::InvalidDimensions(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), cols, data)
    }

    /// Creates an `n x 1` column vector.
    pub fn column_vector(values: &[T]) -> Self {
        Self {
            dims: Dimension::new(values.len(), 1),
            cells: values.iter().copied().map(Some).collect(),
        }
    }

    /// Whether `(row, col)` has been written.
    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.dims
            .index(row, col)
            .is_some_and(|i| self.cells[i].is_some())
    }

    /// Stores `value` in the first unfilled cell (row-major).
    ///
    /// When every cell is filled the matrix grows by one row and the value
    /// lands at the start of the new row. A matrix without columns first
    /// gains a single column (an empty matrix becomes `1x1`).
    pub fn push(&mut self, value: T) {
        if !self.cells.iter().any(Option::is_none) {
            let grown = if self.dims.cols == 0 {
                Dimension::new(self.dims.rows.max(1), 1)
            } else {
                Dimension::new(self.dims.rows + 1, self.dims.cols)
            };
            self.reshape_storage(grown);
        }
        if let Some(slot) = self.cells.iter_mut().find(|c| c.is_none()) {
            *slot = Some(value);
        }
    }

    fn reshape_storage(&mut self, dims: Dimension) {
        if dims.cols == self.dims.cols {
            self.cells.resize(dims.len(), None);
        } else {
            let mut cells = vec![None; dims.len()];
            let keep_rows = dims.rows.min(self.dims.rows);
            let keep_cols = dims.cols.min(self.dims.cols);
            for r in 0..keep_rows {
                let src = r * self.dims.cols;
                let dst = r * dims.cols;
                cells[dst..dst + keep_cols].copy_from_slice(&self.cells[src..src + keep_cols]);
            }
            self.cells = cells;
        }
        self.dims = dims;
    }
}

impl<T: Element> Default for HeapMatrix<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl<T: Element> Matrix for HeapMatrix<T> {
    type Value = T;

    fn dims(&self) -> Dimension {
        self.dims
    }

    fn get(&self, row: usize, col: usize) -> Option<T> {
        self.dims.index(row, col).and_then(|i| self.cells[i])
    }

    fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let dims = self.dims;
        let i = dims
            .index(row, col)
            .ok_or(DmatCoreError::IndexOutOfBounds { row, col, dims })?;
        self.cells[i] = Some(value);
        Ok(())
    }

    fn resize(&mut self, dims: Dimension) -> Result<()> {
        self.reshape_storage(dims);
        Ok(())
    }

    fn allocate(&self, dims: Dimension) -> Result<Self> {
        Ok(Self::zeros(dims.rows, dims.cols))
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn row(&self, row: usize) -> Result<Vec<T>> {
        let dims = self.dims;
        if row >= dims.rows {
            return Err(DmatCoreError::IndexOutOfBounds { row, col: 0, dims });
        }
        let start = row * dims.cols;
        Ok(self.cells[start..start + dims.cols]
            .iter()
            .map(|c| c.unwrap_or_else(T::zero))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::HeapMatrix;
    use crate::dimension::Dimension;
    use crate::error::DmatCoreError;
    use crate::traits::Matrix;

    #[test]
    fn test_new_matrix_cells_are_absent() {
        let m: HeapMatrix = HeapMatrix::new(2, 3);
        assert_eq!(m.dims(), Dimension::new(2, 3));
        assert_eq!(m.get(1, 2), None);
        assert_eq!(m.get_or_zero(1, 2), 0.0);
        assert!(!m.is_filled(0, 0));
    }

    #[test]
    fn test_get_set_and_bounds() -> Result<(), DmatCoreError> {
        let mut m: HeapMatrix = HeapMatrix::zeros(2, 2);
        m.set(1, 0, 4.5)?;
        assert_eq!(m.get(1, 0), Some(4.5));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.get(0, 2), None);
        assert!(matches!(
            m.set(0, 2, 1.0),
            Err(DmatCoreError::IndexOutOfBounds { row: 0, col: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(HeapMatrix::from_rows(&ragged).is_err());
        assert!(HeapMatrix::<f64>::from_vec(2, 2, vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_push_fills_then_grows() -> Result<(), DmatCoreError> {
        let mut m: HeapMatrix = HeapMatrix::default();
        m.push(1.0);
        assert_eq!(m.dims(), Dimension::new(1, 1));

        let mut m: HeapMatrix = HeapMatrix::new(1, 2);
        m.push(1.0);
        m.push(2.0);
        m.push(3.0);
        assert_eq!(m.dims(), Dimension::new(2, 2));
        assert_eq!(m.row(0)?, vec![1.0, 2.0]);
        assert_eq!(m.get(1, 0), Some(3.0));
        assert_eq!(m.get(1, 1), None);
        Ok(())
    }

    #[test]
    fn test_push_into_column_less_matrix_fills_row_major() -> Result<(), DmatCoreError> {
        let mut m: HeapMatrix = HeapMatrix::new(2, 0);
        m.push(1.0);
        m.push(2.0);
        assert_eq!(m.dims(), Dimension::new(2, 1));
        assert_eq!(m.column(0)?, vec![1.0, 2.0]);

        m.push(3.0);
        assert_eq!(m.dims(), Dimension::new(3, 1));
        assert_eq!(m.column(0)?, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_resize_keeps_top_left_region() -> Result<(), DmatCoreError> {
        let mut m = HeapMatrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])?;
        m.resize(Dimension::new(3, 2))?;
        assert_eq!(m.to_rows()?, vec![vec![1.0, 2.0], vec![4.0, 5.0], vec![0.0, 0.0]]);
        assert_eq!(m.get(2, 1), None);

        m.resize(Dimension::new(1, 4))?;
        assert_eq!(m.row(0)?, vec![1.0, 2.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_identity_rows_and_columns() -> Result<(), DmatCoreError> {
        let mut m: HeapMatrix = HeapMatrix::identity(3);
        assert_eq!(m.column(1)?, vec![0.0, 1.0, 0.0]);
        m.set_column(2, &[7.0, 8.0, 9.0])?;
        m.set_row(0, &[1.0, 1.0, 1.0])?;
        assert_eq!(m.to_vec()?, vec![1.0, 1.0, 1.0, 0.0, 1.0, 8.0, 0.0, 0.0, 9.0]);
        assert!(m.set_row(0, &[1.0]).is_err());
        assert!(m.column(3).is_err());
        Ok(())
    }
}
