use std::path::PathBuf;

use log::debug;

use crate::dimension::Dimension;
use crate::disk_matrix::DiskMatrix;
use crate::error::Result;
use crate::heap_matrix::HeapMatrix;
use crate::traits::{Element, Matrix};

/// Where a matrix keeps its cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    #[default]
    Heap,
    Disk,
}

/// A matrix of either backend, chosen at runtime.
#[derive(Debug)]
pub enum AnyMatrix<T: Element = f64> {
    Heap(HeapMatrix<T>),
    Disk(DiskMatrix<T>),
}

impl<T: Element> AnyMatrix<T> {
    pub fn backend(&self) -> Backend {
        match self {
            AnyMatrix::Heap(_) => Backend::Heap,
            AnyMatrix::Disk(_) => Backend::Disk,
        }
    }

    /// Releases disk storage; a no-op for heap matrices.
    pub fn close(&mut self) -> Result<()> {
        match self {
            AnyMatrix::Heap(_) => Ok(()),
            AnyMatrix::Disk(m) => m.close(),
        }
    }
}

impl<T: Element> From<HeapMatrix<T>> for AnyMatrix<T> {
    fn from(m: HeapMatrix<T>) -> Self {
        AnyMatrix::Heap(m)
    }
}

impl<T: Element> From<DiskMatrix<T>> for AnyMatrix<T> {
    fn from(m: DiskMatrix<T>) -> Self {
        AnyMatrix::Disk(m)
    }
}

impl<T: Element> Matrix for AnyMatrix<T> {
    type Value = T;

    fn dims(&self) -> Dimension {
        match self {
            AnyMatrix::Heap(m) => m.dims(),
            AnyMatrix::Disk(m) => m.dims(),
        }
    }

    fn get(&self, row: usize, col: usize) -> Option<T> {
        match self {
            AnyMatrix::Heap(m) => m.get(row, col),
            AnyMatrix::Disk(m) => m.get(row, col),
        }
    }

    fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        match self {
            AnyMatrix::Heap(m) => m.set(row, col, value),
            AnyMatrix::Disk(m) => m.set(row, col, value),
        }
    }

    fn resize(&mut self, dims: Dimension) -> Result<()> {
        match self {
            AnyMatrix::Heap(m) => m.resize(dims),
            AnyMatrix::Disk(m) => m.resize(dims),
        }
    }

    fn allocate(&self, dims: Dimension) -> Result<Self> {
        Ok(match self {
            AnyMatrix::Heap(m) => AnyMatrix::Heap(m.allocate(dims)?),
            AnyMatrix::Disk(m) => AnyMatrix::Disk(m.allocate(dims)?),
        })
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(match self {
            AnyMatrix::Heap(m) => AnyMatrix::Heap(m.try_clone()?),
            AnyMatrix::Disk(m) => AnyMatrix::Disk(m.try_clone()?),
        })
    }

    fn row(&self, row: usize) -> Result<Vec<T>> {
        match self {
            AnyMatrix::Heap(m) => m.row(row),
            AnyMatrix::Disk(m) => m.row(row),
        }
    }

    fn set_row(&mut self, row: usize, values: &[T]) -> Result<()> {
        match self {
            AnyMatrix::Heap(m) => m.set_row(row, values),
            AnyMatrix::Disk(m) => m.set_row(row, values),
        }
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        match self {
            AnyMatrix::Heap(m) => m.to_vec(),
            AnyMatrix::Disk(m) => m.to_vec(),
        }
    }
}

/// Picks a backend for new matrices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixFactory {
    /// Cell count at or above which `create` uses the disk backend.
    pub disk_threshold: usize,
    /// Directory for temporary backing files.
    pub temp_dir: PathBuf,
}

impl Default for MatrixFactory {
    fn default() -> Self {
        Self {
            disk_threshold: 1_000_000,
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl MatrixFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(disk_threshold: usize, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            disk_threshold,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn backend_for(&self, dims: Dimension) -> Backend {
        if dims.len() >= self.disk_threshold {
            Backend::Disk
        } else {
            Backend::Heap
        }
    }

    /// Creates a zero-filled matrix, on disk when it is large enough.
    pub fn create<T: Element>(&self, dims: Dimension) -> Result<AnyMatrix<T>> {
        self.create_with(self.backend_for(dims), dims)
    }

    /// Creates a zero-filled matrix on the given backend.
    pub fn create_with<T: Element>(&self, backend: Backend, dims: Dimension) -> Result<AnyMatrix<T>> {
        debug!("Allocating {} matrix on the {:?} backend", dims, backend);
        Ok(match backend {
            Backend::Heap => AnyMatrix::Heap(HeapMatrix::zeros(dims.rows, dims.cols)),
            Backend::Disk => AnyMatrix::Disk(DiskMatrix::temporary_in(&self.temp_dir, dims)?),
        })
    }
}
