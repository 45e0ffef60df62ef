//! File-backed matrix storage.
//!
//! The data file is a flat row-major array of native-endian cells
//! (`rows * cols * size_of::<T>()` bytes) accessed through a writable memory
//! map. Dimensions live in a companion `<file>.size` side file holding one
//! CSV record `rows,cols`, so a matrix can be reopened without scanning its
//! data. The two files are always written and deleted together.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, error, info, warn};
use memmap2::MmapMut;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::dimension::Dimension;
use crate::error::{DmatCoreError, Result};
use crate::traits::{Element, Matrix};

const SIZE_SUFFIX: &str = ".size";
const TEMP_SUFFIX: &str = ".jmat";
const TEMP_IDENTIFIER: &[u8] = b"dmat-core.disk-matrix";

/// A matrix whose cells live in a memory-mapped file.
///
/// Every access takes the instance's store mutex and then an exclusive
/// advisory lock on the data file, released as soon as the access completes.
/// Row reads and writes move a whole row under one lock.
///
/// Temporary matrices (see [`DiskMatrix::temporary`]) delete their data and
/// side files on [`DiskMatrix::close`] or, failing that, on drop.
pub struct DiskMatrix<T: Element = f64> {
    path: PathBuf,
    scratch_dir: PathBuf,
    dims: Dimension,
    temporary: bool,
    cursor: usize,
    store: Mutex<Option<DiskStore>>,
    _marker: PhantomData<T>,
}

#[derive(Debug)]
struct DiskStore {
    file: File,
    map: Option<MmapMut>,
}

/// Holds the advisory lock on a data file; unlocks on drop.
struct FileLockGuard<'a> {
    file: &'a File,
}

impl<'a> FileLockGuard<'a> {
    fn acquire(file: &'a File) -> io::Result<Self> {
        file.lock()?;
        Ok(Self { file })
    }
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release matrix file lock: {}", e);
        }
    }
}

impl<T: Element> DiskMatrix<T> {
    /// Creates (or truncates) a data file at `path` holding a zero-filled
    /// `dims` matrix.
    pub fn create<P: AsRef<Path>>(path: P, dims: Dimension) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| io_failure("create", &path, e))?;
        let store = DiskStore::new(file, byte_len::<T>(dims), &path)?;
        debug!("Created {} disk matrix at {}", dims, path.display());
        Ok(Self::from_parts(path, std::env::temp_dir(), dims, false, store))
    }

    /// Opens an existing data file, reading its shape from `<path>.size`.
    /// A missing side file yields an empty `0x0` matrix.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dims = read_size_file(&path)?.unwrap_or_default();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| io_failure("open", &path, e))?;
        let existing = file
            .metadata()
            .map_err(|e| io_failure("inspect", &path, e))?
            .len();
        let store = DiskStore::new(file, existing.max(byte_len::<T>(dims)), &path)?;
        debug!("Opened {} disk matrix at {}", dims, path.display());
        Ok(Self::from_parts(path, std::env::temp_dir(), dims, false, store))
    }

    /// Creates a zero-filled temporary matrix in the system temp directory.
    pub fn temporary(dims: Dimension) -> Result<Self> {
        Self::temporary_in(std::env::temp_dir(), dims)
    }

    /// Creates a zero-filled temporary matrix in `dir`, under a fresh
    /// `<digest>.jmat` name.
    pub fn temporary_in<P: AsRef<Path>>(dir: P, dims: Dimension) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut rng = fastrand::Rng::new();
        let (path, file) = loop {
            let key: Vec<u8> = (0..32).map(|_| rng.u8(..)).collect();
            let path = dir.join(temp_file_name(&key));
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_failure("create", &path, e)),
            }
        };
        let store = match DiskStore::new(file, byte_len::<T>(dims), &path) {
            Ok(store) => store,
            Err(e) => {
                remove_files(&path);
                return Err(e);
            }
        };
        info!("Created temporary {} matrix {}", dims, path.display());
        Ok(Self::from_parts(path, dir, dims, true, store))
    }

    /// Copies any matrix into a new data file at `path`.
    pub fn from_matrix<P, M>(path: P, source: &M) -> Result<Self>
    where
        P: AsRef<Path>,
        M: Matrix<Value = T> + ?Sized,
    {
        let mut out = Self::create(path, source.dims())?;
        for r in 0..source.rows() {
            out.set_row(r, &source.row(r)?)?;
        }
        Ok(out)
    }

    fn from_parts(
        path: PathBuf,
        scratch_dir: PathBuf,
        dims: Dimension,
        temporary: bool,
        store: DiskStore,
    ) -> Self {
        Self {
            path,
            scratch_dir,
            dims,
            temporary,
            cursor: 0,
            store: Mutex::new(Some(store)),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn is_closed(&self) -> bool {
        self.store.lock().is_none()
    }

    /// Path of the side file describing `path`'s dimensions.
    pub fn size_path<P: AsRef<Path>>(path: P) -> PathBuf {
        let mut name = path.as_ref().as_os_str().to_owned();
        name.push(SIZE_SUFFIX);
        PathBuf::from(name)
    }

    /// Copies the raw cells to `dest` and writes `<dest>.size` next to it.
    pub fn save<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        let bytes = self.with_cells(|cells| bytemuck::cast_slice::<T, u8>(cells).to_vec())?;
        fs::write(dest, bytes).map_err(|e| io_failure("write", dest, e))?;
        write_size_file(dest, self.dims)?;
        info!("Saved {} matrix to {}", self.dims, dest.display());
        Ok(())
    }

    /// Stores `value` at the write cursor, growing by one row when full. A
    /// matrix without columns first gains a single column.
    pub fn push(&mut self, value: T) -> Result<()> {
        if self.cursor >= self.dims.len() {
            let (grown, cursor) = if self.dims.cols == 0 {
                (Dimension::new(self.dims.rows.max(1), 1), 0)
            } else {
                (Dimension::new(self.dims.rows + 1, self.dims.cols), self.dims.len())
            };
            self.resize(grown)?;
            self.cursor = cursor;
        }
        let (row, col) = (self.cursor / self.dims.cols, self.cursor % self.dims.cols);
        self.set(row, col, value)?;
        self.cursor += 1;
        Ok(())
    }

    /// Flushes and releases the file. Named matrices get their side file
    /// written, temporaries are deleted. Further access fails with
    /// [`DmatCoreError::Closed`]. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(store) = self.store.get_mut().take() else {
            return Ok(());
        };
        let flushed = match &store.map {
            Some(map) => map.flush().map_err(|e| io_failure("flush", &self.path, e)),
            None => Ok(()),
        };
        drop(store);
        if self.temporary {
            remove_files(&self.path);
            info!("Deleted temporary matrix {}", self.path.display());
            flushed
        } else {
            flushed?;
            if !self.path.exists() {
                warn!(
                    "Data file {} was removed while open, skipping its size file",
                    self.path.display()
                );
                return Ok(());
            }
            write_size_file(&self.path, self.dims)
        }
    }

    /// Deletes a data file together with its side file. Meant for closed
    /// matrices; an instance still open on `path` will not recreate the side
    /// file when it closes.
    pub fn remove<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|e| io_failure("remove", path, e))?;
        match fs::remove_file(Self::size_path(path)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(io_failure("remove", &Self::size_path(path), e))
            }
            _ => Ok(()),
        }
    }

    /// Runs `f` over the mapped cells while holding both locks.
    fn with_cells<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> Result<R> {
        let mut guard = self.store.lock();
        let store = guard.as_mut().ok_or(DmatCoreError::Closed)?;
        let _lock =
            FileLockGuard::acquire(&store.file).map_err(|e| io_failure("lock", &self.path, e))?;
        let bytes = byte_len::<T>(self.dims) as usize;
        let cells: &mut [T] = match store.map.as_mut() {
            Some(map) => bytemuck::try_cast_slice_mut(&mut map[..bytes])
                .map_err(|e| DmatCoreError::Internal(format!("Bad cell layout: {:?}", e)))?,
            None => &mut [],
        };
        Ok(f(cells))
    }
}

impl DiskStore {
    fn new(file: File, len: u64, path: &Path) -> Result<Self> {
        let mut map = None;
        remap(&file, &mut map, len).map_err(|e| io_failure("map", path, e))?;
        Ok(Self { file, map })
    }
}

impl<T: Element> fmt::Debug for DiskMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskMatrix")
            .field("path", &self.path)
            .field("dims", &self.dims)
            .field("temporary", &self.temporary)
            .finish()
    }
}

impl<T: Element> Matrix for DiskMatrix<T> {
    type Value = T;

    fn dims(&self) -> Dimension {
        self.dims
    }

    fn get(&self, row: usize, col: usize) -> Option<T> {
        let i = self.dims.index(row, col)?;
        self.with_cells(|cells| cells[i]).ok()
    }

    fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let dims = self.dims;
        let i = dims
            .index(row, col)
            .ok_or(DmatCoreError::IndexOutOfBounds { row, col, dims })?;
        self.with_cells(|cells| cells[i] = value)
    }

    /// Keeps the overlapping top-left region; new cells read as zero.
    fn resize(&mut self, dims: Dimension) -> Result<()> {
        let old = self.dims;
        if old == dims {
            return Ok(());
        }
        let path = self.path.clone();
        let mut guard = self.store.lock();
        let store = guard.as_mut().ok_or(DmatCoreError::Closed)?;
        let _lock = FileLockGuard::acquire(&store.file).map_err(|e| io_failure("lock", &path, e))?;

        let (old_bytes, new_bytes) = (byte_len::<T>(old), byte_len::<T>(dims));
        if new_bytes > old_bytes {
            remap(&store.file, &mut store.map, new_bytes)
                .map_err(|e| io_failure("grow", &path, e))?;
        }
        if let Some(map) = store.map.as_mut() {
            let cells: &mut [T] = bytemuck::try_cast_slice_mut(&mut map[..])
                .map_err(|e| DmatCoreError::Internal(format!("Bad cell layout: {:?}", e)))?;
            relayout(cells, old, dims);
        }
        if new_bytes < old_bytes {
            if let Some(map) = &store.map {
                map.flush().map_err(|e| io_failure("flush", &path, e))?;
            }
            remap(&store.file, &mut store.map, new_bytes)
                .map_err(|e| io_failure("shrink", &path, e))?;
        }
        drop(_lock);
        drop(guard);

        debug!("Resized {} from {} to {}", path.display(), old, dims);
        self.dims = dims;
        self.cursor = self.cursor.min(dims.len());
        Ok(())
    }

    fn allocate(&self, dims: Dimension) -> Result<Self> {
        Self::temporary_in(&self.scratch_dir, dims)
    }

    fn try_clone(&self) -> Result<Self> {
        let cells = self.to_vec()?;
        let out = self.allocate(self.dims)?;
        out.with_cells(|dst| dst.copy_from_slice(&cells))?;
        Ok(out)
    }

    fn row(&self, row: usize) -> Result<Vec<T>> {
        let dims = self.dims;
        if row >= dims.rows {
            return Err(DmatCoreError::IndexOutOfBounds { row, col: 0, dims });
        }
        let start = row * dims.cols;
        self.with_cells(|cells| cells[start..start + dims.cols].to_vec())
    }

    fn set_row(&mut self, row: usize, values: &[T]) -> Result<()> {
        let dims = self.dims;
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
        let start = row * dims.cols;
        self.with_cells(|cells| cells[start..start + dims.cols].copy_from_slice(values))
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        self.with_cells(|cells| cells.to_vec())
    }
}

impl<T: Element> Drop for DiskMatrix<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close disk matrix {}: {}", self.path.display(), e);
        }
    }
}

/// Moves the overlapping region of an `old`-shaped row-major layout into a
/// `new`-shaped one and zeroes everything else. `cells` must be large enough
/// for both shapes.
fn relayout<T: Element>(cells: &mut [T], old: Dimension, new: Dimension) {
    let keep_rows = old.rows.min(new.rows);
    let keep_cols = old.cols.min(new.cols);
    if new.cols > old.cols {
        // Rows move towards the end; go bottom-up so nothing unread is overwritten.
        for r in (0..keep_rows).rev() {
            let (src, dst) = (r * old.cols, r * new.cols);
            cells.copy_within(src..src + keep_cols, dst);
            cells[dst + keep_cols..dst + new.cols].fill(T::zero());
        }
    } else if new.cols < old.cols {
        for r in 0..keep_rows {
            let (src, dst) = (r * old.cols, r * new.cols);
            cells.copy_within(src..src + keep_cols, dst);
        }
    }
    let tail = keep_rows * new.cols;
    let end = new.len().min(cells.len());
    if tail < end {
        cells[tail..end].fill(T::zero());
    }
}

fn remap(file: &File, map: &mut Option<MmapMut>, len: u64) -> io::Result<()> {
    *map = None;
    file.set_len(len)?;
    if len > 0 {
        // SAFETY: the file stays open for the map's lifetime and every access
        // to it goes through the store mutex and the file lock.
        *map = Some(unsafe { MmapMut::map_mut(file)? });
    }
    Ok(())
}

fn byte_len<T: Element>(dims: Dimension) -> u64 {
    (dims.len() * std::mem::size_of::<T>()) as u64
}

fn temp_file_name(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(TEMP_IDENTIFIER);
    let encoded = STANDARD.encode(hasher.finalize());
    let stem: String = encoded.chars().filter(|c| *c != '/' && *c != '\n').collect();
    format!("{}{}", stem, TEMP_SUFFIX)
}

fn read_size_file(path: &Path) -> Result<Option<Dimension>> {
    let side = DiskMatrix::<f64>::size_path(path);
    if !side.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(&side)?;
    match reader.deserialize::<Dimension>().next() {
        Some(dims) => Ok(Some(dims?)),
        None => Err(DmatCoreError::ParseError(format!(
            "{} holds no dimensions",
            side.display()
        ))),
    }
}

fn write_size_file(path: &Path, dims: Dimension) -> Result<()> {
    let side = DiskMatrix::<f64>::size_path(path);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(&side)?;
    writer.serialize(dims)?;
    writer.flush().map_err(|e| io_failure("write", &side, e))?;
    Ok(())
}

fn remove_files(path: &Path) {
    for file in [path.to_path_buf(), DiskMatrix::<f64>::size_path(path)] {
        if let Err(e) = fs::remove_file(&file) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to delete {}: {}", file.display(), e);
            }
        }
    }
}

fn io_failure(action: &str, path: &Path, e: io::Error) -> DmatCoreError {
    error!("Failed to {} {}: {}", action, path.display(), e);
    DmatCoreError::IoError(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap_matrix::HeapMatrix;
    use crate::ops::MatrixOps;
    use tempfile::tempdir;

    #[test]
    fn test_create_set_get() -> Result<()> {
        let dir = tempdir()?;
        let mut m: DiskMatrix = DiskMatrix::create(dir.path().join("a.bin"), Dimension::new(2, 3))?;
        assert_eq!(m.get(1, 2), Some(0.0));
        m.set(1, 2, 6.5)?;
        assert_eq!(m.get(1, 2), Some(6.5));
        assert_eq!(m.get(2, 0), None);
        assert!(m.set(0, 3, 1.0).is_err());
        assert_eq!(
            fs::metadata(dir.path().join("a.bin"))?.len(),
            (6 * std::mem::size_of::<f64>()) as u64
        );
        Ok(())
    }

    #[test]
    fn test_save_and_reopen_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let source = HeapMatrix::from_rows(&[[1.0, -2.0], [3.5, 4.0], [0.0, 9.0]])?;
        let mut disk = DiskMatrix::from_matrix(dir.path().join("src.bin"), &source)?;

        let copy_path = dir.path().join("copy.bin");
        disk.save(&copy_path)?;
        disk.close()?;
        assert!(DiskMatrix::<f64>::size_path(dir.path().join("src.bin")).exists());

        let reopened: DiskMatrix = DiskMatrix::open(&copy_path)?;
        assert_eq!(reopened.dims(), source.dims());
        assert_eq!(reopened.to_vec()?, source.to_vec()?);
        assert_eq!(
            fs::read_to_string(DiskMatrix::<f64>::size_path(&copy_path))?.trim_end(),
            "3,2"
        );
        Ok(())
    }

    #[test]
    fn test_open_without_side_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bare.bin");
        fs::write(&path, [0u8; 16])?;
        let m: DiskMatrix = DiskMatrix::open(&path)?;
        assert_eq!(m.dims(), Dimension::new(0, 0));
        Ok(())
    }

    #[test]
    fn test_temporary_files_are_deleted() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempdir()?;
        let path = {
            let m: DiskMatrix = DiskMatrix::temporary_in(dir.path(), Dimension::new(4, 4))?;
            let path = m.path().to_path_buf();
            assert!(path.exists());
            assert!(path.to_string_lossy().ends_with(".jmat"));
            assert!(m.is_temporary());
            path
        };
        assert!(!path.exists());

        let mut m: DiskMatrix = DiskMatrix::temporary_in(dir.path(), Dimension::new(1, 1))?;
        let path = m.path().to_path_buf();
        m.close()?;
        assert!(!path.exists());
        assert!(m.is_closed());
        assert!(matches!(m.set(0, 0, 1.0), Err(DmatCoreError::Closed)));
        assert_eq!(m.get(0, 0), None);
        m.close()?;
        Ok(())
    }

    #[test]
    fn test_temp_names_are_unique() {
        let a = temp_file_name(b"one");
        let b = temp_file_name(b"two");
        assert_ne!(a, b);
        assert!(!a.contains('/'));
        assert!(a.ends_with(TEMP_SUFFIX));
    }

    #[test]
    fn test_resize_relayouts_rows() -> Result<()> {
        let dir = tempdir()?;
        let source = HeapMatrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])?;
        let mut m = DiskMatrix::from_matrix(dir.path().join("r.bin"), &source)?;

        m.resize(Dimension::new(3, 4))?;
        assert_eq!(
            m.to_rows()?,
            vec![
                vec![1.0, 2.0, 3.0, 0.0],
                vec![4.0, 5.0, 6.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.0]
            ]
        );

        m.resize(Dimension::new(3, 2))?;
        assert_eq!(m.to_rows()?, vec![vec![1.0, 2.0], vec![4.0, 5.0], vec![0.0, 0.0]]);

        m.resize(Dimension::new(1, 1))?;
        assert_eq!(m.to_vec()?, vec![1.0]);
        assert_eq!(fs::metadata(m.path())?.len(), std::mem::size_of::<f64>() as u64);
        Ok(())
    }

    #[test]
    fn test_push_grows_by_rows() -> Result<()> {
        let dir = tempdir()?;
        let mut m: DiskMatrix = DiskMatrix::create(dir.path().join("p.bin"), Dimension::new(0, 0))?;
        m.push(1.0)?;
        m.push(2.0)?;
        assert_eq!(m.dims(), Dimension::new(2, 1));
        assert_eq!(m.column(0)?, vec![1.0, 2.0]);

        let mut m: DiskMatrix = DiskMatrix::create(dir.path().join("q.bin"), Dimension::new(2, 0))?;
        m.push(5.0)?;
        m.push(6.0)?;
        assert_eq!(m.dims(), Dimension::new(2, 1));
        assert_eq!(m.column(0)?, vec![5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_algebra_allocates_on_disk() -> Result<()> {
        let dir = tempdir()?;
        let source = HeapMatrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]])?;
        let m = DiskMatrix::from_matrix(dir.path().join("m.bin"), &source)?;
        let t = m.transpose()?;
        assert!(t.is_temporary());
        assert_eq!(t.to_vec()?, vec![1.0, 3.0, 2.0, 4.0]);
        let clone = m.try_clone()?;
        assert_eq!(clone.to_vec()?, m.to_vec()?);
        assert!(m.sum(&source)?.approx_eq(&source.multiply_scalar(2.0)?, 0.0));
        Ok(())
    }

    #[test]
    fn test_remove_while_open_leaves_no_side_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("open.bin");
        let m: DiskMatrix = DiskMatrix::create(&path, Dimension::new(2, 2))?;
        DiskMatrix::<f64>::remove(&path)?;
        drop(m);
        assert!(!path.exists());
        assert!(!DiskMatrix::<f64>::size_path(&path).exists());
        Ok(())
    }

    #[test]
    fn test_remove_deletes_both_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("gone.bin");
        let mut m: DiskMatrix = DiskMatrix::create(&path, Dimension::new(2, 2))?;
        m.close()?;
        assert!(DiskMatrix::<f64>::size_path(&path).exists());
        DiskMatrix::<f64>::remove(&path)?;
        assert!(!path.exists());
        assert!(!DiskMatrix::<f64>::size_path(&path).exists());
        Ok(())
    }
}
