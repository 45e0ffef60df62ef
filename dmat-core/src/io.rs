//! CSV matrix files: one row per line, comma separated, no header.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, warn};

use crate::error::{DmatCoreError, Result};
use crate::heap_matrix::HeapMatrix;
use crate::traits::{Element, Matrix};

/// Reads a matrix from CSV text.
///
/// Fields that do not parse as numbers become zero. Rows shorter than the
/// first row are padded with zeros, longer rows are cut to its width.
pub fn read_csv<T: Element, R: Read>(reader: R) -> Result<HeapMatrix<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut width = None;
    let mut rows = 0;
    let mut data = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        let cols = *width.get_or_insert(record.len());
        if record.len() > cols {
            warn!(
                "CSV row {} has {} fields, keeping the first {}",
                rows,
                record.len(),
                cols
            );
        }
        data.extend(record.iter().take(cols).map(|field| {
            field.parse::<T>().unwrap_or_else(|_| {
                debug!("Unparsable CSV field {:?} read as 0", field);
                T::zero()
            })
        }));
        data.extend(std::iter::repeat_n(T::zero(), cols.saturating_sub(record.len())));
        rows += 1;
    }
    HeapMatrix::from_vec(rows, width.unwrap_or(0), data)
}

/// Writes every row of `matrix` as one CSV record.
pub fn write_csv<M, W>(matrix: &M, writer: W) -> Result<()>
where
    M: Matrix + ?Sized,
    W: Write,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    for r in 0..matrix.rows() {
        writer.write_record(matrix.row(r)?.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv_file<T: Element, P: AsRef<Path>>(path: P) -> Result<HeapMatrix<T>> {
    let file = File::open(path.as_ref()).map_err(DmatCoreError::IoError)?;
    read_csv(file)
}

pub fn write_csv_file<M, P>(matrix: &M, path: P) -> Result<()>
where
    M: Matrix + ?Sized,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref()).map_err(DmatCoreError::IoError)?;
    write_csv(matrix, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimension;
    use tempfile::tempdir;

    #[test]
    fn test_read_coerces_bad_fields_and_pads_rows() -> Result<()> {
        let text = "1, 2, 3\n4,abc,6\n7\n";
        let m: HeapMatrix = read_csv(text.as_bytes())?;
        assert_eq!(m.dims(), Dimension::new(3, 3));
        assert_eq!(
            m.to_rows()?,
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 0.0, 6.0], vec![7.0, 0.0, 0.0]]
        );
        Ok(())
    }

    #[test]
    fn test_read_empty_input() -> Result<()> {
        let m: HeapMatrix = read_csv("".as_bytes())?;
        assert!(m.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_format() -> Result<()> {
        let m = HeapMatrix::from_rows(&[[1.0, 2.5], [-3.0, 0.125]])?;
        let mut out = Vec::new();
        write_csv(&m, &mut out)?;
        assert_eq!(String::from_utf8_lossy(&out), "1,2.5\n-3,0.125\n");
        Ok(())
    }

    #[test]
    fn test_file_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("m.csv");
        let m = HeapMatrix::from_rows(&[[0.1, 0.2, 0.3], [1e-12, 5e20, -7.0]])?;
        write_csv_file(&m, &path)?;
        let back: HeapMatrix = read_csv_file(&path)?;
        assert_eq!(back, m);
        Ok(())
    }
}
