//! Scaled partial-pivot forward elimination.
//!
//! Rows are never moved. The chosen row order lives in a permutation vector
//! and every lookup goes through it: the row in elimination position `i` is
//! `matrix.row(permutation[i])`.

use log::debug;

use num_traits::{Float, Zero};

use dmat_core::{DmatCoreError, Matrix, Result};

/// Output of [`forward_eliminate`].
#[derive(Debug)]
pub struct Elimination<M: Matrix> {
    /// Upper triangle (under the permutation) holds `U`; the multipliers
    /// used to clear each column are stored below it, forming `L`.
    pub matrix: M,
    /// `permutation[i]` is the original row sitting at position `i`.
    pub permutation: Vec<usize>,
    /// Number of swaps applied to `permutation`.
    pub exchange_count: usize,
}

/// Per-row scale factors `1 / max_j |a_ij|`, zero for an all-zero row.
pub fn row_scale<M: Matrix + ?Sized>(a: &M) -> Result<Vec<M::Value>> {
    (0..a.rows())
        .map(|r| {
            let max = a
                .row(r)?
                .into_iter()
                .fold(M::Value::zero(), |m, v| m.max(v.abs()));
            Ok(if max.is_zero() { max } else { max.recip() })
        })
        .collect()
}

/// Eliminates `working` in place.
///
/// At each step the candidate maximizing `|a[p[r], col]| * scale[p[r]]` becomes
/// the pivot. A step whose best scaled candidate is not above `tolerance`
/// fails with `SingularMatrix`.
pub fn forward_eliminate<M: Matrix>(
    mut working: M,
    scale: &[M::Value],
    tolerance: M::Value,
) -> Result<Elimination<M>> {
    let dims = working.dims();
    if !dims.is_square() {
        return Err(DmatCoreError::NotSquare(dims));
    }
    let n = dims.rows;
    if scale.len() != n {
        return Err(DmatCoreError::InvalidDimensions(format!(
            "Scale vector has {} entries for {} rows",
            scale.len(),
            n
        )));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut exchange_count = 0;

    for col in 0..n.saturating_sub(1) {
        let mut best = col;
        let mut best_value = M::Value::zero();
        for r in col..n {
            let p = permutation[r];
            let candidate = working.get_or_zero(p, col).abs() * scale[p];
            if candidate > best_value {
                best_value = candidate;
                best = r;
            }
        }
        if best_value <= tolerance {
            debug!("No usable pivot in column {}", col);
            return Err(DmatCoreError::SingularMatrix { step: col });
        }
        if best != col {
            permutation.swap(col, best);
            exchange_count += 1;
        }

        let pivot_row = working.row(permutation[col])?;
        let pivot = pivot_row[col];
        for r in col + 1..n {
            let target = permutation[r];
            let mut row = working.row(target)?;
            let multiple = row[col] / pivot;
            if !multiple.is_zero() {
                for c in col + 1..n {
                    row[c] = row[c] - multiple * pivot_row[c];
                }
            }
            row[col] = multiple;
            working.set_row(target, &row)?;
        }
    }

    debug!(
        "Eliminated {}x{} matrix with {} row exchanges",
        n, n, exchange_count
    );
    Ok(Elimination {
        matrix: working,
        permutation,
        exchange_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmat_core::HeapMatrix;

    #[test]
    fn test_row_scale() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[1.0, -4.0], [0.0, 0.0]])?;
        assert_eq!(row_scale(&a)?, vec![0.25, 0.0]);
        Ok(())
    }

    #[test]
    fn test_pivot_selection_uses_scale() -> Result<()> {
        // Unscaled partial pivoting would pick row 1 (|10| > |1|); scaled, row 0
        // wins because its scaled entry is 1 against 10/1000.
        let a = HeapMatrix::from_rows(&[[1.0, 1.0], [10.0, 1000.0]])?;
        let scale = row_scale(&a)?;
        let e = forward_eliminate(a, &scale, 0.0)?;
        assert_eq!(e.permutation, vec![0, 1]);
        assert_eq!(e.exchange_count, 0);
        assert_eq!(e.matrix.row(1)?, vec![10.0, 990.0]);
        Ok(())
    }

    #[test]
    fn test_exchange_swaps_permutation_entries() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[0.0, 1.0], [1.0, 0.0]])?;
        let scale = row_scale(&a)?;
        let e = forward_eliminate(a, &scale, 0.0)?;
        assert_eq!(e.permutation, vec![1, 0]);
        assert_eq!(e.exchange_count, 1);
        Ok(())
    }

    #[test]
    fn test_zero_column_is_singular() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[0.0, 1.0, 2.0], [0.0, 3.0, 4.0], [0.0, 5.0, 6.0]])?;
        let scale = row_scale(&a)?;
        assert!(matches!(
            forward_eliminate(a, &scale, 0.0),
            Err(DmatCoreError::SingularMatrix { step: 0 })
        ));
        Ok(())
    }

    #[test]
    fn test_rejects_non_square() {
        let a: HeapMatrix = HeapMatrix::zeros(2, 3);
        assert!(matches!(
            forward_eliminate(a, &[1.0, 1.0], 0.0),
            Err(DmatCoreError::NotSquare(_))
        ));
    }
}
