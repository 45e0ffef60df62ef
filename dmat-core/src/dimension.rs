use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The (rows, cols) shape of a matrix.
///
/// Equality is structural. Ordering is partial: one dimension is smaller than
/// another only if neither field is larger, which is what `resize` needs to
/// tell growth from shrinkage. A shape that gains rows while losing columns is
/// incomparable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub rows: usize,
    pub cols: usize,
}

impl Dimension {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells.
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// The shape of the transpose.
    pub const fn transposed(&self) -> Self {
        Self::new(self.cols, self.rows)
    }

    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Row-major linear index of `(row, col)`, if in range.
    pub const fn index(&self, row: usize, col: usize) -> Option<usize> {
        if self.contains(row, col) {
            Some(row * self.cols + col)
        } else {
            None
        }
    }
}

impl From<(usize, usize)> for Dimension {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self::new(rows, cols)
    }
}

impl PartialOrd for Dimension {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rows.cmp(&other.rows), self.cols.cmp(&other.cols)) {
            (Ordering::Equal, Ordering::Equal) => Some(Ordering::Equal),
            (Ordering::Less | Ordering::Equal, Ordering::Less | Ordering::Equal) => {
                Some(Ordering::Less)
            }
            (Ordering::Greater | Ordering::Equal, Ordering::Greater | Ordering::Equal) => {
                Some(Ordering::Greater)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::Dimension;
    use std::cmp::Ordering;

    #[test]
    fn test_dimension_len_and_index() {
        let d = Dimension::new(3, 4);
        assert_eq!(d.len(), 12);
        assert_eq!(d.index(1, 2), Some(6));
        assert_eq!(d.index(3, 0), None);
        assert_eq!(d.index(0, 4), None);
        assert!(!d.is_square());
        assert_eq!(d.transposed(), Dimension::new(4, 3));
    }

    #[test]
    fn test_dimension_ordering() {
        let small = Dimension::new(2, 2);
        assert_eq!(small.partial_cmp(&Dimension::new(2, 2)), Some(Ordering::Equal));
        assert!(small < Dimension::new(3, 2));
        assert!(small < Dimension::new(3, 3));
        assert!(Dimension::new(4, 2) > small);
        // One field grows while the other shrinks.
        assert_eq!(Dimension::new(1, 5).partial_cmp(&small), None);
    }

    #[test]
    fn test_dimension_display() {
        assert_eq!(Dimension::new(7, 1).to_string(), "7,1");
        assert_eq!(Dimension::from((2, 9)), Dimension::new(2, 9));
    }
}
