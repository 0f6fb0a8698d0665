//! Square integer matrix stored in row-major order.

use std::fmt;

use serde::Serialize;

use crate::error::{OffloadError, Result};

/// An N×N grid of `i32`, stored flat in row-major order.
///
/// The invariant `data.len() == dimension * dimension` is checked on
/// construction and never broken afterwards; there is no mutable access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matrix {
    dimension: u32,
    data: Vec<i32>,
}

impl Matrix {
    /// Create a matrix from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if `data.len()` is not `dimension * dimension`.
    pub fn new(dimension: u32, data: Vec<i32>) -> Result<Self> {
        let n = dimension as usize;
        let expected = n.checked_mul(n).ok_or_else(|| {
            OffloadError::Protocol(format!("matrix dimension {} overflows", dimension))
        })?;
        if data.len() != expected {
            return Err(OffloadError::Protocol(format!(
                "matrix of dimension {} needs {} entries, got {}",
                dimension,
                expected,
                data.len()
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Create a matrix from rows. Every row must be as long as there are rows.
    ///
    /// ```
    /// use offload_client::Matrix;
    ///
    /// let m = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
    /// assert_eq!(m.as_slice(), &[1, 2, 3, 4]);
    /// ```
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self> {
        let dimension = u32::try_from(rows.len())
            .map_err(|_| OffloadError::Protocol("too many rows".to_string()))?;
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != rows.len())
        {
            return Err(OffloadError::Protocol(format!(
                "row {} has {} entries, expected {}",
                i,
                row.len(),
                rows.len()
            )));
        }
        Self::new(dimension, rows.into_iter().flatten().collect())
    }

    /// Dimension N.
    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Row-major entries.
    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Entry at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        let n = self.dimension as usize;
        if row >= n || col >= n {
            return None;
        }
        self.data.get(row * n + col).copied()
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks(0) panics; an empty matrix simply has no rows.
        let n = (self.dimension as usize).max(1);
        self.data.chunks(n)
    }

    /// Consume into nested rows.
    pub fn into_rows(self) -> Vec<Vec<i32>> {
        self.rows().map(<[i32]>::to_vec).collect()
    }

    /// The matrix the reference worker produces: every row in the top half
    /// is copied over its mirror row in the bottom half.
    ///
    /// ```
    /// use offload_client::Matrix;
    ///
    /// let m = Matrix::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]).unwrap();
    /// let mirrored = m.mirrored_horizontally();
    /// assert_eq!(mirrored.into_rows(), vec![vec![1, 2, 3], vec![4, 5, 6], vec![1, 2, 3]]);
    /// ```
    pub fn mirrored_horizontally(&self) -> Matrix {
        let n = self.dimension as usize;
        let mut data = self.data.clone();
        for i in 0..n / 2 {
            let mirror = n - 1 - i;
            data.copy_within(i * n..(i + 1) * n, mirror * n);
        }
        Matrix {
            dimension: self.dimension,
            data,
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for value in row {
                write!(f, "{:>4} ", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
