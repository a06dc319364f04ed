use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Row-major `f32` matrix: one row per item, one column per feature.
///
/// Deserialized matrices go through the same shape and finiteness checks as
/// [`Matrix::from_flat`], so a stored matrix can never index out of range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = Error;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        Matrix::from_flat(raw.rows, raw.cols, raw.data)
    }
}

impl Matrix {

    /// Build from row vectors. All rows must share one length and hold finite values.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::InvalidDimension {
                    expected: cols,
                    actual: row.len(),
                });
            }
            if let Some(j) = row.iter().position(|x| !x.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "non-finite value at row {}, column {}",
                    i, j
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Build from row-major values. `data` must hold exactly `rows * cols`
    /// finite values.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            Error::InvalidInput(format!("matrix shape {}x{} overflows", rows, cols))
        })?;
        if data.len() != expected {
            return Err(Error::InvalidDimension {
                expected,
                actual: data.len(),
            });
        }
        if let Some(i) = data.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite value at row {}, column {}",
                i / cols.max(1),
                i % cols.max(1)
            )));
        }
        Ok(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Column values, one per row.
    pub fn column(&self, j: usize) -> Vec<f32> {
        self.iter_rows().map(|r| r[j]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.row(1), &[3.0, 4.0]);
        assert_eq!(m.column(0), vec![1.0, 3.0]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, Error::InvalidDimension { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Matrix::from_rows(&[vec![1.0, f32::NAN]]).is_err());
        assert!(Matrix::from_rows(&[vec![f32::INFINITY]]).is_err());
        assert!(Matrix::from_flat(1, 2, vec![0.0, f32::NAN]).is_err());
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let m: Matrix = serde_json::from_str(r#"{"rows":2,"cols":2,"data":[1.0,2.0,3.0,4.0]}"#).unwrap();
        assert_eq!(m.row(1), &[3.0, 4.0]);

        let short = serde_json::from_str::<Matrix>(r#"{"rows":2,"cols":2,"data":[1.0,2.0,3.0]}"#);
        assert!(short.is_err());
        let overflow = serde_json::from_str::<Matrix>(
            r#"{"rows":18446744073709551615,"cols":2,"data":[]}"#,
        );
        assert!(overflow.is_err());
    }
}
