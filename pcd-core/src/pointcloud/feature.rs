use crate::error::{PcdError, Result};

/// Row-major matrix of per-point feature values. Column order is fixed by the
/// descriptor schedule that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    columns: usize,
    rows: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// A matrix with `rows` rows and no columns, used when a pipeline carries
    /// no features but still needs the row count.
    pub fn empty(rows: usize) -> Self {
        Self {
            columns: 0,
            rows,
            values: Vec::new(),
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>, columns: usize) -> Result<Self> {
        let row_count = rows.len();
        let mut values = Vec::with_capacity(row_count * columns);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns {
                return Err(PcdError::shape(format!(
                    "row {} has {} values, expected {}",
                    index,
                    row.len(),
                    columns
                )));
            }
            values.extend(row);
        }
        Ok(Self {
            columns,
            rows: row_count,
            values,
        })
    }

    /// Builds a matrix from column vectors that must all have `rows` entries.
    pub fn from_columns(columns: &[Vec<f64>], rows: usize) -> Result<Self> {
        for (index, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(PcdError::shape(format!(
                    "column {} has {} values, expected {}",
                    index,
                    column.len(),
                    rows
                )));
            }
        }
        let mut values = Vec::with_capacity(rows * columns.len());
        for row in 0..rows {
            values.extend(columns.iter().map(|column| column[row]));
        }
        Ok(Self {
            columns: columns.len(),
            rows,
            values,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index * self.columns..(index + 1) * self.columns]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |index| self.row(index))
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.iter_rows().map(|row| row[index]).collect()
    }

    /// Concatenates `other` to the right of `self`.
    pub fn hstack(&self, other: &FeatureMatrix) -> Result<FeatureMatrix> {
        if self.rows != other.rows {
            return Err(PcdError::shape(format!(
                "cannot stack {} rows next to {} rows",
                other.rows, self.rows
            )));
        }
        let columns = self.columns + other.columns;
        let mut values = Vec::with_capacity(self.rows * columns);
        for index in 0..self.rows {
            values.extend_from_slice(self.row(index));
            values.extend_from_slice(other.row(index));
        }
        Ok(FeatureMatrix {
            columns,
            rows: self.rows,
            values,
        })
    }

    pub fn push_column(&self, column: &[f64]) -> Result<FeatureMatrix> {
        self.hstack(&FeatureMatrix::from_columns(&[column.to_vec()], column.len())?)
    }

    pub fn retain_mask(&self, mask: &[bool]) -> FeatureMatrix {
        debug_assert_eq!(mask.len(), self.rows);
        let mut values = Vec::with_capacity(self.values.len());
        let mut rows = 0;
        for (index, keep) in mask.iter().enumerate() {
            if *keep {
                values.extend_from_slice(self.row(index));
                rows += 1;
            }
        }
        FeatureMatrix {
            columns: self.columns,
            rows,
            values,
        }
    }

    /// `true` for every row whose values are all finite numbers.
    pub fn valid_rows(&self) -> Vec<bool> {
        self.iter_rows()
            .map(|row| row.iter().all(|value| value.is_finite()))
            .collect()
    }

    /// Picks columns in the order given by `indices`.
    pub fn select(&self, indices: &FeatureIndexSet) -> Result<FeatureMatrix> {
        if let Some(bad) = indices.iter().find(|index| *index >= self.columns) {
            return Err(PcdError::shape(format!(
                "feature index {} out of range for {} columns",
                bad, self.columns
            )));
        }
        let columns = indices.len();
        let mut values = Vec::with_capacity(self.rows * columns);
        for row in self.iter_rows() {
            values.extend(indices.iter().map(|index| row[index]));
        }
        Ok(FeatureMatrix {
            columns,
            rows: self.rows,
            values,
        })
    }
}

/// Ordered column indices a trained model expects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureIndexSet(Vec<usize>);

impl FeatureIndexSet {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec![
                vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0],
            ],
            6,
        )
        .unwrap()
    }

    #[test]
    fn select_follows_index_order() {
        let selected = sample()
            .select(&FeatureIndexSet::new(vec![0, 2, 5]))
            .unwrap();
        assert_eq!(selected.columns(), 3);
        assert_eq!(selected.row(0), &[0.0, 2.0, 5.0]);
        assert_eq!(selected.row(1), &[10.0, 12.0, 15.0]);

        let reordered = sample().select(&FeatureIndexSet::new(vec![5, 0])).unwrap();
        assert_eq!(reordered.row(1), &[15.0, 10.0]);
    }

    #[test]
    fn select_rejects_out_of_range() {
        let err = sample().select(&FeatureIndexSet::new(vec![6])).unwrap_err();
        assert!(matches!(err, PcdError::Shape(_)));
    }

    #[test]
    fn hstack_requires_equal_rows() {
        let left = FeatureMatrix::from_columns(&[vec![1.0, 2.0]], 2).unwrap();
        let right = FeatureMatrix::from_columns(&[vec![3.0, 4.0], vec![5.0, 6.0]], 2).unwrap();
        let stacked = left.hstack(&right).unwrap();
        assert_eq!(stacked.columns(), 3);
        assert_eq!(stacked.row(1), &[2.0, 4.0, 6.0]);

        let short = FeatureMatrix::from_columns(&[vec![1.0]], 1).unwrap();
        assert!(left.hstack(&short).is_err());
    }

    #[test]
    fn valid_rows_flags_nan_and_inf() {
        let matrix = FeatureMatrix::from_rows(
            vec![vec![1.0, 2.0], vec![f64::NAN, 2.0], vec![1.0, f64::INFINITY]],
            2,
        )
        .unwrap();
        assert_eq!(matrix.valid_rows(), vec![true, false, false]);
        let kept = matrix.retain_mask(&matrix.valid_rows());
        assert_eq!(kept.rows(), 1);
        assert_eq!(kept.row(0), &[1.0, 2.0]);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        assert!(FeatureMatrix::from_rows(vec![vec![1.0], vec![1.0, 2.0]], 1).is_err());
    }

    #[test]
    fn empty_keeps_row_count() {
        let empty = FeatureMatrix::empty(4);
        assert_eq!(empty.rows(), 4);
        assert_eq!(empty.columns(), 0);
        assert_eq!(empty.row(3), &[] as &[f64]);
    }
}
