//! Sliding-window sequencing of normalized rows.

use std::ops::Range;

use ndarray::{s, stack, Array3, ArrayView2, Axis};

use crate::error::PipelineError;
use crate::model::ModelError;

/// One fixed-length window over the normalized matrix.
#[derive(Debug, Clone)]
pub struct Sequence<'a> {
    /// Window position; also the index of its first row.
    pub index: usize,
    pub rows: ArrayView2<'a, f64>,
}

/// Every stride-1 window of `seq_length` rows over a normalized matrix.
///
/// Windows borrow the matrix rather than copying it, so the exact input the
/// model saw for any sequence can be rebuilt on demand.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    data: ArrayView2<'a, f64>,
    seq_length: usize,
}

impl<'a> Windows<'a> {
    pub fn new(data: ArrayView2<'a, f64>, seq_length: usize) -> Result<Self, PipelineError> {
        if seq_length == 0 {
            return Err(PipelineError::InvalidConfig("seq_length must be at least 1".into()));
        }
        let rows = data.nrows();
        if rows < seq_length {
            return Err(PipelineError::InsufficientData { rows, seq_length });
        }
        Ok(Self { data, seq_length })
    }

    /// Number of windows: `rows - seq_length + 1`.
    pub fn len(&self) -> usize {
        self.data.nrows() - self.seq_length + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    pub fn features(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, index: usize) -> Option<Sequence<'a>> {
        if index >= self.len() {
            return None;
        }
        let data = self.data;
        Some(Sequence {
            index,
            rows: data.slice_move(s![index..index + self.seq_length, ..]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Sequence<'a>> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Copy a contiguous range of windows into a `[batch, seq_length, F]`
    /// tensor for the model.
    ///
    /// Fails if `range` reaches past the last window.
    pub fn batch(&self, range: Range<usize>) -> Result<Array3<f64>, ModelError> {
        if range.start > range.end || range.end > self.len() {
            return Err(ModelError::Inference(format!(
                "batch {}..{} is outside the {} available sequences",
                range.start,
                range.end,
                self.len()
            )));
        }
        if range.is_empty() {
            return Ok(Array3::zeros((0, self.seq_length, self.features())));
        }
        let views: Vec<ArrayView2<'_, f64>> = range
            .filter_map(|i| self.get(i))
            .map(|seq| seq.rows)
            .collect();
        stack(Axis(0), &views)
            .map_err(|e| ModelError::Inference(format!("failed to assemble batch: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix(rows: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, 2), |(r, c)| (r * 10 + c) as f64)
    }

    #[test]
    fn test_window_count_law() {
        for (rows, len) in [(10, 10), (15, 10), (20, 10), (7, 1), (100, 25)] {
            let m = matrix(rows);
            let w = Windows::new(m.view(), len).unwrap();
            assert_eq!(w.len(), rows - len + 1);
            assert_eq!(w.iter().count(), rows - len + 1);
        }
    }

    #[test]
    fn test_too_few_rows() {
        let m = matrix(5);
        match Windows::new(m.view(), 10) {
            Err(PipelineError::InsufficientData { rows, seq_length }) => {
                assert_eq!(rows, 5);
                assert_eq!(seq_length, 10);
            }
            other => panic!("expected insufficient data, got {:?}", other),
        }
    }

    #[test]
    fn test_windows_preserve_row_order() {
        let m = matrix(6);
        let w = Windows::new(m.view(), 3).unwrap();
        let seq = w.get(2).unwrap();
        assert_eq!(seq.index, 2);
        assert_eq!(seq.rows.column(0).to_vec(), vec![20.0, 30.0, 40.0]);
        assert!(w.get(4).is_none());
    }

    #[test]
    fn test_batch_matches_individual_windows() {
        let m = matrix(12);
        let w = Windows::new(m.view(), 4).unwrap();
        let batch = w.batch(3..7).unwrap();
        assert_eq!(batch.dim(), (4, 4, 2));
        for (offset, i) in (3..7).enumerate() {
            assert_eq!(batch.index_axis(Axis(0), offset), w.get(i).unwrap().rows);
        }
        assert_eq!(w.batch(8..9).unwrap().dim().0, 1);
        assert_eq!(w.batch(9..9).unwrap().dim(), (0, 4, 2));
    }

    #[test]
    fn test_batch_past_last_window_is_an_error() {
        let m = matrix(12);
        let w = Windows::new(m.view(), 4).unwrap();
        assert_eq!(w.len(), 9);
        assert!(matches!(w.batch(8..20), Err(ModelError::Inference(_))));
        assert!(matches!(w.batch(20..30), Err(ModelError::Inference(_))));
    }
}
