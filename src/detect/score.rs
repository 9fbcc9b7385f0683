//! Reconstruction-error scoring.

use ndarray::Axis;
use tracing::debug;

use crate::detect::RowRange;
use crate::error::PipelineError;
use crate::features::window::Windows;
use crate::model::{ModelError, Reconstructor};

/// A sequence with its reconstruction error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredSequence {
    pub index: usize,
    pub error: f64,
    pub rows: RowRange,
}

/// Score every window with `model`, calling it once per chunk of at most
/// `batch_size` sequences.
///
/// `source_rows[i]` is the input row number of normalized row `i`; it is
/// used to report each window's row range. The error of a window is the
/// mean squared difference between input and reconstruction over all cells.
pub fn score_windows(
    windows: &Windows<'_>,
    source_rows: &[usize],
    model: &dyn Reconstructor,
    batch_size: usize,
) -> Result<Vec<ScoredSequence>, PipelineError> {
    let batch_size = batch_size.max(1);
    let total = windows.len();
    let seq_length = windows.seq_length();
    let mut scored = Vec::with_capacity(total);

    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);
        let input = windows.batch(start..end)?;
        if input.dim().0 != end - start {
            return Err(ModelError::ShapeMismatch {
                expected: vec![end - start, seq_length, windows.features()],
                actual: input.shape().to_vec(),
            }
            .into());
        }
        let output = model.reconstruct(input.view())?;
        if output.shape() != input.shape() {
            return Err(ModelError::ShapeMismatch {
                expected: input.shape().to_vec(),
                actual: output.shape().to_vec(),
            }
            .into());
        }
        debug!(model = model.name(), start, end, "Scored batch");

        let diff = &input - &output;
        for (offset, seq) in diff.axis_iter(Axis(0)).enumerate() {
            let index = start + offset;
            let error = seq.mapv(|d| d * d).mean().unwrap_or(0.0);
            if !error.is_finite() {
                return Err(ModelError::NonFinite { sequence: index }.into());
            }
            let rows = RowRange::new(
                source_rows.get(index).copied().unwrap_or(index),
                source_rows
                    .get(index + seq_length - 1)
                    .copied()
                    .unwrap_or(index + seq_length - 1),
            );
            scored.push(ScoredSequence { index, error, rows });
        }
        start = end;
    }

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3, ArrayView3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_mse_against_zero_model() {
        let m = Array2::from_shape_vec((3, 2), vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]).unwrap();
        let w = Windows::new(m.view(), 2).unwrap();
        let zeros = |b: ArrayView3<'_, f64>| Ok::<_, ModelError>(Array3::<f64>::zeros(b.raw_dim()));
        let scored = score_windows(&w, &[0, 1, 2], &zeros, 16).unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].error, 2.5); // (1 + 1 + 4 + 4) / 4
        assert_eq!(scored[1].error, 6.5); // (4 + 4 + 9 + 9) / 4
        assert_eq!(scored[1].rows, RowRange::new(1, 2));
    }

    #[test]
    fn test_chunks_respect_batch_size() {
        let m = Array2::<f64>::zeros((25, 3));
        let w = Windows::new(m.view(), 5).unwrap();
        let calls = AtomicUsize::new(0);
        let counting = |b: ArrayView3<'_, f64>| {
            assert!(b.dim().0 <= 8);
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ModelError>(b.to_owned())
        };
        let rows: Vec<usize> = (0..25).collect();
        let scored = score_windows(&w, &rows, &counting, 8).unwrap();
        assert_eq!(scored.len(), 21);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(scored.iter().enumerate().all(|(i, s)| s.index == i && s.error == 0.0));
    }

    #[test]
    fn test_row_ranges_follow_source_rows() {
        let m = Array2::<f64>::zeros((4, 1));
        let w = Windows::new(m.view(), 3).unwrap();
        let identity = |b: ArrayView3<'_, f64>| Ok::<_, ModelError>(b.to_owned());
        // Source row 2 was dropped by the loader.
        let scored = score_windows(&w, &[0, 1, 3, 4], &identity, 4).unwrap();
        assert_eq!(scored[0].rows, RowRange::new(0, 3));
        assert_eq!(scored[1].rows, RowRange::new(1, 4));
    }

    #[test]
    fn test_shape_mismatch_is_model_failure() {
        let m = Array2::<f64>::zeros((4, 2));
        let w = Windows::new(m.view(), 2).unwrap();
        let truncating = |b: ArrayView3<'_, f64>| {
            let (n, l, _) = b.dim();
            Ok::<_, ModelError>(Array3::<f64>::zeros((n, l, 1)))
        };
        let err = score_windows(&w, &[0, 1, 2, 3], &truncating, 4).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_model_error_aborts_run() {
        let m = Array2::<f64>::zeros((4, 2));
        let w = Windows::new(m.view(), 2).unwrap();
        let failing = |_: ArrayView3<'_, f64>| -> Result<Array3<f64>, ModelError> {
            Err(ModelError::Inference("session closed".into()))
        };
        let err = score_windows(&w, &[0, 1, 2, 3], &failing, 4).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
    }

    #[test]
    fn test_non_finite_output_is_rejected() {
        let m = Array2::<f64>::zeros((3, 1));
        let w = Windows::new(m.view(), 2).unwrap();
        let nan = |b: ArrayView3<'_, f64>| Ok::<_, ModelError>(Array3::from_elem(b.raw_dim(), f64::NAN));
        let err = score_windows(&w, &[0, 1, 2], &nan, 4).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ModelUnavailable(ModelError::NonFinite { sequence: 0 })
        ));
    }
}
