//! Contiguous dataset storage.
//!
//! The trainer gathers mini-batches by copying rows out of these buffers, so
//! examples are kept row-major in one allocation per side.

use crate::{Error, Result};

/// A supervised dataset: inputs (X) and targets (Y).
///
/// Stored as contiguous buffers with row-major layout:
/// - `inputs.len() == len * input_dim`
/// - `targets.len() == len * target_dim`
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Vec<f32>,
    targets: Vec<f32>,
    len: usize,
    input_dim: usize,
    target_dim: usize,
}

impl Dataset {
    /// Build a dataset from flat buffers.
    ///
    /// `inputs` is `(len, input_dim)` and `targets` is `(len, target_dim)`.
    pub fn from_flat(
        inputs: Vec<f32>,
        targets: Vec<f32>,
        input_dim: usize,
        target_dim: usize,
    ) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }
        if !inputs.len().is_multiple_of(input_dim) {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {}",
                inputs.len(),
                input_dim
            )));
        }

        let len = inputs.len() / input_dim;
        if targets.len() != len * target_dim {
            return Err(Error::InvalidData(format!(
                "targets length {} does not match len * target_dim ({} * {})",
                targets.len(),
                len,
                target_dim
            )));
        }

        Ok(Self {
            inputs,
            targets,
            len,
            input_dim,
            target_dim,
        })
    }

    /// Build a dataset from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }
        if inputs.is_empty() {
            return Err(Error::InvalidData("dataset must not be empty".to_owned()));
        }

        let input_dim = inputs[0].len();
        let target_dim = targets[0].len();
        let inputs = flatten("input", inputs, input_dim)?;
        let targets = flatten("target", targets, target_dim)?;
        Self::from_flat(inputs, targets, input_dim, target_dim)
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    /// Returns the per-sample target dimension.
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[f32] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    #[inline]
    /// Returns the `idx`-th target row (shape: `(target_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn target(&self, idx: usize) -> &[f32] {
        let start = idx * self.target_dim;
        &self.targets[start..start + self.target_dim]
    }

    /// Keep the first `len` examples (no-op if `len >= self.len()`).
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        self.len = len;
        self.inputs.truncate(len * self.input_dim);
        self.targets.truncate(len * self.target_dim);
    }
}

fn flatten(what: &str, rows: &[Vec<f32>], dim: usize) -> Result<Vec<f32>> {
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != dim {
            return Err(Error::InvalidData(format!(
                "{what} row {i} has len {}, expected {dim}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_from_flat_validates_shapes() {
        let ok = Dataset::from_flat(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0], 2, 1);
        assert!(ok.is_ok());

        let err = Dataset::from_flat(vec![0.0, 1.0, 2.0], vec![0.0], 2, 1);
        assert!(err.is_err());
        assert!(Dataset::from_flat(vec![0.0; 4], vec![0.0; 3], 2, 1).is_err());
        assert!(Dataset::from_flat(vec![0.0; 4], vec![0.0; 2], 0, 1).is_err());
    }

    #[test]
    fn from_rows_copies_and_indexes() {
        let xs = vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]];
        let ys = vec![vec![1.0], vec![0.0], vec![1.0]];
        let data = Dataset::from_rows(&xs, &ys).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.input_dim(), 2);
        assert_eq!(data.target_dim(), 1);
        assert_eq!(data.input(1), &[2.0, 3.0]);
        assert_eq!(data.target(2), &[1.0]);
    }

    #[test]
    fn from_rows_rejects_ragged_or_empty_input() {
        let xs = vec![vec![0.0, 1.0], vec![2.0]];
        let ys = vec![vec![1.0], vec![0.0]];
        assert!(Dataset::from_rows(&xs, &ys).is_err());
        assert!(Dataset::from_rows(&[], &[]).is_err());
        assert!(Dataset::from_rows(&xs[..1], &ys).is_err());
    }

    #[test]
    fn truncate_keeps_a_prefix() {
        let mut data = Dataset::from_flat((0..8).map(|v| v as f32).collect(), vec![0.0; 4], 2, 1)
            .unwrap();
        data.truncate(2);
        assert_eq!(data.len(), 2);
        assert_eq!(data.input(1), &[2.0, 3.0]);
        data.truncate(10);
        assert_eq!(data.len(), 2);
    }
}
