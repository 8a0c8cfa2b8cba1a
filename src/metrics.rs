//! Metrics.
//!
//! Metrics are evaluation helpers (they do not participate in backprop).
//!
//! They are scored one example at a time during evaluation, so computing them
//! needs no extra buffers.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Supported evaluation metrics.
pub enum Metric {
    /// Classification accuracy.
    ///
    /// - For `output_dim == 1`: binary accuracy (prediction and target compared at 0.5).
    /// - For `output_dim > 1`: multiclass accuracy (argmax).
    Accuracy,
    /// Top-k accuracy for multiclass classification.
    ///
    /// This metric requires `output_dim > 1` and `k <= output_dim`.
    TopKAccuracy { k: usize },
}

impl Metric {
    /// Validate metric parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Metric::TopKAccuracy { k } => {
                if k == 0 {
                    return Err(Error::InvalidConfig(
                        "TopKAccuracy requires k > 0".to_owned(),
                    ));
                }
            }
            Metric::Accuracy => {}
        }
        Ok(())
    }

    /// Validate parameters against a model's output dimension.
    pub fn validate_for(self, output_dim: usize) -> Result<()> {
        self.validate()?;
        if let Metric::TopKAccuracy { k } = self {
            if output_dim < 2 || k > output_dim {
                return Err(Error::InvalidConfig(format!(
                    "TopKAccuracy with k={k} needs 2 <= k <= output_dim, got output_dim={output_dim}"
                )));
            }
        }
        Ok(())
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::TopKAccuracy { .. } => "top_k_accuracy",
        }
    }

    /// Score one example: 1.0 if `y` counts as a hit for target `t`, else 0.0.
    pub fn score(self, y: &[f32], t: &[f32]) -> f32 {
        assert_eq!(
            y.len(),
            t.len(),
            "y len {} does not match target len {}",
            y.len(),
            t.len()
        );
        let hit = match self {
            Metric::Accuracy if y.len() == 1 => (y[0] >= 0.5) == (t[0] >= 0.5),
            Metric::Accuracy => argmax(y) == argmax(t),
            Metric::TopKAccuracy { k } => {
                let class = argmax(t);
                let above = y.iter().filter(|&&v| v > y[class]).count();
                above < k
            }
        };
        if hit { 1.0 } else { 0.0 }
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in xs.iter().enumerate().skip(1) {
        if v > xs[best] {
            best = i;
        }
    }
    best
}
