//! Loss functions.
//!
//! These are small, allocation-free helpers intended to be used like:
//!
//! - run `network.forward(...)`
//! - compute `dy` via [`Loss::backward`]
//! - run `network.backward(dy)`
//! - apply `network.update(lr)`
//!
//! Every loss hands back the same output gradient, `dy = y - t`. That is the
//! exact gradient of `0.5 * sum((y - t)^2)`, and of cross-entropy taken through
//! a softmax output layer, which is why [`crate::LayerKind::Softmax`] can pass
//! `dy` straight through.

/// Guard added to probabilities before taking a logarithm.
pub const LOG_EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Supported loss functions.
pub enum Loss {
    /// `0.5 * sum((t - y)^2)`.
    #[default]
    Mse,
    /// `-sum(t * ln(y + 1e-7))`; pair with a softmax output layer.
    CrossEntropy,
    /// `-mean(t * log2(y) + (1 - t) * log2(1 - y))`; pair with a sigmoid output.
    BinaryCrossEntropy,
}

impl Loss {
    /// Compute a loss value.
    ///
    /// Shape contract: `y.len() == t.len()`.
    #[inline]
    pub fn forward(self, y: &[f32], t: &[f32]) -> f32 {
        match self {
            Loss::Mse => mse(y, t),
            Loss::CrossEntropy => cross_entropy(y, t),
            Loss::BinaryCrossEntropy => binary_cross_entropy(y, t),
        }
    }

    /// Compute the loss and write `dy = y - t`.
    ///
    /// Shape contract:
    /// - `y.len() == t.len()`
    /// - `y.len() == dy.len()`
    #[inline]
    pub fn backward(self, y: &[f32], t: &[f32], dy: &mut [f32]) -> f32 {
        assert_eq!(
            y.len(),
            dy.len(),
            "y len {} does not match dy len {}",
            y.len(),
            dy.len()
        );
        let loss = self.forward(y, t);
        for ((d, &yv), &tv) in dy.iter_mut().zip(y).zip(t) {
            *d = yv - tv;
        }
        loss
    }
}

/// Sum-of-squares error: `0.5 * sum((t - y)^2)`.
#[inline]
pub fn mse(y: &[f32], t: &[f32]) -> f32 {
    check_lens(y, t);
    let mut sum_sq = 0.0_f32;
    for (&yv, &tv) in y.iter().zip(t) {
        let diff = tv - yv;
        sum_sq = diff.mul_add(diff, sum_sq);
    }
    0.5 * sum_sq
}

/// Cross-entropy against a target distribution: `-sum(t * ln(y + 1e-7))`.
#[inline]
pub fn cross_entropy(y: &[f32], t: &[f32]) -> f32 {
    check_lens(y, t);
    let mut sum = 0.0_f32;
    for (&yv, &tv) in y.iter().zip(t) {
        sum = tv.mul_add((yv + LOG_EPSILON).ln(), sum);
    }
    -sum
}

/// Binary cross-entropy in bits, averaged over elements.
///
/// `y` is clamped to `[1e-7, 1 - 1e-7]` so saturated outputs stay finite.
#[inline]
pub fn binary_cross_entropy(y: &[f32], t: &[f32]) -> f32 {
    check_lens(y, t);
    if y.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0_f32;
    for (&yv, &tv) in y.iter().zip(t) {
        let p = yv.clamp(LOG_EPSILON, 1.0 - LOG_EPSILON);
        sum += tv * p.log2() + (1.0 - tv) * (1.0 - p).log2();
    }
    -sum / y.len() as f32
}

#[inline]
fn check_lens(y: &[f32], t: &[f32]) {
    assert_eq!(
        y.len(),
        t.len(),
        "y len {} does not match target len {}",
        y.len(),
        t.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mse_is_zero_when_equal() {
        let y = [1.0_f32, -2.0, 0.5];
        assert_eq!(mse(&y, &y), 0.0);
    }

    #[test]
    fn mse_is_half_the_sum_of_squares() {
        let y = [1.0_f32, 3.0];
        let t = [2.0_f32, 1.0];
        // 0.5 * (1 + 4)
        assert_abs_diff_eq!(mse(&y, &t), 2.5);
    }

    #[test]
    fn cross_entropy_known_value() {
        let y = [0.0_f32, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let t = [0.1_f32, 0.05, 0.6, 0.0, 0.05, 0.1, 0.0, 0.1, 0.0, 0.0];
        assert_abs_diff_eq!(cross_entropy(&y, &t), 6.447_238, epsilon = 1e-4);
    }

    #[test]
    fn cross_entropy_prefers_correct_class() {
        let t = [1.0_f32, 0.0, 0.0];
        let good = cross_entropy(&[0.9, 0.05, 0.05], &t);
        let bad = cross_entropy(&[0.05, 0.05, 0.9], &t);
        assert!(good < bad);
        assert!(cross_entropy(&[0.0, 1.0, 0.0], &t).is_finite());
    }

    #[test]
    fn binary_cross_entropy_in_bits() {
        // log2(0.5) = -1 for either target.
        assert_abs_diff_eq!(binary_cross_entropy(&[0.5], &[1.0]), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(
            binary_cross_entropy(&[0.5, 0.5], &[0.0, 1.0]),
            1.0,
            epsilon = 1e-6
        );
        assert!(binary_cross_entropy(&[1.0, 0.0], &[0.0, 1.0]).is_finite());
        assert!(binary_cross_entropy(&[0.99], &[1.0]) < binary_cross_entropy(&[0.6], &[1.0]));
    }

    #[test]
    fn backward_writes_output_minus_target_for_every_loss() {
        let y = [0.2_f32, 0.7, 0.1];
        let t = [0.0_f32, 1.0, 0.0];
        for loss in [Loss::Mse, Loss::CrossEntropy, Loss::BinaryCrossEntropy] {
            let mut dy = [0.0_f32; 3];
            let value = loss.backward(&y, &t, &mut dy);
            assert_abs_diff_eq!(value, loss.forward(&y, &t));
            assert_abs_diff_eq!(dy[0], 0.2);
            assert_abs_diff_eq!(dy[1], -0.3, epsilon = 1e-6);
            assert_abs_diff_eq!(dy[2], 0.1);
        }
    }

    #[test]
    #[should_panic]
    fn mismatched_lengths_panic() {
        mse(&[1.0, 2.0], &[1.0]);
    }
}
