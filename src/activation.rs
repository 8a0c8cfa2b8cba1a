//! Element math shared by the activation layers.
//!
//! Sigmoid is applied element-wise. Its derivative is expressed through the
//! cached output `y`, so backprop never needs the pre-activation input.
//!
//! Softmax normalizes a group of `n` values that may be spaced `stride`
//! elements apart, which lets one routine serve both flat `(batch, features)`
//! buffers (`stride == 1`) and NCHW buffers where the channel axis is strided
//! by `H * W`.

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// `d sigmoid / dx` in terms of the output `y = sigmoid(x)`.
#[inline]
pub fn sigmoid_grad_from_output(y: f32) -> f32 {
    y * (1.0 - y)
}

/// Softmax of a contiguous vector.
///
/// Panics if `x` and `y` differ in length.
pub fn softmax(x: &[f32], y: &mut [f32]) {
    assert_eq!(
        x.len(),
        y.len(),
        "softmax input len {} does not match output len {}",
        x.len(),
        y.len()
    );
    if x.is_empty() {
        return;
    }
    softmax_strided(x, y, x.len(), 1);
}

/// Softmax over `n` values at `x[i * stride]`, written to `y[i * stride]`.
///
/// The group maximum is subtracted before exponentiating.
pub(crate) fn softmax_strided(x: &[f32], y: &mut [f32], n: usize, stride: usize) {
    debug_assert!(n > 0 && stride > 0);
    debug_assert!((n - 1) * stride < x.len() && (n - 1) * stride < y.len());

    let mut max = f32::NEG_INFINITY;
    for i in 0..n {
        max = max.max(x[i * stride]);
    }

    let mut sum = 0.0_f32;
    for i in 0..n {
        let e = (x[i * stride] - max).exp();
        y[i * stride] = e;
        sum += e;
    }

    let inv = 1.0 / sum;
    for i in 0..n {
        y[i * stride] *= inv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sigmoid_basic_values() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
        assert!(sigmoid(-200.0).is_finite());
        assert!(sigmoid(200.0) <= 1.0);
    }

    #[test]
    fn sigmoid_is_monotonic() {
        let mut prev = sigmoid(-20.0);
        for i in -199..=200 {
            let y = sigmoid(i as f32 * 0.1);
            assert!(y >= prev, "sigmoid decreased at x={}", i as f32 * 0.1);
            prev = y;
        }
    }

    #[test]
    fn sigmoid_gradient_from_output() {
        assert_abs_diff_eq!(sigmoid_grad_from_output(sigmoid(0.0)), 0.25);
        let y = sigmoid(1.3);
        assert_abs_diff_eq!(sigmoid_grad_from_output(y), y * (1.0 - y));
    }

    #[test]
    fn softmax_known_values() {
        let x = [-1.0_f32, 0.0, 3.0, 5.0];
        let mut y = [0.0_f32; 4];
        softmax(&x, &mut y);
        let expected = [0.002_165_7, 0.005_886_97, 0.118_243_02, 0.873_704_3];
        for (a, e) in y.iter().zip(expected) {
            assert_abs_diff_eq!(*a, e, epsilon = 1e-5);
        }
    }

    #[test]
    fn softmax_sums_to_one_and_ignores_shift() {
        let x = [0.3_f32, -2.0, 7.5, 1.0, 1.0];
        let shifted: Vec<f32> = x.iter().map(|v| v + 100.0).collect();
        let mut y = [0.0_f32; 5];
        let mut y_shifted = [0.0_f32; 5];
        softmax(&x, &mut y);
        softmax(&shifted, &mut y_shifted);

        assert_abs_diff_eq!(y.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        for (a, b) in y.iter().zip(&y_shifted) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn softmax_survives_large_inputs() {
        let x = [1000.0_f32, 1001.0, 999.0];
        let mut y = [0.0_f32; 3];
        softmax(&x, &mut y);
        assert!(y.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(y.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn strided_softmax_touches_only_its_group() {
        // Two interleaved groups of three.
        let x = [1.0_f32, 10.0, 2.0, 20.0, 3.0, 30.0];
        let mut y = [-1.0_f32; 6];
        softmax_strided(&x, &mut y, 3, 2);
        assert_eq!(y[1], -1.0);
        assert_eq!(y[3], -1.0);
        assert_eq!(y[5], -1.0);

        let mut dense = [0.0_f32; 3];
        softmax(&[1.0, 2.0, 3.0], &mut dense);
        assert_abs_diff_eq!(y[0], dense[0], epsilon = 1e-7);
        assert_abs_diff_eq!(y[2], dense[1], epsilon = 1e-7);
        assert_abs_diff_eq!(y[4], dense[2], epsilon = 1e-7);
    }
}
