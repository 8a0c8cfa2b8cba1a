//! Strided BLAS-style kernels.
//!
//! Row-major throughout. Vector arguments are a slice plus an element stride
//! (`inc`); a negative stride walks the vector backwards, starting at index
//! `n * |inc| - 1`.
//!
//! The kernels never panic on bad arguments. A zero size, a zero stride, a
//! leading dimension shorter than the row, or a slice too short for the
//! requested extent turns the call into a no-op (reductions return 0).
//!
//! `gemm` has two backends:
//! - default: explicit loops, one per transpose combination
//! - optional: `matrixmultiply::sgemm` via the `matrixmultiply` feature

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Whether a matrix operand is used as stored or transposed.
pub enum Transpose {
    #[default]
    NoTrans,
    Trans,
}

/// Index generator for one strided vector operand.
#[derive(Debug, Clone, Copy)]
struct Walk {
    start: usize,
    step: isize,
}

impl Walk {
    /// Validate `n` elements at stride `inc` against a slice of length `len`.
    fn new(n: usize, inc: isize, len: usize) -> Option<Self> {
        if n == 0 || inc == 0 {
            return None;
        }
        let step = inc.unsigned_abs();
        let (start, needed) = if inc > 0 {
            (0, (n - 1).checked_mul(step)?.checked_add(1)?)
        } else {
            let needed = n.checked_mul(step)?;
            (needed - 1, needed)
        };
        if needed > len || needed > isize::MAX as usize {
            return None;
        }
        Some(Self { start, step: inc })
    }

    #[inline]
    fn at(self, i: usize) -> usize {
        (self.start as isize + i as isize * self.step) as usize
    }
}

/// Minimum slice length for a row-major `rows x cols` matrix with leading dimension `ld`.
fn matrix_extent(rows: usize, cols: usize, ld: usize) -> Option<usize> {
    if rows == 0 || cols == 0 || ld < cols {
        return None;
    }
    (rows - 1).checked_mul(ld)?.checked_add(cols)
}

/// `y := x`, element by element.
pub fn copy(n: usize, x: &[f32], incx: isize, y: &mut [f32], incy: isize) {
    let (Some(wx), Some(wy)) = (Walk::new(n, incx, x.len()), Walk::new(n, incy, y.len())) else {
        return;
    };
    for i in 0..n {
        y[wy.at(i)] = x[wx.at(i)];
    }
}

/// Sum of elementwise products.
pub fn dot(n: usize, x: &[f32], incx: isize, y: &[f32], incy: isize) -> f32 {
    let (Some(wx), Some(wy)) = (Walk::new(n, incx, x.len()), Walk::new(n, incy, y.len())) else {
        return 0.0;
    };
    let mut acc = 0.0_f32;
    for i in 0..n {
        acc = x[wx.at(i)].mul_add(y[wy.at(i)], acc);
    }
    acc
}

/// Euclidean norm.
pub fn norm2(n: usize, x: &[f32], incx: isize) -> f32 {
    let Some(wx) = Walk::new(n, incx, x.len()) else {
        return 0.0;
    };
    let mut acc = 0.0_f32;
    for i in 0..n {
        let v = x[wx.at(i)];
        acc = v.mul_add(v, acc);
    }
    acc.sqrt()
}

/// `y := alpha * x + y`.
pub fn axpy(n: usize, alpha: f32, x: &[f32], incx: isize, y: &mut [f32], incy: isize) {
    let (Some(wx), Some(wy)) = (Walk::new(n, incx, x.len()), Walk::new(n, incy, y.len())) else {
        return;
    };
    for i in 0..n {
        let iy = wy.at(i);
        y[iy] = alpha.mul_add(x[wx.at(i)], y[iy]);
    }
}

/// `y := alpha * op(A) * x + beta * y`.
///
/// `op(A)` is `m x n`. Untransposed, `A` is stored `m x n` with `lda >= n`;
/// transposed, it is stored `n x m` with `lda >= m`. `x` has `n` logical
/// elements and `y` has `m`.
#[allow(clippy::too_many_arguments)]
pub fn gemv(
    trans: Transpose,
    m: usize,
    n: usize,
    alpha: f32,
    a: &[f32],
    lda: usize,
    x: &[f32],
    incx: isize,
    beta: f32,
    y: &mut [f32],
    incy: isize,
) {
    let (rows, cols) = match trans {
        Transpose::NoTrans => (m, n),
        Transpose::Trans => (n, m),
    };
    let Some(a_len) = matrix_extent(rows, cols, lda) else {
        return;
    };
    if a.len() < a_len {
        return;
    }
    let (Some(wx), Some(wy)) = (Walk::new(n, incx, x.len()), Walk::new(m, incy, y.len())) else {
        return;
    };

    match trans {
        Transpose::NoTrans => {
            for i in 0..m {
                let row = &a[i * lda..i * lda + n];
                let mut acc = 0.0_f32;
                for (j, &av) in row.iter().enumerate() {
                    acc = av.mul_add(x[wx.at(j)], acc);
                }
                let iy = wy.at(i);
                y[iy] = alpha.mul_add(acc, scaled(beta, y[iy]));
            }
        }
        Transpose::Trans => {
            for i in 0..m {
                let iy = wy.at(i);
                y[iy] = scaled(beta, y[iy]);
            }
            for j in 0..n {
                let t = alpha * x[wx.at(j)];
                let row = &a[j * lda..j * lda + m];
                for (i, &av) in row.iter().enumerate() {
                    let iy = wy.at(i);
                    y[iy] = t.mul_add(av, y[iy]);
                }
            }
        }
    }
}

/// `C := alpha * op(A) * op(B) + beta * C`.
///
/// `op(A)` is `m x k`, `op(B)` is `k x n`, `C` is `m x n`. Leading dimensions
/// follow the stored layout: `lda >= k` (or `>= m` when `A` is transposed),
/// `ldb >= n` (or `>= k`), `ldc >= n`. Any violation leaves `C` untouched.
#[allow(clippy::too_many_arguments)]
pub fn gemm(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    lda: usize,
    b: &[f32],
    ldb: usize,
    beta: f32,
    c: &mut [f32],
    ldc: usize,
) {
    if m == 0 || n == 0 || k == 0 {
        return;
    }
    let a_extent = match trans_a {
        Transpose::NoTrans => matrix_extent(m, k, lda),
        Transpose::Trans => matrix_extent(k, m, lda),
    };
    let b_extent = match trans_b {
        Transpose::NoTrans => matrix_extent(k, n, ldb),
        Transpose::Trans => matrix_extent(n, k, ldb),
    };
    let c_extent = matrix_extent(m, n, ldc);
    let (Some(a_len), Some(b_len), Some(c_len)) = (a_extent, b_extent, c_extent) else {
        return;
    };
    if a.len() < a_len || b.len() < b_len || c.len() < c_len {
        return;
    }

    #[cfg(feature = "matrixmultiply")]
    {
        let (rsa, csa) = match trans_a {
            Transpose::NoTrans => (lda, 1),
            Transpose::Trans => (1, lda),
        };
        let (rsb, csb) = match trans_b {
            Transpose::NoTrans => (ldb, 1),
            Transpose::Trans => (1, ldb),
        };
        // SAFETY: every operand extent was checked against its slice length above.
        unsafe {
            matrixmultiply::sgemm(
                m,
                k,
                n,
                alpha,
                a.as_ptr(),
                rsa as isize,
                csa as isize,
                b.as_ptr(),
                rsb as isize,
                csb as isize,
                beta,
                c.as_mut_ptr(),
                ldc as isize,
                1,
            );
        }
    }

    #[cfg(not(feature = "matrixmultiply"))]
    gemm_loops(trans_a, trans_b, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc);
}

#[cfg(not(feature = "matrixmultiply"))]
#[allow(clippy::too_many_arguments)]
fn gemm_loops(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    lda: usize,
    b: &[f32],
    ldb: usize,
    beta: f32,
    c: &mut [f32],
    ldc: usize,
) {
    for i in 0..m {
        for v in &mut c[i * ldc..i * ldc + n] {
            *v = scaled(beta, *v);
        }
    }
    if alpha == 0.0 {
        return;
    }

    match (trans_a, trans_b) {
        (Transpose::NoTrans, Transpose::NoTrans) => {
            for i in 0..m {
                let c_row = &mut c[i * ldc..i * ldc + n];
                for p in 0..k {
                    let av = alpha * a[i * lda + p];
                    let b_row = &b[p * ldb..p * ldb + n];
                    for (cv, &bv) in c_row.iter_mut().zip(b_row) {
                        *cv = av.mul_add(bv, *cv);
                    }
                }
            }
        }
        (Transpose::Trans, Transpose::NoTrans) => {
            for p in 0..k {
                let a_row = &a[p * lda..p * lda + m];
                let b_row = &b[p * ldb..p * ldb + n];
                for (i, &a_ip) in a_row.iter().enumerate() {
                    let av = alpha * a_ip;
                    let c_row = &mut c[i * ldc..i * ldc + n];
                    for (cv, &bv) in c_row.iter_mut().zip(b_row) {
                        *cv = av.mul_add(bv, *cv);
                    }
                }
            }
        }
        (Transpose::NoTrans, Transpose::Trans) => {
            for i in 0..m {
                let a_row = &a[i * lda..i * lda + k];
                for j in 0..n {
                    let b_row = &b[j * ldb..j * ldb + k];
                    let mut acc = 0.0_f32;
                    for (&av, &bv) in a_row.iter().zip(b_row) {
                        acc = av.mul_add(bv, acc);
                    }
                    let idx = i * ldc + j;
                    c[idx] = alpha.mul_add(acc, c[idx]);
                }
            }
        }
        (Transpose::Trans, Transpose::Trans) => {
            for i in 0..m {
                for j in 0..n {
                    let b_row = &b[j * ldb..j * ldb + k];
                    let mut acc = 0.0_f32;
                    for (p, &bv) in b_row.iter().enumerate() {
                        acc = a[p * lda + i].mul_add(bv, acc);
                    }
                    let idx = i * ldc + j;
                    c[idx] = alpha.mul_add(acc, c[idx]);
                }
            }
        }
    }
}

/// `beta * v`, with `beta == 0` clearing the value even when it is not finite.
#[inline]
fn scaled(beta: f32, v: f32) -> f32 {
    if beta == 0.0 { 0.0 } else { beta * v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_all_close(actual: &[f32], expected: &[f32], eps: f32) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = eps);
        }
    }

    const A: [f32; 6] = [0.11, 0.12, 0.13, 0.21, 0.22, 0.23];
    const A_T: [f32; 6] = [0.11, 0.21, 0.12, 0.22, 0.13, 0.23];

    #[test]
    fn copy_handles_positive_and_negative_strides() {
        let x: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let answer = x.clone();

        let mut y = [0.0_f32; 10];
        copy(10, &x, 1, &mut y, 1);
        assert_eq!(y, answer.as_slice());

        let spaced = [0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0, 4.0, 0.0];
        let mut y = [0.0_f32; 5];
        copy(5, &spaced, 2, &mut y, 1);
        assert_eq!(y, [0.0, 1.0, 2.0, 3.0, 4.0]);

        let rev = [9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0];
        let mut y = [0.0_f32; 10];
        copy(10, &rev, -1, &mut y, 1);
        assert_eq!(y, answer.as_slice());

        let rev_spaced = [0.0, 2.0, 0.0, 1.0, 0.0, 0.0];
        let mut y = [0.0_f32; 3];
        copy(3, &rev_spaced, -2, &mut y, 1);
        assert_eq!(y, [0.0, 1.0, 2.0]);

        let mut y = [0.0_f32; 10];
        copy(10, &rev, 1, &mut y, -1);
        assert_eq!(y, answer.as_slice());
    }

    #[test]
    fn copy_is_noop_on_invalid_arguments() {
        let x = [1.0_f32; 4];
        let mut y = [7.0_f32; 4];
        copy(0, &x, 1, &mut y, 1);
        copy(4, &x, 0, &mut y, 1);
        copy(4, &x, 1, &mut y, 0);
        copy(4, &x, 2, &mut y, 1);
        copy(4, &x[..3], 1, &mut y, 1);
        assert_eq!(y, [7.0; 4]);
    }

    #[test]
    fn dot_and_norm2_reductions() {
        let x: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let y: Vec<f32> = (1..=10).map(|v| v as f32).collect();
        assert_abs_diff_eq!(dot(10, &x, 1, &y, 1), 330.0, epsilon = 1e-4);
        assert_abs_diff_eq!(norm2(10, &x, 1), 16.881_943, epsilon = 1e-4);

        // Reversing one operand pairs x[i] with y[n-1-i].
        assert_abs_diff_eq!(dot(10, &x, -1, &y, 1), 165.0, epsilon = 1e-4);

        assert_eq!(dot(0, &x, 1, &y, 1), 0.0);
        assert_eq!(dot(10, &x, 0, &y, 1), 0.0);
        assert_eq!(norm2(10, &x[..9], 1), 0.0);
    }

    #[test]
    fn axpy_accumulates_into_y() {
        let x = [1.0_f32, 2.0, 3.0];
        let mut y = [10.0_f32, 20.0, 30.0];
        axpy(3, 2.0, &x, 1, &mut y, 1);
        assert_eq!(y, [12.0, 24.0, 36.0]);

        let mut y = [10.0_f32, 20.0, 30.0];
        axpy(3, 1.0, &x, -1, &mut y, 1);
        assert_eq!(y, [13.0, 22.0, 31.0]);

        let mut y = [10.0_f32, 20.0];
        axpy(3, 1.0, &x, 1, &mut y, 1);
        assert_eq!(y, [10.0, 20.0]);
    }

    #[test]
    fn gemv_both_layouts_agree() {
        let x = [1.0_f32, 2.0, 3.0];

        let mut y = [-1.0_f32, 1.0];
        gemv(Transpose::NoTrans, 2, 3, 1.0, &A, 3, &x, 1, 1.0, &mut y, 1);
        assert_all_close(&y, &[-0.26, 2.34], 1e-5);

        let mut y = [-1.0_f32, 1.0];
        gemv(Transpose::Trans, 2, 3, 1.0, &A_T, 2, &x, 1, 1.0, &mut y, 1);
        assert_all_close(&y, &[-0.26, 2.34], 1e-5);
    }

    #[test]
    fn gemv_scalars_and_strides() {
        let x = [1.0_f32, 2.0, 3.0];

        let mut y = [-1.0_f32, 1.0];
        gemv(Transpose::NoTrans, 2, 3, 2.0, &A, 3, &x, 1, 1.0, &mut y, 1);
        assert_all_close(&y, &[0.48, 3.68], 1e-5);

        let mut y = [-1.0_f32, 1.0];
        gemv(Transpose::NoTrans, 2, 3, 1.0, &A, 3, &x, 1, 2.0, &mut y, 1);
        assert_all_close(&y, &[-1.26, 3.34], 1e-5);

        let x_rev = [0.0_f32, 3.0, 0.0, 2.0, 0.0, 1.0];
        let mut y = [-1.0_f32, 1.0];
        gemv(Transpose::NoTrans, 2, 3, 1.0, &A, 3, &x_rev, -2, 1.0, &mut y, 1);
        assert_all_close(&y, &[-0.26, 2.34], 1e-5);

        let mut y = [0.0_f32, 1.0, 0.0, -1.0];
        gemv(Transpose::NoTrans, 2, 3, 1.0, &A, 3, &x, 1, 1.0, &mut y, -2);
        assert_all_close(&y, &[0.0, 2.34, 0.0, -0.26], 1e-5);
    }

    #[test]
    fn gemv_rejects_short_leading_dimension() {
        let x = [1.0_f32, 2.0, 3.0];
        let mut y = [-1.0_f32, 1.0];
        gemv(Transpose::NoTrans, 2, 3, 1.0, &A, 2, &x, 1, 1.0, &mut y, 1);
        gemv(Transpose::Trans, 2, 3, 1.0, &A_T, 1, &x, 1, 1.0, &mut y, 1);
        assert_eq!(y, [-1.0, 1.0]);
    }

    const B: [f32; 6] = [1011.0, 1012.0, 1021.0, 1022.0, 1031.0, 1032.0];
    const B_T: [f32; 6] = [1011.0, 1021.0, 1031.0, 1012.0, 1022.0, 1032.0];
    const C_EXPECTED: [f32; 4] = [368.76, 370.12, 677.06, 678.72];

    #[test]
    fn gemm_all_transpose_combinations() {
        let cases = [
            (Transpose::NoTrans, Transpose::NoTrans, &A, 3, &B, 2),
            (Transpose::Trans, Transpose::NoTrans, &A_T, 2, &B, 2),
            (Transpose::NoTrans, Transpose::Trans, &A, 3, &B_T, 3),
            (Transpose::Trans, Transpose::Trans, &A_T, 2, &B_T, 3),
        ];
        for (ta, tb, a, lda, b, ldb) in cases {
            let mut c = [1.0_f32, 2.0, 3.0, 4.0];
            gemm(ta, tb, 2, 2, 3, 1.0, a, lda, b, ldb, 1.0, &mut c, 2);
            assert_all_close(&c, &C_EXPECTED, 1e-2);
        }
    }

    #[test]
    fn gemm_alpha_beta_and_padded_ldc() {
        let mut c = [1.0_f32, 2.0, -9.0, 3.0, 4.0, -9.0];
        gemm(
            Transpose::NoTrans,
            Transpose::NoTrans,
            2,
            2,
            3,
            2.0,
            &A,
            3,
            &B,
            2,
            0.0,
            &mut c,
            3,
        );
        assert_all_close(&c, &[735.52, 736.24, -9.0, 1348.12, 1349.44, -9.0], 2e-2);
    }

    #[test]
    fn gemm_leaves_c_untouched_on_invalid_arguments() {
        let original = [1.0_f32, 2.0, 3.0, 4.0];
        let nn = (Transpose::NoTrans, Transpose::NoTrans);

        let mut c = original;
        gemm(nn.0, nn.1, 0, 2, 3, 1.0, &A, 3, &B, 2, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 0, 3, 1.0, &A, 3, &B, 2, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 2, 0, 1.0, &A, 3, &B, 2, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 2, 3, 1.0, &A, 0, &B, 2, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 2, 3, 1.0, &A, 3, &B, 1, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 2, 3, 1.0, &A, 3, &B, 2, 1.0, &mut c, 1);
        gemm(nn.0, nn.1, 2, 2, 3, 1.0, &[], 3, &B, 2, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 2, 3, 1.0, &A, 3, &B[..5], 2, 1.0, &mut c, 2);
        gemm(nn.0, nn.1, 2, 2, 3, 1.0, &A, 3, &B, 2, 1.0, &mut c[..3], 2);
        assert_eq!(c, original);
    }

    #[test]
    fn beta_zero_clears_non_finite_c() {
        let mut c = [f32::NAN; 4];
        gemm(
            Transpose::NoTrans,
            Transpose::NoTrans,
            2,
            2,
            3,
            1.0,
            &A,
            3,
            &B,
            2,
            0.0,
            &mut c,
            2,
        );
        assert!(c.iter().all(|v| v.is_finite()));
    }
}
