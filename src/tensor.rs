//! Shaped, owned `f32` buffers.
//!
//! Every tensor carries a four-axis shape, read as `(N, C, H, W)` when the
//! axes mean something and as plain logical axes otherwise. Storage is
//! row-major (last axis fastest).

use std::fmt;

use rand::Rng;

use crate::{Error, Result};

/// A four-axis shape.
///
/// Trailing axes given as 0 are collapsed to 1, so `[4, 3, 0, 0]` and
/// `[4, 3, 1, 1]` describe the same shape. A zero followed by a non-zero axis
/// is rejected, as is a zero leading axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape([usize; 4]);

impl Shape {
    pub fn new(dims: [usize; 4]) -> Result<Self> {
        if dims[0] == 0 {
            return Err(Error::InvalidShape(format!(
                "leading axis must be > 0, got {dims:?}"
            )));
        }
        let mut normalized = dims;
        let mut collapsed = false;
        for (axis, d) in normalized.iter_mut().enumerate() {
            if *d == 0 {
                collapsed = true;
                *d = 1;
            } else if collapsed {
                return Err(Error::InvalidShape(format!(
                    "axis {axis} is {} after a collapsed axis in {dims:?}",
                    dims[axis]
                )));
            }
        }

        let shape = Self(normalized);
        shape.checked_size().ok_or_else(|| {
            Error::InvalidShape(format!("element count of {dims:?} overflows usize"))
        })?;
        Ok(shape)
    }

    /// A `rows x cols` shape, i.e. `[rows, cols, 1, 1]`.
    pub fn matrix(rows: usize, cols: usize) -> Result<Self> {
        if cols == 0 {
            return Err(Error::InvalidShape(format!(
                "matrix columns must be > 0, got {rows}x{cols}"
            )));
        }
        Self::new([rows, cols, 1, 1])
    }

    #[inline]
    pub fn dims(&self) -> [usize; 4] {
        self.0
    }

    #[inline]
    pub fn batch(&self) -> usize {
        self.0[0]
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.0[1]
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.0[2]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.0[3]
    }

    /// Elements per batch item (`C * H * W`).
    #[inline]
    pub fn item_size(&self) -> usize {
        self.0[1] * self.0[2] * self.0[3]
    }

    /// Total element count.
    #[inline]
    pub fn size(&self) -> usize {
        self.0[0] * self.item_size()
    }

    fn checked_size(&self) -> Option<usize> {
        self.0.iter().try_fold(1_usize, |acc, &d| acc.checked_mul(d))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n, c, h, w] = self.0;
        write!(f, "[{n}, {c}, {h}, {w}]")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Zero-filled tensor.
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.size()],
        }
    }

    /// Wrap an existing buffer; its length must equal `shape.size()`.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.size() {
            return Err(Error::InvalidShape(format!(
                "buffer length {} does not match shape {shape} ({} elements)",
                data.len(),
                shape.size()
            )));
        }
        Ok(Self { shape, data })
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Overwrite the contents from `src`, which must have exactly `len()` elements.
    pub fn copy_from(&mut self, src: &[f32]) -> Result<()> {
        if src.len() != self.data.len() {
            return Err(Error::InvalidShape(format!(
                "source length {} does not match tensor shape {} ({} elements)",
                src.len(),
                self.shape,
                self.data.len()
            )));
        }
        self.data.copy_from_slice(src);
        Ok(())
    }

    /// Fill with `low + (high - low) * u`, `u` uniform in `(0, 1)`.
    pub fn fill_uniform<R: Rng + ?Sized>(&mut self, rng: &mut R, low: f32, high: f32) {
        let span = high - low;
        for v in &mut self.data {
            *v = span.mul_add(crate::rng::uniform(rng), low);
        }
    }

    /// Fill with normal samples; a negative `std` leaves the tensor unchanged.
    pub fn fill_normal<R: Rng + ?Sized>(&mut self, rng: &mut R, mean: f32, std: f32) {
        if std < 0.0 {
            return;
        }
        for v in &mut self.data {
            *v = crate::rng::normal(rng, mean, std);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XorShift128;

    #[test]
    fn trailing_zero_axes_collapse_to_one() {
        let a = Shape::new([4, 3, 0, 0]).unwrap();
        let b = Shape::new([4, 3, 1, 1]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.size(), 12);
        assert_eq!(a.item_size(), 3);
        assert_eq!(Shape::new([5, 0, 0, 0]).unwrap().size(), 5);
    }

    #[test]
    fn interior_or_leading_zero_is_rejected() {
        assert!(Shape::new([0, 3, 1, 1]).is_err());
        assert!(Shape::new([2, 0, 3, 1]).is_err());
        assert!(Shape::new([2, 3, 0, 4]).is_err());
        assert!(Shape::matrix(2, 0).is_err());
        assert!(Shape::new([usize::MAX, 2, 1, 1]).is_err());
    }

    #[test]
    fn from_vec_checks_length() {
        let shape = Shape::matrix(2, 3).unwrap();
        assert!(Tensor::from_vec(shape, vec![0.0; 6]).is_ok());
        let err = Tensor::from_vec(shape, vec![0.0; 5]).unwrap_err();
        assert!(format!("{err}").contains("[2, 3, 1, 1]"));
    }

    #[test]
    fn copy_from_rejects_wrong_length_without_writing() {
        let mut t = Tensor::zeros(Shape::matrix(1, 3).unwrap());
        t.fill(2.0);
        assert!(t.copy_from(&[1.0, 1.0]).is_err());
        assert_eq!(t.as_slice(), &[2.0, 2.0, 2.0]);
        t.copy_from(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn uniform_fill_respects_bounds() {
        let mut rng = XorShift128::new(1);
        let mut t = Tensor::zeros(Shape::matrix(50, 20).unwrap());
        t.fill_uniform(&mut rng, -0.5, 0.25);
        assert!(t.as_slice().iter().all(|&v| (-0.5..=0.25).contains(&v)));
        assert!(t.as_slice().iter().any(|&v| v != t.as_slice()[0]));
    }

    #[test]
    fn normal_fill_with_negative_std_is_noop() {
        let mut rng = XorShift128::new(1);
        let mut t = Tensor::zeros(Shape::matrix(2, 2).unwrap());
        t.fill(3.0);
        t.fill_normal(&mut rng, 0.0, -1.0);
        assert_eq!(t.as_slice(), &[3.0; 4]);
        assert_eq!(rng, XorShift128::new(1));

        t.fill_normal(&mut rng, 0.0, 1.0);
        assert!(t.as_slice().iter().all(|&v| v != 3.0));
    }
}
