//! Layer variants.
//!
//! A [`Layer`] owns its output `y`, its input gradient `dx`, and (for
//! fully-connected layers) the parameters `w`, `b` with their gradients
//! `dw`, `db`. It never stores its input: the caller passes the same `x` to
//! `forward` and `backward`, which is how [`crate::Network`] chains layer
//! `i - 1`'s output into layer `i` without aliasing buffers.
//!
//! Backward uses overwrite semantics: `dx`, `dw`, `db` hold the gradients of
//! the most recent call only.
//!
//! Shapes are four-axis NCHW. A fully-connected layer flattens `C * H * W`
//! into its input features; sigmoid keeps the input shape; softmax normalizes
//! over `C` for every `(n, h, w)` position.

use rand::Rng;

use crate::activation::{sigmoid, sigmoid_grad_from_output, softmax_strided};
use crate::blas::{self, Transpose};
use crate::{Error, Result, Shape, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Affine map `y = x . w + b` with `w` stored `(in, out)` row-major.
    FullyConnected,
    /// Element-wise logistic function.
    Sigmoid,
    /// Normalized exponential over the channel axis.
    ///
    /// Its backward pass forwards `dy` unchanged, which equals the true input
    /// gradient only when `dy = y - t` came from cross-entropy on this output.
    /// The network therefore accepts softmax only as its last layer.
    Softmax,
}

impl LayerKind {
    #[inline]
    pub fn is_parametric(self) -> bool {
        matches!(self, LayerKind::FullyConnected)
    }
}

/// Size configuration for a layer over flat `(batch, features)` buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerParams {
    pub input_size: usize,
    pub output_size: usize,
    pub batch_size: usize,
}

impl Default for LayerParams {
    fn default() -> Self {
        Self {
            input_size: 1,
            output_size: 1,
            batch_size: 1,
        }
    }
}

impl LayerParams {
    pub fn new(input_size: usize, output_size: usize, batch_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            batch_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.output_size == 0 || self.batch_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer sizes must be > 0, got input_size={} output_size={} batch_size={}",
                self.input_size, self.output_size, self.batch_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Weight initialization scheme for fully-connected layers. Biases always start at 0.
pub enum Init {
    /// Normal with mean 0 and std `1 / sqrt(fan_in)`.
    #[default]
    Xavier,
    /// Normal with mean 0 and std `sqrt(2 / fan_in)`.
    He,
    Normal { mean: f32, std: f32 },
    Uniform { low: f32, high: f32 },
}

impl Init {
    pub fn validate(self) -> Result<()> {
        match self {
            Init::Xavier | Init::He => Ok(()),
            Init::Normal { mean, std } => {
                if !(mean.is_finite() && std.is_finite() && std >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "normal init needs finite mean and std >= 0, got mean={mean} std={std}"
                    )));
                }
                Ok(())
            }
            Init::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite() && low <= high) {
                    return Err(Error::InvalidConfig(format!(
                        "uniform init needs finite low <= high, got low={low} high={high}"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Params {
    w: Tensor,
    b: Tensor,
    dw: Tensor,
    db: Tensor,
}

#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    x_shape: Shape,
    y: Tensor,
    dx: Tensor,
    params: Option<Params>,
}

impl Layer {
    /// Build a layer over `(batch_size, input_size)` inputs.
    ///
    /// Sigmoid and softmax require `input_size == output_size`.
    pub fn new(kind: LayerKind, params: LayerParams) -> Result<Self> {
        params.validate()?;
        let x_shape = Shape::matrix(params.batch_size, params.input_size)?;
        Self::with_input_shape(kind, x_shape, params.output_size)
    }

    pub fn fully_connected(params: LayerParams) -> Result<Self> {
        Self::new(LayerKind::FullyConnected, params)
    }

    /// Sigmoid over `(batch_size, size)` inputs.
    pub fn sigmoid(size: usize, batch_size: usize) -> Result<Self> {
        Self::new(LayerKind::Sigmoid, LayerParams::new(size, size, batch_size))
    }

    /// Softmax over `(batch_size, size)` inputs.
    pub fn softmax(size: usize, batch_size: usize) -> Result<Self> {
        Self::new(LayerKind::Softmax, LayerParams::new(size, size, batch_size))
    }

    /// Build a layer over an NCHW input shape.
    ///
    /// `output_size` is the number of output features per batch item. For the
    /// activation layers it must equal `C * H * W`.
    pub fn with_input_shape(kind: LayerKind, x_shape: Shape, output_size: usize) -> Result<Self> {
        if output_size == 0 {
            return Err(Error::InvalidConfig("layer output_size must be > 0".to_owned()));
        }

        let in_size = x_shape.item_size();
        let batch = x_shape.batch();

        let (y_shape, params) = match kind {
            LayerKind::FullyConnected => {
                let w_shape = Shape::matrix(in_size, output_size)?;
                let b_shape = Shape::matrix(1, output_size)?;
                let params = Params {
                    w: Tensor::zeros(w_shape),
                    b: Tensor::zeros(b_shape),
                    dw: Tensor::zeros(w_shape),
                    db: Tensor::zeros(b_shape),
                };
                (Shape::matrix(batch, output_size)?, Some(params))
            }
            LayerKind::Sigmoid | LayerKind::Softmax => {
                if output_size != in_size {
                    return Err(Error::InvalidConfig(format!(
                        "{kind:?} layer needs output_size == input size, got {output_size} vs {in_size}"
                    )));
                }
                (x_shape, None)
            }
        };

        Ok(Self {
            kind,
            x_shape,
            y: Tensor::zeros(y_shape),
            dx: Tensor::zeros(x_shape),
            params,
        })
    }

    /// Rebuild a layer from stored parameters.
    ///
    /// Fully-connected layers need `weights.len() == in * out` and
    /// `biases.len() == out`; activation layers need both empty. All values
    /// must be finite.
    pub fn from_parts(
        kind: LayerKind,
        x_shape: Shape,
        output_size: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        let mut layer = Self::with_input_shape(kind, x_shape, output_size)?;
        match layer.params.as_mut() {
            Some(p) => {
                if weights.iter().chain(&biases).any(|v| !v.is_finite()) {
                    return Err(Error::InvalidData(
                        "layer parameters must be finite".to_owned(),
                    ));
                }
                let w_shape = p.w.shape();
                let b_shape = p.b.shape();
                p.w = Tensor::from_vec(w_shape, weights)?;
                p.b = Tensor::from_vec(b_shape, biases)?;
            }
            None => {
                if !weights.is_empty() || !biases.is_empty() {
                    return Err(Error::InvalidData(format!(
                        "{kind:?} layer has no parameters, got {} weights and {} biases",
                        weights.len(),
                        biases.len()
                    )));
                }
            }
        }
        Ok(layer)
    }

    #[inline]
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    #[inline]
    pub fn input_shape(&self) -> Shape {
        self.x_shape
    }

    #[inline]
    pub fn output_shape(&self) -> Shape {
        self.y.shape()
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.x_shape.batch()
    }

    /// Input features per batch item.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.x_shape.item_size()
    }

    /// Output features per batch item.
    #[inline]
    pub fn output_size(&self) -> usize {
        self.y.shape().item_size()
    }

    /// Output of the most recent `forward`.
    #[inline]
    pub fn output(&self) -> &[f32] {
        self.y.as_slice()
    }

    /// Input gradient of the most recent `backward`.
    #[inline]
    pub fn input_grad(&self) -> &[f32] {
        self.dx.as_slice()
    }

    /// Row-major `(input_size, output_size)` weights; empty for activation layers.
    #[inline]
    pub fn weights(&self) -> &[f32] {
        match &self.params {
            Some(p) => p.w.as_slice(),
            None => &[],
        }
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f32] {
        match &mut self.params {
            Some(p) => p.w.as_mut_slice(),
            None => &mut [],
        }
    }

    #[inline]
    pub fn biases(&self) -> &[f32] {
        match &self.params {
            Some(p) => p.b.as_slice(),
            None => &[],
        }
    }

    #[inline]
    pub fn biases_mut(&mut self) -> &mut [f32] {
        match &mut self.params {
            Some(p) => p.b.as_mut_slice(),
            None => &mut [],
        }
    }

    #[inline]
    pub fn weight_grads(&self) -> &[f32] {
        match &self.params {
            Some(p) => p.dw.as_slice(),
            None => &[],
        }
    }

    #[inline]
    pub fn bias_grads(&self) -> &[f32] {
        match &self.params {
            Some(p) => p.db.as_slice(),
            None => &[],
        }
    }

    /// Number of trainable scalars.
    #[inline]
    pub fn num_params(&self) -> usize {
        self.params.as_ref().map_or(0, |p| p.w.len() + p.b.len())
    }

    /// Copy externally supplied parameters in.
    pub fn set_params(&mut self, weights: &[f32], biases: &[f32]) -> Result<()> {
        let kind = self.kind;
        let Some(p) = self.params.as_mut() else {
            if weights.is_empty() && biases.is_empty() {
                return Ok(());
            }
            return Err(Error::InvalidShape(format!(
                "{kind:?} layer has no parameters"
            )));
        };
        if weights.len() != p.w.len() || biases.len() != p.b.len() {
            return Err(Error::InvalidShape(format!(
                "expected {} weights and {} biases, got {} and {}",
                p.w.len(),
                p.b.len(),
                weights.len(),
                biases.len()
            )));
        }
        p.w.copy_from(weights)?;
        p.b.copy_from(biases)?;
        Ok(())
    }

    /// Draw weights with `init`, zero biases and gradients.
    ///
    /// Weights are drawn row-major; activation layers draw nothing.
    pub fn init_params<R: Rng + ?Sized>(&mut self, init: Init, rng: &mut R) {
        let fan_in = self.input_size() as f32;
        let Some(p) = self.params.as_mut() else {
            return;
        };
        match init {
            Init::Xavier => p.w.fill_normal(rng, 0.0, 1.0 / fan_in.sqrt()),
            Init::He => p.w.fill_normal(rng, 0.0, (2.0 / fan_in).sqrt()),
            Init::Normal { mean, std } => p.w.fill_normal(rng, mean, std),
            Init::Uniform { low, high } => p.w.fill_uniform(rng, low, high),
        }
        p.b.fill(0.0);
        p.dw.fill(0.0);
        p.db.fill(0.0);
    }

    /// Compute `y` from `x` and return it.
    ///
    /// `x.len()` must equal the input shape's element count; otherwise nothing
    /// is written and `Error::InvalidShape` is returned.
    pub fn forward(&mut self, x: &[f32]) -> Result<&[f32]> {
        self.check_len("input", x.len(), self.x_shape.size())?;

        let batch = self.x_shape.batch();
        match self.kind {
            LayerKind::FullyConnected => {
                let (in_size, out_size) = (self.input_size(), self.output_size());
                let Some(p) = self.params.as_ref() else {
                    return Err(missing_params());
                };
                let y = self.y.as_mut_slice();
                for row in y.chunks_exact_mut(out_size) {
                    blas::copy(out_size, p.b.as_slice(), 1, row, 1);
                }
                blas::gemm(
                    Transpose::NoTrans,
                    Transpose::NoTrans,
                    batch,
                    out_size,
                    in_size,
                    1.0,
                    x,
                    in_size,
                    p.w.as_slice(),
                    out_size,
                    1.0,
                    y,
                    out_size,
                );
            }
            LayerKind::Sigmoid => {
                for (yv, &xv) in self.y.as_mut_slice().iter_mut().zip(x) {
                    *yv = sigmoid(xv);
                }
            }
            LayerKind::Softmax => {
                let channels = self.x_shape.channels();
                let spatial = self.x_shape.height() * self.x_shape.width();
                let item = self.x_shape.item_size();
                let y = self.y.as_mut_slice();
                for n in 0..batch {
                    for s in 0..spatial {
                        let base = n * item + s;
                        softmax_strided(&x[base..], &mut y[base..], channels, spatial);
                    }
                }
            }
        }

        Ok(self.y.as_slice())
    }

    /// Compute `dx` (and `dw`, `db` for fully-connected layers) and return `dx`.
    ///
    /// `x` must be the input given to the preceding `forward`; `dy` is the
    /// gradient of the loss with respect to this layer's output.
    pub fn backward(&mut self, x: &[f32], dy: &[f32]) -> Result<&[f32]> {
        self.check_len("input", x.len(), self.x_shape.size())?;
        self.check_len("output gradient", dy.len(), self.y.len())?;

        let batch = self.x_shape.batch();
        match self.kind {
            LayerKind::FullyConnected => {
                let (in_size, out_size) = (self.input_size(), self.output_size());
                let Some(p) = self.params.as_mut() else {
                    return Err(missing_params());
                };

                // dx = dy . w^T
                blas::gemm(
                    Transpose::NoTrans,
                    Transpose::Trans,
                    batch,
                    in_size,
                    out_size,
                    1.0,
                    dy,
                    out_size,
                    p.w.as_slice(),
                    out_size,
                    0.0,
                    self.dx.as_mut_slice(),
                    in_size,
                );

                // dw = x^T . dy
                blas::gemm(
                    Transpose::Trans,
                    Transpose::NoTrans,
                    in_size,
                    out_size,
                    batch,
                    1.0,
                    x,
                    in_size,
                    dy,
                    out_size,
                    0.0,
                    p.dw.as_mut_slice(),
                    out_size,
                );

                let db = p.db.as_mut_slice();
                db.fill(0.0);
                for row in dy.chunks_exact(out_size) {
                    blas::axpy(out_size, 1.0, row, 1, db, 1);
                }
            }
            LayerKind::Sigmoid => {
                let y = self.y.as_slice();
                for ((dxv, &dyv), &yv) in self.dx.as_mut_slice().iter_mut().zip(dy).zip(y) {
                    *dxv = dyv * sigmoid_grad_from_output(yv);
                }
            }
            LayerKind::Softmax => {
                self.dx.as_mut_slice().copy_from_slice(dy);
            }
        }

        Ok(self.dx.as_slice())
    }

    /// `w -= lr * dw; b -= lr * db`. No-op for activation layers.
    pub fn update(&mut self, lr: f32) {
        let Some(p) = self.params.as_mut() else {
            return;
        };
        let n = p.w.len();
        blas::axpy(n, -lr, p.dw.as_slice(), 1, p.w.as_mut_slice(), 1);
        let n = p.b.len();
        blas::axpy(n, -lr, p.db.as_slice(), 1, p.b.as_mut_slice(), 1);
    }

    fn check_len(&self, what: &str, got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(Error::InvalidShape(format!(
                "{:?} layer {what} len {got} does not match expected {expected}",
                self.kind
            )));
        }
        Ok(())
    }
}

fn missing_params() -> Error {
    Error::InvalidConfig("fully-connected layer has no parameters".to_owned())
}
