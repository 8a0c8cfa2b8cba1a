use log::debug;
use rand::Rng;

use crate::{Error, Init, Layer, LayerKind, Result, Shape, Tensor};

/// An ordered chain of layers.
///
/// Layer `i + 1` consumes layer `i`'s output; the first layer consumes the
/// network's own copy of the external input. Every layer owns its buffers and
/// the network owns every layer, so dropping the network releases everything.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    input: Tensor,
}

impl Network {
    /// Chain `layers` in order.
    ///
    /// Fails if the list is empty, if a layer's input shape differs from the
    /// previous layer's output shape, or if a softmax layer is not last.
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        let Some(first) = layers.first() else {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        };
        let input = Tensor::zeros(first.input_shape());

        for (idx, pair) in layers.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.output_shape() != next.input_shape() {
                return Err(Error::InvalidShape(format!(
                    "layer {} input shape {} does not match layer {idx} output shape {}",
                    idx + 1,
                    next.input_shape(),
                    prev.output_shape()
                )));
            }
        }

        let last = layers.len() - 1;
        if let Some(idx) = layers[..last]
            .iter()
            .position(|l| l.kind() == LayerKind::Softmax)
        {
            return Err(Error::InvalidConfig(format!(
                "softmax layer {idx} must be the last layer (network has {} layers)",
                layers.len()
            )));
        }

        debug!(
            "network: {} layers, input {}, output {}, {} params",
            layers.len(),
            input.shape(),
            layers[last].output_shape(),
            layers.iter().map(Layer::num_params).sum::<usize>()
        );

        Ok(Self { layers, input })
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(idx)
    }

    /// Release the layers, consuming the network.
    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    #[inline]
    pub fn input_shape(&self) -> Shape {
        self.input.shape()
    }

    #[inline]
    pub fn output_shape(&self) -> Shape {
        self.last().output_shape()
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.input.shape().batch()
    }

    /// Input features per example.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.input.shape().item_size()
    }

    /// Output features per example.
    #[inline]
    pub fn output_size(&self) -> usize {
        self.last().output_size()
    }

    /// Output of the most recent `forward`.
    #[inline]
    pub fn output(&self) -> &[f32] {
        self.last().output()
    }

    /// Input gradient of the most recent `backward`.
    #[inline]
    pub fn input_grad(&self) -> &[f32] {
        self.layers[0].input_grad()
    }

    /// Whether the output layer is softmax.
    #[inline]
    pub fn ends_with_softmax(&self) -> bool {
        self.last().kind() == LayerKind::Softmax
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(Layer::num_params).sum()
    }

    /// Initialize every fully-connected layer in order from `rng`.
    pub fn init_params<R: Rng + ?Sized>(&mut self, init: Init, rng: &mut R) -> Result<()> {
        init.validate()?;
        for layer in &mut self.layers {
            layer.init_params(init, rng);
        }
        debug!("network: initialized {} params with {init:?}", self.num_params());
        Ok(())
    }

    /// Run every layer in order and return the final output.
    ///
    /// `x` is copied into the network, so it need not outlive the call. A
    /// length mismatch returns `Error::InvalidShape` without touching any buffer.
    pub fn forward(&mut self, x: &[f32]) -> Result<&[f32]> {
        self.input.copy_from(x)?;

        for idx in 0..self.layers.len() {
            if idx == 0 {
                self.layers[0].forward(self.input.as_slice())?;
            } else {
                // Borrow the previous output immutably and the current layer mutably.
                let (left, right) = self.layers.split_at_mut(idx);
                right[0].forward(left[idx - 1].output())?;
            }
        }

        Ok(self.output())
    }

    /// Run every layer's backward pass in reverse and return the input gradient.
    ///
    /// Call after `forward`. `dy` is the loss gradient with respect to the
    /// network output; each layer's `dx` becomes the previous layer's `dy`.
    pub fn backward(&mut self, dy: &[f32]) -> Result<&[f32]> {
        let expected = self.last().output().len();
        if dy.len() != expected {
            return Err(Error::InvalidShape(format!(
                "output gradient len {} does not match network output len {expected}",
                dy.len()
            )));
        }

        let last = self.layers.len() - 1;
        for idx in (0..self.layers.len()).rev() {
            let (left, right) = self.layers.split_at_mut(idx);
            let Some((layer, after)) = right.split_first_mut() else {
                continue;
            };
            let x = match left.last() {
                Some(prev) => prev.output(),
                None => self.input.as_slice(),
            };
            let d_out = if idx == last {
                dy
            } else {
                after[0].input_grad()
            };
            layer.backward(x, d_out)?;
        }

        Ok(self.input_grad())
    }

    /// Apply `w -= lr * dw; b -= lr * db` to every parametric layer.
    pub fn update(&mut self, lr: f32) {
        for layer in &mut self.layers {
            layer.update(lr);
        }
    }

    #[inline]
    fn last(&self) -> &Layer {
        // `new` guarantees at least one layer.
        &self.layers[self.layers.len() - 1]
    }
}
