//! Network builder.
//!
//! `NetworkBuilder` is the recommended way to define a network. It tracks the
//! running feature width, so each layer is sized from the one before it, and
//! initializes every fully connected layer from an explicit generator.

use rand::Rng;

use crate::{Error, Init, Layer, LayerKind, LayerParams, Network, Result, XorShift128};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    kind: LayerKind,
    input_size: usize,
    output_size: usize,
}

#[derive(Debug, Clone)]
/// Builder for a [`Network`].
///
/// Example:
///
/// ```rust
/// use nanonet::NetworkBuilder;
///
/// # fn main() -> nanonet::Result<()> {
/// let net = NetworkBuilder::new(2, 1)?
///     .fully_connected(3)?
///     .sigmoid()?
///     .fully_connected(1)?
///     .sigmoid()?
///     .build_with_seed(0)?;
/// assert_eq!(net.num_layers(), 4);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    input_size: usize,
    batch_size: usize,
    width: usize,
    init: Init,
    layers: Vec<LayerSpec>,
}

impl NetworkBuilder {
    /// Start a network that takes `batch_size` inputs of length `input_size` per pass.
    pub fn new(input_size: usize, batch_size: usize) -> Result<Self> {
        if input_size == 0 {
            return Err(Error::InvalidConfig("input_size must be > 0".to_owned()));
        }
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        Ok(Self {
            input_size,
            batch_size,
            width: input_size,
            init: Init::default(),
            layers: Vec::new(),
        })
    }

    /// Fully connected layers with a sigmoid after each one.
    ///
    /// `sizes` includes the input and output widths, so it needs at least two entries.
    pub fn from_sizes(sizes: &[usize], batch_size: usize) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output sizes".to_owned(),
            ));
        }
        let mut b = Self::new(sizes[0], batch_size)?;
        for &size in &sizes[1..] {
            b = b.fully_connected(size)?.sigmoid()?;
        }
        Ok(b)
    }

    /// Weight initializer for fully connected layers (default: [`Init::Xavier`]).
    pub fn init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn fully_connected(self, output_size: usize) -> Result<Self> {
        self.push(LayerKind::FullyConnected, output_size)
    }

    pub fn sigmoid(self) -> Result<Self> {
        let width = self.width;
        self.push(LayerKind::Sigmoid, width)
    }

    /// Softmax over the current width. Must be the final layer.
    pub fn softmax(self) -> Result<Self> {
        let width = self.width;
        self.push(LayerKind::Softmax, width)
    }

    fn push(mut self, kind: LayerKind, output_size: usize) -> Result<Self> {
        if output_size == 0 {
            return Err(Error::InvalidConfig(
                "layer output_size must be > 0".to_owned(),
            ));
        }
        if self
            .layers
            .last()
            .is_some_and(|l| l.kind == LayerKind::Softmax)
        {
            return Err(Error::InvalidConfig(
                "no layer may follow a softmax layer".to_owned(),
            ));
        }
        self.layers.push(LayerSpec {
            kind,
            input_size: self.width,
            output_size,
        });
        self.width = output_size;
        Ok(self)
    }

    /// Build and initialize from `XorShift128::new(seed)`.
    pub fn build_with_seed(self, seed: u32) -> Result<Network> {
        let mut rng = XorShift128::new(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build and initialize from the provided generator.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        }
        self.init.validate()?;

        let mut layers = Vec::with_capacity(self.layers.len());
        for spec in &self.layers {
            let params = LayerParams::new(spec.input_size, spec.output_size, self.batch_size);
            layers.push(Layer::new(spec.kind, params)?);
        }

        let mut network = Network::new(layers)?;
        network.init_params(self.init, rng)?;
        Ok(network)
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    #[inline]
    /// Width of the last layer added so far (the input size if none).
    pub fn output_size(&self) -> usize {
        self.width
    }
}
