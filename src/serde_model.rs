//! Network serialization/deserialization (feature: `serde`).
//!
//! This module defines a versioned, stable on-disk format for [`Network`].
//!
//! Design notes:
//! - We do NOT directly serialize internal `Network`/`Layer` structs, to keep
//!   the file format stable even if the internal representation changes.
//! - Only parameters are stored. Activations and gradients start at zero
//!   after loading.
//! - All deserialization validates shapes, parameter lengths, that all
//!   parameters are finite, and that adjacent layers chain.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Layer, LayerKind, Network, Result, Shape};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNetwork {
    pub format_version: u32,
    pub layers: Vec<SerializedLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub kind: SerializedLayerKind,
    /// NCHW input shape, batch axis included.
    pub input_shape: [usize; 4],
    pub output_size: usize,
    /// Row-major (in, out). Empty for activation layers.
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedLayerKind {
    FullyConnected,
    Sigmoid,
    Softmax,
}

impl From<LayerKind> for SerializedLayerKind {
    fn from(value: LayerKind) -> Self {
        match value {
            LayerKind::FullyConnected => SerializedLayerKind::FullyConnected,
            LayerKind::Sigmoid => SerializedLayerKind::Sigmoid,
            LayerKind::Softmax => SerializedLayerKind::Softmax,
        }
    }
}

impl From<SerializedLayerKind> for LayerKind {
    fn from(value: SerializedLayerKind) -> Self {
        match value {
            SerializedLayerKind::FullyConnected => LayerKind::FullyConnected,
            SerializedLayerKind::Sigmoid => LayerKind::Sigmoid,
            SerializedLayerKind::Softmax => LayerKind::Softmax,
        }
    }
}

impl SerializedNetwork {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {}",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.layers.is_empty() {
            return Err(Error::InvalidData(
                "serialized network must have at least one layer".to_owned(),
            ));
        }

        for (i, layer) in self.layers.iter().enumerate() {
            layer
                .validate()
                .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))?;

            if i > 0 {
                let prev_out = self.layers[i - 1].output_shape()?;
                let input = Shape::new(layer.input_shape)?;
                if input != prev_out {
                    return Err(Error::InvalidData(format!(
                        "layer {i} input shape {input} does not match previous output shape {prev_out}"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl SerializedLayer {
    fn validate(&self) -> Result<()> {
        let shape = Shape::new(self.input_shape)?;
        if self.output_size == 0 {
            return Err(Error::InvalidData("output_size must be > 0".to_owned()));
        }

        match self.kind {
            SerializedLayerKind::FullyConnected => {
                let expected_w = shape
                    .item_size()
                    .checked_mul(self.output_size)
                    .ok_or_else(|| Error::InvalidData("layer weight shape overflow".to_owned()))?;
                if self.weights.len() != expected_w {
                    return Err(Error::InvalidData(format!(
                        "weights length {} does not match in * out ({} * {})",
                        self.weights.len(),
                        shape.item_size(),
                        self.output_size
                    )));
                }
                if self.biases.len() != self.output_size {
                    return Err(Error::InvalidData(format!(
                        "biases length {} does not match output_size {}",
                        self.biases.len(),
                        self.output_size
                    )));
                }
            }
            SerializedLayerKind::Sigmoid | SerializedLayerKind::Softmax => {
                if self.output_size != shape.item_size() {
                    return Err(Error::InvalidData(format!(
                        "{:?} output_size {} does not match input size {}",
                        self.kind,
                        self.output_size,
                        shape.item_size()
                    )));
                }
                if !self.weights.is_empty() || !self.biases.is_empty() {
                    return Err(Error::InvalidData(format!(
                        "{:?} layer must not carry parameters",
                        self.kind
                    )));
                }
            }
        }

        if self.weights.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "weights must contain only finite values".to_owned(),
            ));
        }
        if self.biases.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "biases must contain only finite values".to_owned(),
            ));
        }

        Ok(())
    }

    fn output_shape(&self) -> Result<Shape> {
        let input = Shape::new(self.input_shape)?;
        match self.kind {
            SerializedLayerKind::FullyConnected => Shape::matrix(input.batch(), self.output_size),
            SerializedLayerKind::Sigmoid | SerializedLayerKind::Softmax => Ok(input),
        }
    }
}

impl From<&Network> for SerializedNetwork {
    fn from(network: &Network) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            layers: network.layers().iter().map(SerializedLayer::from).collect(),
        }
    }
}

impl From<&Layer> for SerializedLayer {
    fn from(layer: &Layer) -> Self {
        Self {
            kind: layer.kind().into(),
            input_shape: layer.input_shape().dims(),
            output_size: layer.output_size(),
            weights: layer.weights().to_vec(),
            biases: layer.biases().to_vec(),
        }
    }
}

impl TryFrom<SerializedNetwork> for Network {
    type Error = Error;

    fn try_from(value: SerializedNetwork) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let mut layers = Vec::with_capacity(value.layers.len());
        for (i, layer) in value.layers.into_iter().enumerate() {
            let shape = Shape::new(layer.input_shape)?;
            let l = Layer::from_parts(
                layer.kind.into(),
                shape,
                layer.output_size,
                layer.weights,
                layer.biases,
            )
            .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))?;
            layers.push(l);
        }

        Network::new(layers).map_err(|e| Error::InvalidData(format!("invalid network: {e}")))
    }
}

impl Network {
    /// Serialize the network to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        let ser = SerializedNetwork::from(self);
        serde_json::to_string_pretty(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Serialize the network to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        let ser = SerializedNetwork::from(self);
        serde_json::to_string(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Parse a network from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse network json: {e}")))?;
        ser.try_into()
    }

    /// Save the network to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        std::fs::write(path, s)?;
        Ok(())
    }

    /// Load a network from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }
}
