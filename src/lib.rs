//! A small feed-forward neural network engine.
//!
//! `nanonet` builds networks from three layer kinds (fully connected, sigmoid,
//! softmax), runs them over fixed-size mini-batches, and trains them with
//! plain SGD. Matrix math goes through a handful of strided BLAS-style kernels
//! in [`blas`].
//!
//! # Design goals
//!
//! - Predictable performance: every layer owns its output and gradient
//!   buffers, and [`Trainer`] reuses its batch buffers, so training steps do
//!   not allocate.
//! - Reproducibility: randomness comes from an explicit [`XorShift128`] value
//!   threaded through initialization and shuffling. There is no global state.
//! - Clear contracts: shapes are validated when layers and networks are built,
//!   and again at every `forward`/`backward` boundary.
//!
//! # Panics vs `Result`
//!
//! - [`Layer`], [`Network`] and [`Trainer`] methods return [`Result`] and leave
//!   their buffers untouched when handed a slice of the wrong length.
//! - The [`blas`] kernels treat invalid arguments as a no-op.
//! - The loss and metric helpers in [`loss`] and [`metrics`] are hot-path
//!   functions and panic on mismatched lengths via `assert_eq!`.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f32`.
//! - Tensors have four NCHW axes; see [`Shape`].
//! - Fully connected weights are row-major with shape `(in, out)`, so
//!   `y = x . w + b` for a `(batch, in)` input.
//! - [`Dataset`] stores examples contiguously in row-major layout.
//!
//! # Quick start
//!
//! ```rust
//! use nanonet::{Dataset, FitConfig, Metric, NetworkBuilder, XorShift128};
//!
//! # fn main() -> nanonet::Result<()> {
//! let xs = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//! ];
//! let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
//! let train = Dataset::from_rows(&xs, &ys)?;
//!
//! let mut rng = XorShift128::new(0);
//! let mut net = NetworkBuilder::from_sizes(&[2, 3, 1], 1)?.build_with_rng(&mut rng)?;
//!
//! let report = net.fit(
//!     &train,
//!     &FitConfig {
//!         epochs: 100,
//!         lr: 0.1,
//!         metrics: vec![Metric::Accuracy],
//!         ..FitConfig::default()
//!     },
//!     &mut rng,
//! )?;
//! assert_eq!(report.epochs.len(), 100);
//! # Ok(())
//! # }
//! ```
//!
//! # Driving training by hand
//!
//! ```rust
//! use nanonet::{Loss, NetworkBuilder, Trainer};
//!
//! # fn main() -> nanonet::Result<()> {
//! let mut net = NetworkBuilder::new(3, 2)?
//!     .fully_connected(4)?
//!     .sigmoid()?
//!     .fully_connected(2)?
//!     .softmax()?
//!     .build_with_seed(0)?;
//!
//! let mut trainer = Trainer::new(&net, Loss::CrossEntropy, 0.1)?;
//! let x = [0.1_f32, -0.2, 0.3, 0.0, 0.5, 1.0];
//! let t = [0.0_f32, 1.0, 1.0, 0.0];
//! let _loss = trainer.step(&mut net, &x, &t)?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod blas;
pub mod builder;
pub mod data;
pub mod error;
pub mod idx;
pub mod layer;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optim;
pub mod rng;
pub mod tensor;
pub mod train;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use blas::Transpose;
pub use builder::NetworkBuilder;
pub use data::Dataset;
pub use error::{Error, Result};
pub use layer::{Init, Layer, LayerKind, LayerParams};
pub use loss::Loss;
pub use metrics::Metric;
pub use network::Network;
pub use optim::Sgd;
pub use rng::XorShift128;
pub use tensor::{Shape, Tensor};
pub use train::{EpochReport, EvalReport, FitConfig, FitReport, Shuffle, Trainer};
