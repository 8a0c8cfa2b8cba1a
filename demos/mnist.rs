//! Train FC/Sigmoid/FC/Sigmoid/Softmax on MNIST IDX files.
//!
//! cargo run --release --example mnist -- train-labels-idx1-ubyte train-images-idx3-ubyte

use std::path::PathBuf;

use clap::Parser;
use nanonet::{FitConfig, Loss, Metric, NetworkBuilder, Shuffle, XorShift128, idx};

const CLASSES: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "mnist", about = "Train a small classifier on MNIST IDX files")]
struct Args {
    /// Label file (e.g. train-labels-idx1-ubyte)
    labels: PathBuf,

    /// Image file (e.g. train-images-idx3-ubyte)
    images: PathBuf,

    /// Number of training epochs
    #[arg(long, default_value_t = 20)]
    epochs: usize,

    /// SGD learning rate
    #[arg(long, default_value_t = 0.01)]
    lr: f32,

    /// Examples per step
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Hidden layer size
    #[arg(long, default_value_t = 100)]
    hidden: usize,

    /// Use only the first N examples
    #[arg(long)]
    limit: Option<usize>,

    /// Seed for initialization and shuffling
    #[arg(long, default_value_t = 0)]
    seed: u32,
}

fn main() -> nanonet::Result<()> {
    let args = Args::parse();

    let mut train = idx::load_dataset(&args.labels, &args.images, CLASSES)?;
    if let Some(limit) = args.limit {
        train.truncate(limit);
    }
    println!(
        "loaded {} examples of {} pixels",
        train.len(),
        train.input_dim()
    );

    let mut rng = XorShift128::new(args.seed);
    let mut net = NetworkBuilder::new(train.input_dim(), args.batch_size)?
        .fully_connected(args.hidden)?
        .sigmoid()?
        .fully_connected(CLASSES)?
        .sigmoid()?
        .softmax()?
        .build_with_rng(&mut rng)?;

    println!("start training ...");
    let report = net.fit(
        &train,
        &FitConfig {
            epochs: args.epochs,
            lr: args.lr,
            loss: Loss::CrossEntropy,
            shuffle: Shuffle::Pairwise,
            metrics: vec![Metric::Accuracy],
        },
        &mut rng,
    )?;

    for e in &report.epochs {
        let acc = e.metrics.first().map_or(0.0, |&(_, v)| v);
        println!("epoch {:>3}: loss={:.6} accuracy={:.4}", e.epoch, e.loss, acc);
    }
    println!("finished");
    Ok(())
}
