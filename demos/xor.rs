use nanonet::{Dataset, FitConfig, Loss, Metric, NetworkBuilder, Shuffle, XorShift128};

fn main() -> nanonet::Result<()> {
    // Classic XOR dataset.
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let train = Dataset::from_rows(&xs, &ys)?;

    // 2 -> 3 -> 1 with a sigmoid after each dense layer, one example per step.
    let mut rng = XorShift128::new(0);
    let mut net = NetworkBuilder::from_sizes(&[2, 3, 1], 1)?.build_with_rng(&mut rng)?;

    let report = net.fit(
        &train,
        &FitConfig {
            epochs: 8_000,
            lr: 0.1,
            loss: Loss::Mse,
            shuffle: Shuffle::Pairwise,
            metrics: vec![Metric::Accuracy],
        },
        &mut rng,
    )?;

    for e in report.epochs.iter().step_by(1_000) {
        println!("epoch={} loss={:.6}", e.epoch, e.loss);
    }
    println!("final_loss={:.6}", report.final_loss);

    let preds = net.predict(&train)?;
    for (x, y) in xs.iter().zip(&preds) {
        println!("x={x:?} y={y:.4}");
    }

    Ok(())
}
