use nanonet::{Dataset, FitConfig, Loss, Metric, NetworkBuilder, Shuffle, XorShift128};

fn xor() -> Dataset {
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    Dataset::from_rows(&xs, &ys).unwrap()
}

fn train_xor(seed: u32) {
    let train = xor();
    let mut rng = XorShift128::new(seed);
    let mut net = NetworkBuilder::from_sizes(&[2, 3, 1], 1)
        .unwrap()
        .build_with_rng(&mut rng)
        .unwrap();

    let cfg = FitConfig {
        epochs: 8_000,
        lr: 0.1,
        loss: Loss::Mse,
        shuffle: Shuffle::Pairwise,
        metrics: vec![Metric::Accuracy],
    };
    let report = net.fit(&train, &cfg, &mut rng).unwrap();

    // After a short warm-up the full-dataset loss never goes up.
    for pair in report.epochs[10..].windows(2) {
        assert!(
            pair[1].loss <= pair[0].loss + 1e-6,
            "loss rose from {} to {} at epoch {}",
            pair[0].loss,
            pair[1].loss,
            pair[1].epoch
        );
    }
    assert!(report.final_loss < report.epochs[0].loss);

    let last = report.epochs.last().unwrap();
    assert_eq!(last.metrics, vec![(Metric::Accuracy, 1.0)]);

    let preds = net.predict(&train).unwrap();
    for (i, &y) in preds.iter().enumerate() {
        let t = train.target(i)[0];
        let err = (t - y) * (t - y);
        assert!(err < 0.1, "example {i}: y={y} t={t} squared error {err}");
    }
}

#[test]
fn xor_converges_from_seed_0() {
    train_xor(0);
}

#[test]
fn xor_converges_from_seed_7() {
    train_xor(7);
}
