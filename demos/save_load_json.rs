#[cfg(not(feature = "serde"))]
fn main() {
    println!("enable the `serde` feature: cargo run --example save_load_json --features serde");
}

#[cfg(feature = "serde")]
fn main() -> nanonet::Result<()> {
    use nanonet::{Dataset, FitConfig, Network, NetworkBuilder, XorShift128};

    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let train = Dataset::from_rows(&xs, &ys)?;

    let mut rng = XorShift128::new(0);
    let mut net = NetworkBuilder::from_sizes(&[2, 3, 1], 1)?.build_with_rng(&mut rng)?;
    net.fit(
        &train,
        &FitConfig {
            epochs: 2_000,
            lr: 0.1,
            ..FitConfig::default()
        },
        &mut rng,
    )?;

    let path = "target/tmp_network.json";
    net.save_json(path)?;

    let mut loaded = Network::load_json(path)?;
    println!("saved and loaded network: {path}");
    println!("original: {:?}", net.predict(&train)?);
    println!("loaded:   {:?}", loaded.predict(&train)?);
    Ok(())
}
