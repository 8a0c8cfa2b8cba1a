//! Training loop: shuffle, mini-batch SGD steps, and a full evaluation pass per epoch.

use log::{info, warn};
use rand::Rng;

use crate::{Dataset, Error, Loss, Metric, Network, Result, Sgd, Shape};

/// How training examples are ordered each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shuffle {
    /// Keep dataset order.
    None,
    /// Start from the identity order and apply `n` random pairwise swaps.
    ///
    /// This is cheap and reproducible but not a uniform permutation.
    #[default]
    Pairwise,
}

#[derive(Debug, Clone)]
pub struct FitConfig {
    pub epochs: usize,
    pub lr: f32,
    pub loss: Loss,
    pub shuffle: Shuffle,
    pub metrics: Vec<Metric>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            lr: 1e-2,
            loss: Loss::Mse,
            shuffle: Shuffle::Pairwise,
            metrics: Vec::new(),
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::InvalidConfig("lr must be finite and > 0".to_owned()));
        }
        for metric in &self.metrics {
            metric.validate()?;
        }
        Ok(())
    }
}

/// Loss and metric values over a whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    /// Mean per-example loss.
    pub loss: f32,
    pub metrics: Vec<(Metric, f32)>,
}

impl EvalReport {
    /// Returns the value recorded for `metric`, if it was requested.
    pub fn metric(&self, metric: Metric) -> Option<f32> {
        self.metrics
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|&(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f32,
    pub metrics: Vec<(Metric, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
    pub final_loss: f32,
}

/// Reusable training buffers for one network.
///
/// After the first epoch over a dataset, [`Trainer::step`],
/// [`Trainer::train_epoch`] and [`Trainer::evaluate`] (without metrics) run
/// without heap allocation.
///
/// The buffers are sized for the network passed to [`Trainer::new`]; every
/// method rejects a network with a different input or output shape.
#[derive(Debug, Clone)]
pub struct Trainer {
    loss: Loss,
    sgd: Sgd,
    input_shape: Shape,
    output_shape: Shape,
    order: Vec<usize>,
    rows: Vec<usize>,
    hits: Vec<f32>,
    batch_x: Vec<f32>,
    batch_t: Vec<f32>,
    dy: Vec<f32>,
}

impl Trainer {
    /// Create buffers sized for `network`.
    ///
    /// A softmax-terminated network only trains correctly with
    /// [`Loss::CrossEntropy`]; any other pairing is rejected.
    pub fn new(network: &Network, loss: Loss, lr: f32) -> Result<Self> {
        check_loss_pairing(network, loss)?;
        let batch = network.batch_size();
        Ok(Self {
            loss,
            sgd: Sgd::new(lr)?,
            input_shape: network.input_shape(),
            output_shape: network.output_shape(),
            order: Vec::new(),
            rows: Vec::with_capacity(batch),
            hits: Vec::new(),
            batch_x: vec![0.0; batch * network.input_size()],
            batch_t: vec![0.0; batch * network.output_size()],
            dy: vec![0.0; batch * network.output_size()],
        })
    }

    #[inline]
    pub fn loss(&self) -> Loss {
        self.loss
    }

    #[inline]
    pub fn lr(&self) -> f32 {
        self.sgd.lr()
    }

    fn check_network(&self, network: &Network) -> Result<()> {
        if network.input_shape() != self.input_shape
            || network.output_shape() != self.output_shape
        {
            return Err(Error::InvalidShape(format!(
                "trainer was built for {} -> {}, got a network with {} -> {}",
                self.input_shape,
                self.output_shape,
                network.input_shape(),
                network.output_shape()
            )));
        }
        check_loss_pairing(network, self.loss)
    }

    /// One SGD step on a full batch: forward, `dy = y - t`, backward, update.
    ///
    /// `x` is `(batch_size, input_size)` and `t` is `(batch_size, output_size)`.
    /// Returns the loss summed over the batch rows.
    pub fn step(&mut self, network: &mut Network, x: &[f32], t: &[f32]) -> Result<f32> {
        self.check_network(network)?;
        if t.len() != self.dy.len() {
            return Err(Error::InvalidShape(format!(
                "target len {} does not match network output len {}",
                t.len(),
                self.dy.len()
            )));
        }
        let y = network.forward(x)?;
        let loss = self.loss.backward(y, t, &mut self.dy);
        network.backward(&self.dy)?;
        self.sgd.step(network);
        Ok(loss)
    }

    /// Run one epoch of training over `data`.
    ///
    /// Examples are visited in `shuffle` order, `batch_size` at a time; a
    /// trailing partial batch is skipped. Returns the mean per-example loss
    /// seen during the epoch (parameters change while it is accumulated).
    pub fn train_epoch<R: Rng + ?Sized>(
        &mut self,
        network: &mut Network,
        data: &Dataset,
        shuffle: Shuffle,
        rng: &mut R,
    ) -> Result<f32> {
        self.check_network(network)?;
        check_dataset(network, data)?;
        let batch = network.batch_size();
        if data.len() < batch {
            return Err(Error::InvalidData(format!(
                "dataset has {} examples, fewer than batch_size {batch}",
                data.len()
            )));
        }

        self.order.clear();
        self.order.extend(0..data.len());
        if shuffle == Shuffle::Pairwise {
            shuffle_pairwise(&mut self.order, rng);
        }

        let steps = data.len() / batch;
        let mut total = 0.0_f32;
        for s in 0..steps {
            let rows = &self.order[s * batch..(s + 1) * batch];
            gather(data, rows, batch, &mut self.batch_x, &mut self.batch_t);

            let y = network.forward(&self.batch_x)?;
            total += self.loss.backward(y, &self.batch_t, &mut self.dy);
            network.backward(&self.dy)?;
            self.sgd.step(network);
        }
        Ok(total / (steps * batch) as f32)
    }

    /// Evaluate `network` on `data` using this trainer's buffers.
    pub fn evaluate(
        &mut self,
        network: &mut Network,
        data: &Dataset,
        metrics: &[Metric],
    ) -> Result<EvalReport> {
        self.check_network(network)?;
        evaluate_with(
            network,
            data,
            self.loss,
            metrics,
            EvalBuffers {
                rows: &mut self.rows,
                hits: &mut self.hits,
                batch_x: &mut self.batch_x,
                batch_t: &mut self.batch_t,
            },
        )
    }
}

impl Network {
    /// Train with mini-batch SGD for `cfg.epochs` epochs.
    ///
    /// `rng` drives the per-epoch shuffle. After each epoch the whole dataset
    /// is re-evaluated and recorded in the report.
    pub fn fit<R: Rng + ?Sized>(
        &mut self,
        train: &Dataset,
        cfg: &FitConfig,
        rng: &mut R,
    ) -> Result<FitReport> {
        cfg.validate()?;
        check_dataset(self, train)?;
        for metric in &cfg.metrics {
            metric.validate_for(self.output_size())?;
        }

        let batch = self.batch_size();
        if train.len() < batch {
            return Err(Error::InvalidData(format!(
                "train dataset has {} examples, fewer than batch_size {batch}",
                train.len()
            )));
        }
        let skipped = train.len() % batch;
        if skipped != 0 {
            warn!(
                "fit: {skipped} of {} examples do not fill a batch of {batch} and are skipped each epoch",
                train.len()
            );
        }

        let mut trainer = Trainer::new(self, cfg.loss, cfg.lr)?;
        let mut epochs = Vec::with_capacity(cfg.epochs);
        for epoch in 1..=cfg.epochs {
            trainer.train_epoch(self, train, cfg.shuffle, rng)?;
            let eval = trainer.evaluate(self, train, &cfg.metrics)?;
            info!(
                "epoch {epoch}/{}: loss={:.6}{}",
                cfg.epochs,
                eval.loss,
                format_metrics(&eval.metrics)
            );
            epochs.push(EpochReport {
                epoch,
                loss: eval.loss,
                metrics: eval.metrics,
            });
        }

        let final_loss = epochs.last().map_or(0.0, |e| e.loss);
        Ok(FitReport { epochs, final_loss })
    }

    /// Mean per-example loss and metrics over `data`, forward only.
    pub fn evaluate(&mut self, data: &Dataset, loss: Loss, metrics: &[Metric]) -> Result<EvalReport> {
        for metric in metrics {
            metric.validate_for(self.output_size())?;
        }
        let mut rows = Vec::with_capacity(self.batch_size());
        let mut hits = Vec::with_capacity(metrics.len());
        let mut batch_x = vec![0.0; self.batch_size() * self.input_size()];
        let mut batch_t = vec![0.0; self.batch_size() * self.output_size()];
        let buffers = EvalBuffers {
            rows: &mut rows,
            hits: &mut hits,
            batch_x: &mut batch_x,
            batch_t: &mut batch_t,
        };
        evaluate_with(self, data, loss, metrics, buffers)
    }

    /// Predict outputs for every input in `data`.
    ///
    /// Returns a flat buffer with shape `(len, output_size)`.
    pub fn predict(&mut self, data: &Dataset) -> Result<Vec<f32>> {
        if data.is_empty() {
            return Err(Error::InvalidData("dataset must not be empty".to_owned()));
        }
        if data.input_dim() != self.input_size() {
            return Err(Error::InvalidData(format!(
                "dataset input_dim {} does not match network input_size {}",
                data.input_dim(),
                self.input_size()
            )));
        }

        let batch = self.batch_size();
        let out_dim = self.output_size();
        let mut batch_x = vec![0.0; batch * self.input_size()];
        let mut preds = Vec::with_capacity(data.len() * out_dim);
        let mut start = 0;
        while start < data.len() {
            let real = batch.min(data.len() - start);
            gather_inputs(data, start, real, batch, &mut batch_x);
            let y = self.forward(&batch_x)?;
            preds.extend_from_slice(&y[..real * out_dim]);
            start += real;
        }
        Ok(preds)
    }
}

/// Apply `order.len()` swaps of two randomly drawn positions.
pub fn shuffle_pairwise<R: Rng + ?Sized>(order: &mut [usize], rng: &mut R) {
    let n = order.len();
    if n < 2 {
        return;
    }
    for _ in 0..n {
        let i = rng.next_u32() as usize % n;
        let j = rng.next_u32() as usize % n;
        order.swap(i, j);
    }
}

fn check_loss_pairing(network: &Network, loss: Loss) -> Result<()> {
    if network.ends_with_softmax() && loss != Loss::CrossEntropy {
        return Err(Error::InvalidConfig(format!(
            "a softmax output layer must be trained with CrossEntropy, got {loss:?}"
        )));
    }
    Ok(())
}

fn check_dataset(network: &Network, data: &Dataset) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidData("dataset must not be empty".to_owned()));
    }
    if data.input_dim() != network.input_size() {
        return Err(Error::InvalidData(format!(
            "dataset input_dim {} does not match network input_size {}",
            data.input_dim(),
            network.input_size()
        )));
    }
    if data.target_dim() != network.output_size() {
        return Err(Error::InvalidData(format!(
            "dataset target_dim {} does not match network output_size {}",
            data.target_dim(),
            network.output_size()
        )));
    }
    Ok(())
}

/// Copy the rows named by `rows` into the batch buffers, padding with `rows[0]`.
fn gather(data: &Dataset, rows: &[usize], batch: usize, x: &mut [f32], t: &mut [f32]) {
    let in_dim = data.input_dim();
    let t_dim = data.target_dim();
    for slot in 0..batch {
        let idx = rows.get(slot).copied().unwrap_or(rows[0]);
        x[slot * in_dim..(slot + 1) * in_dim].copy_from_slice(data.input(idx));
        t[slot * t_dim..(slot + 1) * t_dim].copy_from_slice(data.target(idx));
    }
}

fn gather_inputs(data: &Dataset, start: usize, real: usize, batch: usize, x: &mut [f32]) {
    let in_dim = data.input_dim();
    for slot in 0..batch {
        let idx = if slot < real { start + slot } else { start };
        x[slot * in_dim..(slot + 1) * in_dim].copy_from_slice(data.input(idx));
    }
}

struct EvalBuffers<'a> {
    rows: &'a mut Vec<usize>,
    hits: &'a mut Vec<f32>,
    batch_x: &'a mut [f32],
    batch_t: &'a mut [f32],
}

fn evaluate_with(
    network: &mut Network,
    data: &Dataset,
    loss: Loss,
    metrics: &[Metric],
    buffers: EvalBuffers<'_>,
) -> Result<EvalReport> {
    check_dataset(network, data)?;
    let batch = network.batch_size();
    let out_dim = network.output_size();
    let EvalBuffers {
        rows,
        hits,
        batch_x,
        batch_t,
    } = buffers;

    let mut total = 0.0_f32;
    hits.clear();
    hits.resize(metrics.len(), 0.0);
    let mut start = 0;
    while start < data.len() {
        let real = batch.min(data.len() - start);
        rows.clear();
        rows.extend(start..start + real);
        gather(data, rows, batch, batch_x, batch_t);

        let y = network.forward(batch_x)?;
        for r in 0..real {
            let yr = &y[r * out_dim..(r + 1) * out_dim];
            let tr = &batch_t[r * out_dim..(r + 1) * out_dim];
            total += loss.forward(yr, tr);
            for (hit, metric) in hits.iter_mut().zip(metrics) {
                *hit += metric.score(yr, tr);
            }
        }
        start += real;
    }

    let n = data.len() as f32;
    Ok(EvalReport {
        loss: total / n,
        metrics: metrics
            .iter()
            .zip(hits.iter())
            .map(|(&m, &h)| (m, h / n))
            .collect(),
    })
}

fn format_metrics(metrics: &[(Metric, f32)]) -> String {
    metrics
        .iter()
        .map(|(m, v)| format!(" {}={v:.4}", m.name()))
        .collect()
}
