use crate::config::TrainConfig;
use crate::error::{PipelineError, Result};
use crate::models::lstm::StackedLstm;
use crate::window::WindowedSet;
use candle_core::{Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

fn to_tensors(set: &WindowedSet, device: &Device) -> Result<(Tensor, Tensor)> {
    let n = set.len();
    let features = Tensor::from_vec(set.flat_features(), (n, set.length, 1), device)?;
    let labels: Vec<f32> = set.labels.iter().map(|&v| v as f32).collect();
    let labels = Tensor::from_vec(labels, (n, 1), device)?;
    Ok((features, labels))
}

/// Trains `model` on `set` with Adam and mean squared error.
///
/// Runs exactly `cfg.epochs` epochs; the sample order is reshuffled every
/// epoch and the last partial batch is kept. Returns the mean loss per epoch.
pub fn fit(
    model: &StackedLstm,
    varmap: &VarMap,
    set: &WindowedSet,
    cfg: TrainConfig,
    device: &Device,
) -> Result<Vec<f64>> {
    if set.is_empty() {
        return Err(PipelineError::InsufficientData("no training windows".into()));
    }
    let num_samples = set.len();
    let (features, labels) = to_tensors(set, device)?;

    let params = ParamsAdamW {
        lr: cfg.learning_rate,
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut opt = AdamW::new(varmap.all_vars(), params)?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut indices: Vec<u32> = (0..num_samples as u32).collect();
    let mut epoch_losses = Vec::with_capacity(cfg.epochs);

    info!(
        "Training on {} windows: {} epochs, batch size {}, lr {}",
        num_samples, cfg.epochs, cfg.batch_size, cfg.learning_rate
    );

    for epoch in 0..cfg.epochs {
        indices.shuffle(&mut rng);
        let mut total_loss = 0.0;

        for batch in indices.chunks(cfg.batch_size) {
            let batch_idx = Tensor::from_slice(batch, batch.len(), device)?;
            let x = features.index_select(&batch_idx, 0)?; // [Batch, Window, 1]
            let y = labels.index_select(&batch_idx, 0)?; // [Batch, 1]

            let pred = model.forward(&x)?;
            let loss = (pred - y)?.sqr()?.mean_all()?;
            opt.backward_step(&loss)?;

            let loss = loss.to_scalar::<f32>()? as f64;
            if !loss.is_finite() {
                return Err(PipelineError::FitFailure {
                    step: epoch,
                    reason: "LSTM loss diverged to a non-finite value".into(),
                });
            }
            total_loss += loss * batch.len() as f64;
        }

        let mean_loss = total_loss / num_samples as f64;
        epoch_losses.push(mean_loss);
        if (epoch + 1) % 10 == 0 || epoch + 1 == cfg.epochs {
            info!("Epoch {}/{}: loss = {:.6}", epoch + 1, cfg.epochs, mean_loss);
        } else {
            debug!("Epoch {}/{}: loss = {:.6}", epoch + 1, cfg.epochs, mean_loss);
        }
    }

    Ok(epoch_losses)
}

/// One scaled prediction per window, in window order.
pub fn predict(
    model: &StackedLstm,
    set: &WindowedSet,
    batch_size: usize,
    device: &Device,
) -> Result<Vec<f64>> {
    let (features, _) = to_tensors(set, device)?;
    let mut predictions = Vec::with_capacity(set.len());

    let mut start = 0;
    while start < set.len() {
        let len = batch_size.min(set.len() - start);
        let x = features.narrow(0, start, len)?;
        let pred = model.forward(&x)?.flatten_all()?.to_vec1::<f32>()?;
        predictions.extend(pred.into_iter().map(f64::from));
        start += len;
    }

    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(PipelineError::Prediction("LSTM produced a non-finite value".into()));
    }
    Ok(predictions)
}
