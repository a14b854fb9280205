use crate::config::{LstmConfig, TrainConfig};
use crate::error::Result;
use crate::metrics::{evaluate, Evaluation};
use crate::models::lstm::StackedLstm;
use crate::series::{MinMaxScaler, Split};
use crate::train;
use crate::window::window;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use tracing::info;

/// LSTM predictions on both partitions, back on the price scale.
#[derive(Clone, Debug)]
pub struct SequenceForecast {
    pub train_predictions: Vec<f64>,
    pub test_predictions: Vec<f64>,
    pub test_actual: Vec<f64>,
    pub train_eval: Evaluation,
    pub test_eval: Evaluation,
    /// Full-length arrays for plotting; `None` where no prediction exists.
    pub train_overlay: Vec<Option<f64>>,
    pub test_overlay: Vec<Option<f64>>,
    pub epoch_losses: Vec<f64>,
}

/// Places `values` into a `total`-long array starting at `offset`.
pub fn overlay(total: usize, offset: usize, values: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; total];
    for (slot, &v) in out.iter_mut().skip(offset).zip(values) {
        *slot = Some(v);
    }
    out
}

/// Windows both partitions of the scaled series, trains a fresh stacked LSTM on
/// the train windows and scores it on both partitions.
///
/// The scaler must be the one `scaled` was produced with; it is used to bring
/// predictions and labels back to prices before scoring.
pub fn run_sequence_forecast(
    scaled: &[f64],
    scaler: &MinMaxScaler,
    split: Split,
    window_len: usize,
    lstm: LstmConfig,
    train_cfg: TrainConfig,
    device: &Device,
) -> Result<SequenceForecast> {
    let (train_part, test_part) = split.apply(scaled);

    // window both sides before training so an undersized test partition fails fast
    let train_set = window(train_part, window_len, "train")?;
    let test_set = window(test_part, window_len, "test")?;
    info!(
        "Windowed {} train and {} test examples (window {})",
        train_set.len(),
        test_set.len(),
        window_len
    );

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model = StackedLstm::new(lstm, vb)?;

    let epoch_losses = train::fit(&model, &varmap, &train_set, train_cfg, device)?;

    let batch_size = train_cfg.batch_size;
    let train_scaled = train::predict(&model, &train_set, batch_size, device)?;
    let test_scaled = train::predict(&model, &test_set, batch_size, device)?;
    let train_predictions = scaler.inverse_all(&train_scaled);
    let test_predictions = scaler.inverse_all(&test_scaled);
    let train_actual = scaler.inverse_all(&train_set.labels);
    let test_actual = scaler.inverse_all(&test_set.labels);

    let train_eval = evaluate(&train_actual, &train_predictions)?;
    let test_eval = evaluate(&test_actual, &test_predictions)?;

    // prediction i of a partition targets partition[i + window_len]
    let total = scaled.len();
    let train_overlay = overlay(total, window_len, &train_predictions);
    let test_overlay = overlay(total, split.train_len + window_len, &test_predictions);

    Ok(SequenceForecast {
        train_predictions,
        test_predictions,
        test_actual,
        train_eval,
        test_eval,
        train_overlay,
        test_overlay,
        epoch_losses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_overlay_leaves_gaps() {
        let out = overlay(6, 2, &[1.0, 2.0]);
        assert_eq!(out, vec![None, None, Some(1.0), Some(2.0), None, None]);
    }

    #[test]
    fn test_undersized_test_partition_fails_before_training() {
        let scaled: Vec<f64> = (0..150).map(|i| i as f64 / 149.0).collect();
        let split = Split {
            train_len: 120,
            total: 150,
        };
        let cfg = TrainConfig {
            epochs: 1,
            ..TrainConfig::default()
        };
        let scaler = MinMaxScaler::fit(&scaled).unwrap();
        let lstm = LstmConfig::default();
        let res = run_sequence_forecast(&scaled, &scaler, split, 40, lstm, cfg, &Device::Cpu);
        match res {
            Err(PipelineError::InsufficientData(msg)) => {
                assert!(msg.contains("test partition"), "{}", msg);
                assert!(msg.contains("30 observations"), "{}", msg);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|f| f.epoch_losses)),
        }
    }

    #[test]
    fn test_linear_series_end_to_end() -> Result<()> {
        let prices: Vec<f64> = (0..1000).map(|i| 100.0 + i as f64).collect();
        let scaler = MinMaxScaler::fit(&prices)?;
        let scaled = scaler.transform_all(&prices);
        let split = Split {
            train_len: 800,
            total: 1000,
        };
        let lstm = LstmConfig {
            hidden_dim: 16,
            dense_dim: 8,
        };
        let cfg = TrainConfig {
            epochs: 40,
            batch_size: 64,
            learning_rate: 1e-2,
            seed: 42,
        };

        let device = Device::Cpu;
        let forecast = run_sequence_forecast(&scaled, &scaler, split, 100, lstm, cfg, &device)?;
        assert_eq!(forecast.test_predictions.len(), 99);
        assert_eq!(forecast.train_predictions.len(), 699);
        assert!((forecast.test_actual[0] - prices[900]).abs() < 1e-6);

        // overlays line up with the prices they predict
        assert_eq!(forecast.train_overlay.len(), 1000);
        assert!(forecast.train_overlay[99].is_none());
        assert!(forecast.train_overlay[100].is_some());
        assert!(forecast.test_overlay[899].is_none());
        assert!(forecast.test_overlay[900].is_some());
        assert!(forecast.test_overlay[999].is_none());

        // a mean predictor scores about 200 on the train range; a fitted model lands near 1
        assert!(forecast.train_eval.rmse < 5.0, "train RMSE {}", forecast.train_eval.rmse);
        Ok(())
    }
}
