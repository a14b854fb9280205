use crate::error::{PipelineError, Result};
use crate::models::arima::ArimaOrder;
use candle_core::Device;
use chrono::NaiveDate;
use tracing::{info, warn};

pub fn get_device(use_cuda: bool) -> Device {
    if use_cuda {
        #[cfg(feature = "cuda")]
        {
            match Device::new_cuda(0) {
                Ok(device) => {
                    info!("Using CUDA device 0");
                    return device;
                }
                Err(e) => {
                    warn!("Failed to initialize CUDA: {}. Falling back to CPU.", e);
                }
            }
        }
        #[cfg(not(feature = "cuda"))]
        {
            warn!("--cuda set but the binary lacks the 'cuda' feature, falling back to CPU");
        }
    }
    info!("Using CPU device");
    Device::Cpu
}

pub const TICKER: &str = "GRASIM.NS";
pub const START_DATE: &str = "2010-01-01";
pub const END_DATE: &str = "2023-01-01";

pub const WINDOW: usize = 100;
pub const TRAIN_RATIO: f64 = 0.80;
pub const HIDDEN_DIM: usize = 50;
pub const DENSE_DIM: usize = 25;
pub const BATCH_SIZE: usize = 64;
pub const EPOCHS: usize = 100;
pub const LEARNING_RATE: f64 = 1e-3;
pub const SEED: u64 = 42;

pub const ARIMA_P: usize = 6;
pub const ARIMA_D: usize = 1;
pub const ARIMA_Q: usize = 0;

pub const FETCH_RETRIES: u32 = 3;
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Shape of the stacked LSTM.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LstmConfig {
    pub hidden_dim: usize,
    pub dense_dim: usize,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            hidden_dim: HIDDEN_DIM,
            dense_dim: DENSE_DIM,
        }
    }
}

/// Optimisation settings for the sequence forecaster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: EPOCHS,
            batch_size: BATCH_SIZE,
            learning_rate: LEARNING_RATE,
            seed: SEED,
        }
    }
}

/// Where the price series comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Yahoo,
    /// Seeded random walk of the given number of days, no network.
    Synthetic(usize),
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: Source,
    pub window: usize,
    pub train_ratio: f64,
    pub lstm: LstmConfig,
    pub train: TrainConfig,
    pub arima: ArimaOrder,
    pub use_cuda: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ticker: TICKER.to_string(),
            start: parse_date(START_DATE).unwrap_or_default(),
            end: parse_date(END_DATE).unwrap_or_default(),
            source: Source::Yahoo,
            window: WINDOW,
            train_ratio: TRAIN_RATIO,
            lstm: LstmConfig::default(),
            train: TrainConfig::default(),
            arima: ArimaOrder::new(ARIMA_P, ARIMA_D, ARIMA_Q),
            use_cuda: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ticker.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("ticker must not be empty".into()));
        }
        if self.start >= self.end {
            return Err(PipelineError::InvalidConfig(format!(
                "start date {} must precede end date {}",
                self.start, self.end
            )));
        }
        if self.window == 0 {
            return Err(PipelineError::InvalidConfig("window length must be at least 1".into()));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "train ratio must lie strictly between 0 and 1, got {}",
                self.train_ratio
            )));
        }
        if self.train.epochs == 0 || self.train.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "epochs and batch size must be at least 1".into(),
            ));
        }
        if !(self.train.learning_rate.is_finite() && self.train.learning_rate > 0.0) {
            return Err(PipelineError::InvalidConfig("learning rate must be positive".into()));
        }
        if self.lstm.hidden_dim == 0 || self.lstm.dense_dim == 0 {
            return Err(PipelineError::InvalidConfig("layer widths must be at least 1".into()));
        }
        if self.arima.p + self.arima.q == 0 {
            return Err(PipelineError::InvalidConfig("ARIMA order needs p + q >= 1".into()));
        }
        if let Source::Synthetic(0) = self.source {
            return Err(PipelineError::InvalidConfig(
                "synthetic series needs at least one day".into(),
            ));
        }
        Ok(())
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| PipelineError::InvalidConfig(format!("bad date '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.window, 100);
        assert_eq!(cfg.arima, ArimaOrder::new(6, 1, 0));
        assert_eq!(cfg.start, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut cfg = PipelineConfig::default();
        cfg.train_ratio = 1.0;
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));

        let mut cfg = PipelineConfig::default();
        cfg.window = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.end = cfg.start;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.arima = ArimaOrder::new(0, 1, 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2023-01-01").is_ok());
        assert!(parse_date("01/01/2023").is_err());
    }
}
