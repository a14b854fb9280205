use thiserror::Error as ThisError;

/// Failure of one pipeline stage. Each variant names the stage that failed so
/// the operator can tell a bad ticker from a model that refused to fit.
#[derive(ThisError, Debug)]
pub enum PipelineError {
    #[error("Acquisition failed for {symbol}: {reason}")]
    Acquisition { symbol: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Malformed price series: {0}")]
    MalformedSeries(String),

    #[error("Model fit failed at step {step}: {reason}")]
    FitFailure { step: usize, reason: String },

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Metric computation failed: {0}")]
    Metric(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model error: {0}")]
    Model(#[from] candle_core::Error),
}

impl PipelineError {
    pub fn acquisition(symbol: &str, reason: impl Into<String>) -> Self {
        PipelineError::Acquisition {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
