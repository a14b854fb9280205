use crate::error::{PipelineError, Result};
use chrono::NaiveDate;

/// Business-day close prices, one per date, dates strictly increasing.
#[derive(Clone, Debug)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl PriceSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(PipelineError::MalformedSeries(format!(
                "{} dates but {} prices",
                dates.len(),
                values.len()
            )));
        }
        if dates.is_empty() {
            return Err(PipelineError::InsufficientData("empty price series".into()));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::MalformedSeries("dates must be strictly increasing".into()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::MalformedSeries(format!("non-finite price on {}", dates[i])));
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        Some((*self.dates.last()?, *self.values.last()?))
    }

    /// Chronological split at `floor(len * ratio)`. Both sides must be non-empty.
    pub fn split(&self, ratio: f64) -> Result<Split> {
        let train_len = (self.len() as f64 * ratio) as usize;
        if train_len == 0 || train_len >= self.len() {
            return Err(PipelineError::InsufficientData(format!(
                "cannot split {} observations at ratio {}",
                self.len(),
                ratio
            )));
        }
        Ok(Split { train_len, total: self.len() })
    }
}

/// Boundary between the train and test partitions. The partitions themselves
/// are borrowed from whichever series (raw or scaled) is being split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split {
    pub train_len: usize,
    pub total: usize,
}

impl Split {
    pub fn test_len(&self) -> usize {
        self.total - self.train_len
    }

    pub fn apply<'a, T>(&self, values: &'a [T]) -> (&'a [T], &'a [T]) {
        values.split_at(self.train_len.min(values.len()))
    }
}

/// Linear map of the observed `[min, max]` onto `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    scale: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(PipelineError::InsufficientData("cannot fit scaler on empty series".into()));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        // constant series: unit range keeps the map invertible
        let scale = if range > 0.0 { range } else { 1.0 };
        Ok(Self { min, scale })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.scale
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.scale + self.min
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse(v)).collect()
    }
}
