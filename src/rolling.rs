use crate::error::{PipelineError, Result};
use crate::metrics::{evaluate, Evaluation};
use crate::models::arima::{ArimaModel, ArimaOrder};
use crate::series::{PriceSeries, Split};
use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, info};

/// One step of the online evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct StepForecast {
    pub step: usize,
    pub forecast: f64,
    pub actual: f64,
    /// History length after the observed value was appended.
    pub history_len: usize,
}

/// Walks the test partition one value at a time, refitting an ARIMA model on
/// everything observed so far before each forecast.
///
/// After each forecast the *observed* value, never the forecast, is appended
/// to the history. A failed fit ends the walk: the failing step is yielded as
/// an error and the iterator returns `None` from then on.
pub struct RollingForecaster<'a> {
    order: ArimaOrder,
    history: Vec<f64>,
    test: &'a [f64],
    step: usize,
    failed: bool,
}

impl<'a> RollingForecaster<'a> {
    pub fn new(train: &[f64], test: &'a [f64], order: ArimaOrder) -> Self {
        let mut history = Vec::with_capacity(train.len() + test.len());
        history.extend_from_slice(train);
        Self {
            order,
            history,
            test,
            step: 0,
            failed: false,
        }
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn is_exhausted(&self) -> bool {
        self.step >= self.test.len()
    }

    /// Forecast for the day after the last observation, fitted on the full
    /// history. Only meaningful once the test partition has been consumed.
    pub fn next_day(&self) -> Result<f64> {
        if !self.is_exhausted() || self.failed {
            return Err(PipelineError::InsufficientData(
                "next-day forecast needs the whole test partition to be consumed".into(),
            ));
        }
        let model = ArimaModel::fit(&self.history, self.order).map_err(|e| {
            PipelineError::FitFailure {
                step: self.step,
                reason: e.to_string(),
            }
        })?;
        debug!(
            "{} on {} observations: sigma2={:.4}, aic={:.2}",
            model.order,
            self.history.len(),
            model.sigma2,
            model.aic
        );
        model.forecast_one().map_err(|e| PipelineError::FitFailure {
            step: self.step,
            reason: e.to_string(),
        })
    }

    /// Drains the remaining steps, stopping at the first failure.
    pub fn run(&mut self) -> Result<Vec<StepForecast>> {
        self.by_ref().collect()
    }
}

impl Iterator for RollingForecaster<'_> {
    type Item = Result<StepForecast>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.is_exhausted() {
            return None;
        }
        let step = self.step;

        let forecast = ArimaModel::fit(&self.history, self.order).and_then(|m| m.forecast_one());
        let forecast = match forecast {
            Ok(f) => f,
            Err(e) => {
                self.failed = true;
                return Some(Err(PipelineError::FitFailure {
                    step,
                    reason: format!("{} on {} observations: {}", self.order, self.history.len(), e),
                }));
            }
        };

        let actual = self.test[step];
        self.history.push(actual);
        self.step += 1;

        debug!("step {}: forecast={:.4}, actual={:.4}", step, forecast, actual);
        Some(Ok(StepForecast {
            step,
            forecast,
            actual,
            history_len: self.history.len(),
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let left = self.test.len() - self.step;
        (0, Some(left))
    }
}

/// Outcome of the rolling evaluation over the test partition.
#[derive(Clone, Debug)]
pub struct RollingReport {
    pub order: ArimaOrder,
    pub dates: Vec<NaiveDate>,
    pub steps: Vec<StepForecast>,
    pub evaluation: Evaluation,
    pub next_day: f64,
    pub next_day_date: NaiveDate,
}

/// Next business day after `date`.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date.succ_opt().unwrap_or(date);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next = next.succ_opt().unwrap_or(next);
    }
    next
}

/// Runs the rolling forecaster over the unscaled test partition of `series`,
/// scores it and produces the forecast for the business day after the series.
pub fn run_rolling_forecast(
    series: &PriceSeries,
    split: Split,
    order: ArimaOrder,
) -> Result<RollingReport> {
    let (train, test) = split.apply(series.values());
    let (_, test_dates) = split.apply(series.dates());
    info!("Rolling {} over {} test steps ({} history)", order, test.len(), train.len());

    let mut forecaster = RollingForecaster::new(train, test, order);
    let steps = forecaster.run()?;

    let actual: Vec<f64> = steps.iter().map(|s| s.actual).collect();
    let predicted: Vec<f64> = steps.iter().map(|s| s.forecast).collect();
    let evaluation = evaluate(&actual, &predicted)?;

    let next_day = forecaster.next_day()?;
    let (last_date, _) = series
        .last()
        .ok_or_else(|| PipelineError::InsufficientData("empty price series".into()))?;

    Ok(RollingReport {
        order,
        dates: test_dates.to_vec(),
        steps,
        evaluation,
        next_day,
        next_day_date: next_business_day(last_date),
    })
}
