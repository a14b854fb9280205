use crate::config::{get_device, PipelineConfig, Source};
use crate::data::StockData;
use crate::error::Result;
use crate::inference::{run_sequence_forecast, SequenceForecast};
use crate::rolling::{run_rolling_forecast, RollingReport};
use crate::series::{MinMaxScaler, PriceSeries, Split};
use tracing::info;

/// Everything the run produced, handed to the printer and the plot window.
#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub symbol: String,
    pub series: PriceSeries,
    pub split: Split,
    pub window: usize,
    pub sequence: SequenceForecast,
    pub rolling: RollingReport,
}

/// Fetches (or synthesises) the price history and reindexes it to business days.
pub async fn acquire(cfg: &PipelineConfig) -> Result<PriceSeries> {
    let data = match cfg.source {
        Source::Yahoo => {
            info!("Fetching {} from {} to {}...", cfg.ticker, cfg.start, cfg.end);
            StockData::fetch_history(&cfg.ticker, cfg.start, cfg.end).await?
        }
        Source::Synthetic(days) => {
            info!("Generating {} synthetic days for {}", days, cfg.ticker);
            StockData::synthetic(&cfg.ticker, days, cfg.train.seed)
        }
    };
    let series = data.to_business_days()?;
    info!("{} business days from {} candles", series.len(), data.history.len());
    Ok(series)
}

/// Runs both forecasters over an acquired series.
pub fn analyze(series: PriceSeries, cfg: &PipelineConfig) -> Result<PipelineReport> {
    let scaler = MinMaxScaler::fit(series.values())?;
    let scaled = scaler.transform_all(series.values());
    let split = series.split(cfg.train_ratio)?;
    info!(
        "Split {} observations into {} train / {} test",
        split.total,
        split.train_len,
        split.test_len()
    );

    let device = get_device(cfg.use_cuda);
    info!("Stage 1/2: sequence forecaster");
    let sequence = run_sequence_forecast(
        &scaled,
        &scaler,
        split,
        cfg.window,
        cfg.lstm,
        cfg.train,
        &device,
    )?;

    info!("Stage 2/2: rolling forecaster");
    let rolling = run_rolling_forecast(&series, split, cfg.arima)?;

    Ok(PipelineReport {
        symbol: cfg.ticker.clone(),
        series,
        split,
        window: cfg.window,
        sequence,
        rolling,
    })
}

pub async fn run(cfg: &PipelineConfig) -> Result<PipelineReport> {
    cfg.validate()?;
    let series = acquire(cfg).await?;
    analyze(series, cfg)
}
