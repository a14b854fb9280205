mod config;
mod data;
mod error;
mod gui;
mod inference;
mod metrics;
mod models;
mod pipeline;
mod rolling;
mod series;
mod train;
mod window;

use clap::Parser;
use config::{LstmConfig, PipelineConfig, Source, TrainConfig};
use models::arima::ArimaOrder;
use pipeline::PipelineReport;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "closecast: next-day close forecasts from a stacked LSTM and a rolling ARIMA",
    after_help = "EXAMPLES:
    # Default run (GRASIM.NS, 2010-01-01 to 2023-01-01)
    cargo run --release

    # Another ticker, shorter training, no plot window
    cargo run --release -- --ticker SPY --epochs 20 --no-plot

    # Offline run on a seeded random walk
    cargo run --release -- --synthetic 1500 --no-plot"
)]
struct Args {
    /// Ticker symbol as known to Yahoo Finance
    #[arg(long, default_value = config::TICKER)]
    ticker: String,

    /// First date of the range (YYYY-MM-DD)
    #[arg(long, default_value = config::START_DATE)]
    start: String,

    /// Last date of the range, inclusive (YYYY-MM-DD)
    #[arg(long, default_value = config::END_DATE)]
    end: String,

    /// Number of past observations the LSTM sees per prediction
    #[arg(long, default_value_t = config::WINDOW)]
    window: usize,

    /// Fraction of the series used for training
    #[arg(long, default_value_t = config::TRAIN_RATIO)]
    train_ratio: f64,

    /// Training epochs
    #[arg(long, default_value_t = config::EPOCHS)]
    epochs: usize,

    /// Mini-batch size
    #[arg(long, default_value_t = config::BATCH_SIZE)]
    batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = config::LEARNING_RATE)]
    learning_rate: f64,

    /// Width of both LSTM layers
    #[arg(long, default_value_t = config::HIDDEN_DIM)]
    hidden: usize,

    /// Width of the first dense layer
    #[arg(long, default_value_t = config::DENSE_DIM)]
    dense: usize,

    /// ARIMA autoregressive order
    #[arg(long, default_value_t = config::ARIMA_P)]
    arima_p: usize,

    /// ARIMA differencing order
    #[arg(long, default_value_t = config::ARIMA_D)]
    arima_d: usize,

    /// ARIMA moving-average order
    #[arg(long, default_value_t = config::ARIMA_Q)]
    arima_q: usize,

    /// Seed for batch shuffling and synthetic data
    #[arg(long, default_value_t = config::SEED)]
    seed: u64,

    /// Use a seeded random walk of this many business days instead of fetching
    #[arg(long)]
    synthetic: Option<usize>,

    /// Print metrics only, do not open the plot window
    #[arg(long)]
    no_plot: bool,

    /// Use CUDA GPU acceleration (requires --features cuda at compile time)
    #[arg(long)]
    cuda: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<PipelineConfig> {
        Ok(PipelineConfig {
            start: config::parse_date(&self.start)?,
            end: config::parse_date(&self.end)?,
            ticker: self.ticker,
            source: self.synthetic.map_or(Source::Yahoo, Source::Synthetic),
            window: self.window,
            train_ratio: self.train_ratio,
            lstm: LstmConfig {
                hidden_dim: self.hidden,
                dense_dim: self.dense,
            },
            train: TrainConfig {
                epochs: self.epochs,
                batch_size: self.batch_size,
                learning_rate: self.learning_rate,
                seed: self.seed,
            },
            arima: ArimaOrder::new(self.arima_p, self.arima_d, self.arima_q),
            use_cuda: self.cuda,
        })
    }
}

fn print_report(report: &PipelineReport) {
    let seq = &report.sequence;
    println!("##############################################################################");
    println!("LSTM (window {}) on {}", report.window, report.symbol);
    if let Some(loss) = seq.epoch_losses.last() {
        println!("Final training loss: {:.6}", loss);
    }
    println!("Train RMSE: {:.4}", seq.train_eval.rmse);
    println!("Test RMSE:  {:.4}", seq.test_eval.rmse);
    println!("Train R²:   {:.4}", seq.train_eval.r2);
    println!("Test R²:    {:.4}", seq.test_eval.r2);
    println!("##############################################################################");

    let rolling = &report.rolling;
    println!("{} rolling forecast over {} test days", rolling.order, rolling.steps.len());
    println!(
        "Next-day close for {} ({}): {:.2}",
        report.symbol, rolling.next_day_date, rolling.next_day
    );
    println!("{} RMSE: {:.4}", rolling.order, rolling.evaluation.rmse);
    println!("{} R²:   {:.4}", rolling.order, rolling.evaluation.r2);
    println!("{} MAE:  {:.4}", rolling.order, rolling.evaluation.mae);
    println!("##############################################################################");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let no_plot = args.no_plot;
    let cfg = args.into_config()?;

    let report = match pipeline::run(&cfg).await {
        Ok(report) => report,
        Err(e) => {
            error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    print_report(&report);

    if !no_plot {
        info!("Opening plot window");
        gui::show(&report).map_err(|e| anyhow::anyhow!("plot window failed: {}", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let args = Args::parse_from(["closecast"]);
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.ticker, "GRASIM.NS");
        assert_eq!(cfg.window, 100);
        assert_eq!(cfg.train.epochs, 100);
        assert_eq!(cfg.train.batch_size, 64);
        assert_eq!(cfg.lstm, LstmConfig::default());
        assert_eq!(cfg.arima, ArimaOrder::new(6, 1, 0));
        assert_eq!(cfg.source, Source::Yahoo);
    }

    #[test]
    fn test_flags_override() {
        let args = Args::parse_from([
            "closecast",
            "--ticker",
            "SPY",
            "--window",
            "30",
            "--arima-p",
            "2",
            "--synthetic",
            "500",
            "--no-plot",
        ]);
        assert!(args.no_plot);
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.ticker, "SPY");
        assert_eq!(cfg.window, 30);
        assert_eq!(cfg.arima, ArimaOrder::new(2, 1, 0));
        assert_eq!(cfg.source, Source::Synthetic(500));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let args = Args::parse_from(["closecast", "--start", "2010/01/01"]);
        assert!(args.into_config().is_err());
    }
}
