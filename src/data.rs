use crate::config::{FETCH_RETRIES, FETCH_TIMEOUT_SECS};
use crate::error::{PipelineError, Result};
use crate::series::PriceSeries;
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Clone, Debug)]
pub struct StockData {
    pub symbol: String,
    pub history: Vec<Candle>,
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Debug)]
struct YahooError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct YahooResult {
    meta: Option<YahooMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Debug)]
struct YahooMeta {
    gmtoffset: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Deserialize, Debug)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Unix seconds at 00:00 UTC of `date`.
fn day_start(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
    // period2 is exclusive on Yahoo's side, so ask for the day after `end`.
    let period2 = end.checked_add_days(Days::new(1)).unwrap_or(end);
    format!(
        "https://query1.finance.yahoo.com/v8/finance/chart/{}?period1={}&period2={}&interval=1d",
        symbol,
        day_start(start),
        day_start(period2)
    )
}

/// Rate limiting and server-side failures are worth another attempt; any other
/// status is answered by the body as it stands.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Backoff before retry `attempt` (1-based): `2^(attempt-1)` seconds plus up to a
/// second of jitter, capped at 30 seconds.
fn backoff(attempt: u32, jitter: f64) -> Duration {
    let secs = 2.0_f64.powi(attempt as i32 - 1) + jitter;
    Duration::from_secs_f64(secs).min(Duration::from_secs(30))
}

impl StockData {
    /// Fetches daily candles for `symbol` over the inclusive range `[start, end]`.
    ///
    /// Network errors (timeouts and interrupted bodies included), 429 and 5xx
    /// responses are retried up to `FETCH_RETRIES` times with exponential backoff;
    /// anything else fails immediately.
    pub async fn fetch_history(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let url = chart_url(symbol, start, end);
        Self::fetch_url(symbol, &url, Duration::from_secs(FETCH_TIMEOUT_SECS)).await
    }

    async fn fetch_url(symbol: &str, url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::acquisition(symbol, format!("http client: {}", e)))?;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..FETCH_RETRIES {
            if attempt > 0 {
                let delay = backoff(attempt, rand::random::<f64>());
                warn!(
                    "Yahoo fetch retry for {}: attempt {}/{} - reason: {}, waiting {:.1}s",
                    symbol,
                    attempt + 1,
                    FETCH_RETRIES,
                    last_error,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            debug!("GET {}", url);
            let resp = match client.get(url).header("User-Agent", "Mozilla/5.0").send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = format!("network error: {}", e);
                    continue;
                }
            };

            let status = resp.status();
            if is_retryable(status) {
                last_error = format!("HTTP {}", status.as_u16());
                continue;
            }

            // Yahoo answers unknown symbols with 404 and a JSON error body, so try
            // to decode the body before giving up on the status.
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = format!("reading body: {}", e);
                    continue;
                }
            };
            return match serde_json::from_str::<YahooChartResponse>(&body) {
                Ok(parsed) => Self::from_chart(symbol, parsed),
                Err(_) if status.is_client_error() => Err(PipelineError::acquisition(
                    symbol,
                    format!("HTTP {} - not retryable", status.as_u16()),
                )),
                Err(e) => Err(PipelineError::acquisition(
                    symbol,
                    format!("malformed response: {}", e),
                )),
            };
        }

        Err(PipelineError::acquisition(
            symbol,
            format!("gave up after {} attempts: {}", FETCH_RETRIES, last_error),
        ))
    }

    fn from_chart(symbol: &str, resp: YahooChartResponse) -> Result<Self> {
        if let Some(err) = resp.chart.error {
            return Err(PipelineError::acquisition(
                symbol,
                format!("{}: {}", err.code, err.description.unwrap_or_default()),
            ));
        }

        let result = resp
            .chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .ok_or_else(|| PipelineError::acquisition(symbol, "No data found"))?;
        let quote = result
            .indicators
            .quote
            .first()
            .ok_or_else(|| PipelineError::acquisition(symbol, "No quotes found"))?;
        let offset = result.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);

        let mut history = Vec::new();

        for (i, &timestamp) in result.timestamp.iter().enumerate() {
            if let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                quote.open.get(i).and_then(|v| *v),
                quote.high.get(i).and_then(|v| *v),
                quote.low.get(i).and_then(|v| *v),
                quote.close.get(i).and_then(|v| *v),
                quote.volume.get(i).and_then(|v| *v),
            ) {
                let Some(local) = Utc.timestamp_opt(timestamp + offset, 0).single() else {
                    continue;
                };
                history.push(Candle {
                    date: local.date_naive(),
                    open,
                    high,
                    low,
                    close,
                    volume,
                });
            }
        }

        if history.is_empty() {
            return Err(PipelineError::acquisition(symbol, "provider returned no usable rows"));
        }

        info!("Fetched {} candles for {}", history.len(), symbol);
        Ok(Self {
            symbol: symbol.to_string(),
            history,
        })
    }

    /// Reindexes the closes onto every business day (Mon-Fri) between the first
    /// and last candle, carrying the previous close into missing days.
    pub fn to_business_days(&self) -> Result<PriceSeries> {
        let closes: BTreeMap<NaiveDate, f64> =
            self.history.iter().map(|c| (c.date, c.close)).collect();
        let (Some((&first, _)), Some((&last, _))) =
            (closes.first_key_value(), closes.last_key_value())
        else {
            return Err(PipelineError::InsufficientData(format!(
                "no candles for {}",
                self.symbol
            )));
        };

        let mut dates = Vec::new();
        let mut values = Vec::new();
        let mut carried: Option<f64> = None;
        let mut filled = 0usize;

        for day in first.iter_days().take_while(|d| *d <= last) {
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let value = match closes.get(&day) {
                Some(&close) => close,
                None => {
                    filled += 1;
                    match carried {
                        Some(v) => v,
                        // only weekend trading can leave the head empty
                        None => continue,
                    }
                }
            };
            carried = Some(value);
            dates.push(day);
            values.push(value);
        }

        debug!("Forward-filled {} business days for {}", filled, self.symbol);
        PriceSeries::new(dates, values)
    }

    /// Deterministic random walk used for offline runs.
    pub fn synthetic(symbol: &str, days: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut history = Vec::with_capacity(days);
        let mut current_price: f64 = 100.0;
        let mut current_date = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap_or_default();

        while history.len() < days {
            if matches!(current_date.weekday(), Weekday::Sat | Weekday::Sun) {
                current_date = current_date.succ_opt().unwrap_or(current_date);
                continue;
            }
            let volatility = 0.02; // 2% daily volatility
            let change_pct: f64 = rng.gen_range(-volatility..volatility);
            let open = current_price;
            let close = open * (1.0 + change_pct);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(1000.0..10000.0);

            history.push(Candle {
                date: current_date,
                open,
                high,
                low,
                close,
                volume,
            });

            current_price = close;
            current_date = current_date.succ_opt().unwrap_or(current_date);
        }

        Self {
            symbol: symbol.to_string(),
            history,
        }
    }
}

/// UTC midnight of a business date, used as the plot x coordinate.
pub fn date_to_timestamp(date: NaiveDate) -> f64 {
    day_start(date) as f64
}

pub fn timestamp_to_date(ts: f64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts as i64, 0).map(|dt| dt.date_naive())
}
