use nalgebra::{DMatrix, DVector};
use std::fmt;
use thiserror::Error as ThisError;

/// (p, d, q) order of an ARIMA model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize, // autoregressive lags
    pub d: usize, // differencing passes
    pub q: usize, // moving-average lags
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("history of {have} observations is too short, need at least {need}")]
    TooShort { have: usize, need: usize },

    #[error("normal equations are singular")]
    Singular,

    #[error("non-finite {0}")]
    NonFinite(&'static str),
}

/// A fitted ARIMA model, ready to forecast past the end of the history it was
/// fitted on.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    pub order: ArimaOrder,
    pub ar_coeffs: Vec<f64>,
    pub ma_coeffs: Vec<f64>,
    pub constant: f64,
    pub sigma2: f64,
    pub aic: f64,
    lags: Vec<f64>,
    shocks: Vec<f64>,
    anchors: Vec<f64>,
}

impl ArimaModel {
    /// Fits by conditional least squares: plain OLS on lagged differences for a
    /// pure AR model, the Hannan-Rissanen two-stage regression when `q > 0`.
    ///
    /// A constant is estimated only when `d == 0`; a differenced model has no
    /// drift term.
    pub fn fit(history: &[f64], order: ArimaOrder) -> Result<Self, FitError> {
        let ArimaOrder { p, d, q } = order;
        let with_const = d == 0;

        let need = min_history(order);
        if history.len() < need {
            return Err(FitError::TooShort { have: history.len(), need });
        }

        let diffed = difference(history, d);
        let anchors: Vec<f64> = (0..d)
            .map(|k| *difference(history, k).last().unwrap_or(&0.0))
            .collect();

        let (ar_coeffs, ma_coeffs, constant) = if q == 0 {
            estimate_ar(&diffed, p, with_const)?
        } else {
            estimate_arma(&diffed, p, q, with_const)?
        };

        let residuals = residuals(&diffed, &ar_coeffs, &ma_coeffs, constant);
        let start = p.max(q);
        let used = &residuals[start.min(residuals.len())..];
        let n = used.len() as f64;
        let sigma2 = used.iter().map(|r| r * r).sum::<f64>() / n;
        let k = (p + q + usize::from(with_const)) as f64;
        let log_likelihood = -0.5 * n * (1.0 + (2.0 * std::f64::consts::PI * sigma2).ln());
        let aic = -2.0 * log_likelihood + 2.0 * k;

        let coeffs_finite = ar_coeffs.iter().chain(ma_coeffs.iter()).all(|c| c.is_finite());
        if !coeffs_finite || !constant.is_finite() {
            return Err(FitError::NonFinite("coefficient"));
        }
        if !sigma2.is_finite() {
            return Err(FitError::NonFinite("residual variance"));
        }

        let lags = diffed[diffed.len() - p..].to_vec();
        let shocks = residuals[residuals.len() - q..].to_vec();

        Ok(Self {
            order,
            ar_coeffs,
            ma_coeffs,
            constant,
            sigma2,
            aic,
            lags,
            shocks,
            anchors,
        })
    }

    /// Forecasts `h` steps past the fitted history, on the original scale.
    pub fn forecast(&self, h: usize) -> Result<Vec<f64>, FitError> {
        let mut lags = self.lags.clone();
        let mut shocks = self.shocks.clone();
        let mut forecasts = Vec::with_capacity(h);

        for _ in 0..h {
            let mut next = self.constant;
            for (i, phi) in self.ar_coeffs.iter().enumerate() {
                next += phi * lags[lags.len() - 1 - i];
            }
            for (j, theta) in self.ma_coeffs.iter().enumerate() {
                next += theta * shocks[shocks.len() - 1 - j];
            }
            lags.push(next);
            shocks.push(0.0); // future shocks have zero expectation
            forecasts.push(next);
        }

        for &anchor in self.anchors.iter().rev() {
            forecasts = integrate(&forecasts, anchor);
        }

        if forecasts.iter().any(|f| !f.is_finite()) {
            return Err(FitError::NonFinite("forecast"));
        }
        Ok(forecasts)
    }

    pub fn forecast_one(&self) -> Result<f64, FitError> {
        self.forecast(1)?.first().copied().ok_or(FitError::NonFinite("forecast"))
    }
}

/// Shortest history `fit` accepts for `order`.
pub fn min_history(order: ArimaOrder) -> usize {
    let ArimaOrder { p, d, q } = order;
    let params = p + q + usize::from(d == 0);
    // the long AR stage of Hannan-Rissanen needs its own rows
    let burn_in = if q == 0 { p } else { 2 * long_ar_order(p, q) + q };
    // at least one more regression row than parameters
    d + burn_in + params + 1
}

fn long_ar_order(p: usize, q: usize) -> usize {
    (p + q).max(10)
}

pub fn difference(data: &[f64], d: usize) -> Vec<f64> {
    let mut result = data.to_vec();
    for _ in 0..d {
        if result.len() < 2 {
            return vec![];
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

fn integrate(diff: &[f64], start: f64) -> Vec<f64> {
    let mut result = Vec::with_capacity(diff.len());
    let mut cumsum = start;
    for &d in diff {
        cumsum += d;
        result.push(cumsum);
    }
    result
}

/// Solves the least-squares problem `x * beta = y` through the normal equations.
fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, FitError> {
    let xt = x.transpose();
    let xtx = &xt * x;
    let xty = &xt * y;
    let xtx_inv = xtx.try_inverse().ok_or(FitError::Singular)?;
    Ok(&xtx_inv * xty)
}

fn regressors(
    data: &[f64],
    shocks: &[f64],
    p: usize,
    q: usize,
    start: usize,
    with_const: bool,
) -> (DMatrix<f64>, DVector<f64>) {
    let rows = data.len() - start;
    let cols = p + q + usize::from(with_const);
    let mut x_data = Vec::with_capacity(rows * cols);
    for t in start..data.len() {
        if with_const {
            x_data.push(1.0);
        }
        for i in 1..=p {
            x_data.push(data[t - i]);
        }
        for j in 1..=q {
            x_data.push(shocks[t - j]);
        }
    }
    (
        DMatrix::from_row_slice(rows, cols, &x_data),
        DVector::from_column_slice(&data[start..]),
    )
}

type Coefficients = (Vec<f64>, Vec<f64>, f64);

fn split_beta(beta: &DVector<f64>, p: usize, q: usize, with_const: bool) -> Coefficients {
    let offset = usize::from(with_const);
    let constant = if with_const { beta[0] } else { 0.0 };
    let ar = beta.iter().skip(offset).take(p).copied().collect();
    let ma = beta.iter().skip(offset + p).take(q).copied().collect();
    (ar, ma, constant)
}

fn estimate_ar(data: &[f64], p: usize, with_const: bool) -> Result<Coefficients, FitError> {
    if p == 0 {
        let constant = if with_const {
            data.iter().sum::<f64>() / data.len() as f64
        } else {
            0.0
        };
        return Ok((vec![], vec![], constant));
    }
    let (x, y) = regressors(data, &[], p, 0, p, with_const);
    let beta = least_squares(&x, &y)?;
    Ok(split_beta(&beta, p, 0, with_const))
}

/// Hannan-Rissanen: a long AR fit supplies shock estimates, which then enter a
/// second regression as the moving-average regressors.
fn estimate_arma(
    data: &[f64],
    p: usize,
    q: usize,
    with_const: bool,
) -> Result<Coefficients, FitError> {
    let m = long_ar_order(p, q);
    let (long_ar, _, long_const) = estimate_ar(data, m, with_const)?;
    let shocks = residuals(data, &long_ar, &[], long_const);

    let (x, y) = regressors(data, &shocks, p, q, m + q, with_const);
    let beta = least_squares(&x, &y)?;
    Ok(split_beta(&beta, p, q, with_const))
}

/// One-step prediction errors over `data`; the first `max(p, q)` entries are zero.
fn residuals(data: &[f64], ar: &[f64], ma: &[f64], constant: f64) -> Vec<f64> {
    let start = ar.len().max(ma.len());
    let mut resid = vec![0.0; data.len()];
    for t in start..data.len() {
        let mut fitted = constant;
        for (i, phi) in ar.iter().enumerate() {
            fitted += phi * data[t - 1 - i];
        }
        for (j, theta) in ma.iter().enumerate() {
            fitted += theta * resid[t - 1 - j];
        }
        resid[t] = data[t] - fitted;
    }
    resid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-0.1..0.1)).collect()
    }

    #[test]
    fn test_difference() {
        let data = vec![1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&data, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&data, 2), vec![1.0, 1.0, 1.0]);
        assert_eq!(difference(&data, 0), data);
    }

    #[test]
    fn test_ar_model() {
        let e = noise(300, 1);
        let mut data = vec![0.0];
        let phi = 0.7;
        for i in 1..300 {
            data.push(phi * data[i - 1] + e[i]);
        }

        let model = ArimaModel::fit(&data, ArimaOrder::new(1, 0, 0)).unwrap();
        assert!((model.ar_coeffs[0] - phi).abs() < 0.2);
        assert!(model.sigma2 > 0.0);
    }

    #[test]
    fn test_random_walk_with_drift_order_610() {
        // differences follow an AR(1) around zero; levels keep climbing
        let e = noise(400, 2);
        let mut diffs = vec![0.0];
        for i in 1..400 {
            diffs.push(0.5 * diffs[i - 1] + e[i]);
        }
        let mut level = 100.0;
        let levels: Vec<f64> = diffs
            .iter()
            .map(|d| {
                level += d;
                level
            })
            .collect();

        let model = ArimaModel::fit(&levels, ArimaOrder::new(6, 1, 0)).unwrap();
        assert_eq!(model.order, ArimaOrder::new(6, 1, 0));
        assert_eq!(model.ar_coeffs.len(), 6);
        assert_eq!(model.constant, 0.0);
        let next = model.forecast_one().unwrap();
        let last = *levels.last().unwrap();
        assert!((next - last).abs() < 1.0);
    }

    #[test]
    fn test_linear_trend_forecast_is_exact() {
        // a perfectly linear series differences to a constant
        let levels: Vec<f64> = (0..60).map(|i| 10.0 + 2.0 * i as f64).collect();
        let model = ArimaModel::fit(&levels, ArimaOrder::new(1, 1, 0)).unwrap();
        let next = model.forecast(3).unwrap();
        assert!((next[0] - 130.0).abs() < 1e-6);
        assert!((next[2] - 134.0).abs() < 1e-6);
    }

    #[test]
    fn test_arma_fit() {
        let e = noise(500, 3);
        let mut data = vec![0.0];
        for i in 1..500 {
            data.push(0.5 * data[i - 1] + e[i] + 0.3 * e[i - 1]);
        }
        let model = ArimaModel::fit(&data, ArimaOrder::new(1, 0, 1)).unwrap();
        assert_eq!(model.ar_coeffs.len(), 1);
        assert_eq!(model.ma_coeffs.len(), 1);
        assert!(model.forecast_one().unwrap().is_finite());
    }

    #[test]
    fn test_short_history_is_rejected() {
        let order = ArimaOrder::new(6, 1, 0);
        let need = min_history(order);
        let data: Vec<f64> = noise(need - 1, 4)
            .iter()
            .enumerate()
            .map(|(i, e)| e + i as f64)
            .collect();
        assert!(matches!(
            ArimaModel::fit(&data, order),
            Err(FitError::TooShort { .. })
        ));
    }

    #[test]
    fn test_constant_series_is_singular() {
        let data = vec![5.0; 50];
        assert_eq!(
            ArimaModel::fit(&data, ArimaOrder::new(2, 1, 0)).unwrap_err(),
            FitError::Singular
        );
    }

    #[test]
    fn test_order_display() {
        assert_eq!(ArimaOrder::new(6, 1, 0).to_string(), "ARIMA(6,1,0)");
    }
}
