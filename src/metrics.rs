use crate::error::{PipelineError, Result};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
    pub count: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE: {:.4}  R²: {:.4}  MAE: {:.4}  (n={})",
            self.rmse, self.r2, self.mae, self.count
        )
    }
}

fn check(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() {
        return Err(PipelineError::Metric("no observations to score".into()));
    }
    if actual.len() != predicted.len() {
        return Err(PipelineError::Metric(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.iter().chain(predicted.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::Metric("non-finite value in scored series".into()));
    }
    Ok(())
}

/// Mean Squared Error
pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root Mean Squared Error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mse(actual, predicted)?.sqrt())
}

/// Mean Absolute Error
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Coefficient of determination.
///
/// When the actual values have zero variance the score is 1.0 for an exact
/// prediction and 0.0 otherwise.
pub fn r2(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<Evaluation> {
    Ok(Evaluation {
        rmse: rmse(actual, predicted)?,
        r2: r2(actual, predicted)?,
        mae: mae(actual, predicted)?,
        count: actual.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse() {
        let error = mse(&[1.0, 2.0, 3.0], &[1.1, 2.0, 2.9]).unwrap();
        assert!((error - 0.006666666666666667).abs() < 1e-10);
    }

    #[test]
    fn test_perfect_prediction() {
        let actual = [101.5, 99.0, 104.25, 110.0];
        assert_eq!(rmse(&actual, &actual).unwrap(), 0.0);
        assert_eq!(r2(&actual, &actual).unwrap(), 1.0);
    }

    #[test]
    fn test_imperfect_prediction() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.0, 2.0, 3.0, 4.5];
        assert!(rmse(&actual, &predicted).unwrap() > 0.0);
        assert!(r2(&actual, &predicted).unwrap() < 1.0);

        // predicting the mean scores zero
        let mean = [2.5; 4];
        assert!(r2(&actual, &mean).unwrap().abs() < 1e-12);
        assert!((mae(&actual, &mean).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_actuals() {
        let actual = [5.0; 3];
        assert_eq!(r2(&actual, &actual).unwrap(), 1.0);
        assert_eq!(r2(&actual, &[5.0, 5.0, 6.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_guards() {
        assert!(matches!(rmse(&[], &[]), Err(PipelineError::Metric(_))));
        assert!(matches!(r2(&[1.0, 2.0], &[1.0]), Err(PipelineError::Metric(_))));
        assert!(matches!(evaluate(&[1.0], &[f64::NAN]), Err(PipelineError::Metric(_))));
    }

    #[test]
    fn test_evaluate() {
        let eval = evaluate(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(eval.count, 3);
        assert!((eval.rmse - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(eval.to_string().starts_with("RMSE: "));
    }
}
