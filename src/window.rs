use crate::error::{PipelineError, Result};

/// Overlapping fixed-length windows and the value that follows each one.
#[derive(Clone, Debug, Default)]
pub struct WindowedSet {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    pub length: usize,
}

impl WindowedSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Row-major `[len, length]` copy of the features as `f32`.
    pub fn flat_features(&self) -> Vec<f32> {
        self.features.iter().flatten().map(|&v| v as f32).collect()
    }
}

/// Number of examples `window` yields for `n` values and window `length`.
/// The last window whose label is the final value is not produced.
pub fn window_count(n: usize, length: usize) -> usize {
    n.saturating_sub(length + 1)
}

/// Slides a window of `length` one step at a time across `series`.
///
/// Example `i` has features `series[i..i + length]` and label `series[i + length]`.
/// An undersized series is an error rather than an empty set, so it can never
/// reach model fitting unnoticed. `partition` names the series in that error.
pub fn window(series: &[f64], length: usize, partition: &str) -> Result<WindowedSet> {
    if length == 0 {
        return Err(PipelineError::InvalidConfig("window length must be at least 1".into()));
    }
    let count = window_count(series.len(), length);
    if count == 0 {
        return Err(PipelineError::InsufficientData(format!(
            "{} partition: {} observations cannot form a window of {} plus a label (need {})",
            partition,
            series.len(),
            length,
            length + 2
        )));
    }

    let mut features = Vec::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    for i in 0..count {
        features.push(series[i..i + length].to_vec());
        labels.push(series[i + length]);
    }

    Ok(WindowedSet { features, labels, length })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_count_and_shape() {
        let series: Vec<f64> = (0..20).map(|v| v as f64).collect();
        let set = window(&series, 5, "train").unwrap();
        assert_eq!(set.len(), 20 - 5 - 1);
        assert!(set.features.iter().all(|f| f.len() == 5));
        assert_eq!(set.features[0], vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(set.labels[0], 5.0);
        assert_eq!(*set.labels.last().unwrap(), 18.0);
    }

    #[test]
    fn test_consecutive_windows_overlap() {
        let series: Vec<f64> = (0..30).map(|v| (v as f64).sin()).collect();
        let set = window(&series, 7, "train").unwrap();
        for pair in set.features.windows(2) {
            assert_eq!(pair[0][1..], pair[1][..6]);
        }
        for (i, f) in set.features.iter().enumerate() {
            assert_eq!(f[..], series[i..i + 7]);
        }
    }

    #[test]
    fn test_window_count_formula() {
        assert_eq!(window_count(1000, 100), 899);
        assert_eq!(window_count(200, 100), 99);
        assert_eq!(window_count(101, 100), 0);
        assert_eq!(window_count(3, 100), 0);
    }

    #[test]
    fn test_undersized_series_is_reported() {
        let series = vec![0.0; 101];
        match window(&series, 100, "test") {
            Err(PipelineError::InsufficientData(msg)) => {
                assert!(msg.starts_with("test partition"), "{}", msg)
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        let series = vec![0.0; 102];
        assert_eq!(window(&series, 100, "test").unwrap().len(), 1);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(window(&[1.0, 2.0, 3.0], 0, "train").is_err());
    }

    #[test]
    fn test_flat_features_row_major() {
        let set = window(&[1.0, 2.0, 3.0, 4.0, 5.0], 2, "train").unwrap();
        assert_eq!(set.flat_features(), vec![1.0, 2.0, 2.0, 3.0]);
    }
}
