//! Simple Moving Average (SMA) indicator.

/// SMA (Simple Moving Average) indicator.
///
/// Arithmetic mean of the trailing `period` values, aligned to the input:
/// index `i` covers `[i - period + 1, i]` and is `None` while the window fills.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// Rolling mean over a dense series.
    pub fn calculate(&self, values: &[f64]) -> Vec<Option<f64>> {
        (0..values.len())
            .map(|i| {
                if i + 1 < self.period {
                    return None;
                }
                let window = &values[i + 1 - self.period..=i];
                Some(window.iter().sum::<f64>() / self.period as f64)
            })
            .collect()
    }

    /// Rolling mean over a series with undefined slots.
    ///
    /// A window containing any undefined value yields `None`.
    pub fn calculate_sparse(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        (0..values.len())
            .map(|i| {
                if i + 1 < self.period {
                    return None;
                }
                let mut sum = 0.0;
                for v in &values[i + 1 - self.period..=i] {
                    sum += (*v)?;
                }
                Some(sum / self.period as f64)
            })
            .collect()
    }
}
