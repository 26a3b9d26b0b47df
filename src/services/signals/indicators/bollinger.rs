//! Bollinger Bands indicator.

use super::sma::Sma;

/// Bollinger Bands indicator.
///
/// Consists of:
/// - Middle band: SMA(period)
/// - Upper band: SMA + k * StdDev
/// - Lower band: SMA - k * StdDev
/// - Band-width: (Upper - Lower) / Middle * 100
///
/// StdDev is the population standard deviation of closes over the same window.
/// A narrowing band-width marks falling volatility, the raw input of squeeze detection.
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

/// Band series aligned to the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub mid: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub bandwidth_pct: Vec<Option<f64>>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Self {
        Self {
            period: period.max(1),
            std_dev_multiplier,
        }
    }

    /// Calculate standard deviation.
    fn std_dev(values: &[f64], mean: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let variance: f64 =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }

    pub fn calculate(&self, closes: &[f64]) -> BollingerSeries {
        let mid = Sma::new(self.period).calculate(closes);
        let n = closes.len();

        let mut upper = vec![None; n];
        let mut lower = vec![None; n];
        let mut bandwidth_pct = vec![None; n];

        for i in 0..n {
            let Some(m) = mid[i] else { continue };
            let window = &closes[i + 1 - self.period..=i];
            let offset = self.std_dev_multiplier * Self::std_dev(window, m);

            let up = m + offset;
            let low = m - offset;
            upper[i] = Some(up);
            lower[i] = Some(low);

            // Zero mid band leaves the width undefined
            if m != 0.0 {
                bandwidth_pct[i] = Some((up - low) / m.abs() * 100.0);
            }
        }

        BollingerSeries {
            mid,
            upper,
            lower,
            bandwidth_pct,
        }
    }
}

/// Position of a price inside the bands: 0 at the lower band, 1 at the upper.
pub fn percent_b(price: f64, upper: f64, lower: f64) -> Option<f64> {
    let width = upper - lower;
    if width > 0.0 {
        Some((price - lower) / width)
    } else {
        None
    }
}
