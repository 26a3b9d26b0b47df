//! Average True Range (ATR) indicator and its volatility percentile.

use crate::types::Bar;

/// ATR (Average True Range) indicator.
///
/// Measures market volatility by averaging true ranges:
/// TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|)
///
/// The first ATR is the mean of the first `period` true ranges; later values
/// use Wilder's smoothing.
pub struct Atr {
    period: usize,
}

impl Default for Atr {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Atr {
    fn min_periods(&self) -> usize {
        self.period + 1
    }

    /// Calculate True Range.
    fn true_range(current: &Bar, previous: &Bar) -> f64 {
        let hl = current.high - current.low;
        let hc = (current.high - previous.close).abs();
        let lc = (current.low - previous.close).abs();
        hl.max(hc).max(lc)
    }

    pub fn calculate(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut out = vec![None; n];
        if n < self.min_periods() {
            return out;
        }

        let true_ranges: Vec<f64> = bars
            .windows(2)
            .map(|w| Self::true_range(&w[1], &w[0]))
            .collect();

        let period = self.period as f64;
        let mut atr = true_ranges.iter().take(self.period).sum::<f64>() / period;
        out[self.period] = Some(atr);

        for (i, tr) in true_ranges.iter().enumerate().skip(self.period) {
            atr = (atr * (period - 1.0) + tr) / period;
            out[i + 1] = Some(atr);
        }

        out
    }
}

/// ATR as a percentage of the close.
pub fn atr_percent(atr: &[Option<f64>], closes: &[f64]) -> Vec<Option<f64>> {
    atr.iter()
        .zip(closes.iter())
        .map(|(a, c)| match a {
            Some(a) if *c > 0.0 => Some(a / c * 100.0),
            _ => None,
        })
        .collect()
}

/// Percentile rank of each value within its trailing `window` (current included).
///
/// Rank is the share of values in the window that are less than or equal to
/// the current one, times 100. `None` until `window` consecutive values are defined.
pub fn percentile_rank(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let current = values[i]?;
            let start = (i + 1).checked_sub(window)?;
            let trailing: Option<Vec<f64>> = values[start..=i].iter().copied().collect();
            let trailing = trailing?;
            let at_or_below = trailing.iter().filter(|v| **v <= current).count();
            Some(at_or_below as f64 / window as f64 * 100.0)
        })
        .collect()
}
