//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::Ema;

/// MACD indicator.
///
/// Shows the relationship between two EMAs:
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
///
/// A golden cross is the histogram turning from negative to non-negative.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

/// MACD series aligned to the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

impl Macd {
    pub fn calculate(&self, closes: &[f64]) -> MacdSeries {
        let fast = Ema::new(self.fast_period).calculate(closes);
        let slow = Ema::new(self.slow_period).calculate(closes);

        let line: Vec<Option<f64>> = fast
            .iter()
            .zip(slow.iter())
            .map(|(f, s)| Some((*f)? - (*s)?))
            .collect();

        let signal = Ema::new(self.signal_period).calculate_sparse(&line);

        let histogram = line
            .iter()
            .zip(signal.iter())
            .map(|(l, s)| Some((*l)? - (*s)?))
            .collect();

        MacdSeries {
            line,
            signal,
            histogram,
        }
    }
}

/// Histogram below zero but rising toward a cross.
pub fn is_converging(histogram: &[Option<f64>]) -> bool {
    let n = histogram.len();
    if n < 2 {
        return false;
    }
    match (histogram[n - 2], histogram[n - 1]) {
        (Some(prev), Some(cur)) => cur < 0.0 && cur > prev,
        _ => false,
    }
}
