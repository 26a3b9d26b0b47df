//! Relative Strength Index (RSI) indicator.

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses.
/// Values range from 0-100. Averages use Wilder's smoothing seeded with the
/// simple mean of the first `period` changes.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            // Flat window reads neutral, gains-only reads fully overbought
            return if avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }

    pub fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len();
        let mut out = vec![None; n];
        if n < self.min_periods() {
            return out;
        }

        let mut gains = Vec::with_capacity(n - 1);
        let mut losses = Vec::with_capacity(n - 1);
        for i in 1..n {
            let change = closes[i] - closes[i - 1];
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        let period = self.period as f64;
        let mut avg_gain = gains.iter().take(self.period).sum::<f64>() / period;
        let mut avg_loss = losses.iter().take(self.period).sum::<f64>() / period;
        out[self.period] = Some(Self::value(avg_gain, avg_loss));

        for i in self.period..gains.len() {
            avg_gain = (avg_gain * (period - 1.0) + gains[i]) / period;
            avg_loss = (avg_loss * (period - 1.0) + losses[i]) / period;
            out[i + 1] = Some(Self::value(avg_gain, avg_loss));
        }

        out
    }
}
