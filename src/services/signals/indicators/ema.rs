//! Exponential Moving Average (EMA) indicator.

/// EMA (Exponential Moving Average) indicator.
///
/// Like SMA but gives more weight to recent values. The first defined value
/// is the SMA of the first `period` values; each later value applies the
/// smoothing factor `2 / (period + 1)`.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// EMA over a dense series, aligned to the input.
    pub fn calculate(&self, values: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; values.len()];
        if values.len() < self.period {
            return out;
        }

        let multiplier = self.multiplier();
        let mut ema = values[..self.period].iter().sum::<f64>() / self.period as f64;
        out[self.period - 1] = Some(ema);

        for i in self.period..values.len() {
            ema = (values[i] - ema) * multiplier + ema;
            out[i] = Some(ema);
        }

        out
    }

    /// EMA over a series whose leading slots may be undefined.
    ///
    /// Smoothing starts at the first defined value; an undefined slot after
    /// that restarts the seed.
    pub fn calculate_sparse(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut out = vec![None; values.len()];
        let multiplier = self.multiplier();
        let mut seed: Vec<f64> = Vec::with_capacity(self.period);
        let mut ema: Option<f64> = None;

        for (i, value) in values.iter().enumerate() {
            let Some(v) = *value else {
                seed.clear();
                ema = None;
                continue;
            };

            match ema {
                Some(prev) => {
                    let next = (v - prev) * multiplier + prev;
                    ema = Some(next);
                    out[i] = Some(next);
                }
                None => {
                    seed.push(v);
                    if seed.len() == self.period {
                        let sma = seed.iter().sum::<f64>() / self.period as f64;
                        ema = Some(sma);
                        out[i] = Some(sma);
                    }
                }
            }
        }

        out
    }
}
