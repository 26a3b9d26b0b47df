//! Squeeze detection over the band-width series.

use super::indicators::Sma;
use crate::types::SqueezeState;

/// Short and long moving averages of band-width with the per-bar contraction flag.
#[derive(Debug, Clone, PartialEq)]
pub struct SqueezeSeries {
    pub bandwidth_ma_short: Vec<Option<f64>>,
    pub bandwidth_ma_long: Vec<Option<f64>>,
    pub contracting: Vec<bool>,
}

impl SqueezeSeries {
    /// Length of the run of contracting bars ending at the latest bar.
    pub fn trailing_streak(&self) -> usize {
        self.contracting.iter().rev().take_while(|c| **c).count()
    }
}

/// Detects band-width contraction: the short average of band-width
/// sitting below the long one.
pub struct SqueezeDetector {
    ma_short: usize,
    ma_long: usize,
}

impl SqueezeDetector {
    pub fn new(ma_short: usize, ma_long: usize) -> Self {
        Self {
            ma_short: ma_short.max(1),
            ma_long: ma_long.max(1),
        }
    }

    pub fn series(&self, bandwidth: &[Option<f64>]) -> SqueezeSeries {
        let short = Sma::new(self.ma_short).calculate_sparse(bandwidth);
        let long = Sma::new(self.ma_long).calculate_sparse(bandwidth);
        let contracting = short
            .iter()
            .zip(long.iter())
            .map(|(s, l)| matches!((s, l), (Some(s), Some(l)) if s < l))
            .collect();

        SqueezeSeries {
            bandwidth_ma_short: short,
            bandwidth_ma_long: long,
            contracting,
        }
    }

    /// Squeeze state at the latest bar.
    ///
    /// Returns `None` when fewer than `ma_long + 1` band-width points are
    /// defined or the latest averages are undefined; such symbols are not scored.
    pub fn detect(&self, bandwidth: &[Option<f64>]) -> Option<SqueezeState> {
        let valid = bandwidth.iter().filter(|b| b.is_some()).count();
        if valid < self.ma_long + 1 {
            return None;
        }

        let series = self.series(bandwidth);
        let short = series.bandwidth_ma_short.last().copied().flatten()?;
        let long = series.bandwidth_ma_long.last().copied().flatten()?;
        let consecutive_days = series.trailing_streak();

        Some(SqueezeState {
            is_contracting: consecutive_days > 0,
            consecutive_days,
            bandwidth_ma_short: short,
            bandwidth_ma_long: long,
        })
    }
}
