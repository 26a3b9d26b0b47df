//! Squeeze signal pipeline.
//!
//! Indicator Engine (`indicators`) -> Squeeze Detector (`squeeze`) ->
//! Scoring Engine (`scoring`). All stages are pure functions over a bar series.

pub mod indicators;
pub mod scoring;
pub mod squeeze;

pub use indicators::compute_indicators;
pub use squeeze::{SqueezeDetector, SqueezeSeries};

use crate::error::ScanError;
use crate::types::{Bar, IndicatorSeries, ResultDetails, ScanParams, ScoreBreakdown, SqueezeState};

/// Window configuration shared by the pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalConfig {
    /// Bollinger window.
    pub period: usize,
    /// Bollinger standard deviation multiplier.
    pub std_dev: f64,
    /// Short average over band-width.
    pub ma_short: usize,
    /// Long average over band-width.
    pub ma_long: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev: 2.0,
            ma_short: 5,
            ma_long: 10,
        }
    }
}

impl From<&ScanParams> for SignalConfig {
    fn from(params: &ScanParams) -> Self {
        Self {
            period: params.period,
            std_dev: params.std_dev,
            ma_short: params.ma_short,
            ma_long: params.ma_long,
        }
    }
}

/// Everything the pipeline derives for one symbol.
#[derive(Debug, Clone)]
pub struct SymbolAnalysis {
    pub series: IndicatorSeries,
    pub squeeze: SqueezeState,
    pub score: ScoreBreakdown,
    pub details: ResultDetails,
    pub bandwidth_pct: f64,
    pub volume_ratio: Option<f64>,
    pub change_pct: f64,
}

/// Run the full pipeline over one symbol's bars.
///
/// `Err(InsufficientHistory)` when the bars cannot fill the Bollinger window,
/// `Ok(None)` when the squeeze state is undefined. Both are skip signals.
/// The minimum-streak filter is left to the caller.
pub fn analyze_bars(bars: &[Bar], config: &SignalConfig) -> Result<Option<SymbolAnalysis>, ScanError> {
    let series = compute_indicators(bars, config)?;

    let detector = SqueezeDetector::new(config.ma_short, config.ma_long);
    let Some(squeeze) = detector.detect(&series.bandwidth_pct) else {
        return Ok(None);
    };
    let Some(bandwidth_pct) = IndicatorSeries::latest(&series.bandwidth_pct) else {
        return Ok(None);
    };

    let score = scoring::score(&series, &squeeze);
    let details = scoring::details(&series, &squeeze, bars);

    Ok(Some(SymbolAnalysis {
        volume_ratio: IndicatorSeries::latest(&series.volume_ratio),
        change_pct: scoring::change_pct(bars),
        series,
        squeeze,
        score,
        details,
        bandwidth_pct,
    }))
}
