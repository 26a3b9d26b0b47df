//! Technical indicator implementations.
//!
//! Every indicator works over a full ordered series and returns one slot per
//! input bar, `None` where its window has not filled.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use atr::Atr;
pub use bollinger::{BollingerBands, BollingerSeries};
pub use ema::Ema;
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use sma::Sma;
pub use volume::VolumeRatio;

use crate::error::ScanError;
use crate::types::{Bar, IndicatorSeries};

use super::SignalConfig;

/// Trailing window for the ATR% percentile rank.
pub const ATR_PERCENTILE_WINDOW: usize = 60;

/// Compute every indicator series for one symbol.
///
/// Fails with `InsufficientHistory` when fewer bars than the Bollinger
/// period are available; shorter windows are never returned half-filled.
pub fn compute_indicators(
    bars: &[Bar],
    config: &SignalConfig,
) -> Result<IndicatorSeries, ScanError> {
    if bars.len() < config.period {
        return Err(ScanError::InsufficientHistory {
            required: config.period,
            available: bars.len(),
        });
    }

    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let bands = BollingerBands::new(config.period, config.std_dev).calculate(&close);
    let macd = Macd::default().calculate(&close);

    let atr = Atr::default().calculate(bars);
    let atr_pct = atr::atr_percent(&atr, &close);
    let atr_percentile = atr::percentile_rank(&atr_pct, ATR_PERCENTILE_WINDOW);

    Ok(IndicatorSeries {
        dates: bars.iter().map(|b| b.date).collect(),
        ma5: Sma::new(5).calculate(&close),
        ma10: Sma::new(10).calculate(&close),
        ma20: Sma::new(20).calculate(&close),
        ma60: Sma::new(60).calculate(&close),
        bb_mid: bands.mid,
        bb_upper: bands.upper,
        bb_lower: bands.lower,
        bandwidth_pct: bands.bandwidth_pct,
        macd_line: macd.line,
        macd_signal: macd.signal,
        macd_histogram: macd.histogram,
        rsi: Rsi::default().calculate(&close),
        volume_ratio: VolumeRatio::default().calculate(&volumes),
        atr,
        atr_pct,
        atr_percentile,
        close,
    })
}
