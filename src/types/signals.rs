use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Indicator values aligned to the bar date axis.
///
/// Every series has one slot per bar; `None` marks indices where the
/// window has not filled yet (or the value is undefined, e.g. a zero mid band).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSeries {
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub ma5: Vec<Option<f64>>,
    pub ma10: Vec<Option<f64>>,
    pub ma20: Vec<Option<f64>>,
    pub ma60: Vec<Option<f64>>,
    pub bb_mid: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub bandwidth_pct: Vec<Option<f64>>,
    pub macd_line: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub volume_ratio: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub atr_pct: Vec<Option<f64>>,
    pub atr_percentile: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Latest value of a series.
    pub fn latest(series: &[Option<f64>]) -> Option<f64> {
        series.last().copied().flatten()
    }

    /// Value `bars_ago` bars before the latest one.
    pub fn back(series: &[Option<f64>], bars_ago: usize) -> Option<f64> {
        let idx = series.len().checked_sub(bars_ago + 1)?;
        series[idx]
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.close.last().copied()
    }

    /// Bars since the most recent MACD golden cross (histogram going from
    /// negative to non-negative), looking back at most `max_lookback` bars.
    /// `Some(0)` means the cross happened on the latest bar.
    pub fn golden_cross_bars_ago(&self, max_lookback: usize) -> Option<usize> {
        let hist = &self.macd_histogram;
        let n = hist.len();
        (0..=max_lookback)
            .take_while(|k| k + 1 < n)
            .find(|&k| {
                let i = n - 1 - k;
                matches!((hist[i - 1], hist[i]), (Some(prev), Some(cur)) if prev < 0.0 && cur >= 0.0)
            })
    }
}

/// Contraction state of the band-width series at the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqueezeState {
    pub is_contracting: bool,
    pub consecutive_days: usize,
    pub bandwidth_ma_short: f64,
    pub bandwidth_ma_long: f64,
}

impl SqueezeState {
    /// Short/long band-width average ratio; below 1.0 means contraction.
    pub fn ratio(&self) -> Option<f64> {
        if self.bandwidth_ma_long > 0.0 {
            Some(self.bandwidth_ma_short / self.bandwidth_ma_long)
        } else {
            None
        }
    }
}

/// Letter grade derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
}

impl Grade {
    pub const S_MIN: f64 = 85.0;
    pub const A_MIN: f64 = 70.0;
    pub const B_MIN: f64 = 55.0;

    pub fn from_total(total: f64) -> Self {
        match total {
            t if t >= Self::S_MIN => Grade::S,
            t if t >= Self::A_MIN => Grade::A,
            t if t >= Self::B_MIN => Grade::B,
            _ => Grade::C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "S" => Some(Grade::S),
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            _ => None,
        }
    }
}

/// Weighted sub-scores and the composite for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub squeeze_score: f64,
    pub trend_score: f64,
    pub momentum_score: f64,
    pub position_score: f64,
    pub popularity_score: f64,
    pub total: f64,
    pub grade: Grade,
}

/// Chart payload for a single symbol: recent candles with bands and band-width.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub candles: Vec<crate::types::Bar>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_mid: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub bandwidth_pct: Vec<Option<f64>>,
    pub bandwidth_ma_short: Vec<Option<f64>>,
    pub bandwidth_ma_long: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squeeze: Option<SqueezeState>,
}
