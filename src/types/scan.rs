use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::{ScoreBreakdown, SectorRanking};

/// How the symbol universe of a scan is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Constituents of the top-N sectors by recent change.
    #[default]
    Hot,
    /// The full tradable universe.
    All,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::All => "all",
        }
    }
}

/// Parameters of one scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanParams {
    pub mode: ScanMode,
    /// Number of hot sectors to expand (hot mode only).
    pub sectors: usize,
    /// Bollinger window.
    pub period: usize,
    /// Bollinger standard deviation multiplier.
    pub std_dev: f64,
    /// Short window over the band-width series.
    pub ma_short: usize,
    /// Long window over the band-width series.
    pub ma_long: usize,
    /// Minimum contraction streak for a symbol to be ranked.
    pub min_squeeze_days: usize,
    /// Only scan the first N symbols of the universe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            mode: ScanMode::Hot,
            sectors: 5,
            period: 20,
            std_dev: 2.0,
            ma_short: 5,
            ma_long: 10,
            min_squeeze_days: 3,
            limit: None,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.period < 2 {
            return Err(ScanError::InvalidParams("period must be at least 2".to_string()));
        }
        if !(self.std_dev.is_finite() && self.std_dev > 0.0) {
            return Err(ScanError::InvalidParams("stdDev must be positive".to_string()));
        }
        if self.ma_short == 0 {
            return Err(ScanError::InvalidParams("maShort must be at least 1".to_string()));
        }
        if self.ma_long <= self.ma_short {
            return Err(ScanError::InvalidParams(
                "maLong must be greater than maShort".to_string(),
            ));
        }
        if self.mode == ScanMode::Hot && self.sectors == 0 {
            return Err(ScanError::InvalidParams("sectors must be at least 1".to_string()));
        }
        if self.limit == Some(0) {
            return Err(ScanError::InvalidParams("limit must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Lifecycle state of a scan record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Progress counters of a running scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub total_symbols: usize,
    /// Symbols whose pipeline finished, whatever the outcome.
    pub processed: usize,
    /// Symbols that passed every filter and were written.
    pub matched: usize,
    /// Symbols skipped for insufficient history or a short squeeze streak.
    pub skipped: usize,
    /// Symbols whose bar fetch or result write failed.
    pub failed: usize,
    pub stage: String,
}

impl ScanProgress {
    /// Completion in percent, 0-100.
    pub fn percent(&self) -> u8 {
        if self.total_symbols == 0 {
            return 0;
        }
        ((self.processed * 100) / self.total_symbols).min(100) as u8
    }
}

/// One scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: i64,
    /// Unix milliseconds.
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    pub status: ScanStatus,
    pub params: ScanParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub hot_sectors: Vec<SectorRanking>,
    pub progress: ScanProgress,
}

/// Secondary indicator readings kept with each result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultDetails {
    pub close: f64,
    pub bb_upper: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bandwidth_ma_short: f64,
    pub bandwidth_ma_long: f64,
    /// Short/long band-width ratio in percent.
    pub squeeze_ratio: Option<f64>,
    /// Position inside the bands in percent (0 = lower, 100 = upper).
    pub bb_position: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub golden_cross_bars_ago: Option<usize>,
    pub ma20_slope: Option<f64>,
    pub atr_percentile: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub ma_bullish: bool,
    pub ma_full_bullish: bool,
    pub is_volume_up: bool,
    pub is_price_up: bool,
    pub is_volume_price_up: bool,
    pub macd_converging: bool,
    pub gentle_uptrend: bool,
    pub low_volatility: bool,
}

/// A ranked symbol within a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scan_id: i64,
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub score: ScoreBreakdown,
    pub bandwidth_pct: f64,
    pub squeeze_days: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,
    pub change_pct: f64,
    pub details: ResultDetails,
    pub tags: Vec<String>,
}

/// Rank results by total descending, then symbol code ascending.
pub fn rank_results(results: &mut [ScanResult]) {
    results.sort_by(|a, b| {
        b.score
            .total
            .total_cmp(&a.score.total)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
