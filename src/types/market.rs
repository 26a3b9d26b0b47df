use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Shares traded.
    pub volume: f64,
    /// Traded value.
    #[serde(default)]
    pub amount: f64,
    /// Turnover rate in percent of float, when the source provides it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub turnover_rate: Option<f64>,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            amount: close * volume,
            turnover_rate: None,
        }
    }
}

/// Check that bars are strictly increasing by date.
pub fn is_chronological(bars: &[Bar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}

/// A sector with its recent change, used to pick hot sectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorRanking {
    pub name: String,
    /// Source-specific board code (e.g. "BK0477").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    pub change_percent: f64,
}

/// A tradable symbol as listed by a universe or sector query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub market_cap: Option<f64>,
}

impl StockInfo {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            market_cap: None,
        }
    }
}
