//! Eastmoney public quote API client.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use dashmap::DashMap;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::MarketDataSource;
use crate::error::ScanError;
use crate::types::{Bar, SectorRanking, StockInfo};

pub const DEFAULT_QUOTE_URL: &str = "https://push2.eastmoney.com";
pub const DEFAULT_KLINE_URL: &str = "https://push2his.eastmoney.com";

/// Industry boards.
const SECTOR_FILTER: &str = "m:90+t:2+f:!50";
/// Shanghai and Shenzhen A-shares including STAR and ChiNext.
const UNIVERSE_FILTER: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048";
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 100;

/// Eastmoney REST client.
#[derive(Clone)]
pub struct EastmoneyClient {
    client: Client,
    quote_url: String,
    kline_url: String,
    /// Sector name to board code, filled by ranking queries.
    sector_codes: std::sync::Arc<DashMap<String, String>>,
}

impl EastmoneyClient {
    /// Create a new Eastmoney client.
    pub fn new(quote_url: impl Into<String>, kline_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (squeeze-scanner)")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            quote_url: quote_url.into().trim_end_matches('/').to_string(),
            kline_url: kline_url.into().trim_end_matches('/').to_string(),
            sector_codes: Default::default(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Invalid JSON: {}", e))
    }

    /// One page of a `clist` listing.
    async fn clist_page(
        &self,
        filter: &str,
        fields: &str,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Value>, usize), String> {
        let url = format!(
            "{}/api/qt/clist/get?pn={}&pz={}&po=1&np=1&fltt=2&invt=2&fid=f3&fs={}&fields={}",
            self.quote_url, page, page_size, filter, fields
        );
        let body = self.get_json(&url).await?;
        Ok(parse_clist(&body))
    }

    /// Walk every page of a `clist` listing.
    async fn clist_all(&self, filter: &str, fields: &str) -> Result<Vec<Value>, String> {
        let mut rows = Vec::new();
        for page in 1..=MAX_PAGES {
            let (batch, total) = self.clist_page(filter, fields, page, PAGE_SIZE).await?;
            let fetched = batch.len();
            rows.extend(batch);
            if fetched < PAGE_SIZE || rows.len() >= total {
                break;
            }
        }
        Ok(rows)
    }

    async fn sector_code(&self, sector_name: &str) -> Result<String, ScanError> {
        if let Some(code) = self.sector_codes.get(sector_name) {
            return Ok(code.clone());
        }

        // Not seen in a ranking yet; list every board once
        let rows = self
            .clist_all(SECTOR_FILTER, "f12,f14,f3")
            .await
            .map_err(ScanError::UniverseResolution)?;
        for sector in rows.iter().filter_map(parse_sector) {
            self.sector_codes.insert(sector.name.clone(), sector.code.clone());
        }

        self.sector_codes
            .get(sector_name)
            .map(|c| c.clone())
            .ok_or_else(|| ScanError::UniverseResolution(format!("Unknown sector: {}", sector_name)))
    }
}

#[async_trait]
impl MarketDataSource for EastmoneyClient {
    fn name(&self) -> &str {
        "eastmoney"
    }

    async fn fetch_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Bar>, ScanError> {
        let end = Local::now().date_naive();
        let begin = end - Duration::days(lookback_days as i64);
        let url = format!(
            "{}/api/qt/stock/kline/get?secid={}.{}&klt=101&fqt=1&fields1=f1,f2,f3,f4,f5,f6&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61&beg={}&end={}",
            self.kline_url,
            market_id(symbol),
            symbol,
            begin.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );

        let unavailable = |reason: String| ScanError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let body = self.get_json(&url).await.map_err(unavailable)?;
        let lines = body["data"]["klines"]
            .as_array()
            .ok_or_else(|| unavailable("empty kline payload".to_string()))?;

        let bars: Vec<Bar> = lines
            .iter()
            .filter_map(|l| l.as_str())
            .filter_map(parse_kline)
            .collect();

        debug!("Fetched {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    async fn fetch_sector_rankings(&self, top_n: usize) -> Result<Vec<SectorRanking>, ScanError> {
        let (rows, _) = self
            .clist_page(SECTOR_FILTER, "f12,f14,f3", 1, top_n.max(1))
            .await
            .map_err(ScanError::UniverseResolution)?;

        let mut sectors: Vec<SectorRanking> = rows.iter().filter_map(parse_sector).collect();
        for sector in &sectors {
            self.sector_codes.insert(sector.name.clone(), sector.code.clone());
        }

        sectors.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
        sectors.truncate(top_n);
        info!("Resolved {} hot sectors", sectors.len());
        Ok(sectors)
    }

    async fn fetch_sector_constituents(&self, sector_name: &str) -> Result<Vec<StockInfo>, ScanError> {
        let code = self.sector_code(sector_name).await?;
        let rows = self
            .clist_all(&format!("b:{}+f:!50", code), "f12,f14,f20")
            .await
            .map_err(ScanError::UniverseResolution)?;
        Ok(rows.iter().filter_map(parse_stock).collect())
    }

    async fn fetch_full_universe(&self) -> Result<Vec<StockInfo>, ScanError> {
        let rows = self
            .clist_all(UNIVERSE_FILTER, "f12,f14,f20")
            .await
            .map_err(ScanError::UniverseResolution)?;
        let stocks: Vec<StockInfo> = rows.iter().filter_map(parse_stock).collect();
        info!("Resolved {} symbols in the full universe", stocks.len());
        Ok(stocks)
    }
}

/// Exchange prefix of a `secid`: 1 for Shanghai, 0 for Shenzhen.
pub fn market_id(code: &str) -> u8 {
    if code.starts_with('6') || code.starts_with('9') {
        1
    } else {
        0
    }
}

/// Parse one kline row:
/// `date,open,close,high,low,volume,amount,amplitude,change%,change,turnover`.
pub fn parse_kline(line: &str) -> Option<Bar> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        return None;
    }
    let num = |i: usize| {
        parts
            .get(i)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };

    Some(Bar {
        date: NaiveDate::parse_from_str(parts[0].trim(), "%Y-%m-%d").ok()?,
        open: num(1)?,
        close: num(2)?,
        high: num(3)?,
        low: num(4)?,
        volume: num(5)?,
        amount: num(6).unwrap_or(0.0),
        turnover_rate: num(10),
    })
}

/// Rows and reported total of a `clist` response.
fn parse_clist(body: &Value) -> (Vec<Value>, usize) {
    let data = &body["data"];
    let total = data["total"].as_u64().unwrap_or(0) as usize;
    let rows = match &data["diff"] {
        Value::Array(rows) => rows.clone(),
        // np=0 returns an object keyed by index
        Value::Object(map) => map.values().cloned().collect(),
        _ => Vec::new(),
    };
    (rows, total)
}

/// Numeric field; "-" marks a missing quote.
fn field_f64(row: &Value, key: &str) -> Option<f64> {
    match &row[key] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn field_str(row: &Value, key: &str) -> Option<String> {
    match &row[key] {
        Value::String(s) if !s.is_empty() && s != "-" => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_sector(row: &Value) -> Option<SectorRanking> {
    Some(SectorRanking {
        code: field_str(row, "f12")?,
        name: field_str(row, "f14")?,
        change_percent: field_f64(row, "f3").unwrap_or(0.0),
    })
}

fn parse_stock(row: &Value) -> Option<StockInfo> {
    Some(StockInfo {
        code: field_str(row, "f12")?,
        name: field_str(row, "f14")?,
        market_cap: field_f64(row, "f20"),
    })
}
