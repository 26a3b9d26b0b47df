//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as Days, NaiveDate};
use dashmap::DashMap;
use squeeze_scanner::error::ScanError;
use squeeze_scanner::services::{RetryPolicy, ScanService, ScannerOptions, SqliteStore};
use squeeze_scanner::sources::MarketDataSource;
use squeeze_scanner::types::{Bar, ScanRecord, SectorRanking, StockInfo};

/// Deterministic in-memory market data.
#[derive(Default)]
pub struct FixtureSource {
    pub bars: HashMap<String, Vec<Bar>>,
    /// Symbols whose bar fetch fails.
    pub broken: Vec<String>,
    pub sectors: Vec<SectorRanking>,
    pub constituents: HashMap<String, Vec<StockInfo>>,
    pub universe: Vec<StockInfo>,
    pub rankings_down: bool,
    pub constituents_down: bool,
    /// Delay per bar fetch.
    pub fetch_delay: Option<Duration>,
    pub bar_fetches: DashMap<String, usize>,
    pub total_fetches: AtomicUsize,
}

impl FixtureSource {
    pub fn with_symbol(mut self, code: &str, bars: Vec<Bar>) -> Self {
        self.universe.push(StockInfo::new(code, format!("Stock {}", code)));
        self.bars.insert(code.to_string(), bars);
        self
    }

    pub fn with_broken(mut self, code: &str) -> Self {
        self.universe.push(StockInfo::new(code, format!("Stock {}", code)));
        self.broken.push(code.to_string());
        self
    }

    pub fn with_sector(mut self, name: &str, change_percent: f64, members: Vec<StockInfo>) -> Self {
        self.sectors.push(SectorRanking {
            name: name.to_string(),
            code: String::new(),
            change_percent,
        });
        self.constituents.insert(name.to_string(), members);
        self
    }

    pub fn fetches_of(&self, code: &str) -> usize {
        self.bar_fetches.get(code).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl MarketDataSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch_daily_bars(&self, symbol: &str, _lookback_days: u32) -> Result<Vec<Bar>, ScanError> {
        *self.bar_fetches.entry(symbol.to_string()).or_insert(0) += 1;
        self.total_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        if self.broken.iter().any(|b| b == symbol) {
            return Err(ScanError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "upstream returned no data".to_string(),
            });
        }
        Ok(self.bars.get(symbol).cloned().unwrap_or_default())
    }

    async fn fetch_sector_rankings(&self, top_n: usize) -> Result<Vec<SectorRanking>, ScanError> {
        if self.rankings_down {
            return Err(ScanError::UniverseResolution("sector board unavailable".to_string()));
        }
        Ok(self.sectors.iter().take(top_n).cloned().collect())
    }

    async fn fetch_sector_constituents(&self, sector_name: &str) -> Result<Vec<StockInfo>, ScanError> {
        if self.constituents_down {
            return Err(ScanError::UniverseResolution(format!("no members for {}", sector_name)));
        }
        Ok(self.constituents.get(sector_name).cloned().unwrap_or_default())
    }

    async fn fetch_full_universe(&self) -> Result<Vec<StockInfo>, ScanError> {
        Ok(self.universe.clone())
    }
}

pub fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::days(offset as i64)
}

fn bar(i: usize, close: f64, volume: f64) -> Bar {
    Bar::new(day(i), close, close + 0.5, close - 0.5, close, volume)
}

/// 40 bars of a damped oscillation; band-width shrinks every bar once defined,
/// leaving a 12-bar contraction streak at the end.
pub fn coil_bars() -> Vec<Bar> {
    (0..40)
        .map(|i| bar(i, 100.0 + 2.0 * (-0.8f64).powi(i as i32), 10_000.0))
        .collect()
}

/// The coil followed by 20 bars rising one point a day.
pub fn coil_then_breakout() -> Vec<Bar> {
    let mut bars = coil_bars();
    bars.extend((40..60).map(|i| bar(i, 100.0 + (i - 39) as f64, 10_000.0)));
    bars
}

/// The coil with the last bar trading `factor` times the usual volume.
pub fn coil_with_volume(factor: f64) -> Vec<Bar> {
    let mut bars = coil_bars();
    if let Some(last) = bars.last_mut() {
        last.volume *= factor;
        last.amount = last.close * last.volume;
    }
    bars
}

pub fn fast_options(workers: usize) -> ScannerOptions {
    ScannerOptions {
        workers,
        lookback_days: 120,
        stale_scan_minutes: 120,
        bar_cache_enabled: false,
        finalize_retry: RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_backoff_ms: 5,
        },
    }
}

pub fn scanner(source: Arc<FixtureSource>, workers: usize) -> (Arc<ScanService>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let service = ScanService::new(source, store.clone(), fast_options(workers));
    (Arc::new(service), store)
}

/// Poll until the scan leaves `running`.
pub async fn wait_for_terminal(scanner: &ScanService, scan_id: i64) -> ScanRecord {
    for _ in 0..500 {
        let record = scanner.get_scan_status(scan_id).unwrap();
        if record.status.is_terminal() && !scanner.is_running(scan_id) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan {} did not finish", scan_id);
}
