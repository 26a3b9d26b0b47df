//! Retrying wrapper around a market data source.

use std::sync::Arc;

use async_trait::async_trait;

use super::MarketDataSource;
use crate::error::ScanError;
use crate::services::retry::RetryPolicy;
use crate::types::{Bar, SectorRanking, StockInfo};

/// A source that retries every call of an inner source with exponential backoff.
///
/// Transient network-class errors wait twice the normal delay; the last
/// error is returned once the retries are spent.
pub struct ResilientSource {
    inner: Arc<dyn MarketDataSource>,
    policy: RetryPolicy,
}

impl ResilientSource {
    pub fn new(inner: Arc<dyn MarketDataSource>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl MarketDataSource for ResilientSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Bar>, ScanError> {
        let inner = &self.inner;
        self.policy
            .run("fetch_daily_bars", move || async move {
                inner.fetch_daily_bars(symbol, lookback_days).await
            })
            .await
    }

    async fn fetch_sector_rankings(&self, top_n: usize) -> Result<Vec<SectorRanking>, ScanError> {
        let inner = &self.inner;
        self.policy
            .run("fetch_sector_rankings", move || async move {
                inner.fetch_sector_rankings(top_n).await
            })
            .await
    }

    async fn fetch_sector_constituents(&self, sector_name: &str) -> Result<Vec<StockInfo>, ScanError> {
        let inner = &self.inner;
        self.policy
            .run("fetch_sector_constituents", move || async move {
                inner.fetch_sector_constituents(sector_name).await
            })
            .await
    }

    async fn fetch_full_universe(&self) -> Result<Vec<StockInfo>, ScanError> {
        let inner = &self.inner;
        self.policy
            .run("fetch_full_universe", move || async move { inner.fetch_full_universe().await })
            .await
    }
}
