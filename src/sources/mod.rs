//! Market data collaborators.
//!
//! The scanner only sees [`MarketDataSource`]; tests substitute fixtures for
//! the live HTTP client.

pub mod eastmoney;
pub mod resilient;

pub use eastmoney::EastmoneyClient;
pub use resilient::ResilientSource;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::types::{Bar, SectorRanking, StockInfo};

/// Source of daily bars, sector rankings and symbol universes.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Daily bars covering the last `lookback_days` calendar days, oldest first.
    async fn fetch_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Bar>, ScanError>;

    /// Top `top_n` sectors by recent change percent, strongest first.
    async fn fetch_sector_rankings(&self, top_n: usize) -> Result<Vec<SectorRanking>, ScanError>;

    /// Constituent symbols of a sector.
    async fn fetch_sector_constituents(&self, sector_name: &str) -> Result<Vec<StockInfo>, ScanError>;

    /// Every tradable symbol.
    async fn fetch_full_universe(&self) -> Result<Vec<StockInfo>, ScanError>;
}
