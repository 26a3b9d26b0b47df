//! Scan orchestration.
//!
//! A scan resolves its symbol universe, then pushes every symbol through the
//! signal pipeline on a bounded worker pool. Matches are written to the store
//! as soon as they are scored, so an interrupted scan keeps a valid partial
//! result set. Progress counters have a single writer: the loop draining
//! the worker pool.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::bar_cache::BarCache;
use super::retry::RetryPolicy;
use super::signals::{self, scoring, SignalConfig, SqueezeDetector};
use super::sqlite_store::ResultStore;
use crate::config::Config;
use crate::error::{AppError, Result, ScanError};
use crate::sources::MarketDataSource;
use crate::types::{
    is_chronological, rank_results, Bar, ChartSeries, ScanMode, ScanParams, ScanProgress,
    ScanRecord, ScanResult, ScanStatus, SectorRanking, StockInfo,
};

/// Bars returned by the chart query.
pub const CHART_BARS: usize = 60;

/// Constituents per sector tagged as leaders, by market cap.
const LEADERS_PER_SECTOR: usize = 3;

/// Error stored on records reclassified as stale.
pub const STALE_SCAN_ERROR: &str = "stale: process interrupted";

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Concurrent symbol pipelines (1 = sequential).
    pub workers: usize,
    /// Calendar days of bars fetched per symbol.
    pub lookback_days: u32,
    /// Minutes before an unowned `running` record reads as failed.
    pub stale_scan_minutes: i64,
    pub bar_cache_enabled: bool,
    /// Retries for the final status write.
    pub finalize_retry: RetryPolicy,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            lookback_days: 120,
            stale_scan_minutes: 120,
            bar_cache_enabled: true,
            finalize_retry: RetryPolicy::default(),
        }
    }
}

impl ScannerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.scan_workers,
            lookback_days: config.fetch.lookback_days,
            stale_scan_minutes: config.stale_scan_minutes,
            bar_cache_enabled: config.fetch.bar_cache_enabled,
            finalize_retry: config.fetch.retry_policy(),
        }
    }
}

/// A symbol queued for scanning.
#[derive(Debug, Clone)]
struct Candidate {
    stock: StockInfo,
    sector: Option<String>,
    leader_rank: Option<usize>,
}

/// What happened to one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolOutcome {
    Matched,
    Skipped,
    Failed,
    Cancelled,
}

/// Runs scans and answers queries about them.
pub struct ScanService {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn ResultStore>,
    cache: Option<BarCache>,
    options: ScannerOptions,
    /// Cancel flags of scans owned by a live task.
    active: DashMap<i64, Arc<AtomicBool>>,
}

impl ScanService {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn ResultStore>,
        options: ScannerOptions,
    ) -> Self {
        Self {
            source,
            store,
            cache: options.bar_cache_enabled.then(BarCache::new),
            options,
            active: DashMap::new(),
        }
    }

    /// Create a `running` record and scan in the background.
    ///
    /// Returns the scan id as soon as the record exists.
    pub fn start_scan(self: &Arc<Self>, params: ScanParams) -> Result<i64> {
        params.validate()?;

        let scan_id = self.store.create_scan(&params, Utc::now().timestamp_millis())?;
        let cancel = Arc::new(AtomicBool::new(false));
        self.active.insert(scan_id, cancel.clone());

        info!(
            "Starting scan {} (mode={}, period={}, min_squeeze_days={})",
            scan_id,
            params.mode.as_str(),
            params.period,
            params.min_squeeze_days
        );

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.execute(scan_id, params, cancel).await;
        });

        Ok(scan_id)
    }

    /// Run a scan to its terminal state and record the outcome.
    async fn execute(&self, scan_id: i64, params: ScanParams, cancel: Arc<AtomicBool>) {
        let mut progress = ScanProgress::default();
        let outcome = self.run(scan_id, &params, &cancel, &mut progress).await;

        let (status, error) = match outcome {
            Ok(()) => (ScanStatus::Completed, None),
            Err(ScanError::Cancelled) => (ScanStatus::Cancelled, None),
            Err(e) => (ScanStatus::Failed, Some(e.to_string())),
        };
        progress.stage = status.as_str().to_string();

        match status {
            ScanStatus::Failed => error!(
                "Scan {} failed: {}",
                scan_id,
                error.as_deref().unwrap_or("unknown error")
            ),
            _ => info!(
                "Scan {} {}: {} processed, {} matched, {} skipped, {} failed",
                scan_id,
                status.as_str(),
                progress.processed,
                progress.matched,
                progress.skipped,
                progress.failed
            ),
        }

        let finished_at = Utc::now().timestamp_millis();
        let store = &self.store;
        let (progress_ref, error_ref) = (&progress, error.as_deref());
        let finalized = self
            .options
            .finalize_retry
            .run("finalize_scan", move || async move {
                store.finalize_scan(scan_id, status, error_ref, progress_ref, finished_at)
            })
            .await;

        if let Err(e) = finalized {
            error!("Could not finalize scan {}: {}", scan_id, e);
        }

        self.active.remove(&scan_id);
    }

    async fn run(
        &self,
        scan_id: i64,
        params: &ScanParams,
        cancel: &AtomicBool,
        progress: &mut ScanProgress,
    ) -> std::result::Result<(), ScanError> {
        progress.stage = "resolving universe".to_string();
        self.report_progress(scan_id, progress);
        if let Some(cache) = &self.cache {
            cache.cleanup();
        }

        let candidates = self.resolve_universe(scan_id, params).await?;
        info!("Scan {} resolved {} symbols", scan_id, candidates.len());

        progress.total_symbols = candidates.len();
        progress.stage = "scanning".to_string();
        self.report_progress(scan_id, progress);

        if cancel.load(Ordering::SeqCst) {
            return Err(ScanError::Cancelled);
        }

        let config = SignalConfig::from(params);
        let pipelines: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                self.process_symbol(scan_id, candidate, &config, params.min_squeeze_days, cancel)
            })
            .collect();
        let mut outcomes = stream::iter(pipelines).buffer_unordered(self.options.workers.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                SymbolOutcome::Matched => progress.matched += 1,
                SymbolOutcome::Skipped => progress.skipped += 1,
                SymbolOutcome::Failed => progress.failed += 1,
                SymbolOutcome::Cancelled => continue,
            }
            progress.processed += 1;
            self.report_progress(scan_id, progress);
        }

        if cancel.load(Ordering::SeqCst) {
            return Err(ScanError::Cancelled);
        }
        Ok(())
    }

    /// Best-effort progress write; a lost update is corrected by the next one.
    fn report_progress(&self, scan_id: i64, progress: &ScanProgress) {
        if let Err(e) = self.store.update_progress(scan_id, progress) {
            warn!("Failed to update progress of scan {}: {}", scan_id, e);
        }
    }

    async fn resolve_universe(
        &self,
        scan_id: i64,
        params: &ScanParams,
    ) -> std::result::Result<Vec<Candidate>, ScanError> {
        let universe_error = |e: ScanError| match e {
            ScanError::UniverseResolution(_) => e,
            other => ScanError::UniverseResolution(other.to_string()),
        };

        let mut candidates = match params.mode {
            ScanMode::Hot => {
                let sectors = self
                    .source
                    .fetch_sector_rankings(params.sectors)
                    .await
                    .map_err(universe_error)?;
                if sectors.is_empty() {
                    return Err(ScanError::UniverseResolution("no sector rankings returned".to_string()));
                }
                info!(
                    "Scan {} hot sectors: {}",
                    scan_id,
                    sectors.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
                );
                if let Err(e) = self.store.save_hot_sectors(scan_id, &sectors) {
                    warn!("Failed to save hot sectors of scan {}: {}", scan_id, e);
                }

                let mut seen = HashSet::new();
                let mut candidates = Vec::new();
                for sector in sectors.iter().take(params.sectors) {
                    let constituents = self
                        .source
                        .fetch_sector_constituents(&sector.name)
                        .await
                        .map_err(universe_error)?;
                    debug!("Sector {} has {} constituents", sector.name, constituents.len());

                    let leaders = leader_ranks(&constituents);
                    for stock in constituents {
                        if !seen.insert(stock.code.clone()) {
                            continue;
                        }
                        candidates.push(Candidate {
                            leader_rank: leaders.iter().position(|c| *c == stock.code).map(|i| i + 1),
                            sector: Some(sector.name.clone()),
                            stock,
                        });
                    }
                }
                candidates
            }
            ScanMode::All => {
                let universe = self.source.fetch_full_universe().await.map_err(universe_error)?;
                let mut seen = HashSet::new();
                universe
                    .into_iter()
                    .filter(|s| seen.insert(s.code.clone()))
                    .map(|stock| Candidate {
                        stock,
                        sector: None,
                        leader_rank: None,
                    })
                    .collect()
            }
        };

        if let Some(limit) = params.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    async fn process_symbol(
        &self,
        scan_id: i64,
        candidate: Candidate,
        config: &SignalConfig,
        min_squeeze_days: usize,
        cancel: &AtomicBool,
    ) -> SymbolOutcome {
        if cancel.load(Ordering::SeqCst) {
            return SymbolOutcome::Cancelled;
        }
        let symbol = candidate.stock.code.as_str();

        let bars = match self.fetch_bars(symbol).await {
            Ok(bars) => bars,
            Err(e) => {
                debug!("Skipping {}: {}", symbol, e);
                return SymbolOutcome::Failed;
            }
        };

        let analysis = match signals::analyze_bars(&bars, config) {
            Ok(Some(analysis)) => analysis,
            Ok(None) => {
                debug!("Skipping {}: squeeze state undefined", symbol);
                return SymbolOutcome::Skipped;
            }
            Err(e) => {
                debug!("Skipping {}: {}", symbol, e);
                return SymbolOutcome::Skipped;
            }
        };

        if analysis.squeeze.consecutive_days < min_squeeze_days {
            return SymbolOutcome::Skipped;
        }

        let tags = scoring::tags(
            &analysis.score,
            &analysis.details,
            analysis.change_pct,
            candidate.leader_rank,
        );
        let result = ScanResult {
            scan_id,
            symbol: candidate.stock.code.clone(),
            name: candidate.stock.name,
            sector: candidate.sector,
            score: analysis.score,
            bandwidth_pct: analysis.bandwidth_pct,
            squeeze_days: analysis.squeeze.consecutive_days,
            volume_ratio: analysis.volume_ratio,
            change_pct: analysis.change_pct,
            details: analysis.details,
            tags,
        };

        match self.store.save_result(&result) {
            Ok(()) => {
                debug!(
                    "Matched {} (total={:.1}, streak={})",
                    result.symbol, result.score.total, result.squeeze_days
                );
                SymbolOutcome::Matched
            }
            Err(e) => {
                warn!("Failed to save result {} for scan {}: {}", result.symbol, scan_id, e);
                SymbolOutcome::Failed
            }
        }
    }

    async fn fetch_bars(&self, symbol: &str) -> std::result::Result<Vec<Bar>, ScanError> {
        let lookback = self.options.lookback_days;
        if let Some(bars) = self.cache.as_ref().and_then(|c| c.get(symbol, lookback)) {
            return Ok(bars);
        }

        let mut bars = self.source.fetch_daily_bars(symbol, lookback).await?;
        if !is_chronological(&bars) {
            bars.sort_by_key(|b| b.date);
            bars.dedup_by_key(|b| b.date);
        }
        if let Some(cache) = &self.cache {
            if !bars.is_empty() {
                cache.insert(symbol, lookback, bars.clone());
            }
        }
        Ok(bars)
    }

    /// Whether a live task owns the scan.
    pub fn is_running(&self, scan_id: i64) -> bool {
        self.active.contains_key(&scan_id)
    }

    pub fn active_scans(&self) -> usize {
        self.active.len()
    }

    /// Ask a running scan to stop after the symbols already in flight.
    ///
    /// `Ok(false)` when the scan exists but is no longer running.
    pub fn cancel_scan(&self, scan_id: i64) -> Result<bool> {
        if let Some(flag) = self.active.get(&scan_id) {
            flag.store(true, Ordering::SeqCst);
            info!("Cancellation requested for scan {}", scan_id);
            return Ok(true);
        }
        match self.store.get_scan(scan_id)? {
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("Scan {} not found", scan_id))),
        }
    }

    pub fn get_scan_status(&self, scan_id: i64) -> Result<ScanRecord> {
        let record = self
            .store
            .get_scan(scan_id)?
            .ok_or_else(|| AppError::NotFound(format!("Scan {} not found", scan_id)))?;
        self.reclassify_if_stale(record)
    }

    pub fn get_scan_results(&self, scan_id: i64) -> Result<Vec<ScanResult>> {
        if self.store.get_scan(scan_id)?.is_none() {
            return Err(AppError::NotFound(format!("Scan {} not found", scan_id)));
        }
        let mut results = self.store.get_results(scan_id)?;
        rank_results(&mut results);
        Ok(results)
    }

    pub fn list_scans(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        self.store
            .list_scans(limit)?
            .into_iter()
            .map(|record| self.reclassify_if_stale(record))
            .collect()
    }

    pub fn latest_completed(&self) -> Result<Option<ScanRecord>> {
        self.store.latest_completed()
    }

    pub fn delete_scan(&self, scan_id: i64) -> Result<()> {
        if let Some(flag) = self.active.get(&scan_id) {
            flag.store(true, Ordering::SeqCst);
        }
        if !self.store.delete_scan(scan_id)? {
            return Err(AppError::NotFound(format!("Scan {} not found", scan_id)));
        }
        Ok(())
    }

    pub fn delete_all_scans(&self) -> Result<usize> {
        for flag in self.active.iter() {
            flag.store(true, Ordering::SeqCst);
        }
        self.store.delete_all_scans()
    }

    /// Top sectors by recent change.
    pub async fn hot_sectors(&self, limit: usize) -> Result<Vec<SectorRanking>> {
        Ok(self.source.fetch_sector_rankings(limit).await?)
    }

    /// Recent candles of one symbol with its bands and band-width averages.
    pub async fn analyze_symbol(&self, code: &str, params: &ScanParams) -> Result<ChartSeries> {
        params.validate()?;
        let bars = self.fetch_bars(code).await?;
        let config = SignalConfig::from(params);
        let series = signals::compute_indicators(&bars, &config)?;

        let detector = SqueezeDetector::new(config.ma_short, config.ma_long);
        let squeeze_series = detector.series(&series.bandwidth_pct);

        Ok(ChartSeries {
            symbol: code.to_string(),
            dates: tail(&series.dates),
            candles: tail(&bars),
            bb_upper: tail(&series.bb_upper),
            bb_mid: tail(&series.bb_mid),
            bb_lower: tail(&series.bb_lower),
            bandwidth_pct: tail(&series.bandwidth_pct),
            bandwidth_ma_short: tail(&squeeze_series.bandwidth_ma_short),
            bandwidth_ma_long: tail(&squeeze_series.bandwidth_ma_long),
            squeeze: detector.detect(&series.bandwidth_pct),
        })
    }

    /// A `running` record that no live task owns and that is older than the
    /// stale threshold is failed on read.
    fn reclassify_if_stale(&self, record: ScanRecord) -> Result<ScanRecord> {
        if record.status != ScanStatus::Running || self.is_running(record.id) {
            return Ok(record);
        }

        let now = Utc::now().timestamp_millis();
        let age_minutes = (now - record.start_time) / 60_000;
        if age_minutes < self.options.stale_scan_minutes {
            return Ok(record);
        }

        warn!("Scan {} stuck in running for {} minutes, marking failed", record.id, age_minutes);
        let mut progress = record.progress.clone();
        progress.stage = ScanStatus::Failed.as_str().to_string();
        self.store
            .finalize_scan(record.id, ScanStatus::Failed, Some(STALE_SCAN_ERROR), &progress, now)?;

        Ok(ScanRecord {
            status: ScanStatus::Failed,
            error: Some(STALE_SCAN_ERROR.to_string()),
            finished_at: Some(now),
            progress,
            ..record
        })
    }
}

/// Codes of the largest constituents by market cap, largest first.
fn leader_ranks(constituents: &[StockInfo]) -> Vec<String> {
    let mut sized: Vec<(&str, f64)> = constituents
        .iter()
        .filter_map(|s| s.market_cap.map(|cap| (s.code.as_str(), cap)))
        .collect();
    sized.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sized
        .into_iter()
        .take(LEADERS_PER_SECTOR)
        .map(|(code, _)| code.to_string())
        .collect()
}

fn tail<T: Clone>(values: &[T]) -> Vec<T> {
    values[values.len().saturating_sub(CHART_BARS)..].to_vec()
}
