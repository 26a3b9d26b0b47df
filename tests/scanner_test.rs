//! Scan orchestration tests against fixture sources and in-memory SQLite.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;
use squeeze_scanner::error::{AppError, ScanError};
use squeeze_scanner::services::scanner::STALE_SCAN_ERROR;
use squeeze_scanner::services::{ResultStore, ScanService, ScannerOptions, SqliteStore};
use squeeze_scanner::types::*;

fn all_mode() -> ScanParams {
    ScanParams {
        mode: ScanMode::All,
        ..Default::default()
    }
}

fn five_symbol_universe() -> FixtureSource {
    FixtureSource::default()
        .with_symbol("000001", coil_bars())
        .with_symbol("000002", coil_bars())
        .with_broken("000003")
        .with_symbol("000004", coil_bars()[..3].to_vec())
        .with_symbol("000005", coil_bars())
}

#[tokio::test]
async fn test_failed_and_short_symbols_are_skipped() {
    let (scanner, _) = scanner(Arc::new(five_symbol_universe()), 4);

    let id = scanner.start_scan(all_mode()).unwrap();
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.status, ScanStatus::Completed);
    assert_eq!(record.error, None);
    assert_eq!(record.progress.total_symbols, 5);
    assert_eq!(record.progress.processed, 5);
    assert_eq!(record.progress.matched, 3);
    assert_eq!(record.progress.skipped, 1);
    assert_eq!(record.progress.failed, 1);
    assert_eq!(record.progress.percent(), 100);

    let results = scanner.get_scan_results(id).unwrap();
    let symbols: Vec<&str> = results.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["000001", "000002", "000005"]);

    for result in &results {
        assert_eq!(result.scan_id, id);
        assert_eq!(result.squeeze_days, 12);
        assert!(result.score.total <= 100.0);
        assert_eq!(result.sector, None);
    }
}

#[tokio::test]
async fn test_sequential_and_parallel_agree() {
    let source = Arc::new(five_symbol_universe());
    let (sequential, _) = scanner(source.clone(), 1);
    let (parallel, _) = scanner(source, 8);

    let a = sequential.start_scan(all_mode()).unwrap();
    let b = parallel.start_scan(all_mode()).unwrap();
    wait_for_terminal(&sequential, a).await;
    wait_for_terminal(&parallel, b).await;

    let scores = |results: Vec<ScanResult>| {
        results
            .into_iter()
            .map(|r| (r.symbol, r.score, r.details))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        scores(sequential.get_scan_results(a).unwrap()),
        scores(parallel.get_scan_results(b).unwrap())
    );
}

#[tokio::test]
async fn test_results_ranked_by_total_then_symbol() {
    let source = FixtureSource::default()
        .with_symbol("600001", coil_bars())
        .with_symbol("000009", coil_bars())
        .with_symbol("300001", coil_with_volume(3.0));
    let (scanner, _) = scanner(Arc::new(source), 3);

    let id = scanner.start_scan(all_mode()).unwrap();
    wait_for_terminal(&scanner, id).await;

    let results = scanner.get_scan_results(id).unwrap();
    let symbols: Vec<&str> = results.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["300001", "000009", "600001"]);
    assert!(results[0].score.total > results[1].score.total);
    assert_eq!(results[1].score.total, results[2].score.total);
    assert!(results[0]
        .tags
        .iter()
        .any(|t| t == "volume_up" || t == "volume_price_up"));
}

#[tokio::test]
async fn test_min_squeeze_days_filters_results() {
    let (scanner, _) = scanner(Arc::new(five_symbol_universe()), 2);

    let params = ScanParams {
        min_squeeze_days: 13,
        ..all_mode()
    };
    let id = scanner.start_scan(params).unwrap();
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.status, ScanStatus::Completed);
    assert_eq!(record.progress.matched, 0);
    assert_eq!(record.progress.skipped, 4);
    assert!(scanner.get_scan_results(id).unwrap().is_empty());
}

#[tokio::test]
async fn test_breakout_symbol_has_no_streak() {
    let source = FixtureSource::default()
        .with_symbol("000001", coil_bars())
        .with_symbol("000002", coil_then_breakout());
    let (scanner, _) = scanner(Arc::new(source), 2);

    let id = scanner.start_scan(all_mode()).unwrap();
    wait_for_terminal(&scanner, id).await;

    let symbols: Vec<String> = scanner
        .get_scan_results(id)
        .unwrap()
        .into_iter()
        .map(|r| r.symbol)
        .collect();
    assert_eq!(symbols, vec!["000001"]);
}

#[tokio::test]
async fn test_hot_mode_dedupes_and_tags_leaders() {
    let stock = |code: &str, market_cap: Option<f64>| StockInfo {
        market_cap,
        ..StockInfo::new(code, format!("Stock {}", code))
    };
    let mut source = FixtureSource::default()
        .with_sector(
            "Chips",
            3.2,
            vec![
                stock("000001", Some(100.0)),
                stock("000002", Some(50.0)),
                stock("000003", Some(10.0)),
                stock("000004", Some(5.0)),
            ],
        )
        .with_sector("Power", 2.1, vec![stock("000002", Some(50.0)), stock("000005", None)])
        .with_sector("Banks", 0.4, vec![stock("600000", Some(1.0))]);
    for code in ["000001", "000002", "000003", "000004", "000005", "600000"] {
        source.bars.insert(code.to_string(), coil_bars());
    }
    let (scanner, _) = scanner(Arc::new(source), 4);

    let params = ScanParams {
        sectors: 2,
        ..Default::default()
    };
    let id = scanner.start_scan(params).unwrap();
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.status, ScanStatus::Completed);
    assert_eq!(record.progress.total_symbols, 5);
    let sector_names: Vec<&str> = record.hot_sectors.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(sector_names, vec!["Chips", "Power"]);

    let results = scanner.get_scan_results(id).unwrap();
    assert_eq!(results.len(), 5);
    let by_symbol = |code: &str| results.iter().find(|r| r.symbol == code).unwrap();

    assert_eq!(by_symbol("000002").sector.as_deref(), Some("Chips"));
    assert_eq!(by_symbol("000005").sector.as_deref(), Some("Power"));
    assert!(by_symbol("000001").tags.contains(&"leader#1".to_string()));
    assert!(by_symbol("000002").tags.contains(&"leader#2".to_string()));
    assert!(by_symbol("000003").tags.contains(&"leader#3".to_string()));
    assert!(!by_symbol("000004").tags.iter().any(|t| t.starts_with("leader#")));
    assert!(!by_symbol("000005").tags.iter().any(|t| t.starts_with("leader#")));
}

#[tokio::test]
async fn test_universe_failure_fails_scan() {
    let source = Arc::new(FixtureSource {
        rankings_down: true,
        ..five_symbol_universe()
    });
    let (scanner, _) = scanner(source.clone(), 2);

    let id = scanner.start_scan(ScanParams::default()).unwrap();
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.status, ScanStatus::Failed);
    assert!(record.error.unwrap().contains("sector board unavailable"));
    assert_eq!(record.progress.processed, 0);
    assert!(scanner.get_scan_results(id).unwrap().is_empty());
    assert_eq!(source.total_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_constituent_failure_fails_scan() {
    let source = FixtureSource {
        constituents_down: true,
        ..FixtureSource::default().with_sector("Chips", 1.0, Vec::new())
    };
    let (scanner, _) = scanner(Arc::new(source), 2);

    let id = scanner.start_scan(ScanParams::default()).unwrap();
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.status, ScanStatus::Failed);
    assert!(record.error.unwrap().contains("no members for Chips"));
}

#[tokio::test]
async fn test_invalid_params_rejected_before_record() {
    let (scanner, store) = scanner(Arc::new(FixtureSource::default()), 2);

    let params = ScanParams {
        ma_short: 10,
        ma_long: 5,
        ..Default::default()
    };
    let err = scanner.start_scan(params).unwrap_err();
    assert!(matches!(err, AppError::Scan(ScanError::InvalidParams(_))));
    assert!(store.list_scans(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_scan() {
    let (scanner, _) = scanner(Arc::new(five_symbol_universe()), 2);

    let keep = scanner.start_scan(all_mode()).unwrap();
    let gone = scanner.start_scan(all_mode()).unwrap();
    wait_for_terminal(&scanner, keep).await;
    wait_for_terminal(&scanner, gone).await;

    scanner.delete_scan(gone).unwrap();

    assert!(matches!(scanner.get_scan_results(gone), Err(AppError::NotFound(_))));
    assert!(matches!(scanner.get_scan_status(gone), Err(AppError::NotFound(_))));
    assert!(matches!(scanner.delete_scan(gone), Err(AppError::NotFound(_))));

    let ids: Vec<i64> = scanner.list_scans(10).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![keep]);
    assert_eq!(scanner.get_scan_results(keep).unwrap().len(), 3);

    assert_eq!(scanner.delete_all_scans().unwrap(), 1);
    assert!(scanner.list_scans(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_running_scan() {
    let mut source = FixtureSource {
        fetch_delay: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    for i in 0..30 {
        source = source.with_symbol(&format!("{:06}", i + 1), coil_bars());
    }
    let (scanner, _) = scanner(Arc::new(source), 1);

    let id = scanner.start_scan(all_mode()).unwrap();
    assert!(scanner.cancel_scan(id).unwrap());
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.status, ScanStatus::Cancelled);
    assert!(record.progress.processed < 30);
    assert_eq!(scanner.get_scan_results(id).unwrap().len(), record.progress.matched);

    // Already terminal
    assert!(!scanner.cancel_scan(id).unwrap());
    assert!(matches!(scanner.cancel_scan(id + 100), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_limit_truncates_universe() {
    let (scanner, _) = scanner(Arc::new(five_symbol_universe()), 2);

    let params = ScanParams {
        limit: Some(2),
        ..all_mode()
    };
    let id = scanner.start_scan(params).unwrap();
    let record = wait_for_terminal(&scanner, id).await;

    assert_eq!(record.progress.total_symbols, 2);
    assert_eq!(record.progress.matched, 2);
}

#[tokio::test]
async fn test_stale_running_scan_reclassified() {
    let (scanner, store) = scanner(Arc::new(FixtureSource::default()), 2);

    let three_hours_ago = Utc::now().timestamp_millis() - 3 * 60 * 60 * 1000;
    let stale = store.create_scan(&ScanParams::default(), three_hours_ago).unwrap();
    let fresh = store
        .create_scan(&ScanParams::default(), Utc::now().timestamp_millis())
        .unwrap();

    let record = scanner.get_scan_status(stale).unwrap();
    assert_eq!(record.status, ScanStatus::Failed);
    assert_eq!(record.error.as_deref(), Some(STALE_SCAN_ERROR));
    assert_eq!(store.get_scan(stale).unwrap().unwrap().status, ScanStatus::Failed);

    assert_eq!(scanner.get_scan_status(fresh).unwrap().status, ScanStatus::Running);
}

#[tokio::test]
async fn test_latest_completed() {
    let source = FixtureSource {
        rankings_down: true,
        ..five_symbol_universe()
    };
    let (scanner, _) = scanner(Arc::new(source), 2);

    assert!(scanner.latest_completed().unwrap().is_none());

    let done = scanner.start_scan(all_mode()).unwrap();
    wait_for_terminal(&scanner, done).await;
    let failed = scanner.start_scan(ScanParams::default()).unwrap();
    wait_for_terminal(&scanner, failed).await;

    assert_eq!(scanner.latest_completed().unwrap().map(|r| r.id), Some(done));
}

#[tokio::test]
async fn test_bar_cache_reused_across_scans() {
    let source = Arc::new(five_symbol_universe());
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let options = ScannerOptions {
        bar_cache_enabled: true,
        ..fast_options(2)
    };
    let scanner = Arc::new(ScanService::new(source.clone(), store, options));

    for _ in 0..2 {
        let id = scanner.start_scan(all_mode()).unwrap();
        wait_for_terminal(&scanner, id).await;
    }

    assert_eq!(source.fetches_of("000001"), 1);
    // Failed fetches are not cached
    assert_eq!(source.fetches_of("000003"), 2);
}

#[tokio::test]
async fn test_analyze_symbol_chart() {
    let source = FixtureSource::default()
        .with_symbol("000001", coil_then_breakout())
        .with_symbol("000002", coil_bars()[..3].to_vec());
    let (scanner, _) = scanner(Arc::new(source), 1);

    let chart = scanner
        .analyze_symbol("000001", &ScanParams::default())
        .await
        .unwrap();
    assert_eq!(chart.symbol, "000001");
    assert_eq!(chart.candles.len(), 60);
    assert_eq!(chart.dates.len(), 60);
    assert_eq!(chart.bb_upper.len(), 60);
    assert_eq!(chart.bandwidth_ma_long.len(), 60);
    assert!(chart.bb_mid[18].is_none());
    assert!(chart.bb_mid[19].is_some());
    let squeeze = chart.squeeze.unwrap();
    assert_eq!(squeeze.consecutive_days, 0);
    assert!(!squeeze.is_contracting);

    let err = scanner
        .analyze_symbol("000002", &ScanParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Scan(ScanError::InsufficientHistory { .. })));
}
