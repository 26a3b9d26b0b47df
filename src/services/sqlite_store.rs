//! SQLite persistence for scan runs and their per-symbol results.
//!
//! Two tables:
//! - `scan_records`: one row per scan with status, parameters and progress counters
//! - `scan_results`: one row per matched symbol, keyed by (scan_id, symbol) and
//!   deleted with its parent record

use crate::error::{AppError, Result, ScanError};
use crate::types::{
    Grade, ResultDetails, ScanParams, ScanProgress, ScanRecord, ScanResult, ScanStatus,
    ScoreBreakdown, SectorRanking,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Durable record of scan runs and their results.
///
/// Result writes for different symbols are independent; implementations must
/// accept them concurrently.
pub trait ResultStore: Send + Sync {
    /// Create a `running` record and return its id.
    fn create_scan(&self, params: &ScanParams, start_time: i64) -> Result<i64>;

    fn update_progress(&self, scan_id: i64, progress: &ScanProgress) -> Result<()>;

    fn save_hot_sectors(&self, scan_id: i64, sectors: &[SectorRanking]) -> Result<()>;

    /// Move a record to a terminal status.
    fn finalize_scan(
        &self,
        scan_id: i64,
        status: ScanStatus,
        error: Option<&str>,
        progress: &ScanProgress,
        finished_at: i64,
    ) -> Result<()>;

    /// Write one result; the parent record must exist.
    fn save_result(&self, result: &ScanResult) -> Result<()>;

    fn get_scan(&self, scan_id: i64) -> Result<Option<ScanRecord>>;

    /// Results ranked by total descending, then symbol ascending.
    fn get_results(&self, scan_id: i64) -> Result<Vec<ScanResult>>;

    /// Most recent first.
    fn list_scans(&self, limit: usize) -> Result<Vec<ScanRecord>>;

    fn latest_completed(&self) -> Result<Option<ScanRecord>>;

    /// Delete a record and its results. `false` when the id is unknown.
    fn delete_scan(&self, scan_id: i64) -> Result<bool>;

    /// Delete every record, returning how many were removed.
    fn delete_all_scans(&self) -> Result<usize>;
}

const RECORD_COLUMNS: &str = "id, start_time, finished_at, status, params_json, error, hot_sectors_json,
     total_symbols, processed, matched, skipped, failed, stage";

const RESULT_COLUMNS: &str = "scan_id, symbol, name, sector, squeeze_score, trend_score, momentum_score,
     position_score, popularity_score, total, grade, bandwidth_pct, squeeze_days, volume_ratio,
     change_pct, details_json, tags_json";

/// SQLite store for scan history.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ScanError::Persistence(format!("Cannot create data dir: {}", e)))?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScanError::Persistence("SQLite connection lock poisoned".to_string()).into())
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS scan_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time INTEGER NOT NULL,
                finished_at INTEGER,
                status TEXT NOT NULL,
                params_json TEXT NOT NULL DEFAULT '{}',
                error TEXT,
                hot_sectors_json TEXT NOT NULL DEFAULT '[]',
                total_symbols INTEGER NOT NULL DEFAULT 0,
                processed INTEGER NOT NULL DEFAULT 0,
                matched INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                stage TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_scan_records_start ON scan_records(start_time DESC);

            CREATE TABLE IF NOT EXISTS scan_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id INTEGER NOT NULL REFERENCES scan_records(id) ON DELETE CASCADE,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                sector TEXT,
                squeeze_score REAL NOT NULL,
                trend_score REAL NOT NULL,
                momentum_score REAL NOT NULL,
                position_score REAL NOT NULL,
                popularity_score REAL NOT NULL,
                total REAL NOT NULL,
                grade TEXT NOT NULL,
                bandwidth_pct REAL NOT NULL,
                squeeze_days INTEGER NOT NULL,
                volume_ratio REAL,
                change_pct REAL NOT NULL,
                details_json TEXT NOT NULL DEFAULT '{}',
                tags_json TEXT NOT NULL DEFAULT '[]',
                UNIQUE(scan_id, symbol)
            );

            CREATE INDEX IF NOT EXISTS idx_scan_results_rank ON scan_results(scan_id, total DESC);",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }
}

impl ResultStore for SqliteStore {
    fn create_scan(&self, params: &ScanParams, start_time: i64) -> Result<i64> {
        let params_json = serde_json::to_string(params)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scan_records (start_time, status, params_json, stage)
             VALUES (?1, ?2, ?3, 'starting')",
            params![start_time, ScanStatus::Running.as_str(), params_json],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created scan record {}", id);
        Ok(id)
    }

    fn update_progress(&self, scan_id: i64, progress: &ScanProgress) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE scan_records
             SET total_symbols = ?2, processed = ?3, matched = ?4, skipped = ?5, failed = ?6, stage = ?7
             WHERE id = ?1",
            params![
                scan_id,
                progress.total_symbols as i64,
                progress.processed as i64,
                progress.matched as i64,
                progress.skipped as i64,
                progress.failed as i64,
                progress.stage,
            ],
        )?;
        Ok(())
    }

    fn save_hot_sectors(&self, scan_id: i64, sectors: &[SectorRanking]) -> Result<()> {
        let json = serde_json::to_string(sectors)?;
        let conn = self.conn()?;
        conn.execute(
            "UPDATE scan_records SET hot_sectors_json = ?2 WHERE id = ?1",
            params![scan_id, json],
        )?;
        Ok(())
    }

    fn finalize_scan(
        &self,
        scan_id: i64,
        status: ScanStatus,
        error: Option<&str>,
        progress: &ScanProgress,
        finished_at: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE scan_records
             SET status = ?2, error = ?3, finished_at = ?4, total_symbols = ?5, processed = ?6,
                 matched = ?7, skipped = ?8, failed = ?9, stage = ?10
             WHERE id = ?1",
            params![
                scan_id,
                status.as_str(),
                error,
                finished_at,
                progress.total_symbols as i64,
                progress.processed as i64,
                progress.matched as i64,
                progress.skipped as i64,
                progress.failed as i64,
                progress.stage,
            ],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("Scan {} not found", scan_id)));
        }
        Ok(())
    }

    fn save_result(&self, result: &ScanResult) -> Result<()> {
        let details_json = serde_json::to_string(&result.details)?;
        let tags_json = serde_json::to_string(&result.tags)?;
        let score = &result.score;

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO scan_results ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                RESULT_COLUMNS
            ),
            params![
                result.scan_id,
                result.symbol,
                result.name,
                result.sector,
                score.squeeze_score,
                score.trend_score,
                score.momentum_score,
                score.position_score,
                score.popularity_score,
                score.total,
                score.grade.as_str(),
                result.bandwidth_pct,
                result.squeeze_days as i64,
                result.volume_ratio,
                result.change_pct,
                details_json,
                tags_json,
            ],
        )?;
        Ok(())
    }

    fn get_scan(&self, scan_id: i64) -> Result<Option<ScanRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM scan_records WHERE id = ?1", RECORD_COLUMNS),
                params![scan_id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn get_results(&self, scan_id: i64) -> Result<Vec<ScanResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scan_results WHERE scan_id = ?1 ORDER BY total DESC, symbol ASC",
            RESULT_COLUMNS
        ))?;
        let results = stmt
            .query_map(params![scan_id], result_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn list_scans(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scan_records ORDER BY start_time DESC, id DESC LIMIT ?1",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![limit as i64], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn latest_completed(&self) -> Result<Option<ScanRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM scan_records WHERE status = ?1
                     ORDER BY start_time DESC, id DESC LIMIT 1",
                    RECORD_COLUMNS
                ),
                params![ScanStatus::Completed.as_str()],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn delete_scan(&self, scan_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM scan_records WHERE id = ?1", params![scan_id])?;
        if deleted > 0 {
            info!("Deleted scan {}", scan_id);
        }
        Ok(deleted > 0)
    }

    fn delete_all_scans(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM scan_records", [])?;
        info!("Deleted {} scans", deleted);
        Ok(deleted)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScanRecord> {
    let status: String = row.get(3)?;
    let params_json: String = row.get(4)?;
    let sectors_json: String = row.get(6)?;

    Ok(ScanRecord {
        id: row.get(0)?,
        start_time: row.get(1)?,
        finished_at: row.get(2)?,
        status: ScanStatus::from_str(&status).unwrap_or(ScanStatus::Failed),
        params: serde_json::from_str(&params_json).unwrap_or_default(),
        error: row.get(5)?,
        hot_sectors: serde_json::from_str(&sectors_json).unwrap_or_default(),
        progress: ScanProgress {
            total_symbols: row.get::<_, i64>(7)? as usize,
            processed: row.get::<_, i64>(8)? as usize,
            matched: row.get::<_, i64>(9)? as usize,
            skipped: row.get::<_, i64>(10)? as usize,
            failed: row.get::<_, i64>(11)? as usize,
            stage: row.get(12)?,
        },
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ScanResult> {
    let total: f64 = row.get(9)?;
    let grade: String = row.get(10)?;
    let details_json: String = row.get(15)?;
    let tags_json: String = row.get(16)?;

    Ok(ScanResult {
        scan_id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        sector: row.get(3)?,
        score: ScoreBreakdown {
            squeeze_score: row.get(4)?,
            trend_score: row.get(5)?,
            momentum_score: row.get(6)?,
            position_score: row.get(7)?,
            popularity_score: row.get(8)?,
            total,
            grade: Grade::from_str(&grade).unwrap_or_else(|| Grade::from_total(total)),
        },
        bandwidth_pct: row.get(11)?,
        squeeze_days: row.get::<_, i64>(12)? as usize,
        volume_ratio: row.get(13)?,
        change_pct: row.get(14)?,
        details: serde_json::from_str::<ResultDetails>(&details_json).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
    })
}
