use std::env;
use std::str::FromStr;

use crate::services::retry::RetryPolicy;
use crate::sources::eastmoney::{DEFAULT_KLINE_URL, DEFAULT_QUOTE_URL};
use crate::types::ScanParams;

/// Market data fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Quote/listing API base URL.
    pub quote_url: String,
    /// Historical kline API base URL.
    pub kline_url: String,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Calendar days of daily bars fetched per symbol.
    pub lookback_days: u32,
    /// Retries per collaborator call after the first attempt.
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Retry delay cap in milliseconds.
    pub max_backoff_ms: u64,
    /// Reuse fetched bars for the rest of the day.
    pub bar_cache_enabled: bool,
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_delay_ms,
            max_backoff_ms: self.max_backoff_ms,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            quote_url: DEFAULT_QUOTE_URL.to_string(),
            kline_url: DEFAULT_KLINE_URL.to_string(),
            timeout_secs: 15,
            lookback_days: 120,
            max_retries: 5,
            retry_delay_ms: 1000,
            max_backoff_ms: 10_000,
            bar_cache_enabled: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Concurrent symbol workers per scan (1 = sequential).
    pub scan_workers: usize,
    /// Minutes after which an unowned `running` scan reads as failed.
    pub stale_scan_minutes: i64,
    pub fetch: FetchConfig,
    /// Parameters used for fields a scan request leaves out.
    pub scan_defaults: ScanParams,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr, F: Fn(&str) -> Option<String>>(get: &F, key: &str, default: T) -> T {
            get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        }

        let fetch_defaults = FetchConfig::default();
        let scan_defaults = ScanParams::default();

        Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&get, "PORT", 5001),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "data/squeeze.db".to_string()),
            scan_workers: parsed(&get, "SCAN_WORKERS", 10usize).max(1),
            stale_scan_minutes: parsed(&get, "STALE_SCAN_MINUTES", 120),
            fetch: FetchConfig {
                quote_url: get("EASTMONEY_QUOTE_URL").unwrap_or(fetch_defaults.quote_url),
                kline_url: get("EASTMONEY_KLINE_URL").unwrap_or(fetch_defaults.kline_url),
                timeout_secs: parsed(&get, "HTTP_TIMEOUT_SECS", fetch_defaults.timeout_secs),
                lookback_days: parsed(&get, "LOOKBACK_DAYS", fetch_defaults.lookback_days),
                max_retries: parsed(&get, "FETCH_MAX_RETRIES", fetch_defaults.max_retries),
                retry_delay_ms: parsed(&get, "FETCH_RETRY_DELAY_MS", fetch_defaults.retry_delay_ms),
                max_backoff_ms: parsed(&get, "FETCH_MAX_BACKOFF_MS", fetch_defaults.max_backoff_ms),
                bar_cache_enabled: parsed(&get, "BAR_CACHE_ENABLED", fetch_defaults.bar_cache_enabled),
            },
            scan_defaults: ScanParams {
                sectors: parsed(&get, "DEFAULT_SECTORS", scan_defaults.sectors),
                period: parsed(&get, "DEFAULT_PERIOD", scan_defaults.period),
                std_dev: parsed(&get, "DEFAULT_STD_DEV", scan_defaults.std_dev),
                ma_short: parsed(&get, "DEFAULT_MA_SHORT", scan_defaults.ma_short),
                ma_long: parsed(&get, "DEFAULT_MA_LONG", scan_defaults.ma_long),
                min_squeeze_days: parsed(&get, "DEFAULT_MIN_SQUEEZE_DAYS", scan_defaults.min_squeeze_days),
                ..scan_defaults
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
