//! Daily bar cache, valid for the trading day it was filled on.

use chrono::{Local, NaiveDate};
use dashmap::DashMap;

use crate::types::Bar;

struct CacheEntry {
    bars: Vec<Bar>,
    filled_on: NaiveDate,
}

/// Thread-safe cache of bar series keyed by (symbol, lookback days).
///
/// Entries expire when the calendar day changes, since a new session
/// appends a bar.
#[derive(Default)]
pub struct BarCache {
    data: DashMap<(String, u32), CacheEntry>,
}

impl BarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str, lookback_days: u32) -> Option<Vec<Bar>> {
        self.get_on(symbol, lookback_days, Local::now().date_naive())
    }

    /// Look up as of `today`.
    pub fn get_on(&self, symbol: &str, lookback_days: u32, today: NaiveDate) -> Option<Vec<Bar>> {
        let key = (symbol.to_string(), lookback_days);
        let entry = self.data.get(&key)?;
        if entry.filled_on == today {
            Some(entry.bars.clone())
        } else {
            drop(entry);
            self.data.remove(&key);
            None
        }
    }

    pub fn insert(&self, symbol: &str, lookback_days: u32, bars: Vec<Bar>) {
        self.insert_on(symbol, lookback_days, bars, Local::now().date_naive());
    }

    pub fn insert_on(&self, symbol: &str, lookback_days: u32, bars: Vec<Bar>, today: NaiveDate) {
        self.data.insert(
            (symbol.to_string(), lookback_days),
            CacheEntry {
                bars,
                filled_on: today,
            },
        );
    }

    /// Drop entries filled before today.
    pub fn cleanup(&self) {
        self.cleanup_on(Local::now().date_naive());
    }

    pub fn cleanup_on(&self, today: NaiveDate) {
        self.data.retain(|_, entry| entry.filled_on == today);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn bars() -> Vec<Bar> {
        vec![Bar::new(day(3), 10.0, 10.5, 9.8, 10.2, 5000.0)]
    }

    #[test]
    fn test_hit_same_day() {
        let cache = BarCache::new();
        cache.insert_on("600519", 120, bars(), day(4));
        assert_eq!(cache.get_on("600519", 120, day(4)), Some(bars()));
        assert_eq!(cache.get_on("600519", 60, day(4)), None);
        assert_eq!(cache.get_on("000001", 120, day(4)), None);
    }

    #[test]
    fn test_expires_next_day() {
        let cache = BarCache::new();
        cache.insert_on("600519", 120, bars(), day(4));
        assert_eq!(cache.get_on("600519", 120, day(5)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup() {
        let cache = BarCache::new();
        cache.insert_on("600519", 120, bars(), day(4));
        cache.insert_on("000001", 120, bars(), day(5));
        cache.cleanup_on(day(5));
        assert_eq!(cache.len(), 1);
    }
}
