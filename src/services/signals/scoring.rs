//! Composite scoring of squeeze candidates.
//!
//! Five weighted sub-scores sum to at most 100:
//!
//! | Sub-score  | Cap | Inputs                                             |
//! |------------|-----|----------------------------------------------------|
//! | squeeze    | 30  | streak length, short/long band-width ratio, ATR%   |
//! | trend      | 25  | MA5 > MA10 > MA20 > MA60 pairwise alignment        |
//! | momentum   | 20  | MACD golden-cross recency, histogram, RSI zone     |
//! | position   | 15  | close above the mid band, %B headroom              |
//! | popularity | 10  | volume ratio against the prior 5 bars              |
//!
//! Every function here is pure; identical inputs give identical scores.

use super::indicators::{bollinger::percent_b, macd::is_converging};
use crate::types::{Bar, Grade, IndicatorSeries, ResultDetails, ScoreBreakdown, SqueezeState};

pub const SQUEEZE_MAX: f64 = 30.0;
pub const TREND_MAX: f64 = 25.0;
pub const MOMENTUM_MAX: f64 = 20.0;
pub const POSITION_MAX: f64 = 15.0;
pub const POPULARITY_MAX: f64 = 10.0;

/// RSI band read as healthy momentum, inclusive.
pub const RSI_NEUTRAL_LOW: f64 = 40.0;
pub const RSI_NEUTRAL_HIGH: f64 = 70.0;

/// Bars searched back for a MACD golden cross.
pub const GOLDEN_CROSS_LOOKBACK: usize = 5;

/// ATR% percentile below which volatility counts as compressed.
pub const LOW_VOLATILITY_PERCENTILE: f64 = 30.0;

/// Volume ratio above which a bar counts as expanding volume.
pub const VOLUME_UP_RATIO: f64 = 1.2;

/// Daily change that earns the vanguard tag, in percent.
pub const VANGUARD_CHANGE_PCT: f64 = 5.0;

/// Turnover rate that earns the popular tag, in percent.
pub const POPULAR_TURNOVER_PCT: f64 = 3.0;

/// Streak length and contraction depth, plus a bonus for compressed ATR.
pub fn squeeze_score(state: &SqueezeState, atr_percentile: Option<f64>) -> f64 {
    let streak = state.consecutive_days.min(5) as f64 * 3.0;

    let depth = match state.ratio() {
        Some(r) if r < 0.8 => 10.0,
        Some(r) if r < 0.9 => 7.0,
        Some(r) if r < 0.95 => 4.0,
        _ => 0.0,
    };

    let bonus = match atr_percentile {
        Some(p) if p < LOW_VOLATILITY_PERCENTILE => 5.0,
        _ => 0.0,
    };

    (streak + depth + bonus).min(SQUEEZE_MAX)
}

/// Share of satisfied pairs among MA5 > MA10, MA10 > MA20, MA20 > MA60.
///
/// An undefined average leaves its pairs unsatisfied.
pub fn trend_score(ma5: Option<f64>, ma10: Option<f64>, ma20: Option<f64>, ma60: Option<f64>) -> f64 {
    let above = |a: Option<f64>, b: Option<f64>| matches!((a, b), (Some(a), Some(b)) if a > b);
    let satisfied = [above(ma5, ma10), above(ma10, ma20), above(ma20, ma60)]
        .iter()
        .filter(|s| **s)
        .count();
    TREND_MAX * satisfied as f64 / 3.0
}

/// MACD component plus RSI component.
///
/// A cross on the latest bar scores 12, two points less for each bar since.
/// Without a recent cross a non-negative histogram scores 4 and a
/// converging one 2. RSI inside the neutral band adds 8.
pub fn momentum_score(
    cross_bars_ago: Option<usize>,
    histogram: Option<f64>,
    converging: bool,
    rsi: Option<f64>,
) -> f64 {
    let macd = match (cross_bars_ago, histogram) {
        (Some(k), _) if k <= GOLDEN_CROSS_LOOKBACK => 12.0 - 2.0 * k as f64,
        (_, Some(h)) if h >= 0.0 => 4.0,
        _ if converging => 2.0,
        _ => 0.0,
    };

    let rsi = match rsi {
        Some(r) if (RSI_NEUTRAL_LOW..=RSI_NEUTRAL_HIGH).contains(&r) => 8.0,
        _ => 0.0,
    };

    (macd + rsi).min(MOMENTUM_MAX)
}

/// Close above the mid band scores 9, with headroom below the upper band worth up to 6 more.
pub fn position_score(close: f64, mid: Option<f64>, upper: Option<f64>, lower: Option<f64>) -> f64 {
    let Some(mid) = mid else { return 0.0 };
    if close <= mid {
        return 0.0;
    }

    let headroom: f64 = match (upper, lower) {
        (Some(u), Some(l)) => match percent_b(close, u, l) {
            Some(b) if b <= 0.8 => 6.0,
            Some(b) if b <= 0.9 => 3.0,
            _ => 0.0,
        },
        _ => 0.0,
    };

    (9.0 + headroom).min(POSITION_MAX)
}

/// Linear in volume ratio: 0 at 0.5x, full at 2.0x.
pub fn popularity_score(volume_ratio: Option<f64>) -> f64 {
    match volume_ratio {
        Some(vr) => ((vr - 0.5) / 1.5 * POPULARITY_MAX).clamp(0.0, POPULARITY_MAX),
        None => 0.0,
    }
}

/// Score the latest bar of an analyzed symbol.
pub fn score(series: &IndicatorSeries, squeeze: &SqueezeState) -> ScoreBreakdown {
    let latest = IndicatorSeries::latest;
    let close = series.latest_close().unwrap_or(0.0);

    let squeeze_score = squeeze_score(squeeze, latest(&series.atr_percentile));
    let trend_score = trend_score(
        latest(&series.ma5),
        latest(&series.ma10),
        latest(&series.ma20),
        latest(&series.ma60),
    );
    let momentum_score = momentum_score(
        series.golden_cross_bars_ago(GOLDEN_CROSS_LOOKBACK),
        latest(&series.macd_histogram),
        is_converging(&series.macd_histogram),
        latest(&series.rsi),
    );
    let position_score = position_score(
        close,
        latest(&series.bb_mid),
        latest(&series.bb_upper),
        latest(&series.bb_lower),
    );
    let popularity_score = popularity_score(latest(&series.volume_ratio));

    let total = (squeeze_score + trend_score + momentum_score + position_score + popularity_score)
        .clamp(0.0, 100.0);

    ScoreBreakdown {
        squeeze_score,
        trend_score,
        momentum_score,
        position_score,
        popularity_score,
        total,
        grade: Grade::from_total(total),
    }
}

/// MA20 slope in percent per day over the last 5 bars.
pub fn ma20_slope(series: &IndicatorSeries) -> Option<f64> {
    let now = IndicatorSeries::latest(&series.ma20)?;
    let before = IndicatorSeries::back(&series.ma20, 5)?;
    if before == 0.0 {
        return None;
    }
    Some((now - before) / before / 5.0 * 100.0)
}

/// Percent change of the latest close against the previous one.
pub fn change_pct(bars: &[Bar]) -> f64 {
    match bars {
        [.., prev, last] if prev.close != 0.0 => (last.close / prev.close - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// Secondary readings stored alongside a result.
pub fn details(series: &IndicatorSeries, squeeze: &SqueezeState, bars: &[Bar]) -> ResultDetails {
    let latest = IndicatorSeries::latest;
    let close = series.latest_close().unwrap_or(0.0);
    let (ma5, ma10, ma20, ma60) = (
        latest(&series.ma5),
        latest(&series.ma10),
        latest(&series.ma20),
        latest(&series.ma60),
    );
    let above = |a: Option<f64>, b: Option<f64>| matches!((a, b), (Some(a), Some(b)) if a > b);
    let ma_bullish = above(ma5, ma10) && above(ma10, ma20);

    let bb_upper = latest(&series.bb_upper);
    let bb_lower = latest(&series.bb_lower);
    let bb_position = match (bb_upper, bb_lower) {
        (Some(u), Some(l)) => percent_b(close, u, l).map(|b| b * 100.0),
        _ => None,
    };

    let is_volume_up = latest(&series.volume_ratio).is_some_and(|vr| vr > VOLUME_UP_RATIO);
    let is_price_up = matches!(bars, [.., prev, last] if last.close > prev.close);
    let slope = ma20_slope(series);
    let atr_percentile = latest(&series.atr_percentile);

    ResultDetails {
        close,
        bb_upper,
        bb_mid: latest(&series.bb_mid),
        bb_lower,
        bandwidth_ma_short: squeeze.bandwidth_ma_short,
        bandwidth_ma_long: squeeze.bandwidth_ma_long,
        squeeze_ratio: squeeze.ratio().map(|r| r * 100.0),
        bb_position,
        rsi: latest(&series.rsi),
        macd_histogram: latest(&series.macd_histogram),
        golden_cross_bars_ago: series.golden_cross_bars_ago(GOLDEN_CROSS_LOOKBACK),
        ma20_slope: slope,
        atr_percentile,
        turnover_rate: bars.last().and_then(|b| b.turnover_rate),
        ma_bullish,
        ma_full_bullish: ma_bullish && above(ma20, ma60),
        is_volume_up,
        is_price_up,
        is_volume_price_up: is_volume_up && is_price_up,
        macd_converging: is_converging(&series.macd_histogram),
        gentle_uptrend: slope.is_some_and(|s| s > 0.0 && s < 0.05),
        low_volatility: atr_percentile.is_some_and(|p| p < LOW_VOLATILITY_PERCENTILE),
    }
}

/// Descriptive tags for a ranked result.
///
/// `leader_rank` is the symbol's market-cap rank within its sector when it
/// is one of the top three.
pub fn tags(
    score: &ScoreBreakdown,
    details: &ResultDetails,
    change_pct: f64,
    leader_rank: Option<usize>,
) -> Vec<String> {
    let mut tags = Vec::new();

    if matches!(score.grade, Grade::S | Grade::A) {
        tags.push(format!("grade_{}", score.grade.as_str()));
    }
    if let Some(rank) = leader_rank {
        tags.push(format!("leader#{}", rank));
    }

    if details.ma_full_bullish {
        tags.push("full_bullish".to_string());
    } else if details.ma_bullish {
        tags.push("short_bullish".to_string());
    }

    match details.golden_cross_bars_ago {
        Some(k) if k <= 1 && details.rsi.is_some_and(|r| (RSI_NEUTRAL_LOW..=RSI_NEUTRAL_HIGH).contains(&r)) => {
            tags.push("macd_strong".to_string())
        }
        Some(_) => tags.push("macd_golden".to_string()),
        None => {}
    }

    if details.is_volume_price_up {
        tags.push("volume_price_up".to_string());
    } else if details.is_volume_up {
        tags.push("volume_up".to_string());
    }

    if details.low_volatility {
        tags.push("low_volatility".to_string());
    }
    if details.gentle_uptrend {
        tags.push("gentle_uptrend".to_string());
    }
    if change_pct >= VANGUARD_CHANGE_PCT {
        tags.push("vanguard".to_string());
    }
    if details.turnover_rate.is_some_and(|t| t >= POPULAR_TURNOVER_PCT) {
        tags.push("popular".to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(days: usize, short: f64, long: f64) -> SqueezeState {
        SqueezeState {
            is_contracting: days > 0,
            consecutive_days: days,
            bandwidth_ma_short: short,
            bandwidth_ma_long: long,
        }
    }

    #[test]
    fn test_squeeze_score_scales_and_caps() {
        assert_eq!(squeeze_score(&state(0, 5.0, 5.0), None), 0.0);
        assert_eq!(squeeze_score(&state(3, 4.6, 5.0), None), 9.0 + 4.0);
        assert_eq!(squeeze_score(&state(4, 4.2, 5.0), None), 12.0 + 7.0);
        assert_eq!(squeeze_score(&state(20, 1.0, 5.0), Some(10.0)), SQUEEZE_MAX);
        assert_eq!(squeeze_score(&state(20, 1.0, 5.0), Some(30.0)), 25.0);
    }

    #[test]
    fn test_squeeze_score_monotonic_in_ratio() {
        let loose = squeeze_score(&state(3, 4.9, 5.0), None);
        let tight = squeeze_score(&state(3, 3.0, 5.0), None);
        assert!(tight > loose);
    }

    #[test]
    fn test_trend_partial_credit() {
        assert_eq!(trend_score(Some(4.0), Some(3.0), Some(2.0), Some(1.0)), 25.0);
        assert!((trend_score(Some(4.0), Some(3.0), Some(2.0), Some(5.0)) - 50.0 / 3.0).abs() < 1e-9);
        assert!((trend_score(Some(4.0), Some(3.0), Some(2.0), None) - 50.0 / 3.0).abs() < 1e-9);
        assert_eq!(trend_score(Some(1.0), Some(2.0), Some(3.0), Some(4.0)), 0.0);
    }

    #[test]
    fn test_momentum_recency() {
        assert_eq!(momentum_score(Some(0), Some(0.1), false, Some(55.0)), 20.0);
        assert_eq!(momentum_score(Some(3), Some(0.1), false, None), 6.0);
        assert_eq!(momentum_score(None, Some(0.2), false, Some(80.0)), 4.0);
        assert_eq!(momentum_score(None, Some(-0.2), true, Some(40.0)), 10.0);
        assert_eq!(momentum_score(None, Some(-0.2), false, Some(39.9)), 0.0);
    }

    #[test]
    fn test_position_score() {
        assert_eq!(position_score(9.0, Some(10.0), Some(12.0), Some(8.0)), 0.0);
        assert_eq!(position_score(10.0, Some(10.0), Some(12.0), Some(8.0)), 0.0);
        // %B 0.75
        assert_eq!(position_score(11.0, Some(10.0), Some(12.0), Some(8.0)), 15.0);
        // %B 0.875
        assert_eq!(position_score(11.5, Some(10.0), Some(12.0), Some(8.0)), 12.0);
        // above the upper band
        assert_eq!(position_score(13.0, Some(10.0), Some(12.0), Some(8.0)), 9.0);
        assert_eq!(position_score(13.0, None, None, None), 0.0);
    }

    #[test]
    fn test_popularity_score() {
        assert_eq!(popularity_score(None), 0.0);
        assert_eq!(popularity_score(Some(0.3)), 0.0);
        assert_eq!(popularity_score(Some(1.25)), 5.0);
        assert_eq!(popularity_score(Some(2.0)), 10.0);
        assert_eq!(popularity_score(Some(9.0)), 10.0);
    }

    #[test]
    fn test_sub_scores_within_caps() {
        let ratios = [0.0, 0.5, 0.85, 0.92, 1.0, 1.5];
        for days in 0..12 {
            for r in ratios {
                for pct in [None, Some(0.0), Some(50.0)] {
                    let s = squeeze_score(&state(days, r * 5.0, 5.0), pct);
                    assert!((0.0..=SQUEEZE_MAX).contains(&s));
                }
            }
        }
        for cross in [None, Some(0), Some(5), Some(9)] {
            for hist in [None, Some(-1.0), Some(1.0)] {
                for rsi in [None, Some(10.0), Some(50.0)] {
                    let m = momentum_score(cross, hist, true, rsi);
                    assert!((0.0..=MOMENTUM_MAX).contains(&m));
                }
            }
        }
        for vr in [0.0, 1.0, 100.0] {
            assert!((0.0..=POPULARITY_MAX).contains(&popularity_score(Some(vr))));
        }
    }

    #[test]
    fn test_tags() {
        let score = ScoreBreakdown {
            squeeze_score: 30.0,
            trend_score: 25.0,
            momentum_score: 20.0,
            position_score: 15.0,
            popularity_score: 0.0,
            total: 90.0,
            grade: Grade::S,
        };
        let details = ResultDetails {
            ma_bullish: true,
            ma_full_bullish: true,
            golden_cross_bars_ago: Some(0),
            rsi: Some(55.0),
            is_volume_up: true,
            is_price_up: true,
            is_volume_price_up: true,
            turnover_rate: Some(4.2),
            ..Default::default()
        };
        let tags = tags(&score, &details, 6.1, Some(2));
        assert_eq!(
            tags,
            vec!["grade_S", "leader#2", "full_bullish", "macd_strong", "volume_price_up", "vanguard", "popular"]
        );
    }

    #[test]
    fn test_change_pct() {
        use chrono::NaiveDate;
        let d = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let bars = vec![
            Bar::new(d, 10.0, 10.0, 10.0, 10.0, 1.0),
            Bar::new(d.succ_opt().unwrap(), 10.0, 11.0, 10.0, 11.0, 1.0),
        ];
        assert!((change_pct(&bars) - 10.0).abs() < 1e-9);
        assert_eq!(change_pct(&bars[..1]), 0.0);
    }
}
