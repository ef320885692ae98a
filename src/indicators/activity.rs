//! Range, volume and price-change statistics.

use crate::types::{Candle, TickerSnapshot};

/// Mean high-low range, as a percentage of the low, over the trailing `window` candles.
pub fn candle_volatility_pct(candles: &[Candle], window: usize) -> f64 {
    if candles.is_empty() || window == 0 {
        return 0.0;
    }
    let start = candles.len().saturating_sub(window);
    let recent = &candles[start..];
    recent.iter().map(Candle::range_pct).sum::<f64>() / recent.len() as f64
}

/// 24h range as a percentage of the 24h low.
pub fn ticker_volatility_pct(ticker: &TickerSnapshot) -> f64 {
    if ticker.low_24h <= 0.0 || ticker.high_24h < ticker.low_24h {
        return 0.0;
    }
    (ticker.high_24h - ticker.low_24h) / ticker.low_24h * 100.0
}

/// Latest volume divided by the mean volume of the `window` candles before it.
///
/// A zero (or non-finite) average yields 0 rather than infinity or NaN.
/// `None` when there is no prior volume to average.
pub fn volume_ratio(volumes: &[f64], window: usize) -> Option<f64> {
    let (&latest, prior) = volumes.split_last()?;
    if window == 0 || prior.is_empty() {
        return None;
    }
    let recent = &prior[prior.len().saturating_sub(window)..];
    let avg = recent.iter().sum::<f64>() / recent.len() as f64;

    if avg <= 0.0 || !avg.is_finite() {
        return Some(0.0);
    }
    Some(latest / avg)
}

/// Percentage change from `reference` to `current`; 0 for a non-positive reference.
pub fn change_pct(current: f64, reference: f64) -> f64 {
    if reference <= 0.0 || !reference.is_finite() {
        return 0.0;
    }
    (current - reference) / reference * 100.0
}

/// Whether the latest close is strictly above the highest high of the
/// preceding `window` candles. `None` with fewer than `window + 1` candles.
pub fn breakout(candles: &[Candle], window: usize) -> Option<bool> {
    if window == 0 || candles.len() < window + 1 {
        return None;
    }
    let (last, before) = candles.split_last()?;
    let prior_high = before[before.len() - window..]
        .iter()
        .map(|c| c.high)
        .fold(f64::MIN, f64::max);
    Some(last.close > prior_high)
}
