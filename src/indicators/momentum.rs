//! Momentum oscillators: RSI and MACD.

use super::averages::ema_series;

/// MACD line and its signal line at the latest candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
}

impl Macd {
    pub fn histogram(&self) -> f64 {
        self.line - self.signal
    }
}

/// Relative Strength Index over the trailing `period` close-to-close changes.
///
/// Uses simple averages of gains and losses. Returns 100 when there were
/// no losses in the window, and `None` with fewer than `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD(fast, slow, signal) at the latest close.
///
/// The MACD line is computed along the series so the signal line can be
/// an EMA of it; both are `None` until `slow + signal - 1` closes exist.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || signal == 0 || fast > slow {
        return None;
    }

    let fast_series = ema_series(closes, fast);
    let slow_series = ema_series(closes, slow);
    if slow_series.is_empty() {
        return None;
    }

    // slow_series[j] lines up with closes[slow - 1 + j], fast_series[j] with closes[fast - 1 + j]
    let offset = slow - fast;
    let line_series: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(j, s)| fast_series[j + offset] - s)
        .collect();

    let signal_series = ema_series(&line_series, signal);
    let signal = *signal_series.last()?;
    let line = *line_series.last()?;

    Some(Macd { line, signal })
}
