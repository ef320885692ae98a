//! Moving averages.

/// Simple moving average of the first `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(values[..period].iter().sum::<f64>() / period as f64)
}

/// Full EMA series, seeded with the SMA of the first `period` values.
///
/// The first element corresponds to `values[period - 1]`; the result is
/// empty when there are fewer than `period` values.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let Some(seed) = sma(values, period) else {
        return Vec::new();
    };

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut ema = seed;
    out.push(ema);
    for &x in &values[period..] {
        ema = (x - ema) * k + ema;
        out.push(ema);
    }
    out
}

/// Latest EMA value, or `None` with fewer than `period` values.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}
