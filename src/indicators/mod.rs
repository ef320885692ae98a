//! Technical indicators.
//!
//! Pure functions over a candle series (and optionally a ticker snapshot)
//! producing the `IndicatorSnapshot` consumed by the scoring engine.
//! Nothing here performs I/O or keeps state between calls, so the same
//! input always yields the same snapshot.

pub mod activity;
pub mod averages;
pub mod momentum;

use serde::Deserialize;

use crate::types::{CandleSeries, IndicatorSnapshot, ScannerError, TickerSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Indicator periods and windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Candles used for the range-based volatility.
    pub volatility_window: usize,
    /// Candles averaged for the volume ratio.
    pub volume_window: usize,
    /// Prior candles whose highs the latest close must clear.
    pub breakout_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_fast: 20,
            ema_slow: 50,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volatility_window: 20,
            volume_window: 20,
            breakout_window: 24,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ScannerError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("ema_fast", self.ema_fast),
            ("ema_slow", self.ema_slow),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("volatility_window", self.volatility_window),
            ("volume_window", self.volume_window),
            ("breakout_window", self.breakout_window),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(ScannerError::Config(format!("indicators.{name} must be > 0")));
        }
        if self.ema_fast >= self.ema_slow {
            return Err(ScannerError::Config(format!(
                "indicators.ema_fast ({}) must be below ema_slow ({})",
                self.ema_fast, self.ema_slow
            )));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ScannerError::Config(format!(
                "indicators.macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        Ok(())
    }

    /// Candles needed before every indicator is defined.
    pub fn warmup_candles(&self) -> usize {
        [
            self.rsi_period + 1,
            self.ema_slow,
            self.macd_slow + self.macd_signal - 1,
            self.breakout_window + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Computes indicator snapshots with a fixed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorCalculator {
    config: IndicatorConfig,
}

impl IndicatorCalculator {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Current price: the ticker's last trade, else the latest close.
    pub fn current_price(series: &CandleSeries, ticker: Option<&TickerSnapshot>) -> Option<f64> {
        ticker
            .map(|t| t.last_price)
            .or_else(|| series.last().map(|c| c.close))
    }

    /// Build the snapshot for one pair.
    ///
    /// Indicators that need more history than the series holds are left
    /// as `None`; an empty series with a ticker still yields volatility
    /// and change from the 24h statistics.
    pub fn snapshot(
        &self,
        series: &CandleSeries,
        ticker: Option<&TickerSnapshot>,
    ) -> IndicatorSnapshot {
        let cfg = &self.config;
        let closes = series.closes();
        let candles = series.as_slice();

        let macd = momentum::macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);

        let volatility_pct = if candles.is_empty() {
            ticker.map(activity::ticker_volatility_pct).unwrap_or(0.0)
        } else {
            activity::candle_volatility_pct(candles, cfg.volatility_window)
        };

        let change_pct = match (ticker, closes.as_slice()) {
            (Some(t), _) => activity::change_pct(t.last_price, t.open_price_24h),
            (None, [.., prev, last]) => activity::change_pct(*last, *prev),
            (None, _) => 0.0,
        };

        IndicatorSnapshot {
            rsi: momentum::rsi(&closes, cfg.rsi_period),
            ema_fast: averages::ema(&closes, cfg.ema_fast),
            ema_slow: averages::ema(&closes, cfg.ema_slow),
            macd_line: macd.map(|m| m.line),
            macd_signal: macd.map(|m| m.signal),
            volatility_pct,
            volume_ratio: activity::volume_ratio(&series.volumes(), cfg.volume_window),
            change_pct,
            breakout: activity::breakout(candles, cfg.breakout_window),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
