//! Shared types for the scanner.
//!
//! These types form the data model used across all modules: market data
//! coming in from providers, the derived indicator snapshot, and the
//! ranked scan result handed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Asset pairs
// ---------------------------------------------------------------------------

/// A tradeable base/quote combination as known to the data provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    /// Provider-specific identifier (e.g. `XBTUSD` on Kraken, `bitcoin` on CoinGecko).
    pub id: String,
    /// Human-friendly name (e.g. `XBT/USD`, `BTC`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl AssetPair {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display: None,
        }
    }

    pub fn with_display(id: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display: Some(display.into()),
        }
    }

    /// Display name, falling back to the identifier.
    pub fn label(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.id)
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display {
            Some(d) if d != &self.id => write!(f, "{} ({})", d, self.id),
            _ => write!(f, "{}", self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One OHLCV interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Interval start, seconds since epoch.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Check the OHLCV invariants, returning a description of the first violation.
    pub fn check(&self) -> Result<(), String> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{field} must be positive, got {value}"));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("volume must be non-negative, got {}", self.volume));
        }
        if self.high < self.open.max(self.close) {
            return Err(format!(
                "high {} below max(open, close) {}",
                self.high,
                self.open.max(self.close)
            ));
        }
        if self.low > self.open.min(self.close) {
            return Err(format!(
                "low {} above min(open, close) {}",
                self.low,
                self.open.min(self.close)
            ));
        }
        Ok(())
    }

    /// High-low range as a percentage of the low.
    pub fn range_pct(&self) -> f64 {
        (self.high - self.low) / self.low * 100.0
    }
}

/// Validated candle series, oldest first, strictly increasing open times.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate every candle and the ordering of the series.
    pub fn new(pair: &str, candles: Vec<Candle>) -> Result<Self, ScannerError> {
        for (i, candle) in candles.iter().enumerate() {
            candle.check().map_err(|reason| ScannerError::InvalidCandle {
                pair: pair.to_string(),
                reason: format!("candle {i} at {}: {reason}", candle.open_time),
            })?;
        }
        if let Some(w) = candles.windows(2).find(|w| w[1].open_time <= w[0].open_time) {
            return Err(ScannerError::InvalidCandle {
                pair: pair.to_string(),
                reason: format!(
                    "open_time {} does not follow {}",
                    w[1].open_time, w[0].open_time
                ),
            });
        }
        Ok(Self { candles })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

/// Latest 24h ticker statistics for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub last_price: f64,
    pub volume_24h: f64,
    pub open_price_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
}

impl TickerSnapshot {
    pub fn validate(&self, pair: &str) -> Result<(), ScannerError> {
        if !self.last_price.is_finite() || self.last_price <= 0.0 {
            return Err(ScannerError::InvalidCandle {
                pair: pair.to_string(),
                reason: format!("ticker last price must be positive, got {}", self.last_price),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Indicators & scoring
// ---------------------------------------------------------------------------

/// Indicator values for one pair at scan time.
///
/// `None` means the series was too short for that indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub volatility_pct: f64,
    pub volume_ratio: Option<f64>,
    pub change_pct: f64,
    pub breakout: Option<bool>,
}

/// Recommended action derived from a clamped score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    Avoid,
}

impl Action {
    pub fn is_buy(&self) -> bool {
        matches!(self, Action::StrongBuy | Action::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Action::Sell | Action::Avoid)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::StrongBuy => write!(f, "STRONG_BUY"),
            Action::Buy => write!(f, "BUY"),
            Action::Hold => write!(f, "HOLD"),
            Action::Sell => write!(f, "SELL"),
            Action::Avoid => write!(f, "AVOID"),
        }
    }
}

/// A pair that produced usable data, with its score and action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAsset {
    pub pair: AssetPair,
    pub price: f64,
    pub indicators: IndicatorSnapshot,
    pub score: i32,
    pub action: Action,
    /// Names of the rules that fired for this pair.
    pub triggered: Vec<String>,
}

impl fmt::Display for ScoredAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:.4} | score {} | {} | 24h {:+.2}%",
            self.pair, self.price, self.score, self.action, self.indicators.change_pct,
        )
    }
}

// ---------------------------------------------------------------------------
// Scan result
// ---------------------------------------------------------------------------

/// Why a pair did not make it into the ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "unavailable")]
    Unavailable,
    #[serde(rename = "invalid data")]
    InvalidData,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Unavailable => write!(f, "unavailable"),
            FailureReason::InvalidData => write!(f, "invalid data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub pair: AssetPair,
    pub reason: FailureReason,
    pub detail: String,
}

impl ScanFailure {
    pub fn new(pair: AssetPair, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            pair,
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.pair.id, self.reason, self.detail)
    }
}

/// Ranked outcome of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Score descending, pair id ascending on ties.
    pub scored: Vec<ScoredAsset>,
    /// Sorted by pair id.
    pub failures: Vec<ScanFailure>,
}

impl ScanResult {
    /// An empty result stamped with the current time.
    pub fn empty() -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            elapsed_ms: 0,
            scored: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Build a result, putting both lists in their canonical order.
    pub fn from_parts(
        mut scored: Vec<ScoredAsset>,
        mut failures: Vec<ScanFailure>,
        elapsed_ms: u64,
    ) -> Self {
        rank(&mut scored);
        failures.sort_by(|a, b| a.pair.id.cmp(&b.pair.id));
        Self {
            scan_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            elapsed_ms,
            scored,
            failures,
        }
    }

    /// Best-ranked pair, if any scored.
    pub fn best(&self) -> Option<&ScoredAsset> {
        self.scored.first()
    }

    pub fn total_pairs(&self) -> usize {
        self.scored.len() + self.failures.len()
    }

    pub fn find(&self, pair_id: &str) -> Option<&ScoredAsset> {
        self.scored.iter().find(|s| s.pair.id == pair_id)
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan {} | {} scored | {} failed | {}ms",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.scored.len(),
            self.failures.len(),
            self.elapsed_ms,
        )?;
        if let Some(best) = self.best() {
            write!(f, " | best: {best}")?;
        }
        Ok(())
    }
}

/// Sort by score descending, breaking ties by pair id ascending.
pub fn rank(scored: &mut [ScoredAsset]) {
    scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.pair.id.cmp(&b.pair.id)));
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the scanner.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("Data unavailable for {pair}: {reason}")]
    DataUnavailable { pair: String, reason: String },

    #[error("Invalid market data for {pair}: {reason}")]
    InvalidCandle { pair: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pair catalog unavailable: {0}")]
    Catalog(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
