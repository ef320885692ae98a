//! Market-data providers.
//!
//! Defines the `MarketDataSource` and `PairCatalog` traits and provides
//! adapters for:
//! - Kraken public REST (OHLC candles, ticker, asset-pair catalog)
//! - CoinGecko (24h market snapshots, OHLC without volume, top coins by volume)
//!
//! Adapters translate provider-specific JSON into the fixed `Candle` /
//! `TickerSnapshot` shapes; nothing past this boundary sees raw responses.

pub mod coingecko;
pub mod kraken;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{AssetPair, Candle, TickerSnapshot};

/// Errors a provider can report for a single request.
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by {0}")]
    RateLimited(String),

    #[error("pair not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for MarketDataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MarketDataError::Timeout
        } else if e.is_decode() {
            MarketDataError::Decode(e.to_string())
        } else {
            MarketDataError::Http(e.to_string())
        }
    }
}

pub type MarketResult<T> = std::result::Result<T, MarketDataError>;

/// Per-pair market data.
///
/// Implementations must be cheap to share across tasks; every method may
/// fail independently for each pair.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest 24h ticker for a pair.
    async fn fetch_ticker(&self, pair_id: &str) -> MarketResult<TickerSnapshot>;

    /// Candles for a pair, oldest first. Not yet validated.
    async fn fetch_candles(
        &self,
        pair_id: &str,
        interval_minutes: u32,
    ) -> MarketResult<Vec<Candle>>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Enumerates the pairs quoted in a currency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PairCatalog: Send + Sync {
    async fn list_quoted_pairs(&self, quote_currency: &str) -> MarketResult<Vec<AssetPair>>;
}

/// Shared reqwest client settings.
pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("alpha-scanner/0.1.0 (market-scanner)")
        .build()
        .context("Failed to build HTTP client")
}

/// Map a non-success HTTP status to a typed error.
pub(crate) fn status_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> MarketDataError {
    match status.as_u16() {
        429 => MarketDataError::RateLimited(provider.to_string()),
        404 => MarketDataError::NotFound(body.chars().take(200).collect()),
        408 | 504 => MarketDataError::Timeout,
        _ => MarketDataError::Http(format!(
            "{provider} returned {status}: {}",
            body.chars().take(200).collect::<String>()
        )),
    }
}

/// Parse a numeric string field as returned by exchange APIs.
pub(crate) fn parse_num(field: &str, raw: &str) -> MarketResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| MarketDataError::Decode(format!("{field} '{raw}': {e}")))
}
