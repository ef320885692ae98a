//! CoinGecko public API integration.
//!
//! API docs: https://docs.coingecko.com/reference/coins-markets
//! Base URL: https://api.coingecko.com/api/v3
//! Rate limit: ~30 requests/minute on the public tier.
//!
//! Pair identifiers are CoinGecko coin ids (`bitcoin`, `ethereum`), priced
//! in the client's `vs_currency`. The OHLC endpoint carries no volume, so
//! candles from here always have zero volume.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{
    http_client, status_error, MarketDataError, MarketDataSource, MarketResult, PairCatalog,
};
use crate::types::{AssetPair, Candle, TickerSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER_NAME: &str = "coingecko";

// ---------------------------------------------------------------------------
// API response types (CoinGecko JSON → Rust)
// ---------------------------------------------------------------------------

/// One row of `/coins/markets`. Most numeric fields can be null for thin coins.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoMarket {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

impl CoinGeckoMarket {
    fn to_ticker(&self) -> MarketResult<TickerSnapshot> {
        let last = self
            .current_price
            .ok_or_else(|| MarketDataError::Decode(format!("{}: missing current_price", self.id)))?;

        // Reconstruct the 24h open from whichever change field is present
        let open = match (self.price_change_24h, self.price_change_percentage_24h) {
            (Some(change), _) => last - change,
            (None, Some(pct)) if pct > -100.0 => last / (1.0 + pct / 100.0),
            _ => last,
        };

        Ok(TickerSnapshot {
            last_price: last,
            volume_24h: self.total_volume.unwrap_or(0.0),
            open_price_24h: open,
            high_24h: self.high_24h.unwrap_or(last),
            low_24h: self.low_24h.unwrap_or(last),
        })
    }
}

pub fn parse_markets(body: &str) -> MarketResult<Vec<CoinGeckoMarket>> {
    serde_json::from_str(body).map_err(|e| MarketDataError::Decode(e.to_string()))
}

/// Parse `/coins/{id}/ohlc` rows of `[ms, open, high, low, close]`.
pub fn parse_ohlc(body: &str) -> MarketResult<Vec<Candle>> {
    let rows: Vec<[f64; 5]> =
        serde_json::from_str(body).map_err(|e| MarketDataError::Decode(e.to_string()))?;
    Ok(rows
        .into_iter()
        .map(|[ms, open, high, low, close]| Candle {
            open_time: (ms / 1000.0) as i64,
            open,
            high,
            low,
            close,
            volume: 0.0,
        })
        .collect())
}

fn newest(mut candles: Vec<Candle>, max: usize) -> Vec<Candle> {
    if candles.len() > max {
        candles.drain(..candles.len() - max);
    }
    candles
}

/// OHLC granularity is chosen by CoinGecko from the day range:
/// 1-2 days → 30m, 3-30 days → 4h, beyond → 4d.
fn days_for_interval(interval_minutes: u32) -> u32 {
    match interval_minutes {
        0..=30 => 1,
        31..=240 => 14,
        _ => 90,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    vs_currency: String,
    /// Coins returned by the catalog, ordered by 24h volume.
    catalog_limit: u32,
    max_candles: usize,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: Option<String>,
        vs_currency: &str,
        timeout: Duration,
        catalog_limit: u32,
        max_candles: usize,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            vs_currency: vs_currency.to_ascii_lowercase(),
            catalog_limit,
            max_candles,
        })
    }

    async fn get(&self, path_and_query: &str) -> MarketResult<String> {
        let url = format!("{}/{path_and_query}", self.base_url);
        debug!(url = %url, "CoinGecko request");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(status_error(PROVIDER_NAME, status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_ticker(&self, pair_id: &str) -> MarketResult<TickerSnapshot> {
        let body = self
            .get(&format!(
                "coins/markets?vs_currency={}&ids={}&price_change_percentage=24h",
                self.vs_currency,
                urlencoding::encode(pair_id),
            ))
            .await?;
        parse_markets(&body)?
            .into_iter()
            .find(|m| m.id == pair_id)
            .ok_or_else(|| MarketDataError::NotFound(pair_id.to_string()))?
            .to_ticker()
    }

    async fn fetch_candles(
        &self,
        pair_id: &str,
        interval_minutes: u32,
    ) -> MarketResult<Vec<Candle>> {
        let body = self
            .get(&format!(
                "coins/{}/ohlc?vs_currency={}&days={}",
                urlencoding::encode(pair_id),
                self.vs_currency,
                days_for_interval(interval_minutes),
            ))
            .await?;
        Ok(newest(parse_ohlc(&body)?, self.max_candles))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl PairCatalog for CoinGeckoClient {
    async fn list_quoted_pairs(&self, quote_currency: &str) -> MarketResult<Vec<AssetPair>> {
        let body = self
            .get(&format!(
                "coins/markets?vs_currency={}&order=volume_desc&per_page={}&page=1",
                urlencoding::encode(&quote_currency.to_ascii_lowercase()),
                self.catalog_limit,
            ))
            .await?;
        Ok(parse_markets(&body)?
            .into_iter()
            .map(|m| AssetPair::with_display(m.id, m.symbol.to_ascii_uppercase()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
