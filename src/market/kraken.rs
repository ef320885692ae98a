//! Kraken public REST integration.
//!
//! API docs: https://docs.kraken.com/api/docs/rest-api/get-ohlc-data
//! Base URL: https://api.kraken.com/0/public
//! Auth: not required for market data.
//!
//! Every response is wrapped as `{"error": [...], "result": {...}}` and the
//! result is keyed by Kraken's canonical pair name (e.g. `XXBTZUSD`),
//! which differs from the altname we query with (`XBTUSD`).

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{
    http_client, parse_num, status_error, MarketDataError, MarketDataSource, MarketResult,
    PairCatalog,
};
use crate::types::{AssetPair, Candle, TickerSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com/0/public";
const PROVIDER_NAME: &str = "kraken";

/// Kraken accepts only these OHLC intervals (minutes).
const VALID_INTERVALS: &[u32] = &[1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

// ---------------------------------------------------------------------------
// API response types (Kraken JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KrakenEnvelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<Value>,
}

/// Ticker entry; two-element arrays are `[today, last 24 hours]`.
#[derive(Debug, Deserialize)]
struct KrakenTicker {
    /// Last trade `[price, lot volume]`.
    c: Vec<String>,
    v: Vec<String>,
    h: Vec<String>,
    l: Vec<String>,
    /// Today's opening price.
    o: String,
}

#[derive(Debug, Deserialize)]
struct KrakenAssetPair {
    altname: String,
    #[serde(default)]
    wsname: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Unwrap the envelope, mapping Kraken's error strings.
fn unwrap_envelope(body: &str) -> MarketResult<Value> {
    let envelope: KrakenEnvelope =
        serde_json::from_str(body).map_err(|e| MarketDataError::Decode(e.to_string()))?;

    if let Some(err) = envelope.error.first() {
        return Err(if err.contains("Unknown asset pair") {
            MarketDataError::NotFound(err.clone())
        } else if err.contains("Rate limit") || err.contains("Too many requests") {
            MarketDataError::RateLimited(PROVIDER_NAME.to_string())
        } else {
            MarketDataError::Provider(err.clone())
        });
    }

    envelope
        .result
        .ok_or_else(|| MarketDataError::Decode("missing result".to_string()))
}

/// The single pair entry in a result object, skipping the `last` cursor.
fn pair_entry(result: Value) -> MarketResult<Value> {
    match result {
        Value::Object(map) => map
            .into_iter()
            .find(|(k, _)| k != "last")
            .map(|(_, v)| v)
            .ok_or_else(|| MarketDataError::NotFound("empty result".to_string())),
        _ => Err(MarketDataError::Decode("result is not an object".to_string())),
    }
}

fn row_num(row: &[Value], idx: usize, field: &str) -> MarketResult<f64> {
    match row.get(idx) {
        Some(Value::String(s)) => parse_num(field, s),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| MarketDataError::Decode(format!("{field} out of range"))),
        _ => Err(MarketDataError::Decode(format!("missing {field}"))),
    }
}

/// Parse an `/OHLC` body into candles, oldest first.
///
/// Rows are `[time, open, high, low, close, vwap, volume, count]`.
pub fn parse_ohlc(body: &str) -> MarketResult<Vec<Candle>> {
    let rows = pair_entry(unwrap_envelope(body)?)?;
    let rows: Vec<Vec<Value>> =
        serde_json::from_value(rows).map_err(|e| MarketDataError::Decode(e.to_string()))?;

    rows.iter()
        .map(|row| {
            let open_time = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| MarketDataError::Decode("missing time".to_string()))?;
            Ok(Candle {
                open_time,
                open: row_num(row, 1, "open")?,
                high: row_num(row, 2, "high")?,
                low: row_num(row, 3, "low")?,
                close: row_num(row, 4, "close")?,
                volume: row_num(row, 6, "volume")?,
            })
        })
        .collect()
}

/// Parse a `/Ticker` body for a single pair.
pub fn parse_ticker(body: &str) -> MarketResult<TickerSnapshot> {
    let entry = pair_entry(unwrap_envelope(body)?)?;
    let t: KrakenTicker =
        serde_json::from_value(entry).map_err(|e| MarketDataError::Decode(e.to_string()))?;

    let pick = |values: &[String], idx: usize, field: &str| -> MarketResult<f64> {
        values
            .get(idx)
            .ok_or_else(|| MarketDataError::Decode(format!("missing {field}")))
            .and_then(|s| parse_num(field, s))
    };

    Ok(TickerSnapshot {
        last_price: pick(&t.c, 0, "last")?,
        volume_24h: pick(&t.v, 1, "volume")?,
        open_price_24h: parse_num("open", &t.o)?,
        high_24h: pick(&t.h, 1, "high")?,
        low_24h: pick(&t.l, 1, "low")?,
    })
}

/// Drop the last row, which is the still-open interval, and keep the
/// newest `max` closed candles.
fn closed_candles(mut candles: Vec<Candle>, max: usize) -> Vec<Candle> {
    candles.pop();
    if candles.len() > max {
        candles.drain(..candles.len() - max);
    }
    candles
}

/// Parse an `/AssetPairs` body, keeping online pairs quoted in `quote`.
pub fn parse_asset_pairs(body: &str, quote: &str) -> MarketResult<Vec<AssetPair>> {
    let result = unwrap_envelope(body)?;
    let pairs: std::collections::HashMap<String, KrakenAssetPair> =
        serde_json::from_value(result).map_err(|e| MarketDataError::Decode(e.to_string()))?;

    let suffix = format!("/{}", quote.to_ascii_uppercase());
    let mut out: Vec<AssetPair> = pairs
        .into_values()
        .filter(|p| p.status.as_deref().map_or(true, |s| s == "online"))
        .filter(|p| !p.altname.ends_with(".d"))
        .filter_map(|p| match p.wsname {
            Some(ws) if ws.ends_with(&suffix) => Some(AssetPair::with_display(p.altname, ws)),
            _ => None,
        })
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(out)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Kraken public market-data client.
pub struct KrakenClient {
    http: reqwest::Client,
    base_url: String,
    /// Keep only the most recent candles.
    max_candles: usize,
}

impl KrakenClient {
    pub fn new(base_url: Option<String>, timeout: Duration, max_candles: usize) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_candles,
        })
    }

    async fn get(&self, path: &str, query: &str) -> MarketResult<String> {
        let url = if query.is_empty() {
            format!("{}/{path}", self.base_url)
        } else {
            format!("{}/{path}?{query}", self.base_url)
        };
        debug!(url = %url, "Kraken request");

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
impl MarketDataSource for KrakenClient {
    async fn fetch_ticker(&self, pair_id: &str) -> MarketResult<TickerSnapshot> {
        let body = self
            .get("Ticker", &format!("pair={}", urlencoding::encode(pair_id)))
            .await?;
        parse_ticker(&body)
    }

    async fn fetch_candles(
        &self,
        pair_id: &str,
        interval_minutes: u32,
    ) -> MarketResult<Vec<Candle>> {
        if !VALID_INTERVALS.contains(&interval_minutes) {
            return Err(MarketDataError::Provider(format!(
                "unsupported interval {interval_minutes}m"
            )));
        }
        let body = self
            .get(
                "OHLC",
                &format!("pair={}&interval={interval_minutes}", urlencoding::encode(pair_id)),
            )
            .await?;
        Ok(closed_candles(parse_ohlc(&body)?, self.max_candles))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl PairCatalog for KrakenClient {
    async fn list_quoted_pairs(&self, quote_currency: &str) -> MarketResult<Vec<AssetPair>> {
        let body = self.get("AssetPairs", "").await?;
        parse_asset_pairs(&body, quote_currency)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
