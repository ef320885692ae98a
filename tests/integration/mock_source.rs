//! Mock market-data source for integration testing.
//!
//! Provides a deterministic `MarketDataSource` whose per-pair behaviour
//! is scripted from test code: canned candles or tickers, an optional
//! delay, a typed error, or a request that never completes. Everything
//! is in-memory with no external dependencies.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alpha_scanner::market::{MarketDataError, MarketDataSource, MarketResult, PairCatalog};
use alpha_scanner::types::{AssetPair, Candle, TickerSnapshot};

/// What a pair's fetch does.
#[derive(Clone)]
pub enum Script {
    /// Return these candles.
    Candles(Vec<Candle>),
    /// Fail with the error built by this function.
    Fail(fn() -> MarketDataError),
    /// Never complete.
    Hang,
}

/// A mock provider for deterministic scan tests.
///
/// Unscripted pairs return `NotFound`. Call counts and the peak number of
/// concurrent requests are recorded for assertions.
pub struct MockSource {
    scripts: HashMap<String, (Duration, Script)>,
    tickers: HashMap<String, TickerSnapshot>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    /// If set, every request fails with this provider error.
    force_error: Arc<Mutex<Option<String>>>,
}

/// Decrements the in-flight counter even when the request is aborted.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            tickers: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_candles(self, pair_id: &str, candles: Vec<Candle>) -> Self {
        self.with_script(pair_id, Duration::ZERO, Script::Candles(candles))
    }

    pub fn with_delayed_candles(
        self,
        pair_id: &str,
        delay: Duration,
        candles: Vec<Candle>,
    ) -> Self {
        self.with_script(pair_id, delay, Script::Candles(candles))
    }

    pub fn with_error(self, pair_id: &str, error: fn() -> MarketDataError) -> Self {
        self.with_script(pair_id, Duration::ZERO, Script::Fail(error))
    }

    pub fn with_hang(self, pair_id: &str) -> Self {
        self.with_script(pair_id, Duration::ZERO, Script::Hang)
    }

    pub fn with_ticker(mut self, pair_id: &str, ticker: TickerSnapshot) -> Self {
        self.tickers.insert(pair_id.to_string(), ticker);
        self
    }

    pub fn with_script(mut self, pair_id: &str, delay: Duration, script: Script) -> Self {
        self.scripts.insert(pair_id.to_string(), (delay, script));
        self
    }

    /// Force all subsequent requests to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Pair ids requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, pair_id: &str) -> MarketResult<InFlight> {
        self.calls.lock().unwrap().push(pair_id.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(self.in_flight.clone());

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(MarketDataError::Provider(msg));
        }
        Ok(guard)
    }
}

#[async_trait]
impl MarketDataSource for MockSource {
    async fn fetch_ticker(&self, pair_id: &str) -> MarketResult<TickerSnapshot> {
        let _guard = self.enter(pair_id)?;
        self.tickers
            .get(pair_id)
            .copied()
            .ok_or_else(|| MarketDataError::NotFound(pair_id.to_string()))
    }

    async fn fetch_candles(
        &self,
        pair_id: &str,
        _interval_minutes: u32,
    ) -> MarketResult<Vec<Candle>> {
        let _guard = self.enter(pair_id)?;
        let (delay, script) = self
            .scripts
            .get(pair_id)
            .cloned()
            .ok_or_else(|| MarketDataError::NotFound(pair_id.to_string()))?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match script {
            Script::Candles(candles) => Ok(candles),
            Script::Fail(make) => Err(make()),
            Script::Hang => futures::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Catalog returning a fixed list, or failing.
pub struct StaticCatalog {
    pub pairs: Result<Vec<AssetPair>, String>,
}

#[async_trait]
impl PairCatalog for StaticCatalog {
    async fn list_quoted_pairs(&self, quote_currency: &str) -> MarketResult<Vec<AssetPair>> {
        match &self.pairs {
            Ok(pairs) => Ok(pairs
                .iter()
                .filter(|p| p.id.ends_with(quote_currency))
                .cloned()
                .collect()),
            Err(msg) => Err(MarketDataError::Http(msg.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Candle builders
// ---------------------------------------------------------------------------

fn candle(i: usize, close: f64, volume: f64) -> Candle {
    Candle {
        open_time: 1_700_000_000 + i as i64 * 3600,
        open: close,
        high: close * 1.005,
        low: close * 0.995,
        close,
        volume,
    }
}

/// `n` candles with the same close.
pub fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
    (0..n).map(|i| candle(i, price, 100.0)).collect()
}

/// `n` candles climbing by `step` per candle, with a volume spike on the last.
pub fn rising_candles(n: usize, start: f64, step: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let volume = if i + 1 == n { 500.0 } else { 100.0 };
            candle(i, start + step * i as f64, volume)
        })
        .collect()
}

/// Deterministic pseudo-random walk for property-style checks.
pub fn random_walk(n: usize, seed: u64) -> Vec<Candle> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64) / ((1u64 << 31) as f64)
    };

    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let open = price;
            price = (price * (1.0 + (next() - 0.5) * 0.08)).max(0.01);
            let high = open.max(price) * (1.0 + next() * 0.02);
            let low = open.min(price) * (1.0 - next() * 0.02);
            Candle {
                open_time: 1_700_000_000 + i as i64 * 3600,
                open,
                high,
                low,
                close: price,
                volume: next() * 1000.0,
            }
        })
        .collect()
}
