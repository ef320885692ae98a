//! Concurrent multi-pair scanner.
//!
//! Fans out one task per pair, bounded by a semaphore. Each task fetches
//! its market data under a per-pair timeout, computes indicators, scores
//! them and reports a single outcome over an mpsc channel. The aggregator
//! owns all results: it stops at the first of "every pair reported",
//! the scan deadline, or the caller's cancel future, and aborts whatever
//! is still running. Pairs that never reported are recorded as failures,
//! so every distinct input pair ends up either scored or failed.

use futures::future;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::indicators::IndicatorCalculator;
use crate::market::{MarketDataError, MarketDataSource, MarketResult, PairCatalog};
use crate::scoring::ScoringEngine;
use crate::types::{
    AssetPair, Candle, CandleSeries, FailureReason, ScanFailure, ScanResult, ScannerError,
    ScoredAsset, TickerSnapshot,
};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Which market data a pair needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// OHLCV candles only.
    #[default]
    Candles,
    /// 24h ticker only. Candle-based indicators stay undefined.
    Ticker,
    /// Both; the pair fails if either request fails.
    Both,
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub data_mode: DataMode,
    pub interval_minutes: u32,
    /// Budget for one pair's fetches, not counting time queued on the semaphore.
    pub pair_timeout: Duration,
    /// Budget for the whole scan.
    pub scan_deadline: Duration,
    pub max_concurrency: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            data_mode: DataMode::Candles,
            interval_minutes: 60,
            pair_timeout: Duration::from_secs(10),
            scan_deadline: Duration::from_secs(45),
            max_concurrency: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Outcome reported by one pair task.
#[derive(Debug)]
enum PairOutcome {
    Scored(ScoredAsset),
    Failed(ScanFailure),
}

/// Runs scans against one data source.
///
/// Holds no per-scan state, so a single orchestrator can run overlapping
/// scans from several tasks.
pub struct ScanOrchestrator {
    source: Arc<dyn MarketDataSource>,
    calculator: IndicatorCalculator,
    engine: Arc<ScoringEngine>,
    settings: ScanSettings,
}

impl ScanOrchestrator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        calculator: IndicatorCalculator,
        engine: ScoringEngine,
        settings: ScanSettings,
    ) -> Self {
        Self {
            source,
            calculator,
            engine: Arc::new(engine),
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Scan `pairs` until every pair reports or the deadline elapses.
    pub async fn scan(&self, pairs: &[AssetPair]) -> ScanResult {
        self.scan_until(pairs, future::pending::<()>()).await
    }

    /// Scan pairs discovered from `catalog` for a quote currency.
    ///
    /// Catalog failure is a scan-level error; per-pair failures are not.
    pub async fn scan_catalog(
        &self,
        catalog: &dyn PairCatalog,
        quote_currency: &str,
    ) -> Result<ScanResult, ScannerError> {
        self.scan_catalog_until(catalog, quote_currency, future::pending::<()>())
            .await
    }

    pub async fn scan_catalog_until<F>(
        &self,
        catalog: &dyn PairCatalog,
        quote_currency: &str,
        cancel: F,
    ) -> Result<ScanResult, ScannerError>
    where
        F: Future<Output = ()>,
    {
        let pairs = catalog
            .list_quoted_pairs(quote_currency)
            .await
            .map_err(|e| ScannerError::Catalog(format!("{quote_currency}: {e}")))?;
        info!(quote = quote_currency, pairs = pairs.len(), "Pair catalog loaded");
        Ok(self.scan_until(&pairs, cancel).await)
    }

    /// Scan `pairs`, stopping early when `cancel` resolves.
    ///
    /// Pairs still in flight when the deadline elapses fail with
    /// `timeout`; pairs still in flight at cancellation fail with
    /// `cancelled`.
    pub async fn scan_until<F>(&self, pairs: &[AssetPair], cancel: F) -> ScanResult
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let pairs = dedup_pairs(pairs);
        if pairs.is_empty() {
            debug!("Empty pair set, nothing to scan");
            return ScanResult::empty();
        }

        info!(
            pairs = pairs.len(),
            source = self.source.name(),
            mode = ?self.settings.data_mode,
            "Starting scan"
        );

        let (tx, mut rx) = mpsc::channel::<(usize, PairOutcome)>(pairs.len());
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));

        let handles: Vec<_> = pairs
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, pair)| {
                let tx = tx.clone();
                let permits = Arc::clone(&permits);
                let source = Arc::clone(&self.source);
                let engine = Arc::clone(&self.engine);
                let calculator = self.calculator;
                let settings = self.settings.clone();

                tokio::spawn(async move {
                    let outcome = match permits.acquire_owned().await {
                        Ok(_permit) => {
                            evaluate_pair(source.as_ref(), &calculator, &engine, &settings, pair)
                                .await
                        }
                        Err(_) => PairOutcome::Failed(ScanFailure::new(
                            pair,
                            FailureReason::Unavailable,
                            "scan shut down",
                        )),
                    };
                    // Receiver gone means the scan already finished without us
                    let _ = tx.send((index, outcome)).await;
                })
            })
            .collect();
        drop(tx);

        let mut outcomes: Vec<Option<PairOutcome>> = pairs.iter().map(|_| None).collect();
        let mut reported = 0usize;

        let deadline = tokio::time::sleep(self.settings.scan_deadline);
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        let cutoff = loop {
            tokio::select! {
                biased;

                msg = rx.recv() => match msg {
                    Some((index, outcome)) => {
                        if outcomes[index].replace(outcome).is_none() {
                            reported += 1;
                        }
                        if reported == pairs.len() {
                            break None;
                        }
                    }
                    None => break None,
                },
                _ = &mut cancel => {
                    warn!(outstanding = pairs.len() - reported, "Scan cancelled");
                    break Some((FailureReason::Cancelled, "scan cancelled".to_string()));
                }
                _ = &mut deadline => {
                    warn!(outstanding = pairs.len() - reported, "Scan deadline elapsed");
                    break Some((
                        FailureReason::Timeout,
                        format!("scan deadline of {:?} elapsed", self.settings.scan_deadline),
                    ));
                }
            }
        };

        for handle in &handles {
            handle.abort();
        }

        let (reason, detail) = cutoff.unwrap_or_else(|| {
            (
                FailureReason::Unavailable,
                "pair task ended without reporting".to_string(),
            )
        });

        let mut scored = Vec::new();
        let mut failures = Vec::new();
        for (pair, outcome) in pairs.into_iter().zip(outcomes) {
            match outcome {
                Some(PairOutcome::Scored(asset)) => scored.push(asset),
                Some(PairOutcome::Failed(failure)) => failures.push(failure),
                None => failures.push(ScanFailure::new(pair, reason, detail.clone())),
            }
        }

        for failure in &failures {
            warn!(
                pair = %failure.pair.id,
                reason = %failure.reason,
                detail = %failure.detail,
                "Pair failed"
            );
        }

        let result = ScanResult::from_parts(scored, failures, elapsed_ms(started));
        info!(
            scan_id = %result.scan_id,
            scored = result.scored.len(),
            failed = result.failures.len(),
            elapsed_ms = result.elapsed_ms,
            best = result.best().map(|b| b.pair.id.as_str()).unwrap_or("-"),
            "Scan complete"
        );
        result
    }
}

// ---------------------------------------------------------------------------
// Per-pair pipeline
// ---------------------------------------------------------------------------

async fn evaluate_pair(
    source: &dyn MarketDataSource,
    calculator: &IndicatorCalculator,
    engine: &ScoringEngine,
    settings: &ScanSettings,
    pair: AssetPair,
) -> PairOutcome {
    let fetched =
        tokio::time::timeout(settings.pair_timeout, fetch_pair(source, &pair.id, settings)).await;

    let (candles, ticker) = match fetched {
        Err(_) => {
            return PairOutcome::Failed(ScanFailure::new(
                pair,
                FailureReason::Timeout,
                format!("no response within {:?}", settings.pair_timeout),
            ))
        }
        Ok(Err(e)) => {
            let reason = market_failure_reason(&e);
            return PairOutcome::Failed(ScanFailure::new(pair, reason, e.to_string()));
        }
        Ok(Ok(data)) => data,
    };

    match score_pair(calculator, engine, &pair, candles, ticker) {
        Ok(asset) => PairOutcome::Scored(asset),
        Err(e) => {
            let reason = scanner_failure_reason(&e);
            PairOutcome::Failed(ScanFailure::new(pair, reason, e.to_string()))
        }
    }
}

async fn fetch_pair(
    source: &dyn MarketDataSource,
    pair_id: &str,
    settings: &ScanSettings,
) -> MarketResult<(Vec<Candle>, Option<TickerSnapshot>)> {
    match settings.data_mode {
        DataMode::Candles => Ok((
            source.fetch_candles(pair_id, settings.interval_minutes).await?,
            None,
        )),
        DataMode::Ticker => Ok((Vec::new(), Some(source.fetch_ticker(pair_id).await?))),
        DataMode::Both => {
            let (candles, ticker) = future::try_join(
                source.fetch_candles(pair_id, settings.interval_minutes),
                source.fetch_ticker(pair_id),
            )
            .await?;
            Ok((candles, Some(ticker)))
        }
    }
}

/// Validate fetched data, compute indicators and score one pair.
///
/// Short history is not an error: indicators that need more candles
/// are left undefined and their rules do not fire.
pub fn score_pair(
    calculator: &IndicatorCalculator,
    engine: &ScoringEngine,
    pair: &AssetPair,
    candles: Vec<Candle>,
    ticker: Option<TickerSnapshot>,
) -> Result<ScoredAsset, ScannerError> {
    let series = CandleSeries::new(&pair.id, candles)?;
    if let Some(t) = &ticker {
        t.validate(&pair.id)?;
    }

    let price = IndicatorCalculator::current_price(&series, ticker.as_ref()).ok_or_else(|| {
        ScannerError::DataUnavailable {
            pair: pair.id.clone(),
            reason: "no market data".to_string(),
        }
    })?;

    let indicators = calculator.snapshot(&series, ticker.as_ref());
    let card = engine.score(price, &indicators);

    debug!(
        pair = %pair.id,
        candles = series.len(),
        price,
        rsi = ?indicators.rsi,
        volume_ratio = ?indicators.volume_ratio,
        raw = card.raw,
        score = card.score,
        action = %card.action,
        "Pair scored"
    );

    Ok(ScoredAsset {
        pair: pair.clone(),
        price,
        indicators,
        score: card.score,
        action: card.action,
        triggered: card.triggered,
    })
}

fn market_failure_reason(e: &MarketDataError) -> FailureReason {
    match e {
        MarketDataError::Timeout => FailureReason::Timeout,
        MarketDataError::Decode(_) => FailureReason::InvalidData,
        _ => FailureReason::Unavailable,
    }
}

fn scanner_failure_reason(e: &ScannerError) -> FailureReason {
    match e {
        ScannerError::InvalidCandle { .. } => FailureReason::InvalidData,
        _ => FailureReason::Unavailable,
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup_pairs(pairs: &[AssetPair]) -> Vec<AssetPair> {
    let mut seen = HashSet::with_capacity(pairs.len());
    pairs
        .iter()
        .filter(|p| seen.insert(p.id.as_str()))
        .cloned()
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
