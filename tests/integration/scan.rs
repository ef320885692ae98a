//! End-to-end scans against the mock source.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alpha_scanner::engine::scanner::{DataMode, ScanOrchestrator, ScanSettings};
use alpha_scanner::indicators::IndicatorCalculator;
use alpha_scanner::market::MarketDataError;
use alpha_scanner::scoring::{presets, ScoringEngine};
use alpha_scanner::types::{Action, AssetPair, FailureReason, ScannerError, TickerSnapshot};
use tokio_test::{assert_err, assert_ok};

use crate::mock_source::{flat_candles, random_walk, rising_candles, MockSource, StaticCatalog};

fn settings(pair_timeout_ms: u64, deadline_ms: u64) -> ScanSettings {
    ScanSettings {
        pair_timeout: Duration::from_millis(pair_timeout_ms),
        scan_deadline: Duration::from_millis(deadline_ms),
        ..ScanSettings::default()
    }
}

fn orchestrator(source: MockSource, settings: ScanSettings) -> ScanOrchestrator {
    ScanOrchestrator::new(
        Arc::new(source),
        IndicatorCalculator::default(),
        ScoringEngine::default(),
        settings,
    )
}

fn pairs(ids: &[&str]) -> Vec<AssetPair> {
    ids.iter().map(|id| AssetPair::new(*id)).collect()
}

#[tokio::test]
async fn test_every_pair_scored_or_failed() {
    let source = MockSource::new()
        .with_candles("AAA", rising_candles(80, 100.0, 1.0))
        .with_candles("BBB", flat_candles(30, 5.0))
        .with_error("CCC", || MarketDataError::RateLimited("mock".into()))
        .with_error("DDD", || MarketDataError::Decode("bad json".into()))
        .with_hang("EEE");
    let ids = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "AAA"];

    let result = orchestrator(source, settings(200, 5_000)).scan(&pairs(&ids)).await;

    assert_eq!(result.scored.len() + result.failures.len(), 6);
    for id in ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF"] {
        let scored = result.find(id).is_some();
        let failed = result.failures.iter().any(|f| f.pair.id == id);
        assert!(scored ^ failed, "{id} must be in exactly one list");
    }
    let reason = |id: &str| result.failures.iter().find(|f| f.pair.id == id).map(|f| f.reason);
    assert_eq!(reason("CCC"), Some(FailureReason::Unavailable));
    assert_eq!(reason("DDD"), Some(FailureReason::InvalidData));
    assert_eq!(reason("EEE"), Some(FailureReason::Timeout));
    assert_eq!(reason("FFF"), Some(FailureReason::Unavailable));
}

#[tokio::test]
async fn test_hanging_pair_does_not_block_others() {
    let source = MockSource::new()
        .with_hang("HANG")
        .with_candles("AAA", rising_candles(60, 10.0, 0.1))
        .with_candles("BBB", flat_candles(20, 3.0));

    let started = Instant::now();
    let result = orchestrator(source, settings(150, 10_000))
        .scan(&pairs(&["HANG", "AAA", "BBB"]))
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.scored.len(), 2);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].pair.id, "HANG");
    assert_eq!(result.failures[0].reason, FailureReason::Timeout);
}

#[tokio::test]
async fn test_provider_timeout_reported_as_timeout() {
    let source = MockSource::new().with_error("SLOW", || MarketDataError::Timeout);
    let result = orchestrator(source, settings(1_000, 5_000))
        .scan(&pairs(&["SLOW"]))
        .await;
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].reason, FailureReason::Timeout);
}

#[tokio::test]
async fn test_scan_deadline_fails_outstanding_pairs() {
    let source = MockSource::new()
        .with_candles("FAST", flat_candles(20, 1.0))
        .with_hang("STUCK");

    let started = Instant::now();
    let result = orchestrator(source, settings(60_000, 300))
        .scan(&pairs(&["FAST", "STUCK"]))
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.find("FAST").is_some());
    assert_eq!(result.failures[0].pair.id, "STUCK");
    assert_eq!(result.failures[0].reason, FailureReason::Timeout);
    assert!(result.failures[0].detail.contains("deadline"));
}

#[tokio::test]
async fn test_cancellation_keeps_finished_pairs() {
    let source = MockSource::new()
        .with_candles("DONE", flat_candles(20, 1.0))
        .with_hang("WAIT1")
        .with_hang("WAIT2");

    let result = orchestrator(source, settings(60_000, 60_000))
        .scan_until(
            &pairs(&["WAIT2", "DONE", "WAIT1"]),
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

    assert_eq!(result.scored.len(), 1);
    assert_eq!(result.scored[0].pair.id, "DONE");
    let failed: Vec<_> = result.failures.iter().map(|f| (f.pair.id.as_str(), f.reason)).collect();
    assert_eq!(
        failed,
        vec![("WAIT1", FailureReason::Cancelled), ("WAIT2", FailureReason::Cancelled)]
    );
}

#[tokio::test]
async fn test_equal_scores_sorted_by_pair_id() {
    let source = MockSource::new()
        .with_candles("CCC", flat_candles(20, 3.0))
        .with_candles("AAA", flat_candles(20, 1.0))
        .with_candles("BBB", flat_candles(20, 2.0));

    let result = orchestrator(source, settings(1_000, 5_000))
        .scan(&pairs(&["CCC", "BBB", "AAA"]))
        .await;

    let ranked: Vec<_> = result.scored.iter().map(|s| (s.pair.id.as_str(), s.score)).collect();
    assert_eq!(ranked, vec![("AAA", 20), ("BBB", 20), ("CCC", 20)]);
}

#[tokio::test]
async fn test_flat_series_only_rsi_rule_fires() {
    let source = MockSource::new().with_candles("FLAT", flat_candles(15, 42.0));
    let result = orchestrator(source, settings(1_000, 5_000))
        .scan(&pairs(&["FLAT"]))
        .await;

    let asset = result.find("FLAT").expect("flat pair scored");
    assert_eq!(asset.indicators.rsi, Some(100.0));
    assert_eq!(asset.triggered, vec!["rsi_above_30".to_string()]);
    assert_eq!(asset.score, 20);
    assert_eq!(asset.action, Action::Sell);
    assert_eq!(asset.price, 42.0);
}

#[tokio::test]
async fn test_strong_uptrend_ranks_first() {
    let source = MockSource::new()
        .with_candles("UP", rising_candles(80, 100.0, 1.0))
        .with_candles("FLAT", flat_candles(80, 100.0));

    let result = orchestrator(source, settings(1_000, 5_000))
        .scan(&pairs(&["FLAT", "UP"]))
        .await;

    let best = result.best().unwrap();
    assert_eq!(best.pair.id, "UP");
    assert!(best.action.is_buy(), "uptrend should be a buy, got {}", best.action);
    assert!(best.triggered.contains(&"ema_trend".to_string()));
    assert!(best.triggered.contains(&"volume_surge".to_string()));
    assert!(best.triggered.contains(&"breakout".to_string()));
}

#[tokio::test]
async fn test_empty_pair_set() {
    let source = MockSource::new();
    let result = orchestrator(source, settings(1_000, 5_000)).scan(&[]).await;
    assert_eq!(result.total_pairs(), 0);
    assert!(result.best().is_none());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let mut source = MockSource::new();
    let ids: Vec<String> = (0..12).map(|i| format!("P{i:02}")).collect();
    for id in &ids {
        source = source.with_delayed_candles(id, Duration::from_millis(40), flat_candles(20, 1.0));
    }
    let source = Arc::new(source);

    let orch = ScanOrchestrator::new(
        source.clone(),
        IndicatorCalculator::default(),
        ScoringEngine::default(),
        ScanSettings {
            max_concurrency: 3,
            ..settings(5_000, 10_000)
        },
    );
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let result = orch.scan(&pairs(&id_refs)).await;

    assert_eq!(result.scored.len(), 12);
    assert!(source.peak_in_flight() <= 3, "peak was {}", source.peak_in_flight());
    assert_eq!(source.calls().len(), 12);
}

#[tokio::test]
async fn test_overlapping_scans_are_independent() {
    let source = MockSource::new()
        .with_delayed_candles("AAA", Duration::from_millis(50), flat_candles(20, 1.0))
        .with_delayed_candles("BBB", Duration::from_millis(50), rising_candles(60, 1.0, 0.01));
    let orch = Arc::new(orchestrator(source, settings(1_000, 5_000)));

    let first = pairs(&["AAA", "BBB"]);
    let second = pairs(&["BBB"]);
    let (a, b) = tokio::join!(orch.scan(&first), orch.scan(&second));

    assert_eq!(a.total_pairs(), 2);
    assert_eq!(b.total_pairs(), 1);
    assert_ne!(a.scan_id, b.scan_id);
    assert_eq!(a.find("BBB").unwrap().score, b.find("BBB").unwrap().score);
}

#[tokio::test]
async fn test_forced_provider_error_fails_every_pair() {
    let source = MockSource::new()
        .with_candles("AAA", flat_candles(20, 1.0))
        .with_candles("BBB", flat_candles(20, 1.0));
    source.set_error("maintenance");

    let result = orchestrator(source, settings(1_000, 5_000))
        .scan(&pairs(&["AAA", "BBB"]))
        .await;
    assert!(result.scored.is_empty());
    assert!(result
        .failures
        .iter()
        .all(|f| f.reason == FailureReason::Unavailable && f.detail.contains("maintenance")));
}

#[tokio::test]
async fn test_ticker_mode_with_momentum_preset() {
    let ticker = |last: f64, open: f64| TickerSnapshot {
        last_price: last,
        volume_24h: 1_000.0,
        open_price_24h: open,
        high_24h: last.max(open),
        low_24h: last.min(open),
    };
    let source = MockSource::new()
        .with_ticker("PUMP", ticker(108.0, 100.0))
        .with_ticker("DUMP", ticker(96.0, 100.0))
        .with_ticker("FLAT", ticker(100.0, 100.0));

    let orch = ScanOrchestrator::new(
        Arc::new(source),
        IndicatorCalculator::default(),
        assert_ok!(ScoringEngine::new(presets::momentum_24h())),
        ScanSettings {
            data_mode: DataMode::Ticker,
            ..settings(1_000, 5_000)
        },
    );
    let result = orch.scan(&pairs(&["DUMP", "FLAT", "PUMP"])).await;

    let ranked: Vec<_> = result
        .scored
        .iter()
        .map(|s| (s.pair.id.as_str(), s.score, s.action))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("PUMP", 5, Action::StrongBuy),
            ("FLAT", 0, Action::Hold),
            ("DUMP", -3, Action::Sell),
        ]
    );
}

#[tokio::test]
async fn test_scan_catalog_filters_by_quote() {
    let source = MockSource::new()
        .with_candles("XBTUSD", rising_candles(60, 100.0, 1.0))
        .with_candles("ETHUSD", flat_candles(20, 10.0));
    let catalog = StaticCatalog {
        pairs: Ok(pairs(&["XBTUSD", "ETHUSD", "XBTEUR"])),
    };

    let result = assert_ok!(
        orchestrator(source, settings(1_000, 5_000))
            .scan_catalog(&catalog, "USD")
            .await
    );
    assert_eq!(result.total_pairs(), 2);
    assert!(result.find("XBTEUR").is_none());
}

#[tokio::test]
async fn test_scan_catalog_failure_surfaces() {
    let catalog = StaticCatalog {
        pairs: Err("connection refused".into()),
    };
    let err = assert_err!(
        orchestrator(MockSource::new(), settings(1_000, 5_000))
            .scan_catalog(&catalog, "USD")
            .await
    );
    assert!(matches!(err, ScannerError::Catalog(ref msg) if msg.contains("connection refused")));
}

#[test]
fn test_scores_stay_in_range_for_every_preset() {
    let calculator = IndicatorCalculator::default();
    for name in presets::NAMES {
        let engine = ScoringEngine::new(presets::by_name(name).unwrap()).unwrap();
        let cfg = engine.config().clone();
        for seed in 0..50u64 {
            let candles = random_walk(20 + (seed as usize * 3) % 100, seed);
            let asset = alpha_scanner::engine::scanner::score_pair(
                &calculator,
                &engine,
                &AssetPair::new(format!("R{seed}")),
                candles,
                None,
            )
            .unwrap();
            assert!(
                (cfg.min_score..=cfg.max_score).contains(&asset.score),
                "{name}: score {} outside [{}, {}]",
                asset.score,
                cfg.min_score,
                cfg.max_score
            );
            // Same input, same output
            let again = engine.score(asset.price, &asset.indicators);
            assert_eq!(again.score, asset.score);
        }
    }
}
