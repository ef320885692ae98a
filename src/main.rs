//! alpha-scanner: concurrent crypto pair scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the market-data provider and runs a scan every interval until
//! Ctrl+C. A scan in flight at shutdown is cancelled and its partial
//! result still reported.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use alpha_scanner::config::{self, ProviderConfig, ProviderKind, ScanTarget};
use alpha_scanner::dashboard::{self, html::TRADES_SHOWN, routes::DashboardState};
use alpha_scanner::engine::portfolio::PaperPortfolio;
use alpha_scanner::engine::scanner::ScanOrchestrator;
use alpha_scanner::indicators::IndicatorCalculator;
use alpha_scanner::market::coingecko::CoinGeckoClient;
use alpha_scanner::market::kraken::KrakenClient;
use alpha_scanner::market::{MarketDataSource, PairCatalog};
use alpha_scanner::scoring::ScoringEngine;
use alpha_scanner::types::ScanResult;

const BANNER: &str = r#"
    _    _     ____  _   _    _
   / \  | |   |  _ \| | | |  / \
  / _ \ | |   | |_) | |_| | / _ \
 / ___ \| |___|  __/|  _  |/ ___ \
/_/   \_\_____|_|   |_| |_/_/   \_\
          S C A N N E R

  Concurrent multi-pair technical scanner
  v0.1.0
"#;

/// Ranked pairs printed in each scan report.
const REPORT_TOP: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let config_path =
        std::env::var("ALPHA_SCANNER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        name = %cfg.scanner.name,
        provider = ?cfg.provider.kind,
        scan_interval_secs = cfg.scanner.scan_interval_secs,
        data_mode = ?cfg.scanner.data_mode,
        "alpha-scanner starting up"
    );

    // -- Initialise components -------------------------------------------

    let (source, catalog) = build_provider(&cfg.provider)?;
    let target = cfg.scanner.target()?;
    let scoring = ScoringEngine::new(cfg.scoring_config()?)?;
    info!(
        table = %scoring.config().name,
        rules = scoring.config().rules.len(),
        "Scoring table loaded"
    );

    let warmup = cfg.indicators.warmup_candles();
    if cfg.provider.max_candles < warmup {
        warn!(
            max_candles = cfg.provider.max_candles,
            warmup,
            "max_candles is below the indicator warm-up; some indicators will stay undefined"
        );
    }

    let orchestrator = ScanOrchestrator::new(
        source,
        IndicatorCalculator::new(cfg.indicators),
        scoring,
        cfg.scanner.scan_settings(),
    );

    let mut portfolio = if cfg.paper.enabled {
        let pf = PaperPortfolio::new(cfg.paper.portfolio_config()?);
        info!(cash = %pf.cash(), "Paper trading enabled");
        Some(pf)
    } else {
        None
    };

    let dashboard_state = Arc::new(DashboardState::new(cfg.scanner.name.clone()));
    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dashboard_state.clone(), cfg.dashboard.port).await?;
    }

    // Ctrl+C flips the watch; both the loop and any scan in flight observe it
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            let _ = shutdown_tx.send(true);
        }
    });

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.scanner.scan_interval_secs));
    let mut scan_count: u64 = 0;

    info!(
        interval_secs = cfg.scanner.scan_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_signal(shutdown_rx.clone()) => break,
        }

        scan_count += 1;
        let cancel = shutdown_signal(shutdown_rx.clone());
        let result = match &target {
            ScanTarget::Pairs(pairs) => orchestrator.scan_until(pairs, cancel).await,
            ScanTarget::Quote(quote) => {
                match orchestrator
                    .scan_catalog_until(catalog.as_ref(), quote, cancel)
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        error!(error = %e, "Scan failed, continuing to next");
                        continue;
                    }
                }
            }
        };

        log_scan_report(scan_count, &result);

        if let Some(pf) = portfolio.as_mut() {
            let trades = pf.apply(&result);
            info!(
                trades = trades.len(),
                cash = %pf.cash(),
                equity = %pf.equity(Some(&result)),
                realized_pnl = %pf.realized_pnl(),
                positions = pf.positions().count(),
                "Paper portfolio updated"
            );
            dashboard_state
                .set_portfolio(pf.snapshot(Some(&result), TRADES_SHOWN))
                .await;
        }
        dashboard_state.record_scan(result).await;

        if *shutdown_rx.borrow() {
            break;
        }
    }

    info!(scans = scan_count, "alpha-scanner shut down cleanly.");
    Ok(())
}

/// Build the configured provider as both a data source and a pair catalog.
fn build_provider(
    cfg: &ProviderConfig,
) -> Result<(Arc<dyn MarketDataSource>, Arc<dyn PairCatalog>)> {
    let timeout = Duration::from_secs(cfg.request_timeout_secs);
    match cfg.kind {
        ProviderKind::Kraken => {
            let client =
                Arc::new(KrakenClient::new(cfg.base_url.clone(), timeout, cfg.max_candles)?);
            let source: Arc<dyn MarketDataSource> = client.clone();
            let catalog: Arc<dyn PairCatalog> = client;
            Ok((source, catalog))
        }
        ProviderKind::CoinGecko => {
            let client = Arc::new(CoinGeckoClient::new(
                cfg.base_url.clone(),
                &cfg.vs_currency,
                timeout,
                cfg.catalog_limit,
                cfg.max_candles,
            )?);
            let source: Arc<dyn MarketDataSource> = client.clone();
            let catalog: Arc<dyn PairCatalog> = client;
            Ok((source, catalog))
        }
    }
}

/// Resolves once shutdown has been requested. Never resolves if the
/// signal task went away without requesting it.
async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Log a human-readable scan summary.
fn log_scan_report(scan_number: u64, result: &ScanResult) {
    info!(
        scan = scan_number,
        scored = result.scored.len(),
        failed = result.failures.len(),
        elapsed_ms = result.elapsed_ms,
        best = result.best().map(|b| b.pair.label()).unwrap_or("-"),
        best_score = result.best().map(|b| b.score),
        "Scan report"
    );

    for (rank, asset) in result.scored.iter().take(REPORT_TOP).enumerate() {
        info!(rank = rank + 1, "{asset}");
    }

    for asset in result.scored.iter().filter(|a| a.action.is_buy()) {
        info!(
            pair = %asset.pair.id,
            action = %asset.action,
            score = asset.score,
            signals = %asset.triggered.join(","),
            "ALERT {} @ {:.6}",
            asset.pair.label(),
            asset.price
        );
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alpha_scanner=info"));

    let json_logging = std::env::var("ALPHA_SCANNER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
