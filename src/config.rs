//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs, then
//! validates everything that would otherwise fail deep inside a scan.
//! A config that does not validate is fatal at startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::portfolio::PortfolioConfig;
use crate::engine::scanner::{DataMode, ScanSettings};
use crate::indicators::IndicatorConfig;
use crate::scoring::{ScoringConfig, ScoringSettings};
use crate::types::{AssetPair, ScannerError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub name: String,
    pub scan_interval_secs: u64,
    /// Candle interval requested from the provider.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default)]
    pub data_mode: DataMode,
    pub pair_timeout_secs: u64,
    pub scan_deadline_secs: u64,
    pub max_concurrency: usize,
    /// Fixed pair list. Takes precedence over `quote_currency`.
    #[serde(default)]
    pub pairs: Vec<String>,
    /// Scan every pair the provider quotes in this currency.
    #[serde(default)]
    pub quote_currency: Option<String>,
}

fn default_interval_minutes() -> u32 {
    60
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Kraken,
    CoinGecko,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Most recent candles kept per pair.
    #[serde(default = "default_max_candles")]
    pub max_candles: usize,
    /// Pairs returned by catalog discovery (CoinGecko).
    #[serde(default = "default_catalog_limit")]
    pub catalog_limit: u32,
    /// Pricing currency for CoinGecko coin ids.
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_candles() -> usize {
    200
}

fn default_catalog_limit() -> u32 {
    35
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaperConfig {
    pub enabled: bool,
    pub starting_cash: f64,
    pub max_positions: usize,
    /// Fraction of free cash committed per buy.
    pub invest_fraction: f64,
    pub min_trade: f64,
    /// Only the top N ranked assets are buy candidates.
    pub top_n: usize,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            starting_cash: 50.0,
            max_positions: 7,
            invest_fraction: 0.2,
            min_trade: 1.0,
            top_n: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl PaperConfig {
    pub fn portfolio_config(&self) -> Result<PortfolioConfig, ScannerError> {
        PortfolioConfig::from_floats(
            self.starting_cash,
            self.max_positions,
            self.invest_fraction,
            self.min_trade,
            self.top_n,
        )
    }
}

/// What a scan covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    Pairs(Vec<AssetPair>),
    Quote(String),
}

impl ScannerConfig {
    pub fn target(&self) -> Result<ScanTarget, ScannerError> {
        if !self.pairs.is_empty() {
            return Ok(ScanTarget::Pairs(
                self.pairs.iter().map(|p| AssetPair::new(p.trim())).collect(),
            ));
        }
        match self.quote_currency.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => Ok(ScanTarget::Quote(q.to_string())),
            _ => Err(ScannerError::Config(
                "scanner needs either `pairs` or `quote_currency`".to_string(),
            )),
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            data_mode: self.data_mode,
            interval_minutes: self.interval_minutes,
            pair_timeout: Duration::from_secs(self.pair_timeout_secs),
            scan_deadline: Duration::from_secs(self.scan_deadline_secs),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot produce a meaningful scan.
    pub fn validate(&self) -> Result<(), ScannerError> {
        let s = &self.scanner;
        if let ScanTarget::Quote(quote) = s.target()? {
            // CoinGecko prices everything in vs_currency
            if self.provider.kind == ProviderKind::CoinGecko
                && !quote.eq_ignore_ascii_case(self.provider.vs_currency.trim())
            {
                return Err(ScannerError::Config(format!(
                    "scanner.quote_currency {quote} must match provider.vs_currency {}",
                    self.provider.vs_currency
                )));
            }
        }
        if s.pairs.iter().any(|p| p.trim().is_empty()) {
            return Err(ScannerError::Config("scanner.pairs contains an empty id".into()));
        }
        if s.scan_interval_secs == 0 {
            return Err(ScannerError::Config("scanner.scan_interval_secs must be > 0".into()));
        }
        if s.interval_minutes == 0 {
            return Err(ScannerError::Config("scanner.interval_minutes must be > 0".into()));
        }
        if s.pair_timeout_secs == 0 || s.scan_deadline_secs == 0 {
            return Err(ScannerError::Config(
                "scanner timeouts must be > 0 seconds".into(),
            ));
        }
        if s.max_concurrency == 0 {
            return Err(ScannerError::Config("scanner.max_concurrency must be > 0".into()));
        }
        if self.provider.request_timeout_secs == 0 || self.provider.max_candles == 0 {
            return Err(ScannerError::Config(
                "provider.request_timeout_secs and max_candles must be > 0".into(),
            ));
        }

        self.indicators.validate()?;
        self.scoring_config()?;

        let p = &self.paper;
        if p.enabled {
            if !(p.starting_cash.is_finite() && p.starting_cash > 0.0) {
                return Err(ScannerError::Config("paper.starting_cash must be > 0".into()));
            }
            if !(p.invest_fraction > 0.0 && p.invest_fraction <= 1.0) {
                return Err(ScannerError::Config("paper.invest_fraction must be in (0, 1]".into()));
            }
            if p.max_positions == 0 || p.top_n == 0 {
                return Err(ScannerError::Config(
                    "paper.max_positions and paper.top_n must be > 0".into(),
                ));
            }
            if !(p.min_trade.is_finite() && p.min_trade >= 0.0) {
                return Err(ScannerError::Config("paper.min_trade must be >= 0".into()));
            }
            p.portfolio_config()?;
        }
        Ok(())
    }

    /// Resolved scoring table; defaults to the `structured_alpha` preset.
    pub fn scoring_config(&self) -> Result<ScoringConfig, ScannerError> {
        let mut settings = self.scoring.clone();
        if settings.preset.is_none() && settings.rules.is_none() {
            settings.preset = Some("structured_alpha".to_string());
        }
        settings.resolve()
    }
}
