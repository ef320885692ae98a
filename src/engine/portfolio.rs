//! Paper portfolio: simulated positions driven by scan results.
//!
//! Nothing here touches an exchange. Each scan closes held positions the
//! scanner now rates SELL or AVOID, then opens new ones from the top of
//! the ranking for BUY / STRONG_BUY pairs. Money is tracked in `Decimal`
//! so repeated small trades do not drift.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use crate::types::{AssetPair, ScanResult, ScannerError};

/// Trades kept in memory; older ones are dropped.
const TRADE_LOG_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioConfig {
    pub starting_cash: Decimal,
    pub max_positions: usize,
    /// Fraction of free cash committed to each new position.
    pub invest_fraction: Decimal,
    /// A buy must commit more than this.
    pub min_trade: Decimal,
    /// Only the `top_n` ranked pairs are buy candidates.
    pub top_n: usize,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            starting_cash: dec!(50),
            max_positions: 7,
            invest_fraction: dec!(0.2),
            min_trade: dec!(1),
            top_n: 10,
        }
    }
}

impl PortfolioConfig {
    /// Convert float settings from the config file.
    pub fn from_floats(
        starting_cash: f64,
        max_positions: usize,
        invest_fraction: f64,
        min_trade: f64,
        top_n: usize,
    ) -> Result<Self, ScannerError> {
        let money = |field: &str, v: f64| {
            Decimal::from_f64(v).map(|d| d.round_dp(8)).ok_or_else(|| {
                ScannerError::Config(format!("paper.{field} is not a valid amount: {v}"))
            })
        };
        Ok(Self {
            starting_cash: money("starting_cash", starting_cash)?,
            max_positions,
            invest_fraction: money("invest_fraction", invest_fraction)?,
            min_trade: money("min_trade", min_trade)?,
            top_n,
        })
    }
}

// ---------------------------------------------------------------------------
// Positions & trades
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub pair: AssetPair,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Cash spent opening the position.
    pub cost: Decimal,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperTrade {
    pub timestamp: DateTime<Utc>,
    pub pair_id: String,
    pub side: TradeSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub value: Decimal,
    /// Realised profit, sells only.
    pub pnl: Option<Decimal>,
    /// Score and action that triggered the trade.
    pub reason: String,
}

/// A held position valued at the latest scan.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub pair: AssetPair,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub value: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Serializable view for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub cash: Decimal,
    pub equity: Decimal,
    pub starting_cash: Decimal,
    pub realized_pnl: Decimal,
    pub positions: Vec<PositionView>,
    pub recent_trades: Vec<PaperTrade>,
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PaperPortfolio {
    config: PortfolioConfig,
    cash: Decimal,
    positions: BTreeMap<String, Position>,
    trades: VecDeque<PaperTrade>,
    realized_pnl: Decimal,
}

impl PaperPortfolio {
    pub fn new(config: PortfolioConfig) -> Self {
        Self {
            cash: config.starting_cash,
            config,
            positions: BTreeMap::new(),
            trades: VecDeque::new(),
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, pair_id: &str) -> Option<&Position> {
        self.positions.get(pair_id)
    }

    /// Most recent trades, newest last.
    pub fn recent_trades(&self, n: usize) -> Vec<PaperTrade> {
        let skip = self.trades.len().saturating_sub(n);
        self.trades.iter().skip(skip).cloned().collect()
    }

    /// Act on one scan: sells first, then buys. Returns the trades made.
    pub fn apply(&mut self, scan: &ScanResult) -> Vec<PaperTrade> {
        let mut made = Vec::new();

        // 1. Close positions the scanner turned against
        let to_close: Vec<(String, Decimal, String)> = self
            .positions
            .keys()
            .filter_map(|id| {
                let asset = scan.find(id)?;
                if !asset.action.is_sell() {
                    return None;
                }
                let price = to_price(asset.price)?;
                Some((id.clone(), price, format!("{} (score {})", asset.action, asset.score)))
            })
            .collect();

        for (id, price, reason) in to_close {
            if let Some(trade) = self.close(&id, price, reason) {
                made.push(trade);
            }
        }

        // 2. Open new positions from the top of the ranking
        for asset in scan.scored.iter().take(self.config.top_n) {
            if !asset.action.is_buy() || self.positions.contains_key(&asset.pair.id) {
                continue;
            }
            if self.positions.len() >= self.config.max_positions {
                debug!("Max paper positions reached");
                break;
            }
            let Some(price) = to_price(asset.price) else {
                continue;
            };
            let amount = (self.cash * self.config.invest_fraction).round_dp(2);
            if amount <= self.config.min_trade {
                debug!(cash = %self.cash, "Paper cash below minimum trade");
                break;
            }

            let quantity = (amount / price).round_dp(8);
            self.cash -= amount;
            self.positions.insert(
                asset.pair.id.clone(),
                Position {
                    pair: asset.pair.clone(),
                    quantity,
                    entry_price: price,
                    cost: amount,
                    opened_at: Utc::now(),
                },
            );

            let trade = PaperTrade {
                timestamp: Utc::now(),
                pair_id: asset.pair.id.clone(),
                side: TradeSide::Buy,
                price,
                quantity,
                value: amount,
                pnl: None,
                reason: format!("{} (score {})", asset.action, asset.score),
            };
            info!(
                pair = %trade.pair_id,
                price = %price,
                amount = %amount,
                cash = %self.cash,
                "Paper BUY"
            );
            self.record(trade.clone());
            made.push(trade);
        }

        made
    }

    fn close(&mut self, pair_id: &str, price: Decimal, reason: String) -> Option<PaperTrade> {
        let position = self.positions.remove(pair_id)?;
        let value = (position.quantity * price).round_dp(8);
        let pnl = value - position.cost;
        self.cash += value;
        self.realized_pnl += pnl;

        let trade = PaperTrade {
            timestamp: Utc::now(),
            pair_id: pair_id.to_string(),
            side: TradeSide::Sell,
            price,
            quantity: position.quantity,
            value,
            pnl: Some(pnl),
            reason,
        };
        info!(
            pair = %pair_id,
            price = %price,
            value = %value,
            pnl = %pnl,
            "Paper SELL"
        );
        self.record(trade.clone());
        Some(trade)
    }

    fn record(&mut self, trade: PaperTrade) {
        if self.trades.len() == TRADE_LOG_LIMIT {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    /// Latest price for a held pair: scanned price, else entry price.
    fn mark_price(position: &Position, scan: Option<&ScanResult>) -> Decimal {
        scan.and_then(|s| s.find(&position.pair.id))
            .and_then(|a| to_price(a.price))
            .unwrap_or(position.entry_price)
    }

    /// Cash plus positions valued at the scan's prices.
    pub fn equity(&self, scan: Option<&ScanResult>) -> Decimal {
        self.positions.values().fold(self.cash, |acc, p| {
            acc + (p.quantity * Self::mark_price(p, scan)).round_dp(8)
        })
    }

    pub fn snapshot(&self, scan: Option<&ScanResult>, recent: usize) -> PortfolioSnapshot {
        let positions = self
            .positions
            .values()
            .map(|p| {
                let current_price = Self::mark_price(p, scan);
                let value = (p.quantity * current_price).round_dp(8);
                PositionView {
                    pair: p.pair.clone(),
                    quantity: p.quantity,
                    entry_price: p.entry_price,
                    current_price,
                    value,
                    unrealized_pnl: value - p.cost,
                }
            })
            .collect();

        PortfolioSnapshot {
            cash: self.cash,
            equity: self.equity(scan),
            starting_cash: self.config.starting_cash,
            realized_pnl: self.realized_pnl,
            positions,
            recent_trades: self.recent_trades(recent),
        }
    }
}

fn to_price(price: f64) -> Option<Decimal> {
    Decimal::from_f64(price).filter(|p| p.is_sign_positive() && !p.is_zero())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
