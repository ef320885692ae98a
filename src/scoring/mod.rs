//! Weighted-rule scoring.
//!
//! Every rule adds its weight when its predicate holds on the indicator
//! snapshot. Rules are independent of each other: the raw score is the
//! plain sum of triggered weights, clamped to the configured range, and
//! the clamped score is mapped onto an action band. A predicate over an
//! indicator that is undefined for lack of history simply does not fire.

pub mod presets;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Action, IndicatorSnapshot, ScannerError};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Condition evaluated against one pair's indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    RsiAbove { value: f64 },
    RsiBelow { value: f64 },
    /// Fast EMA above slow EMA.
    EmaTrendUp,
    EmaTrendDown,
    PriceAboveEmaFast,
    MacdAboveSignal,
    MacdBelowSignal,
    VolumeRatioAbove { value: f64 },
    /// Volatility predicates skip a pair with no price range at all.
    VolatilityAbove { value: f64 },
    VolatilityBelow { value: f64 },
    ChangeAbove { value: f64 },
    ChangeBelow { value: f64 },
    /// Latest close above the prior window's highs.
    Breakout,
}

impl Predicate {
    /// `None` when an indicator the predicate needs is undefined.
    pub fn evaluate(&self, price: f64, ind: &IndicatorSnapshot) -> Option<bool> {
        let hit = match self {
            Predicate::RsiAbove { value } => ind.rsi? > *value,
            Predicate::RsiBelow { value } => ind.rsi? < *value,
            Predicate::EmaTrendUp => ind.ema_fast? > ind.ema_slow?,
            Predicate::EmaTrendDown => ind.ema_fast? < ind.ema_slow?,
            Predicate::PriceAboveEmaFast => price > ind.ema_fast?,
            Predicate::MacdAboveSignal => ind.macd_line? > ind.macd_signal?,
            Predicate::MacdBelowSignal => ind.macd_line? < ind.macd_signal?,
            Predicate::VolumeRatioAbove { value } => ind.volume_ratio? > *value,
            Predicate::VolatilityAbove { value } => ranged(ind)? > *value,
            Predicate::VolatilityBelow { value } => ranged(ind)? < *value,
            Predicate::ChangeAbove { value } => ind.change_pct > *value,
            Predicate::ChangeBelow { value } => ind.change_pct < *value,
            Predicate::Breakout => ind.breakout?,
        };
        Some(hit)
    }

    fn threshold(&self) -> Option<f64> {
        match self {
            Predicate::RsiAbove { value }
            | Predicate::RsiBelow { value }
            | Predicate::VolumeRatioAbove { value }
            | Predicate::VolatilityAbove { value }
            | Predicate::VolatilityBelow { value }
            | Predicate::ChangeAbove { value }
            | Predicate::ChangeBelow { value } => Some(*value),
            _ => None,
        }
    }
}

/// Volatility, undefined for a flat market.
fn ranged(ind: &IndicatorSnapshot) -> Option<f64> {
    Some(ind.volatility_pct).filter(|v| *v > 0.0)
}

/// A named predicate with an integer weight (may be negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub weight: i32,
    pub when: Predicate,
}

impl Rule {
    pub fn new(name: &str, weight: i32, when: Predicate) -> Self {
        Self {
            name: name.to_string(),
            weight,
            when,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Action band boundaries over the clamped score.
///
/// `>= strong_buy` STRONG_BUY, `>= buy` BUY, `<= avoid` AVOID,
/// `<= sell` SELL, anything between is HOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub strong_buy: i32,
    pub buy: i32,
    pub sell: i32,
    pub avoid: i32,
}

impl Thresholds {
    pub fn classify(&self, score: i32) -> Action {
        if score >= self.strong_buy {
            Action::StrongBuy
        } else if score >= self.buy {
            Action::Buy
        } else if score <= self.avoid {
            Action::Avoid
        } else if score <= self.sell {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

/// A complete, validated rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub name: String,
    pub min_score: i32,
    pub max_score: i32,
    pub thresholds: Thresholds,
    pub rules: Vec<Rule>,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ScannerError> {
        let fail =
            |msg: String| Err(ScannerError::Config(format!("scoring '{}': {msg}", self.name)));

        if self.min_score >= self.max_score {
            return fail(format!(
                "min_score ({}) must be below max_score ({})",
                self.min_score, self.max_score
            ));
        }
        let t = &self.thresholds;
        if !(t.avoid <= t.sell && t.sell < t.buy && t.buy <= t.strong_buy) {
            return fail(format!(
                "thresholds must satisfy avoid <= sell < buy <= strong_buy, got {}/{}/{}/{}",
                t.avoid, t.sell, t.buy, t.strong_buy
            ));
        }
        if self.rules.is_empty() {
            return fail("rule table is empty".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return fail("rule with empty name".to_string());
            }
            if !seen.insert(rule.name.as_str()) {
                return fail(format!("duplicate rule name '{}'", rule.name));
            }
            if rule.weight == 0 {
                return fail(format!("rule '{}' has zero weight", rule.name));
            }
            if let Some(v) = rule.when.threshold() {
                if !v.is_finite() {
                    return fail(format!("rule '{}' has a non-finite threshold", rule.name));
                }
            }
            if let Predicate::RsiAbove { value } | Predicate::RsiBelow { value } = rule.when {
                if !(0.0..=100.0).contains(&value) {
                    return fail(format!(
                        "rule '{}': RSI threshold {value} outside 0-100",
                        rule.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Raw `[scoring]` section: a preset, an explicit table, or a preset with overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    pub preset: Option<String>,
    pub min_score: Option<i32>,
    pub max_score: Option<i32>,
    pub thresholds: Option<Thresholds>,
    pub rules: Option<Vec<Rule>>,
}

impl ScoringSettings {
    /// Resolve into a validated table.
    ///
    /// Without a preset every field must be given; with one, given
    /// fields override the preset's.
    pub fn resolve(&self) -> Result<ScoringConfig, ScannerError> {
        let config = match &self.preset {
            Some(name) => {
                let mut base = presets::by_name(name).ok_or_else(|| {
                    ScannerError::Config(format!(
                        "unknown scoring preset '{name}' (known: {})",
                        presets::NAMES.join(", ")
                    ))
                })?;
                if let Some(v) = self.min_score {
                    base.min_score = v;
                }
                if let Some(v) = self.max_score {
                    base.max_score = v;
                }
                if let Some(t) = self.thresholds {
                    base.thresholds = t;
                }
                if let Some(rules) = &self.rules {
                    base.rules = rules.clone();
                    base.name = format!("{name}+custom");
                }
                base
            }
            None => {
                let missing = |field: &str| {
                    ScannerError::Config(format!("scoring.{field} is required without a preset"))
                };
                ScoringConfig {
                    name: "custom".to_string(),
                    min_score: self.min_score.ok_or_else(|| missing("min_score"))?,
                    max_score: self.max_score.ok_or_else(|| missing("max_score"))?,
                    thresholds: self.thresholds.ok_or_else(|| missing("thresholds"))?,
                    rules: self.rules.clone().ok_or_else(|| missing("rules"))?,
                }
            }
        };
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Outcome of scoring one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    /// Sum of triggered weights before clamping.
    pub raw: i32,
    pub score: i32,
    pub action: Action,
    pub triggered: Vec<String>,
}

/// Applies a validated rule table.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Result<Self, ScannerError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, price: f64, indicators: &IndicatorSnapshot) -> Scorecard {
        let mut raw = 0i32;
        let mut triggered = Vec::new();

        for rule in &self.config.rules {
            if rule.when.evaluate(price, indicators) == Some(true) {
                raw = raw.saturating_add(rule.weight);
                triggered.push(rule.name.clone());
            }
        }

        let score = raw.clamp(self.config.min_score, self.config.max_score);
        let action = self.config.thresholds.classify(score);

        debug!(raw, score, action = %action, triggered = ?triggered, "Scored snapshot");

        Scorecard {
            raw,
            score,
            action,
            triggered,
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            config: presets::structured_alpha(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
