//! Built-in rule tables.

use super::{Predicate, Rule, ScoringConfig, Thresholds};

pub const NAMES: &[&str] = &["structured_alpha", "momentum_24h", "balanced"];

pub fn by_name(name: &str) -> Option<ScoringConfig> {
    match name.to_ascii_lowercase().as_str() {
        "structured_alpha" => Some(structured_alpha()),
        "momentum_24h" => Some(momentum_24h()),
        "balanced" => Some(balanced()),
        _ => None,
    }
}

/// Five confirmations worth 20 points each on a 0-100 scale.
pub fn structured_alpha() -> ScoringConfig {
    ScoringConfig {
        name: "structured_alpha".to_string(),
        min_score: 0,
        max_score: 100,
        thresholds: Thresholds {
            strong_buy: 80,
            buy: 60,
            sell: 20,
            avoid: 0,
        },
        rules: vec![
            Rule::new("ema_trend", 20, Predicate::EmaTrendUp),
            Rule::new("rsi_above_30", 20, Predicate::RsiAbove { value: 30.0 }),
            Rule::new("macd_cross", 20, Predicate::MacdAboveSignal),
            Rule::new("volume_surge", 20, Predicate::VolumeRatioAbove { value: 1.8 }),
            Rule::new("breakout", 20, Predicate::Breakout),
        ],
    }
}

/// 24h change buckets on a symmetric -5..5 scale. Works on ticker data alone.
pub fn momentum_24h() -> ScoringConfig {
    ScoringConfig {
        name: "momentum_24h".to_string(),
        min_score: -5,
        max_score: 5,
        thresholds: Thresholds {
            strong_buy: 4,
            buy: 3,
            sell: -3,
            avoid: -5,
        },
        rules: vec![
            Rule::new("up", 1, Predicate::ChangeAbove { value: 0.0 }),
            Rule::new("up_3pct", 2, Predicate::ChangeAbove { value: 3.0 }),
            Rule::new("up_7pct", 2, Predicate::ChangeAbove { value: 7.0 }),
            Rule::new("down", -1, Predicate::ChangeBelow { value: 0.0 }),
            Rule::new("down_3pct", -2, Predicate::ChangeBelow { value: -3.0 }),
            Rule::new("down_7pct", -2, Predicate::ChangeBelow { value: -7.0 }),
        ],
    }
}

/// Mean-reversion plus trend confirmations on a 0-7 scale.
pub fn balanced() -> ScoringConfig {
    ScoringConfig {
        name: "balanced".to_string(),
        min_score: 0,
        max_score: 7,
        thresholds: Thresholds {
            strong_buy: 6,
            buy: 4,
            sell: 2,
            avoid: 0,
        },
        rules: vec![
            Rule::new("oversold", 2, Predicate::RsiBelow { value: 30.0 }),
            Rule::new("overbought", -1, Predicate::RsiAbove { value: 70.0 }),
            Rule::new("ema_trend", 1, Predicate::EmaTrendUp),
            Rule::new("macd_cross", 1, Predicate::MacdAboveSignal),
            Rule::new("volume_surge", 1, Predicate::VolumeRatioAbove { value: 1.5 }),
            Rule::new("green", 1, Predicate::ChangeAbove { value: 0.0 }),
            Rule::new("calm", 1, Predicate::VolatilityBelow { value: 8.0 }),
            Rule::new("breakout", 1, Predicate::Breakout),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringEngine;
    use crate::types::{Action, IndicatorSnapshot};

    #[test]
    fn test_all_presets_validate() {
        for name in NAMES {
            let cfg = by_name(name).unwrap();
            assert!(cfg.validate().is_ok(), "{name} should validate");
            assert_eq!(cfg.name, *name);
        }
    }

    #[test]
    fn test_by_name_case_insensitive() {
        assert!(by_name("Structured_Alpha").is_some());
        assert!(by_name("nope").is_none());
    }

    #[test]
    fn test_balanced_flat_market_only_rsi_fires() {
        let engine = ScoringEngine::new(balanced()).unwrap();
        let snap = IndicatorSnapshot {
            rsi: Some(100.0),
            ema_fast: Some(42.0),
            ema_slow: Some(42.0),
            macd_line: Some(0.0),
            macd_signal: Some(0.0),
            volatility_pct: 0.0,
            volume_ratio: Some(1.0),
            change_pct: 0.0,
            breakout: Some(false),
        };
        let card = engine.score(42.0, &snap);
        assert_eq!(card.triggered, vec!["overbought".to_string()]);
        assert_eq!(card.score, 0);
        assert_eq!(card.action, Action::Avoid);
    }

    #[test]
    fn test_structured_alpha_all_confirmations() {
        let engine = ScoringEngine::new(structured_alpha()).unwrap();
        let snap = IndicatorSnapshot {
            rsi: Some(60.0),
            ema_fast: Some(11.0),
            ema_slow: Some(10.0),
            macd_line: Some(0.5),
            macd_signal: Some(0.1),
            volatility_pct: 2.0,
            volume_ratio: Some(2.0),
            change_pct: 1.0,
            breakout: Some(true),
        };
        let card = engine.score(11.5, &snap);
        assert_eq!(card.score, 100);
        assert_eq!(card.action, Action::StrongBuy);
    }

    #[test]
    fn test_momentum_buckets() {
        let engine = ScoringEngine::new(momentum_24h()).unwrap();
        let at = |change: f64| {
            let snap = IndicatorSnapshot { change_pct: change, ..Default::default() };
            engine.score(1.0, &snap)
        };
        assert_eq!(at(8.0).score, 5);
        assert_eq!(at(4.0).score, 3);
        assert_eq!(at(4.0).action, Action::Buy);
        assert_eq!(at(0.0).score, 0);
        assert_eq!(at(0.0).action, Action::Hold);
        assert_eq!(at(-4.0).score, -3);
        assert_eq!(at(-4.0).action, Action::Sell);
        assert_eq!(at(-10.0).score, -5);
        assert_eq!(at(-10.0).action, Action::Avoid);
    }

    #[test]
    fn test_balanced_stays_in_range() {
        let engine = ScoringEngine::new(balanced()).unwrap();
        let snap = IndicatorSnapshot {
            rsi: Some(20.0),
            ema_fast: Some(11.0),
            ema_slow: Some(10.0),
            macd_line: Some(0.5),
            macd_signal: Some(0.1),
            volatility_pct: 2.0,
            volume_ratio: Some(2.0),
            change_pct: 1.0,
            breakout: Some(true),
        };
        let card = engine.score(11.0, &snap);
        assert_eq!(card.raw, 8);
        assert_eq!(card.score, 7);
        assert_eq!(card.action, Action::StrongBuy);
    }
}
