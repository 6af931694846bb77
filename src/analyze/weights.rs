//! Fixed factor weights and the score → alert-level mapping.
//!
//! The weight table is closed at compile time and sums to 1.0, so a total built
//! from factors in [0,100] stays in [0,100].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Weights {
    pub news_velocity: f64,
    pub social_volume: f64,
    pub google_trends: f64,
    pub sentiment_shift: f64,
    pub prediction_volatility: f64,
    pub market_movement: f64,
    pub event_triggers: f64,
}

pub const WEIGHTS: Weights = Weights {
    news_velocity: 0.20,
    social_volume: 0.15,
    google_trends: 0.20,
    sentiment_shift: 0.10,
    prediction_volatility: 0.20,
    market_movement: 0.10,
    event_triggers: 0.05,
};

impl Weights {
    pub fn sum(&self) -> f64 {
        self.news_velocity
            + self.social_volume
            + self.google_trends
            + self.sentiment_shift
            + self.prediction_volatility
            + self.market_movement
            + self.event_triggers
    }
}

impl Default for Weights {
    fn default() -> Self {
        WEIGHTS
    }
}

/// The seven per-region signals of one tick, each in [0,100].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Factors {
    pub news_velocity: f64,
    pub social_volume: f64,
    pub google_trends: f64,
    pub sentiment_shift: f64,
    pub prediction_volatility: f64,
    pub market_movement: f64,
    pub event_triggers: f64,
}

impl Factors {
    /// Every factor clamped to [0,100] and rounded to one decimal.
    pub fn normalized(self) -> Self {
        let n = |x: f64| round1(x.clamp(0.0, 100.0));
        Self {
            news_velocity: n(self.news_velocity),
            social_volume: n(self.social_volume),
            google_trends: n(self.google_trends),
            sentiment_shift: n(self.sentiment_shift),
            prediction_volatility: n(self.prediction_volatility),
            market_movement: n(self.market_movement),
            event_triggers: n(self.event_triggers),
        }
    }

    /// Σ factor × weight, clamped to [0,100].
    pub fn weighted_total(&self, w: &Weights) -> f64 {
        let total = self.news_velocity * w.news_velocity
            + self.social_volume * w.social_volume
            + self.google_trends * w.google_trends
            + self.sentiment_shift * w.sentiment_shift
            + self.prediction_volatility * w.prediction_volatility
            + self.market_movement * w.market_movement
            + self.event_triggers * w.event_triggers;
        total.clamp(0.0, 100.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Elevated,
    High,
    Critical,
}

impl AlertLevel {
    /// `<40` low, `[40,60)` elevated, `[60,80)` high, `>=80` critical.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            AlertLevel::Critical
        } else if score >= 60.0 {
            AlertLevel::High
        } else if score >= 40.0 {
            AlertLevel::Elevated
        } else {
            AlertLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Low => "low",
            AlertLevel::Elevated => "elevated",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        assert!((WEIGHTS.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn alert_boundaries_are_right_open() {
        assert_eq!(AlertLevel::from_score(0.0), AlertLevel::Low);
        assert_eq!(AlertLevel::from_score(39.9), AlertLevel::Low);
        assert_eq!(AlertLevel::from_score(40.0), AlertLevel::Elevated);
        assert_eq!(AlertLevel::from_score(59.9), AlertLevel::Elevated);
        assert_eq!(AlertLevel::from_score(60.0), AlertLevel::High);
        assert_eq!(AlertLevel::from_score(79.99), AlertLevel::High);
        assert_eq!(AlertLevel::from_score(80.0), AlertLevel::Critical);
        assert_eq!(AlertLevel::from_score(100.0), AlertLevel::Critical);
    }

    #[test]
    fn all_max_factors_give_full_score() {
        let f = Factors {
            news_velocity: 100.0,
            social_volume: 100.0,
            google_trends: 100.0,
            sentiment_shift: 100.0,
            prediction_volatility: 100.0,
            market_movement: 100.0,
            event_triggers: 100.0,
        };
        assert!((f.weighted_total(&WEIGHTS) - 100.0).abs() < 1e-9);
        assert_eq!(Factors::default().weighted_total(&WEIGHTS), 0.0);
    }

    #[test]
    fn normalized_clamps_and_rounds() {
        let f = Factors {
            news_velocity: 123.0,
            social_volume: -4.0,
            google_trends: 50.04,
            ..Factors::default()
        }
        .normalized();
        assert_eq!(f.news_velocity, 100.0);
        assert_eq!(f.social_volume, 0.0);
        assert_eq!(f.google_trends, 50.0);
    }

    #[test]
    fn alert_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AlertLevel::Elevated).unwrap(), "\"elevated\"");
    }
}
