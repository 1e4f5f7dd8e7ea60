//! Value bet selection.
//!
//! A value bet is a side where the ensemble is confident, its discrete class
//! agrees with that side, and the model probability beats the market's
//! implied probability.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::{EventRef, EventStatus, MoneylinePrices, Side};
use crate::ensemble::Prediction;
use crate::error::{EdgeError, Result};
use crate::pricing::FairOdds;
use crate::telemetry::{SharedTelemetry, Signal, TracingTelemetry};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Market-implied probabilities for one event; `None` where the side is not priced
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub home_implied_probability: Option<f64>,
    pub away_implied_probability: Option<f64>,
}

impl MarketSnapshot {
    /// Raw implied probabilities (margin included) from decimal prices
    pub fn from_prices(home: Option<f64>, away: Option<f64>) -> Self {
        let implied = |p: Option<f64>| p.filter(|p| p.is_finite() && *p > 1.0).map(|p| 1.0 / p);
        Self {
            home_implied_probability: implied(home),
            away_implied_probability: implied(away),
        }
    }

    pub fn from_moneyline(prices: &MoneylinePrices) -> Self {
        Self::from_prices(prices.home.available(), prices.away.available())
    }

    /// Vig-free probabilities
    pub fn from_fair(fair: &FairOdds) -> Self {
        Self {
            home_implied_probability: Some(fair.fair_home_prob),
            away_implied_probability: Some(fair.fair_away_prob),
        }
    }
}

/// Everything the selector needs to judge one event
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCandidate {
    pub prediction: Prediction,
    pub status: EventStatus,
    pub market: MarketSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBet {
    pub event_ref: EventRef,
    pub side: Side,
    /// Model probability of `side` winning
    pub model_probability: f64,
    pub market_implied_probability: f64,
    pub edge: f64,
}

impl ValueBet {
    /// Full-Kelly stake as a fraction of bankroll at the implied price
    pub fn kelly_fraction(&self) -> f64 {
        if self.edge <= 0.0 || self.market_implied_probability >= 1.0 {
            return 0.0;
        }
        self.edge / (1.0 - self.market_implied_probability)
    }

    /// Decimal price implied by the market probability
    pub fn implied_price(&self) -> f64 {
        1.0 / self.market_implied_probability
    }
}

/// Ranking keys carried alongside each bet
struct Ranked {
    bet: ValueBet,
    home_value: Option<f64>,
    away_value: Option<f64>,
}

/// Descending, with missing values last
fn desc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct ValueBetSelector {
    telemetry: SharedTelemetry,
}

impl Default for ValueBetSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueBetSelector {
    pub fn new() -> Self {
        Self {
            telemetry: TracingTelemetry::shared(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn validate_threshold(threshold: f64) -> Result<()> {
        if !(0.5..1.0).contains(&threshold) {
            return Err(EdgeError::Validation(format!(
                "confidence threshold must be in [0.5, 1.0), got {threshold}"
            )));
        }
        Ok(())
    }

    /// Ranked value bets: edge descending, then home value, then away value,
    /// then event ref.
    pub fn get_value_bets(
        &self,
        candidates: &[ValueCandidate],
        confidence_threshold: f64,
    ) -> Result<Vec<ValueBet>> {
        Self::validate_threshold(confidence_threshold)?;
        let t = confidence_threshold;

        let mut ranked: Vec<Ranked> = candidates
            .iter()
            .filter(|c| !c.status.is_final())
            .filter_map(|c| {
                let p = c.prediction.ensemble_probability;
                if !(p > t || p < 1.0 - t) {
                    return None;
                }
                let home_value = c.market.home_implied_probability.map(|i| p - i);
                let away_value = c.market.away_implied_probability.map(|i| (1.0 - p) - i);

                let bet = |side: Side, model_probability: f64, implied: f64, edge: f64| ValueBet {
                    event_ref: c.prediction.event_ref.clone(),
                    side,
                    model_probability,
                    market_implied_probability: implied,
                    edge,
                };
                let home = match (c.market.home_implied_probability, home_value) {
                    (Some(i), Some(v)) if c.prediction.ensemble_class == 1 && p > t && v > 0.0 => {
                        Some(bet(Side::Home, p, i, v))
                    }
                    _ => None,
                };
                let away = match (c.market.away_implied_probability, away_value) {
                    (Some(i), Some(v))
                        if c.prediction.ensemble_class == 0 && p < 1.0 - t && v > 0.0 =>
                    {
                        Some(bet(Side::Away, 1.0 - p, i, v))
                    }
                    _ => None,
                };

                home.or(away).map(|bet| Ranked {
                    bet,
                    home_value,
                    away_value,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.bet
                .edge
                .partial_cmp(&a.bet.edge)
                .unwrap_or(Ordering::Equal)
                .then_with(|| desc_missing_last(a.home_value, b.home_value))
                .then_with(|| desc_missing_last(a.away_value, b.away_value))
                .then_with(|| a.bet.event_ref.cmp(&b.bet.event_ref))
        });

        let bets: Vec<ValueBet> = ranked.into_iter().map(|r| r.bet).collect();
        self.telemetry.emit(Signal::ValueBetsSelected {
            candidates: candidates.len(),
            selected: bets.len(),
            threshold: t,
        });
        Ok(bets)
    }
}
