//! Proportional (multiplicative) margin removal.
//!
//! Each side's raw implied probability is scaled by the overround so the
//! fair probabilities sum to one:
//!
//! ```text
//! p_i      = 1 / price_i
//! overround = Σ p_i
//! fair_p_i = p_i / overround
//! fair_i   = 1 / fair_p_i
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{validate_decimal_price, EventRef, Market, MoneylinePrices, Side};
use crate::error::{EdgeError, Result};

/// Tolerance for the fair probabilities summing to one
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-9;

/// Vig-free moneyline probabilities and odds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairOdds {
    pub fair_home_prob: f64,
    pub fair_away_prob: f64,
    pub fair_draw_prob: Option<f64>,
    pub fair_home_odds: f64,
    pub fair_away_odds: f64,
    pub fair_draw_odds: Option<f64>,
    /// Sum of raw implied probabilities; 1.0 means a zero-margin book
    pub overround: f64,
}

impl FairOdds {
    /// Bookmaker margin in percent
    pub fn margin_pct(&self) -> f64 {
        (self.overround - 1.0) * 100.0
    }

    pub fn prob(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => Some(self.fair_home_prob),
            Side::Away => Some(self.fair_away_prob),
            Side::Draw => self.fair_draw_prob,
            Side::Over | Side::Under => None,
        }
    }

    pub fn odds(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => Some(self.fair_home_odds),
            Side::Away => Some(self.fair_away_odds),
            Side::Draw => self.fair_draw_odds,
            Side::Over | Side::Under => None,
        }
    }
}

/// Fair odds tied to the event and book they were derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFairOdds {
    pub event_ref: EventRef,
    pub book: String,
    #[serde(flatten)]
    pub odds: FairOdds,
}

/// Vig-free prices for one line of a two-way market (spread or total)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoWayFairOdds {
    pub market: Market,
    pub line: f64,
    pub first: Side,
    pub second: Side,
    pub fair_first_prob: f64,
    pub fair_second_prob: f64,
    pub fair_first_odds: f64,
    pub fair_second_odds: f64,
    pub overround: f64,
}

impl TwoWayFairOdds {
    pub fn odds(&self, side: Side) -> Option<f64> {
        if side == self.first {
            Some(self.fair_first_odds)
        } else if side == self.second {
            Some(self.fair_second_odds)
        } else {
            None
        }
    }
}

fn fair_price(fair_prob: f64) -> f64 {
    if fair_prob == 0.0 {
        f64::INFINITY
    } else {
        1.0 / fair_prob
    }
}

/// Devig a set of prices; returns (fair probabilities, overround)
fn devig_prices(prices: &[(f64, &str)]) -> Result<(Vec<f64>, f64)> {
    for (price, field) in prices {
        validate_decimal_price(*price, field)?;
    }

    let implied: Vec<f64> = prices.iter().map(|(p, _)| 1.0 / p).collect();
    let overround: f64 = implied.iter().sum();
    if overround < 1.0 {
        return Err(EdgeError::NegativeMargin { overround });
    }

    let fair: Vec<f64> = implied.iter().map(|p| p / overround).collect();
    let total: f64 = fair.iter().sum();
    if (total - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(EdgeError::NumericInconsistency(format!(
            "fair probabilities sum to {total:.12}, expected 1.0"
        )));
    }
    Ok((fair, overround))
}

/// Devig moneyline prices. `draw` omitted means a two-outcome market.
pub fn devig_odds(home: f64, away: f64, draw: Option<f64>) -> Result<FairOdds> {
    let mut prices = vec![(home, "home_price"), (away, "away_price")];
    if let Some(d) = draw {
        prices.push((d, "draw_price"));
    }
    let (fair, overround) = devig_prices(&prices)?;
    let fair_draw_prob = fair.get(2).copied();

    Ok(FairOdds {
        fair_home_prob: fair[0],
        fair_away_prob: fair[1],
        fair_draw_prob,
        fair_home_odds: fair_price(fair[0]),
        fair_away_odds: fair_price(fair[1]),
        fair_draw_odds: fair_draw_prob.map(fair_price),
        overround,
    })
}

/// Devig one line of a spread or total market
pub fn devig_two_way(market: Market, line: f64, first: f64, second: f64) -> Result<TwoWayFairOdds> {
    let (first_side, second_side) = market.two_way_sides();
    let (fair, overround) = devig_prices(&[(first, first_side.as_str()), (second, second_side.as_str())])?;

    Ok(TwoWayFairOdds {
        market,
        line,
        first: first_side,
        second: second_side,
        fair_first_prob: fair[0],
        fair_second_prob: fair[1],
        fair_first_odds: fair_price(fair[0]),
        fair_second_odds: fair_price(fair[1]),
        overround,
    })
}

/// Devigs the quotes of one reference book
#[derive(Debug, Clone, Default)]
pub struct FairOddsEngine;

impl FairOddsEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn devig_odds(&self, home: f64, away: f64, draw: Option<f64>) -> Result<FairOdds> {
        devig_odds(home, away, draw)
    }

    /// Devig a book's moneyline for an event.
    ///
    /// Returns `Ok(None)` when home or away is not available. A draw is
    /// included only when the book quotes a usable draw price.
    pub fn devig_moneyline(
        &self,
        event_ref: &EventRef,
        book: &str,
        prices: &MoneylinePrices,
    ) -> Result<Option<EventFairOdds>> {
        let Some((home, away)) = prices.both_sides() else {
            return Ok(None);
        };
        let odds = devig_odds(home, away, prices.draw.available())?;
        Ok(Some(EventFairOdds {
            event_ref: event_ref.clone(),
            book: book.to_string(),
            odds,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Quoted, Unavailable};

    #[test]
    fn test_devig_reference_scenario() {
        let fair = devig_odds(2.10, 1.80, None).unwrap();
        assert!((fair.overround - 1.0317).abs() < 1e-4, "overround {}", fair.overround);
        assert!((fair.fair_home_odds - 2.166).abs() < 0.01, "home {}", fair.fair_home_odds);
        assert!((fair.fair_away_odds - 1.853).abs() < 0.01, "away {}", fair.fair_away_odds);
        assert!((fair.fair_home_prob - 0.4615).abs() < 1e-3);
        assert!(fair.fair_draw_prob.is_none());
        assert!(fair.fair_draw_odds.is_none());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let cases = [
            (1.50, 2.70, None),
            (1.01, 30.0, None),
            (2.60, 2.90, Some(3.20)),
            (1.95, 1.95, None),
            (4.5, 1.25, Some(7.0)),
        ];
        for (home, away, draw) in cases {
            let fair = devig_odds(home, away, draw).unwrap();
            let total = fair.fair_home_prob + fair.fair_away_prob + fair.fair_draw_prob.unwrap_or(0.0);
            assert!((total - 1.0).abs() < 1e-9, "sum {total} for {home}/{away}/{draw:?}");
        }
    }

    #[test]
    fn test_margin_removal_never_raises_probability() {
        let (home, away, draw) = (2.60, 2.90, 3.20);
        let fair = devig_odds(home, away, Some(draw)).unwrap();
        assert!(fair.overround > 1.0);
        assert!(fair.fair_home_prob <= 1.0 / home);
        assert!(fair.fair_away_prob <= 1.0 / away);
        assert!(fair.fair_draw_prob.unwrap() <= 1.0 / draw);
        assert!(fair.fair_home_odds >= home);
    }

    #[test]
    fn test_zero_margin_book() {
        let fair = devig_odds(2.0, 2.0, None).unwrap();
        assert_eq!(fair.overround, 1.0);
        assert_eq!(fair.fair_home_odds, 2.0);
        assert_eq!(fair.margin_pct(), 0.0);
    }

    #[test]
    fn test_invalid_prices_fail_fast() {
        for bad in [0.0, -1.5, 1.0, f64::NAN, f64::INFINITY] {
            let err = devig_odds(bad, 1.9, None).unwrap_err();
            assert!(matches!(err, EdgeError::InvalidPrice { .. }), "price {bad}: {err}");
        }
        let err = devig_odds(1.9, 1.9, Some(0.5)).unwrap_err();
        assert!(matches!(err, EdgeError::InvalidPrice { ref field, .. } if field == "draw_price"));
    }

    #[test]
    fn test_negative_margin_rejected() {
        let err = devig_odds(2.2, 2.2, None).unwrap_err();
        assert!(matches!(err, EdgeError::NegativeMargin { .. }), "got {err}");
    }

    #[test]
    fn test_two_way_total() {
        let fair = devig_two_way(Market::Total, 221.5, 1.91, 1.91).unwrap();
        assert_eq!(fair.first, Side::Over);
        assert!((fair.fair_first_prob - 0.5).abs() < 1e-12);
        assert!((fair.fair_second_odds - 2.0).abs() < 1e-12);
        assert_eq!(fair.odds(Side::Home), None);
    }

    #[test]
    fn test_engine_skips_incomplete_moneyline() {
        let engine = FairOddsEngine::new();
        let event_ref = EventRef::new("pinnacle", "1");
        let partial = MoneylinePrices {
            home: Quoted::Available(2.1),
            away: Quoted::Unavailable(Unavailable::NotQuoted),
            draw: Quoted::Unavailable(Unavailable::NotQuoted),
        };
        assert!(engine.devig_moneyline(&event_ref, "pinnacle", &partial).unwrap().is_none());

        let full = MoneylinePrices {
            away: Quoted::Available(1.8),
            ..partial
        };
        let fair = engine.devig_moneyline(&event_ref, "pinnacle", &full).unwrap().unwrap();
        assert_eq!(fair.book, "pinnacle");
        assert!(fair.odds.fair_draw_prob.is_none());
    }
}
