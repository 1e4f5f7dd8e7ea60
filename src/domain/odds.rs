//! Odds format conversions.
//!
//! Everything inside the engine works on decimal odds. Feeds that publish
//! American odds are converted at the boundary.

use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};

/// Check that a decimal price can be turned into a probability
pub fn validate_decimal_price(price: f64, field: &str) -> Result<()> {
    if !price.is_finite() || price <= 1.0 {
        return Err(EdgeError::invalid_price(field, price));
    }
    Ok(())
}

/// Convert American odds to decimal odds
///
/// +150 -> 2.50, -200 -> 1.50. Values in (-100, 100) are not valid American odds.
pub fn american_to_decimal(american: f64) -> Result<f64> {
    if !american.is_finite() || american.abs() < 100.0 {
        return Err(EdgeError::Validation(format!(
            "invalid American odds: {american}"
        )));
    }
    if american > 0.0 {
        Ok(american / 100.0 + 1.0)
    } else {
        Ok(100.0 / american.abs() + 1.0)
    }
}

/// Convert decimal odds to American odds (rounded to the nearest integer)
pub fn decimal_to_american(decimal: f64) -> Result<i64> {
    validate_decimal_price(decimal, "decimal")?;
    let american = if decimal >= 2.0 {
        (decimal - 1.0) * 100.0
    } else {
        -100.0 / (decimal - 1.0)
    };
    Ok(american.round() as i64)
}

/// Raw implied probability of a decimal price (margin included)
pub fn implied_probability(decimal: f64) -> Result<f64> {
    validate_decimal_price(decimal, "decimal")?;
    Ok(1.0 / decimal)
}

/// A price as published by a feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPrice {
    Decimal(f64),
    American(f64),
}

impl FeedPrice {
    pub fn to_decimal(&self) -> Result<f64> {
        let decimal = match *self {
            FeedPrice::Decimal(d) => d,
            FeedPrice::American(a) => american_to_decimal(a)?,
        };
        validate_decimal_price(decimal, "price")?;
        Ok(decimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_american_to_decimal_positive() {
        let d = american_to_decimal(150.0).unwrap();
        assert!((d - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_american_to_decimal_negative() {
        let d = american_to_decimal(-200.0).unwrap();
        assert!((d - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_american_inside_dead_zone_rejected() {
        assert!(american_to_decimal(50.0).is_err());
        assert!(american_to_decimal(-99.0).is_err());
    }

    #[test]
    fn test_decimal_to_american() {
        assert_eq!(decimal_to_american(2.5).unwrap(), 150);
        assert_eq!(decimal_to_american(1.5).unwrap(), -200);
        assert!(decimal_to_american(1.0).is_err());
    }

    #[test]
    fn test_implied_probability() {
        let p = implied_probability(1.5).unwrap();
        assert!((p - 2.0 / 3.0).abs() < 1e-12);
        assert!(implied_probability(0.0).is_err());
        assert!(implied_probability(f64::NAN).is_err());
    }

    #[test]
    fn test_feed_price_deserializes_both_formats() {
        let d: FeedPrice = serde_json::from_str(r#"{"decimal": 2.1}"#).unwrap();
        let a: FeedPrice = serde_json::from_str(r#"{"american": -110}"#).unwrap();
        assert!((d.to_decimal().unwrap() - 2.1).abs() < 1e-12);
        assert!((a.to_decimal().unwrap() - (100.0 / 110.0 + 1.0)).abs() < 1e-12);
    }
}
