use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::EventRef;
use super::odds::validate_decimal_price;

/// Betting market type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Moneyline,
    Spread,
    Total,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Moneyline => "moneyline",
            Market::Spread => "spread",
            Market::Total => "total",
        }
    }

    /// The two sides of a two-way line market
    pub fn two_way_sides(&self) -> (Side, Side) {
        match self {
            Market::Moneyline | Market::Spread => (Side::Home, Side::Away),
            Market::Total => (Side::Over, Side::Under),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome a quote pays out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
    Draw,
    Over,
    Under,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Draw => "draw",
            Side::Over => "over",
            Side::Under => "under",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One book's price for one side of one market of one event.
///
/// Quotes are never mutated; a newer quote with the same [`QuoteKey`]
/// supersedes an older one inside a [`super::QuoteBook`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub event_ref: EventRef,
    pub book: String,
    pub market: Market,
    pub side: Side,
    /// Handicap (home perspective) for spreads, points for totals, None for moneyline
    #[serde(default)]
    pub line: Option<f64>,
    pub decimal_price: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Identity of a quote slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    pub event_ref: EventRef,
    pub book: String,
    pub market: Market,
    pub side: Side,
    pub line: Option<OrderedFloat<f64>>,
}

impl OddsQuote {
    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            event_ref: self.event_ref.clone(),
            book: self.book.clone(),
            market: self.market,
            side: self.side,
            line: self.line.map(OrderedFloat),
        }
    }

    /// Price as a typed extraction result
    pub fn price(&self) -> Quoted<f64> {
        match validate_decimal_price(self.decimal_price, "decimal_price") {
            Ok(()) => Quoted::Available(self.decimal_price),
            Err(_) => Quoted::Unavailable(Unavailable::InvalidPrice(self.decimal_price)),
        }
    }
}

/// Why a value could not be extracted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    /// The provider did not quote this slot
    NotQuoted,
    /// The provider quoted a price that cannot be a decimal price
    InvalidPrice(f64),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::NotQuoted => write!(f, "not quoted"),
            Unavailable::InvalidPrice(p) => write!(f, "invalid price {p}"),
        }
    }
}

/// Extraction result: either a value or an explicit marker saying why not.
///
/// Consumers skip unavailable slots instead of treating them as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quoted<T> {
    Available(T),
    Unavailable(Unavailable),
}

impl<T: Copy> Quoted<T> {
    pub fn available(&self) -> Option<T> {
        match self {
            Quoted::Available(v) => Some(*v),
            Quoted::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Quoted::Available(_))
    }
}

impl<T> From<Option<T>> for Quoted<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Quoted::Available(v),
            None => Quoted::Unavailable(Unavailable::NotQuoted),
        }
    }
}
