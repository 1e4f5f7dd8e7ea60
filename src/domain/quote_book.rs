//! In-memory quote store for one fetch cycle.
//!
//! Holds at most one quote per [`QuoteKey`]. Inserting a quote whose key is
//! already present keeps whichever has the later `fetched_at` (ties go to the
//! newcomer), so feeding a cycle's quotes in any order yields the same book.

use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};

use super::event::EventRef;
use super::quote::{Market, OddsQuote, QuoteKey, Quoted, Side, Unavailable};

/// Moneyline prices of one book for one event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneylinePrices {
    pub home: Quoted<f64>,
    pub away: Quoted<f64>,
    pub draw: Quoted<f64>,
}

impl MoneylinePrices {
    /// Home and away prices, only when both are usable
    pub fn both_sides(&self) -> Option<(f64, f64)> {
        Some((self.home.available()?, self.away.available()?))
    }
}

/// Prices of one book for a two-way line market (spread or total)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoWayPrices {
    pub market: Market,
    pub line: f64,
    pub first: (Side, Quoted<f64>),
    pub second: (Side, Quoted<f64>),
}

impl TwoWayPrices {
    pub fn both_sides(&self) -> Option<(f64, f64)> {
        Some((self.first.1.available()?, self.second.1.available()?))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    quotes: HashMap<QuoteKey, OddsQuote>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_quotes<I: IntoIterator<Item = OddsQuote>>(quotes: I) -> Self {
        let mut book = Self::new();
        book.extend(quotes);
        book
    }

    /// Insert a quote; returns true if it became the current quote for its key
    pub fn insert(&mut self, quote: OddsQuote) -> bool {
        let key = quote.key();
        match self.quotes.get(&key) {
            Some(existing) if existing.fetched_at > quote.fetched_at => false,
            _ => {
                self.quotes.insert(key, quote);
                true
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = OddsQuote>>(&mut self, quotes: I) {
        for quote in quotes {
            self.insert(quote);
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn get(
        &self,
        event_ref: &EventRef,
        book: &str,
        market: Market,
        side: Side,
        line: Option<f64>,
    ) -> Option<&OddsQuote> {
        let key = QuoteKey {
            event_ref: event_ref.clone(),
            book: book.to_string(),
            market,
            side,
            line: line.map(OrderedFloat),
        };
        self.quotes.get(&key)
    }

    /// Typed price lookup: unquoted and invalid slots are explicit
    pub fn price(
        &self,
        event_ref: &EventRef,
        book: &str,
        market: Market,
        side: Side,
        line: Option<f64>,
    ) -> Quoted<f64> {
        match self.get(event_ref, book, market, side, line) {
            Some(q) => q.price(),
            None => Quoted::Unavailable(Unavailable::NotQuoted),
        }
    }

    pub fn moneyline(&self, event_ref: &EventRef, book: &str) -> MoneylinePrices {
        MoneylinePrices {
            home: self.price(event_ref, book, Market::Moneyline, Side::Home, None),
            away: self.price(event_ref, book, Market::Moneyline, Side::Away, None),
            draw: self.price(event_ref, book, Market::Moneyline, Side::Draw, None),
        }
    }

    pub fn two_way(
        &self,
        event_ref: &EventRef,
        book: &str,
        market: Market,
        line: f64,
    ) -> TwoWayPrices {
        let (first, second) = market.two_way_sides();
        TwoWayPrices {
            market,
            line,
            first: (first, self.price(event_ref, book, market, first, Some(line))),
            second: (second, self.price(event_ref, book, market, second, Some(line))),
        }
    }

    /// Books that quote anything for this event, sorted by name
    pub fn books_for(&self, event_ref: &EventRef) -> Vec<String> {
        let books: BTreeSet<&str> = self
            .quotes
            .keys()
            .filter(|k| &k.event_ref == event_ref)
            .map(|k| k.book.as_str())
            .collect();
        books.into_iter().map(str::to_string).collect()
    }

    /// Distinct lines a book quotes for a line market, ascending
    pub fn lines(&self, event_ref: &EventRef, book: &str, market: Market) -> Vec<f64> {
        let lines: BTreeSet<OrderedFloat<f64>> = self
            .quotes
            .keys()
            .filter(|k| &k.event_ref == event_ref && k.book == book && k.market == market)
            .filter_map(|k| k.line)
            .collect();
        lines.into_iter().map(|l| l.into_inner()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OddsQuote> {
        self.quotes.values()
    }
}
